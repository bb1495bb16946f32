use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// 抽帧参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// 时间段数
    pub segment_count: u32,
    /// 每段评分采样数
    pub samples_per_segment: u32,
    /// 每段保留的帧数
    pub top_k: u32,
    /// 低分辨率分析时长边的最大像素
    pub analysis_max_dimension: u32,
    /// 输出 JPEG 质量 (1-100)
    pub jpeg_quality: u8,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            segment_count: 5,
            samples_per_segment: 24,
            top_k: 3,
            analysis_max_dimension: 640,
            jpeg_quality: 92,
        }
    }
}

impl SamplingConfig {
    /// 每段实际保留的帧数（采样数少于 top_k 时取采样数）
    pub fn keep_per_segment(&self) -> u32 {
        self.top_k.min(self.samples_per_segment)
    }

    pub fn total_samples(&self) -> usize {
        self.segment_count as usize * self.samples_per_segment as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            anyhow::bail!("segment_count 必须大于 0");
        }
        if self.samples_per_segment == 0 {
            anyhow::bail!("samples_per_segment 必须大于 0");
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k 必须大于 0");
        }
        if self.analysis_max_dimension == 0 {
            anyhow::bail!("analysis_max_dimension 必须大于 0");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!("jpeg_quality 必须在 1-100 之间: {}", self.jpeg_quality);
        }
        Ok(())
    }
}

/// 命令行传入的覆盖值
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub segment_count: Option<u32>,
    pub samples_per_segment: Option<u32>,
    pub top_k: Option<u32>,
    pub analysis_max_dimension: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub log_level: Option<String>,
}

/// 完整配置（抽帧参数 + 日志级别）
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sampling: SamplingConfig,
    /// 日志级别（trace, debug, info, warn, error）
    pub log_level: String,
}

/// 某一个来源（环境变量或配置文件）读到的值
#[derive(Debug, Default)]
struct PartialConfig {
    segment_count: Option<u32>,
    samples_per_segment: Option<u32>,
    top_k: Option<u32>,
    analysis_max_dimension: Option<u32>,
    jpeg_quality: Option<u8>,
    log_level: Option<String>,
}

const CONFIG_FILE_NAME: &str = "frame-pick.ini";
const HIDDEN_CONFIG_FILE_NAME: &str = ".frame-pick.ini";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从多个源加载配置，优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    pub fn load_config(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<AppConfig> {
        // 显式指定的配置文件必须能读取，默认位置的文件可以不存在
        let file_config = match config_file {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_from_default_locations().unwrap_or_default(),
        };
        let env_config = Self::load_from_env();

        let defaults = SamplingConfig::default();
        let sampling = SamplingConfig {
            segment_count: overrides
                .segment_count
                .or(env_config.segment_count)
                .or(file_config.segment_count)
                .unwrap_or(defaults.segment_count),
            samples_per_segment: overrides
                .samples_per_segment
                .or(env_config.samples_per_segment)
                .or(file_config.samples_per_segment)
                .unwrap_or(defaults.samples_per_segment),
            top_k: overrides
                .top_k
                .or(env_config.top_k)
                .or(file_config.top_k)
                .unwrap_or(defaults.top_k),
            analysis_max_dimension: overrides
                .analysis_max_dimension
                .or(env_config.analysis_max_dimension)
                .or(file_config.analysis_max_dimension)
                .unwrap_or(defaults.analysis_max_dimension),
            jpeg_quality: overrides
                .jpeg_quality
                .or(env_config.jpeg_quality)
                .or(file_config.jpeg_quality)
                .unwrap_or(defaults.jpeg_quality),
        };
        sampling.validate()?;

        let log_level = overrides
            .log_level
            .clone()
            .or(env_config.log_level)
            .or(file_config.log_level)
            .unwrap_or_else(|| "info".to_string());

        Ok(AppConfig { sampling, log_level })
    }

    fn load_from_env() -> PartialConfig {
        let parse = |key: &str| env::var(key).ok().and_then(|v| v.trim().parse().ok());
        PartialConfig {
            segment_count: parse("FRAME_PICK_SEGMENT_COUNT"),
            samples_per_segment: parse("FRAME_PICK_SAMPLES_PER_SEGMENT"),
            top_k: parse("FRAME_PICK_TOP_K"),
            analysis_max_dimension: parse("FRAME_PICK_ANALYSIS_MAX_DIMENSION"),
            jpeg_quality: env::var("FRAME_PICK_JPEG_QUALITY")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            log_level: env::var("FRAME_PICK_LOG_LEVEL").ok().filter(|v| !v.is_empty()),
        }
    }

    /// 从 INI 配置文件加载
    fn load_from_file(config_path: &Path) -> Result<PartialConfig> {
        if !config_path.exists() {
            return Err(anyhow::anyhow!("配置文件不存在: {}", config_path.display()));
        }

        let mut config_parser = configparser::ini::Ini::new();
        config_parser
            .load(config_path)
            .map_err(|e| anyhow::anyhow!("读取配置文件失败: {}: {}", config_path.display(), e))?;

        // 先读 [sampling] 节，没有则读 [DEFAULT] 节
        let get = |key: &str| {
            config_parser
                .get("sampling", key)
                .or_else(|| config_parser.get("DEFAULT", key))
                .filter(|v| !v.is_empty())
        };

        Ok(PartialConfig {
            segment_count: get("segment_count").and_then(|v| v.parse().ok()),
            samples_per_segment: get("samples_per_segment").and_then(|v| v.parse().ok()),
            top_k: get("top_k").and_then(|v| v.parse().ok()),
            analysis_max_dimension: get("analysis_max_dimension").and_then(|v| v.parse().ok()),
            jpeg_quality: get("jpeg_quality").and_then(|v| v.parse().ok()),
            log_level: config_parser
                .get("logging", "level")
                .or_else(|| config_parser.get("DEFAULT", "log_level"))
                .filter(|v| !v.is_empty()),
        })
    }

    /// 依次查找：当前目录、当前目录隐藏文件、用户主目录、/etc
    fn load_from_default_locations() -> Result<PartialConfig> {
        let mut candidates = vec![
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from(HIDDEN_CONFIG_FILE_NAME),
        ];
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(HIDDEN_CONFIG_FILE_NAME));
        }
        candidates.push(PathBuf::from("/etc").join(CONFIG_FILE_NAME));

        for candidate in candidates {
            if candidate.exists() {
                return Self::load_from_file(&candidate);
            }
        }

        Err(anyhow::anyhow!("未找到配置文件"))
    }

    /// 创建默认配置文件
    pub fn create_default_config(config_path: &Path) -> Result<()> {
        let defaults = SamplingConfig::default();
        let mut config_parser = configparser::ini::Ini::new();
        config_parser.set("sampling", "segment_count", Some(defaults.segment_count.to_string()));
        config_parser.set(
            "sampling",
            "samples_per_segment",
            Some(defaults.samples_per_segment.to_string()),
        );
        config_parser.set("sampling", "top_k", Some(defaults.top_k.to_string()));
        config_parser.set(
            "sampling",
            "analysis_max_dimension",
            Some(defaults.analysis_max_dimension.to_string()),
        );
        config_parser.set("sampling", "jpeg_quality", Some(defaults.jpeg_quality.to_string()));
        config_parser.set("logging", "level", Some("info".to_string()));

        config_parser
            .write(config_path)
            .map_err(|e| anyhow::anyhow!("写入配置文件失败: {}: {}", config_path.display(), e))?;

        Ok(())
    }
}
