use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frame_pick::config::{ConfigLoader, ConfigOverrides, SamplingConfig};
use frame_pick::{
    CancellationToken, ExtractionOutput, FfmpegSource, KeyframePipeline, ProcessingMetadata,
    VideoIdentity,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 商品视频抽帧工具 - 按时间段挑选最清晰的画面
#[derive(Parser, Debug)]
#[command(name = "frame-pick")]
#[command(about = "商品视频抽帧：分段评分、保留每段最清晰的帧并输出高清截图", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 处理本地视频文件
    Process {
        /// 输入视频文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// 输出目录
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// 配置文件路径（可选，.ini 格式）
        /// 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
        #[arg(long)]
        config: Option<PathBuf>,

        /// 时间段数
        #[arg(long)]
        segments: Option<u32>,

        /// 每段评分采样数
        #[arg(long)]
        samples: Option<u32>,

        /// 每段保留的帧数
        #[arg(long)]
        top_k: Option<u32>,

        /// 分析分辨率长边像素
        #[arg(long)]
        analysis_size: Option<u32>,

        /// 输出 JPEG 质量 (1-100)
        #[arg(long)]
        jpeg_quality: Option<u8>,

        /// 日志级别
        #[arg(long)]
        log_level: Option<String>,
    },
    /// 打印视频指纹
    Fingerprint {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// 生成默认配置文件
    InitConfig {
        #[arg(default_value = "frame-pick.ini")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Process {
            input,
            output,
            config: config_file,
            segments,
            samples,
            top_k,
            analysis_size,
            jpeg_quality,
            log_level,
        } => {
            let overrides = ConfigOverrides {
                segment_count: segments,
                samples_per_segment: samples,
                top_k,
                analysis_max_dimension: analysis_size,
                jpeg_quality,
                log_level,
            };
            let config = ConfigLoader::load_config(config_file.as_deref(), &overrides)
                .context("加载配置失败")?;
            init_logging(&config.log_level);

            info!(
                "使用配置: segments={}, samples={}, top_k={}, analysis={}px, jpeg_quality={}",
                config.sampling.segment_count,
                config.sampling.samples_per_segment,
                config.sampling.top_k,
                config.sampling.analysis_max_dimension,
                config.sampling.jpeg_quality
            );

            process(&input, &output, config.sampling).await?;
        }
        Commands::Fingerprint { input } => {
            let identity = VideoIdentity::from_path(&input)
                .with_context(|| format!("读取文件信息失败: {}", input.display()))?;
            println!("{}", identity.fingerprint());
        }
        Commands::InitConfig { path } => {
            ConfigLoader::create_default_config(&path)?;
            println!("已生成配置文件: {}", path.display());
        }
    }

    Ok(())
}

/// RUST_LOG 优先，否则使用配置中的日志级别
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn process(input: &Path, output_dir: &Path, sampling: SamplingConfig) -> Result<()> {
    let identity = VideoIdentity::from_path(input)
        .with_context(|| format!("读取文件信息失败: {}", input.display()))?;
    let source = FfmpegSource::new(input);

    // Ctrl-C 时在两次解码之间停止
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，正在取消...");
            ctrl_c_token.cancel();
        }
    });

    let mut progress = |percent: u8| {
        let bar_width = 30;
        let filled = usize::from(percent) * bar_width / 100;
        let bar = "█".repeat(filled) + &"░".repeat(bar_width - filled);
        print!("\r   📈 进度: [{}] {}%   ", bar, percent);
        io::stdout().flush().ok();
    };

    let pipeline = KeyframePipeline::new(sampling);
    let result = pipeline.run(&source, &identity, &mut progress, &cancel).await;
    println!();
    let output = result.with_context(|| format!("处理视频失败: {}", input.display()))?;

    write_output(input, output_dir, &output, pipeline.config())?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    input_video: String,
    config: &'a SamplingConfig,
    metadata: &'a ProcessingMetadata,
    keyframes: Vec<KeyframeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct KeyframeEntry<'a> {
    file: String,
    #[serde(flatten)]
    keyframe: &'a frame_pick::Keyframe,
}

/// 写出所有关键帧图片和 metadata.json
fn write_output(
    input: &Path,
    output_dir: &Path,
    output: &ExtractionOutput,
    config: &SamplingConfig,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("创建输出目录失败: {}", output_dir.display()))?;

    let mut entries = Vec::with_capacity(output.keyframes.len());
    for keyframe in &output.keyframes {
        let file = output.metadata.archive_file_name(keyframe);
        let path = output_dir.join(&file);
        std::fs::write(&path, keyframe.image())
            .with_context(|| format!("保存关键帧失败: {}", path.display()))?;
        entries.push(KeyframeEntry { file, keyframe });
    }

    let report = RunReport {
        input_video: input.to_string_lossy().to_string(),
        config,
        metadata: &output.metadata,
        keyframes: entries,
    };
    let metadata_path = output_dir.join("metadata.json");
    let json = serde_json::to_string_pretty(&report).context("序列化元数据失败")?;
    std::fs::write(&metadata_path, json)
        .with_context(|| format!("写入元数据文件失败: {}", metadata_path.display()))?;

    info!("📁 输出目录: {}", output_dir.display());
    info!(
        "📸 关键帧: {} 个（每段首选 {} 个）",
        output.keyframes.len(),
        output.primary_frames().count()
    );
    Ok(())
}
