//! 分段采样流水线
//!
//! 每次运行的状态：`Idle → Opening → Sampling(1..N) → Finalizing → Done`，
//! 任何非终止状态出错都进入 `Failed`。
//!
//! 每段两个阶段：
//! 1. 评分：在段内等间隔取样，低分辨率解码后计算清晰度
//! 2. 捕获：按评分从高到低，对选中的时间点做原生分辨率解码并编码为 JPEG
//!
//! 解码严格串行，同一时刻句柄上只有一个请求。运行要么完整成功，要么失败且不返回任何关键帧。

use crate::config::SamplingConfig;
use crate::error::{ExtractError, Result};
use crate::fingerprint::{session_timestamp, VideoIdentity};
use crate::frame::{encode_jpeg, FrameBuffer, FrameSize};
use crate::keyframe::{ExtractionOutput, Keyframe, ProcessingMetadata};
use crate::progress::{
    scoring_progress, CancellationToken, ProgressReporter, ProgressSink, COMPLETE_PROGRESS,
};
use crate::sharpness::SharpnessScorer;
use crate::video_source::{VideoHandle, VideoSource};
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 一个候选时间点及其评分，只在单段评分期间存在
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time_seconds: f64,
    pub score: f64,
}

/// 按评分降序取前 `k` 个样本
///
/// 稳定排序：评分相同的样本保持原有的时间顺序，较早的排名更靠前。
pub fn select_top_k(samples: &[Sample], k: usize) -> Vec<Sample> {
    let mut ranked = samples.to_vec();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}

/// 流水线运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Opening,
    Sampling { segment: u32 },
    Finalizing,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// 单次运行的上下文，由调用方的栈持有
struct RunContext {
    state: RunState,
}

impl RunContext {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!("[抽帧] 状态 {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, error: &ExtractError) {
        warn!("❌ [抽帧] 运行失败（状态 {:?}）: {}", self.state, error);
        self.state = RunState::Failed;
    }
}

/// 持有句柄，离开作用域时释放（成功、失败、取消或 future 被丢弃都一样）
struct HandleGuard(Box<dyn VideoHandle>);

impl HandleGuard {
    fn handle(&mut self) -> &mut dyn VideoHandle {
        self.0.as_mut()
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// 关键帧抽取流水线
#[derive(Debug, Clone)]
pub struct KeyframePipeline {
    config: SamplingConfig,
    scorer: SharpnessScorer,
}

impl Default for KeyframePipeline {
    fn default() -> Self {
        Self::new(SamplingConfig::default())
    }
}

impl KeyframePipeline {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            scorer: SharpnessScorer::new(),
        }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// 执行一次完整运行
    ///
    /// 进度在每个评分样本完成后上报一次（最多到 80），成功时最后上报一次 100。
    /// 配置不合法时直接返回 `InvalidConfig`，不会打开视频源。
    /// 失败或取消时返回错误，不返回部分关键帧；句柄在所有路径上都会释放。
    pub async fn run(
        &self,
        source: &dyn VideoSource,
        identity: &VideoIdentity,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput> {
        let mut ctx = RunContext::new();
        // 参数不合法时不打开视频源，也不上报任何进度
        if let Err(e) = self.config.validate() {
            let error = ExtractError::InvalidConfig(e.to_string());
            ctx.fail(&error);
            return Err(error);
        }

        let session = session_timestamp();
        let started = Instant::now();
        info!("🎬 [抽帧] 开始处理视频: {} (会话 {})", identity.name, session);

        ctx.transition(RunState::Opening);
        let result = match source.open().await {
            Ok(handle) => {
                let mut guard = HandleGuard(handle);
                self.run_opened(guard.handle(), identity, session, &mut ctx, progress, cancel)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                ctx.transition(RunState::Done);
                info!(
                    "✅ [抽帧] 处理完成: {} 个关键帧, 指纹 {}, 总耗时 {:.2}秒",
                    output.keyframes.len(),
                    output.metadata.video_fingerprint,
                    started.elapsed().as_secs_f64()
                );
                Ok(output)
            }
            Err(e) => {
                ctx.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_opened(
        &self,
        handle: &mut dyn VideoHandle,
        identity: &VideoIdentity,
        session: String,
        ctx: &mut RunContext,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput> {
        let duration = handle.duration_seconds();
        let native = handle.native_size();
        // NaN 也在这里被拒绝
        if !(duration > 0.0 && duration.is_finite()) || native.is_empty() {
            return Err(ExtractError::InvalidDuration {
                duration,
                width: native.width,
                height: native.height,
            });
        }

        let analysis = native.analysis_size(self.config.analysis_max_dimension);
        let segment_count = self.config.segment_count;
        let samples_per_segment = self.config.samples_per_segment;
        let keep = self.config.keep_per_segment() as usize;
        let segment_duration = duration / f64::from(segment_count);
        let sample_step = segment_duration / f64::from(samples_per_segment);
        let total_samples = self.config.total_samples();

        info!(
            "  • 时长 {:.2}s, 原生 {}, 分析 {}, {} 段 x {} 采样, 每段保留 {}",
            duration, native, analysis, segment_count, samples_per_segment, keep
        );

        let mut reporter = ProgressReporter::new(progress);
        let mut completed = 0usize;
        let mut keyframes = Vec::with_capacity(segment_count as usize * keep);

        for segment in 1..=segment_count {
            ctx.transition(RunState::Sampling { segment });
            let segment_start = f64::from(segment - 1) * segment_duration;
            let segment_started = Instant::now();

            // 阶段 1：低分辨率评分
            let mut samples = Vec::with_capacity(samples_per_segment as usize);
            for i in 0..samples_per_segment {
                ensure_not_cancelled(cancel)?;
                let time = clamp_time(segment_start + f64::from(i) * sample_step, duration);
                let frame = handle.seek_and_decode(time, analysis).await?;
                ensure_size(&frame, analysis, time)?;

                let score = self.scorer.score(&frame);
                samples.push(Sample {
                    time_seconds: time,
                    score,
                });
                completed += 1;
                reporter.report(scoring_progress(completed, total_samples));
                debug!("[抽帧] 段 {} 样本 {} @ {:.3}s 评分 {:.2}", segment, i, time, score);
            }

            // 阶段 2：按名次做原生分辨率捕获
            let selected = select_top_k(&samples, keep);
            for (rank, sample) in (1u32..).zip(selected.iter()) {
                ensure_not_cancelled(cancel)?;
                let frame = handle.seek_and_decode(sample.time_seconds, native).await?;
                ensure_size(&frame, native, sample.time_seconds)?;
                let image = encode_jpeg(&frame, self.config.jpeg_quality)?;
                keyframes.push(Keyframe::assemble(
                    sample.time_seconds,
                    sample.score,
                    segment,
                    rank,
                    image,
                ));
            }

            info!(
                "📸 [抽帧] 段 {}/{} 完成: 最佳 {:.3}s (评分 {:.2}), 耗时 {:.2}秒",
                segment,
                segment_count,
                selected.first().map_or(0.0, |s| s.time_seconds),
                selected.first().map_or(0.0, |s| s.score),
                segment_started.elapsed().as_secs_f64()
            );
        }

        ctx.transition(RunState::Finalizing);
        let metadata = ProcessingMetadata {
            video_fingerprint: identity.fingerprint(),
            session_timestamp: session,
        };
        reporter.report(COMPLETE_PROGRESS);

        Ok(ExtractionOutput {
            keyframes,
            metadata,
        })
    }
}

/// 使用给定配置执行一次运行
pub async fn extract_keyframes(
    source: &dyn VideoSource,
    identity: &VideoIdentity,
    config: &SamplingConfig,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<ExtractionOutput> {
    KeyframePipeline::new(config.clone())
        .run(source, identity, progress, cancel)
        .await
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ExtractError::Cancelled);
    }
    Ok(())
}

fn ensure_size(frame: &FrameBuffer, expected: FrameSize, time: f64) -> Result<()> {
    if frame.dimensions() != (expected.width, expected.height) {
        return Err(ExtractError::DecodeFailed {
            time,
            reason: format!(
                "帧尺寸 {}x{} 与请求的 {} 不一致",
                frame.width(),
                frame.height(),
                expected
            ),
        });
    }
    Ok(())
}

/// 把时间限制在 `[0, duration)` 内
fn clamp_time(time: f64, duration: f64) -> f64 {
    if time <= 0.0 {
        0.0
    } else if time >= duration {
        // 小于 duration 的最大浮点数
        f64::from_bits(duration.to_bits() - 1)
    } else {
        time
    }
}
