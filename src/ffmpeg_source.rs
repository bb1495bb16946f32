use crate::error::{ExtractError, Result};
use crate::frame::{FrameBuffer, FrameSize};
use crate::video_source::{VideoHandle, VideoSource};
use async_trait::async_trait;
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 单次 seek 后最多读取的数据包数，防止在损坏的文件上无限读取
const MAX_PACKETS_PER_SEEK: usize = 600;

/// 基于 FFmpeg 的视频源
pub struct FfmpegSource {
    path: PathBuf,
}

impl FfmpegSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl VideoSource for FfmpegSource {
    async fn open(&self) -> Result<Box<dyn VideoHandle>> {
        let path = self.path.clone();
        let handle = tokio::task::spawn_blocking(move || FfmpegHandle::open_blocking(path))
            .await
            .map_err(|e| ExtractError::SourceUnavailable(format!("打开任务异常退出: {}", e)))??;
        Ok(Box::new(handle))
    }
}

/// 解码器状态，在阻塞任务之间来回移动
struct DecoderState {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    /// 相邻帧的时间间隔（秒）
    frame_interval: f64,
    /// 流的起始时间（秒），对外的时间轴从 0 开始
    start_offset: f64,
}

/// 一次 seek 后读包循环的结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    EndOfStream,
    PacketLimit,
}

/// FFmpeg 视频句柄
pub struct FfmpegHandle {
    path: PathBuf,
    state: Option<DecoderState>,
    duration: f64,
    size: FrameSize,
}

impl FfmpegHandle {
    fn open_blocking(path: PathBuf) -> Result<Self> {
        ffmpeg::init()
            .map_err(|e| ExtractError::SourceUnavailable(format!("初始化 FFmpeg 失败: {}", e)))?;

        // 只保留错误级别的 FFmpeg 日志
        unsafe {
            ffmpeg::sys::av_log_set_level(ffmpeg::sys::AV_LOG_ERROR as i32);
        }

        let unavailable =
            |what: &str, e: ffmpeg::Error| ExtractError::SourceUnavailable(format!("{}: {}", what, e));

        let input = ffmpeg::format::input(&path).map_err(|e| unavailable("无法打开视频文件", e))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| ExtractError::SourceUnavailable("未找到视频流".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let fps = stream.avg_frame_rate();
        let fps_value = if fps.denominator() > 0 && fps.numerator() > 0 {
            f64::from(fps.numerator()) / f64::from(fps.denominator())
        } else {
            30.0
        };

        // 容器时长缺失时退回到流时长
        let duration = if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else if stream.duration() > 0 {
            stream.duration() as f64 * f64::from(time_base.numerator())
                / f64::from(time_base.denominator())
        } else {
            0.0
        };

        // MPEG-TS 等容器的时间戳不从 0 开始
        let start_offset = if stream.start_time() != ffmpeg::ffi::AV_NOPTS_VALUE {
            pts_to_seconds(stream.start_time(), time_base, 0.0)
        } else {
            0.0
        };

        let decoder_context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| unavailable("无法创建解码器上下文", e))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|e| unavailable("无法创建视频解码器", e))?;

        let size = FrameSize::new(decoder.width(), decoder.height());
        debug!(
            "[视频源] 已打开 {}: {:.2}s, {}, {:.2} fps, 起始 {:.3}s",
            path.display(),
            duration,
            size,
            fps_value,
            start_offset
        );

        Ok(Self {
            path,
            state: Some(DecoderState {
                input,
                decoder,
                stream_index,
                time_base,
                frame_interval: 1.0 / fps_value,
                start_offset,
            }),
            duration,
            size,
        })
    }
}

#[async_trait]
impl VideoHandle for FfmpegHandle {
    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn native_size(&self) -> FrameSize {
        self.size
    }

    async fn seek_and_decode(&mut self, time_seconds: f64, target: FrameSize) -> Result<FrameBuffer> {
        let mut state = self.state.take().ok_or_else(|| {
            ExtractError::SourceUnavailable(format!("句柄已关闭: {}", self.path.display()))
        })?;

        let (state, frame) = tokio::task::spawn_blocking(move || {
            let frame = state.decode_at(time_seconds, target);
            (state, frame)
        })
        .await
        .map_err(|e| ExtractError::DecodeFailed {
            time: time_seconds,
            reason: format!("解码任务异常退出: {}", e),
        })?;

        self.state = Some(state);
        frame
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            debug!("[视频源] 已释放解码器: {}", self.path.display());
        }
    }
}

impl Drop for FfmpegHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl DecoderState {
    /// 跳转到目标时间之前最近的关键帧，向后解码直到到达目标时间
    fn decode_at(&mut self, time_seconds: f64, target: FrameSize) -> Result<FrameBuffer> {
        let DecoderState {
            input,
            decoder,
            stream_index,
            time_base,
            frame_interval,
            start_offset,
        } = self;
        let time_base = *time_base;
        let start_offset = *start_offset;

        let timestamp = seek_timestamp(time_seconds, start_offset);
        input
            .seek(timestamp, ..timestamp)
            .map_err(|e| ExtractError::SeekFailed {
                time: time_seconds,
                reason: e.to_string(),
            })?;
        decoder.flush();

        let tolerance = *frame_interval / 2.0;
        let reached = |frame: &ffmpeg::frame::Video| {
            frame_time(frame, time_base, start_offset)
                .map(|t| t + tolerance >= time_seconds)
                .unwrap_or(true)
        };

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut last = ffmpeg::frame::Video::empty();
        let mut have_last = false;
        let mut packets_read = 0;
        let mut end = ReadEnd::EndOfStream;

        for (stream, packet) in input.packets() {
            if stream.index() != *stream_index {
                continue;
            }
            packets_read += 1;
            if packets_read > MAX_PACKETS_PER_SEEK {
                end = ReadEnd::PacketLimit;
                break;
            }
            if let Err(e) = decoder.send_packet(&packet) {
                warn!("⚠️  [视频源] 数据包解码失败 @ {:.3}s，跳过: {}", time_seconds, e);
                continue;
            }

            while decoder.receive_frame(&mut decoded).is_ok() {
                if reached(&decoded) {
                    return scale(&decoded, time_seconds, target);
                }
                std::mem::swap(&mut decoded, &mut last);
                have_last = true;
            }
        }

        // 文件末尾：冲刷解码器中剩余的帧
        if end == ReadEnd::EndOfStream && decoder.send_eof().is_ok() {
            while decoder.receive_frame(&mut decoded).is_ok() {
                if reached(&decoded) {
                    return scale(&decoded, time_seconds, target);
                }
                std::mem::swap(&mut decoded, &mut last);
                have_last = true;
            }
        }

        check_fallback(end, have_last, time_seconds)?;
        scale(&last, time_seconds, target)
    }
}

/// 没有帧到达目标时间时，只有真正读到文件末尾才允许退回最后一帧
fn check_fallback(end: ReadEnd, have_last: bool, time_seconds: f64) -> Result<()> {
    match (end, have_last) {
        (ReadEnd::EndOfStream, true) => Ok(()),
        (ReadEnd::EndOfStream, false) => Err(ExtractError::DecodeFailed {
            time: time_seconds,
            reason: "目标时间附近没有可解码的帧".to_string(),
        }),
        (ReadEnd::PacketLimit, _) => Err(ExtractError::DecodeFailed {
            time: time_seconds,
            reason: format!("读取 {} 个数据包后仍未到达目标时间", MAX_PACKETS_PER_SEEK),
        }),
    }
}

/// 对外时间（秒）转换为容器 seek 使用的 AV_TIME_BASE 时间戳
fn seek_timestamp(time_seconds: f64, start_offset: f64) -> i64 {
    ((time_seconds + start_offset) * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64
}

fn pts_to_seconds(pts: i64, time_base: ffmpeg::Rational, start_offset: f64) -> f64 {
    pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
        - start_offset
}

fn frame_time(
    frame: &ffmpeg::frame::Video,
    time_base: ffmpeg::Rational,
    start_offset: f64,
) -> Option<f64> {
    frame
        .timestamp()
        .map(|ts| pts_to_seconds(ts, time_base, start_offset))
}

/// 缩放并转换为 RGB24
fn scale(frame: &ffmpeg::frame::Video, time_seconds: f64, target: FrameSize) -> Result<FrameBuffer> {
    let mut scaler = ffmpeg::software::scaling::Context::get(
        frame.format(),
        frame.width(),
        frame.height(),
        ffmpeg::format::Pixel::RGB24,
        target.width,
        target.height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| ExtractError::ContextUnavailable(format!("无法创建缩放器: {}", e)))?;

    let mut rgb_frame = ffmpeg::frame::Video::empty();
    scaler
        .run(frame, &mut rgb_frame)
        .map_err(|e| ExtractError::DecodeFailed {
            time: time_seconds,
            reason: format!("缩放失败: {}", e),
        })?;

    frame_to_buffer(&rgb_frame, target)
}

/// RGB24 帧按行拷贝（去掉 stride 填充）
fn frame_to_buffer(frame: &ffmpeg::frame::Video, target: FrameSize) -> Result<FrameBuffer> {
    let data = frame.data(0);
    let stride = frame.stride(0);
    let row_bytes = target.width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * target.height as usize);
    for y in 0..target.height as usize {
        let start = y * stride;
        let row = data.get(start..start + row_bytes).ok_or_else(|| {
            ExtractError::ContextUnavailable(format!("RGB 帧数据长度不足: 第 {} 行", y))
        })?;
        pixels.extend_from_slice(row);
    }

    FrameBuffer::from_raw(target.width, target.height, pixels)
        .ok_or_else(|| ExtractError::ContextUnavailable(format!("无法构建 {} 帧缓冲区", target)))
}
