use crate::error::Result;
use crate::frame::{FrameBuffer, FrameSize};
use async_trait::async_trait;

/// 可解码的视频资源
///
/// 每次 `open` 返回一个独占的句柄，句柄只属于一次运行，不能在并发运行之间共享。
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// 打开视频资源，失败时返回 `SourceUnavailable`
    async fn open(&self) -> Result<Box<dyn VideoHandle>>;
}

/// 已打开的视频句柄
///
/// `seek_and_decode` 需要 `&mut self`，同一句柄上同时只能有一个解码请求在进行，
/// 保证帧与时间戳一一对应。
#[async_trait]
pub trait VideoHandle: Send {
    /// 视频时长（秒）
    fn duration_seconds(&self) -> f64;

    /// 原生分辨率
    fn native_size(&self) -> FrameSize;

    /// 跳转到 `time_seconds` 并解码一帧，输出尺寸必须正好是 `target`
    ///
    /// 调用方负责把时间限制在 `[0, duration)` 内，这里不做限制。
    async fn seek_and_decode(&mut self, time_seconds: f64, target: FrameSize)
        -> Result<FrameBuffer>;

    /// 释放解码器资源，可重复调用
    fn close(&mut self);
}
