use crate::error::{ExtractError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use serde::{Deserialize, Serialize};

/// 解码后的帧缓冲区（RGB24，alpha 已丢弃）
pub type FrameBuffer = RgbImage;

/// 帧尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 计算低分辨率分析尺寸
    ///
    /// 缩放系数为 `min(1, max_dimension / max(width, height))`，两个轴使用同一系数，
    /// 结果向下取整且不小于 1。原生尺寸不大于 `max_dimension` 时保持不变。
    pub fn analysis_size(&self, max_dimension: u32) -> FrameSize {
        let longest = self.width.max(self.height);
        if longest == 0 {
            return *self;
        }
        let scale = (f64::from(max_dimension) / f64::from(longest)).min(1.0);
        FrameSize {
            width: ((f64::from(self.width) * scale) as u32).max(1),
            height: ((f64::from(self.height) * scale) as u32).max(1),
        }
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 将高分辨率帧编码为 JPEG
pub fn encode_jpeg(frame: &FrameBuffer, quality: u8) -> Result<Vec<u8>> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ExtractError::ContextUnavailable(
            "无法编码空帧".to_string(),
        ));
    }

    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder.encode(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_size_downscales_longest_side() {
        let size = FrameSize::new(1920, 1080).analysis_size(640);
        assert_eq!(size, FrameSize::new(640, 360));

        let portrait = FrameSize::new(1080, 1920).analysis_size(640);
        assert_eq!(portrait, FrameSize::new(360, 640));
    }

    #[test]
    fn test_analysis_size_truncates() {
        // 1000 -> 640 的系数为 0.64，333 * 0.64 = 213.12
        let size = FrameSize::new(1000, 333).analysis_size(640);
        assert_eq!(size, FrameSize::new(640, 213));
    }

    #[test]
    fn test_analysis_size_never_upscales() {
        let size = FrameSize::new(320, 240).analysis_size(640);
        assert_eq!(size, FrameSize::new(320, 240));
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_header() {
        let frame = RgbImage::from_fn(32, 16, |x, y| image::Rgb([(x * 8) as u8, (y * 16) as u8, 0]));
        let bytes = encode_jpeg(&frame, 90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
