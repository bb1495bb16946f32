//! 清晰度评分
//!
//! 评分 = 灰度图离散拉普拉斯响应的方差，值越大画面越清晰。
//!
//! 算法细节（评分结果会被跨帧比较，改动任何一步都会改变排序结果）：
//! 1. 按 `0.299 R + 0.587 G + 0.114 B` 转为灰度，忽略 alpha
//! 2. 对去掉一像素边框后的内部像素计算四邻域拉普拉斯
//! 3. 均值 = 全部内部响应之和 / 内部像素数
//! 4. 方差只累加非零响应，但分母仍然是内部像素数。大面积平坦或模糊的区域
//!    会产生大量恰好为 0 的响应，这一步把它们排除在外作为粗略的边缘过滤

use image::{GenericImageView, Pixel};

/// 清晰度评分器，纯函数，无内部状态
#[derive(Debug, Clone, Copy, Default)]
pub struct SharpnessScorer;

impl SharpnessScorer {
    pub fn new() -> Self {
        Self
    }

    /// 计算一帧的清晰度评分
    ///
    /// 内部像素为空（宽或高不大于 2）时返回 0。
    pub fn score<I>(&self, frame: &I) -> f64
    where
        I: GenericImageView,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let (width, height) = frame.dimensions();
        let luma = luminance(frame);
        laplacian_variance(&luma, width as usize, height as usize)
    }
}

/// 转为单通道灰度缓冲区（行优先）
fn luminance<I>(frame: &I) -> Vec<f64>
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = frame.dimensions();
    let mut luma = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let rgb = frame.get_pixel(x, y).to_rgb();
            luma.push(
                0.299 * f64::from(rgb[0]) + 0.587 * f64::from(rgb[1]) + 0.114 * f64::from(rgb[2]),
            );
        }
    }
    luma
}

fn laplacian_variance(luma: &[f64], width: usize, height: usize) -> f64 {
    if width < 3 || height < 3 {
        return 0.0;
    }

    let interior_count = ((width - 2) * (height - 2)) as f64;
    let mut responses = Vec::with_capacity((width - 2) * (height - 2));

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = luma[y * width + x];
            // 与 -4c + l + r + u + d 代数相等，但有意写成逐项与中心相减：
            // 浮点舍入不会在平坦区域留下非零残差，非零过滤才可靠
            let response = (luma[y * width + x - 1] - center)
                + (luma[y * width + x + 1] - center)
                + (luma[(y - 1) * width + x] - center)
                + (luma[(y + 1) * width + x] - center);
            responses.push(response);
        }
    }

    let mean = responses.iter().sum::<f64>() / interior_count;
    responses
        .iter()
        .filter(|&&r| r != 0.0)
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / interior_count
}
