use thiserror::Error;

/// 抽帧流程中的错误类型
///
/// 任何解码层错误都会终止整次运行，不返回部分结果。
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 无法打开容器、解码或读取元数据
    #[error("视频源不可用: {0}")]
    SourceUnavailable(String),

    /// 时长非正或分辨率为零
    #[error("无效的视频时长或尺寸: duration={duration}s, size={width}x{height}")]
    InvalidDuration { duration: f64, width: u32, height: u32 },

    #[error("跳转到 {time:.3}s 失败: {reason}")]
    SeekFailed { time: f64, reason: String },

    #[error("解码 {time:.3}s 处的帧失败: {reason}")]
    DecodeFailed { time: f64, reason: String },

    /// 分析/绘制缓冲区无法分配（包括编码输出图像失败）
    #[error("分析上下文不可用: {0}")]
    ContextUnavailable(String),

    /// 抽帧参数不合法（段数、采样数、top_k 等为 0）
    #[error("无效的抽帧参数: {0}")]
    InvalidConfig(String),

    #[error("运行已取消")]
    Cancelled,

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for ExtractError {
    fn from(err: image::ImageError) -> Self {
        ExtractError::ContextUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = ExtractError::DecodeFailed {
            time: 1.5,
            reason: "eof".to_string(),
        };
        assert_eq!(err.to_string(), "解码 1.500s 处的帧失败: eof");

        let err = ExtractError::InvalidDuration {
            duration: 0.0,
            width: 1920,
            height: 1080,
        };
        assert!(err.to_string().contains("1920x1080"));
    }
}
