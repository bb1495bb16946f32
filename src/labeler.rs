//! 可选的图像标注服务接口
//!
//! 流水线本身从不调用标注服务；调用方拿到结果后可以自行补充标签。

use crate::keyframe::Keyframe;
use async_trait::async_trait;
use tracing::warn;

/// 标注结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLabel {
    pub label: String,
    pub description: String,
}

/// 根据编码后的图像生成简短标签和描述
#[async_trait]
pub trait FrameLabeler: Send + Sync {
    async fn label(&self, image: &[u8]) -> anyhow::Result<FrameLabel>;
}

/// 依次为关键帧填写标签，返回成功数
///
/// 某一帧标注失败时保留调用方预设的 `label` / `description`，继续处理下一帧。
pub async fn apply_labels(keyframes: &mut [Keyframe], labeler: &dyn FrameLabeler) -> usize {
    let mut labelled = 0;
    for keyframe in keyframes.iter_mut() {
        match labeler.label(keyframe.image()).await {
            Ok(result) => {
                keyframe.label = Some(result.label);
                keyframe.description = Some(result.description);
                labelled += 1;
            }
            Err(e) => {
                warn!("⚠️  [标注] {} 标注失败，保留默认值: {}", keyframe.id(), e);
            }
        }
    }
    labelled
}
