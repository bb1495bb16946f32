use serde::{Serialize, Serializer};

/// 由段号和名次生成稳定的关键帧 ID
pub fn keyframe_id(segment_index: u32, rank_index: u32) -> String {
    format!("p{}_r{}", segment_index, rank_index)
}

/// 保留下来的高分辨率关键帧，创建后不可变
#[derive(Debug, Clone, Serialize)]
pub struct Keyframe {
    id: String,
    /// 编码后的图像（JPEG），JSON 中只记录字节数
    #[serde(rename = "image_bytes", serialize_with = "serialize_len")]
    image: Vec<u8>,
    time_seconds: f64,
    score: f64,
    segment_index: u32,
    rank_index: u32,
    /// 可选标注服务填写，默认由调用方指定
    pub label: Option<String>,
    pub description: Option<String>,
}

fn serialize_len<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(bytes.len() as u64)
}

impl Keyframe {
    /// 打包一帧捕获结果
    pub fn assemble(
        time_seconds: f64,
        score: f64,
        segment_index: u32,
        rank_index: u32,
        image: Vec<u8>,
    ) -> Self {
        Self {
            id: keyframe_id(segment_index, rank_index),
            image,
            time_seconds,
            score,
            segment_index,
            rank_index,
            label: None,
            description: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn into_image(self) -> Vec<u8> {
        self.image
    }

    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// 段号，从 1 开始
    pub fn segment_index(&self) -> u32 {
        self.segment_index
    }

    /// 段内名次，1 为该段评分最高的帧
    pub fn rank_index(&self) -> u32 {
        self.rank_index
    }
}

/// 一次运行的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingMetadata {
    pub video_fingerprint: String,
    pub session_timestamp: String,
}

impl ProcessingMetadata {
    /// 输出文件名：`{指纹}_{会话时间}_{关键帧ID}.jpg`
    pub fn archive_file_name(&self, keyframe: &Keyframe) -> String {
        format!(
            "{}_{}_{}.jpg",
            self.video_fingerprint,
            self.session_timestamp,
            keyframe.id()
        )
    }
}

/// 运行结果：按段号、名次排序的关键帧和元数据
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub keyframes: Vec<Keyframe>,
    pub metadata: ProcessingMetadata,
}

impl ExtractionOutput {
    /// 每段名次为 1 的关键帧（归档、相册分享使用这一子集）
    pub fn primary_frames(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.iter().filter(|k| k.rank_index == 1)
    }

    /// 指定段的关键帧，按名次排序
    pub fn segment(&self, segment_index: u32) -> impl Iterator<Item = &Keyframe> {
        self.keyframes
            .iter()
            .filter(move |k| k.segment_index == segment_index)
    }
}
