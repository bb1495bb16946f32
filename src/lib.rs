pub mod config;
pub mod error;
pub mod ffmpeg_source;
pub mod fingerprint;
pub mod frame;
pub mod keyframe;
pub mod labeler;
pub mod progress;
pub mod sampler;
pub mod sharpness;
pub mod video_source;

pub use config::{AppConfig, ConfigLoader, ConfigOverrides, SamplingConfig};
pub use error::{ExtractError, Result};
pub use ffmpeg_source::FfmpegSource;
pub use fingerprint::{fingerprint, session_timestamp, VideoIdentity};
pub use frame::{encode_jpeg, FrameBuffer, FrameSize};
pub use keyframe::{keyframe_id, ExtractionOutput, Keyframe, ProcessingMetadata};
pub use labeler::{apply_labels, FrameLabel, FrameLabeler};
pub use progress::{scoring_progress, CancellationToken, NoProgress, ProgressSink};
pub use sampler::{extract_keyframes, select_top_k, KeyframePipeline, RunState, Sample};
pub use sharpness::SharpnessScorer;
pub use video_source::{VideoHandle, VideoSource};
