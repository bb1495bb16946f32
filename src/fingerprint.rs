//! 视频指纹与会话时间戳
//!
//! 指纹只是给人看的短标签，用于命名输出文件，不是内容校验哈希：
//! 32 位多项式哈希截断到 4 个十六进制字符，不同视频发生碰撞是预期内的，
//! 下游不能把它当作唯一键。

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// 指纹长度（十六进制字符数）
pub const FINGERPRINT_LEN: usize = 4;

/// 会话时间戳格式，可直接用于文件名
pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// 视频的身份三元组，用于计算指纹
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoIdentity {
    pub name: String,
    pub size_bytes: u64,
    pub last_modified_epoch_millis: i64,
}

impl VideoIdentity {
    pub fn new(name: impl Into<String>, size_bytes: u64, last_modified_epoch_millis: i64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            last_modified_epoch_millis,
        }
    }

    /// 从本地文件的元数据读取（文件名、字节数、修改时间）
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let modified = metadata.modified()?;
        let last_modified_epoch_millis = match modified.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_millis() as i64,
            Err(before) => -(before.duration().as_millis() as i64),
        };

        Ok(Self::new(name, metadata.len(), last_modified_epoch_millis))
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.name, self.size_bytes, self.last_modified_epoch_millis)
    }
}

/// 由视频的 (文件名, 字节数, 修改时间) 计算 4 位大写十六进制指纹
///
/// 纯函数：相同输入永远得到相同输出，与调用时间无关。
pub fn fingerprint(name: &str, size_bytes: u64, last_modified_epoch_millis: i64) -> String {
    let source = format!("{}{}{}", name, size_bytes, last_modified_epoch_millis);
    display_hash(&source)
}

/// `hash = hash * 31 + code_unit`，按 UTF-16 码元累加，32 位有符号回绕
fn polynomial_hash(source: &str) -> i32 {
    source
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

fn display_hash(source: &str) -> String {
    // 先扩展到 i64 再取绝对值，i32::MIN 不会溢出
    let magnitude = i64::from(polynomial_hash(source)).unsigned_abs();
    let hex = format!("{:X}", magnitude);
    let truncated: String = hex.chars().take(FINGERPRINT_LEN).collect();
    format!("{:0>width$}", truncated, width = FINGERPRINT_LEN)
}

/// 当前时刻的会话时间戳，用来区分同一视频的多次运行
pub fn session_timestamp() -> String {
    session_timestamp_at(&Local::now())
}

pub fn session_timestamp_at(at: &DateTime<Local>) -> String {
    at.format(SESSION_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_polynomial_hash_matches_reference_values() {
        assert_eq!(polynomial_hash(""), 0);
        assert_eq!(polynomial_hash("a"), 97);
        assert_eq!(polynomial_hash("ab"), 3105);
        assert_eq!(polynomial_hash("product.mp410485761700000000000"), 848_473_675);
    }

    #[test]
    fn test_fingerprint_truncates_to_leading_chars() {
        // 848473675 = 0x3292AE4B
        assert_eq!(fingerprint("product.mp4", 1_048_576, 1_700_000_000_000), "3292");
        // 非 ASCII 文件名按 UTF-16 码元计算，750020747 = 0x2CB4688B
        assert_eq!(fingerprint("商品.mov", 2048, -5), "2CB4");
    }

    #[test]
    fn test_short_hash_is_zero_padded() {
        assert_eq!(display_hash(""), "0000");
        assert_eq!(display_hash("a"), "0061");
        assert_eq!(display_hash("ab"), "0C21");
    }

    #[test]
    fn test_fingerprint_is_pure() {
        let first = fingerprint("clip.mp4", 42, 1_600_000_000_123);
        let second = fingerprint("clip.mp4", 42, 1_600_000_000_123);
        assert_eq!(first, second);
        assert_eq!(first.len(), FINGERPRINT_LEN);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_identity_from_path_reads_file_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, [0u8; 1234]).unwrap();

        let identity = VideoIdentity::from_path(&path).unwrap();
        assert_eq!(identity.name, "clip.mp4");
        assert_eq!(identity.size_bytes, 1234);
        assert!(identity.last_modified_epoch_millis > 0);
        assert_eq!(
            identity.fingerprint(),
            fingerprint("clip.mp4", 1234, identity.last_modified_epoch_millis)
        );
    }

    #[test]
    fn test_session_timestamp_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(session_timestamp_at(&at), "20240309-070501");
    }
}
