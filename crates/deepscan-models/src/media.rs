//! Media file naming and kind detection.

use serde::{Deserialize, Serialize};

/// Video extensions accepted by the upload endpoint.
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Image extensions analyzed as a single face.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Video extensions analyzed through the full pipeline.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv"];

/// File name used when sanitizing leaves nothing behind.
const FALLBACK_FILE_NAME: &str = "upload";

/// How a stored media file should be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Unsupported,
}

impl MediaKind {
    /// Classify a file by its extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Self {
        match extension_of(name) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Video,
            _ => MediaKind::Unsupported,
        }
    }
}

/// Lower-cased extension without the dot.
fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check whether an uploaded file name carries an accepted video extension.
pub fn has_allowed_upload_extension(name: &str) -> bool {
    extension_of(name)
        .map(|ext| ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Sanitize a client-supplied file name for storage.
///
/// Every character that is not ASCII alphanumeric, `.`, `_` or `-` becomes
/// `_`. Leading dots are stripped so the result is never hidden and never a
/// relative path component.
pub fn sanitize_file_name(name: &str) -> String {
    // Browsers may send a full client path; keep only the last component.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let replaced: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_file_name("face.JPG"), MediaKind::Image);
        assert_eq!(MediaKind::from_file_name("face.png"), MediaKind::Image);
        assert_eq!(MediaKind::from_file_name("clip.webm"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("clip.MOV"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("notes.txt"), MediaKind::Unsupported);
        assert_eq!(MediaKind::from_file_name("mp4"), MediaKind::Unsupported);
        assert_eq!(MediaKind::from_file_name(".mp4"), MediaKind::Unsupported);
    }

    #[test]
    fn test_allowed_upload_extension() {
        assert!(has_allowed_upload_extension("video.mp4"));
        assert!(has_allowed_upload_extension("VIDEO.MKV"));
        assert!(has_allowed_upload_extension("a.b.avi"));
        assert!(!has_allowed_upload_extension("video.webm"));
        assert!(!has_allowed_upload_extension("video"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my video (1).mp4"), "my_video__1_.mp4");
        assert_eq!(sanitize_file_name("clip-01_final.mov"), "clip-01_final.mov");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("...hidden.mp4"), "hidden.mp4");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name("ビデオ.mp4"), "___.mp4");
    }
}
