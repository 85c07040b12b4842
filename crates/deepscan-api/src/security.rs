//! Input validation for client-supplied URLs and paths.
//!
//! - Video URLs: length cap, internal-address blocklist, platform pattern
//! - Media paths: everything a client names must stay inside the media root

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use deepscan_media::is_valid_url;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

/// Maximum URL length to prevent DoS attacks.
const MAX_URL_LENGTH: usize = 2048;

/// URL prefix under which the media root is served.
pub const MEDIA_URL_PREFIX: &str = "/media/";

/// Blocked URL patterns (internal and metadata hosts).
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(https?://)?127\.",
        r"^(https?://)?localhost",
        r"^(https?://)?10\.",
        r"^(https?://)?172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^(https?://)?192\.168\.",
        r"^(https?://)?169\.254\.",
        r"^(https?://)?metadata\.",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// A client-supplied path or URL was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityViolation {
    #[error("URL exceeds maximum length")]
    UrlTooLong,

    #[error("URL targets a blocked address")]
    BlockedUrl,

    #[error("URL is not a supported video link")]
    InvalidUrl,

    #[error("Path escapes the media directory")]
    PathTraversal,
}

/// Validate a video URL before handing it to a downloader.
pub fn validate_video_url(url: &str) -> Result<String, SecurityViolation> {
    let url = url.trim();

    if url.len() > MAX_URL_LENGTH {
        return Err(SecurityViolation::UrlTooLong);
    }

    let lowered = url.to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| p.is_match(&lowered)) {
        warn!(url = %url, "Blocked URL");
        return Err(SecurityViolation::BlockedUrl);
    }

    if !is_valid_url(url) {
        return Err(SecurityViolation::InvalidUrl);
    }

    Ok(url.to_string())
}

/// Resolve a client path to a file inside `root`.
///
/// Accepts a media URL (`/media/uploads/a.mp4`), an absolute path under
/// `root`, or a path relative to `root`. `root` should be absolute.
pub fn resolve_media_path(root: &Path, client_path: &str) -> Result<PathBuf, SecurityViolation> {
    let client_path = client_path.trim();
    if client_path.is_empty() || client_path.contains('\0') {
        return Err(SecurityViolation::PathTraversal);
    }

    let candidate = Path::new(client_path);
    let relative = if let Some(rest) = client_path.strip_prefix(MEDIA_URL_PREFIX) {
        PathBuf::from(rest)
    } else if candidate.is_absolute() {
        candidate
            .strip_prefix(root)
            .map_err(|_| SecurityViolation::PathTraversal)?
            .to_path_buf()
    } else {
        candidate.to_path_buf()
    };

    join_inside(root, &relative)
}

/// Resolve a bare file name inside `dir`. Any directory part is rejected.
pub fn resolve_file_name(dir: &Path, file_name: &str) -> Result<PathBuf, SecurityViolation> {
    let relative = Path::new(file_name.trim());
    if relative.components().count() != 1 {
        return Err(SecurityViolation::PathTraversal);
    }
    join_inside(dir, relative)
}

fn join_inside(root: &Path, relative: &Path) -> Result<PathBuf, SecurityViolation> {
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(SecurityViolation::PathTraversal);
    }

    let joined = root.join(relative);

    // Symlinks must not lead out of the root either
    if let (Ok(real), Ok(real_root)) = (joined.canonicalize(), root.canonicalize()) {
        if !real.starts_with(&real_root) {
            warn!(path = %joined.display(), "Symlink escapes media root");
            return Err(SecurityViolation::PathTraversal);
        }
    }

    Ok(joined)
}

/// Public URL of a file stored under `root`.
pub fn media_url(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(format!("{}{}", MEDIA_URL_PREFIX, parts.join("/")))
}
