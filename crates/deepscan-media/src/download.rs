//! Remote video download.
//!
//! Direct links to video files are streamed with `reqwest`. Anything else
//! (social media and video platform pages) goes through yt-dlp.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use deepscan_models::sanitize_file_name;

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Extensions treated as a direct video link.
const DIRECT_MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv"];

/// Upper bound for a direct download.
pub const MAX_DIRECT_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// yt-dlp output template, relative to the destination directory.
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn url_pattern() -> &'static Regex {
    URL_PATTERN.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.)?([a-zA-Z0-9.-]+)\.(com|net|org)/")
            .unwrap_or_else(|e| panic!("invalid URL pattern: {e}"))
    })
}

/// Check whether a URL looks like a downloadable video page.
///
/// Accepts optional scheme and `www.`, then a host ending in `.com`, `.net`
/// or `.org` followed by a path.
pub fn is_valid_url(url: &str) -> bool {
    url_pattern().is_match(url.trim())
}

/// Check whether a URL points straight at a video file.
pub fn is_direct_media_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| DIRECT_MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Download a video into `dest_dir`, returning the stored file path.
pub async fn download_video(url: &str, dest_dir: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let url = url.trim();
    let dest_dir = dest_dir.as_ref();

    if !is_valid_url(url) {
        return Err(MediaError::InvalidUrl(url.to_string()));
    }

    tokio::fs::create_dir_all(dest_dir).await?;

    if is_direct_media_url(url) {
        download_direct(url, dest_dir).await
    } else {
        download_with_ytdlp(url, dest_dir).await
    }
}

/// Stream a direct video link to disk.
pub async fn download_direct(url: &str, dest_dir: &Path) -> MediaResult<PathBuf> {
    let parsed = Url::parse(url).map_err(|_| MediaError::InvalidUrl(url.to_string()))?;
    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize_file_name)
        .unwrap_or_else(|| sanitize_file_name(""));
    let output_path = dest_dir.join(file_name);

    info!(url = %url, output = %output_path.display(), "Downloading video over HTTP");

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| MediaError::download_failed(format!("HTTP client: {e}")))?;

    let mut response = client
        .get(parsed)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| MediaError::download_failed(e.to_string()))?;

    if let Some(len) = response.content_length() {
        if len > MAX_DIRECT_DOWNLOAD_BYTES {
            return Err(MediaError::download_failed(format!(
                "Remote file too large ({len} bytes)"
            )));
        }
    }

    let mut file = tokio::fs::File::create(&output_path).await?;
    let mut written: u64 = 0;

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&output_path).await;
                return Err(MediaError::download_failed(e.to_string()));
            }
        };

        written += chunk.len() as u64;
        if written > MAX_DIRECT_DOWNLOAD_BYTES {
            drop(file);
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(MediaError::download_failed("Remote file too large"));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        let _ = tokio::fs::remove_file(&output_path).await;
        return Err(MediaError::download_failed("Remote file is empty"));
    }

    info!(
        output = %output_path.display(),
        size_mb = written as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );

    Ok(output_path)
}

/// Download a platform video with yt-dlp.
pub async fn download_with_ytdlp(url: &str, dest_dir: &Path) -> MediaResult<PathBuf> {
    check_ytdlp()?;

    let template = dest_dir.join(OUTPUT_TEMPLATE);
    let template = template.to_string_lossy();

    info!(url = %url, dest = %dest_dir.display(), "Downloading video with yt-dlp");

    let args = ytdlp_args(&template, url);
    let output = Command::new("yt-dlp")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);

        let error_msg = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("Unknown error");
        warn!(url = %url, error = %error_msg, "yt-dlp download failed");

        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            error_msg
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let output_path = parse_printed_path(&stdout)
        .ok_or_else(|| MediaError::download_failed("yt-dlp did not report an output file"))?;

    if !output_path.exists() {
        return Err(MediaError::download_failed("Output file not created"));
    }

    let file_size = output_path.metadata()?.len();
    info!(
        output = %output_path.display(),
        size_mb = file_size as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );

    Ok(output_path)
}

fn ytdlp_args(template: &str, url: &str) -> Vec<String> {
    [
        "--no-playlist",
        "--no-progress",
        "--restrict-filenames",
        "--no-simulate",
        "-f",
        "best",
        "-o",
        template,
        "--print",
        "after_move:filepath",
        url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Last non-empty stdout line is the final file path.
fn parse_printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_valid_url("http://example.org/video"));
        assert!(is_valid_url("vimeo.com/12345"));
        assert!(is_valid_url("  https://cdn.example.net/a.mp4  "));

        assert!(!is_valid_url("https://youtu.be/abc"));
        assert!(!is_valid_url("https://example.com"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_is_direct_media_url() {
        assert!(is_direct_media_url("https://cdn.example.com/clips/a.mp4"));
        assert!(is_direct_media_url("http://example.org/v/B.MOV?sig=1"));

        assert!(!is_direct_media_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_direct_media_url("https://example.com/clips/"));
        assert!(!is_direct_media_url("ftp://example.com/a.mp4"));
        assert!(!is_direct_media_url("example.com/a.mp4"));
    }

    #[test]
    fn test_ytdlp_args() {
        let args = ytdlp_args("/media/downloads/%(title)s.%(ext)s", "https://x.com/v/1");
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "best");
        assert!(args.contains(&"--restrict-filenames".to_string()));
        assert!(args.contains(&"after_move:filepath".to_string()));
        assert_eq!(args.last().unwrap(), "https://x.com/v/1");
    }

    #[test]
    fn test_parse_printed_path() {
        let out = "\n/media/downloads/My_Clip.mp4\n\n";
        assert_eq!(
            parse_printed_path(out),
            Some(PathBuf::from("/media/downloads/My_Clip.mp4"))
        );
        assert_eq!(parse_printed_path("  \n"), None);
    }

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let result = download_video("https://youtu.be/abc", dir.path()).await;
        assert!(matches!(result, Err(MediaError::InvalidUrl(_))));
    }
}
