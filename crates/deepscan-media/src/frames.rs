//! Frame sampling over an FFmpeg rawvideo pipe.
//!
//! FFmpeg decodes the video and keeps every Nth frame with a `select`
//! filter. Frames arrive on stdout as packed RGB24 and are handed out in
//! decode order through a bounded channel.

use image::RgbImage;
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::command::{is_progress_line, parse_progress_line, FfmpegCommand, FfmpegProgress};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Default sampling interval.
pub const DEFAULT_FRAME_SKIP: u32 = 5;

/// Frames buffered between the decoder task and the consumer.
const CHANNEL_CAPACITY: usize = 4;

/// Stderr lines kept for failure reports.
const STDERR_TAIL_LINES: usize = 20;

/// A decoded frame together with its index in the source video.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Zero-based index among all decoded frames
    pub index: u64,
    pub image: RgbImage,
}

/// Stream of sampled frames from one video.
#[derive(Debug)]
pub struct FrameStream {
    pub info: VideoInfo,
    receiver: mpsc::Receiver<SampledFrame>,
}

impl FrameStream {
    /// Next sampled frame, or `None` once the video is exhausted.
    pub async fn next(&mut self) -> Option<SampledFrame> {
        self.receiver.recv().await
    }
}

/// Samples every Nth frame of a video.
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    frame_skip: u32,
}

impl FrameSampler {
    pub fn new(frame_skip: u32) -> MediaResult<Self> {
        if frame_skip == 0 {
            return Err(MediaError::invalid_config("frame_skip must be at least 1"));
        }
        Ok(Self { frame_skip })
    }

    pub fn frame_skip(&self) -> u32 {
        self.frame_skip
    }

    /// FFmpeg command that emits the sampled frames on stdout.
    pub fn command(&self, path: &Path) -> FfmpegCommand {
        FfmpegCommand::to_stdout(path)
            .no_autorotate()
            .output_args(["-map", "0:v:0"])
            .video_filter(format!("select=not(mod(n\\,{}))", self.frame_skip))
            .output_args(["-vsync", "vfr"])
            .no_audio()
            .raw_video("rgb24")
    }

    /// Start decoding `path`.
    ///
    /// Dropping the returned stream stops the decoder.
    pub async fn sample(&self, path: impl AsRef<Path>) -> MediaResult<FrameStream> {
        let path = path.as_ref();
        let info = probe_video(path).await?;

        let mut child = self.command(path).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            frame_skip = self.frame_skip,
            "Sampling frames"
        );

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let frame_skip = u64::from(self.frame_skip);
        let geometry = (info.width, info.height, info.rgb_frame_len());

        tokio::spawn(async move {
            let stderr_task = tokio::spawn(drain_stderr(stderr));

            let delivered = read_frames(stdout, geometry, frame_skip, &tx).await;
            // Receiver gone: stop decoding instead of waiting for the end
            if tx.is_closed() {
                let _ = child.kill().await;
                return;
            }

            let status = child.wait().await;
            let stderr_tail = stderr_task.await.unwrap_or_default();

            match status {
                Ok(status) if status.success() => {
                    debug!(frames = delivered, "Frame sampling complete");
                }
                Ok(status) => {
                    warn!(
                        exit_code = ?status.code(),
                        frames = delivered,
                        stderr = %stderr_tail,
                        "FFmpeg exited early; keeping frames already sampled"
                    );
                }
                Err(e) => {
                    warn!(error = %e, frames = delivered, "Failed to wait for FFmpeg");
                }
            }
        });

        Ok(FrameStream { info, receiver: rx })
    }
}

/// Read exact-size frames until EOF or until the receiver is dropped.
async fn read_frames(
    mut stdout: ChildStdout,
    (width, height, frame_len): (u32, u32, usize),
    frame_skip: u64,
    tx: &mpsc::Sender<SampledFrame>,
) -> u64 {
    let mut delivered = 0u64;

    loop {
        let mut buf = vec![0u8; frame_len];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                warn!(error = %e, "Failed reading FFmpeg output");
                break;
            }
        }

        let Some(image) = RgbImage::from_raw(width, height, buf) else {
            break;
        };
        let frame = SampledFrame {
            index: delivered * frame_skip,
            image,
        };
        if tx.send(frame).await.is_err() {
            break;
        }
        delivered += 1;
    }

    delivered
}

/// Consume FFmpeg's stderr, logging progress and keeping the last diagnostic lines.
async fn drain_stderr(stderr: ChildStderr) -> String {
    let mut reader = BufReader::new(stderr).lines();
    let mut progress = FfmpegProgress::default();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = reader.next_line().await {
        if is_progress_line(&line) {
            if let Some(snapshot) = parse_progress_line(&line, &mut progress) {
                debug!(
                    frame = snapshot.frame,
                    out_time_ms = snapshot.out_time_ms,
                    speed = snapshot.speed,
                    "FFmpeg progress"
                );
            }
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_zero_frame_skip_rejected() {
        assert!(matches!(
            FrameSampler::new(0),
            Err(MediaError::InvalidConfig(_))
        ));
        assert_eq!(FrameSampler::new(DEFAULT_FRAME_SKIP).unwrap().frame_skip(), 5);
    }

    #[test]
    fn test_sampler_command() {
        let sampler = FrameSampler::new(3).unwrap();
        let args = sampler.command(&PathBuf::from("clip.mp4")).build_args();

        assert!(args.contains(&"select=not(mod(n\\,3))".to_string()));
        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "0:v:0");
        assert!(map > args.iter().position(|a| a == "-i").unwrap());
        assert!(args.contains(&"vfr".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"rawvideo".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[tokio::test]
    async fn test_sample_missing_file() {
        let sampler = FrameSampler::new(5).unwrap();
        let result = sampler.sample("/nonexistent/clip.mp4").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
