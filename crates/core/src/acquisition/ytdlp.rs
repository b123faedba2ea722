//! yt-dlp based acquisition: search, download, tag, store.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::AcquisitionConfig;
use super::error::AcquisitionError;
use super::{AcquisitionPipeline, Artifact};
use crate::media::ArtifactStore;
use crate::metadata::TrackMetadata;

const YTDLP: &str = "yt-dlp";
const FFMPEG: &str = "ffmpeg";

/// Max stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 2048;

/// Track title without bracketed suffixes such as "(Remastered 2011)" or
/// "[Live]", which hurt search results.
pub fn clean_track_name(title: &str) -> &str {
    let cut = title.find(['(', '[']).unwrap_or(title.len());
    title[..cut].trim()
}

/// Search query: cleaned title followed by the first artist.
pub fn search_query(track: &TrackMetadata) -> String {
    let name = clean_track_name(&track.title);
    match track.first_artist() {
        Some(artist) if !name.is_empty() => format!("{} {}", name, artist),
        Some(artist) => artist.to_string(),
        None => name.to_string(),
    }
}

/// yt-dlp arguments to download the best matching audio as mp3.
///
/// `output_template` is a yt-dlp template such as `/tmp/x/<id>.%(ext)s`.
pub fn build_download_args(
    track: &TrackMetadata,
    config: &AcquisitionConfig,
    output_template: &Path,
) -> Vec<String> {
    let duration = track.duration_secs();
    let tolerance = config.duration_tolerance_secs;

    vec![
        "--extract-audio".to_string(),
        "--audio-format".to_string(),
        "mp3".to_string(),
        "--format".to_string(),
        "bestaudio/best".to_string(),
        "--no-playlist".to_string(),
        "--match-filter".to_string(),
        format!(
            "duration>{} & duration<{}",
            duration.saturating_sub(tolerance),
            duration + tolerance
        ),
        "--output".to_string(),
        output_template.to_string_lossy().to_string(),
        format!("ytsearch{}:{}", config.search_results, search_query(track)),
    ]
}

/// ffmpeg arguments for a stream-copy remux that writes ID3v2.3 tags and,
/// when given, a front cover picture.
pub fn build_tag_args(
    track: &TrackMetadata,
    input_path: &Path,
    cover_path: Option<&Path>,
    output_path: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input_path.to_string_lossy().to_string(),
    ];

    if let Some(cover) = cover_path {
        args.extend([
            "-i".to_string(),
            cover.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:a".to_string(),
            "-map".to_string(),
            "1:v".to_string(),
            "-disposition:v:0".to_string(),
            "attached_pic".to_string(),
            "-metadata:s:v".to_string(),
            "title=Album cover".to_string(),
            "-metadata:s:v".to_string(),
            "comment=Cover (front)".to_string(),
        ]);
    } else {
        args.extend(["-map".to_string(), "0:a".to_string()]);
    }

    args.extend([
        "-c".to_string(),
        "copy".to_string(),
        "-id3v2_version".to_string(),
        "3".to_string(),
    ]);

    let mut tag = |key: &str, value: String| {
        args.extend(["-metadata".to_string(), format!("{}={}", key, value)]);
    };
    tag("title", track.title.clone());
    tag("artist", track.artists_joined());
    tag("album", track.album.clone());
    if track.track_number > 0 {
        tag("track", track.track_number.to_string());
    }
    if track.disc_number > 0 {
        tag("disc", track.disc_number.to_string());
    }
    if let Some(date) = &track.release_date {
        tag("date", date.clone());
    }

    args.extend([
        "-loglevel".to_string(),
        "error".to_string(),
        output_path.to_string_lossy().to_string(),
    ]);

    args
}

/// Scratch files removed when the acquisition attempt ends, however it ends.
struct ScratchFiles(Vec<PathBuf>);

impl ScratchFiles {
    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.0.push(path.clone());
        path
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}

/// Acquisition pipeline backed by the yt-dlp and ffmpeg binaries.
pub struct YtDlpPipeline {
    config: AcquisitionConfig,
    temp_dir: PathBuf,
    artifacts: ArtifactStore,
    http: reqwest::Client,
}

impl YtDlpPipeline {
    pub fn new(
        config: AcquisitionConfig,
        temp_dir: impl Into<PathBuf>,
        artifacts: ArtifactStore,
    ) -> Result<Self, AcquisitionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AcquisitionError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            temp_dir: temp_dir.into(),
            artifacts,
            http,
        })
    }

    /// Check that both external tools can be executed.
    pub async fn validate(&self) -> Result<(), AcquisitionError> {
        self.run_tool(YTDLP, &self.config.ytdlp_path, &["--version".to_string()])
            .await?;
        self.run_tool(FFMPEG, &self.config.ffmpeg_path, &["-version".to_string()])
            .await?;
        Ok(())
    }

    /// Run an external tool to completion, killing it on timeout.
    async fn run_tool(
        &self,
        tool: &'static str,
        program: &str,
        args: &[String],
    ) -> Result<(), AcquisitionError> {
        debug!(tool, ?args, "Running external tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AcquisitionError::ToolNotFound {
                        tool,
                        path: program.to_string(),
                    }
                } else {
                    AcquisitionError::Io(e)
                }
            })?;

        let mut stderr = child.stderr.take();
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut output = Vec::new();
            if let Some(stderr) = stderr.as_mut() {
                stderr.read_to_end(&mut output).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, output))
        })
        .await;

        match result {
            Ok(Ok((status, output))) => {
                if status.success() {
                    return Ok(());
                }
                let stderr = String::from_utf8_lossy(&output);
                let tail_start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
                let tail_start = (tail_start..stderr.len())
                    .find(|i| stderr.is_char_boundary(*i))
                    .unwrap_or(stderr.len());
                let tail = stderr[tail_start..].trim();
                Err(AcquisitionError::tool_failed(
                    tool,
                    format!("exited with code: {:?}", status.code()),
                    (!tail.is_empty()).then(|| tail.to_string()),
                ))
            }
            Ok(Err(e)) => Err(AcquisitionError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                Err(AcquisitionError::Timeout {
                    tool,
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    /// Download the cover image; failures only cost the cover.
    async fn fetch_cover(&self, url: &str, path: &Path) -> Option<PathBuf> {
        let response = match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(url, status = %response.status(), "Cover art download failed");
                return None;
            }
            Err(e) => {
                warn!(url, error = %e, "Cover art download failed");
                return None;
            }
        };

        let bytes = match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return None,
            Err(e) => {
                warn!(url, error = %e, "Cover art download failed");
                return None;
            }
        };

        match tokio::fs::write(path, &bytes).await {
            Ok(()) => Some(path.to_path_buf()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write cover art");
                None
            }
        }
    }
}

#[async_trait]
impl AcquisitionPipeline for YtDlpPipeline {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn acquire(&self, track: &TrackMetadata) -> Result<Artifact, AcquisitionError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let stem = uuid::Uuid::new_v4().to_string();
        let mut scratch = ScratchFiles(Vec::new());
        let downloaded = scratch.track(self.temp_dir.join(format!("{}.mp3", stem)));
        let tagged = scratch.track(self.temp_dir.join(format!("{}.tagged.mp3", stem)));
        let cover = scratch.track(self.temp_dir.join(format!("{}.jpg", stem)));
        // yt-dlp keeps the pre-conversion file when interrupted.
        for ext in ["webm", "m4a", "opus", "part"] {
            scratch.track(self.temp_dir.join(format!("{}.{}", stem, ext)));
        }

        info!(
            track_id = %track.external_track_id,
            query = %search_query(track),
            "Searching audio source"
        );

        let template = self.temp_dir.join(format!("{}.%(ext)s", stem));
        let args = build_download_args(track, &self.config, &template);
        self.run_tool(YTDLP, &self.config.ytdlp_path, &args).await?;

        // yt-dlp exits 0 when the match filter rejected every result.
        if !tokio::fs::try_exists(&downloaded).await.unwrap_or(false) {
            return Err(AcquisitionError::NoMatch(track.external_track_id.clone()));
        }

        let cover_path = match (&track.cover_url, self.config.embed_cover_art) {
            (Some(url), true) => self.fetch_cover(url, &cover).await,
            _ => None,
        };

        let args = build_tag_args(track, &downloaded, cover_path.as_deref(), &tagged);
        self.run_tool(FFMPEG, &self.config.ffmpeg_path, &args).await?;

        let reference = format!("{}.mp3", stem);
        let size_bytes = self.artifacts.put(&tagged, &reference).await?;

        info!(
            track_id = %track.external_track_id,
            reference = %reference,
            size_bytes,
            "Acquired track"
        );

        Ok(Artifact {
            reference,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> TrackMetadata {
        TrackMetadata {
            external_track_id: "4uLU6hMCjMI75M1A2tKUQC".to_string(),
            title: "Never Gonna Give You Up (2022 Remaster) [Official]".to_string(),
            artists: vec!["Rick Astley".to_string(), "Someone Else".to_string()],
            album: "Whenever You Need Somebody".to_string(),
            track_number: 1,
            disc_number: 1,
            release_date: Some("1987-11-12".to_string()),
            duration_ms: 213_573,
            cover_url: Some("https://example.com/cover.jpg".to_string()),
        }
    }

    fn position(args: &[String], flag: &str) -> usize {
        args.iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("missing {}", flag))
    }

    #[test]
    fn test_clean_track_name() {
        assert_eq!(clean_track_name("Song (Remastered)"), "Song");
        assert_eq!(clean_track_name("Song [Live] (2011)"), "Song");
        assert_eq!(clean_track_name("  Plain Song  "), "Plain Song");
        assert_eq!(clean_track_name("(Intro)"), "");
    }

    #[test]
    fn test_search_query_uses_first_artist() {
        assert_eq!(search_query(&track()), "Never Gonna Give You Up Rick Astley");

        let mut untitled = track();
        untitled.title = "[Untitled]".to_string();
        assert_eq!(search_query(&untitled), "Rick Astley");

        let mut no_artist = track();
        no_artist.artists.clear();
        assert_eq!(search_query(&no_artist), "Never Gonna Give You Up");
    }

    #[test]
    fn test_download_args() {
        let config = AcquisitionConfig::default();
        let args = build_download_args(&track(), &config, Path::new("/tmp/g/abc.%(ext)s"));

        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(args[position(&args, "--audio-format") + 1], "mp3");
        assert_eq!(args[position(&args, "--format") + 1], "bestaudio/best");
        assert_eq!(
            args[position(&args, "--match-filter") + 1],
            "duration>208 & duration<218"
        );
        assert_eq!(args[position(&args, "--output") + 1], "/tmp/g/abc.%(ext)s");
        assert_eq!(
            args.last().map(String::as_str),
            Some("ytsearch10:Never Gonna Give You Up Rick Astley")
        );
    }

    #[test]
    fn test_download_args_short_track_does_not_underflow() {
        let mut short = track();
        short.duration_ms = 3_000;
        let config = AcquisitionConfig {
            search_results: 3,
            ..Default::default()
        };
        let args = build_download_args(&short, &config, Path::new("out.%(ext)s"));

        assert_eq!(args[position(&args, "--match-filter") + 1], "duration>0 & duration<8");
        assert!(args.last().unwrap().starts_with("ytsearch3:"));
    }

    #[test]
    fn test_tag_args_with_cover() {
        let args = build_tag_args(
            &track(),
            Path::new("in.mp3"),
            Some(Path::new("cover.jpg")),
            Path::new("out.mp3"),
        );

        assert_eq!(args[position(&args, "-c") + 1], "copy");
        assert_eq!(args[position(&args, "-id3v2_version") + 1], "3");
        assert_eq!(args[position(&args, "-disposition:v:0") + 1], "attached_pic");
        assert!(args.contains(&"cover.jpg".to_string()));
        assert!(args.contains(&"artist=Rick Astley, Someone Else".to_string()));
        assert!(args.contains(&"title=Never Gonna Give You Up (2022 Remaster) [Official]".to_string()));
        assert!(args.contains(&"album=Whenever You Need Somebody".to_string()));
        assert!(args.contains(&"track=1".to_string()));
        assert!(args.contains(&"disc=1".to_string()));
        assert!(args.contains(&"date=1987-11-12".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
    }

    #[test]
    fn test_tag_args_without_cover() {
        let mut bare = track();
        bare.release_date = None;
        bare.track_number = 0;
        let args = build_tag_args(&bare, Path::new("in.mp3"), None, Path::new("out.mp3"));

        assert!(!args.contains(&"attached_pic".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("date=")));
        assert!(!args.iter().any(|a| a.starts_with("track=")));
        assert_eq!(args[position(&args, "-map") + 1], "0:a");
    }

    #[test]
    fn test_scratch_files_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.mp3");
        std::fs::write(&existing, b"x").unwrap();

        {
            let mut scratch = ScratchFiles(Vec::new());
            scratch.track(existing.clone());
            scratch.track(dir.path().join("never-created.jpg"));
        }

        assert!(!existing.exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("artifacts")).unwrap();
        let config = AcquisitionConfig {
            ytdlp_path: "/nonexistent/yt-dlp".to_string(),
            ..Default::default()
        };
        let pipeline = YtDlpPipeline::new(config, dir.path().join("tmp"), store).unwrap();

        let result = pipeline.acquire(&track()).await;
        assert!(matches!(
            result,
            Err(AcquisitionError::ToolNotFound { tool: "yt-dlp", .. })
        ));
    }
}
