//! yt-dlp backed extraction adapter

use super::parser::{PROGRESS_TEMPLATE, parse_error_line, parse_media_info, parse_progress_line};
use super::{AdapterEvent, DownloadSpec, ExtractionAdapter, MediaInfo};
use crate::error::{ExtractionError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Adapter that drives the external `yt-dlp` binary
///
/// # Examples
///
/// ```no_run
/// use media_dl::extractor::YtDlpAdapter;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let adapter = YtDlpAdapter::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let adapter = YtDlpAdapter::from_path().expect("yt-dlp not found in PATH");
/// ```
pub struct YtDlpAdapter {
    binary_path: PathBuf,
}

impl YtDlpAdapter {
    /// Create a new adapter with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Arguments shared by probe and download: playlist handling and network policy
    fn common_args(spec: &DownloadSpec) -> Vec<String> {
        let policy = &spec.retry;
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-colors".to_string(),
            "--retries".to_string(),
            policy.retries.to_string(),
            "--extractor-retries".to_string(),
            policy.extractor_retries.to_string(),
            "--socket-timeout".to_string(),
            policy.socket_timeout.as_secs().to_string(),
        ];
        if policy.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
        if policy.no_check_certificates {
            args.push("--no-check-certificates".to_string());
        }
        if let Some(country) = &policy.geo_bypass_country {
            args.push("--xff".to_string());
            args.push(country.clone());
        }
        args
    }

    /// Full argument list for a download run
    pub(crate) fn download_args(spec: &DownloadSpec) -> Vec<String> {
        let policy = &spec.retry;
        let mut args = Self::common_args(spec);
        args.extend([
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--fragment-retries".to_string(),
            policy.fragment_retries.to_string(),
            "--file-access-retries".to_string(),
            policy.file_access_retries.to_string(),
            "--retry-sleep".to_string(),
            policy.retry_sleep.as_secs().to_string(),
            "-f".to_string(),
            spec.format_selector.clone(),
            "-o".to_string(),
            spec.output_template.clone(),
        ]);

        if spec.format.is_audio() {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                spec.extension().to_string(),
                "--audio-quality".to_string(),
                spec.audio_quality.clone(),
            ]);
        } else {
            args.extend([
                "--merge-output-format".to_string(),
                spec.extension().to_string(),
                "--remux-video".to_string(),
                spec.extension().to_string(),
            ]);
        }

        args.push("--".to_string());
        args.push(spec.url.clone());
        args
    }

    /// Argument list for a metadata probe
    pub(crate) fn probe_args(spec: &DownloadSpec) -> Vec<String> {
        let mut args = Self::common_args(spec);
        args.extend([
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--".to_string(),
            spec.url.clone(),
        ]);
        args
    }

    fn spawn_error(&self, e: std::io::Error) -> crate::Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractionError::ToolMissing(format!(
                "yt-dlp not found at {}",
                self.binary_path.display()
            ))
            .into()
        } else {
            crate::Error::Io(e)
        }
    }
}

#[async_trait]
impl ExtractionAdapter for YtDlpAdapter {
    async fn probe(&self, spec: &DownloadSpec) -> Result<MediaInfo> {
        tracing::debug!(job_id = spec.job_id.0, url = %spec.url, "Probing media");

        let output = Command::new(&self.binary_path)
            .args(Self::probe_args(spec))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .filter_map(parse_error_line)
                .last()
                .unwrap_or_else(|| format!("yt-dlp metadata probe exited with {}", output.status));
            return Err(ExtractionError::Engine {
                message,
                exit_code: output.status.code(),
            }
            .into());
        }

        parse_media_info(&output.stdout)
    }

    async fn download(
        &self,
        spec: &DownloadSpec,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<()> {
        tracing::debug!(job_id = spec.job_id.0, selector = %spec.format_selector, "Starting yt-dlp");

        let mut child = Command::new(&self.binary_path)
            .args(Self::download_args(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| crate::Error::Other("yt-dlp stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| crate::Error::Other("yt-dlp stderr was not captured".to_string()))?;

        let job_id = spec.job_id.0;
        let progress_events = events.clone();
        let read_stdout = async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_progress_line(&line) {
                    // Receiver gone means the run stopped listening; keep draining the pipe
                    Some(event) => {
                        progress_events.send(event).ok();
                    }
                    None => tracing::trace!(job_id, line = %line, "yt-dlp"),
                }
            }
            Ok::<(), std::io::Error>(())
        };

        let read_stderr = async move {
            let mut last_error = None;
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(message) = parse_error_line(&line) {
                    last_error = Some(message);
                } else if let Some(warning) = line.strip_prefix("WARNING:") {
                    tracing::warn!(job_id, warning = warning.trim(), "yt-dlp warning");
                }
            }
            Ok::<Option<String>, std::io::Error>(last_error)
        };

        let (stdout_result, stderr_result, status) =
            tokio::join!(read_stdout, read_stderr, child.wait());
        let status = status?;
        stdout_result?;
        let last_error = stderr_result?;

        if status.success() {
            return Ok(());
        }

        let message = last_error.unwrap_or_else(|| format!("yt-dlp exited with {}", status));
        events
            .send(AdapterEvent::Error {
                message: message.clone(),
            })
            .ok();
        Err(ExtractionError::Engine {
            message,
            exit_code: status.code(),
        }
        .into())
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::Config;
    use crate::types::{JobId, OutputFormat, Resolution};

    fn spec(format: OutputFormat) -> DownloadSpec {
        let mut config = Config::default();
        config.download.download_dir = PathBuf::from("/data");
        DownloadSpec::new(
            JobId(3),
            "https://example.com/watch?v=x",
            format,
            Resolution::P720,
            &config,
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_from_path_consistency_with_which_crate() {
        assert_eq!(
            which::which("yt-dlp").is_ok(),
            YtDlpAdapter::from_path().is_some()
        );
    }

    #[test]
    fn download_args_for_video_merge_into_requested_container() {
        let args = YtDlpAdapter::download_args(&spec(OutputFormat::Mkv));

        assert_eq!(value_after(&args, "--merge-output-format"), Some("mkv"));
        assert_eq!(value_after(&args, "--remux-video"), Some("mkv"));
        assert_eq!(value_after(&args, "-o"), Some("/data/3_%(title)s.%(ext)s"));
        assert_eq!(value_after(&args, "--retries"), Some("10"));
        assert_eq!(value_after(&args, "--fragment-retries"), Some("10"));
        assert_eq!(value_after(&args, "--file-access-retries"), Some("10"));
        assert_eq!(value_after(&args, "--extractor-retries"), Some("3"));
        assert_eq!(value_after(&args, "--retry-sleep"), Some("5"));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("30"));
        assert_eq!(value_after(&args, "--xff"), Some("US"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--force-ipv4".to_string()));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=x");
    }

    #[test]
    fn download_args_for_audio_extract_mp3() {
        let args = YtDlpAdapter::download_args(&spec(OutputFormat::Mp3));

        assert!(args.contains(&"-x".to_string()));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("192K"));
        assert_eq!(value_after(&args, "-f"), Some("bestaudio/best"));
        assert!(value_after(&args, "--merge-output-format").is_none());
    }

    #[test]
    fn url_is_separated_from_options() {
        let mut s = spec(OutputFormat::Mp4);
        s.url = "-o/etc/passwd".to_string();

        let args = YtDlpAdapter::probe_args(&s);
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "-o/etc/passwd");
        assert!(args.contains(&"--dump-single-json".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_maps_to_tool_missing() {
        let adapter = YtDlpAdapter::new(PathBuf::from("/nonexistent/yt-dlp-binary-xyz"));
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = adapter
            .download(&spec(OutputFormat::Mp4), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::ToolMissing(_))
        ));

        let err = adapter.probe(&spec(OutputFormat::Mp4)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::ToolMissing(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_process_emits_error_event_and_returns_engine_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo '[media-dl] downloading 50 100 NA 50.0%'\n\
             echo 'ERROR: [generic] Unable to download webpage' >&2\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let adapter = YtDlpAdapter::new(script);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = adapter
            .download(&spec(OutputFormat::Mp4), tx)
            .await
            .unwrap_err();
        match err {
            Error::Extraction(ExtractionError::Engine { message, exit_code }) => {
                assert_eq!(message, "[generic] Unable to download webpage");
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("expected engine error, got {other:?}"),
        }

        assert_eq!(
            rx.recv().await,
            Some(AdapterEvent::Downloading { fraction: 0.5 })
        );
        assert_eq!(
            rx.recv().await,
            Some(AdapterEvent::Error {
                message: "[generic] Unable to download webpage".to_string()
            })
        );
    }
}
