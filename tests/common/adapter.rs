//! Fake extraction engine that writes a fixed payload

use async_trait::async_trait;
use media_dl::{AdapterEvent, DownloadSpec, ExtractionAdapter, ExtractionError, MediaInfo, Result};
use tokio::sync::mpsc;

/// Payload written by [`FakeEngine`]: 1000 bytes, byte `i` is `i % 251`
pub fn payload() -> Vec<u8> {
    (0..1000u32).map(|i| (i % 251) as u8).collect()
}

/// Engine stand-in that reports a few progress steps and writes
/// `{id}_{title}.{ext}` into the download directory
pub struct FakeEngine {
    pub title: String,
    /// Write the file under this name instead of the template name
    pub output_name: Option<String>,
    /// Report this engine error instead of finishing
    pub error: Option<String>,
}

impl FakeEngine {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            output_name: None,
            error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::new("unused")
        }
    }
}

#[async_trait]
impl ExtractionAdapter for FakeEngine {
    async fn probe(&self, _spec: &DownloadSpec) -> Result<MediaInfo> {
        Ok(MediaInfo {
            title: self.title.clone(),
            ..Default::default()
        })
    }

    async fn download(
        &self,
        spec: &DownloadSpec,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<()> {
        for fraction in [0.1, 0.5, 0.9, 1.0] {
            events.send(AdapterEvent::Downloading { fraction }).ok();
            tokio::task::yield_now().await;
        }

        if let Some(ref message) = self.error {
            events
                .send(AdapterEvent::Error {
                    message: message.clone(),
                })
                .ok();
            return Err(ExtractionError::Engine {
                message: message.clone(),
                exit_code: Some(1),
            }
            .into());
        }

        events.send(AdapterEvent::Finished).ok();

        let name = self
            .output_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}.{}", spec.job_id, self.title, spec.extension()));
        tokio::fs::write(spec.download_dir.join(name), payload()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
