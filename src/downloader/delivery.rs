//! File delivery from the download root.

use crate::error::Result;
use crate::media::MediaResponse;

use super::MediaDownloader;

impl MediaDownloader {
    /// Open a downloaded file for playback, honoring an optional `Range` header
    ///
    /// `relative_path` is resolved against the download root; see
    /// [`MediaServer::resolve`](crate::media::MediaServer::resolve) for the
    /// containment rules.
    pub async fn stream_file(
        &self,
        relative_path: &str,
        range: Option<&str>,
    ) -> Result<MediaResponse> {
        self.media.open(relative_path, range).await
    }

    /// Open a downloaded file as an attachment
    pub async fn download_file(&self, relative_path: &str) -> Result<MediaResponse> {
        self.media.open_download(relative_path).await
    }
}
