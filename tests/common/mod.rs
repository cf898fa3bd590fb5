//! Common test utilities for media-dl integration tests

#[allow(dead_code)]
pub mod adapter;
#[allow(dead_code)]
pub mod assertions;

#[allow(unused_imports)]
pub use adapter::*;
#[allow(unused_imports)]
pub use assertions::*;

use std::sync::Arc;
use tempfile::TempDir;
use media_dl::{Config, ExtractionAdapter, MediaDownloader};

/// Config rooted in `temp_dir`
#[allow(dead_code)]
pub fn temp_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.persistence.database_path = temp_dir.path().join("media-dl.db");
    config.download.max_concurrent_runs = 2;
    config
}

/// Create a MediaDownloader driven by `adapter`
///
/// Returns the downloader and temp directory (keep temp_dir alive for test duration)
#[allow(dead_code)]
pub async fn create_downloader(
    adapter: Arc<dyn ExtractionAdapter>,
) -> (Arc<MediaDownloader>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let downloader = MediaDownloader::with_adapter(temp_config(&temp_dir), adapter)
        .await
        .expect("create downloader");
    (Arc::new(downloader), temp_dir)
}
