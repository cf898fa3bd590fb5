//! Startup and shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::MediaDownloader;

/// Error recorded on jobs whose run was cut short by a previous process exit
const INTERRUPTED_MESSAGE: &str = "Interrupted: the service stopped while this job was running";

impl MediaDownloader {
    /// Fail jobs that a previous process left in downloading or processing
    ///
    /// Runs do not survive a restart, so such jobs would otherwise never reach a
    /// terminal status.
    pub(crate) async fn recover_interrupted_jobs(&self) -> Result<()> {
        let count = self.db.fail_interrupted_jobs(INTERRUPTED_MESSAGE).await?;
        if count > 0 {
            tracing::warn!(
                interrupted = count,
                "Marked jobs interrupted by the previous shutdown as failed"
            );
        }
        Ok(())
    }

    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new runs
    /// 2. Waits for active runs to finish with a timeout (30 seconds)
    /// 3. Emits [`Event::Shutdown`]
    ///
    /// Runs still active after the timeout are left to the runtime; the next
    /// startup marks their jobs as failed.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new runs
        self.run_queue
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new runs");

        // 2. Wait for active runs to complete with timeout
        let shutdown_timeout = std::time::Duration::from_secs(30);
        match tokio::time::timeout(shutdown_timeout, self.wait_for_active_runs()).await {
            Ok(()) => {
                tracing::info!("All active runs completed gracefully");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for runs to complete, proceeding with shutdown");
            }
        }

        // 3. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until no run is queued or executing
    async fn wait_for_active_runs(&self) {
        loop {
            let active_count = self.active_run_count().await;
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active runs to complete");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
