//! Locating the file a run produced.

use crate::error::{JobError, Result};
use crate::types::JobId;
use crate::utils::expected_file_name;
use std::path::{Path, PathBuf};

/// Find the output of a finished run in the download root.
///
/// The engine is asked for `{id}_{title}.{ext}`, but it sanitizes titles its own
/// way, so when the expected name is absent the first regular file (by name)
/// starting with `{id}_` and ending with `.{ext}` is adopted instead.
pub(super) async fn locate_output(
    root: &Path,
    id: JobId,
    safe_title: &str,
    extension: &str,
) -> Result<PathBuf> {
    let expected_name = expected_file_name(id.0, safe_title, extension);
    let expected = root.join(&expected_name);
    if is_regular_file(&expected).await {
        return Ok(expected);
    }

    let prefix = format!("{}_", id);
    let suffix = format!(".{}", extension);
    let mut candidates = Vec::new();

    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(&suffix) {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            candidates.push(name);
        }
    }
    candidates.sort();

    match candidates.into_iter().next() {
        Some(name) => {
            tracing::debug!(
                job_id = id.0,
                expected = %expected_name,
                found = %name,
                "Adopted output file by job prefix"
            );
            Ok(root.join(name))
        }
        None => Err(JobError::OutputMissing {
            id: id.0,
            expected: expected_name,
        }
        .into()),
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
