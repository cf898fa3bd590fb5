use crate::db::*;
use crate::types::{JobFilter, JobUpdate, OutputFormat, Resolution, Status};
use tempfile::NamedTempFile;

async fn open() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn new_job(url: &str) -> NewJob {
    NewJob {
        source_url: url.to_string(),
        format: OutputFormat::Mp4,
        resolution: Resolution::P720,
    }
}

fn status_update(status: Status) -> JobUpdate {
    JobUpdate {
        status: Some(status),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_insert_and_get_job() {
    let (db, _file) = open().await;

    let id = db
        .insert_job(&NewJob {
            source_url: "https://example.com/watch?v=abc".to_string(),
            format: OutputFormat::Mp3,
            resolution: Resolution::Best,
        })
        .await
        .unwrap();
    assert!(id.0 > 0);

    let job = db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.source_url, "https://example.com/watch?v=abc");
    assert_eq!(job.output_format().unwrap(), OutputFormat::Mp3);
    assert_eq!(job.output_resolution().unwrap(), Resolution::Best);
    assert_eq!(job.status(), Status::Pending);
    assert_eq!(job.progress, 0);
    assert!(job.file_path.is_none());
    assert!(job.error_message.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_get_missing_job_returns_none() {
    let (db, _file) = open().await;

    assert!(db.get_job(JobId(999)).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_list_jobs_newest_first_with_paging_and_status_filter() {
    let (db, _file) = open().await;

    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(
            db.insert_job(&new_job(&format!("https://example.com/{i}")))
                .await
                .unwrap(),
        );
    }
    db.update_job(ids[1], &status_update(Status::Downloading))
        .await
        .unwrap();

    let all = db.list_jobs(&JobFilter::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    // Same-second inserts fall back to id ordering
    assert_eq!(all[0].id, ids[3].0);
    assert_eq!(all[3].id, ids[0].0);

    let page = db
        .list_jobs(&JobFilter {
            skip: 1,
            limit: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[2].0);

    let downloading = db
        .list_jobs(&JobFilter {
            status: Some(Status::Downloading),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(downloading.len(), 1);
    assert_eq!(downloading[0].id, ids[1].0);

    db.close().await;
}

#[tokio::test]
async fn test_update_job_applies_partial_fields() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();

    let job = db
        .update_job(
            id,
            &JobUpdate {
                status: Some(Status::Downloading),
                progress: Some(0),
                status_message: Some("Preparing download...".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status(), Status::Downloading);
    assert_eq!(job.status_message.as_deref(), Some("Preparing download..."));

    // Progress-only update keeps status and message
    let job = db
        .update_job(
            id,
            &JobUpdate {
                progress: Some(42),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status(), Status::Downloading);
    assert_eq!(job.progress, 42);
    assert_eq!(job.status_message.as_deref(), Some("Preparing download..."));

    db.close().await;
}

#[tokio::test]
async fn test_update_job_on_terminal_job_is_noop() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();

    db.update_job(id, &status_update(Status::Downloading))
        .await
        .unwrap();
    db.update_job(
        id,
        &JobUpdate {
            status: Some(Status::Failed),
            progress: Some(0),
            error_message: Some("boom".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let job = db
        .update_job(
            id,
            &JobUpdate {
                status: Some(Status::Downloading),
                progress: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status(), Status::Failed);
    assert_eq!(job.progress, 0);

    // No status at all is also ignored on a terminal job
    let job = db
        .update_job(
            id,
            &JobUpdate {
                progress: Some(99),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.progress, 0);
    assert_eq!(job.error_message.as_deref(), Some("boom"));

    db.close().await;
}

#[tokio::test]
async fn test_update_job_with_same_terminal_status_is_applied() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();
    db.update_job(id, &status_update(Status::Cancelled))
        .await
        .unwrap();

    let job = db
        .update_job(
            id,
            &JobUpdate {
                status: Some(Status::Cancelled),
                status_message: Some("Cancelled by user".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status(), Status::Cancelled);
    assert_eq!(job.status_message.as_deref(), Some("Cancelled by user"));

    db.close().await;
}

#[tokio::test]
async fn test_update_job_rejects_backward_transition() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();
    db.update_job(id, &status_update(Status::Downloading))
        .await
        .unwrap();
    db.update_job(id, &status_update(Status::Processing))
        .await
        .unwrap();

    let job = db
        .update_job(id, &status_update(Status::Downloading))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status(), Status::Processing);

    db.close().await;
}

#[tokio::test]
async fn test_update_deleted_job_returns_none() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();

    assert!(db.delete_job(id).await.unwrap());
    assert!(!db.delete_job(id).await.unwrap());

    let result = db
        .update_job(
            id,
            &JobUpdate {
                progress: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(result.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_update_job_clamps_progress_to_100() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();

    let job = db
        .update_job(
            id,
            &JobUpdate {
                status: Some(Status::Downloading),
                progress: Some(250),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.progress, 100);

    db.close().await;
}

#[tokio::test]
async fn test_fail_interrupted_jobs_only_touches_active_states() {
    let (db, _file) = open().await;
    let pending = db.insert_job(&new_job("https://example.com/p")).await.unwrap();
    let running = db.insert_job(&new_job("https://example.com/r")).await.unwrap();
    let done = db.insert_job(&new_job("https://example.com/d")).await.unwrap();

    db.update_job(running, &status_update(Status::Downloading))
        .await
        .unwrap();
    for status in [Status::Downloading, Status::Processing, Status::Completed] {
        db.update_job(done, &status_update(status)).await.unwrap();
    }

    let count = db.fail_interrupted_jobs("Interrupted").await.unwrap();
    assert_eq!(count, 1);

    let running = db.get_job(running).await.unwrap().unwrap();
    assert_eq!(running.status(), Status::Failed);
    assert_eq!(running.error_message.as_deref(), Some("Interrupted"));
    assert_eq!(
        db.get_job(pending).await.unwrap().unwrap().status(),
        Status::Pending
    );
    assert_eq!(
        db.get_job(done).await.unwrap().unwrap().status(),
        Status::Completed
    );

    db.close().await;
}

#[tokio::test]
async fn test_job_converts_to_job_info() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();

    let job = db.get_job(id).await.unwrap().unwrap();
    let info = crate::types::JobInfo::try_from(job).unwrap();

    assert_eq!(info.id, id);
    assert_eq!(info.url, "https://example.com/a");
    assert_eq!(info.resolution, Resolution::P720);
    assert_eq!(info.status, Status::Pending);
    assert!(info.created_at.timestamp() > 0);

    db.close().await;
}

#[tokio::test]
async fn test_corrupt_format_surfaces_as_error() {
    let (db, _file) = open().await;
    let id = db.insert_job(&new_job("https://example.com/a")).await.unwrap();

    sqlx::query("UPDATE jobs SET format = 'gif' WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await
        .unwrap();

    let job = db.get_job(id).await.unwrap().unwrap();
    assert!(job.output_format().is_err());

    db.close().await;
}
