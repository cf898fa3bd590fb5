//! End-to-end job flow through the public API with a fake engine
//!
//! Covers submit -> run -> completed -> stream, failure reporting, and the
//! HTTP surface on top of it.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{
    FakeEngine, WaitResult, assert_job_status, create_downloader, payload, progress_values,
    wait_for_completion,
};
use media_dl::{Error, MediaError, NewJobRequest, OutputFormat, Resolution, Status};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn mp3_job_runs_to_completion_and_streams() {
    let (downloader, _temp_dir) = create_downloader(Arc::new(FakeEngine::new("Song"))).await;
    let mut events = downloader.subscribe();

    let mut request = NewJobRequest::new("https://example.com/watch?v=abc");
    request.format = OutputFormat::Mp3;
    request.resolution = Resolution::Best;
    let job = downloader.submit_job(request).await.unwrap();

    let (result, seen) = wait_for_completion(&mut events, job.id, TIMEOUT).await;
    let expected_path = format!("{}_Song.mp3", job.id);
    assert_eq!(result, WaitResult::Completed(expected_path.clone()));
    assert_eq!(
        progress_values(&seen, job.id),
        vec![0, 5, 10, 40, 72, 80, 85, 95, 100]
    );

    let done = downloader.get_job(job.id).await.unwrap();
    assert_eq!(done.status, Status::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.file_path.as_deref(), Some(expected_path.as_str()));
    assert_eq!(
        done.status_message.as_deref(),
        Some(format!("Download completed: {}", expected_path).as_str())
    );

    let ranged = downloader
        .stream_file(&expected_path, Some("bytes=200-299"))
        .await
        .unwrap();
    assert_eq!(ranged.status, 206);
    assert_eq!(ranged.content_type, "audio/mpeg");
    assert_eq!(ranged.content_range.as_deref(), Some("bytes 200-299/1000"));
    assert_eq!(ranged.content_length, 100);

    let tail = downloader
        .stream_file(&expected_path, Some("bytes=900-"))
        .await
        .unwrap();
    assert_eq!(tail.content_range.as_deref(), Some("bytes 900-999/1000"));
    assert_eq!(tail.content_length, 100);
}

#[tokio::test]
async fn traversal_outside_download_root_is_denied() {
    let (downloader, _temp_dir) = create_downloader(Arc::new(FakeEngine::new("x"))).await;

    for path in ["../../etc/passwd", "..\\..\\etc\\passwd", "../media-dl.db"] {
        let err = downloader.stream_file(path, None).await.unwrap_err();
        assert!(
            matches!(err, Error::Media(MediaError::AccessDenied)),
            "{path} should be denied, got {err:?}"
        );
    }
}

#[tokio::test]
async fn engine_error_fails_job_once() {
    let (downloader, _temp_dir) =
        create_downloader(Arc::new(FakeEngine::failing("Video unavailable"))).await;
    let mut events = downloader.subscribe();

    let job = downloader
        .submit_job(NewJobRequest::new("https://example.com/gone"))
        .await
        .unwrap();

    let (result, _seen) = wait_for_completion(&mut events, job.id, TIMEOUT).await;
    assert_eq!(result, WaitResult::Failed("Video unavailable".to_string()));

    // Give the run time to finish writing before checking for late events
    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, media_dl::Event::Failed { .. } | media_dl::Event::Completed { .. }),
            "unexpected terminal event after failure: {event:?}"
        );
    }

    assert_job_status(&downloader, job.id, Status::Failed).await;
    let failed = downloader.get_job(job.id).await.unwrap();
    assert_eq!(failed.progress, 0);
    assert_eq!(failed.error_message.as_deref(), Some("Video unavailable"));
}

#[tokio::test]
async fn fallback_output_name_is_adopted() {
    let engine = FakeEngine {
        output_name: Some("1_whatever.mp4".to_string()),
        ..FakeEngine::new("Some Title")
    };
    let (downloader, _temp_dir) = create_downloader(Arc::new(engine)).await;

    let job = downloader
        .create_job(NewJobRequest::new("https://example.com/a"))
        .await
        .unwrap();
    assert_eq!(job.id.0, 1);

    downloader.run_job(job.id).await.unwrap();

    let done = downloader.get_job(job.id).await.unwrap();
    assert_eq!(done.status, Status::Completed);
    assert_eq!(done.file_path.as_deref(), Some("1_whatever.mp4"));
}

#[tokio::test]
async fn http_submit_then_stream() {
    let (downloader, _temp_dir) = create_downloader(Arc::new(FakeEngine::new("Clip"))).await;
    let app = media_dl::api::create_router(downloader.clone(), downloader.get_config());
    let mut events = downloader.subscribe();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/jobs")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://example.com/v","format":"mp4"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let job: media_dl::JobInfo = serde_json::from_slice(&body).unwrap();

    let (result, _) = wait_for_completion(&mut events, job.id, TIMEOUT).await;
    let WaitResult::Completed(file_path) = result else {
        panic!("job did not complete: {result:?}");
    };

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/stream/{}", file_path))
                .header("Range", "bytes=0-99")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.to_vec(), payload()[..100].to_vec());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/../../etc/passwd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
