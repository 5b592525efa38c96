//! Polling loop against real records.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use bosroller::client::{
    AnalysisPoller, AnalysisSource, AnalyzerSession, ClientError, PollOutcome, VideoAnalysis,
};
use bosroller::database::connection::setup_database;
use bosroller::database::entities::{TeamRole, VideoStatus};
use bosroller::services::{NewTeamMember, TeamService, VideoAnalysisService};
use bosroller::storage::MemoryObjectStore;

/// Reads records straight from the service and counts fetches.
struct ServiceSource {
    videos: VideoAnalysisService,
    fetches: AtomicU32,
}

#[async_trait]
impl AnalysisSource for ServiceSource {
    async fn fetch_analysis(&self, id: &str) -> Result<Option<VideoAnalysis>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.videos.find(id).await.map_err(|e| ClientError::Api {
            status: e.kind().http_status_code(),
            message: e.message().to_string(),
        })
    }
}

async fn setup() -> Result<(NamedTempFile, DatabaseConnection, VideoAnalysisService, i32)> {
    let db_file = NamedTempFile::new()?;
    let db = Database::connect(format!("sqlite://{}?mode=rwc", db_file.path().display())).await?;
    setup_database(&db).await?;

    let member = TeamService::new(db.clone())
        .add_member(NewTeamMember {
            name: "Creator".to_string(),
            email: "creator@bosroller.test".to_string(),
            password: "correct-horse".to_string(),
            role: TeamRole::Member,
        })
        .await?;

    let videos = VideoAnalysisService::new(
        db.clone(),
        Arc::new(MemoryObjectStore::new()),
        "videos",
        "http://studio.test",
    );
    Ok((db_file, db, videos, member.user_id))
}

fn fast_poller() -> AnalysisPoller {
    AnalysisPoller::new(CancellationToken::new()).with_interval(Duration::from_millis(5))
}

#[tokio::test]
async fn exhausted_poll_leaves_record_processing() -> Result<()> {
    let (_file, _db, videos, user_id) = setup().await?;
    let record = videos.create(user_id, "clip.mp4", 5_000_000, Some(42)).await?;
    videos
        .set_url(user_id, &record.id, "http://studio.test/clip.mp4")
        .await?;

    let source = ServiceSource {
        videos: videos.clone(),
        fetches: AtomicU32::new(0),
    };
    let mut session = AnalyzerSession::new(vec![record.clone()]);

    let outcome = fast_poller()
        .poll(&source, &record.id, |r| session.apply(r))
        .await?;

    let PollOutcome::Exhausted(Some(last)) = outcome else {
        panic!("expected the poll to run out of attempts, got {:?}", outcome);
    };
    assert!(!PollOutcome::Exhausted(None).is_terminal());
    assert_eq!(last.status, "processing");
    assert_eq!(last.file_size, Some(5_000_000));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 60);

    let stored = videos.find(&record.id).await?.unwrap();
    assert_eq!(stored.video_status()?, VideoStatus::Processing);
    assert!(stored.analysis_data.is_none());
    assert!(stored.error_message.is_none());
    assert_eq!(session.videos[0].status, "processing");
    Ok(())
}

#[tokio::test]
async fn poll_stops_after_callback_completes_record() -> Result<()> {
    let (_file, _db, videos, user_id) = setup().await?;
    let record = videos.create(user_id, "clip.mp4", 1_000, None).await?;
    videos
        .set_url(user_id, &record.id, "http://studio.test/clip.mp4")
        .await?;

    let source = Arc::new(ServiceSource {
        videos: videos.clone(),
        fetches: AtomicU32::new(0),
    });
    let poller = AnalysisPoller::new(CancellationToken::new())
        .with_interval(Duration::from_millis(20));

    let callback = {
        let videos = videos.clone();
        let id = record.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(70)).await;
            videos
                .apply_callback(
                    &id,
                    VideoStatus::Completed,
                    Some(json!({ "viralityEvaluation": { "viralityScore": 64 } })),
                    None,
                )
                .await
        })
    };

    let mut session = AnalyzerSession::new(vec![record.clone()]);
    let outcome = poller
        .poll(source.as_ref(), &record.id, |r| session.apply(r))
        .await?;
    callback.await??;

    let PollOutcome::Completed(done) = outcome else {
        panic!("expected completion, got {:?}", outcome);
    };
    assert_eq!(done.analysis_data.unwrap()["viralityEvaluation"]["viralityScore"], 64);

    let fetches_at_completion = source.fetches.load(Ordering::SeqCst);
    assert!(fetches_at_completion < 60);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.fetches.load(Ordering::SeqCst), fetches_at_completion);

    assert_eq!(session.current.unwrap().status, "completed");
    assert_eq!(session.videos[0].status, "completed");
    Ok(())
}

#[tokio::test]
async fn poll_reports_failure_with_message() -> Result<()> {
    let (_file, _db, videos, user_id) = setup().await?;
    let record = videos.create(user_id, "clip.mp4", 1_000, None).await?;
    videos
        .set_url(user_id, &record.id, "http://studio.test/clip.mp4")
        .await?;
    videos
        .apply_callback(&record.id, VideoStatus::Failed, None, Some("NULL"))
        .await?;

    let source = ServiceSource {
        videos,
        fetches: AtomicU32::new(0),
    };
    let outcome = fast_poller().poll(&source, &record.id, |_| {}).await?;

    let PollOutcome::Failed(failed) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert_eq!(failed.error_message.as_deref(), Some("Analysis failed"));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn poll_stops_when_record_is_deleted() -> Result<()> {
    let (_file, _db, videos, user_id) = setup().await?;
    let record = videos.create(user_id, "clip.mp4", 1_000, None).await?;
    videos.delete(user_id, &record.id).await?;

    let source = ServiceSource {
        videos,
        fetches: AtomicU32::new(0),
    };
    let outcome = fast_poller().poll(&source, &record.id, |_| {}).await?;

    assert_eq!(outcome, PollOutcome::Missing);
    Ok(())
}
