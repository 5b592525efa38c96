//! Polling for an analysis result after the trigger call.
//!
//! The first fetch happens immediately, later ones every [`POLL_INTERVAL`],
//! for at most [`MAX_POLL_ATTEMPTS`] fetches. The loop is bound to a
//! [`CancellationToken`] so a caller that goes away stops it.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ClientError, VideoAnalysis};
use crate::database::entities::VideoStatus;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// Where the poller reads the current record from.
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn fetch_analysis(&self, id: &str) -> Result<Option<VideoAnalysis>, ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(VideoAnalysis),
    Failed(VideoAnalysis),
    /// Attempts ran out before a terminal status. Neither success nor
    /// failure may be reported for the record.
    Exhausted(Option<VideoAnalysis>),
    /// The record disappeared while polling.
    Missing,
    Cancelled,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollOutcome::Completed(_) | PollOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisPoller {
    interval: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl AnalysisPoller {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
            cancel,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Polls `id` until it reaches a terminal status, attempts run out, or
    /// the token is cancelled. `observer` sees every fetched record.
    pub async fn poll<S, F>(
        &self,
        source: &S,
        id: &str,
        mut observer: F,
    ) -> Result<PollOutcome, ClientError>
    where
        S: AnalysisSource + ?Sized,
        F: FnMut(&VideoAnalysis),
    {
        let mut last = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        debug!("Polling for {} cancelled", id);
                        return Ok(PollOutcome::Cancelled);
                    }
                    _ = tokio::time::sleep(self.interval) => {}
                }
            } else if self.cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }

            let record = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                record = source.fetch_analysis(id) => record?,
            };
            let Some(record) = record else {
                warn!("Video {} disappeared while polling", id);
                return Ok(PollOutcome::Missing);
            };

            observer(&record);
            debug!("Poll {}/{} for {}: {}", attempt, self.max_attempts, id, record.status);

            match record.video_status() {
                Ok(VideoStatus::Completed) => {
                    info!("Analysis of {} completed", id);
                    return Ok(PollOutcome::Completed(record));
                }
                Ok(VideoStatus::Failed) => {
                    info!("Analysis of {} failed", id);
                    return Ok(PollOutcome::Failed(record));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Stopping poll for {}: {}", id, e.message());
                    return Ok(PollOutcome::Exhausted(Some(record)));
                }
            }
            last = Some(record);
        }

        info!(
            "Gave up polling {} after {} attempts without a result",
            id, self.max_attempts
        );
        Ok(PollOutcome::Exhausted(last))
    }
}

/// Records held by an interactive analyzer session: the one on screen and
/// the session list.
#[derive(Debug, Default, Clone)]
pub struct AnalyzerSession {
    pub current: Option<VideoAnalysis>,
    pub videos: Vec<VideoAnalysis>,
}

impl AnalyzerSession {
    pub fn new(videos: Vec<VideoAnalysis>) -> Self {
        Self {
            current: videos.first().cloned(),
            videos,
        }
    }

    /// Puts a freshly created record at the top of the list and shows it.
    pub fn push_front(&mut self, record: VideoAnalysis) {
        self.videos.retain(|v| v.id != record.id);
        self.videos.insert(0, record.clone());
        self.current = Some(record);
    }

    /// Replaces the shown record and the matching list entry.
    pub fn apply(&mut self, record: &VideoAnalysis) {
        for entry in self.videos.iter_mut().filter(|v| v.id == record.id) {
            *entry = record.clone();
        }
        self.current = Some(record.clone());
    }

    pub fn remove(&mut self, id: &str) {
        self.videos.retain(|v| v.id != id);
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            self.current = self.videos.first().cloned();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn record(id: &str, status: VideoStatus) -> VideoAnalysis {
        let now = Utc::now();
        VideoAnalysis {
            id: id.to_string(),
            user_id: 1,
            video_url: Some(format!("http://localhost/{}.mp4", id)),
            file_name: "clip.mp4".to_string(),
            file_size: Some(5_000_000),
            duration: Some(30),
            uploaded_at: now,
            status: status.as_str().to_string(),
            analysis_data: None,
            chat_history: json!([]),
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    struct Scripted {
        statuses: Mutex<VecDeque<VideoStatus>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(statuses: impl IntoIterator<Item = VideoStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().collect()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisSource for Scripted {
        async fn fetch_analysis(&self, id: &str) -> Result<Option<VideoAnalysis>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap()
            } else {
                *statuses.front().unwrap()
            };
            Ok(Some(record(id, status)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_completed() {
        let source = Scripted::new([
            VideoStatus::Processing,
            VideoStatus::Processing,
            VideoStatus::Completed,
        ]);
        let poller = AnalysisPoller::new(CancellationToken::new());
        let mut seen = 0;

        let outcome = poller.poll(&source, "v1", |_| seen += 1).await.unwrap();

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(seen, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_failed() {
        let source = Scripted::new([VideoStatus::Failed]);
        let poller = AnalysisPoller::new(CancellationToken::new());

        let outcome = poller.poll(&source, "v1", |_| {}).await.unwrap();

        assert!(matches!(outcome, PollOutcome::Failed(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let source = Scripted::new([VideoStatus::Processing]);
        let token = CancellationToken::new();
        let poller = AnalysisPoller::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            token.cancel();
        });

        let outcome = poller.poll(&source, "v1", |_| {}).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn session_apply_replaces_current_and_list_entry() {
        let mut session = AnalyzerSession::new(vec![
            record("a", VideoStatus::Processing),
            record("b", VideoStatus::Completed),
        ]);
        session.apply(&record("a", VideoStatus::Completed));

        assert_eq!(session.videos[0].status, "completed");
        assert_eq!(session.videos[1].status, "completed");
        assert_eq!(session.current.as_ref().unwrap().id, "a");

        session.push_front(record("c", VideoStatus::Uploading));
        assert_eq!(session.videos.len(), 3);
        assert_eq!(session.videos[0].id, "c");

        session.remove("c");
        assert_eq!(session.current.as_ref().unwrap().id, "a");
    }
}
