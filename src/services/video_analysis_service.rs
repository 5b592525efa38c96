use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::database::entities::video_analyses::{self, ChatMessage, VideoStatus};
use crate::errors::{CoreError, CoreErrorKind, CoreResult};
use crate::storage::{self, ObjectStore};

/// Stored when a failure callback carries no usable message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed";

/// Normalises the error message of a failure callback.
///
/// Empty values and the literal `"NULL"` some workflows emit fall back to
/// [`DEFAULT_FAILURE_MESSAGE`].
pub fn failure_message(message: Option<&str>) -> String {
    match message.map(str::trim) {
        Some(msg) if !msg.is_empty() && msg != "NULL" => msg.to_string(),
        _ => DEFAULT_FAILURE_MESSAGE.to_string(),
    }
}

/// Reads and writes video analysis records and their stored binaries.
#[derive(Clone)]
pub struct VideoAnalysisService {
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    public_base_url: String,
}

impl VideoAnalysisService {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            store,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn create(
        &self,
        user_id: i32,
        file_name: &str,
        file_size: i64,
        duration: Option<i32>,
    ) -> CoreResult<video_analyses::Model> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(CoreError::validation("fileName is required"));
        }
        if file_size < 0 {
            return Err(CoreError::validation("fileSize must not be negative"));
        }
        if duration.is_some_and(|d| d < 0) {
            return Err(CoreError::validation("duration must not be negative"));
        }

        let record = video_analyses::ActiveModel::new(
            user_id,
            file_name.to_string(),
            file_size,
            duration,
        )
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::database("creating video analysis", e))?;

        info!("Created video analysis {} for user {}", record.id, user_id);
        Ok(record)
    }

    /// Looks a record up regardless of owner, for workflow engine traffic.
    pub async fn find(&self, id: &str) -> CoreResult<Option<video_analyses::Model>> {
        video_analyses::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("loading video analysis", e))
    }

    /// The caller's record, or `None` when it does not exist or is not theirs.
    pub async fn get(&self, user_id: i32, id: &str) -> CoreResult<Option<video_analyses::Model>> {
        Ok(self.find(id).await?.filter(|record| record.user_id == user_id))
    }

    async fn get_owned(&self, user_id: i32, id: &str) -> CoreResult<video_analyses::Model> {
        self.get(user_id, id)
            .await?
            .ok_or_else(|| CoreError::not_found("VideoAnalysis", id))
    }

    /// Newest first.
    pub async fn list(&self, user_id: i32) -> CoreResult<Vec<video_analyses::Model>> {
        video_analyses::Entity::find()
            .filter(video_analyses::Column::UserId.eq(user_id))
            .order_by_desc(video_analyses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("listing video analyses", e))
    }

    /// Stores the binary under `B3CG/{id}.{ext}` and returns its public URL.
    pub async fn upload(
        &self,
        user_id: i32,
        id: &str,
        data: Bytes,
        supplied_name: Option<&str>,
    ) -> CoreResult<String> {
        let record = self.get_owned(user_id, id).await?;

        let mut names = vec![record.file_name.as_str()];
        names.extend(supplied_name);
        let key = storage::video_object_key(&record.id, &names);

        self.store.put_object(&self.bucket, &key, data).await?;

        let url = storage::public_url(&self.public_base_url, &self.bucket, &key);
        info!("Uploaded video {} to {}", record.id, key);
        Ok(url)
    }

    /// Reads back the caller's stored binary, returning its key and bytes.
    pub async fn download(&self, user_id: i32, id: &str) -> CoreResult<(String, Bytes)> {
        let record = self.get_owned(user_id, id).await?;
        let key = record
            .video_url
            .as_deref()
            .and_then(|url| storage::key_from_public_url(url, &self.bucket))
            .unwrap_or_else(|| storage::video_object_key(&record.id, &[record.file_name.as_str()]));

        let data = self.store.get_object(&self.bucket, &key).await?;
        Ok((key, data))
    }

    /// Records the public URL and moves the record to `processing`.
    pub async fn set_url(
        &self,
        user_id: i32,
        id: &str,
        url: &str,
    ) -> CoreResult<video_analyses::Model> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CoreError::validation("videoUrl is required"));
        }

        let record = self.get_owned(user_id, id).await?;
        let current = record.video_status()?;
        if !current.can_transition_to(VideoStatus::Processing) {
            return Err(CoreError::conflict(format!(
                "Cannot move video from {} to {}",
                current,
                VideoStatus::Processing
            ))
            .with_field("videoId", record.id.clone()));
        }

        let mut active: video_analyses::ActiveModel = record.into();
        active.video_url = Set(Some(url.to_string()));
        active.status = Set(VideoStatus::Processing.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("setting video URL", e))
    }

    pub async fn update_chat_history(
        &self,
        user_id: i32,
        id: &str,
        history: &[ChatMessage],
    ) -> CoreResult<video_analyses::Model> {
        let record = self.get_owned(user_id, id).await?;
        let history = serde_json::to_value(history)
            .map_err(|e| CoreError::internal("Failed to encode chat history").with_source(e))?;

        let mut active: video_analyses::ActiveModel = record.into();
        active.chat_history = Set(history);
        active.updated_at = Set(Utc::now());
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("updating chat history", e))
    }

    /// Deletes the record. The stored binary stays in the bucket.
    pub async fn delete(&self, user_id: i32, id: &str) -> CoreResult<()> {
        let record = self.get_owned(user_id, id).await?;
        record
            .delete(&self.db)
            .await
            .map_err(|e| CoreError::database("deleting video analysis", e))?;
        info!("Deleted video analysis {}", id);
        Ok(())
    }

    /// Marks a record failed after the workflow engine refused a trigger.
    /// Only a `processing` record is touched; anything else is returned as is.
    pub async fn mark_failed(&self, id: &str, message: &str) -> CoreResult<video_analyses::Model> {
        let record = self
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found("VideoAnalysis", id))?;

        let current = record.video_status()?;
        if current != VideoStatus::Processing {
            warn!(
                "Trigger for video {} failed while it was {}; leaving it unchanged",
                id,
                current.as_str()
            );
            return Ok(record);
        }

        let now = Utc::now();
        let mut active: video_analyses::ActiveModel = record.into();
        active.status = Set(VideoStatus::Failed.as_str().to_string());
        active.error_message = Set(Some(message.to_string()));
        active.analysis_data = Set(None);
        active.updated_at = Set(now);
        active.completed_at = Set(Some(now));
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("marking video failed", e))
    }

    /// Writes a callback outcome. Repeated callbacks overwrite earlier ones.
    pub async fn apply_callback(
        &self,
        id: &str,
        status: VideoStatus,
        analysis_data: Option<Value>,
        error_message: Option<&str>,
    ) -> CoreResult<video_analyses::Model> {
        if !status.is_terminal() {
            return Err(CoreError::validation(
                "Invalid status. Must be 'completed' or 'failed'",
            ));
        }

        let record = self.find(id).await?.ok_or_else(|| {
            CoreError::new(CoreErrorKind::NotFound, "Video not found")
                .with_field("videoId", id)
        })?;

        let current = record.video_status()?;
        if current.is_terminal() {
            warn!(
                "Video {} already {}, overwriting with {}",
                id, current, status
            );
        } else if current == VideoStatus::Uploading {
            warn!("Video {} received a callback before its URL was set", id);
        }

        let now = Utc::now();
        let mut active: video_analyses::ActiveModel = record.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(now);
        active.completed_at = Set(Some(now));
        match status {
            VideoStatus::Completed => {
                active.analysis_data = Set(analysis_data);
                active.error_message = Set(None);
            }
            _ => {
                active.analysis_data = Set(None);
                active.error_message = Set(Some(failure_message(error_message)));
            }
        }

        let updated = active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("storing analysis result", e))?;
        info!("Video {} is now {}", id, status);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::auth_service::AuthService;
    use crate::storage::MemoryObjectStore;

    async fn setup() -> (VideoAnalysisService, MemoryObjectStore, i32) {
        let db = setup_test_db().await;
        let user = AuthService::new(db.clone())
            .register("creator@studio.test", "Creator", "password123")
            .await
            .unwrap();
        let store = MemoryObjectStore::new();
        let service = VideoAnalysisService::new(
            db,
            Arc::new(store.clone()),
            "videos",
            "http://localhost:3000",
        );
        (service, store, user.id)
    }

    #[test]
    fn failure_message_falls_back_for_null_and_empty() {
        assert_eq!(failure_message(None), "Analysis failed");
        assert_eq!(failure_message(Some("NULL")), "Analysis failed");
        assert_eq!(failure_message(Some("  ")), "Analysis failed");
        assert_eq!(failure_message(Some("Video too long")), "Video too long");
    }

    #[tokio::test]
    async fn upload_then_set_url_moves_to_processing() {
        let (service, store, user_id) = setup().await;
        let record = service
            .create(user_id, "clip.mp4", 5_000_000, Some(42))
            .await
            .unwrap();
        assert_eq!(record.status, "uploading");
        assert_eq!(record.chat_messages(), Vec::new());

        let url = service
            .upload(user_id, &record.id, Bytes::from_static(b"data"), Some("clip.mp4"))
            .await
            .unwrap();
        assert_eq!(
            url,
            format!(
                "http://localhost:3000/storage/v1/object/public/videos/B3CG/{}.mp4",
                record.id
            )
        );
        assert!(store.contains("videos", &format!("B3CG/{}.mp4", record.id)).await);

        let updated = service.set_url(user_id, &record.id, &url).await.unwrap();
        assert_eq!(updated.status, "processing");
        assert_eq!(updated.video_url.as_deref(), Some(url.as_str()));
        assert_eq!(updated.file_size, Some(5_000_000));

        let err = service.set_url(user_id, &record.id, &url).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Conflict);
    }

    #[tokio::test]
    async fn second_upload_does_not_overwrite() {
        let (service, _store, user_id) = setup().await;
        let record = service.create(user_id, "clip.mp4", 4, None).await.unwrap();
        service
            .upload(user_id, &record.id, Bytes::from_static(b"one"), None)
            .await
            .unwrap();
        let err = service
            .upload(user_id, &record.id, Bytes::from_static(b"two"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Conflict);
    }

    #[tokio::test]
    async fn download_reads_the_uploaded_binary() {
        let (service, _store, user_id) = setup().await;
        let record = service.create(user_id, "clip", 4, None).await.unwrap();

        let err = service.download(user_id, &record.id).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::NotFound);

        let url = service
            .upload(user_id, &record.id, Bytes::from_static(b"data"), Some("take.mov"))
            .await
            .unwrap();
        service.set_url(user_id, &record.id, &url).await.unwrap();

        let (key, data) = service.download(user_id, &record.id).await.unwrap();
        assert_eq!(key, format!("B3CG/{}.mov", record.id));
        assert_eq!(&data[..], b"data");

        let err = service.download(user_id + 1, &record.id).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_owner() {
        let (service, _store, user_id) = setup().await;
        let record = service.create(user_id, "clip.mp4", 1, None).await.unwrap();

        assert!(service.get(user_id + 1, &record.id).await.unwrap().is_none());
        assert!(service.get(user_id, &record.id).await.unwrap().is_some());
        assert_eq!(
            service.delete(user_id + 1, &record.id).await.unwrap_err().kind(),
            CoreErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn callbacks_set_result_or_normalised_error() {
        let (service, _store, user_id) = setup().await;
        let record = service.create(user_id, "clip.mp4", 1, None).await.unwrap();

        let data = json!({"viralityEvaluation": {"score": 81}});
        let completed = service
            .apply_callback(&record.id, VideoStatus::Completed, Some(data.clone()), None)
            .await
            .unwrap();
        assert_eq!(completed.analysis_data, Some(data));
        assert!(completed.completed_at.is_some());

        let failed = service
            .apply_callback(&record.id, VideoStatus::Failed, None, Some("NULL"))
            .await
            .unwrap();
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error_message.as_deref(), Some("Analysis failed"));
        assert!(failed.analysis_data.is_none());
    }

    #[tokio::test]
    async fn mark_failed_only_touches_processing_records() {
        let (service, _store, user_id) = setup().await;
        let record = service.create(user_id, "clip.mp4", 1, None).await.unwrap();

        let untouched = service.mark_failed(&record.id, "boom").await.unwrap();
        assert_eq!(untouched.status, "uploading");
        assert!(untouched.error_message.is_none());

        service
            .set_url(user_id, &record.id, "http://localhost:3000/x.mp4")
            .await
            .unwrap();
        let failed = service.mark_failed(&record.id, "boom").await.unwrap();
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        let data = json!({"viralityEvaluation": {"score": 90}});
        service
            .apply_callback(&record.id, VideoStatus::Completed, Some(data.clone()), None)
            .await
            .unwrap();
        let kept = service.mark_failed(&record.id, "boom again").await.unwrap();
        assert_eq!(kept.status, "completed");
        assert_eq!(kept.analysis_data, Some(data));
        assert!(kept.error_message.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (service, _store, user_id) = setup().await;
        let first = service.create(user_id, "a.mp4", 1, None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service.create(user_id, "b.mp4", 1, None).await.unwrap();

        let ids: Vec<String> = service
            .list(user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn chat_history_is_overwritten() {
        let (service, _store, user_id) = setup().await;
        let record = service.create(user_id, "a.mp4", 1, None).await.unwrap();
        let history = vec![
            ChatMessage::user("Is the hook strong?"),
            ChatMessage::assistant("Mostly, tighten the first second."),
        ];
        service
            .update_chat_history(user_id, &record.id, &history)
            .await
            .unwrap();
        let stored = service.get(user_id, &record.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_messages(), history);

        service
            .update_chat_history(user_id, &record.id, &[])
            .await
            .unwrap();
        let stored = service.get(user_id, &record.id).await.unwrap().unwrap();
        assert!(stored.chat_messages().is_empty());
    }
}
