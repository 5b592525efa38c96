//! Minimal Google Drive v3 client used by the configuration probes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::errors::Failure;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Drive API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Drive request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DriveError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DriveError::Api { status, .. } => Some(*status),
            DriveError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn to_failure(&self) -> Failure {
        match self {
            DriveError::Api { status, message } => Failure::status(*status, message.clone()),
            DriveError::Transport(e) => Failure::from_reqwest(e),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_files(&self, page_size: u32) -> Result<Vec<DriveFile>, DriveError>;

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError>;

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile, DriveError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError>;
}

/// Calls the Drive REST API with a pre-minted OAuth access token.
#[derive(Clone)]
pub struct GoogleDriveClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

impl GoogleDriveClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, access_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // Drive wraps errors as {"error": {"message": ...}}
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        Err(DriveError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    async fn list_files(&self, page_size: u32) -> Result<Vec<DriveFile>, DriveError> {
        let response = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("pageSize", page_size.to_string()),
                ("fields", "files(id, name, mimeType)".to_string()),
            ])
            .send()
            .await?;
        let list: FileList = Self::check(response).await?.json().await?;
        Ok(list.files)
    }

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id, name, mimeType")])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile, DriveError> {
        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id, name, mimeType")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        let response = self
            .http
            .delete(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_file_decodes_folder_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files/root123")
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"root123","name":"Studio","mimeType":"application/vnd.google-apps.folder"}"#)
            .create_async()
            .await;

        let client = GoogleDriveClient::with_base_url(server.url(), "token");
        let file = client.get_file("root123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(file.name, "Studio");
        assert!(file.is_folder());
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files/missing")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"File not found: missing."}}"#)
            .create_async()
            .await;

        let client = GoogleDriveClient::with_base_url(server.url(), "token");
        let err = client.get_file("missing").await.unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("File not found"));
    }
}
