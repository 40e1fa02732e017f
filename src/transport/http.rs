//! HTTP API client: the fallback command path plus the dashboard endpoints
//! (history, chat list, profile, document processing).

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use super::FallbackApi;
use crate::config::ClientConfig;
use crate::error::DracoError;
use crate::protocol::{
    AckResponse, ChatsResponse, DracoReply, HistoryResponse, ProfileResponse, SelectChatRequest,
    UploadOutcome, UserCommand, UserProfile,
};

/// Upload chunk size; one progress event per chunk.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Progress of an in-flight document upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

/// Client for the backend's HTTP API. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        // reqwest::Client::builder() can fail in extreme environments;
        // unwrap_or_default() falls back to a default client instead of
        // panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.http_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DracoError> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DracoError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(DracoError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.json::<T>().await.map_err(|e| DracoError::Json {
            context: path.to_string(),
            detail: e.to_string(),
        })
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DracoError> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DracoError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(DracoError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.json::<T>().await.map_err(|e| DracoError::Json {
            context: path.to_string(),
            detail: e.to_string(),
        })
    }

    /// `GET /api/chat_history`
    pub async fn chat_history(&self) -> Result<HistoryResponse, DracoError> {
        self.get_json("/api/chat_history").await
    }

    /// `GET /api/chats`
    pub async fn chats(&self) -> Result<ChatsResponse, DracoError> {
        self.get_json("/api/chats").await
    }

    /// `POST /api/chats/select`
    pub async fn select_chat(&self, chat_id: &str) -> Result<AckResponse, DracoError> {
        self.post_json(
            "/api/chats/select",
            &SelectChatRequest {
                chat_id: chat_id.to_string(),
            },
        )
        .await
    }

    /// `GET /api/guest_profile`
    pub async fn guest_profile(&self) -> Result<ProfileResponse, DracoError> {
        self.get_json("/api/guest_profile").await
    }

    /// `POST /api/profile` or `POST /api/guest_profile`
    pub async fn set_profile(
        &self,
        profile: &UserProfile,
        guest: bool,
    ) -> Result<AckResponse, DracoError> {
        let path = if guest { "/api/guest_profile" } else { "/api/profile" };
        self.post_json(path, profile).await
    }

    /// `POST /api/profile/clear` or `POST /api/guest_profile/clear`
    pub async fn clear_profile(&self, guest: bool) -> Result<AckResponse, DracoError> {
        let path = if guest {
            "/api/guest_profile/clear"
        } else {
            "/api/profile/clear"
        };
        self.post_json(path, &serde_json::json!({})).await
    }

    /// `POST /api/upload_process`: multipart `file` + `instruction`.
    ///
    /// The file is streamed in [`UPLOAD_CHUNK`]-sized pieces; each piece sent
    /// produces one [`UploadProgress`] on `progress` (when provided).
    pub async fn upload_process(
        &self,
        file_path: &Path,
        instruction: &str,
        progress: Option<mpsc::UnboundedSender<UploadProgress>>,
    ) -> Result<UploadOutcome, DracoError> {
        let total = tokio::fs::metadata(file_path).await?.len();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        let mut file = tokio::fs::File::open(file_path).await?;

        let (body_tx, body_rx) = mpsc::channel::<Result<Vec<u8>, std::io::Error>>(4);
        tokio::spawn(async move {
            let mut sent = 0u64;
            let mut buf = vec![0u8; UPLOAD_CHUNK];
            loop {
                match file.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        sent += n as u64;
                        if body_tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                            return;
                        }
                        if let Some(tx) = &progress {
                            let _ = tx.send(UploadProgress { sent, total });
                        }
                    }
                    Err(e) => {
                        let _ = body_tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(ReceiverStream::new(body_rx)),
            total,
        )
        .file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .text("instruction", instruction.to_string())
            .part("file", part);

        let url = self.url("/api/upload_process");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DracoError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(DracoError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.json::<UploadOutcome>()
            .await
            .map_err(|e| DracoError::Json {
                context: "/api/upload_process".to_string(),
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl FallbackApi for ApiClient {
    /// `POST /api/command`: the fallback delivery path.
    ///
    /// A body that fails to parse as a structured reply degrades to a
    /// plain-text reply carrying the raw payload.
    async fn send_command(&self, command: &UserCommand) -> Result<DracoReply, DracoError> {
        let url = self.url("/api/command");
        let resp = self
            .client
            .post(&url)
            .json(command)
            .send()
            .await
            .map_err(|e| DracoError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(DracoError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        let raw = resp
            .text()
            .await
            .map_err(|e| DracoError::from_request(&url, e))?;
        Ok(serde_json::from_str::<DracoReply>(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "unparsable command reply, degrading to raw text");
            DracoReply::raw(raw)
        }))
    }
}
