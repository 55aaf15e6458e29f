//! Typed client for the download-queue REST API.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sluice_api_models::{
    BulkDeleteRequest, BulkPriorityRequest, DisplayPreferences, ErrorBody, HistoryResponse,
    MutationResponse, PollResponse, Priority, PriorityRequest, SpeedLimit,
};

use crate::error::{ApiError, ApiResult};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Endpoint for the combined queue and status snapshot.
pub const POLL_PATH: &str = "/poll";
/// Endpoint for history records.
pub const HISTORY_PATH: &str = "/history";
/// Endpoint for the global speed limit.
pub const SPEED_LIMIT_PATH: &str = "/speed-limit";
/// Endpoint for display preferences.
pub const DISPLAY_PREFS_PATH: &str = "/settings/display-prefs";

/// Thin typed wrapper around an [`HttpTransport`].
#[derive(Clone)]
pub struct PanelApi {
    transport: Arc<dyn HttpTransport>,
}

impl PanelApi {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Fetch the queue snapshot and global status.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status, or an undecodable body.
    pub async fn poll(&self) -> ApiResult<PollResponse> {
        self.fetch(ApiRequest::get(POLL_PATH)).await
    }

    /// Fetch up to `limit` history records.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status, or an undecodable body.
    pub async fn history(&self, limit: usize) -> ApiResult<HistoryResponse> {
        self.fetch(ApiRequest::get(HISTORY_PATH).with_query("limit", limit.to_string()))
            .await
    }

    /// Pause one item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn pause(&self, id: &str) -> ApiResult<MutationResponse> {
        self.mutate(ApiRequest::post(format!("{}/pause", item_path(id))))
            .await
    }

    /// Resume one item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn resume(&self, id: &str) -> ApiResult<MutationResponse> {
        self.mutate(ApiRequest::post(format!("{}/resume", item_path(id))))
            .await
    }

    /// Remove one item from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn remove(&self, id: &str) -> ApiResult<MutationResponse> {
        self.mutate(ApiRequest::delete(item_path(id))).await
    }

    /// Change the priority of one item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn set_priority(&self, id: &str, priority: Priority) -> ApiResult<MutationResponse> {
        let request = ApiRequest::post(format!("{}/priority", item_path(id)))
            .with_body(to_body(&PriorityRequest { priority }));
        self.mutate(request).await
    }

    /// Change the priority of several items at once.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn bulk_priority(
        &self,
        ids: &[String],
        priority: Priority,
    ) -> ApiResult<MutationResponse> {
        let request = ApiRequest::post("/queue/bulk/priority").with_body(to_body(
            &BulkPriorityRequest {
                ids: ids.to_vec(),
                priority,
            },
        ));
        self.mutate(request).await
    }

    /// Remove several items at once.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn bulk_delete(&self, ids: &[String]) -> ApiResult<MutationResponse> {
        let request = ApiRequest::post("/queue/bulk/delete")
            .with_body(to_body(&BulkDeleteRequest { ids: ids.to_vec() }));
        self.mutate(request).await
    }

    /// Pause the whole queue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn pause_all(&self) -> ApiResult<MutationResponse> {
        self.mutate(ApiRequest::post("/queue/pause-all")).await
    }

    /// Resume the whole queue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn resume_all(&self) -> ApiResult<MutationResponse> {
        self.mutate(ApiRequest::post("/queue/resume-all")).await
    }

    /// Delete one history record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn delete_history(&self, id: &str) -> ApiResult<MutationResponse> {
        let path = format!("{HISTORY_PATH}/{}", urlencoding::encode(id));
        self.mutate(ApiRequest::delete(path)).await
    }

    /// Delete every history record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn clear_history(&self) -> ApiResult<MutationResponse> {
        self.mutate(ApiRequest::delete(HISTORY_PATH)).await
    }

    /// Read the global throughput cap.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status, or an undecodable body.
    pub async fn speed_limit(&self) -> ApiResult<SpeedLimit> {
        self.fetch(ApiRequest::get(SPEED_LIMIT_PATH)).await
    }

    /// Set the global throughput cap.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not apply the mutation.
    pub async fn set_speed_limit(&self, speed_limit_bps: u64) -> ApiResult<MutationResponse> {
        let request = ApiRequest::post(SPEED_LIMIT_PATH)
            .with_body(to_body(&SpeedLimit { speed_limit_bps }));
        self.mutate(request).await
    }

    /// Read the stored display preferences.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status, or an undecodable body.
    pub async fn display_preferences(&self) -> ApiResult<DisplayPreferences> {
        self.fetch(ApiRequest::get(DISPLAY_PREFS_PATH)).await
    }

    /// Persist the full display preferences object.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the backend does not store the preferences.
    pub async fn save_display_preferences(
        &self,
        prefs: &DisplayPreferences,
    ) -> ApiResult<MutationResponse> {
        let request = ApiRequest::post(DISPLAY_PREFS_PATH).with_body(to_body(prefs));
        self.mutate(request).await
    }

    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let path = request.path.clone();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| ApiError::Transport {
                path: path.clone(),
                source,
            })?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify_failure(&path, &response))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        serde_json::from_slice(&response.body).map_err(|source| ApiError::Malformed { path, source })
    }

    async fn mutate(&self, request: ApiRequest) -> ApiResult<MutationResponse> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        let outcome = if response.body.iter().all(u8::is_ascii_whitespace) {
            MutationResponse::default()
        } else {
            serde_json::from_slice::<MutationResponse>(&response.body).unwrap_or_default()
        };
        if outcome.success {
            Ok(outcome)
        } else {
            Err(ApiError::Application {
                path,
                status: response.status,
                message: outcome
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "the server did not apply the change".to_string()),
            })
        }
    }
}

fn item_path(id: &str) -> String {
    format!("/queue/{}", urlencoding::encode(id))
}

fn to_body<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Classify a non-2xx response into an application error.
fn classify_failure(path: &str, response: &ApiResponse) -> ApiError {
    let body_text = String::from_utf8_lossy(&response.body).trim().to_string();
    let message = serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.text().map(str::to_string))
        .unwrap_or_else(|| {
            if body_text.is_empty() || body_text.starts_with('{') {
                format!("request failed with status {}", response.status)
            } else {
                body_text
            }
        });
    ApiError::Application {
        path: path.to_string(),
        status: response.status,
        message,
    }
}
