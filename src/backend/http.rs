//! HTTP implementation of the execution backend contract
//!
//! Talks JSON to the remote engine's REST surface. The base URL is
//! configurable so tests can point the client at a mock server.

use crate::backend::{
    ExecutionBackend, HistoryMessage, MessageReply, SessionSnapshot, StartedSession,
};
use crate::config::BackendConfig;
use crate::error::{PlaypenError, Result};
use crate::trace::{self, TraceNode};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP client for the playbook execution service
///
/// Stateless: every method is a single request/response exchange and the
/// client retains nothing about any session between calls.
///
/// # Examples
///
/// ```no_run
/// use playpen::backend::{ExecutionBackend, HttpBackend};
/// use playpen::config::BackendConfig;
///
/// let backend = HttpBackend::new(&BackendConfig {
///     api_base: "http://localhost:8000".to_string(),
///     timeout_secs: 30,
/// }).unwrap();
/// # tokio_test::block_on(async {
/// let started = backend.start("# Hello\n...", None).await.unwrap();
/// println!("session: {}", started.session_id);
/// # });
/// ```
pub struct HttpBackend {
    client: Client,
    api_base: String,
}

/// Request body for `POST /sessions`
#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    playbook: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_session_id: Option<&'a str>,
}

/// Response body for `POST /sessions`
#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    success: bool,
    session_id: String,
    #[serde(default)]
    initial_message: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Request body for `POST /sessions/{id}/messages`
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    message: &'a str,
}

/// Response body for `POST /sessions/{id}/messages`
#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    trace_fragment: Option<Value>,
    #[serde(default)]
    new_session_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Response body for `GET /sessions/{id}/traces`
#[derive(Debug, Deserialize)]
struct TracesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    traces: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Response body for `GET /sessions/{id}/history`
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

/// True when a backend error string marks a missing/expired session
fn is_not_found_marker(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("not found") || lowered.contains("expired")
}

impl HttpBackend {
    /// Creates a client for the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(PlaypenError::Http)?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Maps non-2xx statuses onto the error taxonomy
    ///
    /// 404 is the backend's way of saying the session id is unknown;
    /// everything else is a transport failure.
    async fn check_status(response: Response, session_id: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PlaypenError::SessionNotFound(session_id.to_string()).into());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlaypenError::Transport(format!("backend returned {status}: {body}")).into())
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn start(
        &self,
        playbook: &str,
        existing_session_id: Option<&str>,
    ) -> Result<StartedSession> {
        tracing::debug!(reuse = ?existing_session_id, "starting playbook session");

        let response = self
            .client
            .post(self.endpoint("/sessions"))
            .json(&StartRequest {
                playbook,
                existing_session_id,
            })
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        let response = Self::check_status(response, existing_session_id.unwrap_or("-")).await?;
        let body: StartResponse = response.json().await.map_err(PlaypenError::Http)?;

        if !body.success {
            let reason = body
                .message
                .unwrap_or_else(|| "playbook failed to start".to_string());
            return Err(PlaypenError::Backend(reason).into());
        }

        tracing::info!(session_id = %body.session_id, "session started");
        Ok(StartedSession {
            session_id: body.session_id,
            initial_message: body.initial_message,
        })
    }

    async fn resume(&self, session_id: &str) -> Result<SessionSnapshot> {
        tracing::debug!(%session_id, "fetching session snapshot");

        let response = self
            .client
            .get(self.endpoint(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        let response = Self::check_status(response, session_id).await?;
        let body: Value = response.json().await.map_err(PlaypenError::Http)?;

        // Some deployments answer 200 with an error envelope instead of 404.
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("session lookup failed");
            if is_not_found_marker(message) {
                return Err(PlaypenError::SessionNotFound(session_id.to_string()).into());
            }
            return Err(PlaypenError::Backend(message.to_string()).into());
        }

        let playbook = body
            .get("playbook")
            .or_else(|| body.get("playbook_content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let traces = body
            .get("traces")
            .map(trace::extract_trace_nodes)
            .unwrap_or_default();

        let messages = body.get("messages").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        });

        Ok(SessionSnapshot {
            playbook,
            traces,
            messages,
        })
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<MessageReply> {
        tracing::debug!(%session_id, "sending chat turn");

        let response = self
            .client
            .post(self.endpoint(&format!("/sessions/{session_id}/messages")))
            .json(&MessageRequest { message: text })
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        let response = Self::check_status(response, session_id).await?;
        let body: MessageResponse = response.json().await.map_err(PlaypenError::Http)?;

        // An expired session comes back as a failed envelope carrying a fresh
        // id and a courtesy text; that is a reply with a rotation, not an
        // error. Only a failure without a usable reply is surfaced.
        if let Some(error) = &body.error {
            if body.new_session_id.is_none() && body.response.is_empty() {
                return Err(PlaypenError::Backend(error.clone()).into());
            }
            tracing::warn!(%session_id, %error, "backend flagged the turn but returned a reply");
        }

        Ok(MessageReply {
            response: body.response,
            trace_fragment: body.trace_fragment.as_ref().and_then(TraceNode::from_value),
            new_session_id: body.new_session_id,
        })
    }

    async fn stop(&self, session_id: &str) -> Result<()> {
        tracing::debug!(%session_id, "stopping session");

        let response = self
            .client
            .delete(self.endpoint(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        Self::check_status(response, session_id).await?;
        Ok(())
    }

    async fn fetch_trace(&self, session_id: &str) -> Result<Vec<TraceNode>> {
        tracing::debug!(%session_id, "fetching trace data");

        let response = self
            .client
            .get(self.endpoint(&format!("/sessions/{session_id}/traces")))
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        let response = Self::check_status(response, session_id).await?;
        let body: TracesResponse = response.json().await.map_err(PlaypenError::Http)?;

        if !body.success {
            let message = body.error.unwrap_or_else(|| "trace fetch failed".to_string());
            if is_not_found_marker(&message) {
                return Err(PlaypenError::SessionNotFound(session_id.to_string()).into());
            }
            return Err(PlaypenError::Backend(message).into());
        }

        Ok(trace::extract_trace_nodes(&body.traces))
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryMessage>> {
        tracing::debug!(%session_id, "fetching chat history");

        let response = self
            .client
            .get(self.endpoint(&format!("/sessions/{session_id}/history")))
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        let response = Self::check_status(response, session_id).await?;
        let body: HistoryResponse = response.json().await.map_err(PlaypenError::Http)?;
        Ok(body.messages)
    }

    async fn list_playbooks(&self) -> Result<BTreeMap<String, String>> {
        tracing::debug!("fetching example playbook catalog");

        let response = self
            .client
            .get(self.endpoint("/playbooks"))
            .send()
            .await
            .map_err(PlaypenError::Http)?;

        let response = Self::check_status(response, "-").await?;
        let catalog: BTreeMap<String, String> =
            response.json().await.map_err(PlaypenError::Http)?;
        Ok(catalog)
    }
}
