use anyhow::{anyhow, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use super::types::{
    Assistant, AssistantRequest, Run, RunRequest, Thread, ThreadRequest, ThreadState,
};

pub const API_HOST: &str = "http://127.0.0.1:8000";
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A non-success response, carrying the server's `{"error": ...}` text when there is one
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct ApiStatusError {
    pub status: StatusCode,
    pub message: String,
}

/// Client for the assistants / threads / runs API
pub struct ApiClient {
    client: Client,
    host: String,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new<S: Into<String>>(host: S, api_key: Option<String>) -> Result<Self> {
        // Runs answer only once the agent loop is done
        let client = Client::builder().timeout(Duration::from_secs(600)).build()?;
        Ok(Self {
            client,
            host: host.into(),
            api_key,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.host.trim_end_matches('/'), path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(ApiStatusError { status, message }.into())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn health(&self) -> Result<Value> {
        self.get("/health").await
    }

    pub async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant> {
        self.post("/assistants", request).await
    }

    pub async fn list_assistants(&self) -> Result<Vec<Assistant>> {
        self.get("/assistants").await
    }

    pub async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        self.get(&format!("/assistants/{}", assistant_id)).await
    }

    /// Change the fields set in `request`, keeping the rest
    pub async fn update_assistant(
        &self,
        assistant_id: &str,
        request: &AssistantRequest,
    ) -> Result<Assistant> {
        let path = format!("/assistants/{}", assistant_id);
        self.send(self.request(Method::PATCH, &path).json(request))
            .await
    }

    pub async fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        let path = format!("/assistants/{}", assistant_id);
        let _: Value = self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    pub async fn create_thread(&self, request: &ThreadRequest) -> Result<Thread> {
        self.post("/threads", request).await
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.get(&format!("/threads/{}", thread_id)).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let path = format!("/threads/{}", thread_id);
        let _: Value = self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    pub async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState> {
        self.get(&format!("/threads/{}/state", thread_id)).await
    }

    pub async fn create_run(&self, thread_id: &str, request: &RunRequest) -> Result<Run> {
        self.post(&format!("/threads/{}/runs", thread_id), request)
            .await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .await
    }

    /// Poll a run until it reaches a terminal status
    pub async fn wait_for_run(
        &self,
        thread_id: &str,
        run_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Run> {
        let deadline = Instant::now() + timeout;
        loop {
            let run = self.get_run(thread_id, run_id).await?;
            if run.status.is_terminal() {
                return Ok(run);
            }
            debug!(%run_id, status = ?run.status, "run still pending");
            if Instant::now() + poll_interval > deadline {
                return Err(anyhow!(
                    "Run {} did not complete within {:?}",
                    run_id,
                    timeout
                ));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Start a run with one user question and wait for it to finish
    pub async fn ask(
        &self,
        thread_id: &str,
        assistant_id: Option<&str>,
        text: &str,
    ) -> Result<Run> {
        let request = RunRequest::user(assistant_id.map(str::to_string), text);
        let run = self.create_run(thread_id, &request).await?;
        if run.status.is_terminal() {
            return Ok(run);
        }
        self.wait_for_run(thread_id, &run.run_id, DEFAULT_WAIT_TIMEOUT, DEFAULT_POLL_INTERVAL)
            .await
    }
}
