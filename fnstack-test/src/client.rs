//! Client for the fnstack init/invoke routes

use reqwest::{header::HeaderMap, Client, StatusCode};
use serde_json::{json, Value};

/// Client for interacting with a running fnstack server
pub struct FnStackClient {
    base_url: String,
    client: Client,
}

/// Status, headers and decoded JSON body of one response
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    /// The `message` field of an error body
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

impl FnStackClient {
    /// Create a new client
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /init, omitting `handler` when `None`
    pub async fn init(&self, handler: Option<&str>) -> Result<ApiResponse, ClientError> {
        let body = match handler {
            Some(handler) => json!({ "handler": handler }),
            None => json!({}),
        };
        self.post_json("/init", &body).await
    }

    /// POST /invoke, omitting `context` when `None`
    pub async fn invoke(
        &self,
        event: Value,
        context: Option<Value>,
    ) -> Result<ApiResponse, ClientError> {
        let mut body = json!({ "event": event });
        if let Some(context) = context {
            body["context"] = context;
        }
        self.post_json("/invoke", &body).await
    }

    /// POST a raw body to any path
    pub async fn post_raw(&self, path: &str, body: &str) -> Result<ApiResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<ApiResponse, ClientError> {
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ClientError::ParseError(e.to_string()))?
        };

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Client errors
#[derive(Debug)]
pub enum ClientError {
    RequestError(reqwest::Error),
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::RequestError(e) => write!(f, "Request error: {}", e),
            ClientError::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::RequestError(e)
    }
}
