use etude_ports::services::ServiceError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ERROR_BODY: usize = 512;

/// JSON-over-HTTP plumbing shared by the service adapters.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    base_url: String,
    client: Client,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let response = send(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = send(self.request(method, path).json(body)).await?;
        decode(response).await
    }

    /// Sends a JSON body and returns the raw response text.
    pub async fn send_for_text<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<String, ServiceError> {
        let response = send(self.request(method, path).json(body)).await?;
        response
            .text()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Sends a request whose response body is not needed.
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<(), ServiceError> {
        send(self.request(method, path)).await.map(|_| ())
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, ServiceError> {
    let response = builder
        .send()
        .await
        .map_err(|e| ServiceError::Network(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%url, status = status.as_u16(), "service returned an error");
    if status == StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound(url));
    }
    Err(ServiceError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ServiceError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Prefers a `message` or `error` field of a JSON error body.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        });
    match from_json {
        Some(message) => message,
        None => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}
