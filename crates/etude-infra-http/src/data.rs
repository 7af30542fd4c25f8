use crate::client::ServiceClient;
use async_trait::async_trait;
use etude_ports::services::{
    CreateSessionRequest, DataService, PerformanceRecordDto, PerformanceSubmission, ReferenceDto,
    ServiceError, SessionDto, SessionProgressDto,
};
use etude_ports::types::{ReferenceId, SessionId, UserId};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Client for the data service (sessions, references, performances).
#[derive(Clone, Debug)]
pub struct HttpDataService {
    client: ServiceClient,
}

impl HttpDataService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl DataService for HttpDataService {
    #[tracing::instrument(skip(self, req), fields(user = %req.user_id, reference = %req.reference_id))]
    async fn create_session(&self, req: &CreateSessionRequest) -> Result<SessionDto, ServiceError> {
        self.client.send_json(Method::POST, "sessions", req).await
    }

    #[tracing::instrument(skip(self))]
    async fn end_session(&self, session_id: &SessionId) -> Result<(), ServiceError> {
        self.client
            .send_empty(Method::PATCH, &format!("sessions/{}/end", session_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn reference(&self, reference_id: &ReferenceId) -> Result<ReferenceDto, ServiceError> {
        self.client
            .get_json(&format!("references/{}", reference_id))
            .await
    }

    #[tracing::instrument(skip(self, submission), fields(session = %submission.session, section = %submission.section))]
    async fn create_performance(
        &self,
        submission: &PerformanceSubmission,
    ) -> Result<PerformanceRecordDto, ServiceError> {
        self.client
            .send_json(Method::POST, "performances", submission)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn session_progress(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<SessionProgressDto, ServiceError> {
        let body: Value = self
            .client
            .get_json(&format!("sessions/{}/user/{}/performances", session_id, user_id))
            .await?;
        progress_from(body)
    }
}

/// The endpoint answers either with the aggregate object or with the bare
/// per-section map of performances.
fn progress_from(body: Value) -> Result<SessionProgressDto, ServiceError> {
    let Value::Object(map) = body else {
        return Err(ServiceError::Decode("progress is not an object".to_string()));
    };
    let has_stats = map.keys().any(|key| key.starts_with("overall") || key == "performances");
    if has_stats {
        return serde_json::from_value(Value::Object(map))
            .map_err(|e| ServiceError::Decode(e.to_string()));
    }
    Ok(SessionProgressDto {
        performances: sections_only(map),
        ..SessionProgressDto::default()
    })
}

fn sections_only(map: Map<String, Value>) -> BTreeMap<String, Vec<Value>> {
    map.into_iter()
        .filter_map(|(section, value)| match value {
            Value::Array(items) => Some((section, items)),
            _ => None,
        })
        .collect()
}
