//! Azure Custom Voice model training API.

use crate::error::{ProviderError, service_status_error, service_transport_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use vocalis_abstraction::{
    JobStatus, JobStatusReport, ServiceError, TrainingSubmission, VoiceTrainingService,
};

pub const API_VERSION: &str = "2024-02-01-preview";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CustomVoiceClient {
    http_client: Client,
    /// e.g. `https://westeurope.api.cognitive.microsoft.com`
    endpoint: String,
    subscription_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelRequest<'a> {
    voice_name: &'a str,
    description: &'a str,
    locale: &'a str,
    recipe: Recipe,
    training_set_url: &'a str,
}

#[derive(Debug, Serialize)]
struct Recipe {
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResponse {
    id: String,
    status: String,
    created_date_time: DateTime<Utc>,
    #[serde(default)]
    last_action_date_time: Option<DateTime<Utc>>,
}

impl ModelResponse {
    fn into_report(self) -> Result<JobStatusReport, ServiceError> {
        let status = map_status(&self.status)?;
        Ok(JobStatusReport {
            job_id: self.id,
            status,
            created_at: self.created_date_time,
            updated_at: self.last_action_date_time.unwrap_or(self.created_date_time),
        })
    }
}

fn map_status(status: &str) -> Result<JobStatus, ServiceError> {
    match status {
        "NotStarted" => Ok(JobStatus::Pending),
        "Running" => Ok(JobStatus::Running),
        "Succeeded" => Ok(JobStatus::Succeeded),
        "Failed" | "Disabling" | "Disabled" => Ok(JobStatus::Failed),
        other => Err(ServiceError::InvalidResponse(format!("unknown model status {other:?}"))),
    }
}

/// Model ids are lowercase letters, digits and `-`, made unique per submission.
fn model_id(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    if slug.is_empty() { format!("voice-{suffix}") } else { format!("{slug}-{suffix}") }
}

impl CustomVoiceClient {
    pub fn new(endpoint: impl Into<String>, subscription_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            subscription_key: subscription_key.into(),
        })
    }

    fn model_url(&self, id: &str) -> String {
        format!(
            "{}/customvoice/models/{}?api-version={API_VERSION}",
            self.endpoint,
            urlencoding::encode(id)
        )
    }

    async fn parse(response: Response, operation: &str) -> Result<JobStatusReport, ServiceError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| service_transport_error(&e, operation))?;
        if !status.is_success() {
            return Err(service_status_error(status, &body, operation));
        }
        let model: ModelResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("{operation}: {e}")))?;
        model.into_report()
    }
}

#[async_trait]
impl VoiceTrainingService for CustomVoiceClient {
    async fn submit_training(
        &self,
        submission: &TrainingSubmission,
    ) -> Result<JobStatusReport, ServiceError> {
        let id = model_id(&submission.name);
        let operation = format!("create model {id}");
        let request = ModelRequest {
            voice_name: &submission.name,
            description: &submission.description,
            locale: &submission.locale,
            recipe: Recipe { kind: "Default" },
            training_set_url: &submission.manifest_reference,
        };

        debug!(model_id = %id, locale = %submission.locale, "Submitting custom voice model");
        let response = self
            .http_client
            .put(self.model_url(&id))
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| service_transport_error(&e, &operation))?;

        Self::parse(response, &operation).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ServiceError> {
        let operation = format!("get model {job_id}");
        let response = self
            .http_client
            .get(self.model_url(job_id))
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .send()
            .await
            .map_err(|e| service_transport_error(&e, &operation))?;

        Self::parse(response, &operation).await
    }
}
