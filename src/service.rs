use crate::error::ServiceError;
use crate::models::{DispatchLogEntry, DispatchReceipt, HealthStatus};
use crate::payload::{DispatchRequest, FILES_FIELD};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The remote side of the app: sends messages and serves the dispatch log.
#[async_trait]
pub trait DispatchService: Send + Sync {
    async fn send(&self, request: DispatchRequest) -> Result<DispatchReceipt, ServiceError>;
    async fn list_logs(&self) -> Result<Vec<DispatchLogEntry>, ServiceError>;
    async fn get_log(&self, id: &str) -> Result<DispatchLogEntry, ServiceError>;
    async fn health(&self) -> Result<HealthStatus, ServiceError>;
}

#[derive(Clone)]
pub struct HttpDispatchClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl HttpDispatchClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        page_size: u32,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(key).context("API key is not a valid header")?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn build_form(request: DispatchRequest) -> Result<Form, ServiceError> {
        let mut form = Form::new();
        for (name, value) in request.fields {
            form = form.text(name, value);
        }

        for attachment in request.attachments {
            let bytes = tokio::fs::read(&attachment.path)
                .await
                .map_err(|source| ServiceError::Attachment {
                    path: attachment.path.clone(),
                    source,
                })?;
            let part = Part::bytes(bytes)
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.mime_type())?;
            form = form.part(FILES_FIELD, part);
        }

        Ok(form)
    }
}

/// Decodes a success body, or turns an error status into `Rejected` carrying
/// the service's `detail` text when there is one.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail.as_str().map(str::to_string));

    Err(ServiceError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl DispatchService for HttpDispatchClient {
    async fn send(&self, request: DispatchRequest) -> Result<DispatchReceipt, ServiceError> {
        tracing::info!(
            recipients = request.recipient_count(),
            attachments = request.attachments.len(),
            "Dispatching message"
        );

        let form = Self::build_form(request).await?;
        let response = self
            .client
            .post(self.url("/api/v1/email/send"))
            .multipart(form)
            .send()
            .await?;

        let receipt: DispatchReceipt = decode(response).await?;
        tracing::info!(
            status = %receipt.status,
            log_id = receipt.log_id.as_deref().unwrap_or("-"),
            "Dispatch answered"
        );
        Ok(receipt)
    }

    async fn list_logs(&self) -> Result<Vec<DispatchLogEntry>, ServiceError> {
        let response = self
            .client
            .get(self.url("/api/v1/email/logs"))
            .query(&[("skip", 0u32), ("limit", self.page_size)])
            .send()
            .await?;
        decode(response).await
    }

    async fn get_log(&self, id: &str) -> Result<DispatchLogEntry, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/email/logs/{id}")))
            .send()
            .await?;
        decode(response).await
    }

    async fn health(&self) -> Result<HealthStatus, ServiceError> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        decode(response).await
    }
}
