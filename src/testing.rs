//! In-memory `DispatchService` for unit tests.

use crate::error::ServiceError;
use crate::models::{AddressList, DispatchLogEntry, DispatchReceipt, DispatchStatus, HealthStatus};
use crate::payload::DispatchRequest;
use crate::service::DispatchService;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum SendScript {
    Receipt(DispatchReceipt),
    Rejected(u16, Option<String>),
    Unreachable,
}

impl SendScript {
    pub fn success(message: &str) -> Self {
        SendScript::Receipt(DispatchReceipt {
            status: "success".to_string(),
            message: message.to_string(),
            log_id: Some("log-1".to_string()),
            created_at: None,
        })
    }

    pub fn failed(message: &str) -> Self {
        SendScript::Receipt(DispatchReceipt {
            status: "failed".to_string(),
            message: message.to_string(),
            log_id: Some("log-1".to_string()),
            created_at: None,
        })
    }
}

/// A real connection error, so `Transport` is exercised as in production.
pub async fn transport_error() -> ServiceError {
    match reqwest::Client::new().get("http://127.0.0.1:1/").send().await {
        Ok(_) => panic!("nothing should listen on port 1"),
        Err(e) => ServiceError::Transport(e),
    }
}

pub fn log_entry(id: &str, status: &str) -> DispatchLogEntry {
    DispatchLogEntry {
        id: id.to_string(),
        created_at: "2024-05-01T10:00:00".to_string(),
        sent_at: None,
        sender_email: "ops@example.com".to_string(),
        recipient_emails: AddressList(vec!["a@x.io".to_string()]),
        cc_emails: None,
        bcc_emails: None,
        subject: format!("Subject {id}"),
        body: "Body".to_string(),
        smtp_host: "smtp.example.com".to_string(),
        smtp_port: 587,
        use_ssl: Some("true".to_string()),
        status: DispatchStatus::from(status.to_string()),
        error_message: None,
        attachment_count: 0,
        total_attachment_size: 0,
    }
}

pub struct FakeService {
    send: SendScript,
    sent: Mutex<Vec<DispatchRequest>>,
    logs: Option<Vec<DispatchLogEntry>>,
    list_answers: Mutex<VecDeque<(Vec<DispatchLogEntry>, Duration)>>,
    details: HashMap<String, (DispatchLogEntry, Duration)>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self::with_send(SendScript::success("Sent"))
    }
}

impl FakeService {
    pub fn with_send(send: SendScript) -> Self {
        Self {
            send,
            sent: Mutex::new(Vec::new()),
            logs: Some(Vec::new()),
            list_answers: Mutex::new(VecDeque::new()),
            details: HashMap::new(),
        }
    }

    /// `None` makes `list_logs` fail.
    pub fn with_logs(mut self, logs: Option<Vec<DispatchLogEntry>>) -> Self {
        self.logs = logs;
        self
    }

    /// Answers for successive `list_logs` calls, each after its delay.
    /// Once used up, calls fall back to `with_logs`.
    pub fn with_list_answers(self, answers: Vec<(Vec<DispatchLogEntry>, Duration)>) -> Self {
        if let Ok(mut queue) = self.list_answers.lock() {
            queue.extend(answers);
        }
        self
    }

    pub fn with_detail(mut self, entry: DispatchLogEntry, delay: Duration) -> Self {
        self.details.insert(entry.id.clone(), (entry, delay));
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last_sent(&self) -> Option<DispatchRequest> {
        self.sent.lock().ok().and_then(|s| s.last().cloned())
    }
}

#[async_trait]
impl DispatchService for FakeService {
    async fn send(&self, request: DispatchRequest) -> Result<DispatchReceipt, ServiceError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request);
        }
        match &self.send {
            SendScript::Receipt(receipt) => Ok(receipt.clone()),
            SendScript::Rejected(status, detail) => Err(ServiceError::Rejected {
                status: *status,
                detail: detail.clone(),
            }),
            SendScript::Unreachable => Err(transport_error().await),
        }
    }

    async fn list_logs(&self) -> Result<Vec<DispatchLogEntry>, ServiceError> {
        let scripted = self.list_answers.lock().ok().and_then(|mut q| q.pop_front());
        if let Some((entries, delay)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(entries);
        }
        match &self.logs {
            Some(logs) => Ok(logs.clone()),
            None => Err(ServiceError::Rejected {
                status: 500,
                detail: Some("Failed to query logs.".to_string()),
            }),
        }
    }

    async fn get_log(&self, id: &str) -> Result<DispatchLogEntry, ServiceError> {
        match self.details.get(id) {
            Some((entry, delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(entry.clone())
            }
            None => Err(ServiceError::Rejected {
                status: 404,
                detail: Some("Log not found.".to_string()),
            }),
        }
    }

    async fn health(&self) -> Result<HealthStatus, ServiceError> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            service: Some("fake".to_string()),
        })
    }
}
