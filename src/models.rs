use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DispatchStatus {
    Pending,
    Success,
    Failed,
    Other(String),
}

impl From<String> for DispatchStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => DispatchStatus::Pending,
            "success" => DispatchStatus::Success,
            "failed" => DispatchStatus::Failed,
            _ => DispatchStatus::Other(value),
        }
    }
}

impl From<DispatchStatus> for String {
    fn from(value: DispatchStatus) -> Self {
        value.as_str().to_string()
    }
}

impl DispatchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Success => "success",
            DispatchStatus::Failed => "failed",
            DispatchStatus::Other(raw) => raw,
        }
    }
}

/// Address fields come back as arrays, but older rows may hold a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AddressList(pub Vec<String>);

impl<'de> Deserialize<'de> for AddressList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Many(Vec<String>),
            One(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Many(addresses) => AddressList(addresses),
            Raw::One(address) => AddressList(vec![address]),
        })
    }
}

impl AddressList {
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|a| a.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchLogEntry {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub sent_at: Option<String>,
    pub sender_email: String,
    pub recipient_emails: AddressList,
    #[serde(default)]
    pub cc_emails: Option<AddressList>,
    #[serde(default)]
    pub bcc_emails: Option<AddressList>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default)]
    pub smtp_port: u16,
    #[serde(default)]
    pub use_ssl: Option<String>,
    pub status: DispatchStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub attachment_count: u32,
    #[serde(default)]
    pub total_attachment_size: u64,
}

impl DispatchLogEntry {
    pub fn created_at_local(&self) -> Option<DateTime<Local>> {
        parse_timestamp(&self.created_at)
    }

    pub fn sent_at_local(&self) -> Option<DateTime<Local>> {
        self.sent_at.as_deref().and_then(parse_timestamp)
    }
}

/// Body of a send response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub log_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl DispatchReceipt {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

/// Accepts RFC 3339 as well as the zone-less ISO timestamps the service
/// writes for UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().with_timezone(&Local))
}
