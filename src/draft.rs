use crate::error::ComposeError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard cap on non-empty recipients per dispatch, and soft cap on rows per list.
pub const MAX_RECIPIENTS: usize = 100;
pub const MAX_ATTACHMENTS: usize = 10;
/// 30 MiB across all attachments of one dispatch.
pub const MAX_ATTACHMENT_BYTES: u64 = 30 * 1024 * 1024;

/// An ordered list of address rows that always holds at least one row.
///
/// Every mutation goes through `add`, `update` or `remove`, which keep the
/// list non-empty so the form always has an editable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryList {
    entries: Vec<String>,
}

impl Default for EntryList {
    fn default() -> Self {
        Self {
            entries: vec![String::new()],
        }
    }
}

impl EntryList {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            Self::default()
        } else {
            Self { entries }
        }
    }

    /// Appends an empty row. Refused once the list holds `MAX_RECIPIENTS` rows.
    pub fn add(&mut self) -> bool {
        if self.entries.len() >= MAX_RECIPIENTS {
            return false;
        }
        self.entries.push(String::new());
        true
    }

    pub fn update(&mut self, index: usize, value: impl Into<String>) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                *entry = value.into();
                true
            }
            None => false,
        }
    }

    /// Removes the row at `index`. Removing the last row leaves a single empty one.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        self.entries.remove(index);
        if self.entries.is_empty() {
            self.entries.push(String::new());
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows that contain something other than whitespace, in order, as typed.
    pub fn filtered(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Which of the three address lists an operation targets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ListField {
    Recipients,
    Cc,
    Bcc,
}

/// A file picked for sending. Content is read only when the request goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

impl Attachment {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a file", path.display());
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
        })
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// Splits operator input into paths. Paths are separated by `;` or newlines.
pub fn parse_attachment_paths(input: &str) -> Vec<PathBuf> {
    input
        .split(|c: char| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

pub async fn load_attachments(paths: &[PathBuf]) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        attachments.push(Attachment::from_path(path).await?);
    }
    Ok(attachments)
}

pub fn check_attachments(attachments: &[Attachment]) -> Result<(), ComposeError> {
    if attachments.len() > MAX_ATTACHMENTS {
        return Err(ComposeError::TooManyAttachments(attachments.len()));
    }

    let total: u64 = attachments.iter().map(|a| a.size).sum();
    if total > MAX_ATTACHMENT_BYTES {
        return Err(ComposeError::AttachmentsTooLarge(total));
    }

    Ok(())
}

/// Connection settings a fresh draft starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDefaults {
    pub sender: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// Look the default SMTP password up in the OS keyring instead.
    pub password_in_keyring: bool,
    pub use_tls: bool,
    pub verify_certificate: bool,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            sender: String::new(),
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            password_in_keyring: false,
            use_tls: true,
            verify_certificate: true,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DraftMessage {
    pub recipients: EntryList,
    pub cc: EntryList,
    pub bcc: EntryList,
    pub sender: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub use_tls: bool,
    pub verify_certificate: bool,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl DraftMessage {
    pub fn new(defaults: &ConnectionDefaults) -> Self {
        Self {
            recipients: EntryList::default(),
            cc: EntryList::default(),
            bcc: EntryList::default(),
            sender: defaults.sender.clone(),
            smtp_host: defaults.smtp_host.clone(),
            smtp_port: defaults.smtp_port,
            smtp_username: defaults.smtp_username.clone(),
            smtp_password: defaults.smtp_password.clone(),
            use_tls: defaults.use_tls,
            verify_certificate: defaults.verify_certificate,
            subject: String::new(),
            body: String::new(),
            attachments: Vec::new(),
        }
    }

    pub fn list(&self, field: ListField) -> &EntryList {
        match field {
            ListField::Recipients => &self.recipients,
            ListField::Cc => &self.cc,
            ListField::Bcc => &self.bcc,
        }
    }

    pub fn list_mut(&mut self, field: ListField) -> &mut EntryList {
        match field {
            ListField::Recipients => &mut self.recipients,
            ListField::Cc => &mut self.cc,
            ListField::Bcc => &mut self.bcc,
        }
    }

    pub fn total_attachment_size(&self) -> u64 {
        self.attachments.iter().map(|a| a.size).sum()
    }
}

impl std::fmt::Debug for DraftMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftMessage")
            .field("recipients", &self.recipients)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("sender", &self.sender)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .field("verify_certificate", &self.verify_certificate)
            .field("subject", &self.subject)
            .field("attachments", &self.attachments.len())
            .finish_non_exhaustive()
    }
}
