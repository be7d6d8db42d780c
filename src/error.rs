use std::path::PathBuf;
use thiserror::Error;

use crate::draft::{MAX_ATTACHMENTS, MAX_ATTACHMENT_BYTES, MAX_RECIPIENTS};

/// Problems caught in the composer before anything goes over the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Enter at least one recipient email address.")]
    NoRecipients,

    #[error("At most {} recipients are allowed ({0} given).", MAX_RECIPIENTS)]
    TooManyRecipients(usize),

    #[error("At most {} attachments are allowed ({0} selected).", MAX_ATTACHMENTS)]
    TooManyAttachments(usize),

    #[error("Attachments may not exceed {} MB in total ({0} bytes selected).", MAX_ATTACHMENT_BYTES / (1024 * 1024))]
    AttachmentsTooLarge(u64),

    #[error("A message is already being sent.")]
    Busy,
}

/// Failures talking to the dispatch service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No usable response: connection, timeout, or a body that did not decode.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with an HTTP error status.
    #[error("service returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },

    #[error("failed to read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    /// The message the service itself attached to a rejection, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ServiceError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}
