use crate::draft::{Attachment, ConnectionDefaults, DraftMessage, ListField, check_attachments};
use crate::error::{ComposeError, ServiceError};
use crate::models::DispatchReceipt;
use crate::payload::{DispatchRequest, build_request};
use crate::service::DispatchService;

pub const GENERIC_FAILURE: &str = "An error occurred while sending the email.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// The banner shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// How a finished submission was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The service reported success; the draft was reset.
    Sent,
    /// The service answered but refused or failed the dispatch; draft kept.
    Refused,
    /// No usable answer; draft kept.
    Unreachable,
}

/// Owns the draft and drives it through validation and submission.
pub struct Composer {
    draft: DraftMessage,
    defaults: ConnectionDefaults,
    busy: bool,
    notice: Option<Notice>,
}

impl Composer {
    pub fn new(defaults: ConnectionDefaults) -> Self {
        Self {
            draft: DraftMessage::new(&defaults),
            defaults,
            busy: false,
            notice: None,
        }
    }

    pub fn draft(&self) -> &DraftMessage {
        &self.draft
    }

    /// Scalar fields are edited in place; list rows go through the entry
    /// methods and attachments through `select_attachments`.
    pub fn draft_mut(&mut self) -> &mut DraftMessage {
        &mut self.draft
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn add_entry(&mut self, field: ListField) -> bool {
        self.draft.list_mut(field).add()
    }

    pub fn update_entry(&mut self, field: ListField, index: usize, value: impl Into<String>) -> bool {
        self.draft.list_mut(field).update(index, value)
    }

    pub fn remove_entry(&mut self, field: ListField, index: usize) -> bool {
        self.draft.list_mut(field).remove(index)
    }

    /// Replaces the attachment set, or leaves it untouched and raises an
    /// error notice when the selection breaks the count or size limit.
    pub fn select_attachments(&mut self, selection: Vec<Attachment>) -> Result<(), ComposeError> {
        if let Err(e) = check_attachments(&selection) {
            self.notice = Some(Notice::error(e.to_string()));
            return Err(e);
        }
        self.draft.attachments = selection;
        self.notice = None;
        Ok(())
    }

    pub fn report_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice::error(text));
    }

    /// Validates the draft and marks the composer busy. The returned request
    /// must be resolved with `finish_submit`.
    pub fn begin_submit(&mut self) -> Result<DispatchRequest, ComposeError> {
        if self.busy {
            return Err(ComposeError::Busy);
        }
        self.notice = None;

        match build_request(&self.draft) {
            Ok(request) => {
                self.busy = true;
                Ok(request)
            }
            Err(e) => {
                self.notice = Some(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn finish_submit(&mut self, result: Result<DispatchReceipt, ServiceError>) -> SubmitOutcome {
        self.busy = false;

        match result {
            Ok(receipt) if receipt.is_success() => {
                self.notice = Some(Notice::success(receipt.message));
                self.draft = DraftMessage::new(&self.defaults);
                SubmitOutcome::Sent
            }
            Ok(receipt) => {
                tracing::warn!(status = %receipt.status, "Dispatch reported failure");
                self.notice = Some(Notice::error(receipt.message));
                SubmitOutcome::Refused
            }
            Err(ServiceError::Rejected {
                status,
                detail: Some(detail),
            }) => {
                tracing::warn!(status, "Dispatch rejected");
                self.notice = Some(Notice::error(detail));
                SubmitOutcome::Refused
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dispatch failed");
                self.notice = Some(Notice::error(GENERIC_FAILURE));
                SubmitOutcome::Unreachable
            }
        }
    }

    /// Validates, sends and applies the result in one step.
    pub async fn submit(&mut self, service: &dyn DispatchService) -> Result<SubmitOutcome, ComposeError> {
        let request = self.begin_submit()?;
        let result = service.send(request).await;
        Ok(self.finish_submit(result))
    }
}
