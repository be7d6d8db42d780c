use crate::draft::{Attachment, DraftMessage, MAX_RECIPIENTS};
use crate::error::ComposeError;

/// Multipart name used for every attachment part.
pub const FILES_FIELD: &str = "files";

/// A validated, transport-ready dispatch: ordered text fields plus files.
///
/// Optional fields that do not apply are absent from `fields` rather than
/// present with an empty value.
#[derive(Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub fields: Vec<(&'static str, String)>,
    pub attachments: Vec<Attachment>,
}

impl DispatchRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn recipient_count(&self) -> usize {
        self.field("recipient_emails")
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for DispatchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(key, value)| match *key {
                "smtp_password" => (*key, "<redacted>"),
                _ => (*key, value.as_str()),
            })
            .collect();
        f.debug_struct("DispatchRequest")
            .field("fields", &fields)
            .field("attachments", &self.attachments)
            .finish()
    }
}

fn json_list(list: &[String]) -> String {
    serde_json::Value::from(list.to_vec()).to_string()
}

fn flag(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Validates the draft and lays out the request fields.
pub fn build_request(draft: &DraftMessage) -> Result<DispatchRequest, ComposeError> {
    let recipients = draft.recipients.filtered();
    let cc = draft.cc.filtered();
    let bcc = draft.bcc.filtered();

    if recipients.is_empty() {
        return Err(ComposeError::NoRecipients);
    }
    if recipients.len() > MAX_RECIPIENTS {
        return Err(ComposeError::TooManyRecipients(recipients.len()));
    }

    let mut fields = vec![
        ("recipient_emails", json_list(&recipients)),
        ("sender_email", draft.sender.clone()),
        ("smtp_host", draft.smtp_host.clone()),
        ("smtp_port", draft.smtp_port.to_string()),
        ("smtp_username", draft.smtp_username.clone()),
        ("smtp_password", draft.smtp_password.clone()),
        ("use_ssl", flag(draft.use_tls)),
        ("verify_ssl", flag(draft.verify_certificate)),
    ];
    if !cc.is_empty() {
        fields.push(("cc_emails", json_list(&cc)));
    }
    if !bcc.is_empty() {
        fields.push(("bcc_emails", json_list(&bcc)));
    }
    fields.push(("subject", draft.subject.clone()));
    fields.push(("body", draft.body.clone()));

    Ok(DispatchRequest {
        fields,
        attachments: draft.attachments.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{ConnectionDefaults, EntryList};
    use std::path::PathBuf;

    fn draft() -> DraftMessage {
        let defaults = ConnectionDefaults {
            sender: "ops@example.com".to_string(),
            smtp_host: "smtp.example.com".to_string(),
            smtp_username: "ops".to_string(),
            smtp_password: "secret".to_string(),
            ..Default::default()
        };
        let mut draft = DraftMessage::new(&defaults);
        draft.subject = "Quarterly report".to_string();
        draft.body = "See attached.".to_string();
        draft
    }

    #[test]
    fn test_no_recipients_is_rejected() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["", "  "]);
        assert_eq!(build_request(&d), Err(ComposeError::NoRecipients));
    }

    #[test]
    fn test_too_many_recipients_is_rejected() {
        let mut d = draft();
        let many: Vec<String> = (0..101).map(|i| format!("user{i}@example.com")).collect();
        d.recipients = EntryList::from_entries(many);
        assert_eq!(build_request(&d), Err(ComposeError::TooManyRecipients(101)));
    }

    #[test]
    fn test_hundred_recipients_with_blank_rows_is_accepted() {
        let mut d = draft();
        let mut rows: Vec<String> = (0..100).map(|i| format!("user{i}@example.com")).collect();
        rows.push("   ".to_string());
        d.recipients = EntryList::from_entries(rows);
        let request = build_request(&d).unwrap();
        assert_eq!(request.recipient_count(), 100);
    }

    #[test]
    fn test_recipient_emails_is_filtered_json_array_in_order() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["b@x.io", "", "a@x.io", " "]);
        let request = build_request(&d).unwrap();
        let parsed: Vec<String> =
            serde_json::from_str(request.field("recipient_emails").unwrap()).unwrap();
        assert_eq!(parsed, vec!["b@x.io".to_string(), "a@x.io".to_string()]);
    }

    #[test]
    fn test_blank_cc_and_bcc_are_omitted() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["a@x.io"]);
        d.cc = EntryList::from_entries([""]);
        d.bcc = EntryList::from_entries(["   "]);
        let request = build_request(&d).unwrap();
        assert!(!request.has_field("cc_emails"));
        assert!(!request.has_field("bcc_emails"));
    }

    #[test]
    fn test_cc_and_bcc_present_when_filled() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["a@x.io"]);
        d.cc = EntryList::from_entries(["", "c@x.io"]);
        d.bcc = EntryList::from_entries(["d@x.io"]);
        let request = build_request(&d).unwrap();
        assert_eq!(request.field("cc_emails"), Some(r#"["c@x.io"]"#));
        assert_eq!(request.field("bcc_emails"), Some(r#"["d@x.io"]"#));
    }

    #[test]
    fn test_connection_fields_and_flags() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["a@x.io"]);
        d.smtp_port = 465;
        d.use_tls = false;
        let request = build_request(&d).unwrap();

        assert_eq!(request.field("sender_email"), Some("ops@example.com"));
        assert_eq!(request.field("smtp_host"), Some("smtp.example.com"));
        assert_eq!(request.field("smtp_port"), Some("465"));
        assert_eq!(request.field("smtp_username"), Some("ops"));
        assert_eq!(request.field("smtp_password"), Some("secret"));
        assert_eq!(request.field("use_ssl"), Some("false"));
        assert_eq!(request.field("verify_ssl"), Some("true"));
        assert_eq!(request.field("subject"), Some("Quarterly report"));
        assert_eq!(request.field("body"), Some("See attached."));
    }

    #[test]
    fn test_attachments_are_carried_over() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["a@x.io"]);
        d.attachments = vec![Attachment {
            path: PathBuf::from("/tmp/a.pdf"),
            file_name: "a.pdf".to_string(),
            size: 10,
        }];
        let request = build_request(&d).unwrap();
        assert_eq!(request.attachments.len(), 1);
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut d = draft();
        d.recipients = EntryList::from_entries(["a@x.io"]);
        let request = build_request(&d).unwrap();
        assert!(!format!("{request:?}").contains("secret"));
    }
}
