use crate::error::ServiceError;
use crate::models::{DispatchLogEntry, DispatchStatus};
use crate::service::DispatchService;
use inflections::case::to_title_case;
use ratatui::style::{Color, Modifier, Style};

/// Tags one detail request. Only the most recently issued ticket is honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTicket {
    seq: u64,
    pub id: String,
}

/// Tags one list fetch. A response is applied only if no newer fetch was
/// issued after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTicket(u64);

/// Cached dispatch history plus at most one expanded entry.
#[derive(Debug, Default)]
pub struct LogViewer {
    entries: Vec<DispatchLogEntry>,
    loaded: bool,
    activated: bool,
    selected: Option<DispatchLogEntry>,
    cursor: usize,
    list_seq: u64,
    list_settled: u64,
    detail_seq: u64,
}

impl LogViewer {
    /// Returns true the first time the viewer is shown, when the initial
    /// list fetch should be issued.
    pub fn activate(&mut self) -> bool {
        let first = !self.activated;
        self.activated = true;
        first
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// True while the most recent list fetch has not answered yet.
    pub fn is_loading(&self) -> bool {
        self.list_seq != self.list_settled
    }

    pub fn entries(&self) -> &[DispatchLogEntry] {
        &self.entries
    }

    pub fn selected(&self) -> Option<&DispatchLogEntry> {
        self.selected.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_down(&mut self) {
        if self.cursor < self.entries.len().saturating_sub(1) {
            self.cursor += 1;
        }
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn entry_under_cursor(&self) -> Option<&DispatchLogEntry> {
        self.entries.get(self.cursor)
    }

    pub fn request_list(&mut self) -> ListTicket {
        self.list_seq += 1;
        ListTicket(self.list_seq)
    }

    /// Replaces the cache on success. A failure is only logged and the
    /// previous list stays on screen. Answers to superseded fetches are
    /// dropped; returns whether the response was used.
    pub fn apply_list(
        &mut self,
        ticket: ListTicket,
        result: Result<Vec<DispatchLogEntry>, ServiceError>,
    ) -> bool {
        if ticket.0 != self.list_seq {
            tracing::debug!(seq = ticket.0, latest = self.list_seq, "Dropping stale log list");
            return false;
        }
        self.list_settled = ticket.0;

        match result {
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "Loaded dispatch logs");
                self.entries = entries;
                self.loaded = true;
                if self.cursor >= self.entries.len() {
                    self.cursor = self.entries.len().saturating_sub(1);
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load dispatch logs");
                false
            }
        }
    }

    pub fn request_detail(&mut self, id: &str) -> DetailTicket {
        self.detail_seq += 1;
        DetailTicket {
            seq: self.detail_seq,
            id: id.to_string(),
        }
    }

    /// Applies a detail response. Responses for anything but the latest
    /// request are dropped; returns whether the response was used.
    pub fn apply_detail(
        &mut self,
        ticket: DetailTicket,
        result: Result<DispatchLogEntry, ServiceError>,
    ) -> bool {
        if ticket.seq != self.detail_seq {
            tracing::debug!(id = %ticket.id, "Dropping stale log detail");
            return false;
        }

        match result {
            Ok(entry) => {
                self.selected = Some(entry);
                true
            }
            Err(e) => {
                tracing::warn!(id = %ticket.id, error = %e, "Failed to load log detail");
                false
            }
        }
    }

    pub fn dismiss_detail(&mut self) {
        self.selected = None;
    }

    pub async fn refresh(&mut self, service: &dyn DispatchService) {
        let ticket = self.request_list();
        let result = service.list_logs().await;
        self.apply_list(ticket, result);
    }

    pub async fn open_detail(&mut self, service: &dyn DispatchService, id: &str) -> bool {
        let ticket = self.request_detail(id);
        let result = service.get_log(id).await;
        self.apply_detail(ticket, result)
    }
}

pub fn status_label(status: &DispatchStatus) -> String {
    match status {
        DispatchStatus::Success => "Success".to_string(),
        DispatchStatus::Failed => "Failed".to_string(),
        DispatchStatus::Pending => "Pending".to_string(),
        DispatchStatus::Other(raw) if raw.is_empty() => "Unknown".to_string(),
        DispatchStatus::Other(raw) => to_title_case(raw),
    }
}

pub fn status_style(status: &DispatchStatus) -> Style {
    let color = match status {
        DispatchStatus::Success => Color::Green,
        DispatchStatus::Failed => Color::Red,
        DispatchStatus::Pending => Color::Yellow,
        DispatchStatus::Other(_) => return Style::default().fg(Color::Gray),
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}
