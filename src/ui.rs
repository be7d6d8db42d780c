use crate::composer::{Composer, NoticeKind};
use crate::config::Keybindings;
use crate::draft::{DraftMessage, ListField};
use crate::logs::{LogViewer, status_label, status_style};
use crate::models::{DispatchLogEntry, parse_timestamp};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Tabs, Wrap},
};
use tui_textarea::{CursorMove, TextArea};

const MASK_CHAR: char = '\u{2022}';

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Tab {
    #[default]
    Compose,
    Logs,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FormField {
    Recipient(usize),
    Sender,
    SmtpHost,
    SmtpPort,
    SmtpUsername,
    SmtpPassword,
    UseTls,
    VerifyCertificate,
    Cc(usize),
    Bcc(usize),
    Subject,
    Body,
    Attachments,
}

impl FormField {
    pub fn list(&self) -> Option<(ListField, usize)> {
        match *self {
            FormField::Recipient(i) => Some((ListField::Recipients, i)),
            FormField::Cc(i) => Some((ListField::Cc, i)),
            FormField::Bcc(i) => Some((ListField::Bcc, i)),
            _ => None,
        }
    }

    fn at(field: ListField, index: usize) -> Self {
        match field {
            ListField::Recipients => FormField::Recipient(index),
            ListField::Cc => FormField::Cc(index),
            ListField::Bcc => FormField::Bcc(index),
        }
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self, FormField::UseTls | FormField::VerifyCertificate)
    }

    pub fn label(&self) -> String {
        match self {
            FormField::Recipient(i) => format!("To #{}", i + 1),
            FormField::Sender => "From".to_string(),
            FormField::SmtpHost => "SMTP host".to_string(),
            FormField::SmtpPort => "SMTP port".to_string(),
            FormField::SmtpUsername => "SMTP user".to_string(),
            FormField::SmtpPassword => "SMTP password".to_string(),
            FormField::UseTls => "Use TLS".to_string(),
            FormField::VerifyCertificate => "Verify cert".to_string(),
            FormField::Cc(i) => format!("Cc #{}", i + 1),
            FormField::Bcc(i) => format!("Bcc #{}", i + 1),
            FormField::Subject => "Subject".to_string(),
            FormField::Body => "Body".to_string(),
            FormField::Attachments => "Attachments".to_string(),
        }
    }
}

/// Every form row in focus order. List fields contribute one row per entry.
pub fn form_fields(draft: &DraftMessage) -> Vec<FormField> {
    let mut fields: Vec<FormField> = (0..draft.recipients.len()).map(FormField::Recipient).collect();
    fields.extend([
        FormField::Sender,
        FormField::SmtpHost,
        FormField::SmtpPort,
        FormField::SmtpUsername,
        FormField::SmtpPassword,
        FormField::UseTls,
        FormField::VerifyCertificate,
    ]);
    fields.extend((0..draft.cc.len()).map(FormField::Cc));
    fields.extend((0..draft.bcc.len()).map(FormField::Bcc));
    fields.extend([FormField::Subject, FormField::Body, FormField::Attachments]);
    fields
}

/// The composer plus the form cursor and the editor bound to the focused row.
pub struct ComposeState<'a> {
    pub composer: Composer,
    pub focused: FormField,
    pub editor: TextArea<'a>,
    /// Raw text of the attachment path row, kept across focus changes.
    pub attachment_input: String,
}

impl<'a> ComposeState<'a> {
    pub fn new(composer: Composer) -> Self {
        let mut state = Self {
            composer,
            focused: FormField::Recipient(0),
            editor: TextArea::default(),
            attachment_input: String::new(),
        };
        state.focus(FormField::Recipient(0));
        state
    }

    pub fn field_value(&self, field: FormField) -> String {
        let draft = self.composer.draft();
        match field {
            FormField::Recipient(i) => draft.recipients.get(i).unwrap_or_default().to_string(),
            FormField::Cc(i) => draft.cc.get(i).unwrap_or_default().to_string(),
            FormField::Bcc(i) => draft.bcc.get(i).unwrap_or_default().to_string(),
            FormField::Sender => draft.sender.clone(),
            FormField::SmtpHost => draft.smtp_host.clone(),
            FormField::SmtpPort => draft.smtp_port.to_string(),
            FormField::SmtpUsername => draft.smtp_username.clone(),
            FormField::SmtpPassword => draft.smtp_password.clone(),
            FormField::UseTls => checkbox(draft.use_tls),
            FormField::VerifyCertificate => checkbox(draft.verify_certificate),
            FormField::Subject => draft.subject.clone(),
            FormField::Body => draft.body.clone(),
            FormField::Attachments => self.attachment_input.clone(),
        }
    }

    /// Moves focus and loads the row's current value into the editor.
    pub fn focus(&mut self, field: FormField) {
        self.focused = field;
        let value = self.field_value(field);

        let mut editor = TextArea::from(value.split('\n').map(str::to_string));
        editor.set_cursor_line_style(Style::default());
        if field == FormField::SmtpPassword {
            editor.set_mask_char(MASK_CHAR);
        }
        if field == FormField::Attachments {
            editor.set_placeholder_text("paths separated by ';'");
        }
        editor.move_cursor(CursorMove::Bottom);
        editor.move_cursor(CursorMove::End);
        self.editor = editor;
    }

    pub fn editor_text(&self) -> String {
        self.editor.lines().join("\n")
    }

    /// Writes the editor contents back into the draft. No validation happens
    /// here; a port that does not parse leaves the previous value.
    pub fn commit_editor(&mut self) {
        let text = self.editor_text();
        let field = self.focused;
        if let Some((list, index)) = field.list() {
            self.composer.update_entry(list, index, text);
            return;
        }

        let draft = self.composer.draft_mut();
        match field {
            FormField::Sender => draft.sender = text,
            FormField::SmtpHost => draft.smtp_host = text,
            FormField::SmtpPort => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    draft.smtp_port = 0;
                } else if let Ok(port) = trimmed.parse() {
                    draft.smtp_port = port;
                }
            }
            FormField::SmtpUsername => draft.smtp_username = text,
            FormField::SmtpPassword => draft.smtp_password = text,
            FormField::Subject => draft.subject = text,
            FormField::Body => draft.body = text,
            FormField::Attachments => self.attachment_input = text,
            _ => {}
        }
    }

    fn step(&mut self, forward: bool) {
        let fields = form_fields(self.composer.draft());
        let pos = fields.iter().position(|f| *f == self.focused).unwrap_or(0);
        let next = if forward {
            (pos + 1) % fields.len()
        } else {
            (pos + fields.len() - 1) % fields.len()
        };
        self.focus(fields[next]);
    }

    pub fn next_field(&mut self) {
        self.step(true);
    }

    pub fn prev_field(&mut self) {
        self.step(false);
    }

    pub fn toggle(&mut self) {
        let draft = self.composer.draft_mut();
        match self.focused {
            FormField::UseTls => draft.use_tls = !draft.use_tls,
            FormField::VerifyCertificate => draft.verify_certificate = !draft.verify_certificate,
            _ => return,
        }
        self.focus(self.focused);
    }

    /// Adds a row to the list under the cursor and focuses it.
    pub fn add_entry(&mut self) {
        if let Some((list, _)) = self.focused.list() {
            if self.composer.add_entry(list) {
                let last = self.composer.draft().list(list).len() - 1;
                self.focus(FormField::at(list, last));
            }
        }
    }

    pub fn remove_entry(&mut self) {
        if let Some((list, index)) = self.focused.list() {
            self.composer.remove_entry(list, index);
            let len = self.composer.draft().list(list).len();
            self.focus(FormField::at(list, index.min(len - 1)));
        }
    }

    /// Re-binds the editor after the draft changed underneath it. `cleared`
    /// is set when the draft was reset after a successful send.
    pub fn resync(&mut self, cleared: bool) {
        if cleared {
            self.attachment_input.clear();
        }
        let fields = form_fields(self.composer.draft());
        let target = if fields.contains(&self.focused) {
            self.focused
        } else {
            FormField::Recipient(0)
        };
        self.focus(target);
    }
}

pub struct UIState<'a> {
    pub tab: Tab,
    pub compose: ComposeState<'a>,
    pub logs: LogViewer,
    pub keys: Keybindings,
    pub logs_table_state: TableState,
    pub form_list_state: ListState,
    pub detail_scroll: u16,
    pub service_status: Option<String>,
}

impl<'a> UIState<'a> {
    pub fn new(composer: Composer, keys: Keybindings) -> Self {
        Self {
            tab: Tab::Compose,
            compose: ComposeState::new(composer),
            logs: LogViewer::default(),
            keys,
            logs_table_state: TableState::default(),
            form_list_state: ListState::default(),
            detail_scroll: 0,
            service_status: None,
        }
    }
}

pub fn render(f: &mut Frame, state: &mut UIState<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Active tab
            Constraint::Length(1), // Key hints
        ])
        .split(f.area());

    let title = match &state.service_status {
        Some(status) => format!(" mailpost - {} ", status),
        None => " mailpost ".to_string(),
    };
    let selected = match state.tab {
        Tab::Compose => 0,
        Tab::Logs => 1,
    };
    let tabs = Tabs::new(vec!["Compose", "Dispatch Logs"])
        .block(Block::default().borders(Borders::ALL).title(title))
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[0]);

    let hints = key_hints(state.tab, state.compose.composer.is_busy(), &state.keys);
    f.render_widget(
        Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    match state.tab {
        Tab::Compose => render_compose(f, state, chunks[1]),
        Tab::Logs => render_logs(f, state, chunks[1]),
    }
}

fn key_name(bindings: &[String]) -> &str {
    bindings.first().map(String::as_str).unwrap_or("unbound")
}

/// Footer text, built from the configured bindings.
pub fn key_hints(tab: Tab, busy: bool, keys: &Keybindings) -> String {
    match tab {
        Tab::Compose if busy => " Sending... ".to_string(),
        Tab::Compose => format!(
            " {}/{}: field  {}/{}: add/remove row  Space: toggle  {}: attach  {}: send  {}: logs  {}: quit ",
            key_name(&keys.next_field),
            key_name(&keys.prev_field),
            key_name(&keys.add_entry),
            key_name(&keys.remove_entry),
            key_name(&keys.select_attachments),
            key_name(&keys.submit),
            key_name(&keys.switch_tab),
            key_name(&keys.quit),
        ),
        Tab::Logs => format!(
            " {}/{}: move  {}: details  {}: close  {}: refresh  {}: compose  {}: quit ",
            key_name(&keys.move_down),
            key_name(&keys.move_up),
            key_name(&keys.open_detail),
            key_name(&keys.close_detail),
            key_name(&keys.refresh),
            key_name(&keys.switch_tab),
            key_name(&keys.quit),
        ),
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn checkbox(value: bool) -> String {
    if value { "[x]" } else { "[ ]" }.to_string()
}

fn render_compose(f: &mut Frame, state: &mut UIState<'_>, area: Rect) {
    let notice = state.compose.composer.notice().cloned();
    let mut constraints = Vec::new();
    if notice.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(5));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    if let Some(notice) = &notice {
        let color = match notice.kind {
            NoticeKind::Success => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        let banner = Paragraph::new(notice.text.as_str())
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)))
            .wrap(Wrap { trim: true });
        f.render_widget(banner, rows[0]);
    }
    let main = rows[rows.len() - 1];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(main);

    // Form overview
    let compose = &state.compose;
    let fields = form_fields(compose.composer.draft());
    let focused_index = fields.iter().position(|f| *f == compose.focused).unwrap_or(0);
    let items: Vec<ListItem> = fields
        .iter()
        .map(|field| {
            let value = match field {
                FormField::SmtpPassword => {
                    MASK_CHAR.to_string().repeat(compose.field_value(*field).chars().count())
                }
                FormField::Body => compose
                    .field_value(*field)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                FormField::Attachments => {
                    let count = compose.composer.draft().attachments.len();
                    format!("{} file(s), {}", count, format_kb(compose.composer.draft().total_attachment_size()))
                }
                _ => compose.field_value(*field),
            };
            let is_focused = *field == compose.focused;
            let indicator = if is_focused { "█" } else { " " };
            ListItem::new(Line::from(vec![
                Span::raw(indicator),
                Span::styled(format!("{:<14}", field.label()), focus_style(is_focused)),
                Span::raw(value),
            ]))
        })
        .collect();

    let form = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Message ")
            .border_style(Style::default().fg(Color::Gray)),
    );
    state.form_list_state.select(Some(focused_index));
    f.render_stateful_widget(form, columns[0], &mut state.form_list_state);

    // Editor for the focused row, with the attachment selection underneath
    let attachments = &state.compose.composer.draft().attachments;
    let attachment_rows = (attachments.len() as u16 + 2).clamp(3, 14);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(attachment_rows)])
        .split(columns[1]);

    let attachment_items: Vec<ListItem> = attachments
        .iter()
        .map(|a| ListItem::new(format!("{} ({})", a.file_name, format_kb(a.size))))
        .collect();
    let attachment_list = List::new(attachment_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Selected files (max 10, 30 MB total) ")
            .border_style(Style::default().fg(Color::Gray)),
    );
    f.render_widget(attachment_list, right[1]);

    let compose = &mut state.compose;
    let title = if compose.focused.is_toggle() {
        format!(" {} [Space to toggle] ", compose.focused.label())
    } else if compose.focused == FormField::Attachments {
        " Attachments [Enter or Ctrl-O to select] ".to_string()
    } else {
        format!(" {} ", compose.focused.label())
    };
    let editor_block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(focus_style(!compose.composer.is_busy()));
    compose.editor.set_block(editor_block);
    f.render_widget(&compose.editor, right[0]);
}

fn render_logs(f: &mut Frame, state: &mut UIState<'_>, area: Rect) {
    let chunks = if state.logs.selected().is_some() {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(area)
    };

    let list_block = Block::default()
        .borders(Borders::ALL)
        .title(" Dispatch Logs ")
        .border_style(Style::default().fg(Color::Gray));

    if state.logs.entries().is_empty() {
        let text = if state.logs.is_loading() && !state.logs.is_loaded() {
            "Loading..."
        } else {
            "No dispatch logs."
        };
        let empty = Paragraph::new(text)
            .block(list_block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, chunks[0]);
    } else {
        let rows: Vec<Row> = state
            .logs
            .entries()
            .iter()
            .map(|entry| {
                Row::new(vec![
                    Cell::from(format_time(&entry.created_at)),
                    Cell::from(entry.sender_email.clone()),
                    Cell::from(entry.recipient_emails.joined()),
                    Cell::from(entry.subject.clone()),
                    Cell::from(status_label(&entry.status)).style(status_style(&entry.status)),
                ])
            })
            .collect();

        let header = Row::new(vec!["Created", "From", "To", "Subject", "Status"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let table = Table::new(
            rows,
            [
                Constraint::Length(19),
                Constraint::Percentage(20),
                Constraint::Percentage(25),
                Constraint::Percentage(35),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(list_block)
        .row_highlight_style(Style::default().fg(Color::Yellow));

        state.logs_table_state.select(Some(state.logs.cursor()));
        f.render_stateful_widget(table, chunks[0], &mut state.logs_table_state);
    }

    if let Some(entry) = state.logs.selected() {
        let detail = Paragraph::new(detail_lines(entry))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Log Detail [Esc to close] ")
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false })
            .scroll((state.detail_scroll, 0));
        f.render_widget(detail, chunks[1]);
    }
}

fn field_line(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(value.into()),
    ])
}

/// Text of the detail pane for one log entry.
pub fn detail_lines(entry: &DispatchLogEntry) -> Vec<Line<'static>> {
    let mut lines = vec![
        field_line("ID", entry.id.clone()),
        field_line("From", entry.sender_email.clone()),
        field_line("To", entry.recipient_emails.joined()),
    ];
    if let Some(cc) = entry.cc_emails.as_ref().filter(|cc| !cc.is_empty()) {
        lines.push(field_line("Cc", cc.joined()));
    }
    if let Some(bcc) = entry.bcc_emails.as_ref().filter(|bcc| !bcc.is_empty()) {
        lines.push(field_line("Bcc", bcc.joined()));
    }
    lines.push(field_line("Subject", entry.subject.clone()));
    lines.push(field_line("SMTP host", entry.smtp_host.clone()));
    lines.push(field_line("SMTP port", entry.smtp_port.to_string()));
    lines.push(field_line("TLS", entry.use_ssl.clone().unwrap_or_default()));
    lines.push(Line::from(vec![
        Span::styled("Status: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(status_label(&entry.status), status_style(&entry.status)),
    ]));
    if let Some(error) = &entry.error_message {
        lines.push(Line::from(Span::styled(
            "Error:",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in error.lines() {
            lines.push(Line::from(Span::styled(
                format!("  {}", line),
                Style::default().fg(Color::Red),
            )));
        }
    }
    lines.push(field_line("Attachments", entry.attachment_count.to_string()));
    lines.push(field_line("Attachment size", format_kb(entry.total_attachment_size)));
    lines.push(field_line("Created", format_time(&entry.created_at)));
    if let Some(sent_at) = &entry.sent_at {
        lines.push(field_line("Sent", format_time(sent_at)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Body:",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.extend(body_lines(&entry.body));
    lines
}

pub fn format_kb(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// Local time for display; unparseable timestamps are shown as received.
pub fn format_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => raw.to_string(),
    }
}

/// Body text as stored, made safe for a terminal pane: tabs expanded,
/// carriage returns and trailing whitespace dropped, trailing blank lines cut.
fn body_lines(body: &str) -> Vec<Line<'static>> {
    let mut rows: Vec<String> = body
        .lines()
        .map(|line| line.replace('\t', "    ").replace('\r', "").trim_end().to_string())
        .collect();
    while rows.last().is_some_and(|row| row.is_empty()) {
        rows.pop();
    }

    if rows.is_empty() {
        return vec![Line::from(Span::styled(
            "(empty)",
            Style::default().fg(Color::DarkGray),
        ))];
    }
    rows.into_iter().map(Line::from).collect()
}
