use crate::composer::{Composer, SubmitOutcome};
use crate::config::{Keybindings, matches_key};
use crate::draft::{ConnectionDefaults, load_attachments, parse_attachment_paths};
use crate::error::ServiceError;
use crate::logs::{DetailTicket, ListTicket};
use crate::models::{DispatchLogEntry, DispatchReceipt, HealthStatus};
use crate::service::DispatchService;
use crate::ui::{FormField, Tab, UIState};
use crossterm::event::{KeyCode, KeyEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Results of background requests, delivered back to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    Dispatched(Result<DispatchReceipt, ServiceError>),
    LogsLoaded(ListTicket, Result<Vec<DispatchLogEntry>, ServiceError>),
    DetailLoaded(DetailTicket, Result<DispatchLogEntry, ServiceError>),
    Health(Result<HealthStatus, ServiceError>),
}

pub struct App<'a> {
    pub ui: UIState<'a>,
    service: Arc<dyn DispatchService>,
    tx: mpsc::Sender<AppEvent>,
    quit: bool,
}

impl<'a> App<'a> {
    pub fn new(
        defaults: ConnectionDefaults,
        keys: Keybindings,
        service: Arc<dyn DispatchService>,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            ui: UIState::new(Composer::new(defaults), keys),
            service,
            tx,
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn check_health(&self) {
        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.health().await;
            let _ = tx.send(AppEvent::Health(result)).await;
        });
    }

    fn spawn_list(&mut self) {
        let ticket = self.ui.logs.request_list();
        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.list_logs().await;
            let _ = tx.send(AppEvent::LogsLoaded(ticket, result)).await;
        });
    }

    fn spawn_detail(&mut self, id: String) {
        let ticket = self.ui.logs.request_detail(&id);
        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.get_log(&id).await;
            let _ = tx.send(AppEvent::DetailLoaded(ticket, result)).await;
        });
    }

    fn submit(&mut self) {
        self.ui.compose.commit_editor();
        let request = match self.ui.compose.composer.begin_submit() {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Submission refused locally");
                return;
            }
        };

        let service = self.service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.send(request).await;
            let _ = tx.send(AppEvent::Dispatched(result)).await;
        });
    }

    async fn select_attachments(&mut self) {
        self.ui.compose.commit_editor();
        let paths = parse_attachment_paths(&self.ui.compose.attachment_input);
        let composer = &mut self.ui.compose.composer;
        match load_attachments(&paths).await {
            Ok(selection) => {
                if let Err(e) = composer.select_attachments(selection) {
                    tracing::debug!(error = %e, "Attachment selection refused");
                }
            }
            Err(e) => composer.report_error(format!("{:#}", e)),
        }
    }

    fn switch_tab(&mut self) {
        self.ui.tab = match self.ui.tab {
            Tab::Compose => {
                self.ui.compose.commit_editor();
                Tab::Logs
            }
            Tab::Logs => Tab::Compose,
        };
        if self.ui.tab == Tab::Logs && self.ui.logs.activate() {
            self.spawn_list();
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if matches_key(key, &self.ui.keys.quit) {
            self.quit = true;
            return;
        }
        if matches_key(key, &self.ui.keys.switch_tab) {
            self.switch_tab();
            return;
        }

        match self.ui.tab {
            Tab::Compose => self.handle_compose_key(key).await,
            Tab::Logs => self.handle_logs_key(key),
        }
    }

    async fn handle_compose_key(&mut self, key: KeyEvent) {
        // Fields are frozen while a submission is in flight
        if self.ui.compose.composer.is_busy() {
            return;
        }

        let focused = self.ui.compose.focused;
        if matches_key(key, &self.ui.keys.submit) {
            self.submit();
        } else if matches_key(key, &self.ui.keys.next_field) {
            self.ui.compose.next_field();
        } else if matches_key(key, &self.ui.keys.prev_field) {
            self.ui.compose.prev_field();
        } else if matches_key(key, &self.ui.keys.add_entry) {
            self.ui.compose.add_entry();
        } else if matches_key(key, &self.ui.keys.remove_entry) {
            self.ui.compose.remove_entry();
        } else if matches_key(key, &self.ui.keys.select_attachments) {
            self.select_attachments().await;
        } else if focused.is_toggle() {
            if matches!(key.code, KeyCode::Char(' ') | KeyCode::Enter) {
                self.ui.compose.toggle();
            }
        } else if key.code == KeyCode::Enter && focused == FormField::Attachments {
            self.select_attachments().await;
        } else if key.code == KeyCode::Enter && focused != FormField::Body {
            self.ui.compose.next_field();
        } else {
            self.ui.compose.editor.input(key);
            self.ui.compose.commit_editor();
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        if matches_key(key, &self.ui.keys.move_down) {
            self.ui.logs.move_down();
        } else if matches_key(key, &self.ui.keys.move_up) {
            self.ui.logs.move_up();
        } else if matches_key(key, &self.ui.keys.open_detail) {
            if let Some(id) = self.ui.logs.entry_under_cursor().map(|e| e.id.clone()) {
                self.spawn_detail(id);
            }
        } else if matches_key(key, &self.ui.keys.close_detail) {
            self.ui.logs.dismiss_detail();
        } else if matches_key(key, &self.ui.keys.refresh) {
            self.spawn_list();
        } else if key.code == KeyCode::PageDown {
            self.ui.detail_scroll = self.ui.detail_scroll.saturating_add(5);
        } else if key.code == KeyCode::PageUp {
            self.ui.detail_scroll = self.ui.detail_scroll.saturating_sub(5);
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Dispatched(result) => {
                let outcome = self.ui.compose.composer.finish_submit(result);
                tracing::debug!(?outcome, "Submission finished");
                self.ui.compose.resync(outcome == SubmitOutcome::Sent);
            }
            AppEvent::LogsLoaded(ticket, result) => {
                self.ui.logs.apply_list(ticket, result);
            }
            AppEvent::DetailLoaded(ticket, result) => {
                if self.ui.logs.apply_detail(ticket, result) {
                    self.ui.detail_scroll = 0;
                }
            }
            AppEvent::Health(result) => {
                self.ui.service_status = Some(match result {
                    Ok(health) => format!("service {}", health.status),
                    Err(e) => {
                        tracing::warn!(error = %e, "Health check failed");
                        "service unreachable".to_string()
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::NoticeKind;
    use crate::testing::{FakeService, SendScript, log_entry};
    use crossterm::event::KeyModifiers;
    use std::time::Duration;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn new_app(service: Arc<FakeService>) -> (App<'static>, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let defaults = ConnectionDefaults {
            sender: "ops@example.com".to_string(),
            smtp_host: "smtp.example.com".to_string(),
            ..ConnectionDefaults::default()
        };
        (App::new(defaults, Keybindings::default(), service, tx), rx)
    }

    async fn type_text(app: &mut App<'_>, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).await;
        }
    }

    #[tokio::test]
    async fn test_submit_sends_and_resets_draft() {
        let service = Arc::new(FakeService::default());
        let (mut app, mut rx) = new_app(service.clone());

        type_text(&mut app, "a@x.io").await;
        app.handle_key(ctrl('s')).await;
        assert!(app.ui.compose.composer.is_busy());

        let event = rx.recv().await.unwrap();
        app.handle_event(event);

        assert_eq!(service.sent_count(), 1);
        assert!(!app.ui.compose.composer.is_busy());
        let notice = app.ui.compose.composer.notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(app.ui.compose.composer.draft().recipients.get(0), Some(""));
        assert_eq!(app.ui.compose.composer.draft().sender, "ops@example.com");
        assert_eq!(app.ui.compose.editor_text(), "");
    }

    #[tokio::test]
    async fn test_input_is_ignored_while_sending() {
        let service = Arc::new(FakeService::with_send(SendScript::Rejected(
            400,
            Some("SMTP authentication failed".to_string()),
        )));
        let (mut app, mut rx) = new_app(service.clone());

        type_text(&mut app, "a@x.io").await;
        app.handle_key(ctrl('s')).await;
        type_text(&mut app, "zz").await;
        app.handle_key(ctrl('s')).await;

        app.handle_event(rx.recv().await.unwrap());
        assert_eq!(service.sent_count(), 1);
        assert_eq!(app.ui.compose.composer.draft().recipients.get(0), Some("a@x.io"));
        assert_eq!(
            app.ui.compose.composer.notice().map(|n| n.text.as_str()),
            Some("SMTP authentication failed")
        );
    }

    #[tokio::test]
    async fn test_empty_draft_is_not_sent() {
        let service = Arc::new(FakeService::default());
        let (mut app, _rx) = new_app(service.clone());

        app.handle_key(ctrl('s')).await;
        assert!(!app.ui.compose.composer.is_busy());
        assert_eq!(service.sent_count(), 0);
        assert_eq!(
            app.ui.compose.composer.notice().map(|n| n.kind),
            Some(NoticeKind::Error)
        );
    }

    #[tokio::test]
    async fn test_logs_load_once_on_first_visit() {
        let service = Arc::new(
            FakeService::default().with_logs(Some(vec![log_entry("a", "success")])),
        );
        let (mut app, mut rx) = new_app(service);

        app.handle_key(ctrl('t')).await;
        assert_eq!(app.ui.tab, Tab::Logs);
        assert!(app.ui.logs.is_loading());
        app.handle_event(rx.recv().await.unwrap());
        assert_eq!(app.ui.logs.entries().len(), 1);

        app.handle_key(ctrl('t')).await;
        app.handle_key(ctrl('t')).await;
        assert!(!app.ui.logs.is_loading());
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_refresh_during_slow_first_load_keeps_newest_list() {
        let service = Arc::new(FakeService::default().with_list_answers(vec![
            (vec![log_entry("old", "success")], Duration::from_millis(80)),
            (
                vec![log_entry("old", "success"), log_entry("new", "pending")],
                Duration::ZERO,
            ),
        ]));
        let (mut app, mut rx) = new_app(service);

        app.handle_key(ctrl('t')).await;
        app.handle_key(key(KeyCode::Char('r'))).await;

        app.handle_event(rx.recv().await.unwrap());
        assert!(!app.ui.logs.is_loading());
        app.handle_event(rx.recv().await.unwrap());

        let ids: Vec<&str> = app.ui.logs.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "new"]);
    }

    #[tokio::test]
    async fn test_open_and_close_detail() {
        let service = Arc::new(
            FakeService::default()
                .with_logs(Some(vec![log_entry("a", "success")]))
                .with_detail(log_entry("a", "success"), Duration::ZERO),
        );
        let (mut app, mut rx) = new_app(service);

        app.handle_key(ctrl('t')).await;
        app.handle_event(rx.recv().await.unwrap());

        app.handle_key(key(KeyCode::Enter)).await;
        app.handle_event(rx.recv().await.unwrap());
        assert_eq!(app.ui.logs.selected().map(|e| e.id.as_str()), Some("a"));

        app.handle_key(key(KeyCode::Esc)).await;
        assert!(app.ui.logs.selected().is_none());
    }

    #[tokio::test]
    async fn test_attachment_selection_from_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, vec![0u8; 2048]).unwrap();

        let (mut app, _rx) = new_app(Arc::new(FakeService::default()));
        app.ui.compose.focus(FormField::Attachments);
        type_text(&mut app, &file.display().to_string()).await;
        app.handle_key(key(KeyCode::Enter)).await;

        let attachments = &app.ui.compose.composer.draft().attachments;
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].file_name, "report.pdf");
        assert_eq!(attachments[0].size, 2048);

        app.ui.compose.focus(FormField::Attachments);
        type_text(&mut app, ";missing.bin").await;
        app.handle_key(key(KeyCode::Enter)).await;
        assert_eq!(app.ui.compose.composer.draft().attachments.len(), 1);
        assert_eq!(
            app.ui.compose.composer.notice().map(|n| n.kind),
            Some(NoticeKind::Error)
        );
    }

    #[tokio::test]
    async fn test_too_many_files_keep_previous_selection() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<String> = (0..11)
            .map(|i| {
                let path = dir.path().join(format!("f{i}.txt"));
                std::fs::write(&path, "x").unwrap();
                path.display().to_string()
            })
            .collect();

        let (mut app, _rx) = new_app(Arc::new(FakeService::default()));
        app.ui.compose.focus(FormField::Attachments);
        type_text(&mut app, &paths[0]).await;
        app.handle_key(ctrl('o')).await;
        assert_eq!(app.ui.compose.composer.draft().attachments.len(), 1);

        app.ui.compose.focus(FormField::Attachments);
        type_text(&mut app, &format!(";{}", paths[1..].join(";"))).await;
        app.handle_key(ctrl('o')).await;

        assert_eq!(app.ui.compose.composer.draft().attachments.len(), 1);
        let notice = app.ui.compose.composer.notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.text.contains("11"));
    }

    #[tokio::test]
    async fn test_quit_key() {
        let (mut app, _rx) = new_app(Arc::new(FakeService::default()));
        app.handle_key(ctrl('q')).await;
        assert!(app.should_quit());
    }
}
