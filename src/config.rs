use crate::draft::ConnectionDefaults;
use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "settings.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub defaults: ConnectionDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub keybindings: Keybindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Read the API key from the OS keyring instead of this file.
    pub api_key_in_keyring: bool,
    pub timeout_secs: u64,
    pub log_page_size: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8101".to_string(),
            api_key: None,
            api_key_in_keyring: false,
            timeout_secs: 60,
            log_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "mailpost.log".to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Keybindings {
    pub switch_tab: Vec<String>,
    pub next_field: Vec<String>,
    pub prev_field: Vec<String>,
    pub add_entry: Vec<String>,
    pub remove_entry: Vec<String>,
    pub select_attachments: Vec<String>,
    pub submit: Vec<String>,
    pub move_up: Vec<String>,
    pub move_down: Vec<String>,
    pub open_detail: Vec<String>,
    pub close_detail: Vec<String>,
    pub refresh: Vec<String>,
    pub quit: Vec<String>,
}

impl Default for Keybindings {
    fn default() -> Self {
        Self {
            switch_tab: vec!["ctrl-t".to_string(), "F2".to_string()],
            next_field: vec!["Tab".to_string()],
            prev_field: vec!["BackTab".to_string()],
            add_entry: vec!["ctrl-n".to_string()],
            remove_entry: vec!["ctrl-d".to_string()],
            select_attachments: vec!["ctrl-o".to_string()],
            submit: vec!["ctrl-s".to_string()],
            move_up: vec!["k".to_string(), "Up".to_string()],
            move_down: vec!["j".to_string(), "Down".to_string()],
            open_detail: vec!["Enter".to_string()],
            close_detail: vec!["Esc".to_string()],
            refresh: vec!["r".to_string()],
            quit: vec!["ctrl-q".to_string()],
        }
    }
}

pub fn parse_key_string(key_str: &str) -> (KeyCode, KeyModifiers) {
    let mut parts: Vec<&str> = key_str.split('-').collect();
    let mut modifiers = KeyModifiers::empty();

    // The last segment is the key itself, everything before it a modifier
    let base_key_str = parts.pop().unwrap_or("");

    for part in parts {
        match part.to_lowercase().as_str() {
            "ctrl" => modifiers.insert(KeyModifiers::CONTROL),
            "alt" => modifiers.insert(KeyModifiers::ALT),
            "shift" => modifiers.insert(KeyModifiers::SHIFT),
            "cmd" | "command" | "super" => modifiers.insert(KeyModifiers::SUPER),
            "meta" => modifiers.insert(KeyModifiers::META),
            _ => {}
        }
    }

    let code = match base_key_str {
        "Backspace" => KeyCode::Backspace,
        "Enter" => KeyCode::Enter,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Tab" => KeyCode::Tab,
        "BackTab" => KeyCode::BackTab,
        "Esc" => KeyCode::Esc,
        " " => KeyCode::Char(' '),
        s if s.len() > 1 && s.starts_with('F') => match s[1..].parse::<u8>() {
            Ok(n) => KeyCode::F(n),
            Err(_) => KeyCode::Null,
        },
        s => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => KeyCode::Null,
            }
        }
    };

    (code, modifiers)
}

pub fn matches_key(event: KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| {
        let (code, modifiers) = parse_key_string(b);
        event.code == code && event.modifiers.contains(modifiers)
    })
}

impl Config {
    /// Loads the settings file; a missing file means defaults. A malformed
    /// file is an error, left to the caller to report once it can.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}
