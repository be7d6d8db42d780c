use mailpost::auth::{RingStorage, Secret};
use mailpost::config::{Config, DEFAULT_CONFIG_PATH};
use mailpost::logs::status_label;
use mailpost::service::{DispatchService, HttpDispatchClient};
use mailpost::ui::{format_kb, format_time};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// `[--config <path>] [<log_id>]`; `None` on anything else.
fn parse_args(args: &[String]) -> Option<(PathBuf, Option<String>)> {
    let mut config = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut log_id = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = PathBuf::from(iter.next()?),
            flag if flag.starts_with("--") => return None,
            id if log_id.is_none() => log_id = Some(id.to_string()),
            _ => return None,
        }
    }
    Some((config, log_id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some((config_path, log_id)) = parse_args(&args[1..]) else {
        eprintln!("Usage: {} [--config <path>] [<log_id>]", args[0]);
        eprintln!("Without an id, lists the most recent dispatch attempts.");
        std::process::exit(1);
    };

    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using default settings", e);
        Config::default()
    });
    if config.service.api_key_in_keyring {
        config.service.api_key = RingStorage.get(Secret::ApiKey)?;
    }
    let client = HttpDispatchClient::new(
        &config.service.base_url,
        config.service.api_key.as_deref(),
        Duration::from_secs(config.service.timeout_secs),
        config.service.log_page_size,
    )?;

    let Some(id) = log_id else {
        let entries = client
            .list_logs()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list logs: {}", e))?;
        if entries.is_empty() {
            println!("No dispatch logs.");
        }
        for entry in entries {
            println!(
                "{}  {:<8}  {}  {} -> {}  {}",
                format_time(&entry.created_at),
                status_label(&entry.status),
                entry.id,
                entry.sender_email,
                entry.recipient_emails.joined(),
                entry.subject
            );
        }
        return Ok(());
    };

    let entry = client
        .get_log(&id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load log {}: {}", id, e))?;

    println!("Dispatch Log:");
    println!("ID: {}", entry.id);
    println!("Status: {}", status_label(&entry.status));
    println!("From: {}", entry.sender_email);
    println!("To: {}", entry.recipient_emails.joined());
    if let Some(cc) = &entry.cc_emails {
        println!("Cc: {}", cc.joined());
    }
    if let Some(bcc) = &entry.bcc_emails {
        println!("Bcc: {}", bcc.joined());
    }
    println!("Subject: {}", entry.subject);
    println!("SMTP: {}:{}", entry.smtp_host, entry.smtp_port);
    println!("Created: {}", format_time(&entry.created_at));
    if let Some(sent_at) = &entry.sent_at {
        println!("Sent: {}", format_time(sent_at));
    }
    println!(
        "Attachments: {} ({})",
        entry.attachment_count,
        format_kb(entry.total_attachment_size)
    );
    println!("{}", RULE);
    if let Some(error) = &entry.error_message {
        println!("ERROR:");
        println!("{}", error);
        println!("{}", RULE);
    }
    println!("BODY:");
    println!("{}", entry.body);
    println!("{}", RULE);

    Ok(())
}
