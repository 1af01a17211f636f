//! Example: list unread mail received since a date
//!
//! Uses the blocking API. The config file holds the account and the IMAP
//! server:
//!
//! ```json
//! {
//!   "account": { "email": "me@example.com", "auth_value": "<oauth2 token>", "auth_type": "oauth2" },
//!   "imap": { "host": "imap.example.com", "port": 993 }
//! }
//! ```
//!
//! ## Running
//!
//! ```bash
//! cargo run --package ezmail --example read -- config.json 01-Oct-2025
//! ```

use std::env;

use anyhow::{Context, bail};
use ezmail::blocking::Reader;
use ezmail::{Credentials, FetchFilters, ReaderConfig, StatusFilter};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Deserialize)]
struct Settings {
    account: Credentials,
    #[serde(flatten)]
    reader: ReaderConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ezmail=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [config_path, since] = args.as_slice() else {
        bail!("usage: read <config.json> <DD-Mon-YYYY>");
    };

    let raw = std::fs::read_to_string(config_path).with_context(|| format!("reading {config_path}"))?;
    let settings: Settings = serde_json::from_str(&raw).context("parsing config")?;

    let mut reader = Reader::new(settings.reader, settings.account)?;
    reader.connect()?;
    println!("mailboxes: {}", reader.list_mailboxes()?.join(", "));

    let filters = FetchFilters::new()
        .status(StatusFilter::Unseen)
        .since(FetchFilters::parse_date(since)?)
        .limit(20);
    for mail in reader.fetch_messages(&filters)? {
        let mail = mail?;
        let clip = if mail.has_attachments() { " [+]" } else { "" };
        println!("#{} {} | {}{clip}", mail.seq, mail.sender, mail.subject);
        println!("    {}", mail.summary(72));
    }
    Ok(())
}
