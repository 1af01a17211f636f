//! Example: send a templated HTML email with an inline logo
//!
//! The config file holds the account and the SMTP server:
//!
//! ```json
//! {
//!   "account": { "email": "me@example.com", "auth_value": "app-password", "auth_type": "password" },
//!   "smtp": { "host": "smtp.example.com", "port": 587 },
//!   "max_emails_per_hour": 50
//! }
//! ```
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=ezmail=debug cargo run --package ezmail --example send -- \
//!     config.json you@example.com welcome.html logo.png
//! ```

use std::collections::HashMap;
use std::env;

use anyhow::{Context, bail};
use ezmail::{Composer, Credentials, ImageOptions, Sender, SenderConfig};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Deserialize)]
struct Settings {
    account: Credentials,
    #[serde(flatten)]
    sender: SenderConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ezmail=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [config_path, recipient, rest @ ..] = args.as_slice() else {
        bail!("usage: send <config.json> <recipient> [template.html] [logo.png]");
    };

    let raw = std::fs::read_to_string(config_path).with_context(|| format!("reading {config_path}"))?;
    let settings: Settings = serde_json::from_str(&raw).context("parsing config")?;

    let mut composer = Composer::new().subject("Welcome to ezmail");
    composer = match rest.first() {
        Some(template) => {
            let vars = HashMap::from([("name", recipient.as_str()), ("version", env!("CARGO_PKG_VERSION"))]);
            composer.use_template(template, &vars)?
        }
        None => composer.add_text("<h1>Hello!</h1><p>Sent with ezmail.</p>"),
    };
    if let Some(logo) = rest.get(1) {
        composer = composer.add_image(logo, ImageOptions::new().width("120px"))?;
    }
    let email = composer.finish()?;

    let mut sender = Sender::new(settings.sender, settings.account);
    sender.connect().await?;
    let result = sender.send(&email, recipient.as_str()).await;
    sender.disconnect().await;
    result?;

    info!(%recipient, "done");
    Ok(())
}
