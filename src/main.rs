//! wabook — interactive WhatsApp console with JSON-backed phone lists.
//!
//! The WhatsApp protocol and session auth live in a Node.js bridge
//! (`whatsapp-web.js`); this binary owns the REPL, the address book and the
//! chat index cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use wabook::book::AddressBook;
use wabook::client::bridge::BridgeClient;
use wabook::client::ClientEvent;
use wabook::config::loader::load_config;
use wabook::repl::{self, ReplSession};

#[derive(Parser)]
#[command(
    name = "wabook",
    about = "Interactive WhatsApp console with saved phone lists",
    version
)]
struct Cli {
    /// Path to the config file (default: ~/.wabook/config.json).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Connect to an already-running bridge instead of spawning one.
    #[arg(long)]
    bridge_url: Option<String>,
    /// Verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so they never interleave with console output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
        });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref());
    if let Some(url) = cli.bridge_url {
        config.bridge.url = Some(url);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let client = Arc::new(BridgeClient::new(config.bridge.clone(), event_tx));
        client.start().await?;

        println!("Waiting for the WhatsApp session...");
        while let Some(event) = event_rx.recv().await {
            match event {
                ClientEvent::Qr(_) => {
                    println!("Scan the QR code shown by the bridge to log in.");
                }
                ClientEvent::Ready => break,
                ClientEvent::Disconnected(reason) => {
                    warn!("WhatsApp session disconnected: {}", reason);
                }
            }
        }

        // Keep logging lifecycle events while the REPL runs.
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    ClientEvent::Ready => info!("WhatsApp session reconnected"),
                    ClientEvent::Disconnected(reason) => {
                        warn!("WhatsApp session disconnected: {}", reason);
                    }
                    ClientEvent::Qr(_) => {
                        warn!("Session logged out; restart wabook to scan a new QR code");
                    }
                }
            }
        });

        println!("WhatsApp interface ready!");
        println!("Type `help` to get a list of commands available.");
        println!();

        let book = AddressBook::load(config.book_path())?;
        let mut session = ReplSession::new(
            book,
            client.clone(),
            config.default_country_code.clone(),
        );
        repl::run(&mut session).await?;

        client.stop().await;
        Ok(())
    })
}
