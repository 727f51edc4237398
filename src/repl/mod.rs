//! REPL loop for the WhatsApp console.
//!
//! Reads lines with rustyline, parses them into [`commands::Command`] values
//! and dispatches them against a [`ReplSession`]. Commands never overlap: a
//! handler runs to completion (awaiting the external client as needed) before
//! the next prompt is issued. Handler failures are printed at the dispatch
//! boundary and the loop keeps going.

pub mod commands;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use crate::config::loader::get_data_dir;
use crate::errors::CommandError;
pub use commands::{Command, ReplSession};

/// Run `readline` on a blocking thread so the runtime stays free for the
/// client's background tasks, handing the editor back afterwards.
async fn readline_async(
    mut rl: DefaultEditor,
    prompt: String,
) -> (DefaultEditor, Result<String, ReadlineError>) {
    tokio::task::spawn_blocking(move || {
        let result = rl.readline(&prompt);
        (rl, result)
    })
    .await
    .expect("readline task panicked")
}

/// Run the console loop until `exit`, Ctrl+C or end of input.
pub async fn run(session: &mut ReplSession) -> Result<()> {
    let history_path = get_data_dir().join("history.txt");
    let mut rl = DefaultEditor::new().context("failed to create line editor")?;
    let _ = rl.load_history(&history_path);

    loop {
        let (rl_back, readline) = readline_async(rl, ">> ".to_string()).await;
        rl = rl_back;

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match commands::parse(&line) {
                    Ok(Command::Exit) => break,
                    Ok(cmd) => {
                        println!();
                        if let Err(e) = session.dispatch(cmd).await {
                            debug!("command failed: {:#}", e);
                            println!("{e}");
                        }
                        println!();
                    }
                    Err(e @ CommandError::Unknown(_)) => println!("{e}"),
                    Err(e @ CommandError::Usage(_)) => {
                        println!();
                        println!("{e}");
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("readline failed"),
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}
