//! Command parsing and handlers for the console.
//!
//! Input lines are parsed into a [`Command`] enum and dispatched with an
//! exhaustive match, so adding a command without wiring a handler is a
//! compile error. Free-text arguments (message bodies, group names) are
//! recovered from the raw line so they keep embedded whitespace.

use std::io::{self, Write as _};
use std::sync::Arc;

use anyhow::Result;

use crate::book::AddressBook;
use crate::chats::{ChatCache, ChatEntry};
use crate::client::WhatsAppClient;
use crate::errors::CommandError;
use crate::phone;

// ============================================================================
// Command surface
// ============================================================================

const USAGE_GROUP_MEMBERS: &str = "group-members <group-name>";
const USAGE_SEND: &str = "send <phone> <message>";
const USAGE_LIST_ADD: &str = "list-add <list-name> <phone...>";
const USAGE_LIST_REM: &str = "list-rem <list-name> <phone...>";
const USAGE_LIST_SHOW: &str = "list-show <list-name>";
const USAGE_LIST_DEL: &str = "list-del <list-name>";
const USAGE_LIST_SEND: &str = "list-send <list-name> <message>";

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Clear,
    Chats,
    Groups,
    GroupMembers { target: String },
    Send { phone: String, message: String },
    Lists,
    ListAdd { name: String, phones: Vec<String> },
    ListRem { name: String, phones: Vec<String> },
    ListShow { name: String },
    ListDel { name: String },
    ListSend { name: String, message: String },
    Exit,
}

/// The tail of `line` after skipping `tokens` whitespace-separated tokens.
fn tail_after(line: &str, tokens: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..tokens {
        match rest.find(char::is_whitespace) {
            Some(pos) => rest = rest[pos..].trim_start(),
            None => return "",
        }
    }
    rest
}

/// Parse a trimmed, non-empty input line into a [`Command`].
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let verb = tokens.first().copied().unwrap_or("");

    let owned = |s: &&str| s.to_string();
    match verb {
        "help" => Ok(Command::Help),
        "clear" => Ok(Command::Clear),
        "chats" => Ok(Command::Chats),
        "groups" => Ok(Command::Groups),
        "group-members" => {
            if tokens.len() < 2 {
                return Err(CommandError::Usage(USAGE_GROUP_MEMBERS));
            }
            Ok(Command::GroupMembers {
                target: tail_after(line, 1).to_string(),
            })
        }
        "send" => {
            if tokens.len() < 3 {
                return Err(CommandError::Usage(USAGE_SEND));
            }
            Ok(Command::Send {
                phone: tokens[1].to_string(),
                message: tail_after(line, 2).to_string(),
            })
        }
        "lists" => Ok(Command::Lists),
        "list-add" => {
            if tokens.len() < 3 {
                return Err(CommandError::Usage(USAGE_LIST_ADD));
            }
            Ok(Command::ListAdd {
                name: tokens[1].to_string(),
                phones: tokens[2..].iter().map(owned).collect(),
            })
        }
        "list-rem" => {
            if tokens.len() < 3 {
                return Err(CommandError::Usage(USAGE_LIST_REM));
            }
            Ok(Command::ListRem {
                name: tokens[1].to_string(),
                phones: tokens[2..].iter().map(owned).collect(),
            })
        }
        "list-show" => {
            if tokens.len() < 2 {
                return Err(CommandError::Usage(USAGE_LIST_SHOW));
            }
            Ok(Command::ListShow {
                name: tokens[1].to_string(),
            })
        }
        "list-del" => {
            if tokens.len() < 2 {
                return Err(CommandError::Usage(USAGE_LIST_DEL));
            }
            Ok(Command::ListDel {
                name: tokens[1].to_string(),
            })
        }
        "list-send" => {
            if tokens.len() < 3 {
                return Err(CommandError::Usage(USAGE_LIST_SEND));
            }
            Ok(Command::ListSend {
                name: tokens[1].to_string(),
                message: tail_after(line, 2).to_string(),
            })
        }
        "exit" => Ok(Command::Exit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

// ============================================================================
// Rendering helpers
// ============================================================================

fn render_grid(cells: impl IntoIterator<Item = String>, per_row: usize) -> String {
    let mut out = String::new();
    let mut n = 0;
    for cell in cells {
        out.push_str(&cell);
        n += 1;
        if n == per_row {
            out.push('\n');
            n = 0;
        }
    }
    out
}

/// Phone numbers right-aligned to 14 columns, 6 per row.
pub(crate) fn render_phone_grid(phones: &[String]) -> String {
    render_grid(phones.iter().map(|p| format!("{p:>14}")), 6)
}

/// Group members right-aligned to 13 columns, 6 per row, annotated with `!`
/// for super-admins and `*` for admins.
pub(crate) fn render_member_grid(chat: &ChatEntry) -> String {
    render_grid(
        chat.participants.iter().map(|p| {
            let marker = if p.is_super_admin {
                '!'
            } else if p.is_admin {
                '*'
            } else {
                ' '
            };
            format!("{:>13}{}", p.id, marker)
        }),
        6,
    )
}

/// Print the `help` command reference.
pub(crate) fn print_help() {
    println!("  * clear                              Clears the console.");
    println!("  * chats                              Shows a list of available chats.");
    println!("  * groups                             Shows a list of available groups.");
    println!("  * group-members <name|#idx>          Shows the members of a group.");
    println!("  * send <phone> <message>             Sends a message to the specified phone number.");
    println!("  * lists                              Shows the registered lists of phone numbers.");
    println!("  * list-add <list-name> <phone...>    Adds one or more phone numbers to a list.");
    println!("  * list-rem <list-name> <phone...>    Removes one or more phone numbers from a list.");
    println!("  * list-show <list-name>              Shows the phone numbers in a list.");
    println!("  * list-del <list-name>               Deletes a list.");
    println!("  * list-send <list-name> <message>    Sends a message to all phone numbers in the list.");
    println!("  * exit                               Quits the console.");
}

// ============================================================================
// ReplSession — all mutable state for the command handlers
// ============================================================================

/// Session state owned by the REPL: the address book, the chat snapshot and
/// the external client. Handlers run one at a time, so no locking is needed.
pub struct ReplSession {
    pub book: AddressBook,
    pub cache: ChatCache,
    pub client: Arc<dyn WhatsAppClient>,
    pub default_cc: String,
}

impl ReplSession {
    pub fn new(book: AddressBook, client: Arc<dyn WhatsAppClient>, default_cc: String) -> Self {
        Self {
            book,
            cache: ChatCache::default(),
            client,
            default_cc,
        }
    }

    fn normalize(&self, token: &str) -> Result<String> {
        Ok(phone::normalize(token, &self.cache, &self.default_cc)?)
    }

    fn normalize_all(&self, tokens: &[String]) -> Result<Vec<String>> {
        tokens.iter().map(|t| self.normalize(t)).collect()
    }

    /// Dispatch one parsed command. Errors are recoverable: the loop prints
    /// them and returns to the prompt.
    pub async fn dispatch(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Help => print_help(),
            Command::Clear => {
                print!("\x1b[2J\x1b[H");
                io::stdout().flush().ok();
            }
            Command::Chats => self.cmd_chats().await?,
            Command::Groups => self.cmd_groups().await?,
            Command::GroupMembers { target } => self.cmd_group_members(&target),
            Command::Send { phone, message } => self.cmd_send(&phone, &message).await?,
            Command::Lists => self.cmd_lists(),
            Command::ListAdd { name, phones } => self.cmd_list_add(&name, &phones)?,
            Command::ListRem { name, phones } => self.cmd_list_rem(&name, &phones)?,
            Command::ListShow { name } => self.cmd_list_show(&name),
            Command::ListDel { name } => self.cmd_list_del(&name)?,
            Command::ListSend { name, message } => self.cmd_list_send(&name, &message).await?,
            // Handled by the loop before dispatch.
            Command::Exit => {}
        }
        Ok(())
    }

    /// `chats` — refresh the snapshot, list non-group chats.
    async fn cmd_chats(&mut self) -> Result<()> {
        let chats = self.client.list_chats().await?;
        self.cache.replace(chats);
        for (idx, chat) in self.cache.entries().unwrap_or(&[]).iter().enumerate() {
            if chat.is_group {
                continue;
            }
            if chat.unread_count > 0 {
                println!("  {}: {} ({})", idx, chat.name, chat.unread_count);
            } else {
                println!("  {}: {}", idx, chat.name);
            }
        }
        Ok(())
    }

    /// `groups` — refresh the snapshot, list group chats.
    async fn cmd_groups(&mut self) -> Result<()> {
        let chats = self.client.list_chats().await?;
        self.cache.replace(chats);
        for (idx, chat) in self.cache.entries().unwrap_or(&[]).iter().enumerate() {
            if !chat.is_group {
                continue;
            }
            println!(
                "  {}: {} [{}] ({})",
                idx, chat.name, chat.group_size, chat.unread_count
            );
        }
        Ok(())
    }

    /// `group-members` — render the members of a cached group located by
    /// exact name or `#index`. Uses the current snapshot without refreshing,
    /// so `#n` means "as shown by the last listing".
    fn cmd_group_members(&self, target: &str) {
        let Some(entries) = self.cache.entries() else {
            println!("  No chat listing available. Run `chats` or `groups` first.");
            return;
        };

        let index = target.strip_prefix('#').map(|s| s.parse::<usize>());
        for (idx, chat) in entries.iter().enumerate() {
            if !chat.is_group {
                continue;
            }
            let matched = match &index {
                Some(Ok(i)) => idx == *i,
                Some(Err(_)) => false,
                None => chat.name == target,
            };
            if matched {
                println!("{}", render_member_grid(chat));
                return;
            }
        }
        println!("  Group `{target}` not found.");
    }

    /// `send` — one message to one normalized phone.
    async fn cmd_send(&mut self, phone: &str, message: &str) -> Result<()> {
        let phone = self.normalize(phone)?;
        match self
            .client
            .send_message(&format!("{phone}@c.us"), message)
            .await
        {
            Ok(()) => println!("Message sent."),
            Err(e) => println!("Error: {e}"),
        }
        Ok(())
    }

    /// `lists` — every list with its length.
    fn cmd_lists(&self) {
        for (name, list) in self.book.iter() {
            println!("  {}: {}", name, list.len());
        }
    }

    /// `list-add` — add normalized phones, reporting duplicates skipped.
    fn cmd_list_add(&mut self, name: &str, phones: &[String]) -> Result<()> {
        let normalized = self.normalize_all(phones)?;
        let outcome = self.book.add(name, &normalized)?;
        if outcome.skipped > 0 {
            println!(
                "  Added {} new phones to {}, and skipped {} duplicated.",
                outcome.added, name, outcome.skipped
            );
        } else {
            println!("  Added {} new phones to {}.", outcome.added, name);
        }
        Ok(())
    }

    /// `list-rem` — remove normalized phones from a list.
    fn cmd_list_rem(&mut self, name: &str, phones: &[String]) -> Result<()> {
        let normalized = self.normalize_all(phones)?;
        match self.book.remove(name, &normalized)? {
            Some(removed) => println!("  Removed {removed} phones from {name}."),
            None => println!("  List `{name}` does not exist."),
        }
        Ok(())
    }

    /// `list-show` — render a list as a fixed-width grid.
    fn cmd_list_show(&self, name: &str) {
        match self.book.get(name) {
            Some(list) => println!("{}", render_phone_grid(list)),
            None => println!("  List `{name}` does not exist."),
        }
    }

    /// `list-del` — delete a list entirely.
    fn cmd_list_del(&mut self, name: &str) -> Result<()> {
        if self.book.delete(name)? {
            println!("List successfully deleted.");
        } else {
            println!("List `{name}` does not exist.");
        }
        Ok(())
    }

    /// `list-send` — sequential sends to every phone in the list, with
    /// per-recipient progress. A failed send is reported and does not abort
    /// the rest of the batch.
    async fn cmd_list_send(&mut self, name: &str, message: &str) -> Result<()> {
        let Some(list) = self.book.get(name) else {
            println!("List `{name}` does not exist.");
            return Ok(());
        };
        let list = list.to_vec();
        let total = list.len();

        for (k, phone) in list.iter().enumerate() {
            println!("  [{}/{}] Sending to {} ...", k + 1, total, phone);
            if let Err(e) = self
                .client
                .send_message(&format!("{phone}@c.us"), message)
                .await
            {
                println!("  Error: {e}");
            }
        }
        println!("  Done");
        Ok(())
    }
}
