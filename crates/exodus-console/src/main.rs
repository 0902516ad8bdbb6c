//! Interactive console for driving the exodus engine against a simulated
//! host. Useful for trying the selection/arm/run/stop flow end to end
//! without a chat client attached.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use exodus_application::{LeaveDecision, LeaverSession};
use exodus_core::error::ExodusError;
use exodus_core::host::{GuildGateway, Notifier};
use exodus_core::settings::SettingsRepository;
use exodus_infrastructure::{ExodusPaths, TomlSettingsRepository};

const COMMANDS: &[&str] = &[
    "/guilds", "/toggle", "/select", "/clear", "/delay", "/leave", "/stop", "/status",
    "/refresh", "/help",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// An in-memory host: a guild list that shrinks as guilds are left, with a
/// couple of guilds that refuse the leave call so failure accounting shows.
struct SimulatedHost {
    guilds: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
}

impl SimulatedHost {
    fn new() -> Arc<Self> {
        let demo = [
            ("g-0847", "Art Club"),
            ("g-1120", "Byte Brewery"),
            ("g-2203", "catpics"),
            ("g-3317", "Dead Project Graveyard"),
            ("g-4429", "free stuff"),
            ("g-5561", "Gaming Lounge"),
            ("g-6640", "homework help"),
            ("g-7754", "Locked Door"),
            ("g-8812", "rust beginners"),
            ("g-9931", "Rust Hangout"),
        ];
        Arc::new(Self {
            guilds: Mutex::new(
                demo.iter()
                    .map(|(id, name)| (id.to_string(), name.to_string()))
                    .collect(),
            ),
            // "Locked Door" always refuses, to demonstrate failure handling.
            failing: ["g-7754".to_string()].into_iter().collect(),
        })
    }
}

#[async_trait::async_trait]
impl GuildGateway for SimulatedHost {
    async fn list_guilds(&self) -> exodus_core::Result<Vec<Value>> {
        Ok(self
            .guilds
            .lock()
            .unwrap()
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect())
    }

    async fn leave_guild(&self, guild_id: &str) -> exodus_core::Result<()> {
        // Pretend the remote call takes a moment.
        tokio::time::sleep(Duration::from_millis(150)).await;
        if self.failing.contains(guild_id) {
            return Err(ExodusError::gateway(format!(
                "host refused to leave {guild_id}"
            )));
        }
        self.guilds.lock().unwrap().retain(|(id, _)| id != guild_id);
        Ok(())
    }
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        println!("{}", format!("[notice] {message}").bright_yellow());
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_magenta());
    println!("  /guilds [query]   list guilds (filtered)");
    println!("  /toggle <id>      flip one guild's selection");
    println!("  /select [query]   select every guild matching the query");
    println!("  /clear            clear the selection");
    println!("  /delay <ms>       set the inter-leave delay (0-10000)");
    println!("  /leave            leave the selected guilds (press twice to confirm)");
    println!("  /stop             stop after the current guild");
    println!("  /status           show run state and last report");
    println!("  /refresh          reload the guild list from the host");
    println!("  quit              exit");
}

async fn print_guilds(session: &LeaverSession, query: &str) {
    let guilds = session.filtered(query).await;
    if guilds.is_empty() {
        println!("{}", "No guilds match.".bright_black());
        return;
    }
    for guild in guilds {
        let marker = if session.is_selected(&guild.id).await {
            "[x]".bright_green()
        } else {
            "[ ]".normal()
        };
        println!("  {} {}  {}", marker, guild.id.bright_black(), guild.name);
    }
    println!(
        "{}",
        format!("Selected: {}", session.selected_count().await).bright_black()
    );
}

async fn print_status(session: &LeaverSession) {
    let progress = session.latest_progress();
    if session.is_running() {
        println!(
            "{}",
            format!(
                "Running: {}/{} done, {} failed",
                progress.done, progress.total, progress.failed
            )
            .bright_blue()
        );
        if !progress.current.is_empty() {
            println!("{}", format!("Current: {}", progress.current).bright_blue());
        }
    } else {
        println!("{}", "Idle.".bright_black());
    }
    if let Some(summary) = session.last_summary().await {
        println!(
            "{}",
            format!(
                "Last run: {} done, {} failed, cancelled: {}",
                summary.done, summary.failed, summary.cancelled
            )
            .bright_black()
        );
    }
    println!(
        "{}",
        format!("Delay: {} ms", session.delay_ms()).bright_black()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ===== Backend Initialization =====
    let repository: Option<Arc<dyn SettingsRepository>> =
        match TomlSettingsRepository::new(&ExodusPaths::default()) {
            Ok(repository) => Some(Arc::new(repository)),
            Err(error) => {
                eprintln!(
                    "{}",
                    format!("Settings unavailable, using defaults: {error}").yellow()
                );
                None
            }
        };

    let host = SimulatedHost::new();
    let notifier = Arc::new(ConsoleNotifier);
    let session = LeaverSession::new(host, notifier, None, repository).await;
    let _ = session.refresh().await;

    // Print progress transitions as the run advances.
    {
        let mut rx = session.progress();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow().clone();
                if snapshot.total == 0 {
                    continue;
                }
                if snapshot.current.is_empty() {
                    println!(
                        "{}",
                        format!(
                            "  progress: {}/{} done{}",
                            snapshot.done,
                            snapshot.total,
                            if snapshot.failed > 0 {
                                format!(" (failed: {})", snapshot.failed)
                            } else {
                                String::new()
                            }
                        )
                        .bright_blue()
                    );
                } else {
                    println!(
                        "{}",
                        format!("  leaving: {}", snapshot.current).bright_blue()
                    );
                }
            }
        });
    }

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Exodus console ===".bright_magenta().bold());
    println!(
        "{}",
        "Simulated host attached. Type '/help' for commands.".bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                let (command, rest) = match trimmed.split_once(' ') {
                    Some((command, rest)) => (command, rest.trim()),
                    None => (trimmed, ""),
                };

                match command {
                    "/help" => print_help(),
                    "/guilds" => print_guilds(&session, rest).await,
                    "/toggle" => {
                        if rest.is_empty() {
                            println!("{}", "Usage: /toggle <id>".red());
                            continue;
                        }
                        match session.toggle(rest).await {
                            Ok(true) => println!("{}", format!("Selected {rest}").green()),
                            Ok(false) => {
                                println!("{}", format!("Deselected {rest}").green())
                            }
                            Err(error) if error.is_already_running() => {
                                println!("{}", "Run in progress; /stop first.".red())
                            }
                            Err(error) => println!("{}", error.to_string().red()),
                        }
                    }
                    "/select" => match session.select_filtered(rest).await {
                        Ok(count) => {
                            println!("{}", format!("Selected: {count}").green())
                        }
                        Err(error) => println!("{}", error.to_string().red()),
                    },
                    "/clear" => match session.clear_selection().await {
                        Ok(()) => println!("{}", "Selection cleared.".green()),
                        Err(error) => println!("{}", error.to_string().red()),
                    },
                    "/delay" => {
                        let applied = session.set_delay(rest).await;
                        println!("{}", format!("Delay set to {applied} ms").green());
                    }
                    "/leave" => match session.request_leave().await {
                        Ok(LeaveDecision::Started) => {
                            println!("{}", "Run started.".bright_green())
                        }
                        Ok(LeaveDecision::Armed) => {}
                        Ok(LeaveDecision::Declined) => {
                            println!("{}", "Cancelled.".bright_black())
                        }
                        Err(error) => println!("{}", error.to_string().red()),
                    },
                    "/stop" => {
                        if !session.stop().await {
                            println!("{}", "No run in progress.".bright_black());
                        }
                    }
                    "/status" => print_status(&session).await,
                    "/refresh" => match session.refresh().await {
                        Ok(count) => {
                            println!("{}", format!("Loaded {count} guild(s).").green())
                        }
                        Err(error) => println!("{}", error.to_string().red()),
                    },
                    _ => println!("{}", "Unknown command. Try /help.".bright_black()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Err(error) => {
                eprintln!("{}", format!("Readline error: {error}").red());
                break;
            }
        }
    }

    Ok(())
}
