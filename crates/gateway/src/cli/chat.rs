//! `hearth chat`: the interactive REPL.
//!
//! Reads lines with rustyline and hands them to the orchestrator.  Replies
//! are not printed by the turn itself: a renderer task watches the session
//! store and prints every new assistant message, so proactive messages that
//! arrive while the user is `/away` show up the same way.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hearth_domain::config::Config;
use hearth_domain::{GeoLocation, Message, NotificationFrequency, Sender, Session};

use crate::bootstrap::{self, Frontend};
use crate::cli::terminal::{TerminalEnvironment, TerminalNotifier, TerminalSounds};
use crate::runtime::{Orchestrator, Permission, TurnOutcome, Visibility};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: Arc<Config>) -> anyhow::Result<()> {
    // 1. Boot the runtime with terminal seams.
    let environment = Arc::new(TerminalEnvironment::default());
    let orchestrator = bootstrap::build_orchestrator(
        &config,
        Frontend {
            environment: environment.clone(),
            notifier: Arc::new(TerminalNotifier),
            sounds: Arc::new(TerminalSounds),
        },
    )?;

    // 2. Background tasks: periodic flush and the proactive heartbeat.
    let tasks = bootstrap::spawn_background_tasks(&config, &orchestrator);
    let renderer = spawn_renderer(&orchestrator);

    // 3. Line editor on its own thread, with persistent history.
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".hearth")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let (mut lines, resume, reader) = spawn_line_reader(history_path);

    let companion = orchestrator.read().companion.name.clone();
    eprintln!("Hearth: chatting with {companion}");
    eprintln!("Type /help for commands, Ctrl+D to exit");
    eprintln!();

    // 4. REPL loop.
    while let Some(input) = lines.recv().await {
        let keep_going = match input {
            Input::Line(line) => handle_line(&orchestrator, &environment, line.trim()).await,
            Input::Interrupted => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                true
            }
            Input::Eof => false,
            Input::Failed(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                false
            }
        };
        if resume.send(keep_going).is_err() || !keep_going {
            break;
        }
    }

    // 5. Stop timers and persist the session; the reader saves its history.
    if let Err(e) = orchestrator.shutdown() {
        eprintln!("\x1B[31mfailed to save session: {e}\x1B[0m");
    }
    renderer.abort();
    for task in tasks {
        let _ = task.await;
    }
    drop(resume);
    let _ = tokio::task::spawn_blocking(move || reader.join()).await;

    eprintln!("Goodbye!");
    Ok(())
}

/// Returns `false` when the REPL should exit.
async fn handle_line(
    orchestrator: &Orchestrator,
    environment: &TerminalEnvironment,
    line: &str,
) -> bool {
    if line.is_empty() {
        return true;
    }
    let command = if line.starts_with('/') {
        match parse_slash_command(line) {
            Ok(cmd) => cmd,
            Err(usage) => {
                eprintln!("{usage}");
                return true;
            }
        }
    } else {
        SlashCommand::Say(line.to_owned())
    };

    if command == SlashCommand::Exit {
        return false;
    }
    run_command(orchestrator, environment, command).await;
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Line reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Input {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

/// Run rustyline on a dedicated thread.  After each line the thread waits
/// on `resume` so the prompt only comes back once the turn has finished.
fn spawn_line_reader(
    history_path: PathBuf,
) -> (
    mpsc::Receiver<Input>,
    std::sync::mpsc::Sender<bool>,
    std::thread::JoinHandle<()>,
) {
    let (tx, rx) = mpsc::channel(1);
    let (resume_tx, resume_rx) = std::sync::mpsc::channel::<bool>();

    let handle = std::thread::spawn(move || {
        let mut rl = match rustyline::DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                let _ = tx.blocking_send(Input::Failed(e.to_string()));
                return;
            }
        };
        let _ = rl.load_history(&history_path);

        loop {
            let input = match rl.readline("you> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(&line).ok();
                    }
                    Input::Line(line)
                }
                Err(ReadlineError::Interrupted) => Input::Interrupted,
                Err(ReadlineError::Eof) => Input::Eof,
                Err(e) => Input::Failed(e.to_string()),
            };
            let last = matches!(input, Input::Eof | Input::Failed(_));
            if tx.blocking_send(input).is_err() || last {
                break;
            }
            if !matches!(resume_rx.recv(), Ok(true)) {
                break;
            }
        }

        rl.save_history(&history_path).ok();
    });

    (rx, resume_tx, handle)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    /// Plain chat input.
    Say(String),
    OutOfCharacter(String),
    Regenerate,
    Away,
    Back,
    Notify(NotificationFrequency),
    Remember(String),
    Journal(String),
    Fix(String),
    Tag(Vec<String>),
    Location(Option<GeoLocation>),
    Clear,
    Help,
    Exit,
}

/// Parse a `/command [arg]` line.  The error is a message for the user.
pub fn parse_slash_command(input: &str) -> Result<SlashCommand, String> {
    let (cmd, arg) = match input.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (input, ""),
    };
    let required = |usage: &str| {
        if arg.is_empty() {
            Err(format!("Usage: {usage}"))
        } else {
            Ok(arg.to_owned())
        }
    };

    let command = match cmd {
        "/exit" | "/quit" => SlashCommand::Exit,
        "/help" => SlashCommand::Help,
        "/regen" => SlashCommand::Regenerate,
        "/away" => SlashCommand::Away,
        "/back" => SlashCommand::Back,
        "/clear" => SlashCommand::Clear,
        "/ooc" => SlashCommand::OutOfCharacter(required("/ooc <text>")?),
        "/remember" => SlashCommand::Remember(required("/remember <text>")?),
        "/journal" => SlashCommand::Journal(required("/journal <text>")?),
        "/fix" => SlashCommand::Fix(required("/fix <text>")?),
        "/tag" => {
            let raw = required("/tag <tag>[, <tag>...]")?;
            SlashCommand::Tag(raw.split(',').map(|t| t.trim().to_owned()).collect())
        }
        "/notify" => {
            let tier = required("/notify <off|rarely|occasionally|frequently|very-frequently>")?;
            match NotificationFrequency::parse(&tier) {
                Some(freq) => SlashCommand::Notify(freq),
                None => return Err(format!("Unknown notification tier: {tier}")),
            }
        }
        "/location" => {
            let raw = required("/location <latitude> <longitude> | off")?;
            if raw.eq_ignore_ascii_case("off") {
                SlashCommand::Location(None)
            } else {
                SlashCommand::Location(Some(parse_location(&raw)?))
            }
        }
        other => return Err(format!("Unknown command: {other}  (type /help for a list)")),
    };
    Ok(command)
}

fn parse_location(raw: &str) -> Result<GeoLocation, String> {
    let mut parts = raw.split(|c: char| c == ',' || c.is_whitespace()).filter(|p| !p.is_empty());
    let mut coord = |name: &str| {
        parts
            .next()
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(|| format!("Expected a numeric {name}"))
    };
    Ok(GeoLocation {
        latitude: coord("latitude")?,
        longitude: coord("longitude")?,
    })
}

async fn run_command(
    orchestrator: &Orchestrator,
    environment: &TerminalEnvironment,
    command: SlashCommand,
) {
    match command {
        SlashCommand::Say(text) => report(orchestrator.handle_user_turn(Message::user(text)).await),
        SlashCommand::OutOfCharacter(text) => {
            report(
                orchestrator
                    .handle_user_turn(Message::user(text).out_of_character())
                    .await,
            );
        }
        SlashCommand::Regenerate => {
            let last = orchestrator
                .read()
                .last_from(Sender::Assistant)
                .map(|m| m.id.clone());
            match last {
                Some(id) => match orchestrator.regenerate(&id).await {
                    Some(outcome) => report(outcome),
                    None => eprintln!("Nothing to regenerate."),
                },
                None => eprintln!("Nothing to regenerate."),
            }
        }
        SlashCommand::Away => {
            environment.set_visibility(Visibility::Hidden);
            eprintln!("(away: proactive messages may arrive as notifications)");
        }
        SlashCommand::Back => {
            environment.set_visibility(Visibility::Visible);
            eprintln!("(welcome back)");
        }
        SlashCommand::Notify(frequency) => {
            let enabled = frequency != NotificationFrequency::Off;
            let permission = orchestrator.set_notifications(enabled, frequency).await;
            if !enabled {
                eprintln!("Notifications off.");
            } else if permission == Permission::Granted {
                eprintln!("Notifications on ({frequency:?}).");
            } else {
                eprintln!("Notifications saved, but permission was not granted.");
            }
        }
        SlashCommand::Remember(text) => {
            orchestrator.update(|s| {
                s.add_memory(text);
            });
            eprintln!("Noted.");
        }
        SlashCommand::Journal(text) => {
            let title = Utc::now().format("%Y-%m-%d").to_string();
            orchestrator.update(|s| {
                s.add_journal_entry(title, text, None);
            });
            eprintln!("Journal entry saved.");
        }
        SlashCommand::Fix(text) => {
            let fixed = orchestrator.update(|s| {
                let id = s.messages.last().map(|m| m.id.clone());
                id.is_some_and(|id| s.correct_message_text(&id, text))
            });
            if !fixed {
                eprintln!("No message to fix.");
            }
        }
        SlashCommand::Tag(tags) => {
            let tagged = orchestrator.update(|s| {
                let id = s
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.image.is_some())
                    .map(|m| m.id.clone());
                id.is_some_and(|id| s.tag_image(&id, tags))
            });
            if !tagged {
                eprintln!("No image to tag.");
            }
        }
        SlashCommand::Location(location) => {
            orchestrator.set_location(location);
            match location {
                Some(l) => eprintln!("Location set to {:.4}, {:.4}.", l.latitude, l.longitude),
                None => eprintln!("Location cleared."),
            }
        }
        SlashCommand::Clear => {
            orchestrator.update(|s| s.clear_chat());
            eprint!("\x1B[2J\x1B[1;1H");
        }
        SlashCommand::Help => print_help(),
        SlashCommand::Exit => {}
    }
}

fn report(outcome: TurnOutcome) {
    if outcome == TurnOutcome::Busy {
        eprintln!("(still working on the previous message)");
    }
}

fn print_help() {
    eprintln!("Commands:");
    eprintln!("  /regen                Regenerate the last answer");
    eprintln!("  /ooc <text>           Send an out-of-character message");
    eprintln!("  /away, /back          Leave or return to the chat");
    eprintln!("  /notify <tier>        off, rarely, occasionally, frequently, very-frequently");
    eprintln!("  /remember <text>      Save a long-term memory");
    eprintln!("  /journal <text>       Add a journal entry");
    eprintln!("  /fix <text>           Correct the last message");
    eprintln!("  /tag <a>, <b>         Tag the most recent image");
    eprintln!("  /location <lat> <lon> Share a location (or `off`)");
    eprintln!("  /clear                Clear the chat history");
    eprintln!("  /exit, /quit          Exit");
    eprintln!("  /help                 Show this help");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Print each assistant message the first time it appears in the store.
fn spawn_renderer(orchestrator: &Orchestrator) -> JoinHandle<()> {
    let mut rx = orchestrator.subscribe();
    let mut seen: HashSet<String> = orchestrator
        .read()
        .messages
        .iter()
        .map(|m| m.id.clone())
        .collect();

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let session = rx.borrow_and_update().clone();
            for line in unseen_replies(&session, &mut seen) {
                println!("{line}\n");
            }
        }
    })
}

/// Rendered text of assistant messages not yet in `seen`, which is updated
/// to hold exactly the ids of `session`.
fn unseen_replies(session: &Session, seen: &mut HashSet<String>) -> Vec<String> {
    let mut out = Vec::new();
    for msg in &session.messages {
        if !seen.insert(msg.id.clone()) || msg.sender != Sender::Assistant {
            continue;
        }
        out.push(render_reply(&session.companion.name, msg));
    }
    // Every current id is in `seen` now; anything extra was truncated away.
    if seen.len() > session.messages.len() {
        *seen = session.messages.iter().map(|m| m.id.clone()).collect();
    }
    out
}

fn render_reply(name: &str, msg: &Message) -> String {
    let mut text = if msg.ooc {
        format!("\x1B[2m{name} (ooc)>\x1B[0m {}", msg.text)
    } else {
        format!("\x1B[1m{name}>\x1B[0m {}", msg.text)
    };
    if let Some(image) = &msg.image {
        text.push_str(&format!("\n  [image: {}]", image.url));
    }
    if let Some(link) = &msg.link {
        text.push_str(&format!("\n  [link: {link}]"));
    }
    if let Some(grounding) = &msg.grounding {
        for source in &grounding.sources {
            text.push_str(&format!("\n  [source: {} <{}>]", source.title, source.uri));
        }
    }
    text
}
