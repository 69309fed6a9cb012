//! console-relay: a stand-in host that reads game events and admin
//! commands from stdin and relays them with gamerelay.
//!
//! ```text
//! join Alex                       player joined
//! quit Alex                       player left
//! chat Alex hello there           chat line
//! chat! Alex psst                 chat line cancelled upstream
//! death Alex fell from a cliff    death (message optional)
//! /token get                      admin command as the console
//! as Alex /reload                 admin command as a player
//! complete token r                tab completions
//! exit                            shut down
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use gamerelay::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "console-relay")]
#[command(about = "Relay game events typed on stdin to a remote listener")]
struct Cli {
    /// Path to the TOML configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "gamerelay/config.toml")]
    config: PathBuf,

    /// Directory holding the persisted token
    #[arg(short, long, default_value = "gamerelay")]
    data_dir: PathBuf,
}

/// Hands out a stable UUID per player name for the life of the process.
#[derive(Default)]
struct Roster {
    players: HashMap<String, Uuid>,
}

impl Roster {
    fn get(&mut self, name: &str) -> PlayerRef {
        let uuid = *self
            .players
            .entry(name.to_string())
            .or_insert_with(Uuid::new_v4);
        PlayerRef::new(name, uuid)
    }
}

enum Line<'a> {
    Event(GameEvent),
    Command(Caller, Vec<&'a str>),
    Complete(Vec<&'a str>),
    Exit,
    Blank,
}

fn parse_line<'a>(line: &'a str, roster: &mut Roster) -> Result<Line<'a>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Blank);
    }
    if let Some(command) = line.strip_prefix('/') {
        return Ok(Line::Command(Caller::Console, command.split_whitespace().collect()));
    }

    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let (name, text) = rest.split_once(' ').unwrap_or((rest, ""));

    match head {
        "exit" => Ok(Line::Exit),
        "complete" => Ok(Line::Complete(rest.split_whitespace().collect())),
        "as" => {
            let Some(command) = text.trim().strip_prefix('/') else {
                return Err("usage: as <player> /<command>".into());
            };
            Ok(Line::Command(
                Caller::Player(name.to_string()),
                command.split_whitespace().collect(),
            ))
        }
        _ if name.is_empty() => Err(format!("usage: {head} <player> [text]")),
        "join" => Ok(Line::Event(GameEvent::join(roster.get(name)))),
        "quit" => Ok(Line::Event(GameEvent::quit(roster.get(name)))),
        "chat" => Ok(Line::Event(GameEvent::chat(roster.get(name), text, false))),
        "chat!" => Ok(Line::Event(GameEvent::chat(roster.get(name), text, true))),
        "death" => {
            let message = (!text.is_empty()).then(|| text.to_string());
            Ok(Line::Event(GameEvent::death(roster.get(name), message)))
        }
        other => Err(format!("unknown input '{other}'")),
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(config = %cli.config.display(), data_dir = %cli.data_dir.display(), "starting");

    let relay = Relay::start(
        NetTransport,
        FileConfigSource::new(&cli.config),
        TokenStore::new(FileBlobStore::new(cli.data_dir.join("token"))),
    );

    let mut roster = Roster::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_line(&line, &mut roster) {
            Ok(Line::Event(event)) => {
                let outcome = relay.on_event(&event);
                println!("{outcome:?}");
            }
            Ok(Line::Command(caller, args)) => {
                println!("{}", execute(&relay, &caller, &args));
            }
            Ok(Line::Complete(args)) => println!("{}", complete(&args).join(" ")),
            Ok(Line::Exit) => break,
            Ok(Line::Blank) => {}
            Err(usage) => eprintln!("{usage}"),
        }
    }

    relay.shutdown().await;
    Ok(())
}
