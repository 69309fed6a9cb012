//! The administrative command surface.
//!
//! ```text
//! (no args)           status banner
//! reload              re-read configuration
//! reconnect           drop the connection and connect again
//! token get           show the token        (console only)
//! token reset         generate a new token  (console only)
//! ```
//!
//! Subcommands are matched case-insensitively.

use std::fmt;

use crate::{CommandError, Relay};

const SUBCOMMANDS: [&str; 3] = ["reload", "reconnect", "token"];
const TOKEN_ACTIONS: [&str; 2] = ["get", "reset"];
const TOKEN_USAGE: &str = "token <get|reset>";

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// The operator console. The only privileged caller.
    Console,
    /// A named remote user.
    Player(String),
}

impl Caller {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Console)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => f.write_str("console"),
            Self::Player(name) => write!(f, "player {name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    Get,
    Reset,
}

/// A parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    Status,
    Reload,
    Reconnect,
    /// `None` when the action is missing or unrecognized; answered with
    /// a usage hint, but only after the privilege check.
    Token(Option<TokenAction>),
}

impl Subcommand {
    /// Parses the arguments after the command name.
    ///
    /// # Errors
    /// Returns [`CommandError::UnknownSubcommand`] for anything that is
    /// not `reload`, `reconnect`, or `token`.
    pub fn parse(args: &[&str]) -> Result<Self, CommandError> {
        let Some(first) = args.first() else {
            return Ok(Self::Status);
        };

        match first.to_ascii_lowercase().as_str() {
            "reload" => Ok(Self::Reload),
            "reconnect" => Ok(Self::Reconnect),
            "token" => {
                let action = match args {
                    [_, action] if action.eq_ignore_ascii_case("get") => Some(TokenAction::Get),
                    [_, action] if action.eq_ignore_ascii_case("reset") => {
                        Some(TokenAction::Reset)
                    }
                    _ => None,
                };
                Ok(Self::Token(action))
            }
            _ => Err(CommandError::UnknownSubcommand(first.to_string())),
        }
    }

    /// Token commands are restricted to the console.
    pub fn requires_privilege(&self) -> bool {
        matches!(self, Self::Token(_))
    }
}

/// Text to show the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub lines: Vec<String>,
    pub is_error: bool,
}

impl CommandReply {
    pub fn ok(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            is_error: false,
        }
    }

    pub fn error(error: impl fmt::Display) -> Self {
        Self {
            lines: vec![error.to_string()],
            is_error: true,
        }
    }
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

/// Runs one command line against `relay`.
///
/// Never fails: every problem becomes an error reply.
pub fn execute(relay: &Relay, caller: &Caller, args: &[&str]) -> CommandReply {
    let command = match Subcommand::parse(args) {
        Ok(command) => command,
        Err(e) => return CommandReply::error(e),
    };

    if command.requires_privilege() && !caller.is_privileged() {
        tracing::warn!(%caller, "refused token command");
        return CommandReply::error(CommandError::PermissionDenied);
    }

    match command {
        Subcommand::Status => status(relay),
        Subcommand::Reload => CommandReply::ok(relay.reload().to_string()),
        Subcommand::Reconnect => match relay.reconnect() {
            Ok(()) => CommandReply::ok(format!("reconnecting to {}", relay.config().endpoint())),
            Err(e) => CommandReply::error(e),
        },
        Subcommand::Token(None) => CommandReply::error(CommandError::Usage(TOKEN_USAGE)),
        Subcommand::Token(Some(TokenAction::Get)) => {
            CommandReply::ok(format!("current token: {}", relay.token()))
        }
        Subcommand::Token(Some(TokenAction::Reset)) => CommandReply::ok(format!(
            "new token generated: {} (sent on the next reconnect)",
            relay.reset_token()
        )),
    }
}

fn status(relay: &Relay) -> CommandReply {
    CommandReply {
        lines: vec![
            format!("gamerelay v{}", env!("CARGO_PKG_VERSION")),
            format!("session: {}", relay.state()),
            "subcommands: reload, reconnect, token <get|reset> (console only)".to_string(),
        ],
        is_error: false,
    }
}

/// Completions for a partially typed command line.
///
/// The last element of `args` is the word being typed.
pub fn complete(args: &[&str]) -> Vec<&'static str> {
    match args {
        [] => SUBCOMMANDS.to_vec(),
        [first] => matching(&SUBCOMMANDS, first),
        [first, second] if first.eq_ignore_ascii_case("token") => {
            matching(&TOKEN_ACTIONS, second)
        }
        _ => Vec::new(),
    }
}

fn matching(options: &[&'static str], prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.to_ascii_lowercase();
    options
        .iter()
        .copied()
        .filter(|option| option.starts_with(&prefix))
        .collect()
}
