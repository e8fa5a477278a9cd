//! Command parsing for text-based interfaces.
//!
//! This module parses input lines into structured [`Command`] values.
//! Arguments are the rest of the line after the command word, so batch
//! commands accept any mix of separators: `/mlock a, b;c d`.

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Identify with a display name.
    Connect {
        /// Display name.
        name: String,
    },

    /// Drop the current identity.
    Close,

    /// Acquire one lock.
    Lock {
        /// Lock name.
        name: String,
    },

    /// Release one lock.
    Unlock {
        /// Lock name.
        name: String,
    },

    /// Acquire several locks.
    MultiLock {
        /// Free-text list of lock names.
        names: String,
    },

    /// Release several locks.
    MultiUnlock {
        /// Free-text list of lock names.
        names: String,
    },

    /// Quit the application.
    Quit,

    /// Blank line.
    Empty,

    /// Unknown command or plain text.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse a user input line into a command.
///
/// Commands start with `/`. Anything else is [`Command::Unknown`].
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Empty;
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let (command, rest) = match cmd_str.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (cmd_str, ""),
    };

    let with_arg = |usage: &str, build: fn(String) -> Command| {
        if rest.is_empty() {
            Command::InvalidArgs { command: command.to_string(), error: format!("Usage: {usage}") }
        } else {
            build(rest.to_string())
        }
    };

    match command {
        "connect" | "login" => with_arg("/connect <name>", |name| Command::Connect { name }),
        "close" | "logout" => Command::Close,
        "lock" => with_arg("/lock <name>", |name| Command::Lock { name }),
        "unlock" => with_arg("/unlock <name>", |name| Command::Unlock { name }),
        "mlock" => with_arg("/mlock <names>", |names| Command::MultiLock { names }),
        "munlock" => with_arg("/munlock <names>", |names| Command::MultiUnlock { names }),
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown { input: input.to_string() },
    }
}
