//! Command parsing for the terminal client and other text interfaces.
//!
//! This module parses input lines into structured [`Command`] values.

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a chat message.
    Message {
        /// Message content.
        content: String,
    },

    /// Dispose the session and open a new one.
    Restart,

    /// Forget the conversation.
    Clear,

    /// Print the conversation so far.
    History,

    /// Quit the application.
    Quit,

    /// Unknown command.
    Unknown {
        /// The original input.
        input: String,
    },
}

/// Parse a user input line into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let command = cmd_str.split_whitespace().next().unwrap_or("");

    match command {
        "restart" | "reconnect" => Command::Restart,
        "clear" => Command::Clear,
        "history" => Command::History,
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown { input: input.to_string() },
    }
}
