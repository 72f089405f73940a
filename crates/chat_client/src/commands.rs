#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Reset,
    Settings,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str =
    "Commands: /help, /reset, /settings, /quit. Answer y/yes or n/no when code is awaiting confirmation.";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_string();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/reset" | "/clear" => SlashCommand::Reset,
        "/settings" => SlashCommand::Settings,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}

/// Reads a line as an answer to a pending confirmation.
pub fn parse_confirmation_answer(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
