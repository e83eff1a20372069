#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Quit,
    Clear,
    Status,
    Help,
}

/// Command tokens with their help text, in display order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help message"),
    ("/quit", "Exit the program"),
    ("/exit", "Exit the program"),
    ("/bye", "Exit the program"),
    ("/clear", "Clear conversation history"),
    ("/status", "Show current configuration"),
];

const TOKENS: &[(&str, SessionCommand)] = &[
    ("/quit", SessionCommand::Quit),
    ("/exit", SessionCommand::Quit),
    ("/bye", SessionCommand::Quit),
    ("/clear", SessionCommand::Clear),
    ("/status", SessionCommand::Status),
    ("/help", SessionCommand::Help),
];

impl SessionCommand {
    /// Matches a whole command token, ignoring ASCII case; anything else is a message.
    pub fn parse(token: &str) -> Option<Self> {
        TOKENS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, command)| *command)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionInput<'a> {
    Blank,
    Command(SessionCommand),
    Message(&'a str),
}

pub fn classify(line: &str) -> SessionInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return SessionInput::Blank;
    }
    match SessionCommand::parse(trimmed) {
        Some(command) => SessionInput::Command(command),
        None => SessionInput::Message(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, SessionCommand, SessionInput};

    #[test]
    fn exit_tokens_all_quit() {
        for token in ["/quit", "/exit", "/bye", "  /bye \n"] {
            assert_eq!(classify(token), SessionInput::Command(SessionCommand::Quit));
        }
    }

    #[test]
    fn commands_ignore_case_but_not_trailing_words() {
        assert_eq!(classify("/QUIT"), SessionInput::Command(SessionCommand::Quit));
        assert_eq!(classify("/Exit"), SessionInput::Command(SessionCommand::Quit));
        assert_eq!(classify("/Clear"), SessionInput::Command(SessionCommand::Clear));
        assert_eq!(classify("/STATUS"), SessionInput::Command(SessionCommand::Status));
        assert_eq!(classify("/help"), SessionInput::Command(SessionCommand::Help));
        assert_eq!(classify("/quit now"), SessionInput::Message("/quit now"));
    }

    #[test]
    fn blank_and_plain_lines() {
        assert_eq!(classify("   "), SessionInput::Blank);
        assert_eq!(
            classify("  Can I get a refund?  "),
            SessionInput::Message("Can I get a refund?")
        );
    }
}
