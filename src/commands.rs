use serenity::all::UserId;

/// Fixed literal command prefix. No sub-commands, no flags.
const PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Ask(String),
    Roll(u32),
}

/// Parse a chat message into a command. Anything that doesn't match a known
/// prefix with well-formed arguments is ignored.
pub fn parse(content: &str) -> Option<Command> {
    let rest = content.trim().strip_prefix(PREFIX)?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "ping" => Some(Command::Ping),
        "ask" if !args.is_empty() => Some(Command::Ask(args.to_string())),
        "roll" => args.parse().ok().filter(|&size| size > 0).map(Command::Roll),
        _ => None,
    }
}

/// Remove the bot's own mention markup from a message, leaving the prompt text.
pub fn strip_mention(content: &str, bot_user: UserId) -> String {
    content
        .replace(&format!("<@!{bot_user}>"), " ")
        .replace(&format!("<@{bot_user}>"), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ping() {
        assert_eq!(parse("!ping"), Some(Command::Ping));
        assert_eq!(parse("  !ping  "), Some(Command::Ping));
    }

    #[test]
    fn parses_ask_with_a_prompt() {
        assert_eq!(
            parse("!ask what is rust?"),
            Some(Command::Ask("what is rust?".to_string()))
        );
    }

    #[test]
    fn ask_without_a_prompt_is_ignored() {
        assert_eq!(parse("!ask"), None);
        assert_eq!(parse("!ask   "), None);
    }

    #[test]
    fn parses_roll_with_a_die_size() {
        assert_eq!(parse("!roll 20"), Some(Command::Roll(20)));
    }

    #[test]
    fn malformed_roll_is_ignored() {
        assert_eq!(parse("!roll"), None);
        assert_eq!(parse("!roll twenty"), None);
        assert_eq!(parse("!roll 0"), None);
        assert_eq!(parse("!roll -4"), None);
    }

    #[test]
    fn non_commands_are_ignored() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("!frobnicate"), None);
        assert_eq!(parse("! ping"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn strips_plain_and_nickname_mentions() {
        let bot = UserId::new(42);
        assert_eq!(strip_mention("<@42> hello", bot), "hello");
        assert_eq!(strip_mention("<@!42> hello there", bot), "hello there");
        assert_eq!(strip_mention("hey <@42>, got a minute?", bot), "hey , got a minute?");
    }

    #[test]
    fn leaves_other_mentions_alone() {
        let bot = UserId::new(42);
        assert_eq!(strip_mention("<@99> hello", bot), "<@99> hello");
    }
}
