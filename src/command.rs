#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Feed,
    Explore,
    Profile(u64),
    Me,
    Logout,
    Help,
    Quit,
}

pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.strip_prefix(':').unwrap_or(input).trim();

    if input.is_empty() {
        return None;
    }

    let (cmd, args) = match input.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (input, ""),
    };

    match cmd {
        "profile" | "p" if !args.is_empty() => parse_user_id(args).map(Command::Profile),
        "feed" | "f" => Some(Command::Feed),
        "explore" | "e" => Some(Command::Explore),
        "me" => Some(Command::Me),
        "logout" => Some(Command::Logout),
        "help" | "h" => Some(Command::Help),
        "quit" | "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Accept `42`, `#42` or a profile URL ending in `/profile/42`.
pub fn parse_user_id(input: &str) -> Option<u64> {
    let trimmed = input.trim().trim_end_matches('/');
    let candidate = trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .trim_start_matches('#');
    candidate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_profile() {
        assert_eq!(parse_command(":profile 42"), Some(Command::Profile(42)));
        assert_eq!(parse_command("p #7"), Some(Command::Profile(7)));
        assert_eq!(parse_command(":profile bob"), None);
        assert_eq!(parse_command(":profile"), None);
    }

    #[test]
    fn test_parse_command_aliases() {
        assert_eq!(parse_command(":q"), Some(Command::Quit));
        assert_eq!(parse_command(":h"), Some(Command::Help));
        assert_eq!(parse_command(":f"), Some(Command::Feed));
        assert_eq!(parse_command(":e"), Some(Command::Explore));
        assert_eq!(parse_command(":me"), Some(Command::Me));
        assert_eq!(parse_command(":logout"), Some(Command::Logout));
    }

    #[test]
    fn test_parse_command_empty() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command(":"), None);
        assert_eq!(parse_command(":search rust"), None);
    }

    #[test]
    fn test_parse_user_id_from_url() {
        assert_eq!(
            parse_user_id("https://fixit.example/profile/123/"),
            Some(123)
        );
        assert_eq!(parse_user_id("not-an-id"), None);
    }
}
