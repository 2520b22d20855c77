//! Chat command parsing.

/// Shortcut commands and the theme each one serves.
pub const THEME_SHORTCUTS: [(&str, &str); 4] = [
    ("factspooky", "spooky"),
    ("factscience", "science"),
    ("facthistory", "history"),
    ("factfun", "custom"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `!fact [theme]`
    Fact(Option<String>),
    /// `!factspooky` and friends.
    ThemedFact(&'static str),
    Themes,
    FactCount(Option<String>),
    FactList,
    AddFact { theme: String, fact: String },
    /// `!addfact` with a missing theme or fact.
    AddFactUsage,
}

impl ChatCommand {
    /// Whether the command draws a fact and therefore consumes the
    /// sender's cooldown.
    pub fn is_fact_request(&self) -> bool {
        matches!(self, Self::Fact(_) | Self::ThemedFact(_))
    }
}

/// Parse one chat line.  Returns `None` for ordinary chatter and unknown
/// commands.  The command word is case-insensitive and may carry an
/// `@botname` suffix.
pub fn parse_command(text: &str, prefix: &str) -> Option<ChatCommand> {
    let rest = text.trim().strip_prefix(prefix)?;
    if prefix.is_empty() || rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut parts = rest.splitn(2, char::is_whitespace);
    let word = parts.next().unwrap_or_default();
    let word = word
        .split_once('@')
        .map(|(base, _)| base)
        .unwrap_or(word)
        .to_lowercase();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    let command = match word.as_str() {
        "fact" => ChatCommand::Fact(arg),
        "themes" => ChatCommand::Themes,
        "factcount" => ChatCommand::FactCount(arg),
        "factlist" => ChatCommand::FactList,
        "addfact" => parse_add_fact(arg.as_deref()),
        other => {
            let (_, theme) = THEME_SHORTCUTS.iter().find(|(name, _)| *name == other)?;
            ChatCommand::ThemedFact(*theme)
        }
    };
    Some(command)
}

fn parse_add_fact(arg: Option<&str>) -> ChatCommand {
    let Some((theme, fact)) = arg.and_then(|a| a.split_once(char::is_whitespace)) else {
        return ChatCommand::AddFactUsage;
    };
    let fact = fact.trim();
    if fact.is_empty() {
        return ChatCommand::AddFactUsage;
    }
    ChatCommand::AddFact {
        theme: theme.to_string(),
        fact: fact.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fact_with_and_without_theme() {
        assert_eq!(parse_command("!fact", "!"), Some(ChatCommand::Fact(None)));
        assert_eq!(
            parse_command("  !fact   science  ", "!"),
            Some(ChatCommand::Fact(Some("science".to_string())))
        );
    }

    #[test]
    fn shortcuts_map_to_themes() {
        assert_eq!(
            parse_command("!factfun", "!"),
            Some(ChatCommand::ThemedFact("custom"))
        );
        assert_eq!(
            parse_command("!FactSpooky", "!"),
            Some(ChatCommand::ThemedFact("spooky"))
        );
    }

    #[test]
    fn strips_bot_mentions() {
        assert_eq!(parse_command("!themes@factbot", "!"), Some(ChatCommand::Themes));
        assert_eq!(
            parse_command("!factcount@factbot history", "!"),
            Some(ChatCommand::FactCount(Some("history".to_string())))
        );
    }

    #[test]
    fn ignores_chatter_and_unknown_commands() {
        assert_eq!(parse_command("hello chat", "!"), None);
        assert_eq!(parse_command("!dance", "!"), None);
        assert_eq!(parse_command("! fact", "!"), None);
        assert_eq!(parse_command("?fact", "!"), None);
        assert_eq!(parse_command("!fact", ""), None);
    }

    #[test]
    fn custom_prefix() {
        assert_eq!(parse_command("?factlist", "?"), Some(ChatCommand::FactList));
    }

    #[test]
    fn add_fact_needs_theme_and_text() {
        assert_eq!(
            parse_command("!addfact spooky Crows remember faces.", "!"),
            Some(ChatCommand::AddFact {
                theme: "spooky".to_string(),
                fact: "Crows remember faces.".to_string(),
            })
        );
        assert_eq!(parse_command("!addfact spooky", "!"), Some(ChatCommand::AddFactUsage));
        assert_eq!(parse_command("!addfact", "!"), Some(ChatCommand::AddFactUsage));
    }

    #[test]
    fn only_fact_commands_consume_cooldown() {
        assert!(ChatCommand::Fact(None).is_fact_request());
        assert!(ChatCommand::ThemedFact("spooky").is_fact_request());
        assert!(!ChatCommand::Themes.is_fact_request());
        assert!(!ChatCommand::FactList.is_fact_request());
    }
}
