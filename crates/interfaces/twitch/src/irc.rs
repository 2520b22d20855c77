//! Minimal IRC line handling for Twitch chat.

use std::collections::HashMap;

/// Twitch rejects chat messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse one raw line: `[@tags] [:prefix] COMMAND [params...] [:trailing]`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let mut message = Self::default();

        if let Some(tagged) = rest.strip_prefix('@') {
            let (tags, tail) = tagged.split_once(' ')?;
            message.tags = tags
                .split(';')
                .filter_map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
                })
                .collect();
            rest = tail.trim_start();
        }

        if let Some(prefixed) = rest.strip_prefix(':') {
            let (prefix, tail) = prefixed.split_once(' ')?;
            message.prefix = Some(prefix.to_string());
            rest = tail.trim_start();
        }

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split_whitespace();
        message.command = words.next()?.to_ascii_uppercase();
        message.params = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            message.params.push(trailing.to_string());
        }
        Some(message)
    }

    /// Nick portion of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split_once('!').map_or(prefix, |(nick, _)| nick);
        (!nick.is_empty()).then_some(nick)
    }

    /// Last parameter, which carries the text of PRIVMSG and PING.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Broadcaster or moderator, according to the IRCv3 tags.
    pub fn is_privileged(&self) -> bool {
        if self.tags.get("mod").is_some_and(|v| v == "1") {
            return true;
        }
        self.tags.get("badges").is_some_and(|badges| {
            badges
                .split(',')
                .any(|badge| badge.starts_with("broadcaster/") || badge.starts_with("moderator/"))
        })
    }
}

/// Strip line breaks so a reply can never smuggle in a second IRC command.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Split `text` into pieces of at most `max_chars` characters, preferring
/// word boundaries.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }
        let needed = if current_len == 0 { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
