use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Twitch connection ────────────────────────────────────────────────────────

/// Chat connection settings.  The OAuth token is deliberately absent: it is
/// read from `TWITCH_TOKEN` by the transport and never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    /// Channel to join, without the leading `#`.
    pub channel: String,
    pub bot_username: String,
    /// IRC endpoint as `host:port`.
    pub server: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            bot_username: String::new(),
            server: "irc.chat.twitch.tv:6667".to_string(),
        }
    }
}

// ── Periodic posting ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    pub auto_post: bool,
    pub interval_minutes: u64,
    /// Theme used for periodic posts and for `!fact` without an argument.
    /// Empty means "any theme".
    pub default_theme: String,
    /// Prefix used when no theme-specific prefix exists.
    pub fact_prefix: String,
    /// Delay before the scheduler resumes after a failed post.
    pub recovery_delay_secs: u64,
    pub theme_prefixes: BTreeMap<String, String>,
}

impl Default for PostingConfig {
    fn default() -> Self {
        let theme_prefixes = [
            ("spooky", "🖤 Spooky Fact: "),
            ("science", "🔬 Science Fact: "),
            ("history", "📜 History Fact: "),
            ("custom", "⭐ Fun Fact: "),
        ]
        .into_iter()
        .map(|(theme, prefix)| (theme.to_string(), prefix.to_string()))
        .collect();

        Self {
            auto_post: true,
            interval_minutes: 60,
            default_theme: "spooky".to_string(),
            fact_prefix: "✨ Fact: ".to_string(),
            recovery_delay_secs: 60,
            theme_prefixes,
        }
    }
}

// ── Chat commands ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub enable_fact_command: bool,
    /// Per-user cooldown shared by `!fact` and every themed shortcut.
    pub command_cooldown_secs: u64,
    pub allow_theme_selection: bool,
    pub prefix: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enable_fact_command: true,
            command_cooldown_secs: 30,
            allow_theme_selection: true,
            prefix: "!".to_string(),
        }
    }
}

// ── Fact catalog ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactsConfig {
    /// Directory holding one `<theme>.json` file per theme.
    pub directory: String,
    /// How many recently served facts are avoided on the next selection.
    pub recent_window: usize,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            directory: "data/facts".to_string(),
            recent_window: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub twitch: TwitchConfig,
    pub posting: PostingConfig,
    pub commands: CommandsConfig,
    pub facts: FactsConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        // Env overrides (take precedence over the config file).
        if let Ok(value) = env::var("CHANNEL_NAME") {
            if !value.trim().is_empty() {
                config.twitch.channel = value.trim().trim_start_matches('#').to_string();
            }
        }
        if let Ok(value) = env::var("BOT_USERNAME") {
            if !value.trim().is_empty() {
                config.twitch.bot_username = value.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.posting.interval_minutes.saturating_mul(60))
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.posting.recovery_delay_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.commands.command_cooldown_secs)
    }

    /// The configured default theme, or `None` when it is blank.
    pub fn default_theme(&self) -> Option<&str> {
        let theme = self.posting.default_theme.trim();
        if theme.is_empty() { None } else { Some(theme) }
    }

    pub fn prefix_for(&self, theme: Option<&str>) -> &str {
        theme
            .and_then(|t| self.posting.theme_prefixes.get(t))
            .map(String::as_str)
            .unwrap_or(&self.posting.fact_prefix)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
