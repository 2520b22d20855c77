//! The orchestrator: turns chat messages into replies and owns the
//! periodic posting task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use factbot_catalog::FactResult;
use factbot_config::AppConfig;

use crate::commands::{ChatCommand, THEME_SHORTCUTS, parse_command};
use crate::gate::{Decision, RateGate};
use crate::scheduler::{DeliverySink, SchedulePlan, SchedulerStats, spawn_scheduler};
use crate::FactLibrary;

/// An incoming chat line as the transport hands it over.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
    /// Broadcaster or moderator.
    pub privileged: bool,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            privileged: false,
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

pub struct FactBot {
    config: AppConfig,
    library: Arc<FactLibrary>,
    gate: Mutex<RateGate>,
}

impl FactBot {
    /// `gate` is usually `RateGate::new(config.cooldown())`.
    pub fn new(config: AppConfig, library: Arc<FactLibrary>, gate: RateGate) -> Self {
        Self {
            config,
            library,
            gate: Mutex::new(gate),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<FactLibrary> {
        &self.library
    }

    pub async fn handle(&self, message: &ChatMessage) -> Option<String> {
        self.handle_at(message, Utc::now()).await
    }

    /// Reply to `message` as of `now`, or `None` when the bot stays quiet.
    pub async fn handle_at(&self, message: &ChatMessage, now: DateTime<Utc>) -> Option<String> {
        if message
            .author
            .eq_ignore_ascii_case(&self.config.twitch.bot_username)
        {
            return None;
        }
        let command = parse_command(&message.text, &self.config.commands.prefix)?;

        if command.is_fact_request() {
            if !self.config.commands.enable_fact_command {
                debug!(author = %message.author, "fact commands disabled; ignoring");
                return None;
            }
            let decision = self.gate.lock().await.try_act(&message.author, now);
            if let Decision::Denied { seconds_remaining } = decision {
                debug!(author = %message.author, seconds_remaining, "cooldown active");
                return Some(format!(
                    "@{} Please wait {seconds_remaining} more seconds before using fact commands again! ⏰",
                    message.author
                ));
            }
        }

        let reply = match command {
            ChatCommand::Fact(theme) => {
                let theme = theme.filter(|_| self.config.commands.allow_theme_selection);
                let theme = theme.as_deref().or(self.config.default_theme());
                self.fact_reply(&message.author, theme).await
            }
            ChatCommand::ThemedFact(theme) => self.fact_reply(&message.author, Some(theme)).await,
            ChatCommand::Themes => {
                let themes = self.library.list_themes().await.join(", ");
                format!(
                    "Available fact themes: {themes} 📚 Use {}fact [theme] to get a specific type!",
                    self.config.commands.prefix
                )
            }
            ChatCommand::FactCount(Some(theme)) => match self.library.fact_count(&theme).await {
                0 => format!("Theme '{theme}' not found or has no facts! 🤔"),
                count => format!("Theme '{theme}' has {count} facts available! 📊"),
            },
            ChatCommand::FactCount(None) => {
                let total = self.library.total_facts().await;
                format!("Total facts available: {total} across all themes! 🎯")
            }
            ChatCommand::FactList => self.fact_list().await,
            ChatCommand::AddFact { theme, fact } => {
                if !message.privileged {
                    return Some(format!("@{} Only moderators can add facts.", message.author));
                }
                let added = self.library.add_fact(&theme, &fact).await;
                info!(theme = %added.theme, count = added.count, persisted = added.persisted, "fact added from chat");
                if added.persisted {
                    format!("Added fact #{} to '{}' ✅", added.count, added.theme)
                } else {
                    format!(
                        "Added fact #{} to '{}' for this session, but saving it failed ⚠️",
                        added.count, added.theme
                    )
                }
            }
            ChatCommand::AddFactUsage => format!(
                "Usage: {}addfact <theme> <fact>",
                self.config.commands.prefix
            ),
        };
        Some(reply)
    }

    async fn fact_reply(&self, author: &str, theme: Option<&str>) -> String {
        let result = self.library.select(theme).await;
        if matches!(result, FactResult::Fact(_)) {
            info!(author, theme = theme.unwrap_or("*"), "sent fact");
        }
        render_result(result, self.config.prefix_for(theme))
    }

    async fn fact_list(&self) -> String {
        let themes = self
            .library
            .summary()
            .await
            .into_iter()
            .map(|(theme, count)| format!("{theme} ({count} facts)"))
            .collect::<Vec<_>>()
            .join(", ");
        let prefix = &self.config.commands.prefix;
        let shortcuts = THEME_SHORTCUTS
            .iter()
            .map(|(name, _)| format!("{prefix}{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "📚 Available themes: {themes} | Shortcuts: {shortcuts} | Use {prefix}fact [theme] or shortcuts! ✨"
        )
    }

    pub fn schedule_plan(&self) -> SchedulePlan {
        SchedulePlan {
            interval: self.config.interval(),
            recovery_delay: self.config.recovery_delay(),
            theme: self.config.default_theme().map(str::to_string),
            prefix: self.config.prefix_for(None).to_string(),
        }
    }

    /// Start periodic posting, unless it is switched off or has no interval.
    pub fn spawn_scheduler(
        &self,
        sink: Arc<dyn DeliverySink>,
        shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<SchedulerStats>> {
        if !self.config.posting.auto_post || self.config.posting.interval_minutes == 0 {
            info!("periodic posting disabled");
            return None;
        }
        Some(spawn_scheduler(
            self.library.clone(),
            sink,
            self.schedule_plan(),
            shutdown,
        ))
    }
}

/// Turn a selection outcome into chat text.
pub fn render_result(result: FactResult, prefix: &str) -> String {
    match result {
        FactResult::Fact(fact) => format!("{prefix}{fact}"),
        FactResult::UnknownTheme { name, available } => format!(
            "Theme '{name}' not found! Available themes: {} 📚",
            available.join(", ")
        ),
        FactResult::EmptyTheme(name) => format!("No facts available for theme '{name}' yet! 🤔"),
        FactResult::NoFactsAtAll => "Sorry, no facts are available right now! 😅".to_string(),
    }
}
