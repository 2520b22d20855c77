//! `factbot doctor`: a setup check covering credentials, config, and the
//! fact files.

use std::env;
use std::path::Path;

use anyhow::{Result, bail};

use factbot_catalog::{CatalogLoader, JsonCatalog};
use factbot_config::AppConfig;

#[derive(Debug, Default)]
struct Report {
    lines: Vec<String>,
    problems: usize,
}

impl Report {
    fn ok(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("✅ {}", text.as_ref()));
    }

    fn problem(&mut self, text: impl AsRef<str>) {
        self.problems += 1;
        self.lines.push(format!("❌ {}", text.as_ref()));
    }

    fn note(&mut self, text: impl AsRef<str>) {
        self.lines.push(text.as_ref().to_string());
    }
}

pub fn run(config: &AppConfig, config_path: &Path) -> Result<()> {
    let report = check(config, config_path, Path::new(".env"));
    println!("factbot doctor");
    for line in &report.lines {
        println!("{line}");
    }
    if report.problems > 0 {
        bail!("{} problem(s) found", report.problems);
    }
    println!("everything looks ready");
    Ok(())
}

fn check(config: &AppConfig, config_path: &Path, dotenv_path: &Path) -> Report {
    let mut report = Report::default();

    if dotenv_path.exists() {
        report.ok(".env file found");
    } else {
        report.note(format!("no {} file; credentials must come from the environment", dotenv_path.display()));
    }

    match env::var("TWITCH_TOKEN") {
        Ok(token) if !token.trim().is_empty() => report.ok("TWITCH_TOKEN is set"),
        _ => report.problem("TWITCH_TOKEN is missing"),
    }
    if config.twitch.bot_username.trim().is_empty() {
        report.problem("bot username missing (BOT_USERNAME or [twitch].bot_username)");
    } else {
        report.ok(format!("bot username: {}", config.twitch.bot_username));
    }
    if config.twitch.channel.trim().is_empty() {
        report.problem("channel missing (CHANNEL_NAME or [twitch].channel)");
    } else {
        report.ok(format!("channel: #{}", config.twitch.channel));
    }

    if config_path.exists() {
        report.ok(format!("config file: {}", config_path.display()));
    } else {
        report.note(format!("no config file at {}; using defaults", config_path.display()));
    }

    let catalog = JsonCatalog::new(&config.facts.directory);
    match catalog.load() {
        Ok(entries) => {
            let mut total = 0;
            for entry in entries {
                match entry {
                    Ok(theme) => {
                        total += theme.facts.len();
                        report.ok(format!("{}: {} facts", theme.name, theme.facts.len()));
                    }
                    Err(err) => report.problem(err.to_string()),
                }
            }
            if total == 0 {
                report.problem(format!("no facts in {}", config.facts.directory));
            } else {
                report.note(format!("total facts available: {total}"));
            }
        }
        Err(err) => report.problem(err.to_string()),
    }

    if config.posting.auto_post {
        if let Some(theme) = config.default_theme() {
            let path = catalog.theme_path(theme);
            if !path.exists() {
                report.problem(format!("default theme '{theme}' has no file at {}", path.display()));
            }
        }
    }

    report
}
