use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::CatalogError;

/// A named bucket of facts.  Order is insertion order; duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub facts: Vec<String>,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facts: Vec::new(),
        }
    }
}

/// One theme as produced by a loader, or the reason it could not be read.
pub type LoadEntry = Result<Theme, CatalogError>;

/// Supplies the catalog at startup.
///
/// The outer `Err` means the whole source is unavailable; inner errors are
/// per-entry and only cause that entry to be skipped.
pub trait CatalogLoader {
    fn load(&self) -> Result<Vec<LoadEntry>, CatalogError>;
}

/// Durably stores the full fact list of one theme.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    async fn store(&self, theme: &str, facts: &[String]) -> Result<(), CatalogError>;
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub themes: usize,
    pub facts: usize,
    pub failures: Vec<CatalogError>,
}

/// Outcome of [`CatalogStore::add_fact`].  The fact is in memory whether or
/// not `persisted` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedFact {
    pub theme: String,
    pub count: usize,
    pub persisted: bool,
}

pub struct CatalogStore {
    themes: BTreeMap<String, Theme>,
    sink: Arc<dyn CatalogSink>,
}

impl CatalogStore {
    pub fn new(sink: Arc<dyn CatalogSink>) -> Self {
        Self {
            themes: BTreeMap::new(),
            sink,
        }
    }

    /// Merge every readable entry from `loader` into the catalog.  A theme
    /// that is loaded again replaces its previous fact list.
    pub fn load(&mut self, loader: &dyn CatalogLoader) -> LoadReport {
        let mut report = LoadReport::default();
        let entries = match loader.load() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "catalog source unavailable; starting with an empty catalog");
                report.failures.push(err);
                return report;
            }
        };

        for entry in entries {
            match entry {
                Ok(theme) => {
                    info!(theme = %theme.name, facts = theme.facts.len(), "loaded theme");
                    report.themes += 1;
                    report.facts += theme.facts.len();
                    self.themes.insert(theme.name.clone(), theme);
                }
                Err(err) => {
                    warn!(%err, "skipping catalog entry");
                    report.failures.push(err);
                }
            }
        }
        report
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    pub fn contains(&self, theme: &str) -> bool {
        self.themes.contains_key(theme)
    }

    pub fn list_themes(&self) -> Vec<String> {
        self.themes.keys().cloned().collect()
    }

    /// `0` for unknown themes.
    pub fn fact_count(&self, theme: &str) -> usize {
        self.themes.get(theme).map_or(0, |t| t.facts.len())
    }

    pub fn total_facts(&self) -> usize {
        self.themes.values().map(|t| t.facts.len()).sum()
    }

    pub fn all_facts(&self) -> Vec<&str> {
        self.themes
            .values()
            .flat_map(|t| t.facts.iter().map(String::as_str))
            .collect()
    }

    /// Empty for unknown themes.
    pub fn theme_facts(&self, theme: &str) -> &[String] {
        self.themes
            .get(theme)
            .map(|t| t.facts.as_slice())
            .unwrap_or(&[])
    }

    /// Append `fact` to `theme`, creating the theme if needed, then try to
    /// persist the updated list.  A persistence failure is logged and
    /// reported through [`AddedFact::persisted`]; the in-memory change stays.
    pub async fn add_fact(&mut self, theme: &str, fact: &str) -> AddedFact {
        let entry = self
            .themes
            .entry(theme.to_string())
            .or_insert_with(|| Theme::new(theme));
        entry.facts.push(fact.to_string());
        let count = entry.facts.len();

        let persisted = match self.sink.store(theme, &entry.facts).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, theme, "fact kept in memory but not persisted");
                false
            }
        };

        AddedFact {
            theme: theme.to_string(),
            count,
            persisted,
        }
    }
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("themes", &self.themes)
            .finish_non_exhaustive()
    }
}
