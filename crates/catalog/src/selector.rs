use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{CatalogStore, RecencyWindow};

/// What a selection produced.  Every variant is a normal outcome to be
/// shown to the user; none of them is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactResult {
    Fact(String),
    UnknownTheme { name: String, available: Vec<String> },
    EmptyTheme(String),
    NoFactsAtAll,
}

/// Picks facts at random while steering clear of the last few served.
///
/// The recency window is global: a fact served from one theme is also
/// avoided when selecting across all themes, and identical text in two
/// themes is one entry.
#[derive(Debug)]
pub struct Selector<R = StdRng> {
    recent: RecencyWindow,
    rng: R,
}

impl Selector<StdRng> {
    pub fn new(window: usize) -> Self {
        Self::with_rng(window, StdRng::from_os_rng())
    }
}

impl<R: Rng> Selector<R> {
    pub fn with_rng(window: usize, rng: R) -> Self {
        Self {
            recent: RecencyWindow::new(window),
            rng,
        }
    }

    pub fn recent(&self) -> &RecencyWindow {
        &self.recent
    }

    /// Pick one fact from `theme`, or from every theme when `theme` is `None`.
    ///
    /// Facts still in the recency window are skipped unless that would leave
    /// nothing to choose from, in which case the whole pool is used.
    pub fn select(&mut self, catalog: &CatalogStore, theme: Option<&str>) -> FactResult {
        if catalog.is_empty() {
            return FactResult::NoFactsAtAll;
        }

        let candidates: Vec<&str> = match theme {
            Some(name) if !catalog.contains(name) => {
                return FactResult::UnknownTheme {
                    name: name.to_string(),
                    available: catalog.list_themes(),
                };
            }
            Some(name) => {
                let facts = catalog.theme_facts(name);
                if facts.is_empty() {
                    return FactResult::EmptyTheme(name.to_string());
                }
                facts.iter().map(String::as_str).collect()
            }
            None => catalog.all_facts(),
        };
        if candidates.is_empty() {
            return FactResult::NoFactsAtAll;
        }

        let eligible: Vec<&str> = candidates
            .iter()
            .copied()
            .filter(|fact| !self.recent.contains(fact))
            .collect();
        let pool = if eligible.is_empty() {
            debug!(pool = candidates.len(), "every candidate is recent; allowing a repeat");
            &candidates
        } else {
            &eligible
        };

        let Some(chosen) = pool.choose(&mut self.rng).map(|fact| fact.to_string()) else {
            return FactResult::NoFactsAtAll;
        };
        self.recent.record(chosen.clone());
        FactResult::Fact(chosen)
    }
}
