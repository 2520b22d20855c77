use tokio::sync::Mutex;

use factbot_catalog::{AddedFact, CatalogStore, FactResult, Selector};

/// Shared handle over the catalog and the selector.
///
/// Each sits behind its own lock.  Selection takes the catalog lock first and
/// then the selector lock, so a selection and its recency update happen as
/// one step and no other caller sees a half-updated window.
#[derive(Debug)]
pub struct FactLibrary {
    catalog: Mutex<CatalogStore>,
    selector: Mutex<Selector>,
}

impl FactLibrary {
    pub fn new(catalog: CatalogStore, selector: Selector) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            selector: Mutex::new(selector),
        }
    }

    pub async fn select(&self, theme: Option<&str>) -> FactResult {
        let catalog = self.catalog.lock().await;
        let mut selector = self.selector.lock().await;
        selector.select(&catalog, theme)
    }

    pub async fn list_themes(&self) -> Vec<String> {
        self.catalog.lock().await.list_themes()
    }

    pub async fn fact_count(&self, theme: &str) -> usize {
        self.catalog.lock().await.fact_count(theme)
    }

    pub async fn total_facts(&self) -> usize {
        self.catalog.lock().await.total_facts()
    }

    /// Theme names paired with their fact counts.
    pub async fn summary(&self) -> Vec<(String, usize)> {
        let catalog = self.catalog.lock().await;
        catalog
            .list_themes()
            .into_iter()
            .map(|theme| {
                let count = catalog.fact_count(&theme);
                (theme, count)
            })
            .collect()
    }

    /// The catalog lock is held across persistence so concurrent additions
    /// to one theme are written in the order they were applied.
    pub async fn add_fact(&self, theme: &str, fact: &str) -> AddedFact {
        self.catalog.lock().await.add_fact(theme, fact).await
    }
}
