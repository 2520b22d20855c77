//! Fact catalog: themed fact storage, repeat-avoiding selection, and the
//! JSON directory format the bot ships its facts in.

pub mod error;
pub mod json;
pub mod recency;
pub mod selector;
pub mod store;

pub use error::CatalogError;
pub use json::JsonCatalog;
pub use recency::RecencyWindow;
pub use selector::{FactResult, Selector};
pub use store::{AddedFact, CatalogLoader, CatalogSink, CatalogStore, LoadEntry, LoadReport, Theme};
