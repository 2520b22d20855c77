//! On-disk catalog: one `<theme>.json` file per theme holding
//! `{"theme": "...", "facts": [...]}`.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::store::{CatalogLoader, CatalogSink, LoadEntry, Theme};
use crate::CatalogError;

#[derive(Debug, Serialize, Deserialize)]
struct ThemeFile {
    #[serde(default)]
    theme: String,
    #[serde(default)]
    facts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JsonCatalog {
    directory: PathBuf,
}

impl JsonCatalog {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn theme_path(&self, theme: &str) -> PathBuf {
        self.directory.join(format!("{theme}.json"))
    }

    fn read_theme(path: &Path) -> LoadEntry {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ThemeFile = serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Theme {
            name,
            facts: file.facts,
        })
    }
}

/// Theme names become file names, so anything that could escape the
/// catalog directory is refused.
fn validate_theme_name(theme: &str) -> Result<(), CatalogError> {
    let bad = theme.is_empty()
        || theme.starts_with('.')
        || theme.contains(['/', '\\', '\0'])
        || theme.contains("..");
    if bad {
        return Err(CatalogError::InvalidTheme(theme.to_string()));
    }
    Ok(())
}

impl CatalogLoader for JsonCatalog {
    fn load(&self) -> Result<Vec<LoadEntry>, CatalogError> {
        if !self.directory.is_dir() {
            return Err(CatalogError::MissingDirectory(self.directory.clone()));
        }
        let listing = fs::read_dir(&self.directory).map_err(|source| CatalogError::Read {
            path: self.directory.clone(),
            source,
        })?;

        let listing = listing.map(|entry| entry.map(|e| e.path()));
        let (paths, mut entries) = theme_files(&self.directory, listing);
        entries.extend(paths.iter().map(|path| Self::read_theme(path)));
        Ok(entries)
    }
}

/// Sorted `*.json` files from a directory listing.  Entries the OS could not
/// read come back as per-entry failures instead of vanishing.
fn theme_files(
    directory: &Path,
    listing: impl IntoIterator<Item = std::io::Result<PathBuf>>,
) -> (Vec<PathBuf>, Vec<LoadEntry>) {
    let mut paths = Vec::new();
    let mut failures = Vec::new();
    for entry in listing {
        match entry {
            Ok(path) if path.is_file() && path.extension().is_some_and(|ext| ext == "json") => {
                paths.push(path)
            }
            Ok(_) => {}
            Err(source) => failures.push(Err(CatalogError::Read {
                path: directory.to_path_buf(),
                source,
            })),
        }
    }
    paths.sort();
    (paths, failures)
}

#[async_trait]
impl CatalogSink for JsonCatalog {
    /// Crash-safe: the list is written to a `.tmp` sibling, synced, and then
    /// renamed over the theme file.
    async fn store(&self, theme: &str, facts: &[String]) -> Result<(), CatalogError> {
        validate_theme_name(theme)?;
        let write_err = |source| CatalogError::Write {
            theme: theme.to_string(),
            source,
        };

        let body = ThemeFile {
            theme: theme.to_string(),
            facts: facts.to_vec(),
        };
        let rendered = serde_json::to_string_pretty(&body).map_err(|source| CatalogError::Encode {
            theme: theme.to_string(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(write_err)?;
        let path = self.theme_path(theme);
        let tmp_path = path.with_extension("json.tmp");

        let write_result: std::io::Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(rendered.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(err));
        }
        Ok(())
    }
}
