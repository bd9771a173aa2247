//! Predefined batches
//!
//! Fixed query/candidate sets loaded once from a TOML file:
//!
//! ```toml
//! [[batch]]
//! query_image = "cats/img_69.png"
//! candidates = ["cats/img_70.png", "cats/img_71.png"]
//! ```
//!
//! Ids go through the same normalization as label submissions. The query is
//! dropped from its own candidate list and duplicates are removed.

use labeler_common::models::{normalize_image_id, Session};
use labeler_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "batch")]
    batches: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    query_image: String,
    #[serde(default, alias = "images")]
    candidates: Vec<String>,
}

/// Ordered list of predefined sessions
#[derive(Debug, Clone, Default)]
pub struct BatchSet {
    batches: Vec<Session>,
}

impl BatchSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a batches file; missing or invalid files are configuration errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read batches file {}: {}", path.display(), e))
        })?;
        let set = Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        info!("Loaded {} batches from {}", set.len(), path.display());
        Ok(set)
    }

    /// Parse batches from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let file: BatchFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid batches file: {}", e)))?;

        let batches = file
            .batches
            .into_iter()
            .enumerate()
            .map(|(index, entry)| to_session(index, entry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { batches })
    }

    /// Batch at `index`
    pub fn get(&self, index: usize) -> Result<&Session> {
        self.batches.get(index).ok_or_else(|| {
            Error::NotFound(format!(
                "Batch {} (there are {} batches)",
                index,
                self.batches.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

fn to_session(index: usize, entry: BatchEntry) -> Result<Session> {
    let query_image = normalize_image_id(&entry.query_image);
    if query_image.is_empty() {
        return Err(Error::Config(format!("Batch {} has no query_image", index)));
    }

    let mut seen = HashSet::new();
    let candidates = entry
        .candidates
        .iter()
        .map(|id| normalize_image_id(id))
        .filter(|id| !id.is_empty() && *id != query_image)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    Ok(Session {
        query_image,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batches() {
        let set = BatchSet::parse(
            r#"
            [[batch]]
            query_image = "/images/img_69.png"
            candidates = ["/images/img_70.png", "img_71.png", "img_70.png", "img_69.png"]

            [[batch]]
            query_image = "img_77.png"
            images = ["img_78.png"]
            "#,
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        let first = set.get(0).unwrap();
        assert_eq!(first.query_image, "img_69.png");
        assert_eq!(first.candidates, vec!["img_70.png", "img_71.png"]);
        assert_eq!(set.get(1).unwrap().candidates, vec!["img_78.png"]);
    }

    #[test]
    fn test_out_of_range_is_not_found() {
        let set = BatchSet::parse("[[batch]]\nquery_image = \"a.jpg\"").unwrap();
        assert!(set.get(0).is_ok());
        assert!(matches!(set.get(1), Err(Error::NotFound(_))));
        assert!(matches!(BatchSet::empty().get(0), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_empty_file_has_no_batches() {
        assert!(BatchSet::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_query_rejected() {
        let err = BatchSet::parse("[[batch]]\nquery_image = \"  \"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BatchSet::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
