//! Optional hand-maintained data merged into the rendered graph.

use std::{collections::BTreeMap, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised when loading the supplementary-data file.
#[derive(Debug, Error)]
pub enum SupplementError {
    /// The file could not be read.
    #[error("failed to read supplementary data: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid JSON or has the wrong shape.
    #[error("failed to parse supplementary data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Data the Sisu API cannot provide: icon annotations and manually curated
/// prerequisite edges.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Supplement {
    /// Icon text appended to the code cell of matching course nodes, keyed
    /// by graph node key.
    #[serde(default)]
    pub course_icons: BTreeMap<String, String>,

    /// Extra prerequisite edges, each a single-entry mapping
    /// `{source_key: destination_key}`. Rendered dotted.
    #[serde(default)]
    pub manual_prerequisites: Vec<BTreeMap<String, String>>,
}

impl Supplement {
    /// Loads the supplementary-data file.
    ///
    /// # Errors
    ///
    /// Returns [`SupplementError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SupplementError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The manual edges flattened to `(source, destination)` pairs.
    #[must_use]
    pub fn manual_edges(&self) -> Vec<(String, String)> {
        self.manual_prerequisites
            .iter()
            .flat_map(|entry| {
                entry
                    .iter()
                    .map(|(source, destination)| (source.clone(), destination.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_icons_and_manual_edges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "course_icons": {"COMP_CS_100": "&#127919;"},
                "manual_prerequisites": [{"MATH_APP_110": "COMP_CS_100"}]
            }"#,
        )
        .unwrap();

        let supplement = Supplement::load(file.path()).unwrap();

        assert_eq!(
            supplement.course_icons.get("COMP_CS_100"),
            Some(&"&#127919;".to_string())
        );
        assert_eq!(
            supplement.manual_edges(),
            vec![("MATH_APP_110".to_string(), "COMP_CS_100".to_string())]
        );
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();

        let supplement = Supplement::load(file.path()).unwrap();

        assert!(supplement.course_icons.is_empty());
        assert!(supplement.manual_edges().is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let error = Supplement::load(&tmp.path().join("missing.json")).unwrap_err();
        assert!(matches!(error, SupplementError::Io(_)));
    }
}
