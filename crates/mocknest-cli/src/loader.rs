//! Catalog loading from files and directories

use mocknest_core::{Error, MockCatalog, MockRecord, Result};
use std::path::Path;
use tracing::info;

/// Load mock records from a single YAML/JSON file or from every catalog
/// file in a directory. Directory entries are read in filename order so
/// definition order (and priority tie-breaking) stays deterministic.
pub fn load_records(path: &Path) -> Result<Vec<MockRecord>> {
    if path.is_dir() {
        let mut files: Vec<_> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml") | Some("json")
                )
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::catalog(format!(
                "no catalog files (*.yaml, *.yml, *.json) in {}",
                path.display()
            )));
        }

        let mut records = Vec::new();
        for file in files {
            records.extend(parse_file(&file)?);
        }
        info!("loaded {} mocks from {}", records.len(), path.display());
        Ok(records)
    } else {
        let records = parse_file(path)?;
        info!("loaded {} mocks from {}", records.len(), path.display());
        Ok(records)
    }
}

fn parse_file(path: &Path) -> Result<Vec<MockRecord>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::catalog(format!("failed to read {}: {}", path.display(), e)))?;

    let catalog = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => MockCatalog::from_json(&content),
        _ => MockCatalog::from_yaml(&content),
    }
    .map_err(|e| Error::catalog(format!("{}: {}", path.display(), e)))?;

    Ok(catalog.mocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_single_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mocks.yaml");
        std::fs::write(
            &file,
            "mocks:\n  - name: one\n    request: {uri: /a}\n    response: {body: a}\n",
        )
        .unwrap();

        let records = load_records(&file).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "one");
    }

    #[test]
    fn loads_a_directory_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "mocks:\n  - name: second\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "mocks:\n  - name: first\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("c.json"),
            r#"{"mocks": [{"name": "third"}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = load_records(dir.path())
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn bad_yaml_is_a_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.yaml");
        std::fs::write(&file, "mocks: [not: [valid").unwrap();
        assert!(load_records(&file).is_err());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_records(dir.path()).is_err());
    }
}
