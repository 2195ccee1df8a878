//! File input and JSON output for the CLI

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use super::errors::{CliError, CliResult};
use crate::catalog::InMemoryCatalog;

/// Read a catalog file: a JSON object keyed by "db.coll"
pub fn read_catalog(path: &Path) -> CliResult<InMemoryCatalog> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::catalog_error(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::catalog_error(format!("{}: {}", path.display(), e)))
}

/// Write a value to stdout as pretty JSON
pub fn write_pretty<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_read_catalog() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{"shop.orders": {{"facts": {{"uuid": "67e55044-10b1-426f-9247-bb680e5fe0c8", "record_count": 3}}}}}}"#
        )
        .unwrap();

        let catalog = read_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_read_catalog_bad_namespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, r#"{"nodot": {"facts": {"uuid": "67e55044-10b1-426f-9247-bb680e5fe0c8", "record_count": 3}}}"#)
            .unwrap();
        assert!(read_catalog(&path).is_err());
    }
}
