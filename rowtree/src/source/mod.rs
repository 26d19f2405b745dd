// Reading documents and linked values from files or URLs

use crate::error::{Result, RowTreeError};
use std::path::Path;

/// Where a location string points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    File,
    Url,
}

pub fn kind_of(location: &str) -> LocationKind {
    let lower = location.trim_start().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        LocationKind::Url
    } else {
        LocationKind::File
    }
}

/// Read the text at `location`, a file path or an http(s) URL.
pub fn read_location(location: &str) -> Result<String> {
    match kind_of(location) {
        LocationKind::File => read_file(Path::new(location)),
        LocationKind::Url => fetch_url(location),
    }
}

fn read_file(path: &Path) -> Result<String> {
    log::debug!("reading {}", path.display());
    std::fs::read_to_string(path).map_err(|e| RowTreeError::SourceUnavailable {
        location: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str) -> Result<String> {
    use reqwest::blocking::Client;

    let unavailable = |reason: String| RowTreeError::SourceUnavailable {
        location: url.to_string(),
        reason,
    };

    log::debug!("fetching {url}");
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| unavailable(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| unavailable(format!("HTTP request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(unavailable(format!("HTTP error: {}", response.status())));
    }
    response.text().map_err(|e| unavailable(e.to_string()))
}

#[cfg(not(feature = "remote"))]
fn fetch_url(url: &str) -> Result<String> {
    Err(RowTreeError::SourceUnavailable {
        location: url.to_string(),
        reason: "built without the `remote` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of() {
        assert_eq!(kind_of("https://example.com/a.txt"), LocationKind::Url);
        assert_eq!(kind_of("HTTP://example.com"), LocationKind::Url);
        assert_eq!(kind_of("/tmp/a.xml"), LocationKind::File);
        assert_eq!(kind_of("notes.txt"), LocationKind::File);
    }

    #[test]
    fn test_read_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "hello").unwrap();
        assert_eq!(read_location(&tmp.path().display().to_string()).unwrap(), "hello");
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        let err = read_location(&missing.display().to_string()).unwrap_err();
        assert!(matches!(err, RowTreeError::SourceUnavailable { .. }));
    }

    #[cfg(not(feature = "remote"))]
    #[test]
    fn test_url_without_remote_feature() {
        let err = read_location("http://127.0.0.1:9/none").unwrap_err();
        assert!(matches!(err, RowTreeError::SourceUnavailable { .. }));
    }
}
