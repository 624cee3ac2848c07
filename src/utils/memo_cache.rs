// Write-through key:value cache persisted as a plain text file

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Memoization table backed by a newline-delimited `key:value` file
///
/// Every mutation rewrites the whole file through a temporary sibling that is
/// renamed over the previous file, so a crash leaves either the old or the new
/// content on disk. Lines that fail to parse are skipped on load.
#[derive(Debug, Default)]
pub struct MemoCache {
    path: Option<PathBuf>,
    entries: HashMap<String, f64>,
}

impl MemoCache {
    /// Cache that lives only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the cache stored at `path`; an unreadable file yields an empty cache
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(content) => {
                let mut entries = HashMap::new();
                let mut skipped = 0usize;
                for line in content.lines().filter(|line| !line.trim().is_empty()) {
                    match parse_line(line) {
                        Some((key, value)) => {
                            entries.insert(key, value);
                        }
                        None => skipped += 1,
                    }
                }
                if skipped > 0 {
                    warn!(path = %path.display(), skipped, "skipped corrupt cache entries");
                }
                debug!(path = %path.display(), entries = entries.len(), "loaded cache");
                entries
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache, starting empty");
                HashMap::new()
            }
        };

        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores a value and flushes the table to disk
    pub fn insert(&mut self, key: String, value: f64) {
        self.entries.insert(key, value);

        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist cache");
        }
    }

    /// Stores several values and flushes the table once
    pub fn extend<I: IntoIterator<Item = (String, f64)>>(&mut self, entries: I) {
        let before = self.entries.len();
        self.entries.extend(entries);
        if self.entries.len() == before {
            return;
        }

        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist cache");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();

        let mut content = String::new();
        for key in keys {
            content.push_str(key);
            content.push(':');
            content.push_str(&self.entries[key].to_string());
            content.push('\n');
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)
    }
}

/// Splits on the last ':' so keys may contain the separator
fn parse_line(line: &str) -> Option<(String, f64)> {
    let (key, value) = line.rsplit_once(':')?;
    let key = key.trim();
    let value: f64 = value.trim().parse().ok()?;

    if key.is_empty() || !value.is_finite() {
        return None;
    }
    Some((key.to_string(), value))
}
