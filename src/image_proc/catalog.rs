//! Source image catalog.
//!
//! A fixed, ordered list of source files. Explicit indices are stable; a
//! missing index picks an entry uniformly at random from the OS CSPRNG.

use rand::Rng;
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<PathBuf>,
}

impl Catalog {
    /// Create a catalog from source paths in index order.
    ///
    /// Returns `None` for an empty list.
    pub fn new(entries: Vec<PathBuf>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.entries.get(index).map(PathBuf::as_path)
    }

    /// Resolve the source for a request.
    ///
    /// In-range indices are returned as is; anything else is replaced by a
    /// random draw.
    pub fn select(&self, index: Option<usize>) -> (usize, &Path) {
        let index = match index {
            Some(i) if i < self.entries.len() => i,
            _ => OsRng.gen_range(0..self.entries.len()),
        };
        (index, &self.entries[index])
    }

    /// Warn about catalog files that are missing on disk
    pub fn check_files(&self) -> usize {
        let missing: Vec<&PathBuf> = self.entries.iter().filter(|p| !p.is_file()).collect();
        for path in &missing {
            tracing::warn!("Catalog image not found: {}", path.display());
        }
        missing.len()
    }
}
