use std::{collections::BTreeMap, path::Path};

use crate::{model::Category, store::TEMP_SUFFIX};

/// Suffix of lock marker files written next to a document.
pub const LOCK_SUFFIX: &str = ".lock";

/// Prefixes editors use for backup and owner-lock files.
pub const BACKUP_PREFIXES: [&str; 2] = ["~", ".~"];

/// Editor swap and backup suffixes, dropped along with the markers above.
const SWAP_SUFFIXES: [&str; 2] = [".swp", "~"];

/// Whether `file_name` is a lock, temporary or editor artifact.
///
/// Noise is dropped before classification, so the store's own temporary
/// files are never observed mid-write.
pub fn is_noise(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();

    lower.ends_with(LOCK_SUFFIX)
        || lower.ends_with(TEMP_SUFFIX)
        || SWAP_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
        || BACKUP_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Maps file names to categories, case-insensitively.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    names: BTreeMap<String, Category>,
}

impl FileClassifier {
    /// Builds a classifier from a category to file names mapping.
    ///
    /// A name listed under more than one category keeps the first.
    pub fn new<I, N>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (Category, N)>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let mut names = BTreeMap::new();
        for (category, file_names) in mapping {
            for name in file_names {
                names
                    .entry(name.as_ref().to_ascii_lowercase())
                    .or_insert(category);
            }
        }

        Self { names }
    }

    /// Classifies a bare file name. Noise and unknown names yield `None`.
    pub fn classify_name(&self, file_name: &str) -> Option<Category> {
        if is_noise(file_name) {
            return None;
        }

        self.names.get(&file_name.to_ascii_lowercase()).copied()
    }

    /// Classifies the base name of `path`.
    pub fn classify(&self, path: &Path) -> Option<Category> {
        let file_name = path.file_name()?.to_str()?;
        self.classify_name(file_name)
    }
}

impl Default for FileClassifier {
    /// Every recognised name of every category.
    fn default() -> Self {
        Self::new(
            Category::ALL
                .into_iter()
                .map(|category| (category, category.file_names().iter().copied())),
        )
    }
}
