use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// A named class of persisted document.
///
/// Each category is stored as exactly one file in the data root. The file may
/// carry any of the category's recognised names; matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Named groups of member emails.
    Groups,
    /// The contact directory.
    Contacts,
    /// The server inventory.
    Servers,
    /// On-call rosters.
    OnCall,
}

impl Category {
    /// Every category, in load order.
    pub const ALL: [Category; 4] = [
        Category::Groups,
        Category::Contacts,
        Category::Servers,
        Category::OnCall,
    ];

    /// Recognised file names for this category. The first entry is the
    /// canonical name used when no file exists yet.
    pub fn file_names(self) -> &'static [&'static str] {
        match self {
            Category::Groups => &["groups.json"],
            Category::Contacts => &["contacts.json"],
            Category::Servers => &["servers.json"],
            Category::OnCall => &["oncall.json", "on-call.json", "on_call.json"],
        }
    }

    /// File name used when the category has no file on disk yet.
    pub fn canonical_file_name(self) -> &'static str {
        self.file_names()[0]
    }

    /// Index into fixed-size per-category tables.
    pub(crate) fn index(self) -> usize {
        match self {
            Category::Groups => 0,
            Category::Contacts => 1,
            Category::Servers => 2,
            Category::OnCall => 3,
        }
    }

    /// Resolves the on-disk path of this category within `root`.
    ///
    /// An existing file whose name matches any recognised name wins, earlier
    /// recognised names taking precedence. Otherwise `root/<canonical name>`.
    /// An unreadable `root` resolves to the canonical name.
    pub async fn resolve_path(self, root: &Path) -> PathBuf {
        let existing = list_file_names(root).await;

        self.file_names()
            .iter()
            .find_map(|name| {
                existing
                    .iter()
                    .find(|candidate| candidate.eq_ignore_ascii_case(name))
            })
            .map(|found| root.join(found))
            .unwrap_or_else(|| root.join(self.canonical_file_name()))
    }
}

async fn list_file_names(root: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(root).await else {
        return names;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if let (true, Ok(name)) = (is_file, entry.file_name().into_string()) {
            names.push(name);
        }
    }
    names
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Groups => write!(f, "groups"),
            Category::Contacts => write!(f, "contacts"),
            Category::Servers => write!(f, "servers"),
            Category::OnCall => write!(f, "on-call"),
        }
    }
}

/// Returned when a string names no known category.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown category '{0}' (expected groups, contacts, servers or on-call)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "groups" => Ok(Category::Groups),
            "contacts" => Ok(Category::Contacts),
            "servers" => Ok(Category::Servers),
            "on-call" | "oncall" | "on_call" => Ok(Category::OnCall),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}
