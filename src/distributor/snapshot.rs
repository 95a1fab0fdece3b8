use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::model::{Category, Contacts, Document, Groups, OnCall, Servers};

/// Immutable view of every category at one point in time.
///
/// Snapshots are never changed once published. Each update builds a new
/// snapshot that shares the untouched categories with its predecessor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub(crate) groups: Arc<Groups>,
    pub(crate) contacts: Arc<Contacts>,
    pub(crate) servers: Arc<Servers>,
    pub(crate) on_call: Arc<OnCall>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub(crate) last_updated: DateTime<Utc>,
    pub(crate) revision: u64,
}

impl Snapshot {
    pub(crate) fn empty() -> Self {
        Self {
            groups: Arc::default(),
            contacts: Arc::default(),
            servers: Arc::default(),
            on_call: Arc::default(),
            last_updated: Utc::now(),
            revision: 0,
        }
    }

    /// Starts the next snapshot: same content, next revision, fresh timestamp.
    ///
    /// The timestamp never goes backwards, even if the wall clock does.
    pub(crate) fn successor(&self) -> Self {
        Self {
            last_updated: Utc::now().max(self.last_updated),
            revision: self.revision + 1,
            ..self.clone()
        }
    }

    /// Named groups and their members.
    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    /// The contact directory.
    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    /// The server inventory.
    pub fn servers(&self) -> &Servers {
        &self.servers
    }

    /// On-call rosters.
    pub fn on_call(&self) -> &OnCall {
        &self.on_call
    }

    /// The document of type `D`.
    pub fn document<D: Document>(&self) -> &D {
        D::slot(self)
    }

    /// When this snapshot was published.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Publication counter, increasing by one per published snapshot.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// One category rendered as JSON, as it would be written to disk.
    ///
    /// # Errors
    /// Returns error if the document cannot be represented as JSON.
    pub fn category_json(&self, category: Category) -> serde_json::Result<Value> {
        match category {
            Category::Groups => serde_json::to_value(self.groups()),
            Category::Contacts => serde_json::to_value(self.contacts()),
            Category::Servers => serde_json::to_value(self.servers()),
            Category::OnCall => serde_json::to_value(self.on_call()),
        }
    }
}
