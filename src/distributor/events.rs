use std::collections::BTreeSet;

use crate::{model::Category, store::StoreError};

/// Progress of a reload, published on the distributor's side channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadEvent {
    /// A reload of `categories` began.
    Started {
        /// Categories about to be re-read
        categories: BTreeSet<Category>,
    },
    /// One category could not be re-read; its previous value was kept.
    Failed {
        /// Category that failed
        category: Category,
        /// Human-readable failure
        error: String,
    },
    /// The reload finished.
    Completed {
        /// Categories whose new values were published
        reloaded: BTreeSet<Category>,
        /// Categories that kept their previous values
        failed: BTreeSet<Category>,
        /// Revision of the published snapshot, if one was published
        revision: Option<u64>,
    },
}

/// Outcome of one [`reload`](super::DataDistributor::reload) call.
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Categories re-read and published
    pub reloaded: BTreeSet<Category>,
    /// Categories that failed, with the reason
    pub failed: Vec<(Category, StoreError)>,
    /// Revision of the snapshot published for this reload
    pub revision: Option<u64>,
}

impl ReloadReport {
    /// Whether every requested category was reloaded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
