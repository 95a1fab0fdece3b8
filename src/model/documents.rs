use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::Category;
use crate::distributor::Snapshot;

/// A typed document persisted as one category file.
///
/// Ties the document type to its category and to its slot in a [`Snapshot`],
/// so typed mutations can rebuild a snapshot without matching on categories.
pub trait Document:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// Category this document is stored under.
    const CATEGORY: Category;

    /// Borrows this document's value out of a snapshot.
    fn slot(snapshot: &Snapshot) -> &Arc<Self>;

    /// Mutable access to the slot of a snapshot under construction.
    fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Self>;
}

/// Group name to ordered member emails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Groups(pub BTreeMap<String, Vec<String>>);

impl Groups {
    /// Adds `email` to `group`, creating the group when needed.
    ///
    /// Returns `false` if the member was already present (compared case-insensitively).
    pub fn add_member(&mut self, group: &str, email: &str) -> bool {
        let members = self.0.entry(group.to_string()).or_default();
        if members.iter().any(|m| m.eq_ignore_ascii_case(email)) {
            return false;
        }
        members.push(email.to_string());
        true
    }

    /// Removes `email` from `group`. Returns `true` if a member was removed.
    pub fn remove_member(&mut self, group: &str, email: &str) -> bool {
        let Some(members) = self.0.get_mut(group) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| !m.eq_ignore_ascii_case(email));
        members.len() != before
    }

    /// Drops a whole group. Returns the members it held.
    pub fn remove_group(&mut self, group: &str) -> Option<Vec<String>> {
        self.0.remove(group)
    }

    /// Moves the members of `from` to a new group named `to`.
    ///
    /// Returns `false` and changes nothing if `from` does not exist or another
    /// group is already called `to`.
    pub fn rename_group(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.0.contains_key(from);
        }
        if self.0.contains_key(to) {
            return false;
        }
        let Some(members) = self.0.remove(from) else {
            return false;
        };
        self.0.insert(to.to_string(), members);
        true
    }

    /// Members of `group`, empty when the group does not exist.
    pub fn members(&self, group: &str) -> &[String] {
        self.0.get(group).map(Vec::as_slice).unwrap_or_default()
    }
}

/// A single directory entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    /// Display name.
    pub name: String,
    /// Primary email, used as the contact's identity.
    pub email: String,
    /// Phone number, free-form.
    pub phone: String,
    /// Job title.
    pub title: String,
    /// Fields this version does not know about, kept so rewrites do not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The contact directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contacts(pub Vec<Contact>);

impl Contacts {
    /// Looks a contact up by email, case-insensitively.
    pub fn find_by_email(&self, email: &str) -> Option<&Contact> {
        self.0.iter().find(|c| c.email.eq_ignore_ascii_case(email))
    }

    /// Inserts `contact`, replacing any entry with the same email.
    pub fn upsert(&mut self, contact: Contact) {
        match self
            .0
            .iter_mut()
            .find(|c| c.email.eq_ignore_ascii_case(&contact.email))
        {
            Some(existing) => *existing = contact,
            None => self.0.push(contact),
        }
    }

    /// Removes the contact with `email`. Returns `true` if one was removed.
    pub fn remove_by_email(&mut self, email: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| !c.email.eq_ignore_ascii_case(email));
        self.0.len() != before
    }
}

/// One row of the server inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Server {
    /// Host name, used as the server's identity.
    pub name: String,
    /// Owning business area.
    pub business_area: String,
    /// Line of business.
    pub lob: String,
    /// Free-form notes.
    pub comment: String,
    /// Owner email.
    pub owner: String,
    /// Support contact email.
    pub contact: String,
    /// OS family, e.g. "Windows" or "Linux".
    pub os_type: String,
    /// OS release, e.g. "RHEL 8".
    pub os: String,
    /// Unknown fields preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The server inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Servers(pub Vec<Server>);

impl Servers {
    /// Inserts `server`, replacing any entry with the same name.
    pub fn upsert(&mut self, server: Server) {
        match self
            .0
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(&server.name))
        {
            Some(existing) => *existing = server,
            None => self.0.push(server),
        }
    }

    /// Removes the server named `name`. Returns `true` if one was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|s| !s.name.eq_ignore_ascii_case(name));
        self.0.len() != before
    }
}

/// One slot of an on-call roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnCallEntry {
    /// Team owning the roster.
    pub team: String,
    /// Role within the rotation, e.g. "Primary".
    pub role: String,
    /// Person on call.
    pub name: String,
    /// How to reach them.
    pub contact: String,
    /// When the slot applies, free-form.
    pub time_window: String,
    /// Unknown fields preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// On-call rosters for every team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnCall(pub Vec<OnCallEntry>);

impl OnCall {
    /// Entries belonging to `team`, in file order.
    pub fn for_team<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a OnCallEntry> + 'a {
        self.0
            .iter()
            .filter(move |entry| entry.team.eq_ignore_ascii_case(team))
    }

    /// Replaces `team`'s roster. Entries of other teams keep their position.
    pub fn replace_team(&mut self, team: &str, entries: Vec<OnCallEntry>) {
        self.0.retain(|entry| !entry.team.eq_ignore_ascii_case(team));
        self.0.extend(entries);
    }
}

impl Document for Groups {
    const CATEGORY: Category = Category::Groups;

    fn slot(snapshot: &Snapshot) -> &Arc<Self> {
        &snapshot.groups
    }

    fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Self> {
        &mut snapshot.groups
    }
}

impl Document for Contacts {
    const CATEGORY: Category = Category::Contacts;

    fn slot(snapshot: &Snapshot) -> &Arc<Self> {
        &snapshot.contacts
    }

    fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Self> {
        &mut snapshot.contacts
    }
}

impl Document for Servers {
    const CATEGORY: Category = Category::Servers;

    fn slot(snapshot: &Snapshot) -> &Arc<Self> {
        &snapshot.servers
    }

    fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Self> {
        &mut snapshot.servers
    }
}

impl Document for OnCall {
    const CATEGORY: Category = Category::OnCall;

    fn slot(snapshot: &Snapshot) -> &Arc<Self> {
        &snapshot.on_call
    }

    fn slot_mut(snapshot: &mut Snapshot) -> &mut Arc<Self> {
        &mut snapshot.on_call
    }
}
