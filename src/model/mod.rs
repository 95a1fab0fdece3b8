//! Categories and the typed documents stored for each of them.

mod category;
mod documents;


pub use category::{Category, UnknownCategory};
pub use documents::{
    Contact, Contacts, Document, Groups, OnCall, OnCallEntry, Server, Servers,
};
