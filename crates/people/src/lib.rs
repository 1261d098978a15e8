//! People supported under contracts, and their external identifiers.

pub mod identifier;
pub mod person;

pub use identifier::{IdentifierKind, PersonIdentifier};
pub use person::{Person, PersonDetails, ensure_identifier_unique};
