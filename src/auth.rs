//! Auth-domain identifiers, redacted secrets, and the persisted credential record.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{record::*, secret::*};
