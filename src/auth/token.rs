//! Token secrets and the credential record that carries them.

pub mod record;
pub mod secret;
