//! Extension contracts that let embedders customize how requests are authorized.

pub mod request_signer;

pub use request_signer::*;
