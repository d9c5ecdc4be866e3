//! Backend service descriptors and the refresh-failure classifier.
//!
//! A descriptor tells a service client where its backend lives and where to exchange refresh
//! tokens; the classifier decides whether a failed refresh means the session is gone.

pub mod classifier;
pub mod descriptor;

pub use classifier::*;
pub use descriptor::*;
