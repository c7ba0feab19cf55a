//! Version numbers and the durable version store.
//!
//! - [`Version`] ordered `(major, minor, patch)` triple
//! - [`VersionStore`] active-version record + catalog enumeration
//! - [`ActiveVersionRecord`] `{version, activated_at}`

mod number;
mod store;

pub use number::Version;
pub use store::{ActiveVersionRecord, VersionStore, successor};
