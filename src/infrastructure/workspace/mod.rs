//! Spec-folder filesystem primitives
//!
//! Fingerprints, the advisory run lock, and typed access to the artifact
//! files of one spec folder.

pub mod fingerprint;
pub mod lock;
pub mod spec_folder;

pub use fingerprint::Fingerprint;
pub use lock::RunLock;
pub use spec_folder::SpecFolder;
