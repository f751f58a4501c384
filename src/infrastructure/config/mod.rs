//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! struct defaults → environment variables → shell-style config file.

pub mod loader;

pub use loader::ConfigLoader;
