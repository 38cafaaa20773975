//! fairgate - FAIR-software compliance validation and remediation
//!
//! This library checks hosted repositories for the files the FAIR software
//! recommendations expect, synthesizes CITATION.cff and codemeta.json from
//! repository metadata, records results in a local store, and proposes fixes
//! through branches, commits and pull requests.

pub mod audit;
pub mod checks;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod host;
pub mod logging;
pub mod remediate;
pub mod storage;
pub mod synth;

/// Re-export commonly used types
pub use audit::{Auditor, ComplianceReport};
pub use checks::ArtifactKind;
pub use config::Config;
pub use error::FairError;
pub use host::{GitHubClient, HostingApi, MockHost};
pub use storage::Database;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "fairgate";
