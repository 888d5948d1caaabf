//! APK Triage.
//!
//! A small web service that statically inspects uploaded Android packages
//! and computes a heuristic risk assessment. Package decoding is delegated
//! to external collaborators (the `apk` crate for the binary manifest, the
//! `openssl` tool for certificate blobs); the service itself only reshapes
//! the extracted facts and scores them.

pub mod config;
pub mod inspector;
pub mod reputation;
pub mod risk;
pub mod server;

pub use crate::config::Config;
pub use crate::inspector::{
    ApkInspector, CertificateSummary, ExtractedFacts, InspectionError, Inspector,
};
pub use crate::risk::{RiskAssessment, RiskLabel, RiskPolicy};
