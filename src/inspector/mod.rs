//! Static package inspection.
//!
//! Binary-format decoding is delegated to external collaborators: the
//! `apk` crate for the manifest chunk stream and the `openssl` tool for
//! PKCS#7 certificate blobs. This module defines the capability interface
//! and the value objects the rest of the service consumes, so the
//! underlying parser can be swapped without touching the classifier.

mod apk;
mod certificate;
#[cfg(test)]
mod tests;

pub use self::apk::ApkInspector;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Capability interface over the underlying package parser.
pub trait Inspector: Send + Sync {
    /// Inspects the package at `path` and extracts the facts the risk
    /// classifier consumes.
    fn inspect(&self, path: &Path) -> Result<ExtractedFacts, InspectionError>;
}

/// Failure modes of package inspection.
#[derive(Debug, Error)]
pub enum InspectionError {
    /// The file could not be opened as a package archive.
    #[error("not a valid Android package: {0}")]
    InvalidPackage(String),
    /// The archive has no Android manifest entry.
    #[error("no AndroidManifest.xml found in the package")]
    MissingManifest,
    /// The manifest chunk stream could not be decoded.
    #[error("failed to decode the Android manifest: {0}")]
    Manifest(String),
    /// Underlying I/O failure.
    #[error("I/O error while inspecting the package: {0}")]
    Io(#[from] std::io::Error),
}

/// Facts extracted from a single package. Request-scoped value object,
/// recreated on every upload and never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractedFacts {
    pub package_name: String,
    pub app_name: Option<String>,
    pub version_name: Option<String>,
    pub version_code: Option<u32>,
    pub debuggable: bool,
    /// Declared permission names, unique and sorted.
    pub permissions: Vec<String>,
    /// Embedded URLs, unique and sorted.
    pub urls: Vec<String>,
    pub activities: Vec<String>,
    pub services: Vec<String>,
    pub receivers: Vec<String>,
    pub certificates: Vec<CertificateSummary>,
}

/// Coarse summary of one signing certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateSummary {
    pub issuer: String,
    pub subject: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    /// Issuer and subject are identical.
    pub self_signed: bool,
}
