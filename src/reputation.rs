//! Optional hash reputation lookups.
//!
//! When an API key is configured, uploaded package hashes can be checked
//! against the VirusTotal v3 file endpoint. Without a key the feature is
//! disabled and the service stays fully offline. Lookups never influence
//! the heuristic risk score; they are reported alongside it.

use crate::config::ReputationConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Verdict category reported by a single engine. The variant order is the
/// display order: detections first, then the noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Malicious,
    Suspicious,
    Undetected,
    Harmless,
    Timeout,
    Failure,
    TypeUnsupported,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malicious => "malicious",
            Self::Suspicious => "suspicious",
            Self::Undetected => "undetected",
            Self::Harmless => "harmless",
            Self::Timeout => "timeout",
            Self::Failure => "failure",
            Self::TypeUnsupported => "type-unsupported",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "malicious" => Ok(Self::Malicious),
            "suspicious" => Ok(Self::Suspicious),
            "undetected" => Ok(Self::Undetected),
            "harmless" => Ok(Self::Harmless),
            "timeout" | "confirmed-timeout" => Ok(Self::Timeout),
            "failure" => Ok(Self::Failure),
            "type-unsupported" | "type_unsupported" => Ok(Self::TypeUnsupported),
            _ => Err(()),
        }
    }
}

/// One engine's verdict, flattened for the response payload.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    pub engine: String,
    pub category: Category,
    pub result: Option<String>,
    pub method: Option<String>,
    pub engine_version: Option<String>,
    pub engine_update: Option<String>,
}

/// Aggregate detection counters for one file.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionStats {
    pub malicious: u32,
    pub suspicious: u32,
    pub undetected: u32,
    pub harmless: u32,
    pub timeout: u32,
    pub failure: u32,
    #[serde(alias = "type-unsupported")]
    pub type_unsupported: u32,
}

/// Coarse severity badge derived from the detection counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Low,
    Medium,
    High,
}

impl Badge {
    pub fn from_stats(stats: &DetectionStats) -> Self {
        if stats.malicious >= 10 || (stats.malicious >= 5 && stats.suspicious >= 3) {
            Self::High
        } else if stats.malicious >= 3 || stats.suspicious >= 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Reputation report for a known hash.
#[derive(Debug, Clone, Serialize)]
pub struct ReputationReport {
    pub enabled: bool,
    pub found: bool,
    pub badge: Badge,
    pub stats: DetectionStats,
    pub results: Vec<EngineResult>,
}

/// Outcome of a lookup.
#[derive(Debug)]
pub enum Lookup {
    /// No API key is configured.
    Disabled,
    /// The service has never seen this hash.
    NotFound,
    Found(ReputationReport),
}

/// Client for the reputation service. Cheap to clone; the underlying HTTP
/// client is shared.
#[derive(Debug, Clone)]
pub struct ReputationClient {
    config: ReputationConfig,
    http: reqwest::Client,
}

impl ReputationClient {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Looks up `hash` against the file endpoint.
    pub async fn lookup(&self, hash: &str) -> Result<Lookup> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(Lookup::Disabled);
        };

        let url = format!("{}/files/{hash}", self.config.api_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .header("x-apikey", api_key)
            .send()
            .await
            .context("reputation service request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }

        let report: FileReport = response
            .error_for_status()
            .context("reputation service returned an error")?
            .json()
            .await
            .context("could not decode the reputation service response")?;

        let attributes = report.data.attributes;
        let stats = attributes.last_analysis_stats;
        let mut results: Vec<EngineResult> = attributes
            .last_analysis_results
            .into_iter()
            .map(|(engine, result)| EngineResult {
                engine,
                // Unknown categories are treated as engine failures.
                category: Category::from_str(&result.category).unwrap_or(Category::Failure),
                result: result.result,
                method: result.method,
                engine_version: result.engine_version,
                engine_update: result.engine_update,
            })
            .collect();
        sort_results(&mut results);

        Ok(Lookup::Found(ReputationReport {
            enabled: true,
            found: true,
            badge: Badge::from_stats(&stats),
            stats,
            results,
        }))
    }
}

/// Sorts engine results for display: detections first, then alphabetical
/// within each category.
pub fn sort_results(results: &mut [EngineResult]) {
    results.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.engine.cmp(&b.engine))
    });
}

// Wire shapes of the v3 file endpoint. Only the fields the report needs
// are declared; everything else is ignored.

#[derive(Debug, Deserialize)]
struct FileReport {
    data: FileData,
}

#[derive(Debug, Deserialize)]
struct FileData {
    attributes: FileAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileAttributes {
    last_analysis_stats: DetectionStats,
    last_analysis_results: BTreeMap<String, AnalysisResult>,
}

#[derive(Debug, Deserialize)]
struct AnalysisResult {
    category: String,
    result: Option<String>,
    method: Option<String>,
    engine_version: Option<String>,
    engine_update: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{sort_results, Badge, Category, DetectionStats, EngineResult, ReputationClient};
    use crate::config::ReputationConfig;
    use std::str::FromStr;

    fn engine(name: &str, category: Category) -> EngineResult {
        EngineResult {
            engine: name.to_owned(),
            category,
            result: None,
            method: None,
            engine_version: None,
            engine_update: None,
        }
    }

    fn stats(malicious: u32, suspicious: u32) -> DetectionStats {
        DetectionStats {
            malicious,
            suspicious,
            ..DetectionStats::default()
        }
    }

    #[test]
    fn it_enabled_follows_api_key() {
        let disabled = ReputationClient::new(ReputationConfig::default());
        assert!(!disabled.is_enabled());

        let enabled = ReputationClient::new(ReputationConfig {
            api_key: Some("secret".to_owned()),
            ..ReputationConfig::default()
        });
        assert!(enabled.is_enabled());
    }

    #[test]
    fn it_category_ordering() {
        assert!(Category::Malicious < Category::Suspicious);
        assert!(Category::Suspicious < Category::Undetected);
        assert!(Category::Harmless < Category::Timeout);
        assert_eq!(Category::TypeUnsupported.as_str(), "type-unsupported");
    }

    #[test]
    fn it_category_from_str() {
        assert_eq!(Category::from_str("malicious"), Ok(Category::Malicious));
        assert_eq!(Category::from_str("confirmed-timeout"), Ok(Category::Timeout));
        assert_eq!(
            Category::from_str("type_unsupported"),
            Ok(Category::TypeUnsupported)
        );
        assert!(Category::from_str("banana").is_err());
    }

    #[test]
    fn it_sort_results() {
        let mut results = vec![
            engine("Zeta", Category::Undetected),
            engine("Beta", Category::Malicious),
            engine("Alpha", Category::Undetected),
            engine("Gamma", Category::Suspicious),
        ];

        sort_results(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.engine.as_str()).collect();
        assert_eq!(order, vec!["Beta", "Gamma", "Alpha", "Zeta"]);
    }

    #[test]
    fn it_badge_thresholds() {
        assert_eq!(Badge::from_stats(&stats(10, 0)), Badge::High);
        assert_eq!(Badge::from_stats(&stats(5, 3)), Badge::High);
        assert_eq!(Badge::from_stats(&stats(5, 2)), Badge::Medium);
        assert_eq!(Badge::from_stats(&stats(3, 0)), Badge::Medium);
        assert_eq!(Badge::from_stats(&stats(0, 2)), Badge::Medium);
        assert_eq!(Badge::from_stats(&stats(2, 1)), Badge::Low);
        assert_eq!(Badge::from_stats(&stats(0, 0)), Badge::Low);
    }
}
