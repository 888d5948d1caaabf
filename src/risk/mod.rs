//! Heuristic risk classification.
//!
//! The classifier is a pure, deterministic function from extracted facts to
//! a risk assessment: a bounded score, a coarse label and the list of
//! reasons that contributed. All tunable numbers live in [`RiskPolicy`],
//! which is built once at startup from configuration and never mutated.


use crate::inspector::{CertificateSummary, ExtractedFacts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores at or above this value stop being `Low`.
const MEDIUM_THRESHOLD: f32 = 3.0;

/// Scores at or above this value are `High`.
const HIGH_THRESHOLD: f32 = 6.0;

/// Upper bound of the risk scale.
const MAX_SCORE: f32 = 10.0;

/// Permissions associated with elevated privacy or security risk, matched
/// by prefix against the declared permission names.
const DANGEROUS_PERMISSIONS: &[&str] = &[
    "android.permission.SEND_SMS",
    "android.permission.READ_SMS",
    "android.permission.RECEIVE_SMS",
    "android.permission.CALL_PHONE",
    "android.permission.RECORD_AUDIO",
    "android.permission.READ_CONTACTS",
    "android.permission.WRITE_CONTACTS",
    "android.permission.READ_CALL_LOG",
    "android.permission.WRITE_CALL_LOG",
    "android.permission.READ_EXTERNAL_STORAGE",
    "android.permission.WRITE_EXTERNAL_STORAGE",
    "android.permission.MANAGE_EXTERNAL_STORAGE",
    "android.permission.ACCESS_FINE_LOCATION",
    "android.permission.ACCESS_COARSE_LOCATION",
    "android.permission.SYSTEM_ALERT_WINDOW",
    "android.permission.REQUEST_INSTALL_PACKAGES",
    "android.permission.PACKAGE_USAGE_STATS",
    "android.permission.CAMERA",
];

/// Hosts commonly referenced by build tooling and framework resources.
/// URLs pointing at these are not counted as risk signals.
const BENIGN_HOSTS: &[&str] = &[
    "schemas.android.com",
    "www.w3.org",
    "xmlpull.org",
    "developer.android.com",
    "www.android.com",
    "play.google.com",
    "www.apache.org",
];

/// Coarse risk bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl RiskLabel {
    /// Maps a score to its label. The boundaries are inclusive on the upper
    /// bucket: 3.0 is already `Medium` and 6.0 is already `High`.
    pub fn from_score(score: f32) -> Self {
        if score < MEDIUM_THRESHOLD {
            Self::Low
        } else if score < HIGH_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Immutable scoring policy: the dangerous-permission reference table, the
/// benign-host allow-list and the additive weights.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskPolicy {
    /// Weight added per dangerous permission found.
    pub permission_weight: f32,
    /// Weight added when the application is debuggable.
    pub debuggable_weight: f32,
    /// Weight added per URL pointing outside the benign host list.
    pub url_weight: f32,
    /// Cap for the accumulated URL weight.
    pub url_weight_cap: f32,
    /// Weight added when a signing certificate is self-signed or outside
    /// its validity window.
    pub certificate_weight: f32,
    /// Reference list of dangerous permissions, matched by prefix.
    pub dangerous_permissions: Vec<String>,
    /// Hosts whose URLs are not counted as risk signals.
    pub benign_hosts: Vec<String>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            permission_weight: 1.0,
            debuggable_weight: 1.0,
            url_weight: 0.5,
            url_weight_cap: 2.0,
            certificate_weight: 2.0,
            dangerous_permissions: DANGEROUS_PERMISSIONS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            benign_hosts: BENIGN_HOSTS.iter().map(|h| (*h).to_owned()).collect(),
        }
    }
}

/// Output of the classifier. Request-scoped, derived entirely from one
/// [`ExtractedFacts`] value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Accumulated score, clamped to `[0, 10]`.
    pub score: f32,
    pub label: RiskLabel,
    /// One human-readable reason per contributing factor, in scoring order.
    pub reasons: Vec<String>,
    /// Subset of the declared permissions that matched the reference table.
    pub dangerous_permissions: Vec<String>,
    pub recommendation: String,
    pub recommendation_reason: String,
}

impl RiskPolicy {
    /// Classifies the facts extracted from a package, evaluating
    /// certificate validity against the current time.
    pub fn classify(&self, facts: &ExtractedFacts) -> RiskAssessment {
        self.classify_at(facts, Utc::now())
    }

    /// Classifies the facts, evaluating certificate validity against `now`.
    /// Identical inputs always produce identical assessments.
    pub fn classify_at(&self, facts: &ExtractedFacts, now: DateTime<Utc>) -> RiskAssessment {
        let mut score = 0.0_f32;
        let mut reasons = Vec::new();

        let dangerous = self.dangerous_subset(&facts.permissions);
        for permission in &dangerous {
            score += self.permission_weight;
            reasons.push(format!("Dangerous permission declared: {permission}"));
        }

        if facts.debuggable {
            score += self.debuggable_weight;
            reasons
                .push("Application is debuggable; release builds should not be".to_owned());
        }

        let suspicious_urls = self.suspicious_url_count(&facts.urls);
        if suspicious_urls > 0 {
            score += (suspicious_urls as f32 * self.url_weight).min(self.url_weight_cap);
            reasons.push(format!(
                "{suspicious_urls} embedded URLs point outside well-known hosts"
            ));
        }

        if let Some(reason) = certificate_reason(&facts.certificates, now) {
            score += self.certificate_weight;
            reasons.push(reason);
        }

        let score = score.clamp(0.0, MAX_SCORE);
        let label = RiskLabel::from_score(score);
        let (recommendation, recommendation_reason) = recommendation_for(label);

        RiskAssessment {
            score,
            label,
            reasons,
            dangerous_permissions: dangerous,
            recommendation: recommendation.to_owned(),
            recommendation_reason: recommendation_reason.to_owned(),
        }
    }

    /// Returns the subset of `permissions` matching the dangerous reference
    /// table, by prefix, preserving order.
    pub fn dangerous_subset(&self, permissions: &[String]) -> Vec<String> {
        permissions
            .iter()
            .filter(|permission| {
                self.dangerous_permissions
                    .iter()
                    .any(|reference| permission.starts_with(reference.as_str()))
            })
            .cloned()
            .collect()
    }

    /// Counts URLs whose host is not in the benign allow-list.
    pub fn suspicious_url_count(&self, urls: &[String]) -> usize {
        urls.iter()
            .filter(|url| {
                let host = host_of(url);
                !self
                    .benign_hosts
                    .iter()
                    .any(|benign| benign.eq_ignore_ascii_case(host))
            })
            .count()
    }
}

/// Returns a reason string when any certificate is self-signed or outside
/// its validity window at `now`. A single reason covers the whole list.
fn certificate_reason(certificates: &[CertificateSummary], now: DateTime<Utc>) -> Option<String> {
    for certificate in certificates {
        if certificate.self_signed {
            return Some("Signing certificate is self-signed".to_owned());
        }
        if matches!(certificate.not_after, Some(t) if t < now) {
            return Some("Signing certificate has expired".to_owned());
        }
        if matches!(certificate.not_before, Some(t) if t > now) {
            return Some("Signing certificate is not yet valid".to_owned());
        }
    }
    None
}

/// Product copy keyed by label. The selection rule is the contract, not
/// the wording.
fn recommendation_for(label: RiskLabel) -> (&'static str, &'static str) {
    match label {
        RiskLabel::Low => (
            "Generally safe to install (Low risk).",
            "No significant risk factors were detected. Verify the source anyway.",
        ),
        RiskLabel::Medium => (
            "Review before installing (Medium risk).",
            "Several risk factors were detected. Verify the source and review the declared \
             permissions before installation.",
        ),
        RiskLabel::High => (
            "Do not install without further review (High risk).",
            "Multiple high-risk signals were detected. Avoid installing from untrusted sources.",
        ),
    }
}

/// Extracts the host part of a URL: everything after the scheme, up to the
/// first path, port, query or fragment separator.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest
        .find(['/', ':', '?', '#'])
        .unwrap_or(rest.len());
    &rest[..end]
}
