//! Signing certificate extraction.
//!
//! Android signature blocks under `META-INF/` are PKCS#7 blobs. Rather than
//! carrying an ASN.1 stack, the blobs are handed to the `openssl` tool and
//! its textual report is parsed for the handful of fields the classifier
//! cares about.

use crate::inspector::CertificateSummary;
use anyhow::{bail, Context, Result};
use apk::zip::ZipArchive;
use chrono::{DateTime, NaiveDate, Utc};
use std::io::{Read, Seek, Write};
use std::process::{Command, Stdio};

/// File extensions of signature blocks inside `META-INF/`.
const SIGNATURE_EXTENSIONS: &[&str] = &["RSA", "DSA", "EC"];

/// Extracts certificate summaries from every signature block in the
/// package.
pub(super) fn summaries<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
) -> Result<Vec<CertificateSummary>> {
    let signature_names: Vec<String> = zip
        .file_names()
        .filter(|name| is_signature_entry(name))
        .map(str::to_owned)
        .collect();

    let mut certificates = Vec::new();
    for name in &signature_names {
        let mut entry = zip
            .by_name(name)
            .with_context(|| format!("could not open signature entry {name}"))?;
        let mut der = Vec::new();
        let _ = entry
            .read_to_end(&mut der)
            .with_context(|| format!("could not read signature entry {name}"))?;
        drop(entry);

        let report = print_certs(&der)
            .with_context(|| format!("could not decode signature entry {name}"))?;
        certificates.extend(parse_certificates(&report));
    }

    Ok(certificates)
}

fn is_signature_entry(name: &str) -> bool {
    name.starts_with("META-INF/")
        && std::path::Path::new(name)
            .extension()
            .is_some_and(|ext| SIGNATURE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Runs `openssl pkcs7` over the DER blob and returns its textual report.
fn print_certs(der: &[u8]) -> Result<String> {
    let mut child = Command::new("openssl")
        .args(["pkcs7", "-inform", "DER", "-noout", "-print_certs", "-text"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("could not run the openssl command")?;

    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(der)
            .context("could not send the signature block to openssl")?;
    }

    let output = child
        .wait_with_output()
        .context("error waiting for the openssl command")?;
    if !output.status.success() {
        bail!(
            "openssl could not decode the signature block: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Default)]
struct CertBuilder {
    issuer: String,
    subject: String,
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
}

impl CertBuilder {
    fn build(self) -> CertificateSummary {
        let self_signed = !self.issuer.is_empty() && self.issuer == self.subject;
        CertificateSummary {
            issuer: self.issuer,
            subject: self.subject,
            not_before: self.not_before,
            not_after: self.not_after,
            self_signed,
        }
    }
}

/// Parses the `openssl -text` report into certificate summaries. Each
/// `Certificate:` line opens a new block; the report repeats `Subject:`
/// inside `Subject Public Key Info:` sections, so only the first match per
/// block is kept.
pub(super) fn parse_certificates(report: &str) -> Vec<CertificateSummary> {
    let mut certificates = Vec::new();
    let mut current: Option<CertBuilder> = None;

    for line in report.lines() {
        let trimmed = line.trim();

        if trimmed == "Certificate:" {
            if let Some(builder) = current.take() {
                certificates.push(builder.build());
            }
            current = Some(CertBuilder::default());
            continue;
        }

        let Some(builder) = current.as_mut() else {
            continue;
        };

        if let Some(issuer) = trimmed.strip_prefix("Issuer:") {
            if builder.issuer.is_empty() {
                builder.issuer = issuer.trim().to_owned();
            }
        } else if let Some(subject) = trimmed.strip_prefix("Subject:") {
            if builder.subject.is_empty() {
                builder.subject = subject.trim().to_owned();
            }
        } else if let Some(time) = trimmed.strip_prefix("Not Before:") {
            builder.not_before = parse_time(time.trim());
        } else if let Some(time) = trimmed
            .strip_prefix("Not After :")
            .or_else(|| trimmed.strip_prefix("Not After:"))
        {
            builder.not_after = parse_time(time.trim());
        }
    }

    if let Some(builder) = current {
        certificates.push(builder.build());
    }

    certificates
}

/// Parses a validity timestamp such as `May 26 13:45:52 2018 GMT`.
pub(super) fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let mut parts = text.split_whitespace();
    let month = month_number(parts.next()?)?;
    let day: u32 = parts.next()?.parse().ok()?;
    let mut clock = parts.next()?.split(':');
    let hour: u32 = clock.next()?.parse().ok()?;
    let minute: u32 = clock.next()?.parse().ok()?;
    let second: u32 = clock.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn month_number(name: &str) -> Option<u32> {
    match name {
        "Jan" => Some(1),
        "Feb" => Some(2),
        "Mar" => Some(3),
        "Apr" => Some(4),
        "May" => Some(5),
        "Jun" => Some(6),
        "Jul" => Some(7),
        "Aug" => Some(8),
        "Sep" => Some(9),
        "Oct" => Some(10),
        "Nov" => Some(11),
        "Dec" => Some(12),
        _ => None,
    }
}
