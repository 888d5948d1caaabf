//! Tests for the inspector helpers.

use super::apk::collect_urls;
use super::certificate::{parse_certificates, parse_time};
use chrono::{TimeZone, Utc};
use std::collections::BTreeSet;

#[test]
fn it_parse_time() {
    assert_eq!(
        parse_time("May 26 13:45:52 2018 GMT"),
        Some(Utc.with_ymd_and_hms(2018, 5, 26, 13, 45, 52).unwrap())
    );
    // Single-digit days are padded with an extra space.
    assert_eq!(
        parse_time("Jan  7 00:00:00 2030 GMT"),
        Some(Utc.with_ymd_and_hms(2030, 1, 7, 0, 0, 0).unwrap())
    );
    assert_eq!(parse_time("Foo 26 13:45:52 2018 GMT"), None);
    assert_eq!(parse_time(""), None);
}

#[test]
fn it_parse_certificates() {
    let report = "\
Certificate:
    Data:
        Version: 3 (0x2)
        Serial Number: 1229584813 (0x494a812d)
        Signature Algorithm: sha256WithRSAEncryption
        Issuer: C=US, O=Android, CN=Android Debug
        Validity
            Not Before: May 26 13:45:52 2018 GMT
            Not After : May 18 13:45:52 2048 GMT
        Subject: C=US, O=Android, CN=Android Debug
        Subject Public Key Info:
            Public Key Algorithm: rsaEncryption
                Public-Key: (2048 bit)
Certificate:
    Data:
        Version: 3 (0x2)
        Issuer: C=US, O=Example CA, CN=Example Signing CA
        Validity
            Not Before: Jan  1 00:00:00 2020 GMT
            Not After : Jan  1 00:00:00 2019 GMT
        Subject: C=US, O=Example, CN=Example App
        Subject Public Key Info:
            Public Key Algorithm: rsaEncryption
";

    let certificates = parse_certificates(report);

    assert_eq!(certificates.len(), 2);

    assert_eq!(certificates[0].issuer, "C=US, O=Android, CN=Android Debug");
    assert_eq!(certificates[0].subject, "C=US, O=Android, CN=Android Debug");
    assert!(certificates[0].self_signed);
    assert_eq!(
        certificates[0].not_before,
        Some(Utc.with_ymd_and_hms(2018, 5, 26, 13, 45, 52).unwrap())
    );
    assert_eq!(
        certificates[0].not_after,
        Some(Utc.with_ymd_and_hms(2048, 5, 18, 13, 45, 52).unwrap())
    );

    assert_eq!(
        certificates[1].issuer,
        "C=US, O=Example CA, CN=Example Signing CA"
    );
    assert_eq!(certificates[1].subject, "C=US, O=Example, CN=Example App");
    assert!(!certificates[1].self_signed);
    assert_eq!(
        certificates[1].not_after,
        Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap())
    );
}

#[test]
fn it_parse_certificates_empty_report() {
    assert!(parse_certificates("").is_empty());
    assert!(parse_certificates("unable to load PKCS7 object").is_empty());
}

#[test]
fn it_collect_urls() {
    let mut urls = BTreeSet::new();

    collect_urls("visit https://example.com/a and http://example.org/b?q=1", &mut urls);
    collect_urls("again https://example.com/a", &mut urls);
    collect_urls("no urls here", &mut urls);

    let urls: Vec<String> = urls.into_iter().collect();
    assert_eq!(
        urls,
        vec![
            "http://example.org/b?q=1".to_owned(),
            "https://example.com/a".to_owned(),
        ]
    );
}
