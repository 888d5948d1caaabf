//! Package inspector backed by the `apk` crate.
//!
//! The manifest is stored as Android binary XML: a chunk stream holding a
//! string pool followed by element chunks whose names and string values are
//! indices into that pool. Decoding the stream is the `apk` crate's job;
//! this module only walks the chunks and picks out the values the facts
//! record needs.

use super::{certificate, ExtractedFacts, InspectionError, Inspector};
use apk::res::Chunk;
use apk::zip::ZipArchive;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::warn;

const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// AXML attribute value types: string and decimal integer references.
const TYPE_STRING: u32 = 3;
const TYPE_INT_DEC: u32 = 16;
/// AXML boolean attribute value type.
const TYPE_INT_BOOLEAN: u32 = 18;

lazy_static! {
    static ref URL_REGEX: Regex =
        Regex::new(r"(?i)https?://[\w\-._~:/?#\[\]@!$&'()*+,;=%]+").unwrap();
}

/// Inspector implementation for `.apk` packages.
#[derive(Debug, Default)]
pub struct ApkInspector;

impl Inspector for ApkInspector {
    fn inspect(&self, path: &Path) -> Result<ExtractedFacts, InspectionError> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| InspectionError::InvalidPackage(e.to_string()))?;

        let manifest_data = read_manifest(&mut zip)?;
        let manifest = DecodedManifest::decode(&manifest_data)?;

        let mut urls = BTreeSet::new();
        for string in &manifest.strings {
            collect_urls(string, &mut urls);
        }
        let entry_names: Vec<String> = zip.file_names().map(str::to_owned).collect();
        for name in &entry_names {
            collect_urls(name, &mut urls);
        }

        // A package without a readable certificate is still analyzable;
        // the classifier treats an empty list as no certificate signal.
        let certificates = match certificate::summaries(&mut zip) {
            Ok(certificates) => certificates,
            Err(e) => {
                warn!("certificate analysis skipped: {e:#}");
                Vec::new()
            }
        };

        Ok(ExtractedFacts {
            package_name: manifest.package.unwrap_or_default(),
            app_name: manifest.label,
            version_name: manifest.version_name,
            version_code: manifest.version_code,
            debuggable: manifest.debuggable,
            permissions: manifest.permissions,
            urls: urls.into_iter().collect(),
            activities: manifest.activities,
            services: manifest.services,
            receivers: manifest.receivers,
            certificates,
        })
    }
}

fn read_manifest<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Vec<u8>, InspectionError> {
    let mut entry = zip
        .by_name(ANDROID_MANIFEST)
        .map_err(|_| InspectionError::MissingManifest)?;
    let mut data = Vec::with_capacity(8192);
    let _ = entry.read_to_end(&mut data)?;
    Ok(data)
}

/// Values pulled out of the decoded binary manifest.
#[derive(Debug, Default)]
struct DecodedManifest {
    package: Option<String>,
    label: Option<String>,
    version_name: Option<String>,
    version_code: Option<u32>,
    debuggable: bool,
    permissions: Vec<String>,
    activities: Vec<String>,
    services: Vec<String>,
    receivers: Vec<String>,
    /// The whole string pool, kept around for URL extraction.
    strings: Vec<String>,
}

impl DecodedManifest {
    fn decode(data: &[u8]) -> Result<Self, InspectionError> {
        let chunks = match Chunk::parse(&mut Cursor::new(data))
            .map_err(|e| InspectionError::Manifest(e.to_string()))?
        {
            Chunk::Xml(chunks) => chunks,
            _ => {
                return Err(InspectionError::Manifest(
                    "not a binary XML document".to_owned(),
                ))
            }
        };

        let strings = match chunks.first() {
            Some(Chunk::StringPool(strings, _)) => strings.clone(),
            _ => {
                return Err(InspectionError::Manifest(
                    "missing manifest string pool".to_owned(),
                ))
            }
        };

        let index: HashMap<&str, i32> = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as i32))
            .collect();

        let mut manifest = Self::default();
        manifest.package = find_value(&strings, &index, &chunks, "manifest", "package");
        manifest.version_name = find_value(&strings, &index, &chunks, "manifest", "versionName");
        manifest.version_code = find_value(&strings, &index, &chunks, "manifest", "versionCode")
            .and_then(|v| v.parse().ok());
        manifest.label = find_value(&strings, &index, &chunks, "application", "label");
        manifest.debuggable = find_flag(&index, &chunks, "application", "debuggable");

        let mut permissions =
            collect_values(&strings, &index, &chunks, "uses-permission", "name");
        permissions.sort_unstable();
        permissions.dedup();
        manifest.permissions = permissions;

        manifest.activities = collect_values(&strings, &index, &chunks, "activity", "name");
        manifest.services = collect_values(&strings, &index, &chunks, "service", "name");
        manifest.receivers = collect_values(&strings, &index, &chunks, "receiver", "name");
        manifest.strings = strings;

        Ok(manifest)
    }
}

/// Raw attribute payload: string-pool reference, value type and data word.
type RawAttribute = (i32, u32, u32);

fn element_attr(chunk: &Chunk, node: i32, attr: i32) -> Option<RawAttribute> {
    if let Chunk::XmlStartElement(_, element, attributes) = chunk {
        if element.name == node {
            return attributes.iter().find(|a| a.name == attr).map(|a| {
                (
                    a.raw_value,
                    a.typed_value.data_type as u32,
                    a.typed_value.data as u32,
                )
            });
        }
    }
    None
}

fn decode_value(strings: &[String], (raw, data_type, data): RawAttribute) -> Option<String> {
    match data_type {
        TYPE_STRING => usize::try_from(raw).ok().and_then(|i| strings.get(i).cloned()),
        TYPE_INT_DEC => Some(data.to_string()),
        _ => None,
    }
}

/// Finds the first `attr` value on a `node` element.
fn find_value(
    strings: &[String],
    index: &HashMap<&str, i32>,
    chunks: &[Chunk],
    node: &str,
    attr: &str,
) -> Option<String> {
    let node = *index.get(node)?;
    let attr = *index.get(attr)?;
    chunks
        .iter()
        .find_map(|chunk| element_attr(chunk, node, attr))
        .and_then(|raw| decode_value(strings, raw))
}

/// Collects every `attr` value across all `node` elements, in document
/// order.
fn collect_values(
    strings: &[String],
    index: &HashMap<&str, i32>,
    chunks: &[Chunk],
    node: &str,
    attr: &str,
) -> Vec<String> {
    let (Some(&node), Some(&attr)) = (index.get(node), index.get(attr)) else {
        return Vec::new();
    };
    chunks
        .iter()
        .filter_map(|chunk| element_attr(chunk, node, attr))
        .filter_map(|raw| decode_value(strings, raw))
        .collect()
}

/// Reads a boolean attribute; absent or non-boolean values are `false`.
fn find_flag(index: &HashMap<&str, i32>, chunks: &[Chunk], node: &str, attr: &str) -> bool {
    let (Some(&node), Some(&attr)) = (index.get(node), index.get(attr)) else {
        return false;
    };
    chunks
        .iter()
        .find_map(|chunk| element_attr(chunk, node, attr))
        .is_some_and(|(_, data_type, data)| data_type == TYPE_INT_BOOLEAN && data != 0)
}

/// Adds every URL found in `text` to the accumulator.
pub(super) fn collect_urls(text: &str, urls: &mut BTreeSet<String>) {
    for m in URL_REGEX.find_iter(text) {
        let _ = urls.insert(m.as_str().to_owned());
    }
}
