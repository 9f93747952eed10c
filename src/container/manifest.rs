//! Locates the OPF package document and reads its manifest.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// Archive path of the OCF container document.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Media type of the OPF package document itself.
pub const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// One `<item>` of the OPF manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub href: String,
    pub media_type: String,
    /// Archive path the href resolves to.
    pub path: String,
}

/// The package manifest, keyed by resolved archive path.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Archive path of the OPF document.
    pub package_path: String,
    entries: Vec<ManifestEntry>,
    by_path: HashMap<String, usize>,
}

impl Manifest {
    /// Parses `container.xml` and the OPF it points at.
    ///
    /// `read` loads an archive member by path.
    pub fn load(mut read: impl FnMut(&str) -> Result<Option<Vec<u8>>>) -> Result<Self> {
        let container = read(CONTAINER_PATH)?
            .ok_or_else(|| Error::InvalidPackage(format!("missing {}", CONTAINER_PATH)))?;
        let package_path = find_package_path(&decode_utf8(CONTAINER_PATH, container)?)?;

        let opf = read(&package_path)?.ok_or_else(|| {
            Error::InvalidPackage(format!("package document '{}' not found", package_path))
        })?;
        let opf = decode_utf8(&package_path, opf)?;

        let base = package_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let entries = parse_manifest(&opf, &base)?;

        let by_path = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.path.clone(), idx))
            .collect();

        Ok(Self {
            package_path,
            entries,
            by_path,
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Manifest entry for an archive path.
    pub fn entry_for_path(&self, path: &str) -> Option<&ManifestEntry> {
        self.by_path.get(path).map(|&idx| &self.entries[idx])
    }
}

fn decode_utf8(path: &str, bytes: Vec<u8>) -> Result<String> {
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::InvalidPackage(format!("'{}' is not UTF-8: {}", path, e)))?;
    Ok(text.trim_start_matches('\u{FEFF}').to_string())
}

fn find_package_path(container: &str) -> Result<String> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidPackage(format!(
        "no rootfile found in {}",
        CONTAINER_PATH
    )))
}

fn parse_manifest(opf: &str, base: &str) -> Result<Vec<ManifestEntry>> {
    let mut reader = Reader::from_str(opf);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_manifest = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"manifest" => in_manifest = true,
            Event::End(e) if e.local_name().as_ref() == b"manifest" => in_manifest = false,
            Event::Empty(e) | Event::Start(e) if in_manifest && e.local_name().as_ref() == b"item" => {
                let id = attribute(&e, b"id")?.unwrap_or_default();
                let href = attribute(&e, b"href")?.unwrap_or_default();
                let media_type = attribute(&e, b"media-type")?.unwrap_or_default();
                if id.is_empty() || href.is_empty() {
                    log::warn!("Skipping manifest item without id or href (id='{}')", id);
                    continue;
                }
                let path = resolve_href(base, &href);
                entries.push(ManifestEntry {
                    id,
                    href,
                    media_type,
                    path,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn attribute(start: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Resolves a manifest href against the OPF directory into an archive path.
///
/// The href is percent-decoded, its fragment dropped, and `.`/`..` segments
/// are collapsed.
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
