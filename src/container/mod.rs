//! EPUB container reading and writing.
//!
//! A [`Package`] holds every member of the source archive as an [`Item`], in
//! archive order, together with the compression settings each member was
//! stored with. Writing a package re-emits the members in the same order and
//! with the same settings, so `mimetype` stays first and uncompressed and every
//! item that was not rewritten keeps its exact bytes.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use memmap2::MmapOptions;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::types::{ItemSummary, PackageReport};

pub mod manifest;
pub mod selector;

pub use manifest::{Manifest, ManifestEntry, PACKAGE_MEDIA_TYPE};
pub use selector::ContentSelector;

/// One member of the package.
#[derive(Debug, Clone)]
pub struct Item {
    identifier: String,
    path: String,
    media_type: Option<String>,
    data: Vec<u8>,
    compression: CompressionMethod,
    last_modified: Option<DateTime>,
    unix_mode: Option<u32>,
    is_dir: bool,
}

impl Item {
    /// Creates a file item stored with Deflate compression.
    pub fn new(
        identifier: impl Into<String>,
        path: impl Into<String>,
        media_type: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            path: path.into(),
            media_type,
            data,
            compression: CompressionMethod::Deflated,
            last_modified: None,
            unix_mode: None,
            is_dir: false,
        }
    }

    /// Stores the item without compression (required for `mimetype`).
    pub fn stored(mut self) -> Self {
        self.compression = CompressionMethod::Stored;
        self
    }

    /// Manifest id, or the archive path for members outside the manifest.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the content bytes. Identity, path and storage settings are kept.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    fn file_options(&self) -> SimpleFileOptions {
        let method = match self.compression {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let mut options = SimpleFileOptions::default()
            .compression_method(method)
            .large_file(self.data.len() as u64 >= u32::MAX as u64);
        if let Some(modified) = self.last_modified {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = self.unix_mode {
            options = options.unix_permissions(mode);
        }
        options
    }
}

/// An opened EPUB package.
#[derive(Debug, Clone)]
pub struct Package {
    manifest: Manifest,
    items: Vec<Item>,
    comment: Vec<u8>,
}

impl Package {
    /// Opens the package at `path` through a read-only memory map.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::InvalidPackage(format!("{:?} is empty", path)));
        }

        // The map is dropped before this function returns and the archive is
        // only read through it.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Self::from_reader(Cursor::new(&mmap[..]))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Reads every archive member into memory.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let manifest = Manifest::load(|path| read_member(&mut archive, path))?;

        let mut items = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            let mut file = archive.by_index(idx)?;
            let path = file.name().to_string();

            let (identifier, media_type) = match manifest.entry_for_path(&path) {
                Some(entry) => (entry.id.clone(), Some(entry.media_type.clone())),
                None if path == manifest.package_path => {
                    (path.clone(), Some(PACKAGE_MEDIA_TYPE.to_string()))
                }
                None => (path.clone(), None),
            };

            let mut data = Vec::new();
            if !file.is_dir() {
                data.reserve(file.size() as usize);
                file.read_to_end(&mut data)?;
            }

            items.push(Item {
                identifier,
                path,
                media_type,
                data,
                compression: file.compression(),
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }

        for entry in manifest.entries() {
            if !items.iter().any(|item| item.path == entry.path) {
                log::warn!(
                    "Manifest item '{}' points at missing archive member '{}'",
                    entry.id,
                    entry.path
                );
            }
        }

        Ok(Self {
            manifest,
            comment: archive.comment().to_vec(),
            items,
        })
    }

    /// Builds a package from items that are already in memory.
    pub fn from_items(manifest: Manifest, items: Vec<Item>) -> Self {
        Self {
            manifest,
            items,
            comment: Vec::new(),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Item with the given identifier.
    pub fn get(&self, identifier: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.identifier == identifier)
    }

    pub(crate) fn take_items(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    pub(crate) fn set_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    /// Classifies every item with `selector`.
    pub fn report(&self, selector: &ContentSelector) -> PackageReport {
        PackageReport {
            package_document: self.manifest.package_path.clone(),
            items: self
                .items
                .iter()
                .map(|item| ItemSummary {
                    identifier: item.identifier.clone(),
                    path: item.path.clone(),
                    media_type: item.media_type.clone(),
                    size: item.data.len(),
                    class: selector.classify(item),
                })
                .collect(),
        }
    }

    /// Writes the package as a ZIP archive, members in their original order.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);

        for item in &self.items {
            let options = item.file_options();
            if item.is_dir {
                zip.add_directory(item.path.as_str(), options)?;
                continue;
            }
            zip.start_file(item.path.as_str(), options)?;
            zip.write_all(&item.data)?;
        }

        if !self.comment.is_empty() {
            zip.set_raw_comment(self.comment.clone().into_boxed_slice());
        }
        zip.finish()?;
        Ok(())
    }

    /// Serializes the package into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Writes the package to `destination` atomically.
    ///
    /// The archive is written to a temporary file next to `destination` and
    /// renamed into place only once it is complete. On any failure the
    /// temporary file is removed and `destination` is left as it was.
    pub fn save(&self, destination: &Path, overwrite: bool) -> Result<()> {
        let directory = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = tempfile::Builder::new()
            .prefix(".kyocho-")
            .suffix(".part")
            .tempfile_in(directory)?;
        self.write_to(staged.as_file_mut())?;
        staged.as_file_mut().sync_all()?;

        let persisted = if overwrite {
            staged.persist(destination)
        } else {
            staged.persist_noclobber(destination)
        };
        persisted.map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(destination.to_path_buf())
            } else {
                Error::Persist(e)
            }
        })?;
        Ok(())
    }
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Option<Vec<u8>>> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            Ok(Some(data))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
