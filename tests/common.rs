//! Common test utilities and constants for the Kyocho crate.
//!
//! Provides functions for setting up test directories, building small EPUB
//! fixtures, and reading members back out of converted packages.

use rand::{Rng, distributions::Alphanumeric};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes of a (truncated) PNG resource. Only their identity matters.
#[allow(dead_code)]
pub const IMAGE_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D',
    b'R', 0xde, 0xad, 0xbe, 0xef,
];

#[allow(dead_code)]
pub const STYLESHEET: &str = "p { margin: 0; }\nb { font-weight: 700; }\n";

#[allow(dead_code)]
pub const CHAPTER_ONE: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>One</title></head>\
<body><h1>Chapter One</h1><p>Reading quickly is wonderful.</p><p>Hi there.</p></body></html>";

#[allow(dead_code)]
pub const CHAPTER_TWO: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Two</title></head>\
<body><p>Another <em>short</em> chapter &amp; ending</p></body></html>";

#[allow(dead_code)]
pub const CONTAINER_XML: &str = "<?xml version=\"1.0\"?>\n\
<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\
<rootfiles><rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/></rootfiles>\
</container>";

#[allow(dead_code)]
pub const PACKAGE_OPF: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"uid\">\
<metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\"><dc:title>Fixture</dc:title></metadata>\
<manifest>\
<item id=\"ch1\" href=\"text/chapter1.xhtml\" media-type=\"application/xhtml+xml\"/>\
<item id=\"ch2\" href=\"text/chapter%202.xhtml\" media-type=\"application/xhtml+xml\"/>\
<item id=\"cover\" href=\"images/cover.png\" media-type=\"image/png\"/>\
<item id=\"css\" href=\"style.css\" media-type=\"text/css\"/>\
</manifest>\
<spine><itemref idref=\"ch1\"/><itemref idref=\"ch2\"/></spine>\
</package>";

/// Paths of one isolated test directory.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
}

/// Helper function to create a clean test directory with source and target subdirectories.
/// The directory name carries a random suffix so tests can run in parallel.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if base_dir.exists() {
        fs::remove_dir_all(&base_dir).await.unwrap();
    }
    let source_dir = base_dir.join("source");
    let target_dir = base_dir.join("target");

    fs::create_dir_all(&source_dir).await.unwrap();
    fs::create_dir_all(&target_dir).await.unwrap();

    TestDirs {
        base_dir,
        source_dir,
        target_dir,
    }
}

/// Builds the fixture EPUB in memory.
///
/// Members, in order: `mimetype` (stored), `META-INF/container.xml`, the OPF,
/// two chapters, a PNG and a stylesheet. `chapter_one` replaces the first
/// chapter's markup.
#[allow(dead_code)]
pub fn build_epub(chapter_one: &[u8]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let members: [(&str, &[u8], SimpleFileOptions); 7] = [
        ("mimetype", b"application/epub+zip", stored),
        ("META-INF/container.xml", CONTAINER_XML.as_bytes(), deflated),
        ("OEBPS/content.opf", PACKAGE_OPF.as_bytes(), deflated),
        ("OEBPS/text/chapter1.xhtml", chapter_one, deflated),
        ("OEBPS/text/chapter 2.xhtml", CHAPTER_TWO.as_bytes(), deflated),
        ("OEBPS/images/cover.png", IMAGE_BYTES, stored),
        ("OEBPS/style.css", STYLESHEET.as_bytes(), deflated),
    ];
    for (name, data, options) in members {
        zip.start_file(name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Writes the default fixture EPUB to `dir/name` and returns its path.
#[allow(dead_code)]
pub async fn create_fixture_epub(dir: &Path, name: &str) -> PathBuf {
    create_epub_with_chapter(dir, name, CHAPTER_ONE.as_bytes()).await
}

/// Writes a fixture EPUB whose first chapter is `chapter_one`.
#[allow(dead_code)]
pub async fn create_epub_with_chapter(dir: &Path, name: &str, chapter_one: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_epub(chapter_one)).await.unwrap();
    path
}

/// Checks if a ZIP file exists and contains at least one entry.
#[allow(dead_code)]
pub async fn assert_valid_zip_file(path: &Path) {
    assert!(path.exists(), "Output ZIP file does not exist: {:?}", path);
    assert!(path.is_file(), "Output ZIP path is not a file: {:?}", path);

    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let zip = zip::ZipArchive::new(file_std).unwrap();
    assert!(zip.len() > 0, "Output ZIP file is empty: {:?}", path);
}

/// Reads one member of a ZIP file.
#[allow(dead_code)]
pub async fn read_zip_member(path: &Path, name: &str) -> Vec<u8> {
    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let mut archive = zip::ZipArchive::new(file_std).unwrap();
    let mut member = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    member.read_to_end(&mut content).unwrap();
    content
}

/// Member names of a ZIP file, in archive order.
#[allow(dead_code)]
pub async fn zip_member_names(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let mut archive = zip::ZipArchive::new(file_std).unwrap();
    (0..archive.len())
        .map(|idx| archive.by_index(idx).unwrap().name().to_string())
        .collect()
}

/// Compression method a ZIP member was stored with.
#[allow(dead_code)]
pub async fn zip_member_compression(path: &Path, name: &str) -> CompressionMethod {
    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let mut archive = zip::ZipArchive::new(file_std).unwrap();
    archive.by_name(name).unwrap().compression()
}

/// Whether any temporary `.part` file is left in `dir`.
#[allow(dead_code)]
pub fn has_partial_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .any(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
        })
        .unwrap_or(false)
}
