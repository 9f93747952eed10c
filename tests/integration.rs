//! Integration tests for the Kyocho crate.
//!
//! These tests run full conversion pipelines from a fixture EPUB on disk to
//! output validation.

use kyocho::error::{Error, Result};
use kyocho::markup::Document;
use kyocho::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::timeout;
use zip::CompressionMethod;

mod common;
use common::{
    CHAPTER_ONE, IMAGE_BYTES, STYLESHEET, TEST_TIMEOUT, assert_valid_zip_file,
    create_epub_with_chapter, create_fixture_epub, has_partial_files, read_zip_member,
    setup_test_dirs, zip_member_compression, zip_member_names,
};

fn word_count(markup: &str) -> usize {
    Document::parse(markup)
        .unwrap()
        .text_content()
        .split_whitespace()
        .count()
}

#[tokio::test]
async fn test_full_pipeline_default() -> Result<()> {
    let test_dirs = setup_test_dirs("full_pipeline_default").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "novel.epub").await;
    let source_bytes = tokio::fs::read(&source).await?;

    let config = KyochoConfig::builder()
        .source_path(source.clone())
        .target_path(test_dirs.target_dir.clone())
        .build()?;

    let report = timeout(TEST_TIMEOUT, config.convert())
        .await
        .expect("Test timed out")?;

    let expected_path = test_dirs.target_dir.join("Bionic_novel.epub");
    assert_eq!(report.output_path, expected_path);
    assert_valid_zip_file(&expected_path).await;

    assert_eq!(report.stats.total_items, 7);
    assert_eq!(report.stats.transformed_items, 2);
    assert_eq!(report.stats.passthrough_items, 5);
    assert!(report.converted_at <= chrono::Utc::now());

    // Archive order and the leading uncompressed mimetype are kept
    assert_eq!(
        zip_member_names(&expected_path).await,
        zip_member_names(&source).await
    );
    assert_eq!(
        zip_member_compression(&expected_path, "mimetype").await,
        CompressionMethod::Stored
    );
    assert_eq!(
        read_zip_member(&expected_path, "mimetype").await,
        b"application/epub+zip"
    );

    let chapter =
        String::from_utf8(read_zip_member(&expected_path, "OEBPS/text/chapter1.xhtml").await)
            .unwrap();
    assert!(chapter.contains("<p><span class=\"bionic\">Hi <b>the</b>re.</span></p>"));

    // The source is untouched and no temporary files remain
    assert_eq!(tokio::fs::read(&source).await?, source_bytes);
    assert!(!has_partial_files(&test_dirs.target_dir));
    Ok(())
}

#[tokio::test]
async fn test_round_trip_preserves_resources_and_words() -> Result<()> {
    let test_dirs = setup_test_dirs("round_trip").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "book.epub").await;

    let report = KyochoConfig::builder()
        .source_path(source.clone())
        .target_path(test_dirs.target_dir.clone())
        .min_word_length(2usize)
        .build()?
        .convert()
        .await?;

    let reopened = Package::open(&report.output_path)?;
    assert_eq!(reopened.get("cover").unwrap().data(), IMAGE_BYTES);
    assert_eq!(reopened.get("css").unwrap().data(), STYLESHEET.as_bytes());
    assert_eq!(
        zip_member_compression(&report.output_path, "OEBPS/images/cover.png").await,
        CompressionMethod::Stored
    );

    let original = Package::open(&source)?;
    let (mut wrappers, mut bolds) = (0, 0);
    for id in ["ch1", "ch2"] {
        let before = std::str::from_utf8(original.get(id).unwrap().data()).unwrap();
        let after = std::str::from_utf8(reopened.get(id).unwrap().data()).unwrap();
        assert_ne!(before, after);
        assert_eq!(word_count(before), word_count(after), "{id}");
        assert_eq!(
            Document::parse(before)?.text_content(),
            Document::parse(after)?.text_content()
        );

        let rewritten = Document::parse(after)?;
        wrappers += rewritten.count_elements("span");
        bolds += rewritten.count_elements("b");
    }
    assert_eq!(wrappers, report.stats.rewrite.text_nodes_rewritten);
    assert_eq!(bolds, report.stats.rewrite.words_emphasized);

    // Package document and container are copied byte for byte
    for member in ["META-INF/container.xml", "OEBPS/content.opf"] {
        assert_eq!(
            read_zip_member(&source, member).await,
            read_zip_member(&report.output_path, member).await
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_content_leaves_no_output() -> Result<()> {
    let test_dirs = setup_test_dirs("invalid_content").await;
    let source = create_epub_with_chapter(
        &test_dirs.source_dir,
        "broken.epub",
        b"<html><body><p>Never closed</body></html>",
    )
    .await;

    let config = KyochoConfig::builder()
        .source_path(source)
        .target_path(test_dirs.target_dir.clone())
        .build()?;
    let output_path = config.output_path()?;

    let result = config.convert().await;
    match result {
        Err(Error::Decode { item, .. }) => assert_eq!(item, "ch1"),
        other => panic!("expected a decode error, got {:?}", other),
    }
    assert!(!output_path.exists());
    assert!(!has_partial_files(&test_dirs.target_dir));
    Ok(())
}

#[tokio::test]
async fn test_failed_save_keeps_existing_file() -> Result<()> {
    let test_dirs = setup_test_dirs("failed_save").await;
    let destination = test_dirs.target_dir.join("taken.epub");
    tokio::fs::write(&destination, b"keep me").await?;

    let package = Package::from_bytes(&common::build_epub(CHAPTER_ONE.as_bytes()))?;
    let result = package.save(&destination, false);

    assert!(matches!(result, Err(Error::AlreadyExists(ref path)) if *path == destination));
    assert_eq!(tokio::fs::read(&destination).await?, b"keep me");
    assert!(!has_partial_files(&test_dirs.target_dir));
    Ok(())
}

#[tokio::test]
async fn test_not_an_epub_is_rejected() -> Result<()> {
    let test_dirs = setup_test_dirs("not_an_epub").await;
    let source = test_dirs.source_dir.join("plain.epub");
    tokio::fs::write(&source, b"this is not a zip archive").await?;

    let result = KyochoConfig::builder()
        .source_path(source)
        .target_path(test_dirs.target_dir.clone())
        .build()?
        .convert()
        .await;
    assert!(matches!(result, Err(Error::Zip(_))));
    Ok(())
}

#[tokio::test]
async fn test_existing_output_requires_overwrite() -> Result<()> {
    let test_dirs = setup_test_dirs("existing_output").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "novel.epub").await;
    let existing = test_dirs.target_dir.join("Bionic_novel.epub");
    tokio::fs::write(&existing, b"previous run").await?;

    let build = |overwrite: bool| {
        KyochoConfig::builder()
            .source_path(source.clone())
            .target_path(test_dirs.target_dir.clone())
            .overwrite_existing(overwrite)
            .build()
    };

    let result = build(false)?.convert().await;
    assert!(matches!(result, Err(Error::AlreadyExists(_))));
    assert_eq!(tokio::fs::read(&existing).await?, b"previous run");

    build(true)?.convert().await?;
    assert_valid_zip_file(&existing).await;
    Ok(())
}

#[tokio::test]
async fn test_output_next_to_source_and_created_directory() -> Result<()> {
    let test_dirs = setup_test_dirs("output_location").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "novel.epub").await;

    // No target path: written next to the source
    let report = KyochoConfig::builder()
        .source_path(source.clone())
        .build()?
        .convert()
        .await?;
    assert_eq!(report.output_path, test_dirs.source_dir.join("Bionic_novel.epub"));
    assert_valid_zip_file(&report.output_path).await;

    // Missing nested target directory is created
    let nested = test_dirs.target_dir.join("a").join("b");
    let report = KyochoConfig::builder()
        .source_path(source)
        .target_path(nested.clone())
        .output_file_name("custom.epub")
        .build()?
        .convert()
        .await?;
    assert_eq!(report.output_path, nested.join("custom.epub"));
    assert_valid_zip_file(&report.output_path).await;
    Ok(())
}

#[tokio::test]
async fn test_second_conversion_is_idempotent() -> Result<()> {
    let test_dirs = setup_test_dirs("idempotent").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "novel.epub").await;

    let first = KyochoConfig::builder()
        .source_path(source)
        .target_path(test_dirs.target_dir.clone())
        .build()?
        .convert()
        .await?;

    let second = KyochoConfig::builder()
        .source_path(first.output_path.clone())
        .target_path(test_dirs.target_dir.clone())
        .build()?
        .convert()
        .await?;

    assert_eq!(second.stats.rewrite, RewriteStats::default());
    for member in ["OEBPS/text/chapter1.xhtml", "OEBPS/text/chapter 2.xhtml"] {
        assert_eq!(
            read_zip_member(&first.output_path, member).await,
            read_zip_member(&second.output_path, member).await
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_parallel_and_sequential_outputs_match() -> Result<()> {
    let test_dirs = setup_test_dirs("parallel_sequential").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "novel.epub").await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let parallel = KyochoConfig::builder()
        .source_path(source.clone())
        .target_path(test_dirs.target_dir.clone())
        .output_file_name("parallel.epub")
        .parallel_items(true)
        .max_threads(4usize)
        .progress_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()?
        .convert()
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 7);

    let sequential = KyochoConfig::builder()
        .source_path(source)
        .target_path(test_dirs.target_dir.clone())
        .output_file_name("sequential.epub")
        .parallel_items(false)
        .build()?
        .convert()
        .await?;

    assert_eq!(parallel.stats, sequential.stats);
    assert_eq!(
        zip_member_names(&parallel.output_path).await,
        zip_member_names(&sequential.output_path).await
    );
    for member in zip_member_names(&parallel.output_path).await {
        assert_eq!(
            read_zip_member(&parallel.output_path, &member).await,
            read_zip_member(&sequential.output_path, &member).await,
            "{member}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_inspect_source() -> Result<()> {
    let test_dirs = setup_test_dirs("inspect_source").await;
    let source = create_fixture_epub(&test_dirs.source_dir, "novel.epub").await;

    let config = KyochoConfig::builder().source_path(source).build()?;
    let report = config.inspect_source().await?;

    assert_eq!(report.package_document, "OEBPS/content.opf");
    assert_eq!(report.items.len(), 7);

    let content: Vec<&str> = report.content_items().map(|i| i.identifier.as_str()).collect();
    assert_eq!(content, vec!["ch1", "ch2"]);

    let class_of = |path: &str| {
        report
            .items
            .iter()
            .find(|i| i.path == path)
            .map(|i| i.class)
            .unwrap()
    };
    assert_eq!(class_of("mimetype"), ItemClass::Unlisted);
    assert_eq!(class_of("META-INF/container.xml"), ItemClass::Unlisted);
    assert_eq!(class_of("OEBPS/content.opf"), ItemClass::Resource);
    assert_eq!(class_of("OEBPS/images/cover.png"), ItemClass::Resource);
    assert_eq!(class_of("OEBPS/text/chapter 2.xhtml"), ItemClass::Content);

    // Nothing was written
    assert!(!test_dirs.source_dir.join("Bionic_novel.epub").exists());
    Ok(())
}

#[tokio::test]
async fn test_convert_from_package() -> Result<()> {
    let test_dirs = setup_test_dirs("from_package").await;
    let package = Package::from_bytes(&common::build_epub(CHAPTER_ONE.as_bytes()))?;

    let report = KyochoConfig::builder()
        .target_path(test_dirs.target_dir.clone())
        .output_file_name("memory.epub")
        .build()?
        .convert_from_package(package)
        .await?;

    assert_eq!(report.output_path, test_dirs.target_dir.join("memory.epub"));
    assert_eq!(report.stats.transformed_items, 2);
    assert_eq!(
        read_zip_member(&report.output_path, "OEBPS/images/cover.png").await,
        IMAGE_BYTES
    );
    Ok(())
}
