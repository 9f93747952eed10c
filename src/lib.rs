//! Kyocho - Bionic Reading Conversion for EPUB
//!
//! This crate rewrites the prose of an EPUB so that the leading part of every
//! word is rendered bold, guiding the eye through the text. Everything that is
//! not prose (images, styles, fonts, navigation, metadata) is copied into the
//! output package byte for byte.
//!
//! # Getting Started
//!
//! Configure a conversion with the `KyochoConfig` builder, then run it with
//! [`convert`](KyochoConfig::convert).
//!
//! ```rust,no_run
//! use kyocho::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> kyocho::error::Result<()> {
//!     let config = KyochoConfig::builder()
//!         .source_path(PathBuf::from("./library/novel.epub"))
//!         .target_path(PathBuf::from("./converted"))
//!         .min_word_length(2usize)
//!         .separator_policy(SeparatorPolicy::Preserve)
//!         .progress_callback(|fraction| println!("{:.0}%", fraction * 100.0))
//!         .build()?;
//!
//!     // Optional: fail early on a bad source or an existing output
//!     config.preflight_check(KyochoExecutionMode::FromSource)?;
//!
//!     let report = config.convert().await?;
//!     println!(
//!         "Wrote {:?} ({} words emphasized)",
//!         report.output_path, report.stats.rewrite.words_emphasized
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! The building blocks are public as well: [`transform`] holds the word and
//! segment rules, [`markup`] the document tree and rewriter, and [`container`]
//! the EPUB reader and writer.

pub mod container;
pub mod error;
pub mod kyocho;
pub mod markup;
pub mod path_utils;
pub mod transform;
pub mod types;

// Publicly expose the main `KyochoConfig` struct and its builder
pub use kyocho::KyochoConfig;
pub use kyocho::KyochoConfigBuilder;
pub use kyocho::ProgressCallback;

// Re-export error and core types for direct access
pub use types::{
    ConversionReport, InlineScope, ItemClass, ItemSummary, KyochoExecutionMode, PackageReport,
    PackageStats, PrefixPolicy, RewriteStats, SeparatorPolicy,
};

/// Prelude module for convenient imports.
///
/// Brings the configuration, its enums and the report types into scope with a
/// single `use kyocho::prelude::*;`.
pub mod prelude {
    pub use super::{
        ConversionReport, InlineScope, ItemClass, ItemSummary, KyochoConfig, KyochoConfigBuilder,
        KyochoExecutionMode, PackageReport, PackageStats, PrefixPolicy, ProgressCallback,
        RewriteStats, SeparatorPolicy, error, types,
    };
    pub use crate::container::{ContentSelector, Item, Package};
    pub use crate::markup::{Document, Rewriter};
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
