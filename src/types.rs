//! Core data types, enums, and reports for the Kyocho library.
//!
//! This module defines the settings enums used by [`KyochoConfig`](crate::KyochoConfig)
//! and the reports returned by the conversion entry points:
//! - Word emphasis policies (`PrefixPolicy`, `SeparatorPolicy`, `InlineScope`)
//! - Item classification (`ItemClass`)
//! - Reporting types (`ConversionReport`, `PackageReport`, `ItemSummary`)

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Media type of EPUB content documents.
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Punctuation that separates words, in addition to whitespace.
pub const DEFAULT_SEPARATOR_CHARS: &str = ".,;:!?-";

/// Output file name prefix applied to the source file name.
pub const DEFAULT_OUTPUT_PREFIX: &str = "Bionic_";

/// How many characters of an eligible word are rendered bold.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefixPolicy {
    /// `floor(len / 2) + 1` characters, slightly more than half.
    #[default]
    HalfPlusOne,
    /// `ceil(len * ratio)` characters, clamped to at least one and at most the word.
    Ratio(f32),
}

impl PrefixPolicy {
    /// Number of leading characters to bold for a word of `char_count` characters.
    pub fn prefix_len(&self, char_count: usize) -> usize {
        if char_count == 0 {
            return 0;
        }
        match *self {
            PrefixPolicy::HalfPlusOne => (char_count / 2 + 1).min(char_count),
            PrefixPolicy::Ratio(ratio) => {
                let len = (char_count as f64 * ratio as f64).ceil() as usize;
                len.clamp(1, char_count)
            }
        }
    }
}

/// What happens to the separator run that follows each word.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeparatorPolicy {
    /// Keep every separator run exactly as it appeared in the source text.
    #[default]
    Preserve,
    /// Emit one space after every token and drop the original separators.
    /// Lossy: punctuation, tabs and repeated spaces are not kept.
    Normalize,
}

/// Which text nodes under an eligible element get rewritten.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InlineScope {
    /// Only text nodes that are direct children of the eligible element.
    /// Text inside nested inline elements (`<em>`, `<a>`, ...) is left alone.
    #[default]
    DirectChildren,
    /// All descendant text nodes, except inside skip tags and already rewritten wrappers.
    Descendants,
}

/// Specifies the intended starting point for a conversion.
/// Used by `KyochoConfig::preflight_check` to tailor validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KyochoExecutionMode {
    /// The conversion reads the package from the configured `source_path`.
    FromSource,
    /// The conversion starts from a [`Package`](crate::container::Package) already in memory.
    FromPackage,
}

/// Classification of one packaged item by the content selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ItemClass {
    /// A content document that will be rewritten.
    Content,
    /// Any other declared media type: images, styles, fonts, navigation, the OPF itself.
    Resource,
    /// An archive member with no declared media type (`mimetype`, `META-INF/*`).
    Unlisted,
    /// A directory entry of the archive.
    Directory,
}

impl ItemClass {
    pub fn is_content(&self) -> bool {
        matches!(self, ItemClass::Content)
    }
}

/// One row of a [`PackageReport`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemSummary {
    pub identifier: String,
    pub path: String,
    pub media_type: Option<String>,
    pub size: usize,
    pub class: ItemClass,
}

/// Classification of every item of a package, produced without writing anything.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageReport {
    /// Archive path of the OPF package document.
    pub package_document: String,
    pub items: Vec<ItemSummary>,
}

impl PackageReport {
    /// Items that a conversion would rewrite.
    pub fn content_items(&self) -> impl Iterator<Item = &ItemSummary> {
        self.items.iter().filter(|item| item.class.is_content())
    }
}

/// Counters gathered while rewriting documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewriteStats {
    /// Text nodes replaced by a bionic fragment.
    pub text_nodes_rewritten: usize,
    /// Words that received a bold prefix.
    pub words_emphasized: usize,
}

impl std::ops::AddAssign for RewriteStats {
    fn add_assign(&mut self, other: Self) {
        self.text_nodes_rewritten += other.text_nodes_rewritten;
        self.words_emphasized += other.words_emphasized;
    }
}

/// Counters for one in-memory package transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageStats {
    pub total_items: usize,
    pub transformed_items: usize,
    pub passthrough_items: usize,
    pub rewrite: RewriteStats,
}

/// Report returned by a completed conversion.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionReport {
    /// Final location of the published package.
    pub output_path: PathBuf,
    pub stats: PackageStats,
    pub converted_at: DateTime<Utc>,
}
