//! Decides which packaged items are content documents.

use crate::container::Item;
use crate::types::{ItemClass, XHTML_MEDIA_TYPE};

/// Classifies items by declared media type.
///
/// This is the only gate between the rewriter and the package: anything it
/// does not classify as [`ItemClass::Content`] is copied through untouched.
#[derive(Debug, Clone)]
pub struct ContentSelector {
    media_types: Vec<String>,
}

impl Default for ContentSelector {
    fn default() -> Self {
        Self::new([XHTML_MEDIA_TYPE])
    }
}

impl ContentSelector {
    pub fn new<I, S>(media_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            media_types: media_types
                .into_iter()
                .map(|m| essence(m.as_ref()))
                .collect(),
        }
    }

    pub fn classify(&self, item: &Item) -> ItemClass {
        if item.is_dir() {
            return ItemClass::Directory;
        }
        match item.media_type() {
            None => ItemClass::Unlisted,
            Some(media_type) => {
                let media_type = essence(media_type);
                if self.media_types.iter().any(|m| *m == media_type) {
                    ItemClass::Content
                } else {
                    ItemClass::Resource
                }
            }
        }
    }

    pub fn is_transformable(&self, item: &Item) -> bool {
        self.classify(item).is_content()
    }
}

/// Media type without parameters, lowercased: `Application/XHTML+XML; charset=utf-8`
/// becomes `application/xhtml+xml`.
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
