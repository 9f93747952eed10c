//! Splits prose into word tokens and the separator runs that follow them.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::types::{DEFAULT_SEPARATOR_CHARS, SeparatorPolicy};

lazy_static! {
    /// Separator regex for [`DEFAULT_SEPARATOR_CHARS`] plus whitespace.
    pub static ref DEFAULT_SEPARATOR_REGEX: Regex =
        separator_regex(DEFAULT_SEPARATOR_CHARS).expect("default separator class is valid");
}

/// Builds the regex matching one run of separators: any of `chars`, or whitespace.
///
/// Every character is matched literally; `.` means a period, not "any character".
pub fn separator_regex(chars: &str) -> Result<Regex> {
    let mut class = String::from(r"[\s");
    for c in chars.chars().filter(|c| !c.is_whitespace()) {
        class.push_str(&regex::escape(&c.to_string()));
    }
    class.push_str("]+");
    Ok(Regex::new(&class)?)
}

/// A word token and the separator emitted after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub word: &'a str,
    pub separator: std::borrow::Cow<'a, str>,
}

/// Text segmenter bound to one separator class and policy.
#[derive(Debug, Clone)]
pub struct Segmenter {
    separators: Regex,
    policy: SeparatorPolicy,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR_REGEX.clone(), SeparatorPolicy::default())
    }
}

impl Segmenter {
    pub fn new(separators: Regex, policy: SeparatorPolicy) -> Self {
        Self { separators, policy }
    }

    /// Splits `text` into segments.
    ///
    /// With [`SeparatorPolicy::Preserve`] the concatenation of every
    /// `word + separator` equals `text`; a leading separator run comes back as
    /// a segment with an empty word.
    ///
    /// With [`SeparatorPolicy::Normalize`] separator runs are dropped and each
    /// token, including the empty tokens produced by leading or trailing
    /// separators, is followed by a single space.
    pub fn segments<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        match self.policy {
            SeparatorPolicy::Preserve => self.preserving(text),
            SeparatorPolicy::Normalize => self
                .separators
                .split(text)
                .map(|word| Segment {
                    word,
                    separator: " ".into(),
                })
                .collect(),
        }
    }

    fn preserving<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut word_start = 0;

        for run in self.separators.find_iter(text) {
            segments.push(Segment {
                word: &text[word_start..run.start()],
                separator: run.as_str().into(),
            });
            word_start = run.end();
        }
        if word_start < text.len() {
            segments.push(Segment {
                word: &text[word_start..],
                separator: "".into(),
            });
        }
        segments
    }
}
