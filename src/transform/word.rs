//! Per-word emphasis: decides how much of a word is rendered bold.

use quick_xml::escape::partial_escape;

use crate::types::PrefixPolicy;

/// Settings for emphasizing a single word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordPolicy {
    /// Words with fewer characters than this are left plain.
    pub min_length: usize,
    pub prefix: PrefixPolicy,
}

impl Default for WordPolicy {
    fn default() -> Self {
        Self {
            min_length: 4,
            prefix: PrefixPolicy::HalfPlusOne,
        }
    }
}

/// A word split into its bold prefix and plain remainder.
///
/// `bold` is empty when the word is below the minimum length. Concatenating
/// `bold` and `rest` always gives back the original word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emphasis<'a> {
    pub bold: &'a str,
    pub rest: &'a str,
}

impl<'a> Emphasis<'a> {
    pub fn is_emphasized(&self) -> bool {
        !self.bold.is_empty()
    }

    /// Renders the fragment as escaped markup, e.g. `<b>read</b>ing`.
    pub fn to_markup(&self, bold_tag: &str) -> String {
        let mut out = String::with_capacity(self.bold.len() + self.rest.len() + 2 * bold_tag.len() + 5);
        if self.is_emphasized() {
            out.push('<');
            out.push_str(bold_tag);
            out.push('>');
            out.push_str(&partial_escape(self.bold));
            out.push_str("</");
            out.push_str(bold_tag);
            out.push('>');
        }
        out.push_str(&partial_escape(self.rest));
        out
    }
}

/// Splits `word` according to `policy`.
///
/// Lengths are counted in Unicode scalar values and the split always lands on
/// a character boundary. Total over all inputs: empty strings and pure
/// punctuation are handled like any other word.
pub fn emphasize<'a>(word: &'a str, policy: &WordPolicy) -> Emphasis<'a> {
    let char_count = word.chars().count();
    if char_count == 0 || char_count < policy.min_length {
        return Emphasis {
            bold: "",
            rest: word,
        };
    }

    let prefix_chars = policy.prefix.prefix_len(char_count);
    let split = word
        .char_indices()
        .nth(prefix_chars)
        .map_or(word.len(), |(idx, _)| idx);

    let (bold, rest) = word.split_at(split);
    Emphasis { bold, rest }
}
