//! Text-level building blocks of the bionic transform.
//!
//! [`segment`] cuts prose into words and separators, [`word`] decides the bold
//! prefix of each word. Neither touches markup; the
//! [`Rewriter`](crate::markup::Rewriter) stitches them into document trees.

pub mod segment;
pub mod word;

pub use segment::{DEFAULT_SEPARATOR_REGEX, Segment, Segmenter, separator_regex};
pub use word::{Emphasis, WordPolicy, emphasize};
