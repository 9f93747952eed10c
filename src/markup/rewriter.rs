//! Rewrites the prose of a [`Document`] into bionic fragments.
//!
//! The tree is rebuilt rather than edited while it is being walked: each
//! element's children are detached, rewritten into a new vector and put back.

use crate::error::Result;
use crate::markup::{Document, Element, Node, Text};
use crate::transform::{Segmenter, WordPolicy, emphasize};
use crate::types::{InlineScope, RewriteStats};

/// Where a node sits relative to the nearest eligible element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Not under an eligible element; text is left alone.
    Outside,
    /// Direct text children are rewritten.
    Eligible,
}

/// Document mutator replacing eligible text nodes with bionic fragments.
#[derive(Debug, Clone)]
pub struct Rewriter {
    pub(crate) words: WordPolicy,
    pub(crate) segmenter: Segmenter,
    pub(crate) eligible_tags: Vec<String>,
    pub(crate) skip_tags: Vec<String>,
    pub(crate) inline_scope: InlineScope,
    pub(crate) bold_tag: String,
    pub(crate) wrapper_tag: String,
    pub(crate) wrapper_class: Option<String>,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self {
            words: WordPolicy::default(),
            segmenter: Segmenter::default(),
            eligible_tags: vec!["p".to_string()],
            skip_tags: default_skip_tags(),
            inline_scope: InlineScope::DirectChildren,
            bold_tag: "b".to_string(),
            wrapper_tag: "span".to_string(),
            wrapper_class: Some("bionic".to_string()),
        }
    }
}

pub(crate) fn default_skip_tags() -> Vec<String> {
    ["script", "style", "code", "pre", "svg", "math"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl Rewriter {
    /// Rewrites markup text, returning the new markup and what changed.
    pub fn rewrite_str(&self, source: &str) -> Result<(String, RewriteStats)> {
        let mut document = Document::parse(source)?;
        let stats = self.rewrite(&mut document)?;
        Ok((document.serialize(), stats))
    }

    /// Rewrites every eligible text node of `document`.
    ///
    /// Element order, attributes, comments and all text outside eligible
    /// elements are kept unchanged.
    pub fn rewrite(&self, document: &mut Document) -> Result<RewriteStats> {
        let mut stats = RewriteStats::default();
        let nodes = self.rewrite_nodes(document.take_nodes(), Scope::Outside, None, &mut stats)?;
        document.set_nodes(nodes);
        Ok(stats)
    }

    /// `prefix` is the namespace prefix of the nearest eligible element, used
    /// for the elements created inside it.
    fn rewrite_nodes(
        &self,
        nodes: Vec<Node>,
        scope: Scope,
        prefix: Option<&str>,
        stats: &mut RewriteStats,
    ) -> Result<Vec<Node>> {
        let mut rewritten = Vec::with_capacity(nodes.len());
        for node in nodes {
            rewritten.push(match node {
                Node::Element(element) => {
                    Node::Element(self.rewrite_element(element, scope, prefix, stats)?)
                }
                Node::Text(text) if scope == Scope::Eligible => {
                    self.rewrite_text(text, prefix, stats)?
                }
                other => other,
            });
        }
        Ok(rewritten)
    }

    fn rewrite_element(
        &self,
        mut element: Element,
        scope: Scope,
        prefix: Option<&str>,
        stats: &mut RewriteStats,
    ) -> Result<Element> {
        if self.is_wrapper(&element) {
            return Ok(element);
        }

        let eligible = self.is_eligible(&element);
        let own_prefix = element.prefix().map(str::to_string);
        let child_prefix = if eligible { own_prefix.as_deref() } else { prefix };

        let child_scope = if eligible {
            Scope::Eligible
        } else {
            match (scope, self.inline_scope) {
                (Scope::Outside, _) | (Scope::Eligible, InlineScope::DirectChildren) => Scope::Outside,
                (Scope::Eligible, InlineScope::Descendants) => {
                    if self.is_skipped(&element) {
                        return Ok(element);
                    }
                    Scope::Eligible
                }
            }
        };

        let children =
            self.rewrite_nodes(element.take_children(), child_scope, child_prefix, stats)?;
        element.set_children(children);
        Ok(element)
    }

    /// Replaces one text node with a wrapper holding its bionic fragment.
    /// Whitespace-only text is returned untouched.
    fn rewrite_text(
        &self,
        text: Text,
        prefix: Option<&str>,
        stats: &mut RewriteStats,
    ) -> Result<Node> {
        let decoded = text.decode()?;
        if decoded.trim().is_empty() {
            return Ok(Node::Text(text));
        }

        let mut wrapper = Element::new(&qualified(prefix, &self.wrapper_tag));
        if let Some(class) = &self.wrapper_class {
            wrapper = wrapper.with_attribute("class", class);
        }

        let mut pending = String::new();
        for segment in self.segmenter.segments(&decoded) {
            let emphasis = emphasize(segment.word, &self.words);
            if emphasis.is_emphasized() {
                if !pending.is_empty() {
                    wrapper.append_child(Node::text(&pending));
                    pending.clear();
                }
                let mut bold = Element::new(&qualified(prefix, &self.bold_tag));
                bold.append_child(Node::text(emphasis.bold));
                wrapper.append_child(Node::Element(bold));
                stats.words_emphasized += 1;
            }
            pending.push_str(emphasis.rest);
            pending.push_str(&segment.separator);
        }
        if !pending.is_empty() {
            wrapper.append_child(Node::text(&pending));
        }

        stats.text_nodes_rewritten += 1;
        Ok(Node::Element(wrapper))
    }

    fn is_eligible(&self, element: &Element) -> bool {
        self.eligible_tags.iter().any(|tag| element.is(tag))
    }

    fn is_skipped(&self, element: &Element) -> bool {
        self.skip_tags.iter().any(|tag| element.is(tag))
    }

    /// Wrappers produced by an earlier pass are never entered again.
    fn is_wrapper(&self, element: &Element) -> bool {
        match &self.wrapper_class {
            Some(class) => element.is(&self.wrapper_tag) && element.has_class(class),
            None => false,
        }
    }
}

/// `tag` in the namespace of `prefix`, e.g. `html:span`.
fn qualified(prefix: Option<&str>, tag: &str) -> String {
    match prefix {
        Some(prefix) if !tag.contains(':') => format!("{}:{}", prefix, tag),
        _ => tag.to_string(),
    }
}
