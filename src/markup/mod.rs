//! Owned markup trees for XHTML content documents.
//!
//! Documents are parsed with `quick-xml` into a small tree of [`Node`]s. Every
//! node keeps the exact source text it came from: elements keep their start
//! tag, text keeps its escaped form, and comments, CDATA sections, processing
//! instructions, the XML declaration and the DOCTYPE are kept verbatim. A tree
//! that is serialized without modification reproduces its input byte for byte,
//! so only the text that is actually rewritten changes in the output.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{
    escape, partial_escape, resolve_html5_entity, resolve_predefined_entity, unescape_with,
};
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

pub mod rewriter;

pub use rewriter::Rewriter;

const BOM: char = '\u{FEFF}';

/// One node of a content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
    /// Markup kept as-is: comments, CDATA, processing instructions, declarations.
    Raw(String),
}

impl Node {
    /// Creates a text node from unescaped text.
    pub fn text(plain: &str) -> Self {
        Node::Text(Text::plain(plain))
    }

    /// Decoded text of this node and all of its descendants.
    ///
    /// Entities that cannot be resolved are kept in their escaped form.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => match text.decode() {
                Ok(decoded) => out.push_str(&decoded),
                Err(_) => out.push_str(text.raw()),
            },
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Node::Raw(_) => {}
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&text.raw),
            Node::Raw(raw) => out.push_str(raw),
            Node::Element(element) => element.write_to(out),
        }
    }
}

/// Character data, stored in its escaped source form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    raw: String,
}

impl Text {
    /// Wraps text that is already escaped markup.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Escapes `plain` for use as element content.
    pub fn plain(plain: &str) -> Self {
        Self {
            raw: partial_escape(plain).into_owned(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Resolves character and entity references.
    ///
    /// Besides the five XML entities, every HTML5 named entity (`&nbsp;`,
    /// `&eacute;`, `&euro;`, ...) is understood. Any other name is an error.
    pub fn decode(&self) -> Result<Cow<'_, str>> {
        unescape_with(&self.raw, resolve_entity).map_err(|e| Error::Markup(e.to_string()))
    }
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
}

/// An element with its start tag, kept verbatim, and its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    /// Start tag content between `<` and `>` (without the `/` of an empty tag).
    head: String,
    empty_tag: bool,
    children: Vec<Node>,
}

impl Element {
    /// Creates a new element without attributes.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            head: name.to_string(),
            empty_tag: false,
            children: Vec::new(),
        }
    }

    /// Adds an attribute to a newly created element.
    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.head.push(' ');
        self.head.push_str(key);
        self.head.push_str("=\"");
        self.head.push_str(&escape(value));
        self.head.push('"');
        self
    }

    fn from_start(start: &BytesStart<'_>, empty_tag: bool) -> Result<Self> {
        Ok(Self {
            name: utf8(start.name().as_ref())?.to_string(),
            head: utf8(start)?.to_string(),
            empty_tag,
            children: Vec::new(),
        })
    }

    /// Qualified tag name, e.g. `p` or `html:p`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag name without a namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Namespace prefix of the tag name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.rsplit_once(':').map(|(prefix, _)| prefix)
    }

    /// Whether the local name equals `tag`, ignoring ASCII case.
    pub fn is(&self, tag: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(tag)
    }

    /// Unescaped value of the attribute `key`, if present and well-formed.
    pub fn attribute(&self, key: &str) -> Option<String> {
        let start = BytesStart::from_content(self.head.as_str(), self.name.len());
        start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == key.as_bytes())
            .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
    }

    /// Whether the `class` attribute lists `class_name`.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn append_child(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Detaches all children, leaving the element empty.
    pub fn take_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    pub fn set_children(&mut self, children: Vec<Node>) {
        self.children = children;
    }

    /// Visits this element and every descendant element in document order.
    pub fn for_each_element<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in &self.children {
            if let Node::Element(element) = child {
                element.for_each_element(visit);
            }
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.head);
        if self.empty_tag && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_to(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A parsed content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    bom: bool,
    nodes: Vec<Node>,
}

impl Document {
    /// Parses well-formed markup.
    ///
    /// Fails on reader errors (including mismatched end tags) and on elements
    /// left open at the end of input.
    pub fn parse(source: &str) -> Result<Self> {
        let (bom, body) = match source.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(false);

        let mut open: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Start(e) => {
                    open.push(Element::from_start(&e, false)?);
                    continue;
                }
                Event::End(e) => match open.pop() {
                    Some(element) => Node::Element(element),
                    None => {
                        return Err(Error::Markup(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                },
                Event::Empty(e) => Node::Element(Element::from_start(&e, true)?),
                Event::Text(e) => Node::Text(Text::from_raw(utf8(&e)?)),
                Event::CData(e) => Node::Raw(format!("<![CDATA[{}]]>", utf8(&e)?)),
                Event::Comment(e) => Node::Raw(format!("<!--{}-->", utf8(&e)?)),
                Event::Decl(e) => Node::Raw(format!("<?{}?>", utf8(&e)?)),
                Event::PI(e) => Node::Raw(format!("<?{}?>", utf8(&e)?)),
                Event::DocType(e) => Node::Raw(format!("<!DOCTYPE {}>", utf8(&e)?)),
                Event::Eof => break,
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(element) = open.last() {
            return Err(Error::Markup(format!(
                "element <{}> is never closed",
                element.name
            )));
        }

        Ok(Self { bom, nodes })
    }

    pub fn take_nodes(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.nodes)
    }

    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
    }

    /// Visits every element in document order.
    pub fn for_each_element<'a>(&'a self, mut visit: impl FnMut(&'a Element)) {
        for node in &self.nodes {
            if let Node::Element(element) = node {
                element.for_each_element(&mut visit);
            }
        }
    }

    /// Number of elements whose local name is `tag`.
    pub fn count_elements(&self, tag: &str) -> usize {
        let mut count = 0;
        self.for_each_element(|element| {
            if element.is(tag) {
                count += 1;
            }
        });
        count
    }

    /// Decoded text of the whole document.
    pub fn text_content(&self) -> String {
        self.nodes.iter().map(Node::text_content).collect()
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push(BOM);
        }
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        out
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::Markup(e.to_string()))
}
