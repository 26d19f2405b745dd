// Labeled tree - elements with attributes and raw text, markup in and out

mod escape;
mod parser;
mod path;

pub use escape::{escape, escape_attribute, escape_lenient, unescape};
pub use parser::parse;

use crate::error::Result;

/// A node in the tree. Text is kept as raw markup (already escaped), so
/// callers decide how entities are produced and consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A named element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// Serialization switches for [`Element::to_xml`].
#[derive(Debug, Clone, Default)]
pub struct XmlOptions {
    pub pretty: bool,
    pub declaration: bool,
    /// Emits an `xml-stylesheet` processing instruction before the root
    pub stylesheet: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Append raw (already escaped) text.
    pub fn with_text(mut self, raw: impl Into<String>) -> Self {
        self.push_text(raw);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, raw: impl Into<String>) {
        let raw = raw.into();
        if !raw.is_empty() {
            self.children.push(Node::Text(raw));
        }
    }

    /// Direct text content, raw.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Replace all direct text with `raw`, keeping child elements.
    pub fn set_text(&mut self, raw: impl Into<String>) {
        self.children.retain(|n| matches!(n, Node::Element(_)));
        let raw = raw.into();
        if !raw.is_empty() {
            self.children.insert(0, Node::Text(raw));
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Path-style selection relative to this element, e.g.
    /// `records/contact[@id='2']` or `records/*[name='Bob']`.
    pub fn select(&self, path: &str) -> Result<Vec<&Element>> {
        let steps = path::parse_path(path)?;
        Ok(path::locate(self, &steps)
            .into_iter()
            .filter_map(|indices| self.descend(&indices))
            .collect())
    }

    pub fn select_first(&self, path: &str) -> Result<Option<&Element>> {
        Ok(self.select(path)?.into_iter().next())
    }

    /// Remove every element matched by `path`. Returns how many were removed.
    pub fn delete(&mut self, path: &str) -> Result<usize> {
        let steps = path::parse_path(path)?;
        let mut matches = path::locate(self, &steps);
        // Later siblings first so earlier indices stay valid
        matches.sort();
        matches.dedup();
        let mut removed = 0;
        for indices in matches.into_iter().rev() {
            if let Some((last, parent_path)) = indices.split_last() {
                if let Some(parent) = self.descend_mut(parent_path) {
                    parent.children.remove(*last);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn descend(&self, indices: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &i in indices {
            current = match current.children.get(i)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    fn descend_mut(&mut self, indices: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &i in indices {
            current = match current.children.get_mut(i)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    pub fn to_xml(&self, options: &XmlOptions) -> String {
        let mut out = String::new();
        if options.declaration {
            out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
            if options.pretty {
                out.push('\n');
            }
        }
        if let Some(href) = &options.stylesheet {
            out.push_str(&format!(
                "<?xml-stylesheet type=\"text/xsl\" href=\"{}\"?>",
                escape_attribute(href)
            ));
            if options.pretty {
                out.push('\n');
            }
        }
        if options.pretty {
            self.write_pretty(&mut out, 0);
        } else {
            self.write_compact(&mut out);
        }
        out
    }

    fn write_open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push_str(&format!(" {k}=\"{}\"", escape_attribute(v)));
        }
    }

    fn write_compact(&self, out: &mut String) {
        self.write_open_tag(out);
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_compact(out),
                Node::Text(t) => out.push_str(t),
            }
        }
        out.push_str(&format!("</{}>", self.name));
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        self.write_open_tag(out);
        if self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }
        out.push('>');
        if self.children.iter().all(|n| matches!(n, Node::Text(_))) {
            out.push_str(&self.text());
            out.push_str(&format!("</{}>\n", self.name));
            return;
        }
        out.push('\n');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_pretty(out, depth + 1),
                Node::Text(t) => {
                    out.push_str(&"  ".repeat(depth + 1));
                    out.push_str(t.trim());
                    out.push('\n');
                }
            }
        }
        out.push_str(&indent);
        out.push_str(&format!("</{}>\n", self.name));
    }
}
