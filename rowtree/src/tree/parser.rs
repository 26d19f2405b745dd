use super::{escape, unescape, Element, Node};
use crate::error::{Result, RowTreeError};

/// Parse a markup document into its root element. The declaration,
/// processing instructions, comments and doctype are skipped; CDATA becomes
/// escaped text; whitespace-only text between elements is dropped.
pub fn parse(markup: &str) -> Result<Element> {
    let mut p = Parser { src: markup, pos: 0 };
    p.skip_misc()?;
    if !p.rest().starts_with('<') {
        return Err(p.error("expected a root element"));
    }
    let root = p.element()?;
    p.skip_misc()?;
    if !p.rest().is_empty() {
        return Err(p.error("content after the root element"));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, msg: &str) -> RowTreeError {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        RowTreeError::Markup(format!("{msg} (line {line})"))
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Advance past the next occurrence of `end`.
    fn skip_past(&mut self, end: &str) -> Result<&'a str> {
        let rest = self.rest();
        match rest.find(end) {
            Some(i) => {
                self.pos += i + end.len();
                Ok(&rest[..i])
            }
            None => Err(self.error(&format!("unterminated construct, missing '{end}'"))),
        }
    }

    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<!DOCTYPE") || rest.starts_with("<!doctype") {
                self.skip_past(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<String> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<'))
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn element(&mut self) -> Result<Element> {
        // Caller has checked for '<'
        self.pos += 1;
        let mut element = Element::new(self.name()?);

        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.is_empty() {
                return Err(self.error("unexpected end of input in a tag"));
            }
            let attr = self.name()?;
            self.skip_ws();
            if !self.rest().starts_with('=') {
                return Err(self.error(&format!("attribute '{attr}' has no value")));
            }
            self.pos += 1;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error(&format!("attribute '{attr}' is not quoted"))),
            };
            self.pos += 1;
            let raw = self.skip_past(&quote.to_string())?;
            element.attributes.push((attr, unescape(raw)));
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(&format!("element '{}' is not closed", element.name)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let name = self.name()?;
                if name != element.name {
                    return Err(self.error(&format!(
                        "closing tag '{name}' does not match '{}'",
                        element.name
                    )));
                }
                self.skip_ws();
                if !self.rest().starts_with('>') {
                    return Err(self.error("malformed closing tag"));
                }
                self.pos += 1;
                return Ok(element);
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let data = self.skip_past("]]>")?;
                element.push_text(escape(data));
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                element.push(child);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = &rest[..end];
                self.pos += end;
                if !text.trim().is_empty() {
                    element.children.push(Node::Text(text.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prolog_and_cdata() {
        let doc = parse(
            "<?xml version='1.0'?>\n<!-- note -->\n<a x='1'>\n  <b><![CDATA[1 < 2]]></b>\n  <c/>\n</a>\n",
        )
        .unwrap();
        assert_eq!(doc.name, "a");
        assert_eq!(doc.attr("x"), Some("1"));
        assert_eq!(doc.child("b").unwrap().text(), "1 &lt; 2");
        assert_eq!(doc.elements().count(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("<a><b></a>"), Err(RowTreeError::Markup(_))));
        assert!(matches!(parse("<a>"), Err(RowTreeError::Markup(_))));
        assert!(matches!(parse("plain text"), Err(RowTreeError::Markup(_))));
        assert!(matches!(parse("<a b=1/>"), Err(RowTreeError::Markup(_))));
        assert!(matches!(parse("<a/><b/>"), Err(RowTreeError::Markup(_))));
    }
}
