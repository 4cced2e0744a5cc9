use crate::error::{Yt2SrtError, Yt2SrtResult};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// A single element pulled out of a caption document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    attributes: HashMap<String, String>,
    text: Option<String>,
}

impl Element {
    /// Attribute value with XML escapes already decoded
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Text preceding the first child node, `None` when there is none
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// Scanner that collects every element with a given tag name, in document order.
///
/// The whole document is tokenized and checked for well-formedness: a single
/// root element, properly nested start and end tags, nothing but whitespace,
/// comments and processing instructions outside the root. Entity references
/// are resolved and undefined ones are rejected. CDATA sections contribute
/// their content verbatim.
pub struct ElementScanner {
    tag: String,
    name_regex: Regex,
    attribute_regex: Regex,
}

/// An element whose end tag has not been seen yet
struct OpenElement<'a> {
    name: &'a str,
    /// Index of the collected element still gathering its leading text
    collecting: Option<usize>,
}

impl ElementScanner {
    pub fn new(tag: &str) -> Self {
        let name_regex = Regex::new(r"^[A-Za-z_:][\w:.\-]*$").expect("Valid name regex");
        let attribute_regex =
            Regex::new(r#"(?P<name>[^\s=/]+)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
                .expect("Valid attribute regex");

        Self {
            tag: tag.to_string(),
            name_regex,
            attribute_regex,
        }
    }

    /// Collect every matching element of `document`
    pub fn scan(&self, document: &str) -> Yt2SrtResult<Vec<Element>> {
        let content = document
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<OpenElement> = Vec::new();
        let mut root_seen = false;
        let mut rest = content.as_str();

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("<!--") {
                let end = after.find("-->").ok_or_else(|| unterminated("comment"))?;
                rest = &after[end + 3..];
            } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
                let end = after.find("]]>").ok_or_else(|| unterminated("CDATA section"))?;
                let Some(current) = open.last() else {
                    return Err(Yt2SrtError::format("CDATA section outside the root element"));
                };
                if let Some(index) = current.collecting {
                    append_text(&mut elements[index], &after[..end]);
                }
                rest = &after[end + 3..];
            } else if let Some(after) = rest.strip_prefix("<?") {
                let end = after.find("?>").ok_or_else(|| unterminated("processing instruction"))?;
                rest = &after[end + 2..];
            } else if let Some(after) = rest.strip_prefix("<!DOCTYPE") {
                if root_seen {
                    return Err(Yt2SrtError::format("DOCTYPE after the root element"));
                }
                let end = after.find('>').ok_or_else(|| unterminated("DOCTYPE"))?;
                rest = &after[end + 1..];
            } else if let Some(after) = rest.strip_prefix("</") {
                let end = after.find('>').ok_or_else(|| unterminated("end tag"))?;
                let name = after[..end].trim_end();

                match open.pop() {
                    Some(element) if element.name == name => {}
                    Some(element) => {
                        return Err(Yt2SrtError::format(format!(
                            "mismatched tag: expected </{}>, found </{}>",
                            element.name, name
                        )));
                    }
                    None => {
                        return Err(Yt2SrtError::format(format!("unexpected end tag </{name}>")));
                    }
                }
                rest = &after[end + 1..];
            } else if rest.starts_with('<') {
                let end = tag_end(rest)?;
                let inner = &rest[1..end];
                let (inner, empty) = match inner.strip_suffix('/') {
                    Some(inner) => (inner, true),
                    None => (inner, false),
                };

                let name_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
                let (name, attrs) = inner.split_at(name_end);
                if !self.name_regex.is_match(name) {
                    return Err(Yt2SrtError::format(format!("invalid element name {name:?}")));
                }

                if open.is_empty() {
                    if root_seen {
                        return Err(Yt2SrtError::format("junk after document element"));
                    }
                    root_seen = true;
                }

                // Text after a child element is not part of the parent's text
                if let Some(parent) = open.last_mut() {
                    parent.collecting = None;
                }

                let attributes = self.parse_attributes(attrs)?;
                let collecting = if name == self.tag {
                    elements.push(Element {
                        attributes,
                        text: None,
                    });
                    Some(elements.len() - 1)
                } else {
                    None
                };

                if !empty {
                    open.push(OpenElement { name, collecting });
                }
                rest = &rest[end + 1..];
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];

                match open.last() {
                    Some(current) => {
                        let decoded = decode_entities(raw)?;
                        if let Some(index) = current.collecting {
                            append_text(&mut elements[index], &decoded);
                        }
                    }
                    None if raw.trim().is_empty() => {}
                    None if root_seen => {
                        return Err(Yt2SrtError::format("junk after document element"));
                    }
                    None => return Err(Yt2SrtError::format("text before the root element")),
                }
                rest = &rest[end..];
            }
        }

        if let Some(element) = open.last() {
            return Err(Yt2SrtError::format(format!("unclosed <{}> element", element.name)));
        }
        if !root_seen {
            return Err(Yt2SrtError::format("no root element found"));
        }

        debug!("Found {} <{}> elements", elements.len(), self.tag);
        Ok(elements)
    }

    fn parse_attributes(&self, raw: &str) -> Yt2SrtResult<HashMap<String, String>> {
        let mut attributes = HashMap::new();
        let mut consumed = 0;

        for captures in self.attribute_regex.captures_iter(raw) {
            let span = captures.get(0).map_or(consumed..consumed, |m| m.range());
            if !raw[consumed..span.start].trim().is_empty() {
                return Err(malformed_attributes(raw));
            }
            consumed = span.end;

            let value = captures
                .name("dq")
                .or_else(|| captures.name("sq"))
                .map_or("", |m| m.as_str());
            let name = captures["name"].to_string();
            if attributes.insert(name, decode_entities(value)?).is_some() {
                return Err(Yt2SrtError::format(format!(
                    "duplicate attribute {:?}",
                    &captures["name"]
                )));
            }
        }

        if !raw[consumed..].trim().is_empty() {
            return Err(malformed_attributes(raw));
        }

        Ok(attributes)
    }
}

/// Position of the `>` closing the tag that starts `tag`, skipping quoted values
fn tag_end(tag: &str) -> Yt2SrtResult<usize> {
    let mut quote = None;

    for (index, byte) in tag.bytes().enumerate().skip(1) {
        match (quote, byte) {
            (Some(open), _) if open == byte => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(byte),
            (None, b'>') => return Ok(index),
            (None, b'<') => return Err(Yt2SrtError::format("'<' inside a tag")),
            _ => {}
        }
    }

    Err(unterminated("tag"))
}

fn append_text(element: &mut Element, text: &str) {
    if !text.is_empty() {
        element.text.get_or_insert_with(String::new).push_str(text);
    }
}

fn unterminated(what: &str) -> Yt2SrtError {
    Yt2SrtError::format(format!("unterminated {what}"))
}

fn malformed_attributes(raw: &str) -> Yt2SrtError {
    Yt2SrtError::format(format!("malformed attributes {:?}", raw.trim()))
}

/// Resolve the predefined XML entities and numeric character references
pub fn decode_entities(raw: &str) -> Yt2SrtResult<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);

        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or_else(|| {
            Yt2SrtError::format(format!("unterminated entity reference in {raw:?}"))
        })?;

        decoded.push(resolve_entity(&after[..semi])?);
        rest = &after[semi + 1..];
    }

    decoded.push_str(rest);
    Ok(decoded)
}

fn resolve_entity(name: &str) -> Yt2SrtResult<char> {
    let resolved = match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name.strip_prefix('#').and_then(|code| {
            match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            }
            .and_then(char::from_u32)
        }),
    };

    resolved.ok_or_else(|| Yt2SrtError::format(format!("undefined entity &{name};")))
}
