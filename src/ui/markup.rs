//! Tree-markup parser for uiautomator hierarchy dumps: a single root element
//! containing nested `node` elements with named string attributes. The
//! walker scans bytes directly and emits elements in document order, which
//! later first-match queries depend on. Parsing is all-or-nothing: malformed
//! markup yields an error, never a partial element list.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One on-screen element, flattened to its named string attributes. Missing
/// attributes are stored as empty strings so lookups never fail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiElement {
    pub attrs: HashMap<String, String>,
}

impl UiElement {
    pub fn attr(&self, name: &str) -> &str {
        self.attrs.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn resource_id(&self) -> &str {
        self.attr("resource-id")
    }

    pub fn text(&self) -> &str {
        self.attr("text")
    }

    pub fn class_name(&self) -> &str {
        self.attr("class")
    }

    pub fn package(&self) -> &str {
        self.attr("package")
    }

    pub fn content_desc(&self) -> &str {
        self.attr("content-desc")
    }

    /// Identifier OR visible text, checked together per element.
    pub fn matches_key(&self, key: &str) -> bool {
        self.resource_id() == key || self.text() == key
    }

    pub fn bounds(&self) -> Option<ElementBounds> {
        parse_bounds(self.attr("bounds"))
    }
}

/// Bounding rectangle in screen pixels, as `[left,top][right,bottom]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ElementBounds {
    /// Tap point for this element.
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

pub fn parse_bounds(value: &str) -> Option<ElementBounds> {
    let pattern = Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").ok()?;
    let caps = pattern.captures(value.trim())?;
    Some(ElementBounds {
        left: caps[1].parse().ok()?,
        top: caps[2].parse().ok()?,
        right: caps[3].parse().ok()?,
        bottom: caps[4].parse().ok()?,
    })
}

fn unescape_markup(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            result.push_str(rest);
            return result;
        };
        let entity = &rest[1..semi];
        match entity {
            "amp" => result.push('&'),
            "lt" => result.push('<'),
            "gt" => result.push('>'),
            "quot" => result.push('"'),
            "apos" => result.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
                match code.and_then(char::from_u32) {
                    Some(ch) => result.push(ch),
                    None => result.push_str(&rest[..=semi]),
                }
            }
        }
        rest = &rest[semi + 1..];
    }
    result.push_str(rest);
    result
}

/// Walk the markup and collect every `node` element's requested attributes,
/// in pre-order. Elements other than `node` (the root container among them)
/// contribute structure but no output record. Zero `node` elements is a
/// valid, empty result.
pub fn parse_ui_elements(xml: &str, attributes: &[String]) -> Result<Vec<UiElement>, String> {
    let bytes = xml.as_bytes();
    let mut index: usize = 0;
    let mut depth: usize = 0;
    let mut elements: Vec<UiElement> = Vec::new();

    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        if index + 1 >= bytes.len() {
            return Err("Truncated markup".into());
        }
        match bytes[index + 1] {
            b'/' => {
                index += 2;
                while index < bytes.len() && bytes[index] != b'>' {
                    index += 1;
                }
                if index >= bytes.len() {
                    return Err("Unterminated closing tag".into());
                }
                index += 1;
                if depth == 0 {
                    return Err("Unexpected closing tag".into());
                }
                depth -= 1;
            }
            b'!' => {
                index += 2;
                while index + 2 < bytes.len()
                    && !(bytes[index] == b'-'
                        && bytes[index + 1] == b'-'
                        && bytes[index + 2] == b'>')
                {
                    index += 1;
                }
                index = (index + 3).min(bytes.len());
            }
            b'?' => {
                index += 2;
                while index + 1 < bytes.len() && !(bytes[index] == b'?' && bytes[index + 1] == b'>')
                {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            _ => {
                let start = index + 1;
                let mut cursor = start;
                while cursor < bytes.len() {
                    let ch = bytes[cursor];
                    if ch == b'/' || ch == b'>' || ch.is_ascii_whitespace() {
                        break;
                    }
                    cursor += 1;
                }
                if cursor >= bytes.len() {
                    return Err("Malformed tag".into());
                }
                let tag_name = &xml[start..cursor];

                let mut attrs: Vec<(String, String)> = Vec::new();
                let mut self_closing = false;
                let mut attr_cursor = cursor;
                loop {
                    while attr_cursor < bytes.len() && bytes[attr_cursor].is_ascii_whitespace() {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Unterminated tag".into());
                    }
                    let ch = bytes[attr_cursor];
                    if ch == b'>' {
                        attr_cursor += 1;
                        break;
                    }
                    if ch == b'/' {
                        self_closing = true;
                        attr_cursor += 1;
                        if attr_cursor >= bytes.len() || bytes[attr_cursor] != b'>' {
                            return Err("Malformed self-closing tag".into());
                        }
                        attr_cursor += 1;
                        break;
                    }

                    let name_start = attr_cursor;
                    while attr_cursor < bytes.len()
                        && bytes[attr_cursor] != b'='
                        && !bytes[attr_cursor].is_ascii_whitespace()
                    {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Malformed attribute".into());
                    }
                    let name_end = attr_cursor;
                    while attr_cursor < bytes.len() && bytes[attr_cursor].is_ascii_whitespace() {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() || bytes[attr_cursor] != b'=' {
                        return Err("Malformed attribute assignment".into());
                    }
                    attr_cursor += 1;
                    while attr_cursor < bytes.len() && bytes[attr_cursor].is_ascii_whitespace() {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Missing attribute value".into());
                    }
                    let quote = bytes[attr_cursor];
                    if quote != b'"' && quote != b'\'' {
                        return Err("Attribute value must be quoted".into());
                    }
                    attr_cursor += 1;
                    let value_start = attr_cursor;
                    while attr_cursor < bytes.len() && bytes[attr_cursor] != quote {
                        attr_cursor += 1;
                    }
                    if attr_cursor >= bytes.len() {
                        return Err("Unterminated attribute value".into());
                    }
                    let name = &xml[name_start..name_end];
                    let value = &xml[value_start..attr_cursor];
                    attrs.push((name.to_string(), unescape_markup(value)));
                    attr_cursor += 1;
                }
                index = attr_cursor;

                if tag_name == "node" {
                    let mut element_attrs = HashMap::with_capacity(attributes.len());
                    for wanted in attributes {
                        let value = attrs
                            .iter()
                            .find(|(name, _)| name == wanted)
                            .map(|(_, value)| value.clone())
                            .unwrap_or_default();
                        element_attrs.insert(wanted.clone(), value);
                    }
                    elements.push(UiElement {
                        attrs: element_attrs,
                    });
                }

                if !self_closing {
                    depth += 1;
                }
            }
        }
    }

    if depth != 0 {
        return Err("Unclosed element".into());
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_ui_attributes;

    #[test]
    fn collects_nodes_in_document_order() {
        let xml = r#"<?xml version='1.0' encoding='UTF-8'?>
<hierarchy rotation="0">
  <node resource-id="root" text="" class="android.widget.FrameLayout" package="com.example" content-desc="" bounds="[0,0][1080,1920]">
    <node resource-id="" text="First" class="android.widget.TextView" package="com.example" content-desc="" bounds="[0,0][1080,100]"/>
    <node resource-id="second" text="" class="android.widget.Button" package="com.example" content-desc="tap me" bounds="[0,100][1080,200]"/>
  </node>
</hierarchy>"#;
        let elements = parse_ui_elements(xml, &default_ui_attributes()).expect("parse");
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].resource_id(), "root");
        assert_eq!(elements[1].text(), "First");
        assert_eq!(elements[2].content_desc(), "tap me");
    }

    #[test]
    fn zero_node_markup_is_an_empty_snapshot_not_an_error() {
        let xml = "<?xml version='1.0'?><hierarchy rotation=\"0\"></hierarchy>";
        let elements = parse_ui_elements(xml, &default_ui_attributes()).expect("parse");
        assert!(elements.is_empty());
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let first = parse_ui_elements(
            "<hierarchy><node text=\"a\" resource-id=\"b\"/></hierarchy>",
            &default_ui_attributes(),
        )
        .expect("parse");
        let second = parse_ui_elements(
            "<hierarchy><node resource-id=\"b\" text=\"a\"/></hierarchy>",
            &default_ui_attributes(),
        )
        .expect("parse");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_attributes_default_to_empty() {
        let elements = parse_ui_elements(
            "<hierarchy><node text=\"only text\"/></hierarchy>",
            &default_ui_attributes(),
        )
        .expect("parse");
        assert_eq!(elements[0].resource_id(), "");
        assert_eq!(elements[0].text(), "only text");
        assert_eq!(elements[0].bounds(), None);
    }

    #[test]
    fn malformed_markup_is_rejected_wholesale() {
        assert!(parse_ui_elements("<hierarchy><node text=broken/></hierarchy>", &default_ui_attributes()).is_err());
        assert!(parse_ui_elements("<hierarchy><node text=\"unterminated></hierarchy>", &default_ui_attributes()).is_err());
        assert!(parse_ui_elements("<hierarchy><node text=\"a\">", &default_ui_attributes()).is_err());
        assert!(parse_ui_elements("</hierarchy>", &default_ui_attributes()).is_err());
    }

    #[test]
    fn unescapes_entities_in_attribute_values() {
        let elements = parse_ui_elements(
            "<hierarchy><node text=\"Tom &amp; Jerry &lt;3 &#65;\"/></hierarchy>",
            &default_ui_attributes(),
        )
        .expect("parse");
        assert_eq!(elements[0].text(), "Tom & Jerry <3 A");
    }

    #[test]
    fn parses_bounds_rectangles() {
        let bounds = parse_bounds("[10,20][110,220]").expect("bounds");
        assert_eq!(bounds.left, 10);
        assert_eq!(bounds.bottom, 220);
        assert_eq!(bounds.center(), (60, 120));
        assert_eq!(parse_bounds("not bounds"), None);
        assert_eq!(parse_bounds(""), None);
    }
}
