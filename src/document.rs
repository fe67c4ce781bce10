//! Minimal XML document tree returned by the executor.
//!
//! Resource mapping code works on these trees rather than on raw bodies.
//! Only local names are kept; namespace prefixes are dropped on both
//! elements and attributes.

use std::fmt;
use std::str;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::error::EcloudError;

/// A single XML element.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Creates an element with no attributes, text or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Local name of the element.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content, concatenated across text and CDATA nodes and trimmed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute value by local name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children in document order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// First direct child called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Direct children called `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of the first direct child called `name`, when that child exists.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Self::text)
    }

    /// Every element called `name` in this subtree, this element included,
    /// in document order.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&Self> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Self>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect_named(name, found);
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, EcloudError> {
        let mut element = Self::new(utf8(start.local_name().as_ref())?);
        for attribute in start.attributes() {
            let attr = attribute.map_err(quick_xml::Error::from)?;
            let key = utf8(attr.key.local_name().as_ref())?;
            let value = attr
                .unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{}\"", escape(value.as_str()))?;
        }
        if self.text.is_empty() && self.children.is_empty() {
            return f.write_str("/>");
        }
        write!(f, ">{}", escape(self.text.as_str()))?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.name)
    }
}

/// Parsed response body. A `204 No Content` answer becomes an empty
/// document, which is valid and has no root.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Document {
    root: Option<Element>,
}

impl Document {
    /// A document without a root element.
    #[must_use]
    pub const fn empty() -> Self {
        Self { root: None }
    }

    /// Wraps an existing element tree.
    #[must_use]
    pub const fn from_root(root: Element) -> Self {
        Self { root: Some(root) }
    }

    /// Parses an XML body. Blank bodies produce an empty document.
    ///
    /// # Errors
    ///
    /// Returns [`EcloudError::Protocol`] when the body is not well-formed
    /// XML or holds more than one root element.
    pub fn parse(body: &str) -> Result<Self, EcloudError> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut open: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        loop {
            match reader.read_event()? {
                Event::Start(start) => open.push(Element::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    attach(&mut open, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = open.pop().ok_or_else(|| {
                        EcloudError::Protocol(String::from("unbalanced closing tag"))
                    })?;
                    attach(&mut open, &mut root, element)?;
                }
                Event::Text(text) => {
                    let unescaped = text.unescape().map_err(quick_xml::Error::from)?;
                    text_in(&mut open, &unescaped)?;
                }
                Event::CData(data) => text_in(&mut open, utf8(&data)?.trim())?,
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(EcloudError::Protocol(format!(
                "unclosed element <{}>",
                unclosed.name
            )));
        }
        Ok(Self { root })
    }

    /// Whether the document has no root element.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Root element, if any.
    #[must_use]
    pub const fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Every element called `name`, root included, in document order.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        self.root
            .as_ref()
            .map_or_else(Vec::new, |root| root.descendants(name))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{root}"),
            None => Ok(()),
        }
    }
}

fn attach(
    open: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), EcloudError> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(EcloudError::Protocol(format!(
            "unexpected second root element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

/// Appends character data to the innermost open element. Non-blank text
/// outside the root means the body is not an XML document.
fn text_in(open: &mut [Element], text: &str) -> Result<(), EcloudError> {
    match open.last_mut() {
        Some(current) => current.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => {
            return Err(EcloudError::Protocol(String::from(
                "text outside the root element",
            )));
        }
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<String, EcloudError> {
    str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|err| EcloudError::Protocol(format!("invalid UTF-8 in XML: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TASK_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<VirtualMachine href="/cloudapi/ecloud/virtualMachines/7" name="web-01"
    xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
  <Tasks>
    <Task href="/cloudapi/ecloud/tasks/100" type="application/vnd.tmrk.cloud.task">
      <Operation>Create Server</Operation>
      <Status>Running</Status>
    </Task>
    <Task href="/cloudapi/ecloud/tasks/101">
      <Operation>Power On</Operation>
      <Status>Queued</Status>
      <ErrorMessage i:nil="true"/>
    </Task>
  </Tasks>
  <Description><![CDATA[ a & b ]]></Description>
</VirtualMachine>"#;

    #[test]
    fn parse_builds_tree_with_local_names() {
        let document = Document::parse(TASK_XML).expect("valid xml");
        let root = document.root().expect("root present");
        assert_eq!(root.name(), "VirtualMachine");
        assert_eq!(root.attribute("name"), Some("web-01"));
        assert_eq!(root.child_text("Description"), Some("a & b"));

        let tasks = document.descendants("Task");
        assert_eq!(tasks.len(), 2);
        let second = tasks.get(1).expect("second task");
        assert_eq!(second.child_text("Operation"), Some("Power On"));
        let error = second.child("ErrorMessage").expect("error element");
        assert_eq!(error.attribute("nil"), Some("true"));
        assert_eq!(error.text(), "");
    }

    #[test]
    fn parse_unescapes_entities() {
        let document = Document::parse("<Name a=\"x&amp;y\">Tom &amp; Jerry</Name>")
            .expect("valid xml");
        let root = document.root().expect("root present");
        assert_eq!(root.text(), "Tom & Jerry");
        assert_eq!(root.attribute("a"), Some("x&y"));
    }

    #[test]
    fn blank_body_is_an_empty_document() {
        let document = Document::parse("  \n").expect("blank body parses");
        assert!(document.is_empty());
        assert!(document.descendants("Task").is_empty());
        assert_eq!(document, Document::empty());
    }

    #[test]
    fn unclosed_element_is_a_protocol_error() {
        let result = Document::parse("<Task><Status>Running</Status>");
        assert!(
            matches!(result, Err(EcloudError::Protocol(_))),
            "unexpected result: {result:?}"
        );
    }

    #[test]
    fn mismatched_tags_are_a_protocol_error() {
        let result = Document::parse("<Task><Status>Running</Task>");
        assert!(matches!(result, Err(EcloudError::Protocol(_))));
    }

    #[rstest]
    #[case("Service Unavailable")]
    #[case("<Task/>trailing")]
    #[case("leading<Task/>")]
    #[case("<![CDATA[raw]]>")]
    fn text_outside_the_root_is_a_protocol_error(#[case] body: &str) {
        let result = Document::parse(body);
        assert_eq!(
            result,
            Err(EcloudError::Protocol(String::from(
                "text outside the root element"
            )))
        );
    }

    #[test]
    fn second_root_is_rejected() {
        let result = Document::parse("<A/><B/>");
        assert!(matches!(result, Err(EcloudError::Protocol(_))));
    }

    #[test]
    fn display_round_trips_structure() {
        let element = Element::new("Task")
            .with_attribute("href", "/tasks/1?a=1&b=2")
            .with_child(Element::new("Status").with_text("Complete"))
            .with_child(Element::new("ErrorMessage"));
        let rendered = element.to_string();
        assert_eq!(
            rendered,
            "<Task href=\"/tasks/1?a=1&amp;b=2\"><Status>Complete</Status><ErrorMessage/></Task>"
        );
        let reparsed = Document::parse(&rendered).expect("rendered xml parses");
        assert_eq!(reparsed.root(), Some(&element));
    }
}
