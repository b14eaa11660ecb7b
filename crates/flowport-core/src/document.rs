//! In-memory element graph for workflow documents.
//!
//! Elements live in an arena and are addressed by [`NodeId`], assigned in
//! start-tag order, so arena order is document (depth-first) order. Elements
//! store their children but no parent link; upward navigation goes through a
//! [`ParentIndex`] built once per document by [`parse`].
//!
//! Attribute values and text are stored still escaped and decoded when read,
//! so a bad entity reference fails only the reader that touches it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::escape::{unescape, EscapeError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{FlowportError, Result};

// ---------------------------------------------------------------------------
// Arena types
// ---------------------------------------------------------------------------

/// Stable synthetic identity of an element within one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
enum TextChunk {
    /// Character data as written, entity references still escaped.
    Escaped(String),
    /// CDATA content, taken literally.
    Verbatim(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
    text: Vec<TextChunk>,
}

#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
    root: NodeId,
}

impl Document {
    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    /// View of the element `id`.
    ///
    /// # Panics
    /// If `id` was not produced by this document.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        assert!(id.0 < self.elements.len(), "node {id:?} not in document");
        Node { doc: self, id }
    }

    /// View of the element `id`, or `None` when it is out of range.
    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        (id.0 < self.elements.len()).then_some(Node { doc: self, id })
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Every element in document order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        (0..self.elements.len()).map(move |i| Node {
            doc: self,
            id: NodeId(i),
        })
    }

    /// Every element tagged `tag`, in document order.
    pub fn elements_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
        self.nodes().filter(move |n| n.tag() == tag)
    }

    pub fn summarize(&self, action_tag: &str) -> DocumentSummary {
        let actions = self
            .elements_tagged(action_tag)
            .map(|n| ActionSummary {
                id: n.attr_lossy("id"),
                name: n.attr_lossy("name"),
            })
            .collect();
        DocumentSummary {
            root_tag: self.root().tag().to_string(),
            element_count: self.len(),
            actions,
        }
    }

    fn element(&self, id: NodeId) -> &Element {
        &self.elements[id.0]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub root_tag: String,
    pub element_count: usize,
    pub actions: Vec<ActionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSummary {
    pub id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Node view
// ---------------------------------------------------------------------------

/// Read-only handle on one element.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn tag(&self) -> &'a str {
        &self.doc.element(self.id).tag
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag() == tag
    }

    /// Decoded value of attribute `name`, `Ok(None)` when absent.
    pub fn attr(&self, name: &str) -> std::result::Result<Option<Cow<'a, str>>, EscapeError> {
        match self.raw_attr(name) {
            Some(raw) => unescape(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Decoded attribute, or the raw text when decoding fails, or `""`.
    pub fn attr_lossy(&self, name: &str) -> String {
        match self.attr(name) {
            Ok(Some(v)) => v.into_owned(),
            Ok(None) => String::new(),
            Err(_) => self.raw_attr(name).unwrap_or_default().to_string(),
        }
    }

    fn raw_attr(&self, name: &str) -> Option<&'a str> {
        self.doc
            .element(self.id)
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated direct character data of this element.
    pub fn text(&self) -> std::result::Result<String, EscapeError> {
        let mut out = String::new();
        for chunk in &self.doc.element(self.id).text {
            match chunk {
                TextChunk::Escaped(raw) => out.push_str(&unescape(raw)?),
                TextChunk::Verbatim(raw) => out.push_str(raw),
            }
        }
        Ok(out)
    }

    /// Descendants in document order, excluding `self`.
    ///
    /// `prune` is consulted for every descendant; when it returns `true` the
    /// node is still yielded but its subtree is skipped.
    pub fn descendants_pruned<F>(&self, mut prune: F) -> Vec<Node<'a>>
    where
        F: FnMut(&Node<'a>) -> bool,
    {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .doc
            .element(self.id)
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            let node = Node { doc: self.doc, id };
            let skip = prune(&node);
            out.push(node);
            if !skip {
                stack.extend(self.doc.element(id).children.iter().rev().copied());
            }
        }
        out
    }

    pub fn descendants(&self) -> Vec<Node<'a>> {
        self.descendants_pruned(|_| false)
    }
}

// ---------------------------------------------------------------------------
// ParentIndex
// ---------------------------------------------------------------------------

/// Child → parent lookup covering every element except the root.
#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentIndex {
    /// One traversal from the root, recording each child's parent.
    pub fn build(doc: &Document) -> Self {
        let mut parents = HashMap::with_capacity(doc.len());
        let mut stack = vec![doc.root];
        while let Some(id) = stack.pop() {
            for &child in &doc.element(id).children {
                parents.insert(child, id);
                stack.push(child);
            }
        }
        Self { parents }
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loading & parsing
// ---------------------------------------------------------------------------

/// Read a workflow document from disk and decode it to text.
///
/// UTF-8 (with or without BOM) and BOM-marked UTF-16 are accepted.
pub fn load_source(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(FlowportError::DocumentNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(FlowportError::DocumentNotFound(path.display().to_string()));
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "read workflow document");
    decode_source(&bytes)
}

/// Decode raw document bytes to text.
///
/// A byte-order mark wins; otherwise the `encoding="..."` of the XML
/// declaration is honoured, and a document without one is read as UTF-8.
pub fn decode_source(bytes: &[u8]) -> Result<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_as(encoding, &bytes[bom_len..]);
    }
    let Some(label) = declared_encoding(bytes) else {
        return decode_as(UTF_8, bytes);
    };
    let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        FlowportError::malformed(
            format!("unsupported document encoding '{label}'"),
            &String::from_utf8_lossy(bytes),
        )
    })?;
    // A declaration readable as ASCII rules out a BOM-less UTF-16 body.
    let encoding = if encoding == UTF_16LE || encoding == UTF_16BE {
        UTF_8
    } else {
        encoding
    };
    tracing::debug!(encoding = encoding.name(), "decoding declared encoding");
    decode_as(encoding, bytes)
}

fn decode_as(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            FlowportError::malformed(
                format!("document is not valid {}", encoding.name()),
                &String::from_utf8_lossy(bytes),
            )
        })
}

/// The `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let rest = bytes.strip_prefix(b"<?xml")?;
    let end = rest.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&rest[..end]).ok()?;
    let after = &decl[decl.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let value = &after[1..];
    Some(value[..value.find(quote)?].to_string())
}

/// Parse `raw` into a [`Document`] and its [`ParentIndex`].
pub fn parse(raw: &str) -> Result<(Document, ParentIndex)> {
    let document = parse_document(raw)?;
    let parents = ParentIndex::build(&document);
    tracing::debug!(
        elements = document.len(),
        relations = parents.len(),
        "built parent index"
    );
    Ok((document, parents))
}

fn parse_document(raw: &str) -> Result<Document> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if text.trim().is_empty() {
        return Err(FlowportError::DocumentNotFound("<empty input>".into()));
    }

    let mut reader = Reader::from_str(text);
    let mut elements: Vec<Element> = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();
    let mut root: Option<NodeId> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            FlowportError::malformed(format!("{e} (byte {})", reader.buffer_position()), raw)
        })?;
        match event {
            Event::Start(start) => {
                let id = push_element(&mut elements, &open, &mut root, &start, raw)?;
                open.push(id);
            }
            Event::Empty(start) => {
                push_element(&mut elements, &open, &mut root, &start, raw)?;
            }
            Event::End(end) => {
                let name = utf8_name(end.name().as_ref(), raw)?;
                match open.pop() {
                    Some(id) if elements[id.0].tag == name => {}
                    Some(id) => {
                        return Err(FlowportError::malformed(
                            format!("expected </{}>, found </{name}>", elements[id.0].tag),
                            raw,
                        ))
                    }
                    None => {
                        return Err(FlowportError::malformed(
                            format!("unexpected </{name}>"),
                            raw,
                        ))
                    }
                }
            }
            Event::Text(t) => {
                let chunk = std::str::from_utf8(&t)
                    .map_err(|e| FlowportError::malformed(e.to_string(), raw))?;
                match open.last() {
                    Some(id) => elements[id.0].text.push(TextChunk::Escaped(chunk.to_string())),
                    None if chunk.trim().is_empty() => {}
                    None => {
                        return Err(FlowportError::malformed(
                            "text outside the root element",
                            raw,
                        ))
                    }
                }
            }
            Event::CData(c) => {
                let chunk = std::str::from_utf8(&c)
                    .map_err(|e| FlowportError::malformed(e.to_string(), raw))?;
                match open.last() {
                    Some(id) => elements[id.0].text.push(TextChunk::Verbatim(chunk.to_string())),
                    None => {
                        return Err(FlowportError::malformed(
                            "CDATA outside the root element",
                            raw,
                        ))
                    }
                }
            }
            Event::Eof => break,
            // Declarations (including `encoding="..."`), comments, PIs, doctype.
            _ => {}
        }
    }

    if let Some(id) = open.last() {
        return Err(FlowportError::malformed(
            format!("unclosed element <{}>", elements[id.0].tag),
            raw,
        ));
    }
    let root = root.ok_or_else(|| FlowportError::malformed("no root element", raw))?;
    Ok(Document { elements, root })
}

fn push_element(
    elements: &mut Vec<Element>,
    open: &[NodeId],
    root: &mut Option<NodeId>,
    start: &BytesStart<'_>,
    raw: &str,
) -> Result<NodeId> {
    let tag = utf8_name(start.name().as_ref(), raw)?;
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FlowportError::malformed(format!("in <{tag}>: {e}"), raw))?;
        let key = utf8_name(attr.key.as_ref(), raw)?;
        let value = std::str::from_utf8(&attr.value)
            .map_err(|e| FlowportError::malformed(e.to_string(), raw))?
            .to_string();
        attributes.push((key, value));
    }

    let id = NodeId(elements.len());
    match open.last() {
        Some(parent) => elements[parent.0].children.push(id),
        None if root.is_none() => *root = Some(id),
        None => {
            return Err(FlowportError::malformed(
                format!("second root element <{tag}>"),
                raw,
            ))
        }
    }
    elements.push(Element {
        tag,
        attributes,
        children: Vec::new(),
        text: Vec::new(),
    });
    Ok(id)
}

fn utf8_name(bytes: &[u8], raw: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| FlowportError::malformed(format!("invalid name: {e}"), raw))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Workflow>
  <!-- exported -->
  <NWActionConfig id="a" name="Outer" type="Sequence">
    <property name="label">One &amp; two</property>
    <Children>
      <NWActionConfig id="b" name="Inner" type="SetVariable"/>
    </Children>
  </NWActionConfig>
</Workflow>"#;

    #[test]
    fn parses_nested_elements_in_document_order() {
        let (doc, _) = parse(NESTED).unwrap();
        let tags: Vec<&str> = doc.nodes().map(|n| n.tag()).collect();
        assert_eq!(
            tags,
            ["Workflow", "NWActionConfig", "property", "Children", "NWActionConfig"]
        );
        assert_eq!(doc.root().tag(), "Workflow");
    }

    #[test]
    fn parent_index_covers_every_non_root_element() {
        let (doc, parents) = parse(NESTED).unwrap();
        assert_eq!(parents.len(), doc.len() - 1);
        assert!(parents.parent_of(doc.root().id()).is_none());

        let inner = doc.elements_tagged("NWActionConfig").nth(1).unwrap();
        let wrapper = parents.parent_of(inner.id()).unwrap();
        assert_eq!(doc.node(wrapper).tag(), "Children");
    }

    #[test]
    fn attributes_and_text_are_unescaped_on_read() {
        let (doc, _) = parse(NESTED).unwrap();
        let prop = doc.elements_tagged("property").next().unwrap();
        assert_eq!(prop.attr("name").unwrap().as_deref(), Some("label"));
        assert_eq!(prop.text().unwrap(), "One & two");
        assert_eq!(prop.attr("missing").unwrap(), None);
    }

    #[test]
    fn cdata_is_taken_literally() {
        let (doc, _) = parse("<r><p><![CDATA[a < b &x;]]></p></r>").unwrap();
        let p = doc.elements_tagged("p").next().unwrap();
        assert_eq!(p.text().unwrap(), "a < b &x;");
    }

    #[test]
    fn unknown_entity_fails_only_on_read() {
        let (doc, _) = parse(r#"<r><p name="&bogus;">x</p></r>"#).unwrap();
        let p = doc.elements_tagged("p").next().unwrap();
        assert!(p.attr("name").is_err());
        assert_eq!(p.attr_lossy("name"), "&bogus;");
    }

    #[test]
    fn descendants_can_prune_subtrees() {
        let (doc, _) = parse(NESTED).unwrap();
        let outer = doc.elements_tagged("NWActionConfig").next().unwrap();
        assert_eq!(outer.descendants().len(), 3);
        let pruned = outer.descendants_pruned(|n| n.is("Children"));
        let tags: Vec<&str> = pruned.iter().map(|n| n.tag()).collect();
        assert_eq!(tags, ["property", "Children"]);
    }

    #[test]
    fn truncated_markup_is_malformed() {
        let err = parse("<Workflow><NWActionConfig id=\"a\">").unwrap_err();
        assert!(matches!(err, FlowportError::MalformedDocument { .. }));
        let err = parse("<Workflow><NWActionConfig id=\"a\"").unwrap_err();
        assert!(matches!(err, FlowportError::MalformedDocument { .. }));
    }

    #[test]
    fn mismatched_end_tag_is_malformed() {
        let err = parse("<a><b></a></b>").unwrap_err();
        assert!(matches!(err, FlowportError::MalformedDocument { .. }));
    }

    #[test]
    fn second_root_and_stray_text_are_malformed() {
        assert!(matches!(
            parse("<a/><b/>"),
            Err(FlowportError::MalformedDocument { .. })
        ));
        assert!(matches!(
            parse("<a/> trailing words"),
            Err(FlowportError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn malformed_snippet_is_bounded() {
        let raw = format!("<a>{}", "x".repeat(2000));
        match parse(&raw).unwrap_err() {
            FlowportError::MalformedDocument { snippet, .. } => {
                assert!(snippet.chars().count() <= crate::error::SNIPPET_LIMIT + 3);
            }
            other => panic!("expected MalformedDocument, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_not_found() {
        assert!(matches!(parse(""), Err(FlowportError::DocumentNotFound(_))));
        assert!(matches!(
            parse("  \n"),
            Err(FlowportError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn get_rejects_ids_from_larger_documents() {
        let (doc, _) = parse("<a><b/></a>").unwrap();
        assert_eq!(doc.get(NodeId(1)).map(|n| n.tag()), Some("b"));
        assert!(doc.get(NodeId(2)).is_none());
    }

    #[test]
    fn decode_accepts_boms() {
        let mut utf8 = vec![0xEF, 0xBB, 0xBF];
        utf8.extend_from_slice(b"<a/>");
        assert_eq!(decode_source(&utf8).unwrap(), "<a/>");

        let mut utf16 = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_source(&utf16).unwrap(), "<a/>");

        assert!(decode_source(&[0xC3, 0x28]).is_err());
    }

    #[test]
    fn decode_honours_declared_single_byte_encoding() {
        let mut bytes =
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><W><NWActionConfig id=\"a\" name=\"Acci"
                .to_vec();
        bytes.push(0xF3);
        bytes.extend_from_slice(b"n\"/></W>");

        let text = decode_source(&bytes).unwrap();
        let (doc, _) = parse(&text).unwrap();
        let action = doc.elements_tagged("NWActionConfig").next().unwrap();
        assert_eq!(action.attr_lossy("name"), "Acci\u{f3}n");
    }

    #[test]
    fn decode_checks_declared_encoding() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding = 'windows-1252' ?><a/>").as_deref(),
            Some("windows-1252")
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
        // Mislabelled as UTF-16 but plainly ASCII-compatible.
        let text = decode_source(b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>").unwrap();
        assert!(text.ends_with("<a/>"));
        assert!(decode_source(b"<?xml version=\"1.0\" encoding=\"klingon\"?><a/>").is_err());
        // Declared UTF-8 still rejects invalid bytes.
        assert!(decode_source(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><a>\xC3\x28</a>").is_err());
    }

    #[test]
    fn load_source_reports_missing_and_empty_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.xml");
        assert!(matches!(
            load_source(&missing),
            Err(FlowportError::DocumentNotFound(_))
        ));

        let empty = dir.path().join("empty.xml");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            load_source(&empty),
            Err(FlowportError::DocumentNotFound(_))
        ));

        let ok = dir.path().join("ok.xml");
        std::fs::write(&ok, NESTED).unwrap();
        assert!(load_source(&ok).unwrap().contains("Workflow"));
    }

    #[test]
    fn summary_lists_actions() {
        let (doc, _) = parse(NESTED).unwrap();
        let summary = doc.summarize("NWActionConfig");
        assert_eq!(summary.root_tag, "Workflow");
        assert_eq!(summary.element_count, 5);
        assert_eq!(summary.actions.len(), 2);
        assert_eq!(summary.actions[1].name, "Inner");
    }
}
