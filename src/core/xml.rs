//! XML section serialization and parsing
//!
//! The element tree is stored as a small XML document. Every element carries
//! a `type` attribute naming its node kind; bounds and other numeric
//! attributes are only written when they differ from their defaults. String
//! values go into CDATA so surrounding whitespace survives a round trip.

use crate::error::{E57Error, Result};
use crate::namespace::NamespaceRegistry;
use crate::node::{FloatPrecision, Node, NodeKind, NodeType, MAX_TREE_DEPTH};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fmt::Write;

/// Default namespace of the root element
pub const E57_V1_0_URI: &str = "http://www.astm.org/COMMIT/E57/2010-e57-v1.0";

/// Declaration written ahead of the root element
pub const XML_PROLOGUE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Name of the root element
pub const ROOT_ELEMENT_NAME: &str = "e57Root";

const VECTOR_CHILD_NAME: &str = "vectorChild";

fn xml_error<E: std::fmt::Display>(e: E) -> E57Error {
    E57Error::XmlParser(e.to_string())
}

/// Serialize `root` as the named root element
///
/// The root element carries the default namespace and one `xmlns:prefix`
/// attribute per registered binding. `indent_step` spaces are used per
/// nesting level.
pub fn write_xml(
    root: &Node,
    namespaces: &NamespaceRegistry,
    indent_step: usize,
    element_name: &str,
) -> String {
    let mut root_attrs = format!(" xmlns=\"{}\"", E57_V1_0_URI);
    for binding in namespaces.iter() {
        // Writing to a String cannot fail
        let _ = write!(
            root_attrs,
            " xmlns:{}=\"{}\"",
            binding.prefix,
            escape(binding.uri.as_str())
        );
    }

    let mut out = String::new();
    write_element(&mut out, root, element_name, 0, indent_step, &root_attrs);
    out
}

fn write_element(
    out: &mut String,
    node: &Node,
    name: &str,
    depth: usize,
    indent_step: usize,
    extra_attrs: &str,
) {
    let pad = " ".repeat(depth * indent_step);
    let _ = write!(out, "{}<{} type=\"{}\"", pad, name, node.node_type());
    out.push_str(extra_attrs);

    match node.kind() {
        NodeKind::Structure(children) => {
            if children.is_empty() {
                out.push_str("/>\n");
                return;
            }
            out.push_str(">\n");
            for (child_name, child) in children {
                write_element(out, child, child_name, depth + 1, indent_step, "");
            }
            let _ = writeln!(out, "{}</{}>", pad, name);
        }
        NodeKind::Vector {
            allow_heterogeneous,
            children,
        } => {
            if *allow_heterogeneous {
                out.push_str(" allowHeterogeneousChildren=\"1\"");
            }
            if children.is_empty() {
                out.push_str("/>\n");
                return;
            }
            out.push_str(">\n");
            for child in children {
                write_element(out, child, VECTOR_CHILD_NAME, depth + 1, indent_step, "");
            }
            let _ = writeln!(out, "{}</{}>", pad, name);
        }
        NodeKind::Integer {
            value,
            minimum,
            maximum,
        } => {
            write_integer_bounds(out, *minimum, *maximum);
            let _ = writeln!(out, ">{}</{}>", value, name);
        }
        NodeKind::ScaledInteger {
            raw_value,
            minimum,
            maximum,
            scale,
            offset,
        } => {
            write_integer_bounds(out, *minimum, *maximum);
            if *scale != 1.0 {
                let _ = write!(out, " scale=\"{:e}\"", scale);
            }
            if *offset != 0.0 {
                let _ = write!(out, " offset=\"{:e}\"", offset);
            }
            let _ = writeln!(out, ">{}</{}>", raw_value, name);
        }
        NodeKind::Float {
            value,
            precision,
            minimum,
            maximum,
        } => {
            let (low, high) = precision.limits();
            if *precision == FloatPrecision::Single {
                out.push_str(" precision=\"single\"");
            }
            if *minimum != low {
                let _ = write!(out, " minimum=\"{:e}\"", minimum);
            }
            if *maximum != high {
                let _ = write!(out, " maximum=\"{:e}\"", maximum);
            }
            let _ = writeln!(out, ">{:e}</{}>", value, name);
        }
        NodeKind::String(value) => {
            // "]]>" cannot appear inside a CDATA section, so split around it
            let escaped = value.replace("]]>", "]]]]><![CDATA[>");
            let _ = writeln!(out, "><![CDATA[{}]]></{}>", escaped, name);
        }
        NodeKind::Blob {
            file_offset,
            length,
        } => {
            let _ = writeln!(
                out,
                " fileOffset=\"{}\" length=\"{}\"/>",
                file_offset, length
            );
        }
    }
}

fn write_integer_bounds(out: &mut String, minimum: i64, maximum: i64) {
    if minimum != i64::MIN {
        let _ = write!(out, " minimum=\"{}\"", minimum);
    }
    if maximum != i64::MAX {
        let _ = write!(out, " maximum=\"{}\"", maximum);
    }
}

/// Element being parsed
struct Frame {
    name: String,
    node_type: NodeType,
    attrs: HashMap<String, String>,
    /// Structure or vector under construction
    container: Option<Node>,
    text: String,
}

impl Frame {
    fn attr<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.attrs.get(key) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                E57Error::XmlParser(format!(
                    "element={} attribute {}=\"{}\" is not a valid number",
                    self.name, key, raw
                ))
            }),
            None => Ok(default),
        }
    }

    fn value<T: std::str::FromStr>(&self, default: T) -> Result<T> {
        let text = self.text.trim();
        if text.is_empty() {
            return Ok(default);
        }
        text.parse().map_err(|_| {
            E57Error::XmlParser(format!(
                "element={} value \"{}\" is not a valid number",
                self.name, text
            ))
        })
    }

    fn finish(self) -> Result<(String, Node)> {
        let node = match self.node_type {
            NodeType::Structure | NodeType::Vector => match self.container {
                Some(node) => node,
                None => {
                    return Err(E57Error::Internal(format!(
                        "container frame {} without node",
                        self.name
                    )))
                }
            },
            NodeType::Integer => Node::integer(
                self.value(0)?,
                self.attr("minimum", i64::MIN)?,
                self.attr("maximum", i64::MAX)?,
            )?,
            NodeType::ScaledInteger => Node::scaled_integer(
                self.value(0)?,
                self.attr("minimum", i64::MIN)?,
                self.attr("maximum", i64::MAX)?,
                self.attr("scale", 1.0)?,
                self.attr("offset", 0.0)?,
            )?,
            NodeType::Float => {
                let precision = match self.attrs.get("precision").map(String::as_str) {
                    None | Some("double") => FloatPrecision::Double,
                    Some("single") => FloatPrecision::Single,
                    Some(other) => {
                        return Err(E57Error::XmlParser(format!(
                            "element={} precision={}",
                            self.name, other
                        )))
                    }
                };
                let (low, high) = precision.limits();
                Node::float(
                    self.value(0.0)?,
                    precision,
                    self.attr("minimum", low)?,
                    self.attr("maximum", high)?,
                )?
            }
            NodeType::String => Node::string(self.text),
            NodeType::Blob => Node::blob(self.attr("fileOffset", 0)?, self.attr("length", 0)?),
        };
        Ok((self.name, node))
    }
}

fn open_element(
    start: &BytesStart<'_>,
    is_root: bool,
    namespaces: &mut NamespaceRegistry,
) -> Result<Frame> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_error)?
        .to_string();

    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(xml_error)?
            .to_string();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();

        if is_root {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                namespaces.add(prefix, &value)?;
                continue;
            }
        }
        attrs.insert(key, value);
    }

    let type_name = attrs.get("type").ok_or_else(|| {
        E57Error::XmlParser(format!("element={} has no type attribute", name))
    })?;
    let node_type = NodeType::from_xml_type(type_name).ok_or_else(|| {
        E57Error::XmlParser(format!("element={} unknown type={}", name, type_name))
    })?;

    if is_root && node_type != NodeType::Structure {
        return Err(E57Error::XmlParser(format!(
            "root element {} must be a Structure, found {}",
            name, node_type
        )));
    }

    let container = match node_type {
        NodeType::Structure => Some(Node::structure()),
        NodeType::Vector => {
            let allow: i64 = match attrs.get("allowHeterogeneousChildren") {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    E57Error::XmlParser(format!(
                        "element={} allowHeterogeneousChildren={}",
                        name, raw
                    ))
                })?,
                None => 0,
            };
            Some(Node::vector(allow != 0))
        }
        _ => None,
    };

    Ok(Frame {
        name,
        node_type,
        attrs,
        container,
        text: String::new(),
    })
}

/// Hand a finished element to its parent, or return it when it is the root
fn close_frame(stack: &mut [Frame], frame: Frame) -> Result<Option<Node>> {
    let (name, node) = frame.finish()?;
    let parent = match stack.last_mut() {
        Some(parent) => parent,
        None => return Ok(Some(node)),
    };

    match parent.container.as_mut() {
        Some(container) if parent.node_type == NodeType::Structure => {
            container.set_child(&name, node)?
        }
        Some(container) => container.append(node)?,
        None => {
            return Err(E57Error::XmlParser(format!(
                "element={} cannot have child {}",
                parent.name, name
            )))
        }
    }
    Ok(None)
}

/// Refuse an element that would nest deeper than [`MAX_TREE_DEPTH`]
fn check_depth(stack: &[Frame]) -> Result<()> {
    if stack.len() >= MAX_TREE_DEPTH {
        return Err(E57Error::XmlParser(format!(
            "element {} nests deeper than {} levels",
            stack[stack.len() - 1].name,
            MAX_TREE_DEPTH
        )));
    }
    Ok(())
}

/// Parse an XML section into a root structure
///
/// `xmlns:prefix` declarations on the root element are added to
/// `namespaces`. Every structure child name is checked against the
/// registry once the whole document has been read. Elements nested deeper
/// than [`MAX_TREE_DEPTH`] fail with `XmlParser`.
pub fn parse_xml(source: &str, namespaces: &mut NamespaceRegistry) -> Result<Node> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(E57Error::XmlParser("content after root element".into()));
                }
                check_depth(&stack)?;
                let frame = open_element(&start, stack.is_empty(), namespaces)?;
                stack.push(frame);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(E57Error::XmlParser("content after root element".into()));
                }
                check_depth(&stack)?;
                let frame = open_element(&start, stack.is_empty(), namespaces)?;
                root = close_frame(&mut stack, frame)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| E57Error::XmlParser("unbalanced end tag".into()))?;
                root = close_frame(&mut stack, frame)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    let bytes = data.into_inner();
                    top.text
                        .push_str(std::str::from_utf8(&bytes).map_err(xml_error)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(E57Error::XmlParser(format!(
            "unexpected end of document inside {}",
            stack[stack.len() - 1].name
        )));
    }
    let root = root.ok_or_else(|| E57Error::XmlParser("no root element".into()))?;
    root.check_names(namespaces)?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Node {
        let mut root = Node::structure();
        root.set_child("formatName", Node::string("ASTM E57 3D Imaging Data File"))
            .unwrap();
        root.set_child("count", Node::integer(7, 0, 100).unwrap())
            .unwrap();
        root.set_child(
            "x",
            Node::scaled_integer(-12, -1000, 1000, 0.001, 10.0).unwrap(),
        )
        .unwrap();
        root.set_child(
            "temperature",
            Node::float(21.5, FloatPrecision::Single, -50.0, 60.0).unwrap(),
        )
        .unwrap();
        root.set_child("ratio", Node::double(1.0 / 3.0).unwrap())
            .unwrap();

        let mut scans = Node::vector(false);
        let mut scan = Node::structure();
        scan.set_child("name", Node::string("  padded  ")).unwrap();
        scans.append(scan).unwrap();
        scans.append(Node::structure()).unwrap();
        root.set_child("data3D", scans).unwrap();

        let mut mixed = Node::vector(true);
        mixed.append(Node::unbounded_integer(-4)).unwrap();
        mixed.append(Node::string("<&>\"'")).unwrap();
        root.set_child("mixed", mixed).unwrap();

        root.set_child("payload", Node::blob(1024, 99)).unwrap();
        root
    }

    #[test]
    fn test_write_then_parse() {
        let root = sample_tree();
        let registry = NamespaceRegistry::new();
        let xml = write_xml(&root, &registry, 2, ROOT_ELEMENT_NAME);

        let mut parsed_registry = NamespaceRegistry::new();
        let parsed = parse_xml(&xml, &mut parsed_registry).unwrap();
        assert_eq!(parsed, root);
        assert!(parsed_registry.is_empty());
    }

    #[test]
    fn test_default_attributes_omitted() {
        let mut root = Node::structure();
        root.set_child("n", Node::unbounded_integer(5)).unwrap();
        root.set_child("d", Node::double(2.0).unwrap()).unwrap();
        let xml = write_xml(&root, &NamespaceRegistry::new(), 0, "e57Root");

        assert!(xml.contains("<n type=\"Integer\">5</n>"));
        assert!(xml.contains("<d type=\"Float\">2e0</d>"));
        assert!(!xml.contains("minimum"));
        assert!(!xml.contains("precision"));
    }

    #[test]
    fn test_root_namespaces() {
        let mut registry = NamespaceRegistry::new();
        registry.add("ext", "urn:example:ext").unwrap();

        let mut root = Node::structure();
        root.set_child("ext:note", Node::string("hi")).unwrap();
        let xml = write_xml(&root, &registry, 2, ROOT_ELEMENT_NAME);
        assert!(xml.starts_with(
            "<e57Root type=\"Structure\" xmlns=\"http://www.astm.org/COMMIT/E57/2010-e57-v1.0\" xmlns:ext=\"urn:example:ext\">"
        ));

        let mut parsed_registry = NamespaceRegistry::new();
        let parsed = parse_xml(&xml, &mut parsed_registry).unwrap();
        assert_eq!(parsed_registry.lookup_prefix("ext"), Some("urn:example:ext"));
        assert_eq!(
            parsed.child("ext:note").unwrap().string_value(),
            Some("hi")
        );
    }

    #[test]
    fn test_cdata_terminator_in_string() {
        let mut root = Node::structure();
        root.set_child("s", Node::string("a]]>b")).unwrap();
        let xml = write_xml(&root, &NamespaceRegistry::new(), 2, ROOT_ELEMENT_NAME);

        let parsed = parse_xml(&xml, &mut NamespaceRegistry::new()).unwrap();
        assert_eq!(parsed.child("s").unwrap().string_value(), Some("a]]>b"));
    }

    #[test]
    fn test_unregistered_prefix_rejected() {
        let xml = "<e57Root type=\"Structure\"><ext:a type=\"String\">x</ext:a></e57Root>";
        assert!(matches!(
            parse_xml(xml, &mut NamespaceRegistry::new()),
            Err(E57Error::BadPathName(_))
        ));
    }

    #[test]
    fn test_malformed_documents() {
        let mut registry = NamespaceRegistry::new();
        assert!(matches!(
            parse_xml("<e57Root type=\"Structure\">", &mut registry),
            Err(E57Error::XmlParser(_))
        ));
        assert!(matches!(
            parse_xml("", &mut registry),
            Err(E57Error::XmlParser(_))
        ));
        assert!(matches!(
            parse_xml("<e57Root type=\"Integer\">1</e57Root>", &mut registry),
            Err(E57Error::XmlParser(_))
        ));
        assert!(matches!(
            parse_xml(
                "<e57Root type=\"Structure\"><a type=\"Widget\"/></e57Root>",
                &mut registry
            ),
            Err(E57Error::XmlParser(_))
        ));
        assert!(matches!(
            parse_xml(
                "<e57Root type=\"Structure\"><a type=\"Integer\">x1</a></e57Root>",
                &mut registry
            ),
            Err(E57Error::XmlParser(_))
        ));
        assert!(matches!(
            parse_xml(
                "<e57Root type=\"Structure\"><a type=\"String\"><b type=\"String\"/></a></e57Root>",
                &mut registry
            ),
            Err(E57Error::XmlParser(_))
        ));
    }

    #[test]
    fn test_parse_bounds_violation() {
        let xml = "<e57Root type=\"Structure\"><a type=\"Integer\" maximum=\"3\">9</a></e57Root>";
        assert!(matches!(
            parse_xml(xml, &mut NamespaceRegistry::new()),
            Err(E57Error::ValueOutOfBounds(_))
        ));
    }

    #[test]
    fn test_duplicate_child_rejected() {
        let xml = "<e57Root type=\"Structure\"><a type=\"String\"/><a type=\"String\"/></e57Root>";
        assert!(matches!(
            parse_xml(xml, &mut NamespaceRegistry::new()),
            Err(E57Error::SetTwice { .. })
        ));
    }

    fn nested(depth: usize) -> String {
        let mut xml = String::from("<e57Root type=\"Structure\">");
        for _ in 1..depth - 1 {
            xml.push_str("<a type=\"Structure\">");
        }
        xml.push_str("<leaf type=\"Integer\"/>");
        for _ in 1..depth - 1 {
            xml.push_str("</a>");
        }
        xml.push_str("</e57Root>");
        xml
    }

    #[test]
    fn test_nesting_limit() {
        let root = parse_xml(&nested(MAX_TREE_DEPTH), &mut NamespaceRegistry::new()).unwrap();
        assert_eq!(root.depth(), MAX_TREE_DEPTH);

        assert!(matches!(
            parse_xml(&nested(MAX_TREE_DEPTH + 1), &mut NamespaceRegistry::new()),
            Err(E57Error::XmlParser(_))
        ));
    }
}
