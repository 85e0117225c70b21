//! Element tree nodes
//!
//! The XML section of an image file describes a tree of typed elements.
//! Structures hold named children, vectors hold ordered unnamed children,
//! and the remaining kinds are leaves. Blob leaves point at binary sections
//! elsewhere in the file.
//!
//! Nodes are plain values. Once set into an image file a node is *attached*:
//! it carries a non-owning back-reference to that file, and it cannot be set
//! into a different one.

use crate::error::{E57Error, Result};
use crate::image_file::ImageFileImpl;
use crate::namespace::NamespaceRegistry;
use crate::validation::{check_element_name_legal, parse_element_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

/// Non-owning reference from a node to the image file it is attached to
pub(crate) type ImageFileRef = Weak<RefCell<ImageFileImpl>>;

/// Deepest element nesting an image file accepts, the root counting as one
///
/// Tree walks recurse per level, so the XML parser and the container's
/// `set`/`append` refuse anything deeper.
pub const MAX_TREE_DEPTH: usize = 1024;

/// Node type tag, matching the XML `type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Structure,
    Vector,
    Integer,
    ScaledInteger,
    Float,
    String,
    Blob,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Structure => "Structure",
            NodeType::Vector => "Vector",
            NodeType::Integer => "Integer",
            NodeType::ScaledInteger => "ScaledInteger",
            NodeType::Float => "Float",
            NodeType::String => "String",
            NodeType::Blob => "Blob",
        }
    }

    pub fn from_xml_type(value: &str) -> Option<Self> {
        match value {
            "Structure" => Some(NodeType::Structure),
            "Vector" => Some(NodeType::Vector),
            "Integer" => Some(NodeType::Integer),
            "ScaledInteger" => Some(NodeType::ScaledInteger),
            "Float" => Some(NodeType::Float),
            "String" => Some(NodeType::String),
            "Blob" => Some(NodeType::Blob),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage precision of a float element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPrecision {
    Single,
    Double,
}

impl FloatPrecision {
    /// Widest representable bounds for the precision
    pub fn limits(&self) -> (f64, f64) {
        match self {
            FloatPrecision::Single => (f32::MIN as f64, f32::MAX as f64),
            FloatPrecision::Double => (f64::MIN, f64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Named children in insertion order
    Structure(Vec<(String, Node)>),
    Vector {
        allow_heterogeneous: bool,
        children: Vec<Node>,
    },
    Integer {
        value: i64,
        minimum: i64,
        maximum: i64,
    },
    ScaledInteger {
        raw_value: i64,
        minimum: i64,
        maximum: i64,
        scale: f64,
        offset: f64,
    },
    Float {
        value: f64,
        precision: FloatPrecision,
        minimum: f64,
        maximum: f64,
    },
    String(String),
    Blob {
        /// Physical offset of the binary section
        file_offset: u64,
        /// Payload length in bytes, section header excluded
        length: u64,
    },
}

/// A node of the element tree
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    dest: Option<ImageFileRef>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Node {
    fn detached(kind: NodeKind) -> Self {
        Node { kind, dest: None }
    }

    pub fn structure() -> Self {
        Self::detached(NodeKind::Structure(Vec::new()))
    }

    pub fn vector(allow_heterogeneous: bool) -> Self {
        Self::detached(NodeKind::Vector {
            allow_heterogeneous,
            children: Vec::new(),
        })
    }

    pub fn integer(value: i64, minimum: i64, maximum: i64) -> Result<Self> {
        if minimum > maximum || value < minimum || value > maximum {
            return Err(E57Error::ValueOutOfBounds(format!(
                "value={} minimum={} maximum={}",
                value, minimum, maximum
            )));
        }
        Ok(Self::detached(NodeKind::Integer {
            value,
            minimum,
            maximum,
        }))
    }

    /// Integer with the full `i64` range
    pub fn unbounded_integer(value: i64) -> Self {
        Self::detached(NodeKind::Integer {
            value,
            minimum: i64::MIN,
            maximum: i64::MAX,
        })
    }

    pub fn scaled_integer(
        raw_value: i64,
        minimum: i64,
        maximum: i64,
        scale: f64,
        offset: f64,
    ) -> Result<Self> {
        if minimum > maximum || raw_value < minimum || raw_value > maximum {
            return Err(E57Error::ValueOutOfBounds(format!(
                "rawValue={} minimum={} maximum={}",
                raw_value, minimum, maximum
            )));
        }
        if scale == 0.0 || !scale.is_finite() {
            return Err(E57Error::BadApiArgument(format!("scale={}", scale)));
        }
        Ok(Self::detached(NodeKind::ScaledInteger {
            raw_value,
            minimum,
            maximum,
            scale,
            offset,
        }))
    }

    pub fn float(
        value: f64,
        precision: FloatPrecision,
        minimum: f64,
        maximum: f64,
    ) -> Result<Self> {
        let (low, high) = precision.limits();
        if minimum < low || maximum > high || minimum > maximum {
            return Err(E57Error::ValueOutOfBounds(format!(
                "minimum={} maximum={} precision={:?}",
                minimum, maximum, precision
            )));
        }
        if !(minimum..=maximum).contains(&value) {
            return Err(E57Error::ValueOutOfBounds(format!(
                "value={} minimum={} maximum={}",
                value, minimum, maximum
            )));
        }
        Ok(Self::detached(NodeKind::Float {
            value,
            precision,
            minimum,
            maximum,
        }))
    }

    /// Double precision float with the widest bounds
    pub fn double(value: f64) -> Result<Self> {
        Self::float(value, FloatPrecision::Double, f64::MIN, f64::MAX)
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::detached(NodeKind::String(value.into()))
    }

    pub(crate) fn blob(file_offset: u64, length: u64) -> Self {
        Self::detached(NodeKind::Blob {
            file_offset,
            length,
        })
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Structure(_) => NodeType::Structure,
            NodeKind::Vector { .. } => NodeType::Vector,
            NodeKind::Integer { .. } => NodeType::Integer,
            NodeKind::ScaledInteger { .. } => NodeType::ScaledInteger,
            NodeKind::Float { .. } => NodeType::Float,
            NodeKind::String(_) => NodeType::String,
            NodeKind::Blob { .. } => NodeType::Blob,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.dest.is_some()
    }

    pub fn integer_value(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Integer { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn raw_value(&self) -> Option<i64> {
        match self.kind {
            NodeKind::ScaledInteger { raw_value, .. } => Some(raw_value),
            _ => None,
        }
    }

    /// `raw_value * scale + offset` for scaled integers
    pub fn scaled_value(&self) -> Option<f64> {
        match self.kind {
            NodeKind::ScaledInteger {
                raw_value,
                scale,
                offset,
                ..
            } => Some(raw_value as f64 * scale + offset),
            _ => None,
        }
    }

    pub fn float_value(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Float { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn blob_length(&self) -> Option<u64> {
        match self.kind {
            NodeKind::Blob { length, .. } => Some(length),
            _ => None,
        }
    }

    pub fn blob_file_offset(&self) -> Option<u64> {
        match self.kind {
            NodeKind::Blob { file_offset, .. } => Some(file_offset),
            _ => None,
        }
    }

    pub fn child_count(&self) -> usize {
        match &self.kind {
            NodeKind::Structure(children) => children.len(),
            NodeKind::Vector { children, .. } => children.len(),
            _ => 0,
        }
    }

    /// Named child of a structure
    pub fn child(&self, name: &str) -> Option<&Node> {
        match &self.kind {
            NodeKind::Structure(children) => children
                .iter()
                .find(|(child_name, _)| child_name == name)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Child by position, for structures and vectors
    pub fn child_at(&self, index: usize) -> Option<&Node> {
        match &self.kind {
            NodeKind::Structure(children) => children.get(index).map(|(_, node)| node),
            NodeKind::Vector { children, .. } => children.get(index),
            _ => None,
        }
    }

    /// Structure child names in insertion order
    pub fn child_names(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Structure(children) => {
                children.iter().map(|(name, _)| name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Add a named child to a structure
    ///
    /// The name must be grammatical; a prefix is checked against the
    /// namespace registry when the tree is set into an image file.
    pub fn set_child(&mut self, name: &str, child: Node) -> Result<()> {
        parse_element_name(name, false)?;
        match &mut self.kind {
            NodeKind::Structure(children) => {
                if children.iter().any(|(child_name, _)| child_name == name) {
                    return Err(E57Error::SetTwice {
                        path: name.to_string(),
                    });
                }
                children.push((name.to_string(), child));
                Ok(())
            }
            _ => Err(E57Error::BadApiArgument(format!(
                "cannot set child {} on a {} node",
                name,
                self.node_type()
            ))),
        }
    }

    /// Append a child to a vector
    pub fn append(&mut self, child: Node) -> Result<()> {
        let node_type = self.node_type();
        match &mut self.kind {
            NodeKind::Vector {
                allow_heterogeneous,
                children,
            } => {
                if !*allow_heterogeneous {
                    if let Some(first) = children.first() {
                        if first.node_type() != child.node_type() {
                            return Err(E57Error::HomogeneousViolation(format!(
                                "expected {} child, got {}",
                                first.node_type(),
                                child.node_type()
                            )));
                        }
                    }
                }
                children.push(child);
                Ok(())
            }
            _ => Err(E57Error::BadApiArgument(format!(
                "cannot append to a {} node",
                node_type
            ))),
        }
    }

    /// Nesting levels in this subtree; a leaf has depth 1
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1usize)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            match &node.kind {
                NodeKind::Structure(children) => {
                    pending.extend(children.iter().map(|(_, child)| (child, level + 1)))
                }
                NodeKind::Vector { children, .. } => {
                    pending.extend(children.iter().map(|child| (child, level + 1)))
                }
                _ => {}
            }
        }
        deepest
    }

    pub(crate) fn destination(&self) -> Option<&ImageFileRef> {
        self.dest.as_ref()
    }

    /// Bind this node and its whole subtree to an image file
    pub(crate) fn set_attached_recursive(&mut self, dest: &ImageFileRef) {
        self.dest = Some(dest.clone());
        match &mut self.kind {
            NodeKind::Structure(children) => {
                for (_, child) in children.iter_mut() {
                    child.set_attached_recursive(dest);
                }
            }
            NodeKind::Vector { children, .. } => {
                for child in children.iter_mut() {
                    child.set_attached_recursive(dest);
                }
            }
            _ => {}
        }
    }

    /// Check every structure child name in the subtree against the registry
    pub(crate) fn check_names(&self, namespaces: &NamespaceRegistry) -> Result<()> {
        match &self.kind {
            NodeKind::Structure(children) => {
                for (name, child) in children {
                    check_element_name_legal(name, false, namespaces)?;
                    child.check_names(namespaces)?;
                }
            }
            NodeKind::Vector { children, .. } => {
                for child in children {
                    child.check_names(namespaces)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Follow structure children along `fields`
    pub(crate) fn lookup(&self, fields: &[String]) -> Option<&Node> {
        let mut node = self;
        for field in fields {
            node = node.child(field)?;
        }
        Some(node)
    }

    pub(crate) fn lookup_mut(&mut self, fields: &[String]) -> Option<&mut Node> {
        let mut node = self;
        for field in fields {
            node = match &mut node.kind {
                NodeKind::Structure(children) => children
                    .iter_mut()
                    .find(|(child_name, _)| child_name == field)
                    .map(|(_, child)| child)?,
                _ => return None,
            };
        }
        Some(node)
    }
}
