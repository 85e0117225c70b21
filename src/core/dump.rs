//! Human-readable structural dumps for debugging

use crate::header::FileHeader;
use crate::image_file::ImageFileImpl;
use crate::node::{Node, NodeKind};
use std::fmt::{self, Write};

/// Indentation prefix of `indent` spaces
pub fn space(indent: usize) -> String {
    " ".repeat(indent)
}

pub trait Dump {
    fn dump(&self, indent: usize, out: &mut dyn Write) -> fmt::Result;

    fn dump_string(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.dump(0, &mut out);
        out
    }
}

impl Dump for FileHeader {
    fn dump(&self, indent: usize, out: &mut dyn Write) -> fmt::Result {
        let pad = space(indent);
        writeln!(
            out,
            "{}fileSignature:      {}",
            pad,
            String::from_utf8_lossy(&self.signature)
        )?;
        writeln!(out, "{}majorVersion:       {}", pad, self.major_version)?;
        writeln!(out, "{}minorVersion:       {}", pad, self.minor_version)?;
        writeln!(out, "{}filePhysicalLength: {}", pad, self.file_physical_length)?;
        writeln!(out, "{}xmlPhysicalOffset:  {}", pad, self.xml_physical_offset)?;
        writeln!(out, "{}xmlLogicalLength:   {}", pad, self.xml_logical_length)?;
        writeln!(out, "{}pageSize:           {}", pad, self.page_size)
    }
}

impl Dump for Node {
    fn dump(&self, indent: usize, out: &mut dyn Write) -> fmt::Result {
        let pad = space(indent);
        match self.kind() {
            NodeKind::Structure(children) => {
                writeln!(out, "{}type: Structure ({} children)", pad, children.len())?;
                for (name, child) in children {
                    writeln!(out, "{}{}:", pad, name)?;
                    child.dump(indent + 2, out)?;
                }
                Ok(())
            }
            NodeKind::Vector {
                allow_heterogeneous,
                children,
            } => {
                writeln!(
                    out,
                    "{}type: Vector ({} children, allowHeterogeneousChildren={})",
                    pad,
                    children.len(),
                    allow_heterogeneous
                )?;
                for (index, child) in children.iter().enumerate() {
                    writeln!(out, "{}{}:", pad, index)?;
                    child.dump(indent + 2, out)?;
                }
                Ok(())
            }
            NodeKind::Integer {
                value,
                minimum,
                maximum,
            } => writeln!(
                out,
                "{}type: Integer value={} minimum={} maximum={}",
                pad, value, minimum, maximum
            ),
            NodeKind::ScaledInteger {
                raw_value,
                minimum,
                maximum,
                scale,
                offset,
            } => writeln!(
                out,
                "{}type: ScaledInteger rawValue={} minimum={} maximum={} scale={} offset={}",
                pad, raw_value, minimum, maximum, scale, offset
            ),
            NodeKind::Float {
                value,
                precision,
                minimum,
                maximum,
            } => writeln!(
                out,
                "{}type: Float value={} precision={:?} minimum={} maximum={}",
                pad, value, precision, minimum, maximum
            ),
            NodeKind::String(value) => writeln!(out, "{}type: String value={:?}", pad, value),
            NodeKind::Blob {
                file_offset,
                length,
            } => writeln!(
                out,
                "{}type: Blob fileOffset={} length={}",
                pad, file_offset, length
            ),
        }
    }
}

impl Dump for ImageFileImpl {
    fn dump(&self, indent: usize, out: &mut dyn Write) -> fmt::Result {
        let pad = space(indent);
        writeln!(out, "{}fileName:    {}", pad, self.file_name())?;
        writeln!(out, "{}writerCount: {}", pad, self.writer_count())?;
        writeln!(out, "{}readerCount: {}", pad, self.reader_count())?;
        writeln!(out, "{}isWriter:    {}", pad, self.is_writer())?;
        writeln!(out, "{}isOpen:      {}", pad, self.is_open())?;
        writeln!(
            out,
            "{}checksumPolicy: {}",
            pad,
            self.config().checksum_policy.percent()
        )?;

        let namespaces = self.namespaces();
        writeln!(out, "{}nameSpaces:", pad)?;
        for (index, binding) in namespaces.iter().enumerate() {
            writeln!(out, "{}  {}:", pad, index)?;
            writeln!(out, "{}    prefix: {}", pad, binding.prefix)?;
            writeln!(out, "{}    uri:    {}", pad, binding.uri)?;
        }

        writeln!(out, "{}xmlLogicalOffset:   {}", pad, self.xml_logical_offset())?;
        writeln!(out, "{}xmlLogicalLength:   {}", pad, self.xml_logical_length())?;
        writeln!(out, "{}unusedLogicalStart: {}", pad, self.unused_logical_start())?;

        if let Some(header) = self.file_header() {
            writeln!(out, "{}header:", pad)?;
            header.dump(indent + 2, out)?;
        }

        writeln!(out, "{}root:", pad)?;
        self.root_unchecked().dump(indent + 2, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_dump() {
        let text = FileHeader::new(2048, 1024, 300).dump_string();
        assert!(text.contains("fileSignature:      ASTM-E57"));
        assert!(text.contains("filePhysicalLength: 2048"));
        assert!(text.contains("pageSize:           1024"));
    }

    #[test]
    fn test_node_dump_indents_children() {
        let mut inner = Node::structure();
        inner.set_child("leaf", Node::string("v")).unwrap();
        let mut root = Node::structure();
        root.set_child("inner", inner).unwrap();

        let mut out = String::new();
        root.dump(2, &mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "  type: Structure (1 children)");
        assert_eq!(lines[1], "  inner:");
        assert_eq!(lines[2], "    type: Structure (1 children)");
        assert_eq!(lines[3], "    leaf:");
        assert_eq!(lines[4], "      type: String value=\"v\"");
    }
}
