//! Validation for element names and path names
//!
//! Element names follow a restricted XML name grammar:
//!
//! - First character: ASCII letter, underscore, or any non-ASCII character
//! - Following characters: ASCII letters, digits, `_`, `:`, `-`, `.`, or non-ASCII
//! - At most one colon, splitting the name into a non-empty `prefix` and
//!   `localPart`; the prefix must be a registered namespace
//! - Where allowed, a purely numeric name (`"0"`, `"17"`) addresses a vector child
//!
//! Non-ASCII characters are accepted as a whole and never inspected further.
//!
//! Path names join element names with `/`. A leading `/` makes the path
//! absolute (rooted at the image file root).

use crate::error::{E57Error, Result};
use crate::namespace::NamespaceRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Separator between path fields
pub const PATH_SEPARATOR: char = '/';

static ELEMENT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z_]|[^\x00-\x7F])(?:[A-Za-z0-9_:.\-]|[^\x00-\x7F])*$").unwrap()
});

static NUMERIC_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// Parsed element name, borrowing from the source string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementName<'a> {
    /// Namespace prefix, empty when the name has no colon
    pub prefix: &'a str,
    pub local_part: &'a str,
}

impl<'a> ElementName<'a> {
    pub fn is_extended(&self) -> bool {
        !self.prefix.is_empty()
    }
}

/// Split and validate an element name
///
/// # Errors
///
/// Returns `BadPathName` for empty names, illegal characters, more than one
/// colon, or an empty prefix or local part.
///
/// # Examples
///
/// ```
/// use e57_container::validation::parse_element_name;
///
/// let name = parse_element_name("ext:color", false).unwrap();
/// assert_eq!(name.prefix, "ext");
/// assert_eq!(name.local_part, "color");
///
/// assert!(parse_element_name("9ab", false).is_err());
/// assert!(parse_element_name("9", true).is_ok());
/// ```
pub fn parse_element_name(element_name: &str, allow_numeric: bool) -> Result<ElementName<'_>> {
    let bad = || E57Error::BadPathName(format!("elementName={}", element_name));

    let first = element_name.chars().next().ok_or_else(bad)?;

    if allow_numeric && first.is_ascii_digit() {
        if !NUMERIC_NAME.is_match(element_name) {
            return Err(bad());
        }
        return Ok(ElementName {
            prefix: "",
            local_part: element_name,
        });
    }

    if !ELEMENT_NAME.is_match(element_name) {
        return Err(bad());
    }

    match element_name.split_once(':') {
        Some((prefix, local_part)) => {
            if local_part.contains(':') {
                return Err(bad());
            }
            if prefix.is_empty() || local_part.is_empty() {
                return Err(E57Error::BadPathName(format!(
                    "elementName={} prefix={} localPart={}",
                    element_name, prefix, local_part
                )));
            }
            Ok(ElementName { prefix, local_part })
        }
        None => Ok(ElementName {
            prefix: "",
            local_part: element_name,
        }),
    }
}

/// Validate an element name, requiring any prefix to be registered
pub fn check_element_name_legal(
    element_name: &str,
    allow_numeric: bool,
    namespaces: &NamespaceRegistry,
) -> Result<()> {
    let name = parse_element_name(element_name, allow_numeric)?;

    if name.is_extended() && namespaces.lookup_prefix(name.prefix).is_none() {
        return Err(E57Error::BadPathName(format!(
            "elementName={} prefix={}",
            element_name, name.prefix
        )));
    }

    Ok(())
}

/// True when [`check_element_name_legal`] accepts the name
pub fn is_element_name_legal(
    element_name: &str,
    allow_numeric: bool,
    namespaces: &NamespaceRegistry,
) -> bool {
    check_element_name_legal(element_name, allow_numeric, namespaces).is_ok()
}

/// True when [`parse_path_name`] accepts the path
pub fn is_path_name_legal(path_name: &str, namespaces: &NamespaceRegistry) -> bool {
    parse_path_name(path_name, namespaces).is_ok()
}

/// True when the name is a single well-formed element name with a prefix
///
/// Never fails; malformed names are simply not extended.
pub fn is_element_name_extended(element_name: &str) -> bool {
    if element_name.contains(PATH_SEPARATOR) {
        return false;
    }
    parse_element_name(element_name, false)
        .map(|name| name.is_extended())
        .unwrap_or(false)
}

/// A path split into element-name fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathName {
    pub is_relative: bool,
    pub fields: Vec<String>,
}

impl PathName {
    /// Parse and validate a path against the registered namespaces
    pub fn parse(path_name: &str, namespaces: &NamespaceRegistry) -> Result<Self> {
        parse_path_name(path_name, namespaces)
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&unparse_path_name(self.is_relative, &self.fields))
    }
}

/// Split a path into fields, validating each as a non-numeric element name
///
/// A trailing separator yields a final empty field: `"a/b/"` parses to
/// `["a", "b", ""]`. The root path `"/"` has no fields. An empty relative
/// path is rejected.
pub fn parse_path_name(path_name: &str, namespaces: &NamespaceRegistry) -> Result<PathName> {
    let (is_relative, rest) = match path_name.strip_prefix(PATH_SEPARATOR) {
        Some(rest) => (false, rest),
        None => (true, path_name),
    };

    let mut fields = Vec::new();
    let mut remaining = rest;
    while !remaining.is_empty() {
        let (element_name, tail) = match remaining.split_once(PATH_SEPARATOR) {
            Some((head, tail)) => (head, Some(tail)),
            None => (remaining, None),
        };

        check_element_name_legal(element_name, false, namespaces).map_err(|_| {
            E57Error::BadPathName(format!(
                "pathName={} elementName={}",
                path_name, element_name
            ))
        })?;
        fields.push(element_name.to_string());

        match tail {
            None => break,
            Some("") => {
                fields.push(String::new());
                break;
            }
            Some(tail) => remaining = tail,
        }
    }

    if is_relative && fields.is_empty() {
        return Err(E57Error::BadPathName(format!("pathName={}", path_name)));
    }

    Ok(PathName {
        is_relative,
        fields,
    })
}

/// Join fields back into a path
///
/// Separators go between fields only. This is not an exact inverse of
/// [`parse_path_name`]: an absolute path with a single empty field unparses
/// to `"/"`, which parses back with no fields at all.
pub fn unparse_path_name<S: AsRef<str>>(is_relative: bool, fields: &[S]) -> String {
    let mut path = String::new();
    if !is_relative {
        path.push(PATH_SEPARATOR);
    }
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(field.as_ref());
    }
    path
}
