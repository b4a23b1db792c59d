// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Metadata module reading and writing.
//!
//! The metadata index is stored as a tiny JavaScript module, because the
//! blog's own site generator imports it directly:
//!
//! ```text
//! export const articlesMeta = [
//!   {
//!     id: 'regex-intro',
//!     title: 'Regex 101',
//!     ...
//!     file: 'regex.md'
//!   }
//! ]
//! ```
//!
//! The module is never executed. Instead it is parsed with the tree-sitter
//! JavaScript grammar, and only the literal subset a generated or hand edited
//! index can contain is accepted: `export const|let|var` declarations, array
//! and object literals, strings, numbers, and keyword literals. Comments and
//! trailing commas are fine. Anything else is a syntax error.
//!
//! Writing always produces the canonical generated layout, so that a
//! load-save cycle keeps every field value byte for byte.

use crate::metadata::{MetadataEntry, METADATA_FIELDS};

use tree_sitter::{Node, Parser};

/// Name of the exported array holding all entries.
pub const EXPORT_NAME: &str = "articlesMeta";

/// Render entries as the canonical metadata module.
pub fn format(entries: &[MetadataEntry]) -> String {
    let blocks = entries
        .iter()
        .map(|entry| {
            let lines = entry
                .fields()
                .iter()
                .map(|(field, value)| format!("    {field}: '{}'", escape(value)))
                .collect::<Vec<_>>();
            format!("  {{\n{}\n  }}", lines.join(",\n"))
        })
        .collect::<Vec<_>>();

    let body = blocks.join(",\n\n");
    if body.is_empty() {
        format!("export const {EXPORT_NAME} = [\n]\n")
    } else {
        format!("export const {EXPORT_NAME} = [\n{body}\n]\n")
    }
}

/// Escape a value for a single quoted string literal.
///
/// Backslashes go first so the escapes added afterwards are not doubled.
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

/// Parse metadata module into entries.
///
/// Every known field is coerced to a string, where non-string values and
/// missing fields become empty strings. Unknown fields are ignored.
///
/// # Errors
///
/// - Return [`CodecError::Grammar`] if JavaScript grammar cannot be loaded.
/// - Return [`CodecError::Syntax`] if module cannot be parsed.
/// - Return [`CodecError::MissingExport`] if module lacks `articlesMeta`.
/// - Return [`CodecError::NotArray`] if `articlesMeta` is not an array.
pub fn parse(source: &str) -> Result<Vec<MetadataEntry>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|error| CodecError::Grammar(error.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CodecError::Grammar("parser produced no syntax tree".into()))?;

    let root = tree.root_node();
    if let Some(node) = first_error(root) {
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            "unexpected syntax".into()
        };
        return Err(syntax_error(source, node, message));
    }

    let mut exports = Vec::new();
    for statement in named_children(root) {
        exports.extend(export(source, statement)?);
    }

    let value = exports
        .into_iter()
        .rev()
        .find_map(|(name, value)| (name == EXPORT_NAME).then_some(value))
        .ok_or(CodecError::MissingExport)?;

    let Literal::Array(items) = value else {
        return Err(CodecError::NotArray);
    };

    Ok(items.into_iter().map(coerce_entry).collect())
}

fn coerce_entry(item: Literal) -> MetadataEntry {
    let mut entry = MetadataEntry::default();
    let Literal::Object(properties) = item else {
        return entry;
    };

    for field in METADATA_FIELDS {
        // INVARIANT: Last duplicate key wins, like in an object literal.
        let value = properties
            .iter()
            .rev()
            .find(|(key, _)| key == field)
            .and_then(|(_, value)| match value {
                Literal::Str(text) => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();

        if let Some(slot) = entry.field_mut(field) {
            *slot = value;
        }
    }

    entry
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Literal {
    Str(String),
    Array(Vec<Literal>),
    Object(Vec<(String, Literal)>),
    Other,
}

// Collect `export const|let|var name = value` declarations of one statement.
fn export(source: &str, statement: Node<'_>) -> Result<Vec<(String, Literal)>> {
    if statement.kind() != "export_statement" {
        return Err(syntax_error(source, statement, "expected export declaration"));
    }

    let declaration = statement
        .child_by_field_name("declaration")
        .filter(|node| matches!(node.kind(), "lexical_declaration" | "variable_declaration"))
        .ok_or_else(|| syntax_error(source, statement, "expected const, let or var"))?;

    let mut exports = Vec::new();
    for declarator in named_children(declaration) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }

        let name = declarator
            .child_by_field_name("name")
            .filter(|node| node.kind() == "identifier")
            .ok_or_else(|| syntax_error(source, declarator, "expected export name"))?;
        let value = declarator
            .child_by_field_name("value")
            .ok_or_else(|| syntax_error(source, declarator, "expected '='"))?;
        exports.push((text(source, name).to_string(), literal(source, value)?));
    }

    Ok(exports)
}

fn literal(source: &str, node: Node<'_>) -> Result<Literal> {
    match node.kind() {
        "string" => string(source, node).map(Literal::Str),
        "array" => named_children(node)
            .into_iter()
            .map(|item| literal(source, item))
            .collect::<Result<Vec<_>>>()
            .map(Literal::Array),
        "object" => named_children(node)
            .into_iter()
            .map(|member| property(source, member))
            .collect::<Result<Vec<_>>>()
            .map(Literal::Object),
        "number" | "true" | "false" | "null" | "undefined" => Ok(Literal::Other),
        "identifier" if matches!(text(source, node), "undefined" | "NaN" | "Infinity") => {
            Ok(Literal::Other)
        }
        "unary_expression" if is_signed_number(source, node) => Ok(Literal::Other),
        _ => Err(syntax_error(source, node, "unsupported expression")),
    }
}

fn property(source: &str, member: Node<'_>) -> Result<(String, Literal)> {
    if member.kind() != "pair" {
        return Err(syntax_error(source, member, "unsupported expression"));
    }

    let key = member
        .child_by_field_name("key")
        .ok_or_else(|| syntax_error(source, member, "expected property name"))?;
    let key = match key.kind() {
        "property_identifier" | "number" => text(source, key).to_string(),
        "string" => string(source, key)?,
        _ => return Err(syntax_error(source, key, "unsupported property name")),
    };
    let value = member
        .child_by_field_name("value")
        .ok_or_else(|| syntax_error(source, member, "expected property value"))?;

    Ok((key, literal(source, value)?))
}

fn is_signed_number(source: &str, node: Node<'_>) -> bool {
    let operator = node.child_by_field_name("operator");
    let argument = node.child_by_field_name("argument");
    matches!(
        (operator, argument),
        (Some(operator), Some(argument))
            if matches!(text(source, operator), "-" | "+") && argument.kind() == "number"
    )
}

// Strings arrive as fragments and escape sequences. Escapes are decoded to
// UTF-16 style code units first, so that surrogate pairs spelled as two
// consecutive "\uXXXX" escapes can be joined afterwards.
fn string(source: &str, node: Node<'_>) -> Result<String> {
    let mut units = Vec::new();
    for part in named_children(node) {
        let raw = text(source, part);
        match part.kind() {
            "escape_sequence" => {
                let body = raw.strip_prefix('\\').unwrap_or(raw);
                match escape_unit(body) {
                    Some(Some(unit)) => units.push(unit),
                    Some(None) => {}
                    None => return Err(syntax_error(source, part, "invalid escape sequence")),
                }
            }
            _ => units.extend(raw.chars().map(u32::from)),
        }
    }

    join_units(units).ok_or_else(|| syntax_error(source, node, "invalid unicode escape"))
}

// Decode body of escape sequence without its backslash. Inner `None` marks a
// line continuation.
fn escape_unit(body: &str) -> Option<Option<u32>> {
    let mut chars = body.chars();
    let first = chars.next()?;
    let rest = chars.as_str();
    let unit = match first {
        'n' => u32::from('\n'),
        'r' => u32::from('\r'),
        't' => u32::from('\t'),
        'b' => 0x8,
        'f' => 0xC,
        'v' => 0xB,
        '0'..='7' => u32::from_str_radix(body, 8).ok()?,
        'x' if rest.len() == 2 => hex(rest)?,
        'x' => return None,
        'u' => match rest.strip_prefix('{').and_then(|digits| digits.strip_suffix('}')) {
            Some(digits) => hex(digits)?,
            None if rest.len() == 4 => hex(rest)?,
            None => return None,
        },
        '\r' | '\n' | '\u{2028}' | '\u{2029}' => return Some(None),
        other => u32::from(other),
    };

    Some(Some(unit))
}

fn hex(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }

    u32::from_str_radix(digits, 16).ok()
}

fn join_units(units: Vec<u32>) -> Option<String> {
    let mut out = String::new();
    let mut units = units.into_iter();
    while let Some(unit) = units.next() {
        let code = match unit {
            0xD800..=0xDBFF => {
                let low = units.next().filter(|low| (0xDC00..0xE000).contains(low))?;
                0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)
            }
            _ => unit,
        };
        // INVARIANT: Lone low surrogates and values past U+10FFFF are rejected here.
        out.push(char::from_u32(code)?);
    }

    Some(out)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let children = node.children(&mut node.walk()).collect::<Vec<_>>();
    children.into_iter().find_map(first_error)
}

// Named children without comments.
fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    node.named_children(&mut node.walk())
        .filter(|child| !child.is_extra())
        .collect()
}

fn text<'src>(source: &'src str, node: Node<'_>) -> &'src str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn syntax_error(source: &str, node: Node<'_>, message: impl Into<String>) -> CodecError {
    let consumed = source.get(..node.start_byte()).unwrap_or(source);
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map(|tail| tail.chars().count() + 1)
        .unwrap_or(1);

    CodecError::Syntax {
        message: message.into(),
        line,
        column,
    }
}

/// Metadata module codec error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// JavaScript grammar cannot be loaded.
    #[error("failed to load JavaScript grammar: {0}")]
    Grammar(String),

    /// Module is not valid literal syntax.
    #[error("{message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    /// Module does not export the entry array.
    #[error("metadata 文件缺少 articlesMeta 导出")]
    MissingExport,

    /// Exported value is not an array.
    #[error("metadata 文件格式不正确")]
    NotArray,
}

/// Friendly result alias :3
pub type Result<T, E = CodecError> = std::result::Result<T, E>;
