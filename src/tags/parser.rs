//! Tag file parsing.
//!
//! Format (one record per line, tab separated):
//!
//! ```text
//! !_TAG_FILE_FORMAT	2	/extended format/
//! open	/src/io.c	12;"	kind:function	language:C	signature:(const char *path)
//! ```
//!
//! Lines starting with `!` are headers. Field 0 is the element name, field 1
//! the file, field 2 the line anchor (`<line>;"`), and every further field an
//! extension `key:value`. A bare extension without a colon is the kind.

use crate::fragment::{FragmentType, TypeKeyword};
use crate::types::{TagKind, TagRecord};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Parse one tag file line. Returns `None` for headers, blank lines and
/// records without an element or file name.
pub fn parse_tag_line(line: &str) -> Option<TagRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() || line.starts_with('!') {
        return None;
    }

    let mut fields = line.split('\t');
    let element_name = fields.next().filter(|s| !s.is_empty())?;
    let file = fields.next().filter(|s| !s.is_empty())?;
    let line_number = fields.next().map(parse_line_anchor).unwrap_or(-1);

    let mut extra_fields = BTreeMap::new();
    for field in fields.filter(|f| !f.is_empty()) {
        match field.split_once(':') {
            Some((key, value)) => {
                extra_fields.insert(key.to_string(), value.to_string());
            }
            None => {
                extra_fields.insert("kind".to_string(), field.to_string());
            }
        }
    }

    let kind = extra_fields
        .get("kind")
        .map(|k| TagKind::from_name(k))
        .unwrap_or(TagKind::Unknown);

    Some(TagRecord {
        element_name: element_name.to_string(),
        file: PathBuf::from(file),
        line: line_number,
        kind,
        extra_fields,
    })
}

/// `12;"` -> 11. Anything unreadable, zero, negative or out of range -> -1.
fn parse_line_anchor(anchor: &str) -> i64 {
    let number = anchor.split(';').next().unwrap_or_default();
    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|line| line.checked_sub(1))
        .and_then(|line| i64::try_from(line).ok())
        .unwrap_or(-1)
}

// ============================================================================
// Type text
// ============================================================================

const BUILTIN_TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "wchar_t", "char16_t", "char32_t", "auto",
];

fn array_suffix() -> &'static Regex {
    static ARRAY_SUFFIX: OnceLock<Regex> = OnceLock::new();
    ARRAY_SUFFIX.get_or_init(|| Regex::new(r"\[\s*(\d*)\s*\]\s*$").expect("valid regex"))
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == ':')
}

fn tokenize(text: &str) -> Vec<String> {
    text.replace('*', " * ")
        .replace('&', " & ")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

fn split_qualified(name: &str) -> Vec<String> {
    name.split("::")
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Parse a `typeref` extension value such as `typename:const char *` or
/// `struct:node`.
pub fn parse_typeref(value: &str) -> Option<FragmentType> {
    let (category, name) = value.split_once(':')?;
    if TypeKeyword::from_name(category).is_some() {
        return parse_type_text(&format!("{} {}", category, name));
    }
    if category == "typename" {
        return parse_type_text(name);
    }
    None
}

/// Parse a C/C++ type as spelled in source, e.g. `const struct node **`.
pub fn parse_type_text(text: &str) -> Option<FragmentType> {
    let mut text = text.trim().to_string();
    let mut array_sizes = Vec::new();
    while let Some(captures) = array_suffix().captures(&text) {
        let size = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
        array_sizes.push(size);
        let start = captures.get(0).map(|m| m.start()).unwrap_or(text.len());
        text.truncate(start);
    }

    let tokens = tokenize(&text);
    let mut leading_const = false;
    let mut leading_volatile = false;
    let mut keyword = None;
    let mut base_words: Vec<&str> = Vec::new();
    let mut rest = tokens.iter().map(|s| s.as_str()).peekable();

    while let Some(token) = rest.peek().copied() {
        match token {
            "const" => leading_const = true,
            "volatile" => leading_volatile = true,
            "*" | "&" => break,
            other => match TypeKeyword::from_name(other) {
                Some(k) => keyword = Some(k),
                None => base_words.push(other),
            },
        }
        rest.next();
    }
    if base_words.is_empty() {
        return None;
    }

    let mut ty = match keyword {
        Some(keyword) => FragmentType::Named {
            keyword,
            name: split_qualified(base_words.join(" ").as_str()),
        },
        None if base_words.iter().all(|w| BUILTIN_TYPE_WORDS.contains(w)) => {
            FragmentType::Basic(base_words.join(" "))
        }
        None => FragmentType::Named {
            keyword: TypeKeyword::Plain,
            name: split_qualified(base_words.join(" ").as_str()),
        },
    };
    if leading_const || leading_volatile {
        ty = FragmentType::Qualifier {
            is_const: leading_const,
            is_volatile: leading_volatile,
            target: Box::new(ty),
        };
    }

    // Declarator part: pointers, each optionally followed by qualifiers.
    // References are read as the referenced type.
    for token in rest {
        match token {
            "*" => ty = FragmentType::Pointer(Box::new(ty)),
            "const" | "volatile" => {
                ty = FragmentType::Qualifier {
                    is_const: token == "const",
                    is_volatile: token == "volatile",
                    target: Box::new(ty),
                }
            }
            _ => {}
        }
    }

    for size in array_sizes {
        ty = FragmentType::Array {
            size,
            element: Box::new(ty),
        };
    }
    Some(ty)
}

/// Parse a `signature` extension value such as `(int fd, char *buf)` into
/// parameter types. Parameter names are dropped.
pub fn parse_signature(signature: &str) -> Vec<FragmentType> {
    // C++ signatures may carry trailing qualifiers: `(int n) const`.
    let signature = signature.trim();
    let inner = match (signature.find('('), signature.rfind(')')) {
        (Some(start), Some(end)) if start < end => &signature[start + 1..end],
        _ => signature,
    }
    .trim();
    if inner.is_empty() || inner == "void" {
        return Vec::new();
    }

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                params.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    params.push(current);

    params
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p == "..." {
                return FragmentType::Basic("...".to_string());
            }
            let without_name = strip_parameter_name(p);
            parse_type_text(&without_name).unwrap_or_else(|| FragmentType::Basic(p.to_string()))
        })
        .collect()
}

fn strip_parameter_name(param: &str) -> String {
    // Keep array suffixes attached to the type.
    let (declaration, suffix) = match param.find('[') {
        Some(index) => (&param[..index], &param[index..]),
        None => (param, ""),
    };
    let mut tokens = tokenize(declaration);
    if tokens.len() >= 2 {
        let last = &tokens[tokens.len() - 1];
        let previous = &tokens[tokens.len() - 2];
        let previous_is_keyword = TypeKeyword::from_name(previous).is_some()
            || previous == "const"
            || previous == "volatile";
        if is_identifier(last) && !BUILTIN_TYPE_WORDS.contains(&last.as_str()) && !previous_is_keyword {
            tokens.pop();
        }
    }
    format!("{}{}", tokens.join(" "), suffix)
}
