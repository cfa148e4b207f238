// In: src/pipeline/models.rs

//! The typed model of a processing pipeline.
//!
//! An `Operation` is a named step with an ordered parameter list and a
//! disabled flag. A `DimKey` names the dimension block an operation list
//! belongs to. Both keep their textual form only at the engine boundary:
//! `Operation` serializes to `NAME(key=value,...)` and parses back to an equal
//! value.

use std::cmp::Ordering;
use std::fmt;

use crate::error::NmrProcError;
use crate::pipeline::registry::compare_dim_keys;

/// Marker appended to the parameter list of a disabled operation.
const DISABLED_KEY: &str = "disabled";

//==================================================================================
// 1. Operation
//==================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    /// Parameters in written order. Positional arguments have an empty key.
    params: Vec<(String, String)>,
    disabled: bool,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            disabled: false,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_positional(mut self, value: impl Into<String>) -> Self {
        self.params.push((String::new(), value.into()));
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Parses `NAME`, `NAME()` or `NAME(args)`.
    ///
    /// Arguments are split on commas outside brackets and quotes; an argument
    /// with a top-level `=` and an identifier before it is a keyword argument.
    pub fn parse(text: &str) -> Result<Self, NmrProcError> {
        let text = text.trim();
        let (name, args) = match text.find('(') {
            Some(open) => {
                let inner = text[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| syntax(format!("operation '{}' is missing ')'", text)))?;
                (text[..open].trim(), inner)
            }
            None => (text, ""),
        };
        if !is_identifier(name) {
            return Err(syntax(format!("'{}' is not a valid operation name", name)));
        }

        let mut op = Operation::new(name);
        for arg in split_top_level(args, ',')? {
            let arg = arg.trim();
            if arg.is_empty() {
                continue;
            }
            let keyword = find_top_level(arg, '=')
                .map(|eq| (arg[..eq].trim(), arg[eq + 1..].trim()))
                .filter(|(key, _)| is_identifier(key));
            match keyword {
                Some((key, value)) if key == DISABLED_KEY => {
                    op.disabled = value.eq_ignore_ascii_case("true");
                }
                Some((key, value)) => op.params.push((key.to_string(), value.to_string())),
                None => op.params.push((String::new(), arg.to_string())),
            }
        }
        Ok(op)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Value of keyword argument `key`, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `index`-th positional argument.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k.is_empty())
            .nth(index)
            .map(|(_, v)| v.as_str())
    }

    /// Numeric keyword argument, or `default` when absent.
    pub fn param_f64(&self, key: &str, default: f64) -> Result<f64, NmrProcError> {
        match self.param(key) {
            Some(v) => v.parse::<f64>().map_err(|_| {
                NmrProcError::EngineFault(format!("{}: '{}={}' is not a number", self.name, key, v))
            }),
            None => Ok(default),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| if k.is_empty() { v.clone() } else { format!("{}={}", k, v) })
            .collect();
        if self.disabled {
            args.push(format!("{}=True", DISABLED_KEY));
        }
        write!(f, "{}({})", self.name, args.join(","))
    }
}

//==================================================================================
// 2. Dimension Keys
//==================================================================================

/// What a dimension key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimKind {
    /// `D<list>`: acquisition dimensions of the raw data.
    Dataset,
    /// `P<list>`: dimensions of the output dataset, processed afterwards.
    Post,
    /// `D_ALL`: the whole dataset.
    All,
}

/// A validated dimension key such as `D1`, `D2,3`, `P1` or `D_ALL`.
///
/// Keys order by [`compare_dim_keys`], so a comma key sorts before the single
/// key it starts with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimKey(String);

impl DimKey {
    pub const ALL: &'static str = "D_ALL";

    pub fn parse(text: &str) -> Result<Self, NmrProcError> {
        let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if text == Self::ALL {
            return Ok(Self(text));
        }
        let bad = || NmrProcError::Configuration(format!("malformed dimension key '{}'", text));
        let mut chars = text.chars();
        match chars.next() {
            Some('D') | Some('P') => {}
            _ => return Err(bad()),
        }
        let list = chars.as_str();
        let valid = !list.is_empty()
            && list
                .split(',')
                .all(|d| d.parse::<usize>().map_or(false, |d| d > 0));
        if !valid {
            return Err(bad());
        }
        Ok(Self(text))
    }

    /// The single acquisition-dimension key `D<dim>` (1-based).
    pub fn dim(dim: usize) -> Self {
        Self(format!("D{}", dim))
    }

    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> DimKind {
        if self.0 == Self::ALL {
            DimKind::All
        } else if self.0.starts_with('P') {
            DimKind::Post
        } else {
            DimKind::Dataset
        }
    }

    /// The 1-based dimensions the key lists; empty for `D_ALL`.
    pub fn dims(&self) -> Vec<usize> {
        match self.kind() {
            DimKind::All => Vec::new(),
            _ => self.0[1..].split(',').filter_map(|d| d.parse().ok()).collect(),
        }
    }

    /// True for the leading acquisition dimension's key, `D1`.
    pub fn is_primary(&self) -> bool {
        self.0 == "D1"
    }

    /// True when the key addresses exactly acquisition dimension `dim`.
    pub fn is_single_dim(&self, dim: usize) -> bool {
        self.kind() == DimKind::Dataset && self.dims() == [dim]
    }
}

impl fmt::Display for DimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for DimKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_dim_keys(Some(&self.0), Some(&other.0))
    }
}

impl PartialOrd for DimKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

//==================================================================================
// 3. Argument Scanning Helpers
//==================================================================================

fn syntax(message: String) -> NmrProcError {
    NmrProcError::ScriptSyntax { line: 0, message }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits `text` on `sep` where it is not nested in brackets or quotes.
pub(crate) fn split_top_level(text: &str, sep: char) -> Result<Vec<&str>, NmrProcError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, '(') | (None, '[') | (None, '{') => depth += 1,
            (None, ')') | (None, ']') | (None, '}') => {
                depth -= 1;
                if depth < 0 {
                    return Err(syntax(format!("unbalanced brackets in '{}'", text)));
                }
            }
            (None, c) if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(syntax(format!("unterminated bracket or quote in '{}'", text)));
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, '(') | (None, '[') | (None, '{') => depth += 1,
            (None, ')') | (None, ']') | (None, '}') => depth -= 1,
            (None, c) if c == target && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Strips one layer of matching single or double quotes.
pub(crate) fn unquote(text: &str) -> &str {
    let text = text.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = text.strip_prefix(q).and_then(|t| t.strip_suffix(q)) {
            return inner;
        }
    }
    text
}
