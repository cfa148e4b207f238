//! Skip-group records: acquisition rows or planes that are zero-filled at load
//! time instead of being read from the raw file.
//!
//! Textual form: each group is `[c1,c2,...]` with `-1` as a wildcard, followed
//! by `@R` or `@I` when only one component of the first indirect dimension's
//! phase pair is skipped. Groups are comma joined: `[-1,3],[2,-1]@R`.

use std::fmt;

use crate::error::NmrProcError;

const DEFAULT_COMPONENTS: &str = "RI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipGroup {
    /// One entry per indirect dimension; `None` matches any increment.
    pub coords: Vec<Option<usize>>,
    /// Which phase components to zero: "R", "I" or "RI".
    pub components: String,
}

impl SkipGroup {
    pub fn new(coords: &[i64], components: &str) -> Result<Self, NmrProcError> {
        let components = components.to_ascii_uppercase();
        if !matches!(components.as_str(), "R" | "I" | "RI") {
            return Err(NmrProcError::Configuration(format!(
                "skip group components must be R, I or RI, got '{}'",
                components
            )));
        }
        let coords = coords
            .iter()
            .map(|&c| match c {
                -1 => Ok(None),
                c if c >= 0 => Ok(Some(c as usize)),
                c => Err(NmrProcError::Configuration(format!(
                    "skip group coordinate {} is neither -1 nor an index",
                    c
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { coords, components })
    }

    /// True when the group covers the given indirect increments.
    pub fn matches(&self, increments: &[usize]) -> bool {
        self.coords.len() == increments.len()
            && self
                .coords
                .iter()
                .zip(increments)
                .all(|(c, &i)| c.map_or(true, |c| c == i))
    }

    /// True when the phase component (0 = real, 1 = imaginary) is skipped.
    pub fn skips_component(&self, phase: usize) -> bool {
        match phase {
            0 => self.components.contains('R'),
            1 => self.components.contains('I'),
            _ => self.components == DEFAULT_COMPONENTS,
        }
    }
}

impl fmt::Display for SkipGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coords: Vec<String> = self
            .coords
            .iter()
            .map(|c| c.map_or_else(|| "-1".to_string(), |c| c.to_string()))
            .collect();
        write!(f, "[{}]", coords.join(","))?;
        if self.components != DEFAULT_COMPONENTS {
            write!(f, "@{}", self.components)?;
        }
        Ok(())
    }
}

/// Serializes a skip list to its bracketed textual form.
pub fn format_skip_groups(groups: &[SkipGroup]) -> String {
    groups
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the bracketed textual form back into skip groups.
pub fn parse_skip_groups(text: &str) -> Result<Vec<SkipGroup>, NmrProcError> {
    let mut groups = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let body_start = rest.strip_prefix('[').ok_or_else(|| malformed(text))?;
        let close = body_start.find(']').ok_or_else(|| malformed(text))?;
        let coords = body_start[..close]
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| c.parse::<i64>().map_err(|_| malformed(text)))
            .collect::<Result<Vec<_>, _>>()?;
        rest = body_start[close + 1..].trim_start();

        let mut components = DEFAULT_COMPONENTS;
        if let Some(after_at) = rest.strip_prefix('@') {
            let end = after_at.find(',').unwrap_or(after_at.len());
            components = after_at[..end].trim();
            rest = &after_at[end..];
        }
        groups.push(SkipGroup::new(&coords, components)?);

        rest = rest.trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
        } else if !rest.is_empty() {
            return Err(malformed(text));
        }
    }
    Ok(groups)
}

fn malformed(text: &str) -> NmrProcError {
    NmrProcError::Configuration(format!("malformed skip group list '{}'", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_group_roundtrip() {
        let groups = vec![
            SkipGroup::new(&[-1, 3], "RI").unwrap(),
            SkipGroup::new(&[2, -1], "r").unwrap(),
        ];
        let text = format_skip_groups(&groups);
        assert_eq!(text, "[-1,3],[2,-1]@R");
        assert_eq!(parse_skip_groups(&text).unwrap(), groups);
    }

    #[test]
    fn test_matching_with_wildcards() {
        let group = SkipGroup::new(&[-1, 3], "RI").unwrap();
        assert!(group.matches(&[0, 3]));
        assert!(group.matches(&[9, 3]));
        assert!(!group.matches(&[0, 2]));
        assert!(!group.matches(&[3]));
    }

    #[test]
    fn test_component_selection() {
        let real_only = SkipGroup::new(&[1], "R").unwrap();
        assert!(real_only.skips_component(0));
        assert!(!real_only.skips_component(1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_skip_groups("-1,3").is_err());
        assert!(parse_skip_groups("[1,2] [3]").is_err());
        assert!(parse_skip_groups("[1,-4]").is_err());
        assert!(parse_skip_groups("[1]@X").is_err());
        assert!(parse_skip_groups("").unwrap().is_empty());
    }
}
