// In: src/indexing/acq_order.rs

//! Parsing and validation of acquisition-order strings.
//!
//! An acquisition order lists, fastest-varying first, the axes along which raw
//! records were written to disk. Each token is two characters: a role
//! (`p` phase, `d` delay/time increment, `a` array) and a 1-based dimension
//! number. `"p1,d2,a3"` therefore reads "phase of dim 1 varies fastest, then
//! the increments of dim 2, then the array axis of dim 3".
//!
//! A single all-digit token longer than two characters (`"321"`) is the legacy
//! shorthand: it lists every dimension, slowest first, and expands to the
//! phases and then the delays of the indirect dimensions.

use std::fmt;

use crate::error::NmrProcError;

/// The role an axis plays in the on-disk record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisRole {
    Phase,
    Delay,
    Array,
}

impl AxisRole {
    fn code(&self) -> char {
        match self {
            AxisRole::Phase => 'p',
            AxisRole::Delay => 'd',
            AxisRole::Array => 'a',
        }
    }

    fn from_code(c: char) -> Option<Self> {
        match c {
            'p' => Some(AxisRole::Phase),
            'd' => Some(AxisRole::Delay),
            'a' => Some(AxisRole::Array),
            _ => None,
        }
    }
}

/// One `p1`/`d2`/`a3` style token. `dim` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcqToken {
    pub role: AxisRole,
    pub dim: usize,
}

impl fmt::Display for AcqToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.role.code(), self.dim)
    }
}

/// A validated acquisition order for an `ndim`-dimensional acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcqOrder {
    tokens: Vec<AcqToken>,
}

impl AcqOrder {
    /// The order assumed when the instrument does not record one: phases
    /// fastest (implicit), then the delays of dims 2..=ndim.
    pub fn default_for(ndim: usize) -> Self {
        let tokens = (2..=ndim)
            .map(|dim| AcqToken {
                role: AxisRole::Delay,
                dim,
            })
            .collect();
        Self { tokens }
    }

    /// Parses and validates `text` against an `ndim`-dimensional acquisition.
    pub fn parse(text: &str, ndim: usize) -> Result<Self, NmrProcError> {
        let raw: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        if raw.is_empty() {
            return Ok(Self::default_for(ndim));
        }

        let tokens = if raw.len() == 1 && raw[0].len() > 2 && raw[0].chars().all(|c| c.is_ascii_digit()) {
            expand_legacy(raw[0], ndim)?
        } else {
            raw.iter()
                .map(|t| parse_token(t, ndim))
                .collect::<Result<Vec<_>, _>>()?
        };

        let order = Self { tokens };
        order.validate(ndim)?;
        Ok(order)
    }

    pub fn tokens(&self) -> &[AcqToken] {
        &self.tokens
    }

    pub fn contains(&self, role: AxisRole, dim: usize) -> bool {
        self.tokens.iter().any(|t| t.role == role && t.dim == dim)
    }

    fn validate(&self, ndim: usize) -> Result<(), NmrProcError> {
        let delays: Vec<usize> = self
            .tokens
            .iter()
            .filter(|t| t.role == AxisRole::Delay)
            .map(|t| t.dim)
            .collect();
        if delays.len() != ndim.saturating_sub(1) {
            return Err(NmrProcError::Configuration(format!(
                "acquisition order '{}' has {} delay tokens, expected {}",
                self,
                delays.len(),
                ndim.saturating_sub(1)
            )));
        }
        if delays.iter().any(|&d| d < 2) {
            return Err(NmrProcError::Configuration(format!(
                "acquisition order '{}' has a delay token for the direct dimension",
                self
            )));
        }
        for (i, a) in self.tokens.iter().enumerate() {
            if self.tokens[i + 1..].contains(a) {
                return Err(NmrProcError::Configuration(format!(
                    "acquisition order '{}' repeats token '{}'",
                    self, a
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for AcqOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.tokens.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", joined.join(","))
    }
}

fn parse_token(token: &str, ndim: usize) -> Result<AcqToken, NmrProcError> {
    let bad = || NmrProcError::Configuration(format!("malformed acquisition order token '{}'", token));
    let mut chars = token.chars();
    let (Some(role), Some(digit), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(bad());
    };
    let role = AxisRole::from_code(role.to_ascii_lowercase()).ok_or_else(bad)?;
    let dim = digit.to_digit(10).ok_or_else(bad)? as usize;
    if dim == 0 || dim > ndim {
        return Err(NmrProcError::Configuration(format!(
            "acquisition order token '{}' names dimension {} of a {}D acquisition",
            token, dim, ndim
        )));
    }
    Ok(AcqToken { role, dim })
}

/// Expands the legacy digit shorthand (`"321"`, slowest dimension first).
fn expand_legacy(text: &str, ndim: usize) -> Result<Vec<AcqToken>, NmrProcError> {
    let dims: Vec<usize> = text
        .chars()
        .filter_map(|c| c.to_digit(10).map(|d| d as usize))
        .collect();
    let mut sorted = dims.clone();
    sorted.sort_unstable();
    if sorted != (1..=ndim).collect::<Vec<_>>() {
        return Err(NmrProcError::Configuration(format!(
            "legacy acquisition order '{}' does not list each of {} dimensions once",
            text, ndim
        )));
    }
    let indirect: Vec<usize> = dims.iter().rev().copied().filter(|&d| d != 1).collect();
    let mut tokens: Vec<AcqToken> = indirect
        .iter()
        .map(|&dim| AcqToken {
            role: AxisRole::Phase,
            dim,
        })
        .collect();
    tokens.extend(indirect.iter().map(|&dim| AcqToken {
        role: AxisRole::Delay,
        dim,
    }));
    Ok(tokens)
}
