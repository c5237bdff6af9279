//! Applicability filters and the property context they are evaluated against.
//!
//! Filters use the LDAP-style syntax common to provisioning metadata:
//! `(&(os=linux)(|(arch=x86_64)(arch=aarch64)))`. Supported operators are
//! equality, presence (`(key=*)`), substring wildcards (`(key=lin*)`),
//! approximate equality (`~=`, case and whitespace insensitive) and ordering
//! (`>=`, `<=`, compared as versions when both sides parse as versions).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use prov_version::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid filter \"{filter}\" at position {position}: {reason}")]
pub struct FilterError {
    pub filter: String,
    pub position: usize,
    pub reason: String,
}

/// External properties (operating system, architecture, locale, ...) used to
/// decide which units and requirements apply to a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyContext {
    properties: IndexMap<String, String>,
}

impl PropertyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.properties.iter()
    }
}

/// Comparison operator of a simple filter item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Equal,
    Approx,
    GreaterOrEqual,
    LessOrEqual,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "=",
            FilterOp::Approx => "~=",
            FilterOp::GreaterOrEqual => ">=",
            FilterOp::LessOrEqual => "<=",
        }
    }
}

/// A parsed applicability filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// `(key=*)`
    Present(String),
    Compare {
        key: String,
        op: FilterOp,
        value: String,
    },
    /// `(key=a*b*c)`; `parts` are the literal pieces between wildcards, the
    /// first and last may be empty.
    Substring {
        key: String,
        parts: Vec<String>,
    },
}

impl Filter {
    /// Parse a filter string
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let mut parser = Parser::new(input);
        parser.skip_whitespace();
        let filter = parser.parse_filter()?;
        parser.skip_whitespace();
        if parser.pos < parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(filter)
    }

    /// Shorthand for `(key=value)`
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Compare {
            key: key.into(),
            op: FilterOp::Equal,
            value: value.into(),
        }
    }

    /// Evaluate the filter against a property context
    pub fn matches(&self, context: &PropertyContext) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(context)),
            Filter::Or(items) => items.iter().any(|f| f.matches(context)),
            Filter::Not(inner) => !inner.matches(context),
            Filter::Present(key) => context.get(key).is_some(),
            Filter::Compare { key, op, value } => {
                let Some(actual) = context.get(key) else {
                    return false;
                };
                match op {
                    FilterOp::Equal => actual == value,
                    FilterOp::Approx => normalize_approx(actual) == normalize_approx(value),
                    FilterOp::GreaterOrEqual => compare_values(actual, value) != Ordering::Less,
                    FilterOp::LessOrEqual => compare_values(actual, value) != Ordering::Greater,
                }
            }
            Filter::Substring { key, parts } => match context.get(key) {
                Some(actual) => matches_substring(actual, parts),
                None => false,
            },
        }
    }
}

fn normalize_approx(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Versions compare as versions, integers numerically, everything else lexically
fn compare_values(actual: &str, expected: &str) -> Ordering {
    if let (Ok(a), Ok(b)) = (actual.trim().parse::<i64>(), expected.trim().parse::<i64>()) {
        return a.cmp(&b);
    }
    if let (Ok(a), Ok(b)) = (Version::parse(actual), Version::parse(expected)) {
        return a.cmp(&b);
    }
    actual.cmp(expected)
}

fn matches_substring(value: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    let Some(mut remaining) = value.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };

    for part in middle {
        match remaining.find(part.as_str()) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> FilterError {
        FilterError {
            filter: self.input.to_string(),
            position: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.expect('(')?;
        self.skip_whitespace();

        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_whitespace();
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };

        self.skip_whitespace();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut items = Vec::new();
        self.skip_whitespace();
        while self.peek() == Some('(') {
            items.push(self.parse_filter()?);
            self.skip_whitespace();
        }
        if items.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let key: String = self.chars[start..self.pos].iter().collect::<String>().trim().to_string();
        if key.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                FilterOp::Equal
            }
            Some(c @ ('~' | '<' | '>')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '~' => FilterOp::Approx,
                    '<' => FilterOp::LessOrEqual,
                    _ => FilterOp::GreaterOrEqual,
                }
            }
            _ => return Err(self.error("expected an operator")),
        };

        // Literal pieces separated by unescaped '*'
        let mut parts = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    self.pos += 1;
                    if let Some(current) = parts.last_mut() {
                        current.push(escaped);
                    }
                }
                Some('*') => {
                    self.pos += 1;
                    parts.push(String::new());
                }
                Some(c) => {
                    self.pos += 1;
                    if let Some(current) = parts.last_mut() {
                        current.push(c);
                    }
                }
            }
        }

        if parts.len() == 1 {
            let value = parts.pop().unwrap_or_default();
            return Ok(Filter::Compare { key, op, value });
        }

        if op != FilterOp::Equal {
            return Err(self.error("wildcards are only allowed with '='"));
        }

        if parts.len() == 2 && parts.iter().all(String::is_empty) {
            return Ok(Filter::Present(key));
        }

        Ok(Filter::Substring { key, parts })
    }
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(items) | Filter::Or(items) => {
                let op = if matches!(self, Filter::And(_)) { '&' } else { '|' };
                write!(f, "({}", op)?;
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::Present(key) => write!(f, "({}=*)", key),
            Filter::Compare { key, op, value } => {
                write!(f, "({}{}{})", key, op.as_str(), escape_value(value))
            }
            Filter::Substring { key, parts } => {
                let pattern: Vec<String> = parts.iter().map(|p| escape_value(p)).collect();
                write!(f, "({}={})", key, pattern.join("*"))
            }
        }
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Filter {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Filter> for String {
    fn from(filter: Filter) -> Self {
        filter.to_string()
    }
}
