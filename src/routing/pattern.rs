//! Path patterns and variable extraction.

use std::collections::HashMap;
use std::fmt;

use crate::routing::table::RouteError;

/// Raw values captured from placeholder segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariables(HashMap<String, String>);

impl PathVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}

impl FromIterator<(String, String)> for PathVariables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<HashMap<String, String>> for PathVariables {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

/// One `/`-delimited piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `<name>`: matches any non-empty segment.
    Variable(String),
}

/// A parsed route pattern such as `users/<id>/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let mut segments = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for segment in split_path(raw) {
            if let Some(name) = placeholder_name(segment) {
                if name.is_empty() || name.contains(['<', '>']) {
                    return Err(RouteError::InvalidPlaceholder {
                        pattern: raw.to_owned(),
                        segment: segment.to_owned(),
                    });
                }
                if seen.contains(&name) {
                    return Err(RouteError::RepeatedVariable {
                        pattern: raw.to_owned(),
                        name: name.to_owned(),
                    });
                }
                seen.push(name);
                segments.push(Segment::Variable(name.to_owned()));
            } else if segment.contains(['<', '>']) {
                return Err(RouteError::InvalidPlaceholder {
                    pattern: raw.to_owned(),
                    segment: segment.to_owned(),
                });
            } else {
                segments.push(Segment::Literal(segment.to_owned()));
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matches_segments(&split_path(path))
    }

    pub(crate) fn matches_segments(&self, parts: &[&str]) -> bool {
        self.segments.len() == parts.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| match segment {
                    Segment::Literal(literal) => literal == part,
                    Segment::Variable(_) => !part.is_empty(),
                })
    }

    /// Literal text per position, `None` for placeholders.
    ///
    /// Two patterns with the same shape accept exactly the same paths.
    pub(crate) fn shape(&self) -> Vec<Option<&str>> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => Some(literal.as_str()),
                Segment::Variable(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Zip a request path against the pattern it matched and keep the
/// placeholder positions. Values are returned untouched.
pub fn collect_path_variables(request_path: &str, pattern: &str) -> PathVariables {
    split_path(pattern)
        .into_iter()
        .zip(split_path(request_path))
        .filter_map(|(pattern_part, path_part)| {
            placeholder_name(pattern_part).map(|name| (name.to_owned(), path_part.to_owned()))
        })
        .collect()
}

/// Strip one leading and one trailing separator, then split.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

fn placeholder_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('<').and_then(|rest| rest.strip_suffix('>'))
}
