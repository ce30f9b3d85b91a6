//! # Path AST & Parser
//!
//! Parses a query/dependency path string into a tree of [`Segment`]s
//! (spec.md §3.5, §4.1). Hand-rolled recursive-descent scanner, matching
//! the teacher crate's parser style (char-by-char, no combinator crate).

mod parser;

pub use parser::parse;

use crate::error::PathParseError;
use std::fmt;

/// One element of a [`Path`].
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A single named or integer-indexed step.
    Part(Part),
    /// A bracketed, comma-separated set of sub-paths, evaluated and
    /// combined together (spec.md §3.5).
    Group(Group),
    /// `lo..hi` / `lo...hi`, expanded to a sequence of integer `Part`s.
    Range(Range),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub part: String,
    pub index: bool,
}

impl Part {
    pub fn new(part: impl Into<String>) -> Part {
        let part = part.into();
        let index = part.parse::<i64>().is_ok();
        Part { part, index }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub options: Vec<Path>,
}

impl Group {
    /// `index?` true iff every option is itself a single index part
    /// (spec.md §3.5).
    pub fn is_index(&self) -> bool {
        self.options.iter().all(|p| {
            p.parts.len() == 1
                && matches!(&p.parts[0], Segment::Part(part) if part.index)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub lo: String,
    pub hi: String,
    pub exclude_end: bool,
}

impl Range {
    /// Expand into the integer `Part`s this range denotes (spec.md §3.5:
    /// "expands to a sequence of integer Parts"). Non-integer bounds
    /// expand lexically is out of scope for the core — ranges are used
    /// for numeric indices.
    pub fn expand(&self) -> Vec<Part> {
        let (Ok(lo), Ok(hi)) = (self.lo.parse::<i64>(), self.hi.parse::<i64>()) else {
            return Vec::new();
        };
        let hi_bound = if self.exclude_end { hi } else { hi + 1 };
        if hi_bound <= lo {
            return Vec::new();
        }
        (lo..hi_bound).map(|i| Part::new(i.to_string())).collect()
    }
}

/// A fully parsed path: a sequence of segments plus whether it was written
/// with a leading `$` root marker (spec.md §3.5).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub parts: Vec<Segment>,
    pub absolute: bool,
}

impl Path {
    /// The empty path (`Path::BLANK` in spec.md terms): resolves to the
    /// node itself.
    pub fn blank() -> Path {
        Path::default()
    }

    pub fn empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The first segment, if any.
    pub fn segment(&self) -> Option<&Segment> {
        self.parts.first()
    }

    /// The path with its first segment removed.
    pub fn next(&self) -> Path {
        Path {
            parts: self.parts.iter().skip(1).cloned().collect(),
            absolute: false,
        }
    }

    /// An order-dependent identity suitable for use as a memoization key
    /// component (spec.md §3.5 "identity (order-dependent hash)").
    pub fn identity(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.absolute.hash(&mut hasher);
        for part in &self.parts {
            part.identity_into(&mut hasher);
        }
        hasher.finish()
    }

    /// Append another path's segments after this one's.
    pub fn merge(&self, other: &Path) -> Path {
        let mut parts = self.parts.clone();
        parts.extend(other.parts.iter().cloned());
        Path {
            parts,
            absolute: self.absolute,
        }
    }

    /// Render back to the dotted/bracketed string grammar. Used by the
    /// round-trip property test (spec.md §8.1) and by dynamic-segment
    /// re-materialization (spec.md §4.4).
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.absolute {
            out.push_str("$.");
        }
        for (i, segment) in self.parts.iter().enumerate() {
            match segment {
                Segment::Part(p) => {
                    if i > 0 && !out.ends_with('.') && !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(&p.part);
                }
                Segment::Group(g) => {
                    out.push('[');
                    out.push_str(
                        &g.options
                            .iter()
                            .map(Path::render)
                            .collect::<Vec<_>>()
                            .join(","),
                    );
                    out.push(']');
                }
                Segment::Range(r) => {
                    if i > 0 && !out.ends_with('.') && !out.is_empty() {
                        out.push('.');
                    }
                    let sep = if r.exclude_end { "..." } else { ".." };
                    out.push_str(&format!("{}{sep}{}", r.lo, r.hi));
                }
            }
        }
        out
    }
}

impl Segment {
    fn identity_into(&self, hasher: &mut impl std::hash::Hasher) {
        use std::hash::Hash;
        match self {
            Segment::Part(p) => {
                0u8.hash(hasher);
                p.part.hash(hasher);
            }
            Segment::Group(g) => {
                1u8.hash(hasher);
                for option in &g.options {
                    option.identity().hash(hasher);
                }
            }
            Segment::Range(r) => {
                2u8.hash(hasher);
                r.lo.hash(hasher);
                r.hi.hash(hasher);
                r.exclude_end.hash(hasher);
            }
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Parse `input` into a [`Path`]. When `strip_root` is set, a leading `$.`
/// is removed before parsing (spec.md §4.1).
pub fn parse_path(input: &str, strip_root: bool) -> Result<Path, PathParseError> {
    parse(input, strip_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_path_is_empty() {
        assert!(Path::blank().empty());
    }

    #[test]
    fn range_expands_inclusive_and_exclusive() {
        let inclusive = Range {
            lo: "1".into(),
            hi: "3".into(),
            exclude_end: false,
        };
        assert_eq!(
            inclusive.expand(),
            vec![Part::new("1"), Part::new("2"), Part::new("3")]
        );

        let exclusive = Range {
            lo: "1".into(),
            hi: "3".into(),
            exclude_end: true,
        };
        assert_eq!(exclusive.expand(), vec![Part::new("1"), Part::new("2")]);
    }

    #[test]
    fn group_is_index_requires_every_option_to_be_an_index() {
        let group = Group {
            options: vec![
                Path {
                    parts: vec![Segment::Part(Part::new("0"))],
                    absolute: false,
                },
                Path {
                    parts: vec![Segment::Part(Part::new("name"))],
                    absolute: false,
                },
            ],
        };
        assert!(!group.is_index());
    }

    #[test]
    fn identity_is_order_dependent() {
        let a = parse_path("a.b", false).unwrap();
        let b = parse_path("b.a", false).unwrap();
        assert_ne!(a.identity(), b.identity());
    }
}
