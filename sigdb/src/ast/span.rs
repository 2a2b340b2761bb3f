//! Source location tracking

use serde::{Deserialize, Serialize};

/// A byte range in a declaration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// True when `other` starts exactly where `self` ends (no whitespace between)
    pub fn touches(self, other: Span) -> bool {
        self.end == other.start
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A value with source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

/// A span inside a named declaration file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub span: Span,
}

impl Location {
    pub fn new(file: impl Into<String>, span: Span) -> Self {
        Self {
            file: file.into(),
            span,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge_non_overlapping() {
        let merged = Span::new(0, 5).merge(Span::new(10, 15));
        assert_eq!(merged, Span::new(0, 15));
    }

    #[test]
    fn test_span_merge_contained() {
        let merged = Span::new(0, 100).merge(Span::new(20, 30));
        assert_eq!(merged, Span::new(0, 100));
    }

    #[test]
    fn test_span_merge_commutative() {
        let a = Span::new(10, 20);
        let b = Span::new(5, 15);
        assert_eq!(a.merge(b), b.merge(a));
    }

    #[test]
    fn test_span_touches() {
        assert!(Span::new(0, 5).touches(Span::new(5, 6)));
        assert!(!Span::new(0, 5).touches(Span::new(6, 7)));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(format!("{}", Span::new(42, 99)), "42..99");
    }

    #[test]
    fn test_span_roundtrip_range_conversion() {
        let span = Span::new(42, 99);
        let range: std::ops::Range<usize> = span.into();
        let back: Span = range.into();
        assert_eq!(span, back);
    }

    #[test]
    fn test_spanned_map_preserves_span() {
        let s = Spanned::new(10, Span::new(0, 5));
        let mapped = s.map(|n| n.to_string());
        assert_eq!(mapped.node, "10");
        assert_eq!(mapped.span, Span::new(0, 5));
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new("core/object.sig", Span::new(3, 9));
        assert_eq!(loc.to_string(), "core/object.sig:3..9");
    }
}
