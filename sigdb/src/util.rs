//! Shared utility functions
//!
//! Common algorithms used across the loader, resolver and checker.

// ============================================================================
// Deep recursion
// ============================================================================

const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Run `f`, growing the stack first when it is close to exhausted.
/// Type expressions and ancestor chains nest without a fixed bound.
pub fn with_stack<R, F: FnOnce() -> R>(f: F) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

// ============================================================================
// Levenshtein Distance: Typo Suggestions
// ============================================================================

/// Calculate Levenshtein edit distance between two strings.
/// Uses O(min(m,n)) space with two-row optimization.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Find the most similar name from a list of candidates.
/// Returns `Some(suggestion)` if a match is found within the threshold.
pub fn find_similar_name<'a>(name: &str, candidates: &[&'a str], threshold: usize) -> Option<&'a str> {
    let mut best_match: Option<&str> = None;
    let mut best_distance = usize::MAX;

    for &candidate in candidates {
        let distance = levenshtein_distance(name, candidate);
        if distance < best_distance && distance <= threshold {
            best_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match
}

/// Edit-distance threshold scaled to the name: short names tolerate one edit.
pub fn suggestion_threshold(name: &str) -> usize {
    (name.chars().count() / 3).clamp(1, 3)
}

/// Format a "did you mean" suggestion hint for an unknown name.
pub fn format_suggestion_hint(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(name) => format!("\n  hint: did you mean `{}`?", name),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein_distance("Integer", "Integer"), 0);
    }

    #[test]
    fn test_levenshtein_single_edit() {
        assert_eq!(levenshtein_distance("Intger", "Integer"), 1);
    }

    #[test]
    fn test_levenshtein_multiple_edits() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_levenshtein_empty_strings() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }

    #[test]
    fn test_find_similar_name_close() {
        assert_eq!(
            find_similar_name("Strng", &["String", "Symbol"], 2),
            Some("String")
        );
    }

    #[test]
    fn test_find_similar_name_none() {
        assert_eq!(find_similar_name("Xyz", &["String", "Symbol"], 2), None);
    }

    #[test]
    fn test_suggestion_threshold_bounds() {
        assert_eq!(suggestion_threshold("IO"), 1);
        assert_eq!(suggestion_threshold("Integer"), 2);
        assert_eq!(suggestion_threshold("ObjectSpaceWeakKeyMap"), 3);
    }

    #[test]
    fn test_format_suggestion_hint() {
        assert!(format_suggestion_hint(Some("Integer")).contains("did you mean `Integer`?"));
        assert!(format_suggestion_hint(None).is_empty());
    }

    #[test]
    fn test_with_stack_returns_value() {
        assert_eq!(with_stack(|| 41 + 1), 42);
    }
}
