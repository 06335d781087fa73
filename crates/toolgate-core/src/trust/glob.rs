// crates/toolgate-core/src/trust/glob.rs
// ============================================================================
// Module: Tool Name Glob
// Description: Minimal wildcard matcher for trust rule patterns.
// Purpose: Keep policy evaluation predictable without a regex engine.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Patterns support `*` (any run of characters, including none) and `?`
//! (exactly one character). Every other character matches itself,
//! case-sensitively. Matching is linear-time with single-star backtracking.

/// Returns true when `pattern` matches the whole of `name`.
#[must_use]
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0usize, 0usize);
    // Position of the last `*` seen and the name index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(literal) if *literal == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, resume)) => {
                    p = star + 1;
                    n = resume + 1;
                    backtrack = Some((star, resume + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::glob_match;

    #[test]
    fn literals_and_wildcards() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("read_file", "read_file"));
        assert!(!glob_match("read_file", "read_files"));
        assert!(glob_match("read_*", "read_file"));
        assert!(glob_match("read_*", "read_"));
        assert!(!glob_match("read_*", "write_file"));
        assert!(glob_match("*_file", "delete_file"));
        assert!(glob_match("fs.*.delete", "fs.tmp.delete"));
        assert!(!glob_match("fs.*.delete", "fs.tmp.deleted"));
        assert!(glob_match("tool_?", "tool_a"));
        assert!(!glob_match("tool_?", "tool_"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!glob_match("Read_*", "read_file"));
    }

    proptest! {
        #[test]
        fn star_matches_every_name(name in "\\PC{0,32}") {
            prop_assert!(glob_match("*", &name));
        }

        #[test]
        fn prefix_star_matches_extensions(prefix in "[a-z_]{0,8}", rest in "[a-z_]{0,8}") {
            let pattern = format!("{prefix}*");
            let name = format!("{prefix}{rest}");
            prop_assert!(glob_match(&pattern, &name));
        }

        #[test]
        fn literal_pattern_is_equality(a in "[a-z]{0,6}", b in "[a-z]{0,6}") {
            prop_assert_eq!(glob_match(&a, &b), a == b);
        }
    }
}
