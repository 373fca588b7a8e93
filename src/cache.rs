//! Thread-local compilation cache for replacement patterns.
//!
//! Release runs compile the same docs rules once per docs file and the same
//! configured patterns at validation and again at application. Compiled
//! regexes are cheap to clone (shared program), so the cache hands out clones.
//! Cache is capped at 256 entries; the whole cache is dropped when full.

use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Compile `pattern` with multi-line and dot-matches-newline enabled.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
}

/// Get a compiled pattern from cache, or compile and cache it.
pub fn get_or_compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = compile(pattern)?;
        cache.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    })
}

/// Clear the pattern cache (mainly for testing).
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_reuses_compiled_pattern() {
        clear_cache();
        get_or_compile_regex("a+b").unwrap();
        get_or_compile_regex("a+b").unwrap();
        assert_eq!(cache_size(), 1);
    }

    #[test]
    fn test_invalid_pattern_not_cached() {
        clear_cache();
        assert!(get_or_compile_regex("(").is_err());
        assert_eq!(cache_size(), 0);
    }

    #[test]
    fn test_compiled_flags() {
        let regex = compile("^b.c$").unwrap();
        assert!(regex.is_match("a\nb\nc\nd"));
    }
}
