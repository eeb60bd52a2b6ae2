//! Thread-local compiled regex cache.
//!
//! Rules are recompiled on every pass, but their resolved sources rarely
//! change between keystrokes. Entries are keyed by an xxh3 fingerprint of
//! the resolved source and effective flags, so a changed placeholder value
//! or override produces a new key. Cache is capped at 256 entries; it is
//! cleared when full.

use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static REGEX_CACHE: RefCell<HashMap<u64, Regex>> = RefCell::new(HashMap::new());
}

/// Fingerprint of a resolved source plus its flags.
pub fn fingerprint(source: &str, flags: &str) -> u64 {
    // NUL separator: flags never contain it, so ("ab", "i") != ("a", "bi").
    let key = format!("{flags}\u{0}{source}");
    xxh3_64(key.as_bytes())
}

/// Get a compiled regex from cache, or build it with `compile` and cache it.
///
/// Failed compilations are not cached.
pub fn get_or_compile<E>(
    source: &str,
    flags: &str,
    compile: impl FnOnce() -> Result<Regex, E>,
) -> Result<Regex, E> {
    let key = fingerprint(source, flags);

    if let Some(hit) = REGEX_CACHE.with(|cache| cache.borrow().get(&key).cloned()) {
        return Ok(hit);
    }

    let compiled = compile()?;

    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }
        cache.insert(key, compiled.clone());
    });

    Ok(compiled)
}

/// Clear the cache (mainly for testing).
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached entries on this thread.
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
