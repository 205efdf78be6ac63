//! Regex compilation for content, header and redirect assertions.
//!
//! Patterns are searched for anywhere in the subject, never anchored. Besides
//! plain patterns (`ba.`), PCRE-style delimited patterns (`/ba./i`, `#^/home#`)
//! are accepted: the delimiters are stripped and trailing flags become inline
//! flags.

use regex::Regex;

use crate::failure::QueryError;

/// Flags that translate directly to `regex` inline flags.
const INLINE_FLAGS: &[char] = &['i', 'm', 's', 'x', 'U'];

/// Accepted delimiters. Brackets are left out so that `(a)(b)` stays a plain
/// pattern.
const DELIMITERS: &[char] = &['/', '#', '~', '!', '@', '%', ';', ','];

pub fn compile(pattern: &str) -> Result<Regex, QueryError> {
    let source = match split_delimited(pattern) {
        Some((body, flags)) if flags.is_empty() => body.to_string(),
        Some((body, flags)) => format!("(?{flags}){body}"),
        None => pattern.to_string(),
    };
    Regex::new(&source).map_err(|source| QueryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Search `subject` for `pattern`.
pub fn is_match(pattern: &str, subject: &str) -> Result<bool, QueryError> {
    Ok(compile(pattern)?.is_match(subject))
}

/// Split `/body/flags` into its body and flag string.
///
/// Returns `None` when the pattern is not delimited, or carries a flag the
/// engine has no equivalent for (it is then used verbatim).
fn split_delimited(pattern: &str) -> Option<(&str, String)> {
    let delimiter = pattern.chars().next().filter(|c| DELIMITERS.contains(c))?;
    let rest = &pattern[delimiter.len_utf8()..];
    let end = rest.rfind(delimiter)?;
    let body = &rest[..end];
    let flags = &rest[end + delimiter.len_utf8()..];

    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            // UTF-8 is always on
            'u' => {}
            f if INLINE_FLAGS.contains(&f) => inline.push(f),
            _ => return None,
        }
    }
    Some((body, inline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_pattern_is_a_search() {
        assert!(is_match("ba.", "foobar").unwrap());
        assert!(!is_match("^bar", "foobar").unwrap());
    }

    #[test]
    fn slash_delimited_pattern_is_stripped() {
        assert!(is_match("/ba./", "foobar").unwrap());
        assert!(!is_match("/^bar/", "foobar").unwrap());
    }

    #[test]
    fn flags_become_inline() {
        assert!(is_match("/FOO/i", "foobar").unwrap());
        assert!(!is_match("/FOO/", "foobar").unwrap());
        assert!(is_match("#^a.b$#s", "a\nb").unwrap());
    }

    #[test]
    fn alternative_delimiters_are_accepted() {
        assert!(is_match("~home$~", "/home").unwrap());
        assert!(is_match("(a)(b)", "ab").unwrap());
    }

    #[test]
    fn unterminated_slash_is_verbatim() {
        assert!(is_match("/home", "https://x.test/home").unwrap());
    }

    #[test]
    fn unknown_flag_falls_back_to_verbatim() {
        // "/a/z" is not a delimited pattern; search for it literally-ish
        assert!(is_match("/a/z", "x/a/z").unwrap());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = compile("(unclosed").unwrap_err();
        assert!(matches!(err, QueryError::InvalidPattern { .. }));
    }
}
