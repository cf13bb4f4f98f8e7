//! Title to slug conversion

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref HYPHENS: Regex = Regex::new(r"-+").unwrap();
}

/// Derive a URL and filesystem safe slug from a free-text title.
///
/// Whitespace runs become a single hyphen, anything outside
/// `[A-Za-z0-9_-]` is dropped, the result is lowercased and hyphen runs are
/// collapsed. Leading and trailing hyphens or underscores are trimmed.
///
/// # Examples
/// ```
/// use micropub_rs::content::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("@#$%"), "");
/// ```
pub fn slugify(title: &str) -> String {
    let hyphenated = WHITESPACE.replace_all(title, "-");

    let kept: String = hyphenated
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    HYPHENS
        .replace_all(&kept, "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}
