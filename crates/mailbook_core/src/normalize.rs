//! Filename normalization.
//!
//! Collection names and document titles are typed by people ("Sci-Fi",
//! "Podróże") but end up as directory names on the device, so they are folded
//! into a small ASCII alphabet. The mapping is lossy: distinct names can
//! collide, and [`display_name_from_dir`] only approximates the way back.

use unicode_normalization::UnicodeNormalization;

/// Fold arbitrary text into a lowercase path segment made of ASCII
/// alphanumerics, `.`, `_` and `-`.
///
/// Steps: NFKD decomposition, drop non-ASCII, whitespace runs become `_`,
/// strip every other character, lowercase. The function is idempotent.
///
/// # Example
/// ```
/// use mailbook_core::normalize::normalize;
///
/// assert_eq!(normalize("Zażółć Gęślą Jaźń"), "zazoc_gesla_jazn");
/// assert_eq!(normalize("Sci Fi & Fantasy!"), "sci_fi__fantasy");
/// ```
pub fn normalize(text: &str) -> String {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();

    let mut out = String::with_capacity(ascii.len());
    let mut in_whitespace = false;
    for c in ascii.chars() {
        if c.is_ascii_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// Best-effort display name for a collection directory that no registry
/// collection maps to: underscores become spaces and the first character is
/// upper-cased. Not an inverse of [`normalize`]; accents and case are gone.
pub fn display_name_from_dir(dir_name: &str) -> String {
    let spaced = dir_name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}
