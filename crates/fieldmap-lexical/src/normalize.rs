//! Name canonicalization shared by every matcher.

/// Vendor prefixes stripped before comparison (checked after separators are
/// unified to `_`).
const VENDOR_PREFIXES: [&str; 5] = ["custom_", "cust_", "ext_", "usr_", "sf_"];

/// Normalizes a column or field name into a comparison token.
///
/// - Lowercases
/// - Strips one known vendor prefix, if something remains after it
/// - Removes separators (`_`, `-`, `.`, whitespace) and any other
///   non-alphanumeric character
pub fn normalize(name: &str) -> String {
    let unified = unify_separators(&name.trim().to_lowercase());
    let stripped = strip_vendor_prefix(&unified);
    stripped.chars().filter(|ch| ch.is_alphanumeric()).collect()
}

/// Splits a name into lowercase words on separators and camelCase
/// boundaries.
///
/// `"WorkEmail"` → `["work", "email"]`, `"PersonID"` → `["person", "id"]`,
/// `"IDNumber"` → `["id", "number"]`.
pub fn split_words(name: &str) -> Vec<String> {
    let unified = unify_separators(name.trim());
    let lowered = unified.to_lowercase();
    let stripped_len = lowered.len() - strip_vendor_prefix(&lowered).len();
    let source = unified.get(stripped_len..).unwrap_or(&unified);

    let chars: Vec<char> = source.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (idx, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            flush(&mut current, &mut words);
            continue;
        }
        if let Some(&prev) = idx.checked_sub(1).and_then(|i| chars.get(i)) {
            let next = chars.get(idx + 1).copied();
            let lower_to_upper = (prev.is_lowercase() || prev.is_ascii_digit()) && ch.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && ch.is_uppercase()
                && next.is_some_and(char::is_lowercase);
            if lower_to_upper || acronym_end {
                flush(&mut current, &mut words);
            }
        }
        current.extend(ch.to_lowercase());
    }
    flush(&mut current, &mut words);
    words
}

/// Words joined with single spaces, e.g. `"FIRST_NAME"` → `"first name"`.
pub fn spaced(name: &str) -> String {
    split_words(name).join(" ")
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

fn unify_separators(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            '-' | '.' | '/' | '\\' => '_',
            ch if ch.is_whitespace() => '_',
            ch => ch,
        })
        .collect()
}

fn strip_vendor_prefix(lowered: &str) -> &str {
    for prefix in VENDOR_PREFIXES {
        if let Some(rest) = lowered.strip_prefix(prefix)
            && rest.chars().any(char::is_alphanumeric)
        {
            return rest;
        }
    }
    lowered
}
