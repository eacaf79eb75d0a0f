//! URL- and file-name-safe encoding of free-form names.

/// Encode a name so it is safe inside file names and URLs.
///
/// ASCII letters, digits and `-` pass through; every other character becomes
/// `_<code point>_`, which keeps distinct inputs distinct.
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else {
            out.push('_');
            out.push_str(&(ch as u32).to_string());
            out.push('_');
        }
    }
    out
}

/// Join an optional URL prefix and path segments with `/`.
pub fn join_url(prefix: &str, segments: &[&str]) -> String {
    let mut url = prefix.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment);
    }
    url
}
