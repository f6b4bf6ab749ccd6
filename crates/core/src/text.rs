/// Strip everything that is not an ASCII letter or digit.
///
/// Applied to every raw model/OCR/service output before it is considered
/// for acceptance, so `"a-b c!"` becomes `"abc"`.
pub fn normalize_code(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Normalize and reject empty results.
pub fn accept_code(raw: &str) -> Option<String> {
    let code = normalize_code(raw);
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
