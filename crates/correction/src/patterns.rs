use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

static ML_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([a-z])ml([a-z])").unwrap());
static RN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)rn").unwrap());
static CL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cl").unwrap());
static IJ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ij").unwrap());

/// Deterministic fix-ups for glyph splits seen on the foreclosure site's
/// mixed-case CAPTCHAs: `ml` between letters -> `mon`, `rn` -> `m`,
/// `cl` -> `d`, `ij` -> `j`. Case of the replacement follows the match.
///
/// The fixed text is returned only if it lost at most one character.
pub fn apply_pattern_fixes(text: &str) -> String {
    let mut fixed = ML_RE
        .replace_all(text, |caps: &Captures| {
            let (prefix, suffix) = (&caps[1], &caps[2]);
            let middle = if is_upper(prefix) && is_upper(suffix) { "MON" } else { "mon" };
            format!("{}{}{}", prefix, middle, suffix)
        })
        .into_owned();

    for (re, lower, upper) in [(&*RN_RE, "m", "M"), (&*CL_RE, "d", "D"), (&*IJ_RE, "j", "J")] {
        fixed = re
            .replace_all(&fixed, |caps: &Captures| {
                let replacement = if is_lower(&caps[0]) { lower } else { upper };
                replacement.to_string()
            })
            .into_owned();
    }

    if fixed != text && fixed.chars().count() + 1 >= text.chars().count() {
        debug!(original = %text, fixed = %fixed, "applied pattern fixes");
        fixed
    } else {
        text.to_string()
    }
}

fn is_lower(s: &str) -> bool {
    s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_uppercase)
}

fn is_upper(s: &str) -> bool {
    s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase)
}
