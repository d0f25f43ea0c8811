//! Challenge value extraction from acme.sh output
//!
//! In manual DNS mode acme.sh prints the record it wants, e.g.
//!
//! ```text
//! [Mon Jan  6 10:00:00 CST 2025] Domain: '_acme-challenge.example.com'
//! [Mon Jan  6 10:00:00 CST 2025] TXT value: 'dGhpcyBpcyBhIHRva2Vu'
//! ```

use certrelay_common::ACME_CHALLENGE_LABEL;

const TXT_VALUE_MARKER: &str = "txt value";

/// Find the DNS-01 challenge value in acme.sh output
///
/// Lines mentioning `TXT value` are tried first, taking the first quoted
/// token (single quotes, then double quotes). Failing that, a line of the
/// form `_acme-challenge... = value` is accepted.
pub fn extract_challenge_value(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.to_ascii_lowercase().contains(TXT_VALUE_MARKER))
        .find_map(|line| quoted(line, '\'').or_else(|| quoted(line, '"')))
        .or_else(|| output.lines().find_map(assignment_value))
        .map(str::to_string)
}

/// Text between the first pair of `quote` characters, if non-empty
fn quoted(line: &str, quote: char) -> Option<&str> {
    let (_, rest) = line.split_once(quote)?;
    let (token, _) = rest.split_once(quote)?;
    (!token.is_empty()).then_some(token)
}

fn assignment_value(line: &str) -> Option<&str> {
    if !line.contains(ACME_CHALLENGE_LABEL) {
        return None;
    }
    let (_, value) = line.split_once('=')?;
    let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
    (!value.is_empty()).then_some(value)
}
