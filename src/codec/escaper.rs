//! Two-layer escaping of free-form tokens in file identities.
//!
//! Tokens are first percent-encoded, keeping alphanumerics and `- . _ *`
//! literal. A second layer then escapes the grammar separators `_` and `~`
//! so that decoders can split on them unambiguously.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::CodecError;

/// Characters left literal by the percent-encoding layer.
const TOKEN_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'*');

const SEPARATOR_ESCAPES: [(char, &str); 2] = [('_', "%5F"), ('~', "%7E")];

/// Escape a free-form token.
pub fn escape(token: &str) -> String {
    let encoded = utf8_percent_encode(token, TOKEN_SET).to_string();
    escape_separators(&encoded)
}

/// Reverse [`escape`].
pub fn unescape(token: &str) -> Result<String, CodecError> {
    let restored = unescape_separators(token);
    percent_decode_str(&restored)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| CodecError::InvalidEscape(token.to_string()))
}

fn escape_separators(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        match SEPARATOR_ESCAPES.iter().find(|(sep, _)| *sep == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

fn unescape_separators(token: &str) -> String {
    SEPARATOR_ESCAPES
        .iter()
        .fold(token.to_string(), |acc, (sep, escaped)| {
            acc.replace(escaped, &sep.to_string())
        })
}
