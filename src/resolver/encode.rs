//! Percent-encoding of dataset IRIs for cache tag expansion
//!
//! Cache layers are populated by web applications that key entries on either the
//! raw IRI or one of its JavaScript-escaped forms (`encodeURI` /
//! `encodeURIComponent`), so purging must cover all three spellings. The two
//! encoders here reproduce the JavaScript escaping rules exactly, including
//! UTF-8 percent-encoding of non-ASCII characters.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters `encodeURI` leaves intact besides alphanumerics.
const URI_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// Characters `encodeURIComponent` leaves intact besides alphanumerics.
const URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Escape an IRI the way JavaScript's `encodeURI` does.
pub fn encode_uri(value: &str) -> String {
    utf8_percent_encode(value, URI_SET).to_string()
}

/// Escape an IRI the way JavaScript's `encodeURIComponent` does.
pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT_SET).to_string()
}
