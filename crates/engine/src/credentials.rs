//! Credential recovery from a Cookie header.
//!
//! Callers deliver per-provider API keys as a JSON object in an `apiKeys`
//! cookie. A malformed cookie is never fatal: the run continues with empty
//! credentials and the failure is logged. This is the one deliberately
//! absorbed failure in the system.

use std::collections::HashMap;

use tracing::error;

/// Split a Cookie header into name → value pairs.
///
/// Values may themselves contain `=`; names and values are percent-decoded.
/// A bare name without `=` maps to the empty string.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for item in header.split(';') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (name, value) = match item.split_once('=') {
            Some((name, value)) => (name, value),
            None => (item, ""),
        };
        cookies.insert(
            percent_decode(name.trim()),
            percent_decode(value.trim()),
        );
    }

    cookies
}

/// Pull per-provider API keys out of an optional Cookie header.
///
/// Returns an empty map when the header is absent, the `apiKeys` cookie is
/// missing, or its JSON does not decode.
pub fn api_keys_from_cookies(header: Option<&str>) -> HashMap<String, String> {
    let Some(header) = header else {
        return HashMap::new();
    };

    let cookies = parse_cookie_header(header);
    let Some(raw) = cookies.get("apiKeys") else {
        return HashMap::new();
    };

    match serde_json::from_str(raw) {
        Ok(keys) => keys,
        Err(e) => {
            error!(error = %e, "Error parsing API keys from cookies");
            HashMap::new()
        }
    }
}

/// Decode `%XX` escapes. Invalid sequences are left as-is rather than
/// failing, so a sloppy cookie degrades instead of erroring.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = hex_value(bytes[i + 1]);
            let lo = hex_value(bytes[i + 2]);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
