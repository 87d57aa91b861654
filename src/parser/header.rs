//! RFC 5322 header blocks: unfolding, encoded-words (RFC 2047), dates, and
//! the `key: value` MIME blocks fetched alongside each attachment.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::model::address::Address;
use crate::model::message::{Header, HeaderValue};

/// Headers promoted to dedicated `Header` fields.
const MODELLED: [&str; 6] = ["from", "to", "cc", "bcc", "subject", "date"];

/// Build a [`Header`] from the text of a message's header section.
///
/// `internal_date` is the transport's arrival timestamp. It takes priority
/// over the `Date:` header, which senders control.
pub fn parse_header(text: &str, internal_date: Option<DateTime<Utc>>) -> Header {
    let headers = unfold_headers(text);

    let from = values(&headers, "from")
        .first()
        .and_then(|line| Address::parse_list(line).into_iter().next())
        .map(decode_display_name)
        .unwrap_or_else(|| Address::parse(""));

    let to = address_lines(&headers, "to");
    let cc = Some(address_lines(&headers, "cc")).filter(|v| !v.is_empty());
    let bcc = Some(address_lines(&headers, "bcc")).filter(|v| !v.is_empty());

    let subject = values(&headers, "subject")
        .first()
        .map(|s| decode_encoded_words(s))
        .unwrap_or_default();

    let date = internal_date
        .or_else(|| values(&headers, "date").first().and_then(|d| parse_date(d)))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let mut extra: BTreeMap<String, HeaderValue> = BTreeMap::new();
    for (name, value) in &headers {
        if MODELLED.contains(&name.as_str()) {
            continue;
        }
        let entry = extra
            .entry(name.clone())
            .or_insert_with(|| HeaderValue::Array(Vec::new()));
        if let HeaderValue::Array(items) = entry {
            items.push(HeaderValue::String(value.clone()));
        }
    }

    Header {
        from,
        to,
        cc,
        bcc,
        subject,
        date,
        extra,
    }
}

/// Parse an attachment's MIME block into a header map.
///
/// Each line is split on its first `": "`; names are lower-cased and the
/// first occurrence of a name wins. Folded continuation lines are joined to
/// the previous value. Lines without `": "` are skipped.
pub fn parse_mime_headers(text: &str) -> BTreeMap<String, String> {
    let mut result: BTreeMap<String, String> = BTreeMap::new();
    let mut last: Option<String> = None;

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(value) = last.as_ref().and_then(|k| result.get_mut(k)) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        last = None;
        if let Some((name, value)) = line.split_once(": ") {
            let name = name.trim().to_lowercase();
            if !result.contains_key(&name) {
                result.insert(name.clone(), value.trim().to_string());
                last = Some(name);
            }
        }
    }

    result
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs in source order.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// All values of a header name, in source order.
fn values<'a>(headers: &'a [(String, String)], name: &str) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .collect()
}

/// Every address across all occurrences of an address header.
fn address_lines(headers: &[(String, String)], name: &str) -> Vec<Address> {
    values(headers, name)
        .into_iter()
        .flat_map(Address::parse_list)
        .map(decode_display_name)
        .collect()
}

/// Decode encoded-words in the display name only. Splitting happens on the
/// raw line, so a comma inside an encoded name never splits the address.
fn decode_display_name(address: Address) -> Address {
    Address {
        name: address.name.map(|name| decode_encoded_words(&name)),
        ..address
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`, returning the text and the bytes consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];
    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => base64::engine::general_purpose::STANDARD
            .decode(encoded_text.trim())
            .ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => match bytes.get(i + 1..i + 3).and_then(hex_byte) {
                Some(byte) => {
                    result.push(byte);
                    i += 3;
                }
                None => {
                    result.push(b'=');
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    std::str::from_utf8(pair)
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok())
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.to_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => match encoding_rs::Encoding::for_label(charset.as_bytes()) {
            Some(encoding) => encoding.decode(bytes).0.into_owned(),
            None => {
                warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        },
    }
}

/// Parse a `Date:` header or an IMAP internal date.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let candidate = replace_named_tz(&normalize_imap_date(&no_dow));

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    let months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let Some((day, rest)) = s.split_once('-') else {
        return s.to_string();
    };
    let Some((month, rest)) = rest.split_once('-') else {
        return s.to_string();
    };
    match months.iter().find(|m| m.eq_ignore_ascii_case(month)) {
        Some(title) => format!("{day} {title} {rest}"),
        None => s.to_string(),
    }
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("SAST", "+0200"),
    ];
    for (name, offset) in &tzs {
        if let Some(prefix) = s.strip_suffix(name) {
            return format!("{prefix}{offset}");
        }
    }
    s.to_string()
}
