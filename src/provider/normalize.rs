//! Shared helpers for turning raw upstream fields into model values.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::GeocodeError;
use crate::models::Bounds;

/// Parse a textual coordinate. Blank or unparseable text is absent, not `0.0`.
pub fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    let text = value?.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Serde helper for fields sent as a number, a numeric string, `""` or `null`.
pub fn loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(v)) if v.is_finite() => Some(v),
        Some(Loose::Text(text)) => parse_coordinate(Some(&text)),
        _ => None,
    })
}

/// Serde helper for fields sent either as a string or as a number.
pub fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Integer(i64),
        Number(f64),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(text)) => Some(text),
        Some(Loose::Integer(v)) => Some(v.to_string()),
        Some(Loose::Number(v)) => Some(v.to_string()),
        None => None,
    })
}

/// Drop values the upstream uses to mean "unknown".
pub fn without_placeholder(value: Option<String>, placeholders: &[&str]) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && !placeholders.iter().any(|p| p.eq_ignore_ascii_case(v))
    })
}

/// Bounds from four optional edges; any missing edge leaves them undefined.
pub fn bounds_from_edges(
    south: Option<f64>,
    west: Option<f64>,
    north: Option<f64>,
    east: Option<f64>,
) -> Bounds {
    Bounds::from_edges(south, west, north, east)
}

/// Split `"<a> <b>"` pairs such as `"2.35 48.86"` into two numbers.
pub fn parse_pair(value: Option<&str>) -> Option<(f64, f64)> {
    let mut parts = value?.split_whitespace();
    let a = parse_coordinate(parts.next())?;
    let b = parse_coordinate(parts.next())?;
    if parts.next().is_some() {
        return None;
    }
    Some((a, b))
}

/// Decode HTML character references (named, decimal and hex).
pub fn decode_html_entities(text: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    if !text.contains('&') {
        return text.to_string();
    }
    let re = ENTITY.get_or_init(|| {
        Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("static regex")
    });
    re.replace_all(text, |caps: &Captures| {
        let entity = &caps[1];
        let decoded = if let Some(hex) = entity
            .strip_prefix("#x")
            .or_else(|| entity.strip_prefix("#X"))
        {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => None,
            }
        };
        decoded
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Repair text that was UTF-8 encoded twice (e.g. `"ZÃ¼rich"` for `"Zürich"`).
///
/// Text that does not round-trip cleanly is returned unchanged.
pub fn fix_double_utf8(text: &str) -> String {
    if text.is_ascii() || text.chars().any(|c| c as u32 > 0xFF) {
        return text.to_string();
    }
    let bytes: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
    match String::from_utf8(bytes) {
        Ok(fixed) => fixed,
        Err(_) => text.to_string(),
    }
}

/// Decode an ISO-8859-1 body.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse a JSON body; an unparseable body is `NoResult` for `request`.
pub fn parse_json<T: DeserializeOwned>(
    provider: &str,
    body: &[u8],
    request: &str,
) -> Result<T, GeocodeError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("{}: unparseable response for {}: {}", provider, request, e);
        GeocodeError::no_result(provider, request)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "loose_f64")]
        value: Option<f64>,
    }

    fn loose(json: &str) -> Option<f64> {
        serde_json::from_str::<Loose>(json).unwrap().value
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(Some("48.8566")), Some(48.8566));
        assert_eq!(parse_coordinate(Some(" -2.5 ")), Some(-2.5));
        assert_eq!(parse_coordinate(Some("")), None);
        assert_eq!(parse_coordinate(Some("abc")), None);
        assert_eq!(parse_coordinate(None), None);
    }

    #[test]
    fn test_loose_f64() {
        assert_eq!(loose(r#"{"value": 1.5}"#), Some(1.5));
        assert_eq!(loose(r#"{"value": "1.5"}"#), Some(1.5));
        assert_eq!(loose(r#"{"value": ""}"#), None);
        assert_eq!(loose(r#"{"value": null}"#), None);
        assert_eq!(loose(r#"{}"#), None);
    }

    #[test]
    fn test_without_placeholder() {
        let p = &["-", "(Unknown City?)"];
        assert_eq!(without_placeholder(Some("-".into()), p), None);
        assert_eq!(without_placeholder(Some("(unknown city?)".into()), p), None);
        assert_eq!(without_placeholder(Some("Lyon".into()), p), Some("Lyon".into()));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair(Some("2.35 48.86")), Some((2.35, 48.86)));
        assert_eq!(parse_pair(Some("2.35")), None);
        assert_eq!(parse_pair(Some("")), None);
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(decode_html_entities("C&#244;te d&#039;Ivoire"), "Côte d'Ivoire");
        assert_eq!(decode_html_entities("A &amp; B &#x41;"), "A & B A");
        assert_eq!(decode_html_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_fix_double_utf8() {
        assert_eq!(fix_double_utf8("ZÃ¼rich"), "Zürich");
        assert_eq!(fix_double_utf8("Zürich"), "Zürich");
        assert_eq!(fix_double_utf8("Paris"), "Paris");
    }

    #[test]
    fn test_latin1() {
        assert_eq!(latin1_to_string(&[0x4D, 0xFC, 0x6E]), "Mün");
    }

    #[test]
    fn test_parse_json_failure_is_no_result() {
        let err = parse_json::<Vec<u8>>("p", b"<html>", "GET x").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NoResult);
    }
}
