//! Helpers shared by the form based adapters: query building, form parsing,
//! digests and provider-local timestamps.

use crate::error::{CheckoutError, WebhookError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Zone most providers here report wall-clock time in.
pub const MOSCOW: Tz = chrono_tz::Europe::Moscow;

/// Layout of `pay_date` / `m_operation_pay_date`.
pub const DOTTED_LAYOUT: &str = "%d.%m.%Y %H:%M:%S";

/// Query parameters, encoded in key order.
pub type Params = BTreeMap<String, String>;

pub fn encode_url(base: &str, params: &Params) -> Result<String, CheckoutError> {
    Ok(format!("{}{}", base, serde_urlencoded::to_string(params)?))
}

/// Parsed `application/x-www-form-urlencoded` notification.
///
/// Body values come before query values, lookups return the first match.
#[derive(Debug, Default)]
pub struct Form {
    pairs: Vec<(String, String)>,
}

impl Form {
    pub fn parse(body: &[u8], query: Option<&str>) -> Result<Self, WebhookError> {
        let mut pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
        if let Some(query) = query {
            let extra: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
            pairs.extend(extra);
        }
        Ok(Self { pairs })
    }

    /// Value of `key`, empty when absent.
    pub fn value(&self, key: &str) -> &str {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub fn md5_hex(parts: &[&str], sep: &str) -> String {
    format!("{:x}", md5::compute(parts.join(sep).as_bytes()))
}

pub fn sha256_upper_hex(parts: &[&str], sep: &str) -> String {
    hex::encode_upper(Sha256::digest(parts.join(sep).as_bytes()))
}

pub fn sha1_hex(parts: &[&str], sep: &str) -> String {
    hex::encode(Sha1::digest(parts.join(sep).as_bytes()))
}

/// Compares a received signature against the expected one.
pub fn check_signature(received: &str, expected: &str) -> Result<(), WebhookError> {
    if !received.is_empty() && received == expected {
        Ok(())
    } else {
        Err(WebhookError::Signature)
    }
}

/// Reads a naive timestamp as wall-clock time in `tz`.
pub fn parse_local(value: &str, layout: &str, tz: Tz) -> Result<DateTime<Utc>, WebhookError> {
    let naive = NaiveDateTime::parse_from_str(value, layout).map_err(|e| WebhookError::Timestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| WebhookError::Timestamp {
            value: value.to_string(),
            reason: format!("does not exist in {}", tz.name()),
        })
}

/// Reads an explicit JSON `null` the same way as an absent field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserializes a decimal sent either as a JSON string or as a JSON number.
pub fn decimal_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => f.to_string(),
            _ => n.to_string(),
        }),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected decimal, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn moscow_wall_clock_is_normalized_to_utc() {
        let got = parse_local("01.02.2023 15:04:05", DOTTED_LAYOUT, MOSCOW).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2023, 2, 1, 12, 4, 5).unwrap());
    }

    #[test]
    fn moscow_before_2011_used_winter_time() {
        // UTC+3 in winter, UTC+4 in summer until March 2011.
        let got = parse_local("15.01.2010 12:00:00", DOTTED_LAYOUT, MOSCOW).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2010, 1, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let err = parse_local("2023-02-01 15:04", DOTTED_LAYOUT, MOSCOW).unwrap_err();
        assert!(matches!(err, WebhookError::Timestamp { .. }));
        assert!(parse_local("", DOTTED_LAYOUT, MOSCOW).is_err());
    }

    #[test]
    fn form_prefers_body_over_query() {
        let form = Form::parse(b"a=1&b=x%3Ay&a=2", Some("a=3&c=4")).unwrap();
        assert_eq!(form.value("a"), "1");
        assert_eq!(form.value("b"), "x:y");
        assert_eq!(form.value("c"), "4");
        assert_eq!(form.value("missing"), "");
        assert_eq!(form.pairs().count(), 5);
    }

    #[test]
    fn query_is_sorted_and_escaped() {
        let mut params = Params::new();
        params.insert("z".into(), "a b".into());
        params.insert("a".into(), "x&y".into());
        assert_eq!(
            encode_url("https://host/pay?", &params).unwrap(),
            "https://host/pay?a=x%26y&z=a+b"
        );
    }

    #[test]
    fn empty_signature_never_matches() {
        assert!(check_signature("", "").is_err());
        assert!(check_signature("abc", "abc").is_ok());
        assert!(check_signature("ABC", "abc").is_err());
    }

    #[test]
    fn decimals_keep_their_text() {
        #[derive(Deserialize)]
        struct Amount {
            #[serde(deserialize_with = "decimal_text")]
            value: String,
        }

        let parse = |s: &str| serde_json::from_str::<Amount>(s).unwrap().value;
        assert_eq!(parse(r#"{"value":"100.00"}"#), "100.00");
        assert_eq!(parse(r#"{"value":100}"#), "100");
        assert_eq!(parse(r#"{"value":99.5}"#), "99.5");
        assert_eq!(parse(r#"{"value":null}"#), "");
        assert!(serde_json::from_str::<Amount>(r#"{"value":[1]}"#).is_err());
    }

    #[test]
    fn null_collection_is_empty() {
        #[derive(Deserialize)]
        struct Bill {
            #[serde(default, deserialize_with = "null_as_default")]
            fields: BTreeMap<String, Value>,
        }

        let parse = |s: &str| serde_json::from_str::<Bill>(s).unwrap().fields;
        assert!(parse(r#"{"fields":null}"#).is_empty());
        assert!(parse(r#"{}"#).is_empty());
        assert_eq!(parse(r#"{"fields":{"a":1}}"#).len(), 1);
        assert!(serde_json::from_str::<Bill>(r#"{"fields":[1]}"#).is_err());
    }

    #[test]
    fn digests() {
        assert_eq!(md5_hex(&["a", "b"], ":"), format!("{:x}", md5::compute(b"a:b")));
        assert_eq!(
            sha256_upper_hex(&["abc"], ":"),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
        assert_eq!(sha1_hex(&["abc"], "&"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
