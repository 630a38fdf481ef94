//! Event parser: turns a free-text marker payload into key/value fields
//!
//! Payloads look like `TRIAL_END:1:time=1252.17:duration=45.0` or
//! `trial_name=walk_fast;trial_type=walking;has_perturbations=True`. The
//! parser never fails: anything it cannot structure is still available under
//! the fallback key as the raw payload.

use crate::config::ParserConfig;
use serde_json::{Number, Value};
use tracing::{debug, warn};
use xdf_core::EventFields;

/// Keys whose values stay strings even when they look numeric
const STRING_KEYS: &[&str] = &["trial_name", "trial_type"];

/// Keys whose values must be numeric
const NUMERIC_KEYS: &[&str] = &["duration", "time"];

/// Parser for marker payloads
#[derive(Debug, Clone, Default)]
pub struct EventParser {
    config: ParserConfig,
}

impl EventParser {
    /// Create a parser with the given configuration
    pub fn new(config: ParserConfig) -> Self {
        EventParser { config }
    }

    /// Key the raw payload is stored under
    pub fn fallback_key(&self) -> &str {
        &self.config.fallback_key
    }

    /// Parse a payload into fields
    ///
    /// The result always contains the raw payload under the fallback key.
    /// The first bare token becomes `label`, further bare tokens become
    /// `arg1`, `arg2`, ...; `key=value` tokens become `key`.
    pub fn parse(&self, payload: &str) -> EventFields {
        let mut fields = EventFields::new();
        fields.insert(
            self.config.fallback_key.clone(),
            Value::String(payload.to_string()),
        );

        let mut positional = 0usize;
        let tokens = payload
            .trim()
            .split(|c: char| self.config.delimiters.contains(&c))
            .map(str::trim)
            .filter(|t| !t.is_empty());

        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim().to_lowercase();
                    if key.is_empty() {
                        warn!("Dropping malformed token '{}' in marker payload '{}'", token, payload);
                        continue;
                    }
                    if key == self.config.fallback_key {
                        debug!("Token key '{}' shadows the raw payload field, skipping", key);
                        continue;
                    }
                    let value = self.typed_value(&key, value.trim(), payload);
                    fields.insert(key, value);
                }
                None => {
                    let key = if positional == 0 {
                        "label".to_string()
                    } else {
                        format!("arg{}", positional)
                    };
                    positional += 1;
                    let value = if positional == 1 {
                        Value::String(token.to_string())
                    } else {
                        coerce(token)
                    };
                    fields.insert(key, value);
                }
            }
        }

        if fields.len() == 1 {
            debug!("Marker payload '{}' has no structured fields", payload);
        }

        fields
    }

    fn typed_value(&self, key: &str, raw: &str, payload: &str) -> Value {
        if STRING_KEYS.contains(&key) {
            return Value::String(raw.to_string());
        }

        let value = coerce(raw);
        if NUMERIC_KEYS.contains(&key) && !value.is_number() {
            warn!(
                "Field '{}' in marker payload '{}' is not numeric ('{}'), keeping it as text",
                key, payload, raw
            );
        }
        value
    }
}

/// Coerce a token to bool, integer, float or string, in that order
pub fn coerce(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trial_end_payload() {
        let parser = EventParser::default();
        let fields = parser.parse("TRIAL_END:1:time=1252.1662882:duration=45.00090410000007");

        assert_eq!(fields["label"], json!("TRIAL_END"));
        assert_eq!(fields["arg1"], json!(1));
        assert_eq!(fields["time"], json!(1252.1662882));
        assert_eq!(fields["duration"], json!(45.00090410000007));
        assert_eq!(
            fields["data"],
            json!("TRIAL_END:1:time=1252.1662882:duration=45.00090410000007")
        );
    }

    #[test]
    fn test_meta_payload_keeps_names_as_text() {
        let parser = EventParser::default();
        let fields =
            parser.parse("trial_name=7; trial_type=balance; has_perturbations=True; has_movement=false");

        assert_eq!(fields["trial_name"], json!("7"));
        assert_eq!(fields["trial_type"], json!("balance"));
        assert_eq!(fields["has_perturbations"], json!(true));
        assert_eq!(fields["has_movement"], json!(false));
        assert!(fields.get("label").is_none());
    }

    #[test]
    fn test_field_discovery_order() {
        let parser = EventParser::default();
        let fields = parser.parse("PERTURBATION_START:speed=0.4:direction=left");
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["data", "label", "speed", "direction"]);
    }

    #[test]
    fn test_malformed_payloads_fall_back() {
        let parser = EventParser::default();

        let fields = parser.parse(":::");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["data"], json!(":::"));

        let fields = parser.parse("=5:==");
        assert_eq!(fields.len(), 1);

        let fields = parser.parse("TRIAL_END:x:duration=abc");
        assert_eq!(fields["duration"], json!("abc"));
        assert_eq!(fields["arg1"], json!("x"));
    }

    #[test]
    fn test_numeric_label_stays_text() {
        let parser = EventParser::default();
        assert_eq!(parser.parse("42")["label"], json!("42"));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce("TRUE"), json!(true));
        assert_eq!(coerce("-3"), json!(-3));
        assert_eq!(coerce("2.5"), json!(2.5));
        assert_eq!(coerce("nan"), json!("nan"));
        assert_eq!(coerce("left"), json!("left"));
    }

    #[test]
    fn test_custom_delimiters() {
        let parser = EventParser::new(ParserConfig {
            delimiters: vec!['|'],
            fallback_key: "raw".to_string(),
        });
        let fields = parser.parse("STIM_ON|contrast=0.5");
        assert_eq!(fields["label"], json!("STIM_ON"));
        assert_eq!(fields["contrast"], json!(0.5));
        assert_eq!(fields["raw"], json!("STIM_ON|contrast=0.5"));
    }
}
