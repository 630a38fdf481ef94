//! Pattern matcher: assigns a semantic role from stream name and type

use crate::config::{ClassificationRule, ClassificationRuleSet, MatchMode, DEFAULT_ROLE};
use tracing::warn;
use xdf_core::StreamDescriptor;

/// Outcome of classifying one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// First rule that matched, by role
    Matched(String),
    /// No rule matched
    Unmatched,
}

impl Classification {
    /// Role to use for this stream; unmatched streams are `data`
    pub fn role(&self) -> &str {
        match self {
            Classification::Matched(role) => role,
            Classification::Unmatched => DEFAULT_ROLE,
        }
    }
}

/// Check one rule against already lower-cased name and type
pub fn rule_matches(rule: &ClassificationRule, name: &str, stream_type: &str) -> bool {
    match rule.mode {
        MatchMode::Exact => {
            rule.names.iter().any(|p| p == name) && rule.types.iter().any(|p| p == stream_type)
        }
        MatchMode::Pattern => {
            rule.names.iter().any(|p| name.contains(p.as_str()))
                && rule.types.iter().any(|p| stream_type.contains(p.as_str()))
        }
    }
}

/// Classify a name/type pair; the first matching rule wins
pub fn classify(name: &str, stream_type: &str, rules: &ClassificationRuleSet) -> Classification {
    let name = name.to_lowercase();
    let stream_type = stream_type.to_lowercase();

    rules
        .rules()
        .iter()
        .find(|rule| rule_matches(rule, &name, &stream_type))
        .map(|rule| Classification::Matched(rule.role.clone()))
        .unwrap_or(Classification::Unmatched)
}

/// Role for a stream, warning when it falls back to `data`
pub fn role_for(stream: &StreamDescriptor, rules: &ClassificationRuleSet) -> String {
    match classify(&stream.name, &stream.stream_type, rules) {
        Classification::Matched(role) => role,
        Classification::Unmatched => {
            warn!(
                "Stream '{}' does not match any known patterns, classifying as '{}'",
                stream.name, DEFAULT_ROLE
            );
            DEFAULT_ROLE.to_string()
        }
    }
}

/// Check a stream against the rule for a single role
///
/// Gating predicate used by the organizer: both type and name must contain
/// one of the role's patterns, regardless of the rule's match mode.
pub fn has_role(stream: &StreamDescriptor, role: &str, rules: &ClassificationRuleSet) -> bool {
    let Some(rule) = rules.get(role) else {
        return false;
    };
    let name = stream.name.to_lowercase();
    let stream_type = stream.stream_type.to_lowercase();

    rule.types.iter().any(|p| stream_type.contains(p.as_str()))
        && rule.names.iter().any(|p| name.contains(p.as_str()))
}
