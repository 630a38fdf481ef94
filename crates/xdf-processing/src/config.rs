//! Configuration management for stream classification and extraction

use serde::{Deserialize, Serialize};
use xdf_core::{config_error, XdfResult};

/// Role assigned to streams no rule matches
pub const DEFAULT_ROLE: &str = "data";

/// Role whose streams feed event extraction
pub const MARKER_ROLE: &str = "marker";

/// Role whose streams feed metadata extraction
pub const META_ROLE: &str = "meta";

/// How a rule compares its patterns with stream name and type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Whole-field equality
    Exact,
    /// Substring containment
    Pattern,
}

/// One classification rule: a role and the name/type patterns that select it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Role assigned on match
    pub role: String,
    /// Lower-case name patterns (any may match)
    pub names: Vec<String>,
    /// Lower-case type patterns (any may match)
    pub types: Vec<String>,
    /// Comparison mode
    pub mode: MatchMode,
}

impl ClassificationRule {
    /// Create a rule; patterns are lower-cased
    pub fn new(role: &str, names: &[&str], types: &[&str], mode: MatchMode) -> Self {
        ClassificationRule {
            role: role.to_string(),
            names: names.iter().map(|n| n.to_lowercase()).collect(),
            types: types.iter().map(|t| t.to_lowercase()).collect(),
            mode,
        }
    }

    fn normalized(mut self) -> Self {
        self.names = self.names.iter().map(|n| n.to_lowercase()).collect();
        self.types = self.types.iter().map(|t| t.to_lowercase()).collect();
        self
    }
}

/// Immutable, ordered set of classification rules
///
/// Iteration order is rule order; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRuleSet {
    rules: Vec<ClassificationRule>,
}

impl ClassificationRuleSet {
    /// Start a builder from the built-in rules
    pub fn builder() -> ClassificationRuleSetBuilder {
        ClassificationRuleSetBuilder {
            rules: Self::builtin_rules(),
        }
    }

    /// Start a builder with no rules at all
    pub fn empty_builder() -> ClassificationRuleSetBuilder {
        ClassificationRuleSetBuilder { rules: Vec::new() }
    }

    /// Rules for the motion/gaze/stimulus setup the engine was built for
    pub fn builtin_rules() -> Vec<ClassificationRule> {
        vec![
            ClassificationRule::new("wii", &["wii"], &["mocap"], MatchMode::Pattern),
            ClassificationRule::new("kinect", &["kinect"], &["mocap"], MatchMode::Pattern),
            ClassificationRule::new("eye_tracker", &["pupil_capture"], &["gaze"], MatchMode::Exact),
            ClassificationRule::new(
                "eye_tracker_fixations",
                &["pupil_capture"],
                &["fixation"],
                MatchMode::Pattern,
            ),
            ClassificationRule::new(
                "stimulus",
                &["vr_bodysway", "stimulus", "stim"],
                &["timeseries"],
                MatchMode::Pattern,
            ),
            ClassificationRule::new(
                MARKER_ROLE,
                &["marker", "event", "trigger"],
                &["marker"],
                MatchMode::Pattern,
            ),
            ClassificationRule::new(META_ROLE, &["trial_meta"], &["marker", "meta"], MatchMode::Pattern),
        ]
    }

    /// All rules in iteration order
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Rule for a role, if configured
    pub fn get(&self, role: &str) -> Option<&ClassificationRule> {
        self.rules.iter().find(|r| r.role == role)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if no rules are configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Export rules to JSON
    pub fn to_json(&self) -> XdfResult<String> {
        serde_json::to_string_pretty(&self.rules)
            .map_err(|e| config_error!("Failed to serialize rule set: {}", e))
    }

    /// Import rules from JSON; the result is validated like a built set
    pub fn from_json(json: &str) -> XdfResult<Self> {
        let rules: Vec<ClassificationRule> = serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize rule set: {}", e))?;

        rules
            .into_iter()
            .fold(Self::empty_builder(), |builder, rule| builder.with(rule))
            .build()
    }
}

impl Default for ClassificationRuleSet {
    fn default() -> Self {
        ClassificationRuleSet {
            rules: Self::builtin_rules(),
        }
    }
}

/// Builder for [`ClassificationRuleSet`]
#[derive(Debug, Clone)]
pub struct ClassificationRuleSetBuilder {
    rules: Vec<ClassificationRule>,
}

impl ClassificationRuleSetBuilder {
    /// Add a rule, replacing a rule with the same role in place
    pub fn with(mut self, rule: ClassificationRule) -> Self {
        let rule = rule.normalized();
        match self.rules.iter_mut().find(|r| r.role == rule.role) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        self
    }

    /// Add a rule from its parts
    pub fn with_rule(self, role: &str, names: &[&str], types: &[&str], mode: MatchMode) -> Self {
        self.with(ClassificationRule::new(role, names, types, mode))
    }

    /// Drop the rule for a role
    pub fn without_rule(mut self, role: &str) -> Self {
        self.rules.retain(|r| r.role != role);
        self
    }

    /// Validate and freeze the rule set
    pub fn build(self) -> XdfResult<ClassificationRuleSet> {
        for rule in &self.rules {
            if rule.role.trim().is_empty() {
                return Err(config_error!("Rule role cannot be empty"));
            }
            if rule.role == DEFAULT_ROLE {
                return Err(config_error!(
                    "Role '{}' is reserved for unmatched streams",
                    DEFAULT_ROLE
                ));
            }
            if rule.names.is_empty() || rule.names.iter().any(|n| n.is_empty()) {
                return Err(config_error!("Rule '{}' needs non-empty name patterns", rule.role));
            }
            if rule.types.is_empty() || rule.types.iter().any(|t| t.is_empty()) {
                return Err(config_error!("Rule '{}' needs non-empty type patterns", rule.role));
            }
        }

        Ok(ClassificationRuleSet { rules: self.rules })
    }
}

/// Marker payload parser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Characters separating payload tokens
    pub delimiters: Vec<char>,
    /// Key under which the raw payload is kept
    pub fallback_key: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            delimiters: vec![':', ';', ','],
            fallback_key: "data".to_string(),
        }
    }
}

/// Engine-wide processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Payload parser settings
    pub parser: ParserConfig,
    /// Decimals onsets are rounded to before duplicate detection (3 ≈ 1 ms)
    pub dedup_decimals: u32,
    /// Absolute tolerance for duplicate perturbation markers, seconds
    pub perturbation_tolerance: f64,
    /// Prefix of trial end markers
    pub trial_end_marker: String,
    /// Case-insensitive substring identifying perturbation start markers
    pub perturbation_start_marker: String,
    /// Case-insensitive substring identifying perturbation end markers
    pub perturbation_end_marker: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            parser: ParserConfig::default(),
            dedup_decimals: 3,
            perturbation_tolerance: 1e-5,
            trial_end_marker: "TRIAL_END".to_string(),
            perturbation_start_marker: "perturbation_start".to_string(),
            perturbation_end_marker: "perturbation_end".to_string(),
        }
    }
}

impl ProcessingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> XdfResult<()> {
        if self.parser.delimiters.is_empty() {
            return Err(config_error!("Parser needs at least one delimiter"));
        }
        if self.parser.delimiters.contains(&'=') {
            return Err(config_error!("'=' separates keys from values and cannot be a delimiter"));
        }
        if self.parser.fallback_key.is_empty() {
            return Err(config_error!("Parser fallback key cannot be empty"));
        }
        if self.dedup_decimals > 9 {
            return Err(config_error!(
                "Dedup precision of {} decimals is below timestamp resolution",
                self.dedup_decimals
            ));
        }
        if !(self.perturbation_tolerance >= 0.0 && self.perturbation_tolerance.is_finite()) {
            return Err(config_error!("Perturbation tolerance must be a finite, non-negative number"));
        }
        if self.trial_end_marker.is_empty()
            || self.perturbation_start_marker.is_empty()
            || self.perturbation_end_marker.is_empty()
        {
            return Err(config_error!("Marker conventions cannot be empty"));
        }
        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> XdfResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("Failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> XdfResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rule_order() {
        let rules = ClassificationRuleSet::default();
        let roles: Vec<&str> = rules.rules().iter().map(|r| r.role.as_str()).collect();
        assert_eq!(
            roles,
            vec!["wii", "kinect", "eye_tracker", "eye_tracker_fixations", "stimulus", "marker", "meta"]
        );
    }

    #[test]
    fn test_override_keeps_position() {
        let rules = ClassificationRuleSet::builder()
            .with_rule("kinect", &["Azure_Kinect"], &["MoCap"], MatchMode::Exact)
            .build()
            .unwrap();

        assert_eq!(rules.rules()[1].role, "kinect");
        assert_eq!(rules.rules()[1].names, vec!["azure_kinect"]);
        assert_eq!(rules.rules()[1].mode, MatchMode::Exact);
        assert_eq!(rules.len(), 7);
    }

    #[test]
    fn test_new_rule_appends() {
        let rules = ClassificationRuleSet::builder()
            .with_rule("force_plate", &["amti"], &["force"], MatchMode::Pattern)
            .without_rule("wii")
            .build()
            .unwrap();

        assert_eq!(rules.rules().last().unwrap().role, "force_plate");
        assert!(rules.get("wii").is_none());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let reserved = ClassificationRuleSet::empty_builder()
            .with_rule("data", &["x"], &["y"], MatchMode::Pattern)
            .build();
        assert!(reserved.is_err());

        let no_types = ClassificationRuleSet::empty_builder()
            .with_rule("emg", &["delsys"], &[], MatchMode::Pattern)
            .build();
        assert!(no_types.is_err());
    }

    #[test]
    fn test_rule_set_json_round_trip() {
        let rules = ClassificationRuleSet::default();
        let json = rules.to_json().unwrap();
        let restored = ClassificationRuleSet::from_json(&json).unwrap();
        assert_eq!(rules, restored);
        assert!(json.contains("\"pattern\""));
    }

    #[test]
    fn test_rule_set_json_is_lowercased() {
        let json = r#"[{"role": "emg", "names": ["Delsys"], "types": ["EMG"], "mode": "exact"}]"#;
        let rules = ClassificationRuleSet::from_json(json).unwrap();
        assert_eq!(rules.get("emg").unwrap().names, vec!["delsys"]);
        assert_eq!(rules.get("emg").unwrap().types, vec!["emg"]);
    }

    #[test]
    fn test_processing_config_validation() {
        let config = ProcessingConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.parser.delimiters = vec!['='];
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.perturbation_tolerance = -1.0;
        assert!(invalid.validate().is_err());

        let json = config.to_json().unwrap();
        assert_eq!(ProcessingConfig::from_json(&json).unwrap(), config);
    }
}
