//! Validated scoping rules.

use std::collections::HashSet;

use crate::config::{BetweenRuleSettings, ScopingSettings};
use crate::error::GatewayError;

/// What an active between-rule does to the entries inside its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Include,
    Exclude,
}

/// One validated range rule.
///
/// A rule with empty `start_identities` is active from the first call
/// onward; one with empty `end_identities` never deactivates once active.
#[derive(Debug, Clone)]
pub struct BetweenRule {
    pub action: RuleAction,
    /// Patterns compare for equality (case-sensitive) instead of
    /// case-insensitive substring containment.
    pub exact_match: bool,
    /// Match against message + identity + stringified metadata instead
    /// of the identity alone.
    pub search_log: bool,
    pub start_identities: Vec<String>,
    pub end_identities: Vec<String>,
}

/// Validated scoping configuration, effectively immutable for the
/// process lifetime.
#[derive(Debug, Clone, Default)]
pub struct ScopingConfig {
    pub enabled: bool,
    pub filter_identities: HashSet<String>,
    pub filtered_applications: HashSet<String>,
    pub between_rules: Vec<BetweenRule>,
}

impl ScopingConfig {
    /// Validate raw scoping settings.
    ///
    /// Errors here are non-fatal to the gateway: the caller downgrades
    /// them to scoping-disabled with a warning.
    pub fn from_settings(raw: &ScopingSettings) -> Result<Self, GatewayError> {
        let between_rules = raw
            .between_rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| BetweenRule::from_settings(idx, rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enabled: raw.enabled,
            filter_identities: raw.filter_identities.iter().cloned().collect(),
            filtered_applications: raw.filtered_applications.iter().cloned().collect(),
            between_rules,
        })
    }

    /// Whether any filter list or rule is configured at all.
    pub fn has_filters(&self) -> bool {
        !self.filter_identities.is_empty()
            || !self.filtered_applications.is_empty()
            || !self.between_rules.is_empty()
    }
}

impl BetweenRule {
    fn from_settings(idx: usize, raw: &BetweenRuleSettings) -> Result<Self, GatewayError> {
        let action = match raw.action.to_lowercase().as_str() {
            "include" => RuleAction::Include,
            "exclude" => RuleAction::Exclude,
            other => {
                return Err(GatewayError::ScopingConfig {
                    message: format!(
                        "between_rules[{}]: unknown action '{}', expected 'include' or 'exclude'",
                        idx, other
                    ),
                })
            }
        };

        Ok(Self {
            action,
            exact_match: raw.exact_match,
            search_log: raw.search_log,
            start_identities: raw.start_identities.clone(),
            end_identities: raw.end_identities.clone(),
        })
    }
}
