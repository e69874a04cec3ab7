//! The scope filter.

use std::collections::HashSet;
use std::sync::Mutex;

use super::{BetweenRule, RuleAction, ScopingConfig};

/// Call-history-dependent state of the range rules: the set of rule
/// indices currently active. Owned by one [`ScopeFilter`] instance, not
/// derivable from configuration alone.
#[derive(Debug, Default)]
pub struct BetweenRangeState {
    active: HashSet<usize>,
}

impl BetweenRangeState {
    fn toggle(&mut self, idx: usize) {
        if !self.active.remove(&idx) {
            self.active.insert(idx);
        }
    }
}

/// Decides whether an entry is observable at all.
///
/// Thread-safe: the range state sits behind a mutex because rule
/// evaluation mutates it on every call.
#[derive(Debug)]
pub struct ScopeFilter {
    config: ScopingConfig,
    state: Mutex<BetweenRangeState>,
}

impl ScopeFilter {
    pub fn new(config: ScopingConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BetweenRangeState::default()),
        }
    }

    /// A filter that includes everything.
    pub fn disabled() -> Self {
        Self::new(ScopingConfig::default())
    }

    /// Clear all range state. Intended for test isolation.
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.active.clear();
        }
    }

    /// Whether the entry is observed.
    ///
    /// Evaluates the simple allow-lists, then steps every between-rule's
    /// state machine, then combines: an active include-rule wins, an
    /// active exclude-rule drops, otherwise the allow-lists decide.
    pub fn include(
        &self,
        message: &str,
        identity: &str,
        app_name: &str,
        metadata: &serde_json::Value,
    ) -> bool {
        if !self.config.enabled {
            return true;
        }
        if !self.config.has_filters() {
            return true;
        }

        let matches_existing = self.config.filter_identities.contains(identity)
            || self.config.filtered_applications.contains(app_name);

        let mut state = match self.state.lock() {
            Ok(state) => state,
            // A poisoned lock means a prior panic mid-evaluation; fail open.
            Err(_) => return true,
        };

        let mut log_text: Option<String> = None;
        for (idx, rule) in self.config.between_rules.iter().enumerate() {
            let search_text: &str = if rule.search_log {
                log_text.get_or_insert_with(|| format!("{} {} {}", message, identity, metadata))
            } else {
                identity
            };

            let match_start = rule.start_identities.is_empty()
                || rule
                    .start_identities
                    .iter()
                    .any(|p| pattern_matches(rule, search_text, p));
            let match_end = !rule.end_identities.is_empty()
                && rule
                    .end_identities
                    .iter()
                    .any(|p| pattern_matches(rule, search_text, p));

            if match_start && match_end {
                // Start and end in one entry: a single-entry range.
                state.toggle(idx);
            } else if match_start {
                state.active.insert(idx);
            } else if match_end {
                state.active.remove(&idx);
            }
        }

        let action_of = |idx: &usize| self.config.between_rules[*idx].action;
        if state.active.iter().any(|idx| action_of(idx) == RuleAction::Include) {
            return true;
        }
        if state.active.iter().any(|idx| action_of(idx) == RuleAction::Exclude) {
            return false;
        }

        matches_existing
    }
}

fn pattern_matches(rule: &BetweenRule, text: &str, pattern: &str) -> bool {
    if rule.exact_match {
        text == pattern
    } else {
        text.to_lowercase().contains(&pattern.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(
        action: RuleAction,
        start: &[&str],
        end: &[&str],
        exact_match: bool,
        search_log: bool,
    ) -> BetweenRule {
        BetweenRule {
            action,
            exact_match,
            search_log,
            start_identities: start.iter().map(|s| s.to_string()).collect(),
            end_identities: end.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn config_with_rules(rules: Vec<BetweenRule>) -> ScopingConfig {
        ScopingConfig {
            enabled: true,
            filter_identities: HashSet::new(),
            filtered_applications: HashSet::new(),
            between_rules: rules,
        }
    }

    fn check(filter: &ScopeFilter, identity: &str) -> bool {
        filter.include("msg", identity, "app", &json!({}))
    }

    #[test]
    fn test_disabled_scoping_includes_everything() {
        let filter = ScopeFilter::new(ScopingConfig {
            enabled: false,
            filter_identities: ["only.this".to_string()].into_iter().collect(),
            ..Default::default()
        });
        assert!(check(&filter, "anything"));
    }

    #[test]
    fn test_no_filters_includes_everything() {
        let filter = ScopeFilter::new(ScopingConfig {
            enabled: true,
            ..Default::default()
        });
        assert!(check(&filter, "anything"));
    }

    #[test]
    fn test_identity_allow_list() {
        let filter = ScopeFilter::new(ScopingConfig {
            enabled: true,
            filter_identities: ["db.query".to_string()].into_iter().collect(),
            ..Default::default()
        });
        assert!(check(&filter, "db.query"));
        assert!(!check(&filter, "http.request"));
    }

    #[test]
    fn test_application_allow_list() {
        let filter = ScopeFilter::new(ScopingConfig {
            enabled: true,
            filtered_applications: ["billing".to_string()].into_iter().collect(),
            ..Default::default()
        });
        assert!(filter.include("msg", "anything", "billing", &json!({})));
        assert!(!filter.include("msg", "anything", "frontend", &json!({})));
    }

    #[test]
    fn test_include_range_activates_and_deactivates() {
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &["job.start"],
            &["job.end"],
            false,
            false,
        )]));
        assert!(!check(&filter, "warmup"));
        assert!(check(&filter, "job.start"));
        assert!(check(&filter, "job.step"));
        assert!(!check(&filter, "job.end"));
        assert!(!check(&filter, "cooldown"));
    }

    #[test]
    fn test_empty_start_active_from_first_call() {
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &[],
            &["stop"],
            false,
            false,
        )]));
        assert!(check(&filter, "first.entry"));
    }

    #[test]
    fn test_empty_end_never_deactivates() {
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &["go"],
            &[],
            false,
            false,
        )]));
        assert!(!check(&filter, "before"));
        assert!(check(&filter, "go"));
        for _ in 0..5 {
            assert!(check(&filter, "anything.after"));
        }
    }

    #[test]
    fn test_single_entry_range_via_toggle() {
        // Start and end patterns both hit the same identity: the rule
        // toggles, opening the range on the first hit and closing it on
        // the second.
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &["pulse"],
            &["pulse"],
            false,
            false,
        )]));
        assert!(check(&filter, "pulse"));
        assert!(check(&filter, "within"));
        assert!(!check(&filter, "pulse"));
        assert!(!check(&filter, "after"));
    }

    #[test]
    fn test_exclude_range_drops_entries() {
        let filter = ScopeFilter::new(ScopingConfig {
            enabled: true,
            filter_identities: ["noisy".to_string(), "quiet".to_string()]
                .into_iter()
                .collect(),
            filtered_applications: HashSet::new(),
            between_rules: vec![rule(
                RuleAction::Exclude,
                &["noisy"],
                &["calm"],
                false,
                false,
            )],
        });
        assert!(check(&filter, "quiet"));
        assert!(!check(&filter, "noisy"));
        assert!(!check(&filter, "quiet"));
        assert!(!check(&filter, "calm"));
        assert!(check(&filter, "quiet"));
    }

    #[test]
    fn test_include_beats_exclude_when_both_active() {
        let filter = ScopeFilter::new(config_with_rules(vec![
            rule(RuleAction::Exclude, &[], &[], false, false),
            rule(RuleAction::Include, &[], &[], false, false),
        ]));
        assert!(check(&filter, "anything"));
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &["Job.Start"],
            &[],
            true,
            false,
        )]));
        assert!(!check(&filter, "job.start"));
        assert!(!check(&filter, "prefix.Job.Start"));
        assert!(check(&filter, "Job.Start"));
    }

    #[test]
    fn test_search_log_scans_message_and_metadata() {
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &["batch-7"],
            &[],
            false,
            true,
        )]));
        assert!(!filter.include("starting", "worker", "app", &json!({})));
        assert!(filter.include("starting", "worker", "app", &json!({"batch": "batch-7"})));
    }

    #[test]
    fn test_reset_clears_range_state() {
        let filter = ScopeFilter::new(config_with_rules(vec![rule(
            RuleAction::Include,
            &["go"],
            &[],
            false,
            false,
        )]));
        assert!(check(&filter, "go"));
        assert!(check(&filter, "later"));
        filter.reset();
        assert!(!check(&filter, "later"));
    }
}
