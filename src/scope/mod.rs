//! Debug scoping.
//!
//! Decides whether an entry is observed at all, before any other
//! processing. Combines simple identity/application allow-lists with
//! stateful range ("between") rules that activate and deactivate across
//! a stream of calls.

mod filter;
mod rules;

pub use filter::{BetweenRangeState, ScopeFilter};
pub use rules::{BetweenRule, RuleAction, ScopingConfig};
