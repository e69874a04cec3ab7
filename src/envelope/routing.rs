//! Per-entry routing directives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output destinations the pipeline can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Console,
    File,
    Aggregator,
    Shadow,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Destination::Console => "console",
            Destination::File => "file",
            Destination::Aggregator => "aggregator",
            Destination::Shadow => "shadow",
        };
        f.write_str(s)
    }
}

/// Per-entry allow/block routing lists.
///
/// A block entry always wins: a destination named in `block` never
/// receives the entry, even when `allow` also names it. An empty `allow`
/// list permits all destinations not blocked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingDirective {
    #[serde(default)]
    pub allow: Vec<Destination>,
    #[serde(default)]
    pub block: Vec<Destination>,
}

impl RoutingDirective {
    /// Whether this directive permits delivery to `dest`.
    pub fn permits(&self, dest: Destination) -> bool {
        if self.block.contains(&dest) {
            return false;
        }
        if !self.allow.is_empty() {
            return self.allow.contains(&dest);
        }
        true
    }
}
