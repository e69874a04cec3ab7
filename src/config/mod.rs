//! Configuration for the logging gateway.
//!
//! Configuration is an explicit value passed at construction. Loading
//! from a TOML file is a separately invoked convenience with no hidden
//! lifetime or caching.

mod settings;

pub use settings::*;
