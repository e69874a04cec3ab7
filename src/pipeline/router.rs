//! Per-destination routing decisions.

use crate::envelope::{Destination, LogEnvelope, Source};

/// Whether `envelope` may be delivered to `dest`.
///
/// Combines the entry's allow/block routing lists with one hard safety
/// rule: entries the gateway emits about itself never reach the external
/// aggregator, so a failing aggregator cannot feed its own error reports
/// back into itself.
pub fn should_send(envelope: &LogEnvelope, dest: Destination) -> bool {
    if envelope.source == Source::Internal && dest == Destination::Aggregator {
        return false;
    }
    envelope.routing_permits(dest)
}
