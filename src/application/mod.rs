//! Application layer: the services that drive the payment lifecycle over
//! the domain ports. Each service holds shared store/gateway handles and is
//! cheap to clone.

pub mod dispatcher;
pub mod provisioning;
pub mod reconciler;
pub mod resolver;
pub mod verifier;

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
