//! Link relay: webhook resolution, delivery and routing.

pub mod dispatcher;
pub mod platform;
pub mod resolver;
pub mod router;

#[cfg(test)]
pub mod testing;

use std::future::Future;
use std::time::Duration;

use crate::common::error::{RelayError, RelayResult};

pub use dispatcher::{DeliveryFailure, Dispatcher};
pub use platform::{Platform, RelayEndpoint, RelayPayload, SharedPlatform, TextChannel};
pub use resolver::RelayResolver;
pub use router::{DestinationOutcome, LinkRouter, RoutingResult};

/// Bound an external call. Elapsed time surfaces as a transport error.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, call: F) -> RelayResult<T>
where
    F: Future<Output = RelayResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::transport(format!(
            "Timed out after {}s while {}",
            limit.as_secs(),
            what
        ))),
    }
}
