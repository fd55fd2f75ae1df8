//! Webhook get-or-create for output channels.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::common::error::RelayResult;
use crate::registry::{Destination, DestinationRegistry};
use crate::relay::platform::SharedPlatform;
use crate::relay::with_timeout;

/// Resolves the webhook used to relay into a destination.
///
/// A cached URL is trusted without checking that the webhook still exists;
/// the dispatcher clears it when a delivery reports it gone.
#[derive(Clone)]
pub struct RelayResolver {
    registry: DestinationRegistry,
    platform: SharedPlatform,
    webhook_name: String,
    call_timeout: Duration,
}

impl RelayResolver {
    pub fn new(
        registry: DestinationRegistry,
        platform: SharedPlatform,
        webhook_name: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            platform,
            webhook_name: webhook_name.into(),
            call_timeout,
        }
    }

    /// Each registry and platform call gets its own time bound.
    pub async fn resolve(&self, destination: &Destination) -> RelayResult<String> {
        let (guild_id, channel_id) = (destination.guild_id, destination.channel_id);

        if let Some(url) = &destination.webhook_url {
            return Ok(url.clone());
        }
        // Another pass may have cached one since the snapshot was taken.
        let cached = with_timeout(
            self.call_timeout,
            "reading cached webhook",
            self.registry.get_relay_handle(guild_id, channel_id),
        )
        .await?;
        if let Some(url) = cached {
            return Ok(url);
        }

        let self_id = self.platform.self_user_id();
        let existing = with_timeout(
            self.call_timeout,
            "listing webhooks",
            self.platform.list_relay_endpoints(channel_id),
        )
        .await?;
        if let Some(endpoint) = existing.into_iter().find(|e| e.owner_id == Some(self_id)) {
            debug!("Found existing webhook for channel {}", channel_id);
            self.remember(destination, &endpoint.url).await;
            return Ok(endpoint.url);
        }

        let endpoint = with_timeout(
            self.call_timeout,
            "creating webhook",
            self.platform.create_relay_endpoint(channel_id, &self.webhook_name),
        )
        .await?;
        info!("Created new webhook for channel {}", channel_id);
        self.remember(destination, &endpoint.url).await;
        Ok(endpoint.url)
    }

    /// Cache the URL. A failed write only costs a re-resolve next time.
    async fn remember(&self, destination: &Destination, url: &str) {
        let write = self.registry.set_relay_handle(
            destination.guild_id,
            destination.channel_id,
            Some(url.to_string()),
        );
        if let Err(e) = with_timeout(self.call_timeout, "caching webhook", write).await {
            warn!(
                "Could not cache webhook for channel {}: {}",
                destination.channel_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::common::error::RelayError;
    use crate::links::CategoryPatch;
    use crate::relay::platform::RelayEndpoint;
    use crate::relay::testing::{FakePlatform, BOT_USER_ID};
    use crate::store::MemoryStore;

    async fn setup() -> (RelayResolver, DestinationRegistry, Arc<FakePlatform>, Destination) {
        let registry = DestinationRegistry::new(Arc::new(MemoryStore::new()));
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel(1, 10, "links");
        let destination = registry.upsert(1, 10, &CategoryPatch::all_enabled()).await.unwrap();
        let resolver = RelayResolver::new(
            registry.clone(),
            platform.clone(),
            "Link Monitor",
            Duration::from_secs(5),
        );
        (resolver, registry, platform, destination)
    }

    #[tokio::test]
    async fn test_creates_and_caches_webhook() {
        let (resolver, registry, platform, destination) = setup().await;

        let url = resolver.resolve(&destination).await.unwrap();
        assert_eq!(platform.created_webhooks(), vec![(10, "Link Monitor".to_string())]);
        assert_eq!(registry.get_relay_handle(1, 10).await.unwrap(), Some(url));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (resolver, _, platform, destination) = setup().await;

        // Same stale snapshot both times: the second call must hit the cache.
        let first = resolver.resolve(&destination).await.unwrap();
        let second = resolver.resolve(&destination).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(platform.created_webhooks().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_handle_is_trusted() {
        let (resolver, _, platform, mut destination) = setup().await;
        destination.webhook_url = Some("https://cached/hook".to_string());

        assert_eq!(resolver.resolve(&destination).await.unwrap(), "https://cached/hook");
        assert!(platform.created_webhooks().is_empty());
        assert_eq!(platform.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_reuses_owned_webhook() {
        let (resolver, registry, platform, destination) = setup().await;
        platform.add_webhook(10, RelayEndpoint {
            url: "https://someone-else".to_string(),
            owner_id: Some(42),
        });
        platform.add_webhook(10, RelayEndpoint {
            url: "https://ours".to_string(),
            owner_id: Some(BOT_USER_ID),
        });

        assert_eq!(resolver.resolve(&destination).await.unwrap(), "https://ours");
        assert!(platform.created_webhooks().is_empty());
        assert_eq!(
            registry.get_relay_handle(1, 10).await.unwrap().as_deref(),
            Some("https://ours")
        );
    }

    #[tokio::test]
    async fn test_permission_denied_is_reported() {
        let (resolver, registry, platform, destination) = setup().await;
        platform.fail_webhooks(10, RelayError::permission("Manage Webhooks missing"));

        let result = resolver.resolve(&destination).await;
        assert!(matches!(result, Err(RelayError::PermissionDenied { .. })));
        assert_eq!(registry.get_relay_handle(1, 10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_handle() {
        let (resolver, registry, _, destination) = setup().await;
        registry.remove(1, 10).await.unwrap();

        assert!(resolver.resolve(&destination).await.is_ok());
    }

    #[tokio::test]
    async fn test_created_webhook_is_cached_when_calls_are_slow() {
        let (_, registry, platform, destination) = setup().await;
        platform.slow_calls(Duration::from_millis(150));
        let resolver = RelayResolver::new(
            registry.clone(),
            platform.clone(),
            "Link Monitor",
            Duration::from_millis(250),
        );

        // Listing plus creating exceeds one call's bound; each alone fits.
        let url = resolver.resolve(&destination).await.unwrap();
        assert_eq!(registry.get_relay_handle(1, 10).await.unwrap(), Some(url));
    }

    #[tokio::test]
    async fn test_slow_webhook_lookup_times_out() {
        let (_, registry, platform, destination) = setup().await;
        platform.slow_calls(Duration::from_secs(5));
        let resolver = RelayResolver::new(
            registry.clone(),
            platform.clone(),
            "Link Monitor",
            Duration::from_millis(20),
        );

        let error = resolver.resolve(&destination).await.unwrap_err();
        assert!(matches!(error, RelayError::Transport { .. }));
        assert_eq!(registry.get_relay_handle(1, 10).await.unwrap(), None);
    }
}
