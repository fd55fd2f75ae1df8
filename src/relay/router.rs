//! Routing engine.
//!
//! Takes a guild message, groups its URLs by category, fans each group out
//! to every output channel that accepts it and removes the source message
//! once at least one channel received something.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::common::error::RelayError;
use crate::common::types::{Author, ChannelId, IncomingMessage};
use crate::links::{extract_urls, group_by_category, Category};
use crate::registry::{Destination, DestinationRegistry};
use crate::relay::dispatcher::Dispatcher;
use crate::relay::platform::SharedPlatform;
use crate::relay::resolver::RelayResolver;
use crate::relay::with_timeout;

/// The categories one output channel should receive for a message.
#[derive(Debug, Clone)]
pub struct DeliveryPlan {
    pub destination: Destination,
    pub batches: Vec<(Category, Vec<String>)>,
}

/// Plan deliveries for grouped URLs.
///
/// Destinations are kept in the given order, each listed once, with the
/// batches it accepts in group order. Destinations accepting nothing are
/// dropped.
pub fn plan_deliveries(
    groups: &[(Category, Vec<String>)],
    destinations: &[Destination],
) -> Vec<DeliveryPlan> {
    let mut seen: HashSet<ChannelId> = HashSet::new();
    destinations
        .iter()
        .filter(|d| seen.insert(d.channel_id))
        .filter_map(|destination| {
            let batches: Vec<_> = groups
                .iter()
                .filter(|(category, urls)| !urls.is_empty() && destination.accepts(*category))
                .cloned()
                .collect();
            (!batches.is_empty()).then(|| DeliveryPlan {
                destination: destination.clone(),
                batches,
            })
        })
        .collect()
}

/// What happened at one output channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationOutcome {
    pub channel_id: ChannelId,
    /// Categories delivered, with the number of messages posted. A batch
    /// that failed part way is listed here and under `failures`.
    pub delivered: Vec<(Category, usize)>,
    /// Failures, with the category when one delivery failed.
    pub failures: Vec<(Option<Category>, RelayError)>,
}

impl DestinationOutcome {
    fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            delivered: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// At least one message was posted.
    pub fn reached(&self) -> bool {
        !self.delivered.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingResult {
    pub outcomes: Vec<DestinationOutcome>,
    pub source_deleted: bool,
}

impl RoutingResult {
    pub fn any_reached(&self) -> bool {
        self.outcomes.iter().any(DestinationOutcome::reached)
    }
}

#[derive(Clone)]
pub struct LinkRouter {
    registry: DestinationRegistry,
    resolver: RelayResolver,
    dispatcher: Dispatcher,
    platform: SharedPlatform,
    call_timeout: Duration,
}

impl LinkRouter {
    pub fn new(
        registry: DestinationRegistry,
        platform: SharedPlatform,
        webhook_name: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            resolver: RelayResolver::new(
                registry.clone(),
                platform.clone(),
                webhook_name,
                call_timeout,
            ),
            dispatcher: Dispatcher::new(platform.clone(), call_timeout),
            registry,
            platform,
            call_timeout,
        }
    }

    /// Route an incoming guild message. `None` if it carried no URLs.
    pub async fn process_message(&self, message: &IncomingMessage) -> Option<RoutingResult> {
        let urls = extract_urls(&message.content)?;
        Some(self.route(message, &urls).await)
    }

    /// Deliver `urls` to every accepting output channel of the message's
    /// guild, then delete the source message if any channel was reached.
    pub async fn route(&self, message: &IncomingMessage, urls: &[String]) -> RoutingResult {
        let guild_id = message.guild_id;
        if urls.is_empty() {
            return RoutingResult::default();
        }
        let groups = group_by_category(urls);

        let destinations = match with_timeout(
            self.call_timeout,
            "listing output channels",
            self.registry.list_for_guild(guild_id, None),
        )
        .await
        {
            Ok(destinations) => destinations,
            Err(e) => {
                error!(guild_id, "Failed to load output channels: {}", e);
                return RoutingResult::default();
            }
        };

        let plans = plan_deliveries(&groups, &destinations);
        if plans.is_empty() {
            debug!(guild_id, "No output channel accepts these links");
            return RoutingResult::default();
        }

        let outcomes = join_all(
            plans
                .into_iter()
                .map(|plan| self.deliver_to(plan, &message.author)),
        )
        .await;

        let mut result = RoutingResult {
            outcomes,
            source_deleted: false,
        };

        if result.any_reached() {
            match with_timeout(
                self.call_timeout,
                "deleting source message",
                self.platform.delete_message(message.channel_id, message.message_id),
            )
            .await
            {
                Ok(()) => {
                    result.source_deleted = true;
                    debug!(guild_id, message_id = message.message_id, "Deleted source message");
                }
                Err(e) if e.is_permission_denied() => {
                    warn!(guild_id, "Missing permission to delete message {}", message.message_id);
                }
                Err(e) => {
                    error!(guild_id, "Failed to delete message {}: {}", message.message_id, e);
                }
            }
        }

        result
    }

    async fn deliver_to(&self, plan: DeliveryPlan, author: &Author) -> DestinationOutcome {
        let destination = &plan.destination;
        let (guild_id, channel_id) = (destination.guild_id, destination.channel_id);
        let mut outcome = DestinationOutcome::new(channel_id);

        match with_timeout(
            self.call_timeout,
            "looking up channel",
            self.platform.text_channel(guild_id, channel_id),
        )
        .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(guild_id, channel_id, "Output channel no longer exists, skipping");
                outcome
                    .failures
                    .push((None, RelayError::not_found(format!("channel {}", channel_id))));
                return outcome;
            }
            Err(e) => {
                warn!(guild_id, channel_id, "Could not look up output channel: {}", e);
                outcome.failures.push((None, e));
                return outcome;
            }
        }

        let webhook_url = match self.resolver.resolve(destination).await {
            Ok(url) => url,
            Err(e) => {
                if e.is_permission_denied() {
                    warn!(guild_id, channel_id, "Missing permission to manage webhooks");
                } else {
                    error!(guild_id, channel_id, "Failed to resolve webhook: {}", e);
                }
                outcome.failures.push((None, e));
                return outcome;
            }
        };

        for (category, urls) in &plan.batches {
            let failure = match self.dispatcher.deliver(&webhook_url, urls, author).await {
                Ok(messages) => {
                    info!(
                        guild_id,
                        channel_id,
                        "Forwarded {} {} link(s)",
                        urls.len(),
                        category
                    );
                    outcome.delivered.push((*category, messages));
                    continue;
                }
                Err(failure) => failure,
            };

            if failure.chunks_sent > 0 {
                warn!(
                    guild_id,
                    channel_id,
                    "Forwarded only {} message(s) of {} links",
                    failure.chunks_sent,
                    category
                );
                outcome.delivered.push((*category, failure.chunks_sent));
            }

            let e = failure.error;
            if e.is_not_found() {
                warn!(guild_id, channel_id, "Webhook is gone, clearing cached handle");
                let clear = with_timeout(
                    self.call_timeout,
                    "clearing webhook",
                    self.registry.set_relay_handle(guild_id, channel_id, None),
                );
                if let Err(clear) = clear.await {
                    warn!(guild_id, channel_id, "Failed to clear webhook: {}", clear);
                }
                outcome.failures.push((Some(*category), e));
                break;
            }
            error!(guild_id, channel_id, "Failed to forward {} links: {}", category, e);
            outcome.failures.push((Some(*category), e));
        }

        outcome
    }
}
