use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crewdesk_types::api::MessageResponse;
use crewdesk_types::events::GatewayEvent;

/// The live feed for one open channel view: the channel id plus the ids of
/// every message delivered in the history batch, so a message inserted while
/// the history query ran is never delivered twice.
#[derive(Debug)]
pub struct ChannelWatch {
    channel_id: Uuid,
    seen: HashSet<Uuid>,
}

impl ChannelWatch {
    pub fn new(channel_id: Uuid, history: &[MessageResponse]) -> Self {
        Self {
            channel_id,
            seen: history.iter().map(|m| m.id).collect(),
        }
    }

    pub fn channel_id(&self) -> Uuid {
        self.channel_id
    }
}

/// Per-connection watch state. At most one feed is ever active; installing a
/// new one tears down the old one first, and release is idempotent.
#[derive(Debug, Default)]
pub struct FeedFilter {
    active: Option<ChannelWatch>,
    released: u64,
}

impl FeedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a watch, releasing any existing one first. Returns true if a
    /// previous feed was torn down.
    pub fn install(&mut self, watch: ChannelWatch) -> bool {
        let replaced = self.release();
        debug!("feed opened for channel {}", watch.channel_id);
        self.active = Some(watch);
        replaced
    }

    /// Release the active feed. Returns true only when a feed was actually
    /// open, so every open is paired with exactly one effective release.
    pub fn release(&mut self) -> bool {
        match self.active.take() {
            Some(watch) => {
                debug!("feed released for channel {}", watch.channel_id);
                self.released += 1;
                true
            }
            None => false,
        }
    }

    pub fn is_watching(&self, channel_id: Uuid) -> bool {
        self.active
            .as_ref()
            .map_or(false, |w| w.channel_id == channel_id)
    }

    /// Whether a broadcast event should be forwarded to this connection.
    /// Connection-level events always pass; channel events pass only for the
    /// watched channel and only if they were not in the history batch.
    pub fn allows(&self, event: &GatewayEvent) -> bool {
        let Some(channel_id) = event.channel_id() else {
            return true;
        };
        let Some(watch) = &self.active else {
            return false;
        };
        if watch.channel_id != channel_id {
            return false;
        }
        match event {
            GatewayEvent::MessageCreate { id, .. } => !watch.seen.contains(id),
            _ => true,
        }
    }

    /// Number of feeds torn down over the life of this connection.
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

/// Client-side ordered message list for one channel view: seeded with the
/// history batch (ascending creation time), then appended to as live events
/// arrive, in receipt order. Append-only; duplicates by id are dropped.
#[derive(Debug, Default)]
pub struct ChannelFeed {
    messages: Vec<MessageResponse>,
    ids: HashSet<Uuid>,
}

impl ChannelFeed {
    pub fn from_history(history: Vec<MessageResponse>) -> Self {
        let ids = history.iter().map(|m| m.id).collect();
        Self {
            messages: history,
            ids,
        }
    }

    /// Append a live message. Returns false (and leaves the list untouched)
    /// if the id was already rendered.
    pub fn append(&mut self, message: MessageResponse) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[MessageResponse] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(channel: Uuid, n: i64) -> MessageResponse {
        MessageResponse {
            id: Uuid::new_v4(),
            channel_id: channel,
            author_id: Uuid::new_v4(),
            author_name: format!("user{n}"),
            author_avatar_url: None,
            content: format!("message {n}"),
            created_at: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
        }
    }

    fn create_event(m: &MessageResponse) -> GatewayEvent {
        GatewayEvent::MessageCreate {
            id: m.id,
            channel_id: m.channel_id,
            author_id: m.author_id,
            author_name: m.author_name.clone(),
            author_avatar_url: m.author_avatar_url.clone(),
            content: m.content.clone(),
            timestamp: m.created_at,
        }
    }

    #[test]
    fn rendered_order_is_history_then_live_receipt_order() {
        let channel = Uuid::new_v4();
        let history = vec![msg(channel, 1), msg(channel, 2), msg(channel, 3)];
        let mut feed = ChannelFeed::from_history(history.clone());

        // Live events arrive out of creation-time order on purpose: the
        // guarantee is receipt order, not causal order.
        let live_a = msg(channel, 9);
        let live_b = msg(channel, 5);
        assert!(feed.append(live_a.clone()));
        assert!(feed.append(live_b.clone()));

        let order: Vec<Uuid> = feed.messages().iter().map(|m| m.id).collect();
        let expected: Vec<Uuid> = history
            .iter()
            .map(|m| m.id)
            .chain([live_a.id, live_b.id])
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn duplicate_appends_are_dropped() {
        let channel = Uuid::new_v4();
        let m = msg(channel, 1);
        let mut feed = ChannelFeed::from_history(vec![m.clone()]);
        assert!(!feed.append(m));
        assert_eq!(feed.messages().len(), 1);
    }

    #[test]
    fn rewatch_tears_down_exactly_one_previous_feed() {
        let mut filter = FeedFilter::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(!filter.install(ChannelWatch::new(first, &[])));
        assert_eq!(filter.released_count(), 0);

        // Second watch: the first feed is released before the new one opens.
        assert!(filter.install(ChannelWatch::new(second, &[])));
        assert_eq!(filter.released_count(), 1);
        assert!(filter.is_watching(second));
        assert!(!filter.is_watching(first));
    }

    #[test]
    fn release_is_idempotent() {
        let mut filter = FeedFilter::new();
        filter.install(ChannelWatch::new(Uuid::new_v4(), &[]));
        assert!(filter.release());
        assert!(!filter.release());
        assert_eq!(filter.released_count(), 1);
    }

    #[test]
    fn filter_blocks_other_channels_and_batch_duplicates() {
        let channel = Uuid::new_v4();
        let batched = msg(channel, 1);
        let mut filter = FeedFilter::new();
        filter.install(ChannelWatch::new(channel, std::slice::from_ref(&batched)));

        // Fresh message on the watched channel passes.
        let live = msg(channel, 2);
        assert!(filter.allows(&create_event(&live)));

        // The same message that was already in the history batch does not.
        assert!(!filter.allows(&create_event(&batched)));

        // Another channel's traffic does not.
        let other = msg(Uuid::new_v4(), 3);
        assert!(!filter.allows(&create_event(&other)));
    }

    #[test]
    fn unwatched_connection_gets_no_channel_events() {
        let filter = FeedFilter::new();
        let m = msg(Uuid::new_v4(), 1);
        assert!(!filter.allows(&create_event(&m)));
        // Connection-level events still pass.
        assert!(filter.allows(&GatewayEvent::Ready {
            user_id: Uuid::new_v4(),
            name: "a".into(),
        }));
    }
}
