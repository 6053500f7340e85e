use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Fan-out hub for per-row change notifications.
///
/// Each watched row gets its own lazily-created broadcast channel, keyed by
/// `"{collection}/{row_id}"`. Publishing to a row nobody watches is a no-op,
/// and channels without receivers are pruned on the next publish.
pub struct RowChangeHub {
    channels: DashMap<String, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl RowChangeHub {
    /// Construct a hub whose per-row channels hold `capacity` pending events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to change events for one row, creating its channel if needed.
    pub fn subscribe(&self, collection: &str, row_id: &str) -> broadcast::Receiver<ServerEvent> {
        let key = channel_key(collection, row_id);
        self.channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish a change event for one row to all of its current subscribers.
    pub fn publish(&self, collection: &str, row_id: &str, event: ServerEvent) {
        let key = channel_key(collection, row_id);
        let Some(sender) = self.channels.get(&key) else {
            return;
        };

        if sender.send(event).is_err() {
            // Every receiver hung up; drop the channel so the map stays small.
            drop(sender);
            self.channels
                .remove_if(&key, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// Number of live channels, used by tests and diagnostics.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

fn channel_key(collection: &str, row_id: &str) -> String {
    format!("{collection}/{row_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::sse::ServerEvent;

    fn sample_event() -> ServerEvent {
        ServerEvent {
            event: "update".into(),
            data: "{}".into(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_for_its_row_only() {
        let hub = RowChangeHub::new(4);
        let mut races = hub.subscribe("races", "r1");
        let mut players = hub.subscribe("players", "p1");

        hub.publish("races", "r1", sample_event());

        let received = races.recv().await.unwrap();
        assert_eq!(received.event, "update");
        assert!(players.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let hub = RowChangeHub::new(4);
        hub.publish("races", "ghost", sample_event());
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn dead_channels_are_pruned_on_publish() {
        let hub = RowChangeHub::new(4);
        let receiver = hub.subscribe("races", "r1");
        drop(receiver);
        assert_eq!(hub.channel_count(), 1);

        hub.publish("races", "r1", sample_event());
        assert_eq!(hub.channel_count(), 0);
    }
}
