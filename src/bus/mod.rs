use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::models::event::RouteEvent;

/// Per-route fan-out with no replay: a subscriber only sees events published
/// after it subscribed, and a subscriber that falls more than the buffer
/// behind observes a lag error and is expected to disconnect. Publishing
/// never blocks.
pub struct RouteEventBus {
    topics: DashMap<i64, broadcast::Sender<RouteEvent>>,
    buffer: usize,
}

impl RouteEventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Unsubscribing is dropping the returned receiver.
    pub fn subscribe(&self, route_id: i64) -> broadcast::Receiver<RouteEvent> {
        self.topics
            .entry(route_id)
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe()
    }

    /// Fans out to current subscribers of the route's topic and returns how
    /// many received it. A topic with no subscribers left is dropped.
    pub fn publish(&self, route_id: i64, event: RouteEvent) -> usize {
        let delivered = match self.topics.get(&route_id) {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            self.topics
                .remove_if(&route_id, |_, tx| tx.receiver_count() == 0);
        }

        delivered
    }

    pub fn subscriber_count(&self, route_id: i64) -> usize {
        self.topics
            .get(&route_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::RouteEventBus;
    use crate::models::event::RouteEvent;

    fn rerouted(route_id: i64) -> RouteEvent {
        RouteEvent::Rerouted {
            route_id,
            stops: Vec::new(),
        }
    }

    fn route_id_of(event: &RouteEvent) -> i64 {
        match event {
            RouteEvent::Rerouted { route_id, .. } => *route_id,
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_delivers_nothing() {
        let bus = RouteEventBus::new(8);
        assert_eq!(bus.publish(1, rerouted(1)), 0);
        assert_eq!(bus.subscriber_count(1), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_events_in_publish_order() {
        let bus = RouteEventBus::new(8);
        let mut rx = bus.subscribe(7);

        for _ in 0..3 {
            assert_eq!(bus.publish(7, rerouted(7)), 1);
        }
        // A different route's topic does not leak over.
        bus.publish(8, rerouted(8));

        for _ in 0..3 {
            assert_eq!(route_id_of(&rx.recv().await.unwrap()), 7);
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_sees_no_replay() {
        let bus = RouteEventBus::new(8);
        let _early = bus.subscribe(5);
        bus.publish(5, rerouted(5));

        let mut late = bus.subscribe(5);
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_lags_out_without_stalling_publisher() {
        let bus = RouteEventBus::new(2);
        let mut rx = bus.subscribe(3);

        for _ in 0..5 {
            bus.publish(3, rerouted(3));
        }

        assert!(matches!(
            rx.recv().await,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[tokio::test]
    async fn dropping_the_receiver_unsubscribes() {
        let bus = RouteEventBus::new(8);
        let rx = bus.subscribe(2);
        assert_eq!(bus.subscriber_count(2), 1);
        drop(rx);
        bus.publish(2, rerouted(2));
        assert_eq!(bus.subscriber_count(2), 0);
    }
}
