use std::fmt;

use model::Rect;
use render_protocol::{CacheEvent, CacheEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(Rect) + Send>;

struct Subscription {
    id: SubscriptionId,
    kind: CacheEventKind,
    callback: Callback,
}

/// Synchronous fan-out of cache events to subscribers, in registration order.
#[derive(Default)]
pub struct GraphNotifier {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl fmt::Debug for GraphNotifier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GraphNotifier")
            .field("subscribers", &self.subscriptions.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl GraphNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: CacheEventKind,
        callback: impl FnMut(Rect) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        self.subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn emit(&mut self, event: CacheEvent) {
        let kind = event.kind();
        let rect = event.rect();
        for subscription in &mut self.subscriptions {
            if subscription.kind == kind {
                (subscription.callback)(rect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn subscribers_run_in_registration_order_for_their_kind_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = GraphNotifier::new();
        for label in ["first", "second"] {
            let seen = Arc::clone(&seen);
            notifier.subscribe(CacheEventKind::Computed, move |rect| {
                seen.lock().expect("seen").push((label, rect));
            });
        }
        let invalidations = Arc::clone(&seen);
        notifier.subscribe(CacheEventKind::Invalidated, move |rect| {
            invalidations.lock().expect("seen").push(("invalidated", rect));
        });

        let rect = Rect::new(0, 0, 4, 4);
        notifier.emit(CacheEvent::Computed(rect));

        assert_eq!(
            *seen.lock().expect("seen"),
            vec![("first", rect), ("second", rect)]
        );
    }

    #[test]
    fn unsubscribed_callbacks_stop_receiving_events() {
        let count = Arc::new(Mutex::new(0));
        let mut notifier = GraphNotifier::new();
        let counter = Arc::clone(&count);
        let id = notifier.subscribe(CacheEventKind::Failed, move |_| {
            *counter.lock().expect("count") += 1;
        });

        notifier.emit(CacheEvent::Failed(Rect::new(0, 0, 1, 1)));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.emit(CacheEvent::Failed(Rect::new(0, 0, 1, 1)));

        assert_eq!(*count.lock().expect("count"), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
