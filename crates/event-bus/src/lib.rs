use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use rne_core_types::RneError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), RneError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Broadcast bus shared by the engine driver and the classification collaborator.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Synchronous publish for callers that cannot await, such as engine callbacks.
    ///
    /// Returns the number of subscribers that received the event. Publishing with
    /// no subscriber is not an error; the event is simply dropped.
    pub fn emit(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "bus event dropped, no subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), RneError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| RneError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let bus = InMemoryBus::<u32>::new(4);
        let mut rx = bus.subscribe();
        bus.publish(7).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn publish_without_subscribers_fails_but_emit_does_not() {
        let bus = InMemoryBus::<u32>::new(4);
        assert!(bus.publish(1).await.is_err());
        assert_eq!(bus.emit(1), 0);
    }

    #[tokio::test]
    async fn slow_subscribers_observe_the_lag() {
        let bus = InMemoryBus::<u32>::new(2);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        for n in 0..4 {
            bus.emit(n);
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap(), 2);
    }
}
