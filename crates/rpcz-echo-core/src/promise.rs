//! Single-fire completion handles for asynchronous calls.
//!
//! A [`Promise`] is written at most once through its [`Resolver`] and can be
//! read any number of times by any number of waiters. The waiter may give up
//! with [`Promise::abandon`]; a write arriving afterwards is rejected instead
//! of being observed. A resolver dropped without writing settles the promise
//! as [`Settled::Broken`], so a waiter never hangs on a lost producer.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Debug)]
enum Slot<T> {
    Pending,
    Ready(T),
    Abandoned,
    Broken,
}

/// The terminal state of a [`Promise`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settled<T> {
    Ready(T),
    /// The waiter gave up before a value was written.
    Abandoned,
    /// The producer went away without writing a value.
    Broken,
}

impl<T: Clone> Settled<T> {
    fn from_slot(slot: &Slot<T>) -> Option<Self> {
        match slot {
            Slot::Pending => None,
            Slot::Ready(value) => Some(Self::Ready(value.clone())),
            Slot::Abandoned => Some(Self::Abandoned),
            Slot::Broken => Some(Self::Broken),
        }
    }
}

/// Read side of a single-fire completion.
#[derive(Debug)]
pub struct Promise<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Write side of a single-fire completion. Consumed by [`Resolver::resolve`].
#[derive(Debug)]
pub struct Resolver<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

impl<T: Clone> Promise<T> {
    /// Creates a pending promise and the resolver that settles it.
    pub fn pending() -> (Resolver<T>, Self) {
        let slot = Arc::new(watch::Sender::new(Slot::Pending));
        (
            Resolver {
                slot: Arc::clone(&slot),
            },
            Self { slot },
        )
    }

    /// Waits until the promise settles and returns a copy of the outcome.
    pub async fn wait(&self) -> Settled<T> {
        let mut rx = self.slot.subscribe();
        let settled = match rx.wait_for(|slot| !matches!(slot, Slot::Pending)).await {
            Ok(slot) => Settled::from_slot(&slot),
            // The sender lives as long as `self`, so the channel cannot close.
            Err(_) => None,
        };
        settled.unwrap_or(Settled::Broken)
    }

    /// Returns the outcome if the promise has already settled.
    pub fn peek(&self) -> Option<Settled<T>> {
        Settled::from_slot(&self.slot.borrow())
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.slot.borrow(), Slot::Pending)
    }

    /// Gives up on the promise.
    ///
    /// Returns `false` if it had already settled, in which case the stored
    /// outcome is kept.
    pub fn abandon(&self) -> bool {
        self.slot.send_if_modified(|slot| match slot {
            Slot::Pending => {
                *slot = Slot::Abandoned;
                true
            }
            _ => false,
        })
    }
}

impl<T> Resolver<T> {
    /// Writes the outcome.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the waiter abandoned the promise first.
    pub fn resolve(self, value: T) -> Result<(), T> {
        let mut rejected = None;
        self.slot.send_if_modified(|slot| match slot {
            Slot::Pending => {
                *slot = Slot::Ready(value);
                true
            }
            _ => {
                rejected = Some(value);
                false
            }
        });
        rejected.map_or(Ok(()), Err)
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        self.slot.send_if_modified(|slot| match slot {
            Slot::Pending => {
                *slot = Slot::Broken;
                true
            }
            _ => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_once_and_reads_many_times() {
        let (resolver, promise) = Promise::pending();
        let other = promise.clone();
        assert_eq!(promise.peek(), None);

        let waiter = tokio::spawn(async move { other.wait().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        resolver.resolve(42).unwrap();

        assert_eq!(waiter.await.unwrap(), Settled::Ready(42));
        assert_eq!(promise.wait().await, Settled::Ready(42));
        assert_eq!(promise.wait().await, Settled::Ready(42));
        assert!(promise.is_settled());
    }

    #[tokio::test]
    async fn abandon_rejects_late_write() {
        let (resolver, promise) = Promise::<&str>::pending();
        assert!(promise.abandon());
        assert_eq!(resolver.resolve("late"), Err("late"));
        assert_eq!(promise.wait().await, Settled::Abandoned);
    }

    #[tokio::test]
    async fn abandon_after_resolve_keeps_value() {
        let (resolver, promise) = Promise::pending();
        resolver.resolve(1_u8).unwrap();
        assert!(!promise.abandon());
        assert_eq!(promise.peek(), Some(Settled::Ready(1)));
    }

    #[tokio::test]
    async fn dropped_resolver_breaks_promise() {
        let (resolver, promise) = Promise::<u8>::pending();
        let waiter = {
            let promise = promise.clone();
            tokio::spawn(async move { promise.wait().await })
        };
        drop(resolver);
        assert_eq!(waiter.await.unwrap(), Settled::Broken);
    }
}
