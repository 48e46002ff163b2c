//! Callback registry for session events
//!
//! Listeners are registered as plain closures. Each one gets its own task fed by a
//! tokio broadcast channel, so a slow or failing listener never blocks the session.
//! Listener tasks run on the runtime the registry was created in, so callbacks can be
//! registered from threads outside it.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Type for callback IDs
pub type CallbackId = Uuid;

/// Trait for types that can be delivered to callbacks
pub trait CallbackData: Clone + Send + Sync + 'static + fmt::Debug {}

impl<T> CallbackData for T where T: Clone + Send + Sync + 'static + fmt::Debug {}

const CHANNEL_CAPACITY: usize = 100;

/// Registry of callbacks sharing one broadcast channel
#[derive(Clone)]
pub struct CallbackRegistry<T: CallbackData> {
    sender: broadcast::Sender<T>,
    group: String,
    runtime: Option<Handle>,
    listeners: Arc<DashMap<CallbackId, JoinHandle<()>>>,
}

impl<T: CallbackData> CallbackRegistry<T> {
    /// Create a new callback registry with a group name used in logs
    pub fn with_group(group: &str) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            sender,
            group: group.to_string(),
            runtime: Handle::try_current().ok(),
            listeners: Arc::new(DashMap::new()),
        }
    }

    /// Register a callback function.
    ///
    /// # Panics
    ///
    /// Panics if the registry was created outside a Tokio runtime and this is called
    /// outside one as well.
    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        // Subscribe before spawning so no event sent after this call is missed
        let mut receiver = self.sender.subscribe();
        let group = self.group.clone();

        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::current(),
        };

        let handle = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(data) => {
                        if let Err(e) = callback(data) {
                            error!(
                                callback_id = %id,
                                group = %group,
                                error = %e,
                                "Callback execution failed"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            callback_id = %id,
                            group = %group,
                            skipped,
                            "Callback listener lagged behind"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            debug!(callback_id = %id, group = %group, "Callback listener stopped");
        });

        self.listeners.insert(id, handle);
        debug!(callback_id = %id, group = %self.group, "Registered callback");

        id
    }

    /// Unregister a callback by ID
    pub fn unregister(&self, id: CallbackId) -> bool {
        match self.listeners.remove(&id) {
            Some((_, handle)) => {
                handle.abort();
                debug!(callback_id = %id, group = %self.group, "Unregistered callback");
                true
            }
            None => {
                debug!(
                    callback_id = %id,
                    group = %self.group,
                    "Attempted to unregister non-existent callback"
                );
                false
            }
        }
    }

    /// Deliver data to all registered callbacks, returning how many received it
    pub fn trigger(&self, data: T) -> usize {
        if self.listeners.is_empty() {
            return 0;
        }

        match self.sender.send(data) {
            Ok(count) => {
                debug!(group = %self.group, delivered = count, "Triggered callbacks");
                count
            }
            Err(e) => {
                error!(group = %self.group, error = %e, "Failed to trigger callbacks");
                0
            }
        }
    }

    /// Get the number of registered callbacks
    pub fn count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[derive(Clone, Debug)]
    struct TestEvent {
        value: usize,
    }

    #[tokio::test]
    async fn test_callback_receives_events() {
        let registry = CallbackRegistry::<TestEvent>::with_group("test");
        let total = Arc::new(AtomicUsize::new(0));

        let total_clone = Arc::clone(&total);
        registry.register(move |event| {
            total_clone.fetch_add(event.value, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(registry.count(), 1);

        assert_eq!(registry.trigger(TestEvent { value: 3 }), 1);
        assert_eq!(registry.trigger(TestEvent { value: 4 }), 1);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_register_from_thread_outside_runtime() {
        let registry = CallbackRegistry::<TestEvent>::with_group("test");
        let total = Arc::new(AtomicUsize::new(0));

        let from_thread = registry.clone();
        let total_clone = Arc::clone(&total);
        std::thread::spawn(move || {
            from_thread.register(move |event| {
                total_clone.fetch_add(event.value, Ordering::SeqCst);
                Ok(())
            })
        })
        .join()
        .unwrap();

        assert_eq!(registry.trigger(TestEvent { value: 5 }), 1);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(total.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let registry = CallbackRegistry::<TestEvent>::with_group("test");
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let id = registry.register(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.trigger(TestEvent { value: 1 }), 0);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_affect_others() {
        let registry = CallbackRegistry::<TestEvent>::with_group("test");
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register(|_| Err(anyhow::anyhow!("listener failed")));
        let counter_clone = Arc::clone(&counter);
        registry.register(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        // Clones share the same listeners
        let cloned = registry.clone();
        assert_eq!(cloned.trigger(TestEvent { value: 1 }), 2);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
