//! Collapsing concurrent calls of the same operation.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

type Flight = Shared<BoxFuture<'static, Result<(), String>>>;

/// Per-key registry of in-flight operations.
///
/// The first caller for a key starts the operation; callers arriving while
/// it runs await the same execution and observe its result. Once finished
/// the key is free again, so the next call starts a new operation.
///
/// The operation is driven by whichever caller polls it, so it completes
/// even if the caller that started it goes away.
///
/// # Examples
///
/// ```
/// use ddpls::document::SingleFlight;
///
/// # futures::executor::block_on(async {
/// let flights = SingleFlight::new();
/// let result = flights.run("key", || async { Ok(()) }).await;
/// assert!(result.is_ok());
/// assert_eq!(flights.in_flight(), 0);
/// # });
/// ```
pub struct SingleFlight<K> {
    flights: Mutex<HashMap<K, Flight>>,
}

impl<K> Default for SingleFlight<K> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` for `key` unless one is already in flight, in which
    /// case its outcome is awaited instead. `operation` is only called by
    /// the caller that starts a new flight.
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> Result<(), String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let flight = {
            let mut flights = self.flights.lock();
            flights
                .entry(key.clone())
                .or_insert_with(|| operation().boxed().shared())
                .clone()
        };

        let result = flight.clone().await;

        let mut flights = self.flights.lock();
        if flights.get(&key).is_some_and(|current| current.ptr_eq(&flight)) {
            flights.remove(&key);
        }
        result
    }

    /// Number of keys with an operation in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}
