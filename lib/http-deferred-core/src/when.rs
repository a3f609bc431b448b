//! Combinators waiting on several promises at once.
//!
//! ```
//! use http_deferred_core::{Deferred, when_all};
//!
//! let first = Deferred::<u32, String>::new();
//! let second = Deferred::<u32, String>::new();
//! let both = when_all(&[first.clone(), second.clone()]);
//!
//! second.resolve(2);
//! first.resolve(1);
//!
//! assert_eq!(*both.outcome().unwrap(), Ok(vec![1, 2]));
//! ```

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{Deferred, Promise};

/// Values collected in input order.
struct Collector<V> {
    slots: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Collector<V> {
    fn new(len: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            slots: std::iter::repeat_with(|| None).take(len).collect(),
            remaining: len,
        }))
    }

    /// Store one value, returning every value once the last slot is filled.
    fn fill(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        if let Some(slot) = self.slots.get_mut(index)
            && slot.replace(value).is_none()
        {
            self.remaining = self.remaining.saturating_sub(1);
        }
        if self.remaining > 0 || self.slots.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.slots).into_iter().flatten().collect())
    }
}

/// Starting a combined deferred starts every input.
fn start_all<P>(promises: &[P]) -> impl FnOnce() + Send + 'static
where
    P: Promise + Clone + Send + 'static,
{
    let promises = promises.to_vec();
    move || promises.iter().for_each(Promise::start)
}

fn fill<V>(collector: &Mutex<Collector<V>>, index: usize, value: V) -> Option<Vec<V>> {
    collector
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .fill(index, value)
}

/// Resolve once every promise resolves, with their values in input order.
///
/// Rejects with the first rejection. An empty input resolves immediately.
/// Starting or awaiting the result starts every input.
pub fn when_all<P>(promises: &[P]) -> Deferred<Vec<P::Value>, P::Error>
where
    P: Promise + Clone + Send + 'static,
    P::Value: Clone + Send + Sync + 'static,
    P::Error: Clone + Send + Sync + 'static,
{
    if promises.is_empty() {
        return Deferred::resolved(Vec::new());
    }

    let combined = Deferred::new();
    let collector = Collector::new(promises.len());

    for (index, promise) in promises.iter().enumerate() {
        let resolve = combined.clone();
        let collector = Arc::clone(&collector);
        promise.on_done(move |value| {
            if let Some(values) = fill(&collector, index, value.clone()) {
                resolve.resolve(values);
            }
        });

        let reject = combined.clone();
        promise.on_fail(move |error| {
            reject.reject(error.clone());
        });
    }
    combined.set_starter(start_all(promises));
    combined
}

/// Resolve once every promise settles, with each outcome in input order.
///
/// Never rejects.
pub fn all_settled<P>(promises: &[P]) -> Deferred<Vec<Result<P::Value, P::Error>>, Infallible>
where
    P: Promise + Clone + Send + 'static,
    P::Value: Clone + Send + Sync + 'static,
    P::Error: Clone + Send + Sync + 'static,
{
    if promises.is_empty() {
        return Deferred::resolved(Vec::new());
    }

    let combined = Deferred::new();
    let collector = Collector::new(promises.len());

    for (index, promise) in promises.iter().enumerate() {
        let resolve = combined.clone();
        let done = Arc::clone(&collector);
        promise.on_done(move |value| {
            if let Some(outcomes) = fill(&done, index, Ok(value.clone())) {
                resolve.resolve(outcomes);
            }
        });

        let resolve = combined.clone();
        let failed = Arc::clone(&collector);
        promise.on_fail(move |error| {
            if let Some(outcomes) = fill(&failed, index, Err(error.clone())) {
                resolve.resolve(outcomes);
            }
        });
    }
    combined.set_starter(start_all(promises));
    combined
}
