//! Combinators over collections of promises.
//!
//! - [`all`]: every input, in input order
//! - [`race`]: whichever input settles first
//! - [`any`]: the first input to fulfill
//! - [`some`]: the first `count` inputs to fulfill, in input order
//! - [`map`]: every input passed through a mapper, in input order
//! - [`reduce`]/[`reduce_with`]: a sequential left fold
//!
//! Each combinator builds its aggregate promise from `then`/`cancel` alone.
//! Cancelling the aggregate cancels every input it has seen so far (and any
//! input that arrives afterwards) through a [`CancellationQueue`]. Progress
//! of any input is forwarded to the aggregate.

pub mod map;
pub mod race;
pub mod reduce;
pub mod some;

pub use map::{all, map};
pub use race::race;
pub use reduce::{reduce, reduce_with};
pub use some::{any, some};

use std::rc::Rc;

use crate::shared::ProgressFn;
use crate::{CancellationQueue, Deferred, IntoResolution, Promise, Reason, Resolution, Resolver, Settle, Update};

/// The input collection of a combinator: known now, or promised.
pub enum Inputs<T> {
    Items(Vec<Resolution<T>>),
    Promised(Promise<Vec<Resolution<T>>>),
}

/// Anything a combinator accepts as its input collection.
///
/// Implemented for a `Vec` of items and for a `Promise` of a `Vec` of
/// items, where an item is a `Result<T, Reason>`, a `Promise<T>` or a
/// [`Resolution<T>`].
pub trait IntoInputs {
    type Item: Clone + 'static;

    fn into_inputs(self) -> Inputs<Self::Item>;
}

impl<T: Clone + 'static> IntoInputs for Inputs<T> {
    type Item = T;

    fn into_inputs(self) -> Inputs<T> {
        self
    }
}

impl<R> IntoInputs for Vec<R>
where
    R: IntoResolution,
    R::Output: Clone + 'static,
{
    type Item = R::Output;

    fn into_inputs(self) -> Inputs<R::Output> {
        Inputs::Items(self.into_iter().map(IntoResolution::into_resolution).collect())
    }
}

impl<R> IntoInputs for Promise<Vec<R>>
where
    R: IntoResolution + Clone + 'static,
    R::Output: Clone + 'static,
{
    type Item = R::Output;

    fn into_inputs(self) -> Inputs<R::Output> {
        Inputs::Promised(self.then(|items| {
            Ok::<_, Reason>(
                items
                    .into_iter()
                    .map(IntoResolution::into_resolution)
                    .collect::<Vec<_>>(),
            )
        }))
    }
}

/// Builds an aggregate promise whose canceller drains a fresh queue, and
/// hands the input items to `on_items` once they are known.
pub(crate) fn aggregate<T, U, F>(inputs: Inputs<T>, on_items: F) -> Promise<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: FnOnce(Vec<Resolution<T>>, Resolver<U>, &CancellationQueue) + 'static,
{
    let queue = Rc::new(CancellationQueue::new());
    let cancel = queue.clone();
    let deferred = Deferred::with_canceller(move |_| {
        cancel.cancel();
        Ok(())
    });
    let resolver = deferred.resolver();

    match inputs {
        Inputs::Items(items) => on_items(items, resolver, &*queue),
        Inputs::Promised(promise) => {
            queue.enqueue(promise.downgrade());
            let progress = progress_to(&resolver);
            promise.subscribe(
                move |outcome| match outcome {
                    Ok(items) => on_items(items, resolver, &*queue),
                    Err(reason) => resolver.reject(reason),
                },
                Some(progress),
            );
        }
    }
    deferred.promise()
}

/// Turns one item into a promise registered for cancellation.
pub(crate) fn enlist<T: Clone + 'static>(item: Resolution<T>, queue: &CancellationQueue) -> Promise<T> {
    let promise = Promise::from_resolution(item);
    queue.enqueue(promise.downgrade());
    promise
}

pub(crate) fn progress_to<U: Clone + 'static>(resolver: &Resolver<U>) -> ProgressFn {
    let resolver = resolver.clone();
    Rc::new(move |update: Update| resolver.notify(update))
}
