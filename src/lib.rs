//! A single-threaded promise/deferred primitive.
//!
//! A [`Promise`] starts pending and is settled exactly once, to a value or a
//! [`Reason`], by whoever holds its [`Resolver`] (usually through a
//! [`Deferred`]). Consumers attach reactions with [`Promise::then`] and
//! friends; every reaction returns a new promise, so chains compose. Pending
//! work can report progress ([`Settle::notify`]) and be cancelled
//! cooperatively ([`Promise::cancel`]).
//!
//! Everything runs on the caller's stack: settling a promise runs its
//! reactions before `resolve` returns. There is no scheduler. Promises can
//! also be awaited from any executor through their [`IntoFuture`]
//! implementation.
//!
//! # Examples
//!
//! ```
//! use promise_deferred::{all, Deferred, Reason, Settle};
//! use futures::executor::block_on;
//!
//! let first = Deferred::<u32>::new();
//! let second = Deferred::<u32>::new();
//! let sum = all(vec![first.promise(), second.promise()])
//!     .then(|values| Ok::<_, Reason>(values.iter().sum::<u32>()));
//!
//! first.resolve(1);
//! second.resolve(2);
//! assert_eq!(block_on(async { sum.await }), Ok(3));
//! ```
//!
//! [`IntoFuture`]: std::future::IntoFuture

mod cancellation_queue;
pub mod combinator;
mod consumer;
mod deferred;
mod done;
mod immediate;
mod promise;
mod reason;
mod resolution;
mod shared;
mod update;

pub use cancellation_queue::{Cancellable, CancellationQueue};
pub use combinator::{all, any, map, race, reduce, reduce_with, some, Inputs, IntoInputs};
pub use consumer::Consumer;
pub use deferred::{Deferred, Resolver, Settle};
pub use done::Done;
pub use promise::{Promise, PromiseState};
pub use reason::{Error, Reason, ReasonKind, UnhandledRejection};
pub use resolution::{IntoResolution, Resolution, Thenable};
pub use update::Update;

/// Wraps anything a promise can be resolved with into a promise: values
/// fulfill, `Err` rejects, promises are returned as they are and thenables
/// are adopted.
///
/// # Examples
///
/// ```
/// use promise_deferred::{resolve, Promise, PromiseState};
///
/// assert_eq!(resolve(1).state(), PromiseState::Fulfilled);
///
/// let same: Promise<i32> = resolve(Promise::fulfilled(2));
/// assert_eq!(same.state(), PromiseState::Fulfilled);
/// ```
pub fn resolve<T: Clone + 'static>(value: impl Into<Resolution<T>>) -> Promise<T> {
    Promise::from_resolution(value.into())
}

/// A promise rejected with `reason`.
pub fn reject<T: Clone + 'static>(reason: impl Into<Reason>) -> Promise<T> {
    Promise::rejected(reason)
}
