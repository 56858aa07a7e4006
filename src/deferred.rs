use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::shared::{Canceller, Shared};
use crate::{Promise, Reason, Resolution, Update};

/// The producer side of a promise.
///
/// Only the first `resolve`/`reject` has an effect; later calls are
/// ignored. `notify` reaches progress observers while the promise is
/// pending and is ignored afterwards.
pub trait Settle<T> {
    fn resolve(&self, value: impl Into<Resolution<T>>);

    fn reject(&self, reason: impl Into<Reason>);

    fn notify<V: Any>(&self, update: V);

    /// Alias of [`notify`](Settle::notify).
    fn progress<V: Any>(&self, update: V) {
        self.notify(update)
    }
}

/// Settles one promise. Handed to resolver functions, cancellers and
/// thenables; cheap to clone.
pub struct Resolver<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Resolver<T> {
    pub(crate) fn new(shared: Rc<Shared<T>>) -> Self {
        Self { shared }
    }
}

impl<T: Clone + 'static> Settle<T> for Resolver<T> {
    fn resolve(&self, value: impl Into<Resolution<T>>) {
        Shared::resolve(&self.shared, value.into());
    }

    fn reject(&self, reason: impl Into<Reason>) {
        Shared::reject(&self.shared, reason.into());
    }

    fn notify<V: Any>(&self, update: V) {
        Shared::notify(&self.shared, Update::new(update));
    }
}

/// A pending promise together with the capability to settle it.
///
/// # Examples
///
/// ```
/// use promise_deferred::{Deferred, PromiseState, Settle};
///
/// let deferred = Deferred::<i32>::new();
/// let promise = deferred.promise();
/// assert_eq!(promise.state(), PromiseState::Pending);
///
/// deferred.resolve(1);
/// deferred.resolve(2);
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
/// ```
pub struct Deferred<T> {
    promise: Promise<T>,
    resolver: Resolver<T>,
}

impl<T: Clone + 'static> Deferred<T> {
    pub fn new() -> Self {
        Self::from_shared(Shared::new(None))
    }

    /// A deferred whose promise runs `canceller` when cancelled while
    /// pending. The canceller may settle the promise; returning `Err`
    /// rejects it.
    pub fn with_canceller<C>(canceller: C) -> Self
    where
        C: FnOnce(Resolver<T>) -> Result<(), Reason> + 'static,
    {
        Self::from_shared(Shared::new(Some(Canceller::Producer(Box::new(canceller)))))
    }

    fn from_shared(shared: Rc<Shared<T>>) -> Self {
        Self {
            promise: Promise::from_shared(shared.clone()),
            resolver: Resolver::new(shared),
        }
    }

    pub fn promise(&self) -> Promise<T> {
        self.promise.clone()
    }

    pub fn resolver(&self) -> Resolver<T> {
        self.resolver.clone()
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("promise", &self.promise)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Settle<T> for Deferred<T> {
    fn resolve(&self, value: impl Into<Resolution<T>>) {
        self.resolver.resolve(value)
    }

    fn reject(&self, reason: impl Into<Reason>) {
        self.resolver.reject(reason)
    }

    fn notify<V: Any>(&self, update: V) {
        self.resolver.notify(update)
    }
}
