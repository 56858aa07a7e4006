use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::IntoFuture;
use std::rc::{Rc, Weak};

use crate::shared::{Canceller, Downstream, Outcome, ProgressFn, Shared, Snapshot, Target};
use crate::immediate::Lazy;
use crate::resolution::trampoline;
use crate::{
    Consumer, Done, IntoResolution, Reason, ReasonKind, Resolution, Resolver, Thenable, Update,
};

/// The observable state of a promise.
///
/// A promise that has adopted another, still pending, promise reports
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// A value that will be settled exactly once, to a `T` or a [`Reason`].
///
/// `Promise` is a cheap, clonable handle. Clones observe the same
/// settlement. Reactions registered with [`then`](Promise::then) and friends
/// run synchronously, in registration order, on the call stack that settles
/// the promise, or right away if it is already settled.
///
/// # Examples
///
/// ```
/// use promise_deferred::{Deferred, Settle, Reason};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let deferred = Deferred::<u32>::new();
/// let seen = Rc::new(Cell::new(0));
/// let sink = seen.clone();
/// deferred
///     .promise()
///     .then(|n| Ok::<_, Reason>(n * 2))
///     .then(move |n| {
///         sink.set(n);
///         Ok::<_, Reason>(())
///     });
///
/// deferred.resolve(21);
/// assert_eq!(seen.get(), 42);
/// ```
pub struct Promise<T> {
    pub(crate) repr: Repr<T>,
}

pub(crate) enum Repr<T> {
    Fulfilled(T),
    Rejected(Reason),
    Deferred(Rc<Shared<T>>),
    Lazy(Rc<Lazy<T>>),
}

impl<T: Clone> Clone for Promise<T> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Fulfilled(value) => Repr::Fulfilled(value.clone()),
            Repr::Rejected(reason) => Repr::Rejected(reason.clone()),
            Repr::Deferred(shared) => Repr::Deferred(shared.clone()),
            Repr::Lazy(lazy) => Repr::Lazy(lazy.clone()),
        };
        Self { repr }
    }
}

type OnFulfilled<T, U> = Box<dyn FnOnce(T) -> Resolution<U>>;
type OnRejected<U> = Box<dyn FnOnce(Reason) -> Resolution<U>>;
type OnProgress = Box<dyn FnMut(Update) -> Update>;

impl<T: Clone + 'static> Promise<T> {
    /// Runs `resolver` right away with the capability to settle the new
    /// promise. Returning `Err` rejects it, unless it was settled already.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_deferred::{Promise, PromiseState, Settle};
    ///
    /// let promise = Promise::new(|resolver| {
    ///     resolver.resolve("ready");
    ///     Ok(())
    /// });
    /// assert_eq!(promise.state(), PromiseState::Fulfilled);
    /// ```
    pub fn new<F>(resolver: F) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<(), Reason>,
    {
        Self::start(resolver, None)
    }

    /// Like [`Promise::new`], with a canceller invoked at most once by
    /// [`cancel`](Promise::cancel) while the promise is pending.
    pub fn with_canceller<F, C>(resolver: F, canceller: C) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<(), Reason>,
        C: FnOnce(Resolver<T>) -> Result<(), Reason> + 'static,
    {
        Self::start(resolver, Some(Canceller::Producer(Box::new(canceller))))
    }

    fn start<F>(resolver: F, canceller: Option<Canceller<T>>) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<(), Reason>,
    {
        let shared = Shared::new(canceller);
        if let Err(reason) = resolver(Resolver::new(shared.clone())) {
            Shared::reject(&shared, reason);
        }
        Self::from_shared(shared)
    }

    pub(crate) fn from_shared(shared: Rc<Shared<T>>) -> Self {
        Self {
            repr: Repr::Deferred(shared),
        }
    }

    /// Converts any [`Resolution`] into a promise, adopting promises and
    /// subscribing to thenables.
    pub fn from_resolution(resolution: Resolution<T>) -> Self {
        match resolution {
            Resolution::Value(value) => Self::fulfilled(value),
            Resolution::Rejected(reason) => Self::rejected(reason),
            Resolution::Promise(promise) => promise,
            Resolution::Thenable(thenable) => Self::from_thenable(thenable),
        }
    }

    pub(crate) fn from_thenable(thenable: Rc<dyn Thenable<T>>) -> Self {
        let nested = thenable.clone();
        let shared = Shared::new(Some(Canceller::Upstream(Box::new(move || nested.cancel()))));
        let resolver = Resolver::new(shared.clone());
        trampoline(Box::new(move || thenable.subscribe(resolver)));
        Self::from_shared(shared)
    }

    /// Follows adoption links (and forces a lazy promise) down to either a
    /// settled outcome or the pending cell that will produce one.
    pub(crate) fn target(&self) -> Target<T> {
        let mut shared = match &self.repr {
            Repr::Fulfilled(value) => return Target::Settled(Ok(value.clone())),
            Repr::Rejected(reason) => return Target::Settled(Err(reason.clone())),
            Repr::Deferred(shared) => shared.clone(),
            Repr::Lazy(lazy) => return lazy.force().target(),
        };
        loop {
            shared = match shared.snapshot() {
                Snapshot::Pending => return Target::Pending(shared),
                Snapshot::Following(next) => next,
                Snapshot::Settled(outcome) => return Target::Settled(outcome),
            };
        }
    }

    fn chain<U: Clone + 'static>(
        &self,
        on_fulfilled: OnFulfilled<T, U>,
        on_rejected: OnRejected<U>,
        on_progress: Option<OnProgress>,
        link: bool,
    ) -> Promise<U> {
        let parent = match self.target() {
            Target::Settled(Ok(value)) => return Promise::from_resolution(on_fulfilled(value)),
            Target::Settled(Err(reason)) => return Promise::from_resolution(on_rejected(reason)),
            Target::Pending(parent) => parent,
        };
        // A following promise stays the parent for cancellation, so its own
        // adoption link is what reaches the target.
        let canceller = match (link, self.following()) {
            (false, _) => None,
            (true, Some(own)) => Shared::dependent_link(&own),
            (true, None) => Shared::dependent_link(&parent),
        };
        let child = Shared::new(canceller);

        let forward = Rc::downgrade(&child);
        let on_progress = on_progress.map(RefCell::new);
        Shared::push_progress(
            &parent,
            Rc::new(move |update: Update| {
                let update = match &on_progress {
                    // A handler that notifies its own upstream is not re-entered.
                    Some(handler) => match handler.try_borrow_mut() {
                        Ok(mut handler) => (*handler)(update),
                        Err(_) => return,
                    },
                    None => update,
                };
                if let Some(forward) = forward.upgrade() {
                    Shared::notify(&forward, update);
                }
            }),
        );

        let settle = Downstream::new(child.clone());
        Shared::push_reaction(
            &parent,
            Box::new(move |outcome: Outcome<T>| {
                let resolution = match outcome {
                    Ok(value) => on_fulfilled(value),
                    Err(reason) => on_rejected(reason),
                };
                settle.resolve(resolution);
            }),
        );
        Promise::from_shared(child)
    }

    /// Registers a fulfillment reaction. Rejections pass through untouched.
    ///
    /// The handler may return `Ok(value)`, `Err(reason)`, another
    /// [`Promise`] to adopt, or a [`Resolution`].
    pub fn then<F, R>(&self, on_fulfilled: F) -> Promise<R::Output>
    where
        F: FnOnce(T) -> R + 'static,
        R: IntoResolution,
        R::Output: Clone + 'static,
    {
        self.chain(
            Box::new(move |value| on_fulfilled(value).into_resolution()),
            Box::new(Resolution::Rejected),
            None,
            true,
        )
    }

    pub fn then_or_else<F, R, E, S>(&self, on_fulfilled: F, on_rejected: E) -> Promise<R::Output>
    where
        F: FnOnce(T) -> R + 'static,
        R: IntoResolution,
        R::Output: Clone + 'static,
        E: FnOnce(Reason) -> S + 'static,
        S: IntoResolution<Output = R::Output>,
    {
        self.chain(
            Box::new(move |value| on_fulfilled(value).into_resolution()),
            Box::new(move |reason| on_rejected(reason).into_resolution()),
            None,
            true,
        )
    }

    /// [`then_or_else`](Promise::then_or_else) plus a progress handler whose
    /// return value is what downstream progress observers receive.
    pub fn then_with<F, R, E, S, P>(
        &self,
        on_fulfilled: F,
        on_rejected: E,
        on_progress: P,
    ) -> Promise<R::Output>
    where
        F: FnOnce(T) -> R + 'static,
        R: IntoResolution,
        R::Output: Clone + 'static,
        E: FnOnce(Reason) -> S + 'static,
        S: IntoResolution<Output = R::Output>,
        P: FnMut(Update) -> Update + 'static,
    {
        self.chain(
            Box::new(move |value| on_fulfilled(value).into_resolution()),
            Box::new(move |reason| on_rejected(reason).into_resolution()),
            Some(Box::new(on_progress)),
            true,
        )
    }

    /// Registers a rejection reaction. Values pass through untouched.
    pub fn otherwise<E, S>(&self, on_rejected: E) -> Promise<T>
    where
        E: FnOnce(Reason) -> S + 'static,
        S: IntoResolution<Output = T>,
    {
        self.chain(
            Box::new(Resolution::Value),
            Box::new(move |reason| on_rejected(reason).into_resolution()),
            None,
            true,
        )
    }

    /// Like [`otherwise`](Promise::otherwise), but only for reasons of the
    /// given kind. Other rejections propagate as they are.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_deferred::{Promise, PromiseState, Reason, ReasonKind};
    ///
    /// let recovered = Promise::<i32>::rejected(Reason::invalid_argument("negative"))
    ///     .otherwise_kind(ReasonKind::InvalidArgument, |_| Ok(0));
    /// assert_eq!(recovered.state(), PromiseState::Fulfilled);
    ///
    /// let untouched = Promise::<i32>::rejected(Reason::from("boom"))
    ///     .otherwise_kind(ReasonKind::InvalidArgument, |_| Ok(0));
    /// assert_eq!(untouched.state(), PromiseState::Rejected);
    /// ```
    pub fn otherwise_kind<E, S>(&self, kind: ReasonKind, on_rejected: E) -> Promise<T>
    where
        E: FnOnce(Reason) -> S + 'static,
        S: IntoResolution<Output = T>,
    {
        self.chain(
            Box::new(Resolution::Value),
            Box::new(move |reason| {
                if kind.matches(&reason) {
                    on_rejected(reason).into_resolution()
                } else {
                    Resolution::Rejected(reason)
                }
            }),
            None,
            true,
        )
    }

    /// Registers a progress handler. Its return value is forwarded to the
    /// returned promise's progress observers.
    pub fn progress<P>(&self, on_progress: P) -> Promise<T>
    where
        P: FnMut(Update) -> Update + 'static,
    {
        self.chain(
            Box::new(Resolution::Value),
            Box::new(Resolution::Rejected),
            Some(Box::new(on_progress)),
            true,
        )
    }

    /// Runs `on_settled` on either outcome and keeps that outcome, unless
    /// `on_settled` fails or returns a promise that rejects.
    pub fn always<F, R>(&self, on_settled: F) -> Promise<T>
    where
        F: FnOnce() -> R + 'static,
        R: IntoResolution,
        R::Output: Clone + 'static,
    {
        let slot = Rc::new(Cell::new(Some(on_settled)));
        let on_fulfilled = slot.clone();
        self.chain(
            Box::new(move |value| Self::after_settled(&on_fulfilled, Ok(value))),
            Box::new(move |reason| Self::after_settled(&slot, Err(reason))),
            None,
            true,
        )
    }

    fn after_settled<F, R>(slot: &Cell<Option<F>>, outcome: Outcome<T>) -> Resolution<T>
    where
        F: FnOnce() -> R,
        R: IntoResolution,
        R::Output: Clone + 'static,
    {
        let Some(on_settled) = slot.take() else {
            return outcome.into();
        };
        let gate = match on_settled().into_resolution() {
            Resolution::Value(_) => return outcome.into(),
            Resolution::Rejected(reason) => return Resolution::Rejected(reason),
            Resolution::Promise(gate) => gate,
            Resolution::Thenable(thenable) => Promise::from_thenable(thenable),
        };
        Resolution::Promise(gate.then_or_else(move |_| outcome, |reason| Err(reason)))
    }

    /// Ends the chain. A rejection reaching this point is reported through
    /// the returned [`Done`] and logged at `error` level.
    pub fn done(&self) -> Done {
        Done::watch(self)
    }

    /// Ends the chain with handlers. A rejection that `on_rejected` does not
    /// recover from, or a failure of either handler, is unhandled.
    pub fn done_with<F, R, E, S>(&self, on_fulfilled: F, on_rejected: E) -> Done
    where
        F: FnOnce(T) -> R + 'static,
        R: IntoResolution,
        R::Output: Clone + 'static,
        E: FnOnce(Reason) -> S + 'static,
        S: IntoResolution<Output = R::Output>,
    {
        self.chain(
            Box::new(move |value| on_fulfilled(value).into_resolution()),
            Box::new(move |reason| on_rejected(reason).into_resolution()),
            None,
            false,
        )
        .done()
    }

    /// Requests cancellation.
    ///
    /// A promise created with a canceller invokes it once. A derived
    /// promise counts as one cancelled dependent of its parent, and the
    /// parent is cancelled once all of its dependents are. Settled promises
    /// ignore the request.
    pub fn cancel(&self) {
        match &self.repr {
            Repr::Deferred(shared) => Shared::cancel(shared),
            Repr::Lazy(lazy) => lazy.force().cancel(),
            Repr::Fulfilled(_) | Repr::Rejected(_) => {}
        }
    }

    pub fn state(&self) -> PromiseState {
        let mut shared = match &self.repr {
            Repr::Fulfilled(_) => return PromiseState::Fulfilled,
            Repr::Rejected(_) => return PromiseState::Rejected,
            Repr::Deferred(shared) => shared.clone(),
            Repr::Lazy(lazy) => {
                return lazy
                    .peek()
                    .map_or(PromiseState::Pending, |promise| promise.state())
            }
        };
        loop {
            shared = match shared.status() {
                Ok(state) => return state,
                Err(next) => next,
            };
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state() == PromiseState::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == PromiseState::Rejected
    }

    /// Observes the outcome without creating a derived promise.
    pub(crate) fn subscribe<F>(&self, on_settled: F, on_progress: Option<ProgressFn>)
    where
        F: FnOnce(Outcome<T>) + 'static,
    {
        match self.target() {
            Target::Settled(outcome) => on_settled(outcome),
            Target::Pending(shared) => {
                if let Some(on_progress) = on_progress {
                    Shared::push_progress(&shared, on_progress);
                }
                Shared::push_reaction(&shared, Box::new(on_settled));
            }
        }
    }

    /// This promise's own cell, if it has adopted a promise that is still
    /// pending.
    pub(crate) fn following(&self) -> Option<Rc<Shared<T>>> {
        match &self.repr {
            Repr::Deferred(shared) => shared.status().err().map(|_| shared.clone()),
            Repr::Lazy(lazy) => lazy.peek().and_then(|promise| promise.following()),
            Repr::Fulfilled(_) | Repr::Rejected(_) => None,
        }
    }

    /// A handle that can cancel this promise without keeping it alive.
    /// Forces a lazy promise.
    pub(crate) fn downgrade(&self) -> WeakPromise<T> {
        let shared = match self.target() {
            Target::Pending(shared) => Some(Rc::downgrade(&shared)),
            Target::Settled(_) => None,
        };
        WeakPromise { shared }
    }
}

pub(crate) struct WeakPromise<T> {
    shared: Option<Weak<Shared<T>>>,
}

impl<T: Clone + 'static> WeakPromise<T> {
    pub(crate) fn upgrade(&self) -> Option<Promise<T>> {
        self.shared
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Promise::from_shared)
    }
}

impl<T: Clone + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> IntoFuture for Promise<T> {
    type Output = Result<T, Reason>;
    type IntoFuture = Consumer<T>;

    fn into_future(self) -> Consumer<T> {
        Consumer::new(self)
    }
}

#[cfg(test)]
mod tests {
use super::PromiseState;
use crate::{Deferred, Promise, Reason, Settle};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn following_promise_reports_pending_until_target_settles() {
    let inner = Deferred::<i32>::new();
    let outer = Deferred::<i32>::new();
    outer.resolve(inner.promise());

    assert_eq!(outer.promise().state(), PromiseState::Pending);
    inner.resolve(3);
    assert_eq!(outer.promise().state(), PromiseState::Fulfilled);
}

#[test]
fn then_on_a_following_promise_runs_when_the_target_settles() {
    let inner = Deferred::<i32>::new();
    let outer = Deferred::<i32>::new();
    outer.resolve(inner.promise());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    outer.promise().then(move |value| {
        sink.borrow_mut().push(value);
        Ok::<_, Reason>(())
    });
    assert!(seen.borrow().is_empty());

    inner.resolve(9);
    assert_eq!(*seen.borrow(), vec![9]);
}

#[test]
fn resolver_error_rejects_only_a_pending_promise() {
    let rejected = Promise::<i32>::new(|_| Err(Reason::from("failed")));
    assert_eq!(rejected.state(), PromiseState::Rejected);

    let fulfilled = Promise::new(|resolver| {
        resolver.resolve(1);
        Err(Reason::from("too late"))
    });
    assert_eq!(fulfilled.state(), PromiseState::Fulfilled);
}

#[test]
fn long_adoption_chains_settle_and_drop_without_overflow() {
    let head = Deferred::<u8>::new();
    let promise = head.promise();
    let mut tail = head.resolver();
    drop(head);
    for _ in 0..100_000 {
        let next = Deferred::<u8>::new();
        tail.resolve(next.promise());
        tail = next.resolver();
    }

    assert_eq!(promise.state(), PromiseState::Pending);
    tail.resolve(7);
    assert_eq!(promise.state(), PromiseState::Fulfilled);
    drop(tail);
    drop(promise);
}
}
