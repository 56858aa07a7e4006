//! Promises that are settled at construction, and the lazy variant that
//! defers its producer until somebody looks.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::promise::Repr;
use crate::{Error, IntoResolution, Promise, Reason, Resolution};

impl<T: Clone + 'static> Promise<T> {
    /// A promise already fulfilled with `value`.
    ///
    /// Reactions attached to it run synchronously and cancelling it does
    /// nothing.
    pub fn fulfilled(value: T) -> Self {
        Self {
            repr: Repr::Fulfilled(value),
        }
    }

    /// Checked variant of [`Promise::fulfilled`] for values that arrive as a
    /// [`Resolution`]. Only a plain value is accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_deferred::{Promise, Resolution};
    ///
    /// assert!(Promise::try_fulfilled(Resolution::Value(1)).is_ok());
    /// assert!(Promise::try_fulfilled(Resolution::Promise(Promise::fulfilled(1))).is_err());
    /// ```
    pub fn try_fulfilled(value: Resolution<T>) -> Result<Self, Error> {
        match value {
            Resolution::Value(value) => Ok(Self::fulfilled(value)),
            Resolution::Rejected(_) => Err(Error::InvalidArgument(
                "a fulfilled promise cannot be created from a rejection".to_owned(),
            )),
            Resolution::Promise(_) | Resolution::Thenable(_) => Err(Error::InvalidArgument(
                "a fulfilled promise cannot be created from a promise".to_owned(),
            )),
        }
    }

    /// A promise already rejected with `reason`.
    pub fn rejected(reason: impl Into<Reason>) -> Self {
        Self {
            repr: Repr::Rejected(reason.into()),
        }
    }

    /// A promise whose `factory` runs at most once, the first time the
    /// promise is chained, awaited or cancelled.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_deferred::{Promise, PromiseState, Reason};
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// let calls = Rc::new(Cell::new(0));
    /// let counter = calls.clone();
    /// let lazy = Promise::lazy(move || {
    ///     counter.set(counter.get() + 1);
    ///     Ok::<_, Reason>("built")
    /// });
    /// assert_eq!(calls.get(), 0);
    ///
    /// lazy.then(|_| Ok::<_, Reason>(()));
    /// lazy.then(|_| Ok::<_, Reason>(()));
    /// assert_eq!(calls.get(), 1);
    /// assert_eq!(lazy.state(), PromiseState::Fulfilled);
    /// ```
    pub fn lazy<F, R>(factory: F) -> Self
    where
        F: FnOnce() -> R + 'static,
        R: IntoResolution<Output = T>,
    {
        let lazy = Lazy {
            state: RefCell::new(LazyState::Idle(Box::new(move || factory().into_resolution()))),
        };
        Self {
            repr: Repr::Lazy(Rc::new(lazy)),
        }
    }
}

type Factory<T> = Box<dyn FnOnce() -> Resolution<T>>;

pub(crate) struct Lazy<T> {
    state: RefCell<LazyState<T>>,
}

enum LazyState<T> {
    Idle(Factory<T>),
    Running,
    Ready(Promise<T>),
}

impl<T: Clone + 'static> Lazy<T> {
    /// Runs the factory on first use and returns the promise it produced.
    pub(crate) fn force(&self) -> Promise<T> {
        let factory = {
            let mut state = self.state.borrow_mut();
            match mem::replace(&mut *state, LazyState::Running) {
                LazyState::Idle(factory) => factory,
                LazyState::Running => {
                    return Promise::rejected(Reason::runtime(
                        "lazy promise was used by its own factory",
                    ))
                }
                LazyState::Ready(promise) => {
                    *state = LazyState::Ready(promise.clone());
                    return promise;
                }
            }
        };
        trace!("running lazy promise factory");
        let promise = Promise::from_resolution(factory());
        *self.state.borrow_mut() = LazyState::Ready(promise.clone());
        promise
    }

    /// The produced promise, without running the factory.
    pub(crate) fn peek(&self) -> Option<Promise<T>> {
        match &*self.state.borrow() {
            LazyState::Ready(promise) => Some(promise.clone()),
            LazyState::Idle(_) | LazyState::Running => None,
        }
    }
}

#[cfg(test)]
mod tests {
use crate::{Promise, PromiseState, Reason};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn lazy_state_is_pending_until_forced() {
    let lazy = Promise::lazy(|| Ok::<_, Reason>(5));
    assert_eq!(lazy.state(), PromiseState::Pending);
    lazy.cancel();
    assert_eq!(lazy.state(), PromiseState::Fulfilled);
}

#[test]
fn lazy_factory_that_reenters_itself_gets_a_rejection() {
    let slot: Rc<RefCell<Option<Promise<i32>>>> = Rc::new(RefCell::new(None));
    let inner = slot.clone();
    let lazy = Promise::lazy(move || {
        let me = inner.borrow().clone();
        match me {
            Some(me) => me.then(|value| Ok::<_, Reason>(value + 1)),
            None => Promise::fulfilled(0),
        }
    });
    *slot.borrow_mut() = Some(lazy.clone());

    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    lazy.otherwise(move |reason| {
        *sink.borrow_mut() = Some(reason);
        Ok(0)
    });
    assert!(matches!(*seen.borrow(), Some(Reason::Runtime(_))));
    slot.borrow_mut().take();
}
}
