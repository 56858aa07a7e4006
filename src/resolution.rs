//! What a promise can be resolved with, and the thenable capability.
//!
//! Every producer call and every handler return value is coerced once, at
//! the boundary, into a [`Resolution`]: a plain value, a rejection, a native
//! [`Promise`], or a foreign [`Thenable`]. The settlement core only ever sees
//! this enum.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::{Promise, Reason, Resolver};

/// A foreign promise-like value.
///
/// `subscribe` must eventually call exactly one of `resolve`/`reject` on the
/// resolver it is given (and may call `notify` any number of times before
/// that). Extra settlement calls are ignored.
pub trait Thenable<T> {
    fn subscribe(&self, resolver: Resolver<T>);

    /// Abandons the pending work. Thenables without cancellation keep the
    /// default no-op.
    fn cancel(&self) {}
}

/// A value a promise is resolved with, before unwrapping.
pub enum Resolution<T> {
    Value(T),
    Rejected(Reason),
    Promise(Promise<T>),
    Thenable(Rc<dyn Thenable<T>>),
}

impl<T> Resolution<T> {
    pub fn thenable(thenable: impl Thenable<T> + 'static) -> Self {
        Self::Thenable(Rc::new(thenable))
    }
}

impl<T: Clone + 'static> Resolution<T> {
    /// Applies `f` to the eventual value, whatever form it arrives in.
    pub fn map<U, F>(self, f: F) -> Resolution<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        match self {
            Self::Value(value) => Resolution::Value(f(value)),
            Self::Rejected(reason) => Resolution::Rejected(reason),
            Self::Promise(promise) => {
                Resolution::Promise(promise.then(move |value| Ok::<_, Reason>(f(value))))
            }
            Self::Thenable(thenable) => Resolution::Promise(
                Promise::from_thenable(thenable).then(move |value| Ok::<_, Reason>(f(value))),
            ),
        }
    }
}

impl<T: Clone> Clone for Resolution<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Rejected(reason) => Self::Rejected(reason.clone()),
            Self::Promise(promise) => Self::Promise(promise.clone()),
            Self::Thenable(thenable) => Self::Thenable(thenable.clone()),
        }
    }
}

impl<T: fmt::Debug + Clone + 'static> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Rejected(reason) => f.debug_tuple("Rejected").field(reason).finish(),
            Self::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Self::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

impl<T> From<T> for Resolution<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T> From<Promise<T>> for Resolution<T> {
    fn from(promise: Promise<T>) -> Self {
        Self::Promise(promise)
    }
}

impl<T> From<Result<T, Reason>> for Resolution<T> {
    fn from(result: Result<T, Reason>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(reason) => Self::Rejected(reason),
        }
    }
}

/// Return types accepted from reaction handlers.
///
/// A handler "fails" by returning `Err`, and adopts another promise by
/// returning it.
pub trait IntoResolution {
    type Output;

    fn into_resolution(self) -> Resolution<Self::Output>;
}

impl<T> IntoResolution for Resolution<T> {
    type Output = T;

    fn into_resolution(self) -> Resolution<T> {
        self
    }
}

impl<T> IntoResolution for Promise<T> {
    type Output = T;

    fn into_resolution(self) -> Resolution<T> {
        Resolution::Promise(self)
    }
}

impl<T> IntoResolution for Result<T, Reason> {
    type Output = T;

    fn into_resolution(self) -> Resolution<T> {
        self.into()
    }
}

type Job = Box<dyn FnOnce()>;

thread_local! {
    static JOBS: RefCell<Option<VecDeque<Job>>> = const { RefCell::new(None) };
}

struct Drain;

impl Drop for Drain {
    fn drop(&mut self) {
        JOBS.with(|queue| queue.borrow_mut().take());
    }
}

/// Runs `job` without growing the stack per nesting level. Used for thenable
/// subscriptions and for dispatching reactions at settlement.
///
/// The outermost call runs `job` and then drains every job queued while it
/// ran, in order; nested calls only enqueue. Everything still completes
/// before the outermost call returns.
pub(crate) fn trampoline(job: Job) {
    let job = JOBS.with(|queue| {
        let mut queue = queue.borrow_mut();
        match queue.as_mut() {
            Some(pending) => {
                pending.push_back(job);
                None
            }
            None => {
                *queue = Some(VecDeque::new());
                Some(job)
            }
        }
    });
    let Some(job) = job else {
        return;
    };

    let _drain = Drain;
    job();
    loop {
        let next = JOBS.with(|queue| queue.borrow_mut().as_mut().and_then(VecDeque::pop_front));
        match next {
            Some(job) => job(),
            None => break,
        }
    }
}
