use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use tracing::error;

use crate::{Error, Promise, UnhandledRejection};

/// The end of a promise chain.
///
/// Nothing downstream can observe a rejection that reaches `done`, so it is
/// reported here instead of being absorbed: it is logged at `error` level
/// and kept for [`Done::result`]. `Done` is also a future resolving to the
/// same outcome.
///
/// # Examples
///
/// ```
/// use promise_deferred::{Deferred, Settle};
///
/// let deferred = Deferred::<u8>::new();
/// let done = deferred.promise().done();
/// assert!(done.result().is_none());
///
/// deferred.reject("lost");
/// let unhandled = done.result().unwrap().unwrap_err();
/// assert_eq!(unhandled.reason().to_string(), "lost");
/// ```
///
/// Discarding it is flagged:
///
/// ```compile_fail
/// #![deny(unused_must_use)]
/// use promise_deferred::Promise;
///
/// fn main() {
///     Promise::<u8>::rejected("lost").done();
/// }
/// ```
#[derive(Debug, Clone)]
#[must_use = "an unhandled rejection is only reported through `Done`"]
pub struct Done {
    slot: Rc<RefCell<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    outcome: Option<Result<(), UnhandledRejection>>,
    waker: Option<Waker>,
}

impl Done {
    pub(crate) fn watch<T: Clone + 'static>(promise: &Promise<T>) -> Self {
        let slot = Rc::new(RefCell::new(Slot::default()));
        let sink = slot.clone();
        promise.subscribe(
            move |outcome| {
                let outcome = outcome.map(drop).map_err(|reason| {
                    error!(%reason, "unhandled promise rejection");
                    UnhandledRejection::new(reason)
                });
                let waker = {
                    let mut slot = sink.borrow_mut();
                    slot.outcome = Some(outcome);
                    slot.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            },
            None,
        );
        Self { slot }
    }

    /// `None` while the chain is pending.
    pub fn result(&self) -> Option<Result<(), UnhandledRejection>> {
        self.slot.borrow().outcome.clone()
    }

    pub fn is_unhandled(&self) -> bool {
        matches!(self.slot.borrow().outcome, Some(Err(_)))
    }

    /// Fails only if the chain has ended with an unhandled rejection.
    pub fn check(&self) -> Result<(), Error> {
        match self.result() {
            Some(Err(unhandled)) => Err(unhandled.into()),
            Some(Ok(())) | None => Ok(()),
        }
    }
}

impl Future for Done {
    type Output = Result<(), UnhandledRejection>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.outcome.clone() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
