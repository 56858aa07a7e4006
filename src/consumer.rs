use std::cell::RefCell;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::{Promise, Reason};

/// Awaits a [`Promise`]. Created by `promise.await` or
/// [`IntoFuture::into_future`](std::future::IntoFuture::into_future).
///
/// The consumer only subscribes when first polled, so building one does not
/// force a lazy promise.
///
/// # Examples
///
/// ```
/// use promise_deferred::{Deferred, Settle};
/// use futures::executor::block_on;
///
/// let deferred = Deferred::<String>::new();
/// let promise = deferred.promise();
/// deferred.resolve("🍓".to_owned());
/// assert_eq!(block_on(async { promise.await }), Ok("🍓".to_owned()));
/// ```
pub struct Consumer<T> {
    promise: Option<Promise<T>>,
    inner: Rc<RefCell<Inner<T>>>,
}

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

#[derive(Debug)]
struct Inner<T> {
    value: Option<Result<T, Reason>>,
    waker: Result<Waker, WakerState>,
}

impl<T: Clone + 'static> Consumer<T> {
    pub(crate) fn new(promise: Promise<T>) -> Self {
        Self {
            promise: Some(promise),
            inner: Rc::new(RefCell::new(Inner {
                value: None,
                waker: Err(WakerState::Fresh),
            })),
        }
    }
}

impl<T> Unpin for Consumer<T> {}

impl<T: Clone + 'static> Future for Consumer<T> {
    type Output = Result<T, Reason>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(promise) = self.promise.take() {
            let inner = self.inner.clone();
            promise.subscribe(
                move |outcome| {
                    let waker = {
                        let mut inner = inner.borrow_mut();
                        inner.value = Some(outcome);
                        std::mem::replace(&mut inner.waker, Err(WakerState::Tainted))
                    };
                    if let Ok(waker) = waker {
                        waker.wake()
                    }
                },
                None,
            );
        }

        let mut inner = self.inner.borrow_mut();
        match inner.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                inner.waker = Ok(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T: Debug> Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("subscribed", &self.promise.is_none())
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
use futures::executor::block_on;
use futures::future::join;
use crate::{Deferred, Promise, Reason, Settle};

#[test]
fn test_consumer_resolve() {
    let deferred = Deferred::<String>::new();
    let promise = deferred.promise();
    let (value, ()) = block_on(join(async { promise.await }, async {
        deferred.resolve(String::from("🍓"));
    }));
    assert_eq!(value, Ok(String::from("🍓")));
}

#[test]
fn test_consumer_reject() {
    let promise = Promise::<i32>::rejected("reject!!");
    assert_eq!(block_on(async { promise.await }), Err(Reason::from("reject!!")));
}

#[test]
fn test_consumer_does_not_force_lazy_until_polled() {
    let lazy = Promise::lazy(|| Ok::<_, Reason>(3));
    let consumer = std::future::IntoFuture::into_future(lazy.clone());
    assert!(lazy.is_pending());
    assert_eq!(block_on(consumer), Ok(3));
}
}
