//! Deferred fan-out of cancellation.
//!
//! A combinator does not know its inputs up front (they may arrive through a
//! promise), yet cancelling the aggregate must reach every one of them. The
//! queue collects inputs as they are discovered and cancels them all, in
//! order, once it is started. Anything enqueued after that is cancelled
//! right away.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::promise::WeakPromise;
use crate::Promise;

/// Something that can be asked to cancel.
pub trait Cancellable {
    fn cancel(&self);
}

impl<T: Clone + 'static> Cancellable for Promise<T> {
    fn cancel(&self) {
        Promise::cancel(self)
    }
}

impl<T: Clone + 'static> Cancellable for WeakPromise<T> {
    fn cancel(&self) {
        if let Some(promise) = self.upgrade() {
            promise.cancel();
        }
    }
}

#[derive(Default)]
pub struct CancellationQueue {
    started: Cell<bool>,
    queue: RefCell<VecDeque<Rc<dyn Cancellable>>>,
}

impl CancellationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels everything queued so far, and everything enqueued later.
    /// Only the first call has an effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_deferred::{CancellationQueue, Deferred};
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// let cancelled = Rc::new(Cell::new(0));
    /// let deferred = |hits: Rc<Cell<u32>>| {
    ///     Deferred::<()>::with_canceller(move |_| {
    ///         hits.set(hits.get() + 1);
    ///         Ok(())
    ///     })
    /// };
    ///
    /// let queue = CancellationQueue::new();
    /// let first = deferred(cancelled.clone());
    /// queue.enqueue(first.promise());
    /// queue.cancel();
    /// assert_eq!(cancelled.get(), 1);
    ///
    /// let late = deferred(cancelled.clone());
    /// queue.enqueue(late.promise());
    /// assert_eq!(cancelled.get(), 2);
    /// ```
    pub fn cancel(&self) {
        if self.started.replace(true) {
            return;
        }
        self.drain();
    }

    pub fn enqueue<C: Cancellable + 'static>(&self, cancellable: C) {
        let len = {
            let mut queue = self.queue.borrow_mut();
            queue.push_back(Rc::new(cancellable));
            queue.len()
        };
        if self.started.get() && len == 1 {
            self.drain();
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    fn drain(&self) {
        debug!(queued = self.len(), "draining cancellation queue");
        loop {
            // The entry stays queued while it runs, so enqueues made from
            // inside `cancel` are left to this loop.
            let front = self.queue.borrow().front().cloned();
            let Some(entry) = front else {
                break;
            };
            entry.cancel();
            self.queue.borrow_mut().pop_front();
        }
    }
}

impl fmt::Debug for CancellationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationQueue")
            .field("started", &self.started.get())
            .field("queued", &self.len())
            .finish()
    }
}
