//! The settlement state machine shared by every pending promise.
//!
//! A [`Shared`] cell is owned by the promise handles, the resolvers and the
//! handler records of its upstream promise. Ownership only points
//! downstream: a derived promise reaches back to its parent through a
//! `Weak`, and is used for cancellation only. Handler and progress records
//! are released at settlement, so closures capturing a promise never keep a
//! cycle alive past that point.
//!
//! No `RefCell` borrow is ever held while user code runs: records are taken
//! out of the cell first and invoked afterwards.

use std::any::Any;
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::resolution::trampoline;
use crate::{PromiseState, Reason, Resolution, Resolver, Update};

pub(crate) type Outcome<T> = Result<T, Reason>;
pub(crate) type Reaction<T> = Box<dyn FnOnce(Outcome<T>)>;
pub(crate) type ProgressFn = Rc<dyn Fn(Update)>;

pub(crate) enum Canceller<T> {
    /// Supplied by the producer; may settle the promise through the resolver.
    Producer(Box<dyn FnOnce(Resolver<T>) -> Result<(), Reason>>),
    /// Forwards one cancellation request to an upstream promise.
    Upstream(Box<dyn FnOnce()>),
}

enum State<T> {
    Pending,
    /// Resolved with another pending promise; handlers now live there.
    Following(Rc<Shared<T>>),
    Fulfilled(T),
    Rejected(Reason),
}

struct Core<T> {
    state: State<T>,
    handlers: Vec<Reaction<T>>,
    progress_handlers: Vec<ProgressFn>,
    canceller: Option<Canceller<T>>,
    required_cancel_requests: usize,
    cancel_requests: usize,
}

pub(crate) struct Shared<T> {
    core: RefCell<Core<T>>,
}

/// Where a promise currently stands, after following adoption links.
pub(crate) enum Snapshot<T> {
    Pending,
    Following(Rc<Shared<T>>),
    Settled(Outcome<T>),
}

impl<T: Clone + 'static> Shared<T> {
    pub(crate) fn new(canceller: Option<Canceller<T>>) -> Rc<Self> {
        Rc::new(Self {
            core: RefCell::new(Core {
                state: State::Pending,
                handlers: Vec::new(),
                progress_handlers: Vec::new(),
                canceller,
                required_cancel_requests: 0,
                cancel_requests: 0,
            }),
        })
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        match &self.core.borrow().state {
            State::Pending => Snapshot::Pending,
            State::Following(target) => Snapshot::Following(target.clone()),
            State::Fulfilled(value) => Snapshot::Settled(Ok(value.clone())),
            State::Rejected(reason) => Snapshot::Settled(Err(reason.clone())),
        }
    }

    /// The public state of this cell, or the promise it follows.
    pub(crate) fn status(&self) -> Result<PromiseState, Rc<Shared<T>>> {
        match &self.core.borrow().state {
            State::Pending => Ok(PromiseState::Pending),
            State::Following(target) => Err(target.clone()),
            State::Fulfilled(_) => Ok(PromiseState::Fulfilled),
            State::Rejected(_) => Ok(PromiseState::Rejected),
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self.core.borrow().state, State::Pending)
    }

    /// Applies the resolution algorithm. Ignored unless still pending.
    pub(crate) fn resolve(this: &Rc<Self>, resolution: Resolution<T>) {
        if !this.is_pending() {
            return;
        }
        match resolution {
            Resolution::Value(value) => Self::settle(this, Ok(value)),
            Resolution::Rejected(reason) => Self::settle(this, Err(reason)),
            Resolution::Promise(promise) => {
                let target = promise.target();
                Self::adopt(this, target, promise.following())
            }
            Resolution::Thenable(thenable) => {
                Self::adopt(this, crate::Promise::from_thenable(thenable).target(), None)
            }
        }
    }

    pub(crate) fn reject(this: &Rc<Self>, reason: Reason) {
        Self::settle(this, Err(reason));
    }

    pub(crate) fn notify(this: &Rc<Self>, update: Update) {
        let handlers = {
            let core = this.core.borrow();
            if !matches!(core.state, State::Pending) {
                return;
            }
            core.progress_handlers.clone()
        };
        for handler in handlers {
            handler(update.clone());
        }
    }

    fn settle(this: &Rc<Self>, outcome: Outcome<T>) {
        let (handlers, _progress, _canceller) = {
            let mut core = this.core.borrow_mut();
            if !matches!(core.state, State::Pending) {
                return;
            }
            core.state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            (
                mem::take(&mut core.handlers),
                mem::take(&mut core.progress_handlers),
                core.canceller.take(),
            )
        };
        trace!(
            fulfilled = outcome.is_ok(),
            handlers = handlers.len(),
            "promise settled"
        );
        if handlers.is_empty() {
            return;
        }
        // Queued behind the reactions already running, so a long `then`
        // chain settles in a flat loop.
        trampoline(Box::new(move || {
            for handler in handlers {
                handler(outcome.clone());
            }
        }));
    }

    /// Takes over the eventual outcome of `target`.
    ///
    /// Pending targets receive this promise's handler and progress records,
    /// so an N-deep chain of adopted promises flushes in a single loop when
    /// the innermost one settles. If the adopted promise is itself following,
    /// `via` is its own cell and becomes the parent for cancellation.
    fn adopt(this: &Rc<Self>, target: Target<T>, via: Option<Rc<Self>>) {
        let target = match target {
            Target::Settled(outcome) => return Self::settle(this, outcome),
            Target::Pending(target) => target,
        };
        if Rc::ptr_eq(&target, this) {
            return Self::reject(this, Reason::self_resolution());
        }

        let link = Self::dependent_link(via.as_ref().unwrap_or(&target));
        let (handlers, progress, _canceller) = {
            let mut core = this.core.borrow_mut();
            core.state = State::Following(target.clone());
            (
                mem::take(&mut core.handlers),
                mem::take(&mut core.progress_handlers),
                mem::replace(&mut core.canceller, link),
            )
        };
        trace!(handlers = handlers.len(), "promise adopted a pending promise");
        for handler in progress {
            Self::push_progress(&target, handler);
        }
        for handler in handlers {
            Self::push_reaction(&target, handler);
        }
    }

    /// Registers a reaction, running it right away if already settled.
    pub(crate) fn push_reaction(this: &Rc<Self>, reaction: Reaction<T>) {
        let outcome = {
            let mut core = this.core.borrow_mut();
            match &core.state {
                State::Pending => {
                    core.handlers.push(reaction);
                    return;
                }
                State::Following(target) => Err(target.clone()),
                State::Fulfilled(value) => Ok(Ok(value.clone())),
                State::Rejected(reason) => Ok(Err(reason.clone())),
            }
        };
        match outcome {
            Ok(outcome) => reaction(outcome),
            Err(target) => Self::push_reaction(&target, reaction),
        }
    }

    /// Registers a progress observer. Dropped if already settled.
    pub(crate) fn push_progress(this: &Rc<Self>, handler: ProgressFn) {
        let target = {
            let mut core = this.core.borrow_mut();
            match &core.state {
                State::Pending => {
                    core.progress_handlers.push(handler);
                    return;
                }
                State::Following(target) => target.clone(),
                State::Fulfilled(_) | State::Rejected(_) => return,
            }
        };
        Self::push_progress(&target, handler);
    }

    /// Registers a new dependent and returns the canceller that releases it.
    ///
    /// Returns `None` when this promise can no longer be cancelled.
    pub(crate) fn dependent_link<U>(this: &Rc<Self>) -> Option<Canceller<U>> {
        {
            let mut core = this.core.borrow_mut();
            let cancellable = matches!(core.state, State::Pending | State::Following(_))
                && core.canceller.is_some();
            if !cancellable {
                return None;
            }
            core.required_cancel_requests += 1;
        }
        let parent: Weak<Self> = Rc::downgrade(this);
        Some(Canceller::Upstream(Box::new(move || {
            if let Some(parent) = parent.upgrade() {
                Self::release_dependent(&parent);
            }
        })))
    }

    /// Counts one cancelled dependent; cancels once every dependent has.
    fn release_dependent(this: &Rc<Self>) {
        let forward = {
            let mut core = this.core.borrow_mut();
            core.cancel_requests += 1;
            core.cancel_requests >= core.required_cancel_requests
        };
        if forward {
            debug!("all dependents cancelled, forwarding cancellation upstream");
            Self::cancel(this);
        }
    }

    /// Fires the canceller at most once. Ignored once settled.
    pub(crate) fn cancel(this: &Rc<Self>) {
        let canceller = {
            let mut core = this.core.borrow_mut();
            match core.state {
                State::Pending | State::Following(_) => core.canceller.take(),
                State::Fulfilled(_) | State::Rejected(_) => None,
            }
        };
        match canceller {
            None => {}
            Some(Canceller::Producer(canceller)) => {
                debug!("invoking promise canceller");
                if let Err(reason) = canceller(Resolver::new(this.clone())) {
                    Self::reject(this, reason);
                }
            }
            Some(Canceller::Upstream(forward)) => forward(),
        }
    }
}

/// A promise reduced to either its settled outcome or the pending cell
/// that will settle it.
pub(crate) enum Target<T> {
    Settled(Outcome<T>),
    Pending(Rc<Shared<T>>),
}

impl<T> Drop for Shared<T> {
    /// Unlinks long adoption chains iteratively.
    fn drop(&mut self) {
        let mut next = match mem::replace(&mut self.core.get_mut().state, State::Pending) {
            State::Following(target) => target,
            _ => return,
        };
        while let Ok(mut shared) = Rc::try_unwrap(next) {
            next = match mem::replace(&mut shared.core.get_mut().state, State::Pending) {
                State::Following(target) => target,
                _ => return,
            };
        }
    }
}

/// A derived cell held by its parent's handler records.
///
/// Each pending cell owns the next one through a reaction closure, so
/// dropping a long `then` chain would recurse once per link. The cell is
/// handed to a thread-local release loop instead.
pub(crate) struct Downstream<T: 'static> {
    cell: Option<Rc<Shared<T>>>,
}

impl<T: Clone + 'static> Downstream<T> {
    pub(crate) fn new(cell: Rc<Shared<T>>) -> Self {
        Self { cell: Some(cell) }
    }

    pub(crate) fn resolve(&self, resolution: Resolution<T>) {
        if let Some(cell) = &self.cell {
            Shared::resolve(cell, resolution);
        }
    }
}

impl<T: 'static> Drop for Downstream<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            release(Box::new(cell));
        }
    }
}

thread_local! {
    static RELEASED: RefCell<Option<Vec<Box<dyn Any>>>> = const { RefCell::new(None) };
}

struct Releasing;

impl Drop for Releasing {
    fn drop(&mut self) {
        let rest = RELEASED.try_with(|released| released.borrow_mut().take());
        drop(rest);
    }
}

/// Drops `item`, and everything its drop releases, without nesting.
fn release(item: Box<dyn Any>) {
    let first = RELEASED.try_with(|released| {
        let mut released = released.borrow_mut();
        match released.as_mut() {
            Some(pending) => {
                pending.push(item);
                None
            }
            None => {
                *released = Some(Vec::new());
                Some(item)
            }
        }
    });
    let Ok(Some(first)) = first else {
        return;
    };

    let _releasing = Releasing;
    drop(first);
    loop {
        let next = RELEASED.with(|released| released.borrow_mut().as_mut().and_then(Vec::pop));
        match next {
            Some(next) => drop(next),
            None => break,
        }
    }
}
