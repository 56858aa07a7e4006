#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use promise_deferred::{Promise, Reason, Resolver};
use tracing_subscriber::EnvFilter;

pub fn init_test_logging() {
    // Initialize tracing for tests if not already done
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promise_deferred=trace")),
        )
        .with_test_writer()
        .try_init();
}

/// Captures the outcome of a promise once it settles.
pub fn outcome<T: Clone + 'static>(promise: &Promise<T>) -> Rc<RefCell<Option<Result<T, Reason>>>> {
    let seen = Rc::new(RefCell::new(None));
    let (on_value, on_reason) = (seen.clone(), seen.clone());
    promise.then_or_else(
        move |value| {
            *on_value.borrow_mut() = Some(Ok(value));
            Ok::<_, Reason>(())
        },
        move |reason| {
            *on_reason.borrow_mut() = Some(Err(reason));
            Ok(())
        },
    );
    seen
}

/// Counts invocations.
#[derive(Clone, Default)]
pub struct Calls(Rc<Cell<usize>>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn count(&self) -> usize {
        self.0.get()
    }

    /// A canceller that only counts.
    pub fn canceller<T: 'static>(&self) -> impl FnOnce(Resolver<T>) -> Result<(), Reason> + 'static {
        let calls = self.clone();
        move |_| {
            calls.hit();
            Ok(())
        }
    }
}

/// Records values in arrival order.
#[derive(Clone)]
pub struct Log<T>(Rc<RefCell<Vec<T>>>);

impl<T: Clone> Log<T> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.borrow_mut().push(value);
    }

    pub fn entries(&self) -> Vec<T> {
        self.0.borrow().clone()
    }
}
