use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use super::{aggregate, enlist, progress_to, IntoInputs};
use crate::{IntoResolution, Promise, Reason, Settle};

/// Fulfills with every input value, in input order, or rejects with the
/// first rejection.
///
/// # Examples
///
/// ```
/// use promise_deferred::{all, Deferred, Promise, Settle};
///
/// let later = Deferred::<i32>::new();
/// let values = all(vec![later.promise(), Promise::fulfilled(2)]);
/// assert!(values.is_pending());
///
/// later.resolve(1);
/// assert!(values.is_fulfilled());
/// ```
pub fn all<I: IntoInputs>(inputs: I) -> Promise<Vec<I::Item>> {
    map(inputs, |value| Ok::<_, Reason>(value))
}

/// Passes each input value through `mapper` and fulfills with the results,
/// in input order.
///
/// `mapper` may return a promise. Any input rejection or mapper failure
/// rejects the aggregate.
pub fn map<I, F, R>(inputs: I, mapper: F) -> Promise<Vec<R::Output>>
where
    I: IntoInputs,
    F: Fn(I::Item) -> R + 'static,
    R: IntoResolution,
    R::Output: Clone + 'static,
{
    aggregate(inputs.into_inputs(), move |items, resolver, queue| {
        let len = items.len();
        if len == 0 {
            resolver.resolve(Vec::new());
            return;
        }

        let mapper = Rc::new(mapper);
        let slots = Rc::new(RefCell::new(Slots {
            values: vec![None; len],
            remaining: len,
        }));
        for (index, item) in items.into_iter().enumerate() {
            let mapper = mapper.clone();
            let mapped = enlist(item, queue).then(move |value| mapper(value));

            let slots = slots.clone();
            let settle = resolver.clone();
            mapped.subscribe(
                move |outcome| match outcome {
                    Ok(value) => {
                        let values = slots.borrow_mut().fill(index, value);
                        if let Some(values) = values {
                            settle.resolve(values);
                        }
                    }
                    Err(reason) => settle.reject(reason),
                },
                Some(progress_to(&resolver)),
            );
        }
    })
}

struct Slots<U> {
    values: Vec<Option<U>>,
    remaining: usize,
}

impl<U> Slots<U> {
    /// Stores one mapped value; returns all of them once the last arrives.
    fn fill(&mut self, index: usize, value: U) -> Option<Vec<U>> {
        if self.values[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        Some(mem::take(&mut self.values).into_iter().flatten().collect())
    }
}
