use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem;
use std::rc::Rc;

use super::{aggregate, enlist, progress_to, IntoInputs};
use crate::{Promise, Reason, Settle};

/// Fulfills with the values of the first `count` inputs to fulfill, ordered
/// by input position.
///
/// Rejects with [`Reason::Aggregate`] as soon as too many inputs have
/// rejected for `count` fulfillments to remain possible, and with a
/// [`Reason::Length`] when there are fewer than `count` inputs at all. A
/// `count` of zero fulfills with an empty `Vec`.
pub fn some<I: IntoInputs>(inputs: I, count: usize) -> Promise<Vec<I::Item>> {
    aggregate(inputs.into_inputs(), move |items, resolver, queue| {
        let len = items.len();
        if count == 0 {
            resolver.resolve(Vec::new());
            return;
        }
        if len < count {
            resolver.reject(Reason::length(count, len));
            return;
        }

        let tally = Rc::new(RefCell::new(Tally {
            to_resolve: count,
            to_reject: len - count + 1,
            values: BTreeMap::new(),
            reasons: BTreeMap::new(),
        }));
        for (index, item) in items.into_iter().enumerate() {
            let tally = tally.clone();
            let settle = resolver.clone();
            enlist(item, queue).subscribe(
                move |outcome| {
                    let verdict = tally.borrow_mut().record(index, outcome);
                    if let Some(verdict) = verdict {
                        settle.resolve(verdict);
                    }
                },
                Some(progress_to(&resolver)),
            );
        }
    })
}

/// Fulfills with the first input value to fulfill.
///
/// Rejects with [`Reason::Aggregate`], keyed by input position, once every
/// input has rejected, or with a [`Reason::Length`] when there are no
/// inputs.
///
/// # Examples
///
/// ```
/// use promise_deferred::{any, Promise, Reason};
///
/// let first = any(vec![Promise::rejected("a"), Promise::fulfilled(2), Promise::fulfilled(3)]);
/// assert!(first.is_fulfilled());
///
/// let none = any(Vec::<Promise<i32>>::new());
/// none.otherwise(|reason| {
///     assert_eq!(
///         reason.to_string(),
///         "Input array must contain at least 1 item but contains only 0 items."
///     );
///     Ok(0)
/// });
/// ```
pub fn any<I: IntoInputs>(inputs: I) -> Promise<I::Item> {
    some(inputs, 1).then(|values| {
        values
            .into_iter()
            .next()
            .ok_or_else(|| Reason::length(1, 0))
    })
}

struct Tally<T> {
    to_resolve: usize,
    to_reject: usize,
    values: BTreeMap<usize, T>,
    reasons: BTreeMap<usize, Reason>,
}

impl<T> Tally<T> {
    /// Records one settled input; returns the aggregate outcome once it is
    /// decided, and `None` before and after that.
    fn record(&mut self, index: usize, outcome: Result<T, Reason>) -> Option<Result<Vec<T>, Reason>> {
        if self.to_resolve == 0 || self.to_reject == 0 {
            return None;
        }
        match outcome {
            Ok(value) => {
                self.values.insert(index, value);
                self.to_resolve -= 1;
                if self.to_resolve == 0 {
                    return Some(Ok(mem::take(&mut self.values).into_values().collect()));
                }
            }
            Err(reason) => {
                self.reasons.insert(index, reason);
                self.to_reject -= 1;
                if self.to_reject == 0 {
                    return Some(Err(Reason::Aggregate(mem::take(&mut self.reasons))));
                }
            }
        }
        None
    }
}
