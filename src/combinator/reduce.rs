use std::cell::RefCell;
use std::rc::Rc;

use super::{aggregate, enlist, progress_to, Inputs, IntoInputs};
use crate::{IntoResolution, Promise, Reason, Resolution, Settle};

/// Folds the input values from left to right, one at a time.
///
/// `reducer` receives the accumulator (`None` for the first input), the
/// input value and its position, and may return a promise. With no inputs
/// the result is `None`.
///
/// # Examples
///
/// ```
/// use promise_deferred::{reduce, Promise, Reason};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let total = reduce(
///     vec![Promise::fulfilled(1), Promise::fulfilled(2), Promise::fulfilled(3)],
///     |sum: Option<i32>, value, _index| Ok::<_, Reason>(sum.unwrap_or(0) + value),
/// );
/// let seen = Rc::new(Cell::new(None));
/// let sink = seen.clone();
/// total.then(move |sum| {
///     sink.set(sum);
///     Ok::<_, Reason>(())
/// });
/// assert_eq!(seen.get(), Some(6));
/// ```
pub fn reduce<I, F, R>(inputs: I, reducer: F) -> Promise<Option<R::Output>>
where
    I: IntoInputs,
    F: FnMut(Option<R::Output>, I::Item, usize) -> R + 'static,
    R: IntoResolution,
    R::Output: Clone + 'static,
{
    fold(inputs.into_inputs(), reducer, None)
}

/// [`reduce`] starting from `initial`, which may itself be a promise.
pub fn reduce_with<I, F, R>(
    inputs: I,
    reducer: F,
    initial: impl Into<Resolution<R::Output>>,
) -> Promise<Option<R::Output>>
where
    I: IntoInputs,
    F: FnMut(Option<R::Output>, I::Item, usize) -> R + 'static,
    R: IntoResolution,
    R::Output: Clone + 'static,
{
    fold(inputs.into_inputs(), reducer, Some(initial.into()))
}

fn fold<T, A, F, R>(inputs: Inputs<T>, reducer: F, initial: Option<Resolution<A>>) -> Promise<Option<A>>
where
    T: Clone + 'static,
    A: Clone + 'static,
    F: FnMut(Option<A>, T, usize) -> R + 'static,
    R: IntoResolution<Output = A>,
{
    let reducer = Rc::new(RefCell::new(reducer));
    aggregate(inputs, move |items, resolver, queue| {
        let mut carry = match initial {
            Some(initial) => enlist(initial, queue).then(|value| Ok::<_, Reason>(Some(value))),
            None => Promise::fulfilled(None),
        };
        for (index, item) in items.into_iter().enumerate() {
            let input = enlist(item, queue);
            input.subscribe(|_| {}, Some(progress_to(&resolver)));

            let reducer = reducer.clone();
            carry = carry.then(move |accumulated| {
                input.then(move |value| match reducer.try_borrow_mut() {
                    Ok(mut reducer) => (*reducer)(accumulated, value, index)
                        .into_resolution()
                        .map(Some),
                    Err(_) => Resolution::Rejected(Reason::runtime("reducer re-entered")),
                })
            });
        }

        carry.subscribe(move |outcome| resolver.resolve(outcome), None);
    })
}
