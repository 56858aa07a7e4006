use super::{aggregate, enlist, progress_to, IntoInputs};
use crate::{Promise, Settle};

/// Settles like whichever input settles first.
///
/// Fulfills with `None` when there are no inputs. Losing inputs are left
/// running.
///
/// # Examples
///
/// ```
/// use promise_deferred::{race, Deferred, Settle};
///
/// let slow = Deferred::<&str>::new();
/// let fast = Deferred::<&str>::new();
/// let winner = race(vec![slow.promise(), fast.promise()]);
///
/// fast.resolve("fast");
/// slow.reject("too late");
/// assert!(winner.is_fulfilled());
/// ```
pub fn race<I: IntoInputs>(inputs: I) -> Promise<Option<I::Item>> {
    aggregate(inputs.into_inputs(), |items, resolver, queue| {
        if items.is_empty() {
            resolver.resolve(None);
            return;
        }
        for item in items {
            let settle = resolver.clone();
            enlist(item, queue).subscribe(
                move |outcome| settle.resolve(outcome.map(Some)),
                Some(progress_to(&resolver)),
            );
        }
    })
}
