mod common;

use common::outcome;
use proptest::prelude::*;
use promise_deferred::{all, some, Deferred, Promise, Reason, Settle};

#[derive(Debug, Clone)]
enum Step {
    Resolve(i32),
    Reject(String),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<i32>().prop_map(Step::Resolve),
        "[a-z]{1,8}".prop_map(Step::Reject),
    ]
}

proptest! {
    #[test]
    fn only_the_first_settlement_counts(steps in prop::collection::vec(step(), 1..16)) {
        let deferred = Deferred::<i32>::new();
        let seen = outcome(&deferred.promise());
        for step in &steps {
            match step {
                Step::Resolve(value) => deferred.resolve(*value),
                Step::Reject(reason) => deferred.reject(reason.as_str()),
            }
        }

        let expected = match &steps[0] {
            Step::Resolve(value) => Ok(*value),
            Step::Reject(reason) => Err(Reason::from(reason.as_str())),
        };
        prop_assert_eq!(seen.borrow().clone(), Some(expected));
    }

    #[test]
    fn all_preserves_input_order(
        order in Just((0..12usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let inputs: Vec<Deferred<usize>> = (0..order.len()).map(|_| Deferred::new()).collect();
        let seen = outcome(&all(inputs.iter().map(Deferred::promise).collect::<Vec<_>>()));

        for &index in &order {
            prop_assert!(seen.borrow().is_none());
            inputs[index].resolve(index * 10);
        }
        let expected: Vec<usize> = (0..order.len()).map(|index| index * 10).collect();
        prop_assert_eq!(seen.borrow().clone(), Some(Ok(expected)));
    }

    #[test]
    fn some_fulfills_with_the_first_values_in_input_order(
        values in prop::collection::vec(any::<u8>(), 1..10),
        count in 0usize..12,
    ) {
        let promises: Vec<Promise<u8>> = values.iter().copied().map(Promise::fulfilled).collect();
        let seen = outcome(&some(promises, count));

        let expected = if count > values.len() {
            Err(Reason::length(count, values.len()))
        } else {
            Ok(values[..count].to_vec())
        };
        prop_assert_eq!(seen.borrow().clone(), Some(expected));
    }
}
