mod common;

use std::rc::Rc;

use common::{init_test_logging, Log};
use promise_deferred::{Deferred, Promise, Reason, Settle, Update};

fn value_of(update: &Update) -> Option<i32> {
    update.downcast_ref::<i32>().copied()
}

#[test]
fn notify_invokes_progress_handler() {
    init_test_logging();
    let deferred = Deferred::<()>::new();
    let log = Log::new();
    let sink = log.clone();
    deferred.promise().progress(move |update| {
        sink.push(value_of(&update));
        update
    });

    deferred.notify(1);
    assert_eq!(log.entries(), vec![Some(1)]);
}

#[test]
fn notify_propagates_progress_to_downstream_promises() {
    let deferred = Deferred::<()>::new();
    let log = Log::new();
    let sink = log.clone();
    deferred
        .promise()
        .then(|_| Ok::<_, Reason>(()))
        .then(|_| Ok::<_, Reason>(()))
        .progress(move |update| {
            sink.push(value_of(&update));
            update
        });

    deferred.notify(1);
    assert_eq!(log.entries(), vec![Some(1)]);
}

#[test]
fn notify_propagates_transformed_progress_downstream() {
    let deferred = Deferred::<()>::new();
    let log = Log::new();
    let sink = log.clone();
    deferred
        .promise()
        .progress(|update| Update::new(value_of(&update).unwrap_or(0) + 1))
        .progress(move |update| {
            sink.push(value_of(&update));
            update
        });

    deferred.notify(1);
    assert_eq!(log.entries(), vec![Some(2)]);
}

#[test]
fn progress_handler_failure_value_becomes_the_next_payload() {
    let deferred = Deferred::<()>::new();
    let log = Log::new();
    let sink = log.clone();
    deferred
        .promise()
        .progress(|_| Update::new(Reason::from("progress handler failed")))
        .progress(move |update| {
            sink.push(update.downcast_ref::<Reason>().cloned());
            update
        });

    deferred.notify(1);
    assert_eq!(log.entries(), vec![Some(Reason::from("progress handler failed"))]);
}

#[test]
fn progress_is_forwarded_when_callback_on_settled_promise_returns_a_promise() {
    let first = Deferred::<()>::new();
    let second = Deferred::<()>::new();
    let sentinel = Update::new("sentinel");
    let log = Log::new();
    let sink = log.clone();

    first.resolve(());
    let returned = second.promise();
    first
        .promise()
        .then(move |_| returned)
        .progress(move |update| {
            sink.push(update.clone());
            update
        });

    second.notify(sentinel.clone());
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(Update::ptr_eq(&entries[0], &sentinel));
}

#[test]
fn progress_is_forwarded_when_callback_on_pending_promise_returns_a_promise() {
    let first = Deferred::<()>::new();
    let second = Deferred::<()>::new();
    let sentinel = Update::new("sentinel");
    let log = Log::new();
    let sink = log.clone();

    let returned = second.promise();
    first
        .promise()
        .then(move |_| returned)
        .progress(move |update| {
            sink.push(update.clone());
            update
        });

    first.resolve(());
    second.notify(sentinel.clone());
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(Update::ptr_eq(&entries[0], &sentinel));
}

#[test]
fn progress_is_forwarded_when_resolved_with_another_promise() {
    let first = Deferred::<()>::new();
    let second = Deferred::<()>::new();
    let sentinel = Update::new("sentinel");
    let log = Log::new();
    let sink = log.clone();

    let transformed = sentinel.clone();
    first
        .promise()
        .progress(move |_| transformed.clone())
        .progress(move |update| {
            sink.push(update.clone());
            update
        });

    first.resolve(second.promise());
    second.notify(1);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(Update::ptr_eq(&entries[0], &sentinel));
}

#[test]
fn resolve_is_allowed_after_progress() {
    let deferred = Deferred::<i32>::new();
    let log = Log::new();
    let (on_value, on_progress) = (log.clone(), log.clone());
    deferred.promise().then_with(
        move |value| {
            on_value.push(value);
            Ok::<_, Reason>(())
        },
        |reason| Err(reason),
        move |update| {
            on_progress.push(value_of(&update).unwrap_or(-1));
            update
        },
    );

    deferred.notify(1);
    deferred.resolve(2);
    assert_eq!(log.entries(), vec![1, 2]);
}

#[test]
fn reject_is_allowed_after_progress() {
    let deferred = Deferred::<i32>::new();
    let log = Log::new();
    let (on_reason, on_progress) = (log.clone(), log.clone());
    deferred.promise().then_with(
        |_| Ok::<_, Reason>(()),
        move |reason| {
            on_reason.push(reason.to_string());
            Ok(())
        },
        move |update| {
            on_progress.push(value_of(&update).map_or_else(String::new, |v| v.to_string()));
            update
        },
    );

    deferred.notify(1);
    deferred.reject("2");
    assert_eq!(log.entries(), vec!["1".to_owned(), "2".to_owned()]);
}

#[test]
fn notify_after_settlement_is_silently_ignored() {
    let deferred = Deferred::<i32>::new();
    let log = Log::new();
    let sink = log.clone();
    deferred.promise().progress(move |update| {
        sink.push(value_of(&update));
        update
    });

    deferred.reject("done");
    deferred.notify(1);
    assert!(log.entries().is_empty());
}

#[test]
fn progress_handler_feeding_a_done_chain_runs() {
    let deferred = Deferred::<i32>::new();
    let log = Log::new();
    let sink = log.clone();
    let done = deferred
        .promise()
        .progress(move |update| {
            sink.push(value_of(&update));
            update
        })
        .done();

    deferred.notify(1);
    assert_eq!(log.entries(), vec![Some(1)]);
    assert!(done.result().is_none());
}

#[test]
fn progress_on_a_settled_promise_is_never_called() {
    let calls = Rc::new(std::cell::Cell::new(0));
    let counter = calls.clone();
    Promise::fulfilled(1).progress(move |update| {
        counter.set(counter.get() + 1);
        update
    });
    assert_eq!(calls.get(), 0);
}
