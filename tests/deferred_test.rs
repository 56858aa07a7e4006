mod common;

use common::{init_test_logging, outcome, Log};
use promise_deferred::{
    Deferred, Promise, PromiseState, Reason, ReasonKind, Resolution, Resolver, Settle, Thenable,
};

struct Immediate(i32);

impl Thenable<i32> for Immediate {
    fn subscribe(&self, resolver: Resolver<i32>) {
        resolver.resolve(self.0);
    }
}

#[test]
fn resolve_fulfills_the_promise() {
    init_test_logging();
    let deferred = Deferred::<i32>::new();
    let seen = outcome(&deferred.promise());
    deferred.resolve(1);
    assert_eq!(*seen.borrow(), Some(Ok(1)));
}

#[test]
fn resolve_after_resolve_is_ignored() {
    let deferred = Deferred::<i32>::new();
    let seen = outcome(&deferred.promise());
    deferred.resolve(1);
    deferred.resolve(2);
    assert_eq!(*seen.borrow(), Some(Ok(1)));
}

#[test]
fn reject_rejects_the_promise() {
    let deferred = Deferred::<i32>::new();
    let seen = outcome(&deferred.promise());
    deferred.reject(Reason::runtime("boom"));
    deferred.resolve(1);
    assert_eq!(*seen.borrow(), Some(Err(Reason::runtime("boom"))));
}

#[test]
fn resolve_with_pending_promise_follows_it() {
    let inner = Deferred::<i32>::new();
    let outer = Deferred::<i32>::new();
    let seen = outcome(&outer.promise());

    outer.resolve(inner.promise());
    outer.resolve(5);
    assert_eq!(*seen.borrow(), None);

    inner.resolve(3);
    assert_eq!(*seen.borrow(), Some(Ok(3)));
}

#[test]
fn resolve_with_a_thenable_adopts_it() {
    let deferred = Deferred::<i32>::new();
    let seen = outcome(&deferred.promise());
    deferred.resolve(Resolution::thenable(Immediate(9)));
    assert_eq!(*seen.borrow(), Some(Ok(9)));
}

#[test]
fn resolve_with_itself_rejects_with_type_reason() {
    let deferred = Deferred::<i32>::new();
    let seen = outcome(&deferred.promise());
    deferred.resolve(deferred.promise());
    let reason = seen.borrow().clone().and_then(Result::err);
    assert_eq!(reason.map(|reason| reason.kind()), Some(ReasonKind::Type));
}

#[test]
fn resolver_settles_the_deferred_promise() {
    let deferred = Deferred::<&str>::new();
    let resolver = deferred.resolver();
    let seen = outcome(&deferred.promise());
    resolver.resolve("from resolver");
    assert_eq!(*seen.borrow(), Some(Ok("from resolver")));
}

#[test]
fn promise_constructor_passes_a_resolver() {
    let log = Log::new();
    let sink = log.clone();
    let promise = Promise::new(move |resolver: Resolver<i32>| {
        sink.push("started");
        resolver.resolve(1);
        Ok(())
    });
    assert_eq!(log.entries(), vec!["started"]);
    assert_eq!(promise.state(), PromiseState::Fulfilled);
}

#[test]
fn promise_constructor_failure_rejects() {
    let promise = Promise::<i32>::new(|_| Err(Reason::from("constructor failed")));
    let seen = outcome(&promise);
    assert_eq!(*seen.borrow(), Some(Err(Reason::from("constructor failed"))));
}

#[test]
fn promise_constructor_failure_after_resolve_is_ignored() {
    let promise = Promise::<i32>::new(|resolver| {
        resolver.resolve(1);
        Err(Reason::from("too late"))
    });
    assert!(promise.is_fulfilled());
}
