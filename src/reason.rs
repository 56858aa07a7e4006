//! Rejection reasons and the error types surfaced by the crate.
//!
//! Every rejected promise carries a [`Reason`]. Reasons form a closed tagged
//! union so rejection handlers can filter on a [`ReasonKind`] instead of
//! inspecting types at runtime. Arbitrary user errors travel in
//! [`Reason::Custom`] and can be recovered with [`Reason::downcast_ref`].

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::rc::Rc;

use thiserror::Error;

/// Why a promise was rejected.
#[derive(Debug, Clone, Error)]
pub enum Reason {
    /// A generic failure raised by a producer or a handler.
    #[error("{0}")]
    Runtime(String),
    /// An argument was outside what the operation accepts.
    #[error("{0}")]
    InvalidArgument(String),
    /// A value had the wrong shape, e.g. a promise resolved with itself.
    #[error("{0}")]
    Type(String),
    /// A combinator received fewer inputs than it needs.
    #[error("{0}")]
    Length(String),
    /// Several inputs rejected; reasons are keyed by input position.
    #[error("{} input(s) rejected", .0.len())]
    Aggregate(BTreeMap<usize, Reason>),
    /// Any other error supplied by user code.
    #[error("{0}")]
    Custom(Rc<dyn StdError>),
}

impl Reason {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wraps a user error so it can travel through a promise chain.
    pub fn custom<E: StdError + 'static>(error: E) -> Self {
        Self::Custom(Rc::new(error))
    }

    pub(crate) fn self_resolution() -> Self {
        Self::Type("Cannot resolve a promise with itself.".to_owned())
    }

    /// Builds the length violation raised by `any`/`some`.
    ///
    /// ```
    /// use promise_deferred::Reason;
    /// assert_eq!(
    ///     Reason::length(4, 3).to_string(),
    ///     "Input array must contain at least 4 items but contains only 3 items."
    /// );
    /// ```
    pub fn length(required: usize, available: usize) -> Self {
        Self::Length(format!(
            "Input array must contain at least {required} item{} but contains only {available} item{}.",
            plural(required),
            plural(available),
        ))
    }

    pub fn kind(&self) -> ReasonKind {
        match self {
            Self::Runtime(_) => ReasonKind::Runtime,
            Self::InvalidArgument(_) => ReasonKind::InvalidArgument,
            Self::Type(_) => ReasonKind::Type,
            Self::Length(_) => ReasonKind::Length,
            Self::Aggregate(_) => ReasonKind::Aggregate,
            Self::Custom(_) => ReasonKind::Custom,
        }
    }

    /// Returns the wrapped user error if it is an `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Custom(error) => (**error).downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Reasons of an aggregate rejection, keyed by input position.
    pub fn reasons(&self) -> Option<&BTreeMap<usize, Reason>> {
        match self {
            Self::Aggregate(reasons) => Some(reasons),
            _ => None,
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

impl PartialEq for Reason {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Runtime(a), Self::Runtime(b))
            | (Self::InvalidArgument(a), Self::InvalidArgument(b))
            | (Self::Type(a), Self::Type(b))
            | (Self::Length(a), Self::Length(b)) => a == b,
            (Self::Aggregate(a), Self::Aggregate(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Reason {
    fn from(message: &str) -> Self {
        Self::Runtime(message.to_owned())
    }
}

impl From<String> for Reason {
    fn from(message: String) -> Self {
        Self::Runtime(message)
    }
}

/// The variant tag of a [`Reason`], used to filter rejection handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonKind {
    Runtime,
    InvalidArgument,
    Type,
    Length,
    Aggregate,
    Custom,
}

impl ReasonKind {
    /// Whether a handler declared for `self` accepts `reason`.
    pub fn matches(self, reason: &Reason) -> bool {
        reason.kind() == self
    }
}

/// A rejection that reached [`Promise::done`](crate::Promise::done) without
/// being handled.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unhandled rejection: {reason}")]
pub struct UnhandledRejection {
    reason: Reason,
}

impl UnhandledRejection {
    pub(crate) fn new(reason: Reason) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> &Reason {
        &self.reason
    }

    pub fn into_reason(self) -> Reason {
        self.reason
    }
}

/// Misuse reported synchronously, not as a rejection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Unhandled(#[from] UnhandledRejection),
}
