//! Railway Outcome
//!
//! `Outcome<T>` is the success/failure track every checkout step runs on.
//! A failure carries a human-readable message and short-circuits every
//! following step.
//!
//! ```text
//! validate ──▶ tokenize ──▶ save ──▶ summary
//!     │            │          │
//!     └────────────┴──────────┴──▶ failure(message)
//! ```
//!
//! No accessor yields the value of a failure. The success value is reached
//! through `match`, [`Outcome::ok`], [`Outcome::into_result`] or one of the
//! `unwrap_or*` helpers.

use std::fmt::Display;
use std::future::Future;

/// Success value or failure message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    Failure(String),
}

impl<T> Outcome<T> {
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Failure message, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(msg) => Some(msg.as_str()),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.ok().unwrap_or(default)
    }

    pub fn unwrap_or_else(self, f: impl FnOnce(String) -> T) -> T {
        match self {
            Self::Success(value) => value,
            Self::Failure(msg) => f(msg),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(msg) => Err(msg),
        }
    }

    /// Transform the success value; failures pass through untouched
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(msg) => Outcome::Failure(msg),
        }
    }

    /// Transform the success value with a fallible function.
    ///
    /// An `Err` from `f` becomes a failure carrying its message.
    pub fn try_map<U, E: Display>(self, f: impl FnOnce(T) -> Result<U, E>) -> Outcome<U> {
        match self {
            Self::Success(value) => f(value).into(),
            Self::Failure(msg) => Outcome::Failure(msg),
        }
    }

    /// Chain a step that itself produces an outcome
    pub fn bind<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Success(value) => f(value),
            Self::Failure(msg) => Outcome::Failure(msg),
        }
    }

    /// Chain an asynchronous step; `f` is not polled on the failure track
    pub async fn bind_async<U, F, Fut>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Outcome<U>>,
    {
        match self {
            Self::Success(value) => f(value).await,
            Self::Failure(msg) => Outcome::Failure(msg),
        }
    }

    /// Side effect on success; returns the outcome unchanged
    #[must_use]
    pub fn on_success(self, f: impl FnOnce(&T)) -> Self {
        if let Self::Success(value) = &self {
            f(value);
        }
        self
    }

    /// Side effect on failure; returns the outcome unchanged
    #[must_use]
    pub fn on_failure(self, f: impl FnOnce(&str)) -> Self {
        if let Self::Failure(msg) = &self {
            f(msg);
        }
        self
    }

    /// First failure in iteration order, else every success value
    pub fn combine(outcomes: impl IntoIterator<Item = Self>) -> Outcome<Vec<T>> {
        let mut values = Vec::new();
        for outcome in outcomes {
            match outcome {
                Self::Success(value) => values.push(value),
                Self::Failure(msg) => return Outcome::Failure(msg),
            }
        }
        Outcome::Success(values)
    }
}

impl<T, E: Display> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err.to_string()),
        }
    }
}
