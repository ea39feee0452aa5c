//! Calling conventions that adapt module methods into uniform handlers.
//!
//! Every registered command is stored as a [`Handler`]. The four conventions
//! differ only in whether the owning state is locked for the duration of the
//! call and whether the remaining query must first match a pattern:
//!
//! | convention          | exclusion        | argument check          |
//! |---------------------|------------------|-------------------------|
//! | `Guarded`           | `try_lock`       | none                    |
//! | `GuardedPattern`    | `try_lock`       | anchored regex, first   |
//! | `Unguarded`         | none             | none                    |
//! | `UnguardedPattern`  | none             | anchored regex          |
//!
//! Guarded handlers never block: a contended lock surfaces as
//! [`InvokeError::Locked`] so the worker can requeue the request.

use std::fmt;
use std::sync::{Arc, Mutex, TryLockError};

use regex::bytes::{Captures, Regex};
use thiserror::Error;

use super::{Module, RegistryBuilder, RegistryError};

/// Result type returned by module methods.
pub type HandlerResult = Result<(), InvokeError>;

/// Failure modes of a single handler invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The remaining query did not match the bound pattern.
    #[error("argument rejected by pattern")]
    BadArgument,
    /// The module's state is held by another worker.
    #[error("module state is locked")]
    Locked,
    /// The handler ran and reported a failure to send back to the client.
    #[error("handler failed with status {status}: {message}")]
    Failed {
        /// Non-zero status written to the reply header.
        status: i32,
        /// Message written as the reply payload.
        message: String,
    },
}

impl InvokeError {
    /// Creates a handler failure carrying a client-visible status.
    #[must_use]
    pub fn failed(status: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            status,
            message: message.into(),
        }
    }
}

/// Uniform invocation surface stored in the registry.
pub trait Handler: Send + Sync {
    /// Runs the command. `prefix` is the matched prefix and `remaining` the
    /// query text that follows it; output is appended to `out`.
    fn invoke(&self, prefix: &[u8], remaining: &[u8], out: &mut Vec<u8>) -> HandlerResult;
}

/// How a registered handler is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Exclusive state access, no argument validation.
    Guarded,
    /// Exclusive state access after the argument matches a pattern.
    GuardedPattern,
    /// Shared state access, no argument validation.
    Unguarded,
    /// Shared state access after the argument matches a pattern.
    UnguardedPattern,
}

impl Convention {
    const fn select(guarded: bool, pattern: bool) -> Self {
        match (guarded, pattern) {
            (true, false) => Self::Guarded,
            (true, true) => Self::GuardedPattern,
            (false, false) => Self::Unguarded,
            (false, true) => Self::UnguardedPattern,
        }
    }

    /// Whether the handler takes the module's exclusion lock.
    #[must_use]
    pub const fn is_guarded(self) -> bool {
        matches!(self, Self::Guarded | Self::GuardedPattern)
    }

    /// Whether the handler validates its argument against a pattern.
    #[must_use]
    pub const fn has_pattern(self) -> bool {
        matches!(self, Self::GuardedPattern | Self::UnguardedPattern)
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guarded => "guarded",
            Self::GuardedPattern => "guarded_pattern",
            Self::Unguarded => "unguarded",
            Self::UnguardedPattern => "unguarded_pattern",
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Arguments passed to a module method.
pub struct Args<'a> {
    prefix: &'a [u8],
    query: &'a [u8],
    captures: Option<Captures<'a>>,
}

impl<'a> Args<'a> {
    /// The prefix that selected this handler.
    #[must_use]
    pub const fn prefix(&self) -> &'a [u8] {
        self.prefix
    }

    /// Query text following the prefix.
    #[must_use]
    pub const fn query(&self) -> &'a [u8] {
        self.query
    }

    /// Query text as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::BadArgument`] when the bytes are not UTF-8.
    pub fn query_str(&self) -> Result<&'a str, InvokeError> {
        std::str::from_utf8(self.query).map_err(|_| InvokeError::BadArgument)
    }

    /// Capture group `index` from the bound pattern, if it participated in
    /// the match. Index zero is the whole query.
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&'a [u8]> {
        self.captures
            .as_ref()
            .and_then(|captures| captures.get(index))
            .map(|group| group.as_bytes())
    }
}

/// Argument pattern anchored to the whole remaining query.
#[derive(Debug, Clone)]
pub(crate) struct Pattern(Regex);

impl Pattern {
    pub(crate) fn compile(prefix: &[u8], source: &str) -> Result<Self, RegistryError> {
        Regex::new(&format!(r"\A(?:{source})\z"))
            .map(Self)
            .map_err(|error| RegistryError::InvalidPattern {
                prefix: String::from_utf8_lossy(prefix).into_owned(),
                pattern: source.to_owned(),
                message: error.to_string(),
            })
    }

    fn check<'q>(&self, remaining: &'q [u8]) -> Result<Captures<'q>, InvokeError> {
        self.0.captures(remaining).ok_or(InvokeError::BadArgument)
    }
}

fn arguments<'a>(
    pattern: Option<&Pattern>,
    prefix: &'a [u8],
    query: &'a [u8],
) -> Result<Args<'a>, InvokeError> {
    let captures = pattern.map(|pattern| pattern.check(query)).transpose()?;
    Ok(Args {
        prefix,
        query,
        captures,
    })
}

struct GuardedHandler<S, F> {
    state: Arc<Mutex<S>>,
    pattern: Option<Pattern>,
    method: F,
}

impl<S, F> Handler for GuardedHandler<S, F>
where
    S: Send,
    F: Fn(&mut S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync,
{
    fn invoke(&self, prefix: &[u8], remaining: &[u8], out: &mut Vec<u8>) -> HandlerResult {
        let mut state = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(InvokeError::Locked),
            // A panicking handler is contained by the worker; the state it
            // left behind is still the module's state.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let args = arguments(self.pattern.as_ref(), prefix, remaining)?;
        (self.method)(&mut state, &args, out)
    }
}

struct UnguardedHandler<S, F> {
    state: Arc<S>,
    pattern: Option<Pattern>,
    method: F,
}

impl<S, F> Handler for UnguardedHandler<S, F>
where
    S: Send + Sync,
    F: Fn(&S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync,
{
    fn invoke(&self, prefix: &[u8], remaining: &[u8], out: &mut Vec<u8>) -> HandlerResult {
        let args = arguments(self.pattern.as_ref(), prefix, remaining)?;
        (self.method)(&self.state, &args, out)
    }
}

/// Registers guarded methods that share one exclusively-locked state.
///
/// Obtained from [`RegistryBuilder::guarded`].
pub struct GuardedBinder<'r, S> {
    registry: &'r mut RegistryBuilder,
    state: Arc<Mutex<S>>,
}

impl<'r, S> GuardedBinder<'r, S>
where
    S: Send + 'static,
{
    pub(super) const fn new(registry: &'r mut RegistryBuilder, state: Arc<Mutex<S>>) -> Self {
        Self { registry, state }
    }

    /// Binds `method` to `prefix`.
    pub fn bind<F>(&mut self, prefix: impl AsRef<[u8]>, method: F) -> &mut Self
    where
        F: Fn(&mut S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(prefix.as_ref(), None, method);
        self
    }

    /// Binds `method` to `prefix`, accepting only queries that fully match
    /// `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPattern`] when `pattern` does not
    /// compile.
    pub fn bind_pattern<F>(
        &mut self,
        prefix: impl AsRef<[u8]>,
        pattern: &str,
        method: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static,
    {
        let prefix = prefix.as_ref();
        let pattern = Pattern::compile(prefix, pattern)?;
        self.register(prefix, Some(pattern), method);
        Ok(self)
    }

    fn register<F>(&mut self, prefix: &[u8], pattern: Option<Pattern>, method: F)
    where
        F: Fn(&mut S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static,
    {
        let convention = Convention::select(true, pattern.is_some());
        let handler = GuardedHandler {
            state: Arc::clone(&self.state),
            pattern,
            method,
        };
        self.registry
            .register(Module::new(prefix, convention, handler));
    }
}

/// Registers unguarded methods over shared, internally-synchronised state.
///
/// Obtained from [`RegistryBuilder::unguarded`].
pub struct UnguardedBinder<'r, S> {
    registry: &'r mut RegistryBuilder,
    state: Arc<S>,
}

impl<'r, S> UnguardedBinder<'r, S>
where
    S: Send + Sync + 'static,
{
    pub(super) const fn new(registry: &'r mut RegistryBuilder, state: Arc<S>) -> Self {
        Self { registry, state }
    }

    /// Binds `method` to `prefix`.
    pub fn bind<F>(&mut self, prefix: impl AsRef<[u8]>, method: F) -> &mut Self
    where
        F: Fn(&S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(prefix.as_ref(), None, method);
        self
    }

    /// Binds `method` to `prefix`, accepting only queries that fully match
    /// `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPattern`] when `pattern` does not
    /// compile.
    pub fn bind_pattern<F>(
        &mut self,
        prefix: impl AsRef<[u8]>,
        pattern: &str,
        method: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static,
    {
        let prefix = prefix.as_ref();
        let pattern = Pattern::compile(prefix, pattern)?;
        self.register(prefix, Some(pattern), method);
        Ok(self)
    }

    fn register<F>(&mut self, prefix: &[u8], pattern: Option<Pattern>, method: F)
    where
        F: Fn(&S, &Args<'_>, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static,
    {
        let convention = Convention::select(false, pattern.is_some());
        let handler = UnguardedHandler {
            state: Arc::clone(&self.state),
            pattern,
            method,
        };
        self.registry
            .register(Module::new(prefix, convention, handler));
    }
}
