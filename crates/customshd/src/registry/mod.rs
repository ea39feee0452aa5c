//! Command registry mapping text prefixes to handlers.
//!
//! Modules bind handlers to prefixes on a [`RegistryBuilder`] during startup.
//! [`RegistryBuilder::finalize`] sorts the entries, rejects duplicates and
//! freezes the result into a [`ModuleRegistry`], which is immutable and is
//! shared by every worker thereafter.
//!
//! Resolution selects the longest registered prefix of the query. The empty
//! prefix is a valid catch-all.

mod binding;
mod errors;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::{Arc, Mutex};

pub use self::binding::{
    Args, Convention, GuardedBinder, Handler, HandlerResult, InvokeError, UnguardedBinder,
};
pub use self::errors::{RegistryError, ResolveError};

/// A single registered command: a prefix and the handler it selects.
pub struct Module {
    prefix: Box<[u8]>,
    convention: Convention,
    handler: Box<dyn Handler>,
}

impl Module {
    /// Wraps `handler` as the command selected by `prefix`.
    #[must_use]
    pub fn new(
        prefix: impl Into<Box<[u8]>>,
        convention: Convention,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            convention,
            handler: Box::new(handler),
        }
    }

    /// The registered prefix.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// How the handler is called.
    #[must_use]
    pub const fn convention(&self) -> Convention {
        self.convention
    }

    /// Invokes the handler with the query text that follows the prefix.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`InvokeError`].
    pub fn invoke(&self, remaining: &[u8], out: &mut Vec<u8>) -> HandlerResult {
        self.handler.invoke(&self.prefix, remaining, out)
    }

    /// Splits the prefix off a query this module was resolved for.
    #[must_use]
    pub fn remaining<'q>(&self, query: &'q [u8]) -> &'q [u8] {
        query.get(self.prefix.len()..).unwrap_or_default()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Module")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

/// Mutable registry used while modules bind their handlers.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    modules: Vec<Module>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fully-formed module.
    pub fn register(&mut self, module: Module) -> &mut Self {
        self.modules.push(module);
        self
    }

    /// Starts binding guarded methods over `state`, which is placed behind a
    /// fresh exclusion lock.
    pub fn guarded<S>(&mut self, state: S) -> GuardedBinder<'_, S>
    where
        S: Send + 'static,
    {
        self.guarded_shared(Arc::new(Mutex::new(state)))
    }

    /// Starts binding guarded methods over an existing lock, letting the
    /// caller keep a handle to the state.
    pub fn guarded_shared<S>(&mut self, state: Arc<Mutex<S>>) -> GuardedBinder<'_, S>
    where
        S: Send + 'static,
    {
        GuardedBinder::new(self, state)
    }

    /// Starts binding unguarded methods over `state`.
    pub fn unguarded<S>(&mut self, state: S) -> UnguardedBinder<'_, S>
    where
        S: Send + Sync + 'static,
    {
        self.unguarded_shared(Arc::new(state))
    }

    /// Starts binding unguarded methods over shared `state`.
    pub fn unguarded_shared<S>(&mut self, state: Arc<S>) -> UnguardedBinder<'_, S>
    where
        S: Send + Sync + 'static,
    {
        UnguardedBinder::new(self, state)
    }

    /// Number of modules registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Sorts the entries and freezes them into a resolvable registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicatePrefix`] when two modules share a
    /// prefix.
    pub fn finalize(self) -> Result<ModuleRegistry, RegistryError> {
        let mut modules = self.modules;
        modules.sort_by(|left, right| left.prefix().cmp(right.prefix()));
        if let Some(duplicate) = modules
            .windows(2)
            .find_map(|pair| match pair {
                [left, right] if left.prefix() == right.prefix() => Some(left),
                _ => None,
            })
        {
            return Err(RegistryError::DuplicatePrefix {
                prefix: String::from_utf8_lossy(duplicate.prefix()).into_owned(),
            });
        }
        let min_prefix_len = modules
            .iter()
            .map(|module| module.prefix().len())
            .min()
            .unwrap_or(0);
        Ok(ModuleRegistry {
            modules: modules.into_iter().map(Arc::new).collect(),
            min_prefix_len,
        })
    }
}

/// Finalised, read-only registry sorted by prefix.
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: Vec<Arc<Module>>,
    min_prefix_len: usize,
}

impl ModuleRegistry {
    /// Finds the module whose prefix is the longest prefix of `query`.
    ///
    /// Entries are kept in lexicographic order. The candidate is the last
    /// entry not greater than the query; if it is not itself a prefix of the
    /// query, any matching prefix must also be a prefix of their common
    /// prefix, so the search repeats on that shorter text.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when no registered prefix matches.
    pub fn resolve(&self, query: &[u8]) -> Result<&Arc<Module>, ResolveError> {
        if query.len() < self.min_prefix_len {
            return Err(ResolveError::not_found(query));
        }
        let mut probe = query;
        loop {
            let bound = self
                .modules
                .partition_point(|module| module.prefix() <= probe);
            let Some(candidate) = bound.checked_sub(1).and_then(|last| self.modules.get(last))
            else {
                return Err(ResolveError::not_found(query));
            };
            if probe.starts_with(candidate.prefix()) {
                return Ok(candidate);
            }
            // The candidate sorts at or below the probe without being its
            // prefix, so the shared length is strictly shorter than the probe.
            let shared = common_prefix_len(candidate.prefix(), probe);
            match probe.get(..shared) {
                Some(shorter) if shared >= self.min_prefix_len && shared < probe.len() => {
                    probe = shorter;
                }
                _ => return Err(ResolveError::not_found(query)),
            }
        }
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` when no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Length of the shortest registered prefix.
    #[must_use]
    pub const fn min_prefix_len(&self) -> usize {
        self.min_prefix_len
    }

    /// Registered modules in sorted prefix order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.iter()
    }
}

fn common_prefix_len(left: &[u8], right: &[u8]) -> usize {
    left.iter()
        .zip(right)
        .take_while(|(lhs, rhs)| lhs == rhs)
        .count()
}
