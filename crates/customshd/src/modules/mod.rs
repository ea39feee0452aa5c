//! Built-in command modules.
//!
//! | prefix                         | convention         | reply                        |
//! |--------------------------------|--------------------|------------------------------|
//! | `echo `                        | unguarded          | the remaining text           |
//! | `hello`                        | unguarded          | `hello` plus remaining text  |
//! | `counter get` / `counter incr` | guarded            | counter value                |
//! | `counter add `                 | guarded, pattern   | counter value                |
//! | `this is a `, ...              | guarded            | `[prefix] [query]`           |
//! | `ls `                          | unguarded, pattern | `ls -la` output              |

mod counter;
mod echo;
mod listing;
mod probe;

pub use self::counter::Counter;
pub use self::echo::Echo;
pub use self::listing::Listing;
pub use self::probe::{PROBE_PREFIXES, PrefixProbe};

use crate::registry::{RegistryBuilder, RegistryError};

/// Binds every built-in module.
///
/// # Errors
///
/// Returns [`RegistryError`] when a module's pattern fails to compile.
pub fn register_builtin(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
    Echo::register(registry);
    Counter::register(registry)?;
    PrefixProbe::register(registry);
    Listing::register(registry)?;
    Ok(())
}
