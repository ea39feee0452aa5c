//! Stateless commands that reflect their input.

use crate::registry::{Args, HandlerResult, RegistryBuilder};

/// Replies with the text following `echo `.
pub const ECHO_PREFIX: &str = "echo ";
/// Replies with `hello` followed by any remaining text.
pub const HELLO_PREFIX: &str = "hello";

/// Stateless echo commands.
#[derive(Debug, Default)]
pub struct Echo;

impl Echo {
    /// Binds the echo commands.
    pub fn register(registry: &mut RegistryBuilder) {
        registry
            .unguarded(Self)
            .bind(ECHO_PREFIX, Self::echo)
            .bind(HELLO_PREFIX, Self::hello);
    }

    fn echo(&self, args: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        out.extend_from_slice(args.query());
        Ok(())
    }

    fn hello(&self, args: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        out.extend_from_slice(args.prefix());
        out.extend_from_slice(args.query());
        Ok(())
    }
}
