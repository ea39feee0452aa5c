//! A guarded counter shared by every client.

use crate::registry::{Args, HandlerResult, InvokeError, RegistryBuilder, RegistryError};

/// Replies with the current value.
pub const GET_PREFIX: &str = "counter get";
/// Increments the counter by one and replies with the new value.
pub const INCR_PREFIX: &str = "counter incr";
/// Adds a decimal amount and replies with the new value.
pub const ADD_PREFIX: &str = "counter add ";

/// Status returned when an addition would overflow.
pub const OVERFLOW_STATUS: i32 = 1;

const AMOUNT_PATTERN: &str = r"(\d{1,20})";

/// Counter state; all commands run under the module lock.
#[derive(Debug, Default)]
pub struct Counter {
    value: u64,
}

impl Counter {
    /// Binds the counter commands.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the amount pattern fails to compile.
    pub fn register(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        registry
            .guarded(Self::default())
            .bind(GET_PREFIX, Self::get)
            .bind(INCR_PREFIX, Self::incr)
            .bind_pattern(ADD_PREFIX, AMOUNT_PATTERN, Self::add)?;
        Ok(())
    }

    fn get(&mut self, _: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        self.report(out);
        Ok(())
    }

    fn incr(&mut self, _: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        self.apply(1, out)
    }

    fn add(&mut self, args: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        let amount = std::str::from_utf8(args.capture(1).unwrap_or_default())
            .ok()
            .and_then(|digits| digits.parse::<u64>().ok())
            .ok_or(InvokeError::BadArgument)?;
        self.apply(amount, out)
    }

    fn apply(&mut self, amount: u64, out: &mut Vec<u8>) -> HandlerResult {
        self.value = self
            .value
            .checked_add(amount)
            .ok_or_else(|| InvokeError::failed(OVERFLOW_STATUS, "counter overflow"))?;
        self.report(out);
        Ok(())
    }

    fn report(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.value.to_string().as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(registry: &crate::registry::ModuleRegistry, query: &[u8]) -> Result<Vec<u8>, InvokeError> {
        let module = registry.resolve(query).expect("resolve");
        let mut out = Vec::new();
        module.invoke(module.remaining(query), &mut out)?;
        Ok(out)
    }

    #[test]
    fn counts_across_commands() {
        let mut builder = RegistryBuilder::new();
        Counter::register(&mut builder).expect("register");
        let registry = builder.finalize().expect("finalize");

        assert_eq!(call(&registry, b"counter get"), Ok(b"0".to_vec()));
        assert_eq!(call(&registry, b"counter incr"), Ok(b"1".to_vec()));
        assert_eq!(call(&registry, b"counter add 41"), Ok(b"42".to_vec()));
        assert_eq!(call(&registry, b"counter add x"), Err(InvokeError::BadArgument));
        assert_eq!(
            call(&registry, b"counter add 18446744073709551615"),
            Err(InvokeError::failed(OVERFLOW_STATUS, "counter overflow"))
        );
        assert_eq!(call(&registry, b"counter get"), Ok(b"42".to_vec()));
    }
}
