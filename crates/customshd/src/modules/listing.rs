//! Directory listings produced by an external `ls`.

use tracing::debug;

use crate::registry::{Args, HandlerResult, InvokeError, RegistryBuilder, RegistryError};
use crate::subprocess;

/// Lists the absolute directory that follows.
pub const LIST_PREFIX: &str = "ls ";

/// Absolute paths only, so the argument can never be read as an option.
const PATH_PATTERN: &str = r"/[A-Za-z0-9._/+@:-]*";

const LIST_PROGRAM: &str = "ls";

/// Runs `ls -la` on a validated path.
#[derive(Debug, Default)]
pub struct Listing;

impl Listing {
    /// Binds the listing command.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the path pattern fails to compile.
    pub fn register(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        registry
            .unguarded(Self)
            .bind_pattern(LIST_PREFIX, PATH_PATTERN, Self::list)?;
        Ok(())
    }

    fn list(&self, args: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        let path = args.query_str()?;
        debug!(path, "listing directory");
        let listing = subprocess::capture(LIST_PROGRAM, ["-la", "--", path])
            .map_err(|error| InvokeError::failed(error.status(), error.to_string()))?;
        out.extend_from_slice(&listing);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn registry() -> crate::registry::ModuleRegistry {
        let mut builder = RegistryBuilder::new();
        Listing::register(&mut builder).expect("register");
        builder.finalize().expect("finalize")
    }

    #[test]
    fn lists_root_directory() {
        let registry = registry();
        let module = registry.resolve(b"ls /").expect("resolve");
        let mut out = Vec::new();
        module.invoke(b"/", &mut out).expect("ls runs");
        assert!(!out.is_empty());
    }

    #[rstest]
    #[case::relative(&b"etc"[..])]
    #[case::option(&b"-R /"[..])]
    #[case::shell(&b"/tmp; rm -rf /"[..])]
    fn rejects_unsafe_arguments(#[case] argument: &[u8]) {
        let registry = registry();
        let module = registry.resolve(b"ls ").expect("resolve");
        assert_eq!(
            module.invoke(argument, &mut Vec::new()),
            Err(InvokeError::BadArgument)
        );
    }

    #[test]
    fn missing_directory_reports_failure_status() {
        let registry = registry();
        let module = registry.resolve(b"ls ").expect("resolve");
        let result = module.invoke(b"/customsh/does/not/exist", &mut Vec::new());
        assert!(matches!(result, Err(InvokeError::Failed { status, .. }) if status != 0));
    }
}
