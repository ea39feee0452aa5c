//! Overlapping prefixes used to exercise longest-prefix resolution from a
//! client.

use crate::registry::{Args, HandlerResult, RegistryBuilder};

/// Prefixes bound by [`PrefixProbe`], longest first.
pub const PROBE_PREFIXES: [&str; 3] = ["this is a prefix ", "a-this is a ", "this is a "];

/// Replies with `[prefix] [query]` so clients can see which entry matched.
#[derive(Debug, Default)]
pub struct PrefixProbe;

impl PrefixProbe {
    /// Binds every probe prefix to the same guarded handler.
    pub fn register(registry: &mut RegistryBuilder) {
        let mut binder = registry.guarded(Self);
        for prefix in PROBE_PREFIXES {
            binder.bind(prefix, Self::report);
        }
    }

    fn report(&mut self, args: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
        out.push(b'[');
        out.extend_from_slice(args.prefix());
        out.extend_from_slice(b"] [");
        out.extend_from_slice(args.query());
        out.push(b']');
        Ok(())
    }
}
