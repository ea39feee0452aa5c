//! Socket transport: listener binding, request framing and the readiness
//! loop that drives both.

mod errors;
mod framer;
mod listener;
mod reactor;

pub use self::errors::ListenerError;
pub use self::listener::BoundListener;
pub use self::reactor::{Reactor, ReactorSettings};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
