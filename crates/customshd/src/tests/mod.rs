//! Behavioural suites for the daemon.

mod support;
