//! Logging for the client service.
//!
//! Events go through `tracing` under the single target "widecol" and always
//! carry `component` and `event` fields. The crate never installs a
//! subscriber; the host application does.

/// Target for all client-service log events.
pub(crate) const TARGET: &str = "widecol";

macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
