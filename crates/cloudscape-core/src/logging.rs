//! Logging facilities for Cloudscape core.
//!
//! Cloudscape uses the `tracing` crate for instrumentation. Install a
//! subscriber in the host application to see logs:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! All log statements carry an explicit `target:` from [`targets`] so that
//! hosts can filter by subsystem.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "cloudscape_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "cloudscape_core::signal";
    /// Dispatch context target.
    pub const DISPATCH: &str = "cloudscape_core::dispatch";
    /// Event bus target.
    pub const BUS: &str = "cloudscape_core::bus";
    /// Background load pool target.
    pub const LOADPOOL: &str = "cloudscape_core::loadpool";
}
