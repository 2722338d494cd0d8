//! Logging targets for the explorer engine.
//!
//! See `cloudscape_core::logging` for how to install a subscriber.

/// Target names for log filtering.
pub mod targets {
    /// Resource node model target.
    pub const MODEL: &str = "cloudscape::model";
    /// Tree mirror target.
    pub const MIRROR: &str = "cloudscape::mirror";
    /// Synchronizer target.
    pub const SYNC: &str = "cloudscape::sync";
    /// Action and menu target.
    pub const ACTION: &str = "cloudscape::action";
    /// Session target.
    pub const SESSION: &str = "cloudscape::session";
}
