//! Core systems for Cloudscape.
//!
//! This crate provides the foundational components of the Cloudscape
//! explorer engine, with no knowledge of the resource domain:
//!
//! - **Signal/Slot System**: Type-safe observer registry with per-slot
//!   fault isolation
//! - **Dispatch Context**: A dedicated thread serializing all tree-state
//!   mutations, with blocking cross-thread hand-off
//! - **Event Bus**: Topic-based publish/subscribe for loosely coupled
//!   components
//! - **Load Pool**: Background execution for children fetches, with
//!   cooperative cancellation
//!
//! # Signal/Slot Example
//!
//! ```
//! use cloudscape_core::Signal;
//!
//! let state_changed = Signal::<i32>::new();
//!
//! let conn_id = state_changed.connect(|value| {
//!     println!("state changed to: {}", value);
//! });
//!
//! state_changed.emit(42);
//! state_changed.disconnect(conn_id);
//! ```
//!
//! # Dispatch Example
//!
//! ```
//! use cloudscape_core::Dispatcher;
//!
//! let dispatcher = Dispatcher::spawn("explorer-ui");
//!
//! // Fire-and-forget
//! dispatcher.post(|| println!("applied on the dispatch thread"));
//!
//! // Blocking hand-off with a result
//! let n = dispatcher.invoke(|| 2 + 2).unwrap();
//! assert_eq!(n, 4);
//!
//! dispatcher.stop_and_join();
//! ```

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod loadpool;
pub mod logging;
pub mod signal;

pub use bus::{EventBus, Payload, SubscriptionId, topics};
pub use dispatch::{DispatchAffinity, Dispatcher};
pub use error::{CoreError, CoreResult, DispatchError, DispatchResult};
pub use loadpool::{CancellationToken, LoadPool};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
