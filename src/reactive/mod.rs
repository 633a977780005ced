//! Reactive state: mutation-observing handles and frame scheduling.
//!
//! - [`ReactiveHandle`] — lazy, idempotent wrapper over the state graph;
//!   every write notifies a callback with the full dotted key path.
//! - [`FrameScheduler`] — single-slot, latest-wins debounce to the next
//!   frame boundary.

pub mod handle;
pub mod scheduler;

pub use handle::{join_path, Change, ReactiveHandle, Reading};
pub use scheduler::FrameScheduler;
