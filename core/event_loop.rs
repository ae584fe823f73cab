// Copyright 2018-2025 the Deno authors. MIT license.

//! Phase-based event loop matching libuv's architecture.
//!
//! Each iteration of the event loop runs these phases **in order**:
//!
//! ```text
//! ┌───────────────────────────────┐
//! │     pending callbacks         │  ← Completions deferred from the previous iteration
//! ├───────────────────────────────┤
//! │          poll                 │  ← Poll the reactor for every resource, publish I/O events
//! ├───────────────────────────────┤
//! │      close callbacks          │  ← Close events, resource table cleanup
//! └───────────────────────────────┘
//! ```

use std::collections::VecDeque;

/// Phase identifiers for the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLoopPhase {
  /// Phase 1: Execute callbacks deferred from the previous iteration.
  PendingCallbacks,
  /// Phase 2: Poll the reactor and drive every resource.
  Poll,
  /// Phase 3: Execute close callbacks (resource cleanup).
  CloseCallbacks,
}

impl EventLoopPhase {
  /// Returns all phases in execution order.
  pub const fn all() -> &'static [EventLoopPhase] {
    &[
      EventLoopPhase::PendingCallbacks,
      EventLoopPhase::Poll,
      EventLoopPhase::CloseCallbacks,
    ]
  }
}

/// Pending callback deferred from a previous iteration (I/O result).
pub(crate) struct PendingCallback {
  pub callback: Box<dyn FnOnce()>,
}

/// Close callback for resource cleanup.
pub(crate) struct CloseCallback {
  pub callback: Box<dyn FnOnce()>,
}

/// Phase-specific state for the event loop.
#[derive(Default)]
pub(crate) struct EventLoopPhases {
  /// Phase 1: Callbacks deferred from previous iteration.
  pub pending_callbacks: VecDeque<PendingCallback>,
  /// Phase 3: Close callbacks.
  pub close_callbacks: VecDeque<CloseCallback>,
}

impl EventLoopPhases {
  /// Takes the callbacks queued so far. Callbacks queued while these run
  /// belong to the next iteration.
  pub fn take_pending_callbacks(&mut self) -> VecDeque<PendingCallback> {
    std::mem::take(&mut self.pending_callbacks)
  }

  /// Takes the close callbacks queued so far.
  pub fn take_close_callbacks(&mut self) -> VecDeque<CloseCallback> {
    std::mem::take(&mut self.close_callbacks)
  }

  /// Returns true if there is any pending work in the phase queues.
  pub fn has_pending_work(&self) -> bool {
    !self.pending_callbacks.is_empty() || !self.close_callbacks.is_empty()
  }
}

/// Run mode for the event loop, matching libuv's `uv_run_mode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub enum RunMode {
  /// Run the event loop until there are no more active handles/requests.
  #[default]
  Default = 0,
  /// Run a single iteration of the event loop, waiting for progress.
  Once = 1,
  /// Run a single iteration without blocking for I/O.
  NoWait = 2,
}
