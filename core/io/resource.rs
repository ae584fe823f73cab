// Copyright 2018-2025 the Deno authors. MIT license.

use super::ResourceId;
use crate::Loop;
use std::any::type_name;
use std::borrow::Cow;
use std::rc::Rc;
use std::task::Context;

/// Resources are handles attached to a [`Loop`]. They can only be created
/// with [`Loop::resource`], and they are not thread-safe: they can only be
/// used from the thread the loop lives on.
///
/// Resources are reference counted. The loop keeps one strong reference in
/// its resource table from creation until the close event has been
/// delivered; the caller of `Loop::resource` holds the others.
pub trait Resource: 'static {
  /// Returns a string representation of the resource, used by
  /// [`Loop::walk`] and in log messages. The default implementation returns
  /// the Rust type name.
  fn name(&self) -> Cow<'_, str> {
    type_name::<Self>().into()
  }

  /// Builds a new resource bound to `parent`. Only called by the loop.
  fn create(parent: &Loop, rid: ResourceId) -> Rc<Self>
  where
    Self: Sized;

  fn rid(&self) -> ResourceId;

  /// Whether the resource has work in flight (listening, connecting,
  /// reading, writing) that should keep [`Loop::run`] going.
  fn is_active(&self) -> bool;

  /// Whether an active resource counts towards keeping the loop alive.
  fn has_ref(&self) -> bool {
    true
  }

  fn is_closing(&self) -> bool;

  /// Drives the resource's pending operations against the reactor and
  /// publishes the resulting events. Interest in every operation that cannot
  /// make progress yet must be registered with `cx` before returning.
  ///
  /// Returns true if any event was published.
  fn poll_io(self: Rc<Self>, cx: &mut Context) -> bool;

  /// Releases the underlying socket and schedules the close event.
  fn close(&self);

  /// Delivers the close event. Called once, from the loop's close phase.
  fn finish_close(&self);
}
