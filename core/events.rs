// Copyright 2018-2025 the Deno authors. MIT license.

//! Events raised by a [`TcpHandle`](crate::TcpHandle).
//!
//! Listeners are registered per event type with
//! [`TcpHandle::on`](crate::TcpHandle::on) and always run on the loop
//! thread, from inside [`Loop::run`](crate::Loop::run).

use crate::error::UvError;
use bytes::Bytes;

/// Discriminant of every event type, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  Error,
  Connect,
  Listen,
  Write,
  Data,
  End,
  Shutdown,
  Close,
}

/// An asynchronous failure: a refused connect, a failed write, a read error.
///
/// The handle stays usable; closing it is up to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEvent {
  error: UvError,
}

impl ErrorEvent {
  pub(crate) fn new(error: UvError) -> Self {
    Self { error }
  }

  pub fn error(&self) -> UvError {
    self.error
  }

  /// The libuv status code, always negative.
  pub fn code(&self) -> i32 {
    self.error.code()
  }

  pub fn name(&self) -> &'static str {
    self.error.name()
  }

  pub fn what(&self) -> String {
    self.error.to_string()
  }
}

/// The connection started by `connect` is established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectEvent;

/// A listening handle has an inbound connection ready for `accept`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenEvent;

/// A queued write has been fully handed to the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteEvent;

/// A chunk of bytes read from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEvent {
  pub data: Bytes,
}

impl DataEvent {
  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

/// The peer shut down its write side (FIN received). Reading stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndEvent;

/// Our write side has been shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownEvent;

/// The handle has been closed. Always the last event of a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseEvent;
