// Copyright 2018-2025 the Deno authors. MIT license.

use std::io;
use std::task::Context;
use std::task::Poll;
use std::task::ready;
use tokio::net::TcpStream;

/// Queued write operation waiting for the socket to become writable.
///
/// Owns the caller's buffer from `TcpHandle::write` until the data has been
/// fully handed to the kernel, the write failed, or the handle was closed.
/// The buffer is released exactly once, when the request is dropped.
pub(crate) struct WriteRequest {
  data: Vec<u8>,
  offset: usize,
}

impl WriteRequest {
  pub fn new(data: Vec<u8>) -> Self {
    Self { data, offset: 0 }
  }

  /// Bytes not yet written.
  pub fn remaining(&self) -> &[u8] {
    &self.data[self.offset..]
  }

  pub fn advance(&mut self, n: usize) {
    self.offset = (self.offset + n).min(self.data.len());
  }

  pub fn is_complete(&self) -> bool {
    self.offset >= self.data.len()
  }

  /// Writes as much of the buffer as the socket accepts. Resolves once the
  /// whole buffer is written; interest in writability is registered with
  /// `cx` otherwise.
  pub fn poll_flush(
    &mut self,
    stream: &TcpStream,
    cx: &mut Context,
  ) -> Poll<io::Result<()>> {
    loop {
      if self.is_complete() {
        return Poll::Ready(Ok(()));
      }
      ready!(stream.poll_write_ready(cx))?;
      match stream.try_write(self.remaining()) {
        Ok(0) => {
          return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
        }
        Ok(n) => self.advance(n),
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
        Err(e) => return Poll::Ready(Err(e)),
      }
    }
  }
}

impl std::fmt::Debug for WriteRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WriteRequest")
      .field("len", &self.data.len())
      .field("offset", &self.offset)
      .finish()
  }
}
