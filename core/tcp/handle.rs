// Copyright 2018-2025 the Deno authors. MIT license.

use super::WriteRequest;
use crate::Loop;
use crate::LoopOptions;
use crate::SocketAddress;
use crate::emitter::Emitter;
use crate::emitter::Event;
use crate::error::UvError;
use crate::error::WriteError;
use crate::events::CloseEvent;
use crate::events::ConnectEvent;
use crate::events::DataEvent;
use crate::events::EndEvent;
use crate::events::ErrorEvent;
use crate::events::EventKind;
use crate::events::ListenEvent;
use crate::events::ShutdownEvent;
use crate::events::WriteEvent;
use crate::io::Resource;
use crate::io::ResourceId;
use crate::uv_loop::LoopInner;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::rc::Weak;
use std::task::Context;
use std::task::Poll;
use std::task::ready;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tokio::net::TcpSocket;
use tokio::net::TcpStream;

/// Observable state of a [`TcpHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
  Idle,
  Bound,
  Listening,
  Connecting,
  Connected,
  Closing,
  Closed,
}

/// The one reactor socket a handle owns at any time.
enum Socket {
  None,
  Bound(TcpSocket),
  Listener(TcpListener),
  Stream(TcpStream),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
  None,
  Requested,
  Done,
}

#[derive(Debug, Clone, Copy, Default)]
struct SocketOptions {
  nodelay: bool,
  keepalive: Option<Duration>,
  simultaneous_accepts: bool,
}

impl SocketOptions {
  fn apply(&self, socket: socket2::SockRef<'_>) -> io::Result<()> {
    if self.nodelay {
      socket.set_nodelay(true)?;
    }
    if let Some(delay) = self.keepalive {
      set_keepalive(&socket, Some(delay))?;
    }
    Ok(())
  }
}

fn set_keepalive(
  socket: &socket2::SockRef<'_>,
  delay: Option<Duration>,
) -> io::Result<()> {
  match delay {
    Some(delay) => {
      let params = socket2::TcpKeepalive::new().with_time(delay);
      socket.set_tcp_keepalive(&params)
    }
    None => socket.set_keepalive(false),
  }
}

#[cfg(unix)]
fn sock_ref<S: std::os::fd::AsFd>(socket: &S) -> socket2::SockRef<'_> {
  socket2::SockRef::from(socket)
}

#[cfg(windows)]
fn sock_ref<S: std::os::windows::io::AsSocket>(
  socket: &S,
) -> socket2::SockRef<'_> {
  socket2::SockRef::from(socket)
}

fn new_socket(addr: &SocketAddr) -> io::Result<TcpSocket> {
  let socket = if addr.is_ipv4() {
    TcpSocket::new_v4()?
  } else {
    TcpSocket::new_v6()?
  };
  // Same as libuv: allow rebinding ports in TIME_WAIT on unix.
  #[cfg(unix)]
  socket.set_reuseaddr(true)?;
  Ok(socket)
}

struct TcpInner {
  socket: Socket,
  connect: Option<LocalBoxFuture<'static, io::Result<TcpStream>>>,
  /// Inbound connection handed out by the current `ListenEvent`.
  pending_accept: Option<TcpStream>,
  reading: bool,
  eof: bool,
  write_queue: VecDeque<WriteRequest>,
  shutdown: Shutdown,
  options: SocketOptions,
  has_ref: bool,
  closing: bool,
  closed: bool,
}

impl TcpInner {
  fn check_open(&self) -> Result<(), UvError> {
    if self.closing {
      Err(UvError::BadFd)
    } else {
      Ok(())
    }
  }

  fn stream(&self) -> Option<&TcpStream> {
    match &self.socket {
      Socket::Stream(stream) => Some(stream),
      _ => None,
    }
  }

  /// Drops every reactor registration and queued request.
  fn release(&mut self) {
    self.socket = Socket::None;
    self.connect = None;
    self.pending_accept = None;
    self.reading = false;
    if !self.write_queue.is_empty() {
      log::debug!("dropping {} queued writes", self.write_queue.len());
      self.write_queue.clear();
    }
  }
}

/// An event-driven TCP socket.
///
/// Created with [`Loop::resource`]. Operations return immediately; their
/// outcome is delivered later, from inside [`Loop::run`], as events to the
/// listeners registered with [`TcpHandle::on`].
///
/// ```no_run
/// use uv_tcp::{ConnectEvent, Loop, TcpHandle, WriteEvent};
///
/// let lp = Loop::new().unwrap();
/// let client = lp.resource::<TcpHandle>();
/// client.on::<ConnectEvent>(|_, handle| {
///   handle.write(b"hello".to_vec()).unwrap();
/// });
/// client.on::<WriteEvent>(|_, handle| handle.close());
/// client.connect(("127.0.0.1", 4242)).unwrap();
/// lp.run();
/// ```
pub struct TcpHandle {
  rid: ResourceId,
  parent: Weak<LoopInner>,
  options: LoopOptions,
  emitter: Emitter<TcpHandle>,
  inner: RefCell<TcpInner>,
}

impl TcpHandle {
  pub fn rid(&self) -> ResourceId {
    self.rid
  }

  /// The loop this handle belongs to, unless it has been dropped.
  pub fn parent(&self) -> Option<Loop> {
    self.parent.upgrade().map(Loop::from_inner)
  }

  /// Registers `listener` for events of type `E`. Listeners of the same
  /// type run in registration order.
  pub fn on<E: Event>(&self, listener: impl Fn(&E, &TcpHandle) + 'static) {
    self.emitter.on(listener);
  }

  pub fn has<E: Event>(&self) -> bool {
    self.emitter.has::<E>()
  }

  pub fn reset<E: Event>(&self) {
    self.emitter.reset::<E>();
  }

  pub fn state(&self) -> TcpState {
    let inner = self.inner.borrow();
    if inner.closed {
      return TcpState::Closed;
    }
    if inner.closing {
      return TcpState::Closing;
    }
    match inner.socket {
      Socket::Listener(_) => TcpState::Listening,
      Socket::Stream(_) => TcpState::Connected,
      _ if inner.connect.is_some() => TcpState::Connecting,
      Socket::Bound(_) => TcpState::Bound,
      Socket::None => TcpState::Idle,
    }
  }

  pub fn is_closing(&self) -> bool {
    self.inner.borrow().closing
  }

  pub fn is_active(&self) -> bool {
    let inner = self.inner.borrow();
    !inner.closing
      && (matches!(inner.socket, Socket::Listener(_))
        || inner.connect.is_some()
        || inner.reading
        || !inner.write_queue.is_empty()
        || inner.shutdown == Shutdown::Requested)
  }

  /// Makes the handle keep [`Loop::run`] alive while active (the default).
  pub fn reference(&self) {
    self.inner.borrow_mut().has_ref = true;
  }

  /// Lets [`Loop::run`] return even if this handle is still active.
  pub fn unreference(&self) {
    self.inner.borrow_mut().has_ref = false;
  }

  pub fn has_ref(&self) -> bool {
    self.inner.borrow().has_ref
  }

  /// Binds the handle to a local address. No event is raised.
  pub fn bind(&self, addr: impl Into<SocketAddress>) -> Result<(), UvError> {
    let addr = addr.into().to_socket_addr()?;
    let mut inner = self.inner.borrow_mut();
    inner.check_open()?;
    if !matches!(inner.socket, Socket::None) || inner.connect.is_some() {
      return Err(UvError::Invalid);
    }
    let socket = new_socket(&addr)?;
    inner.options.apply(sock_ref(&socket))?;
    socket.bind(addr)?;
    inner.socket = Socket::Bound(socket);
    log::debug!("tcp#{} bound to {}", self.rid, addr);
    Ok(())
  }

  /// Starts listening with the loop's default backlog.
  pub fn listen(&self) -> Result<(), UvError> {
    self.listen_backlog(self.options.default_backlog)
  }

  /// Starts listening for inbound connections. A [`ListenEvent`] is raised
  /// for each of them; the listener must [`accept`](TcpHandle::accept) it
  /// before returning, or the connection is dropped.
  ///
  /// An unbound handle is bound to `0.0.0.0:0` first.
  pub fn listen_backlog(&self, backlog: u32) -> Result<(), UvError> {
    let parent = self.parent.upgrade().ok_or(UvError::BadFd)?;
    let mut guard = self.inner.borrow_mut();
    let inner = &mut *guard;
    inner.check_open()?;
    if inner.connect.is_some() {
      return Err(UvError::Invalid);
    }
    match &inner.socket {
      Socket::Listener(_) => return Ok(()),
      Socket::Stream(_) => return Err(UvError::Invalid),
      Socket::Bound(_) => {}
      Socket::None => {
        let addr = SocketAddr::from(([0, 0, 0, 0], 0));
        let socket = new_socket(&addr)?;
        inner.options.apply(sock_ref(&socket))?;
        socket.bind(addr)?;
        inner.socket = Socket::Bound(socket);
      }
    }
    if let Socket::Bound(socket) = &inner.socket {
      // tokio's `listen` consumes the socket even when it fails. Listening
      // through a borrowed ref first keeps the handle bound on error.
      let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
      sock_ref(socket).listen(backlog)?;
    }
    let Socket::Bound(socket) =
      std::mem::replace(&mut inner.socket, Socket::None)
    else {
      return Err(UvError::Invalid);
    };
    let listener = {
      let _guard = parent.enter();
      socket.listen(backlog)?
    };
    log::debug!(
      "tcp#{} listening on {:?} (backlog {}, simultaneous accepts {})",
      self.rid,
      listener.local_addr().ok(),
      backlog,
      inner.options.simultaneous_accepts
    );
    inner.socket = Socket::Listener(listener);
    Ok(())
  }

  /// Moves the connection announced by the current [`ListenEvent`] into
  /// `client`, a fresh handle of the same loop.
  ///
  /// Fails with [`UvError::Again`] when no connection is pending, which is
  /// always the case outside of a `ListenEvent` listener.
  pub fn accept(&self, client: &TcpHandle) -> Result<(), UvError> {
    if std::ptr::eq(self, client) || !Weak::ptr_eq(&self.parent, &client.parent)
    {
      return Err(UvError::Invalid);
    }
    self.inner.borrow().check_open()?;
    client.check_adoptable()?;
    let stream = self
      .inner
      .borrow_mut()
      .pending_accept
      .take()
      .ok_or(UvError::Again)?;
    log::debug!(
      "tcp#{} accepted {:?} into tcp#{}",
      self.rid,
      stream.peer_addr().ok(),
      client.rid
    );
    client.adopt(stream);
    Ok(())
  }

  /// Adopts an already connected socket.
  pub fn open(&self, stream: std::net::TcpStream) -> Result<(), UvError> {
    let parent = self.parent.upgrade().ok_or(UvError::BadFd)?;
    self.check_adoptable()?;
    stream.set_nonblocking(true)?;
    let stream = {
      let _guard = parent.enter();
      TcpStream::from_std(stream)?
    };
    self.adopt(stream);
    Ok(())
  }

  fn check_adoptable(&self) -> Result<(), UvError> {
    let inner = self.inner.borrow();
    inner.check_open()?;
    match inner.socket {
      Socket::Stream(_) => Err(UvError::IsConn),
      Socket::Listener(_) | Socket::Bound(_) => Err(UvError::Invalid),
      Socket::None if inner.connect.is_some() => Err(UvError::Already),
      Socket::None => Ok(()),
    }
  }

  fn adopt(&self, stream: TcpStream) {
    let mut inner = self.inner.borrow_mut();
    if let Err(err) = inner.options.apply(sock_ref(&stream)) {
      log::debug!("tcp#{} failed to apply socket options: {}", self.rid, err);
    }
    inner.socket = Socket::Stream(stream);
    inner.eof = false;
    inner.shutdown = Shutdown::None;
  }

  /// Starts connecting to `addr`. Completion is reported with a
  /// [`ConnectEvent`], failure with an [`ErrorEvent`].
  pub fn connect(&self, addr: impl Into<SocketAddress>) -> Result<(), UvError> {
    let addr = addr.into().to_socket_addr()?;
    let mut inner = self.inner.borrow_mut();
    inner.check_open()?;
    if inner.connect.is_some() {
      return Err(UvError::Already);
    }
    let socket = match std::mem::replace(&mut inner.socket, Socket::None) {
      Socket::Bound(socket) => socket,
      Socket::None => {
        let socket = new_socket(&addr)?;
        inner.options.apply(sock_ref(&socket))?;
        socket
      }
      Socket::Stream(stream) => {
        inner.socket = Socket::Stream(stream);
        return Err(UvError::IsConn);
      }
      Socket::Listener(listener) => {
        inner.socket = Socket::Listener(listener);
        return Err(UvError::Invalid);
      }
    };
    log::debug!("tcp#{} connecting to {}", self.rid, addr);
    inner.connect = Some(socket.connect(addr).boxed_local());
    Ok(())
  }

  /// Starts reading. Every chunk is delivered as a [`DataEvent`]; an
  /// [`EndEvent`] follows once the peer shuts down its write side.
  pub fn read(&self) -> Result<(), UvError> {
    let mut inner = self.inner.borrow_mut();
    inner.check_open()?;
    if inner.stream().is_none() {
      return Err(UvError::NotConn);
    }
    if inner.eof {
      return Err(UvError::Eof);
    }
    if inner.reading {
      return Err(UvError::Already);
    }
    inner.reading = true;
    Ok(())
  }

  /// Stops reading. Data arriving meanwhile stays in the kernel buffer.
  pub fn stop(&self) {
    self.inner.borrow_mut().reading = false;
  }

  /// Queues `data` to be written. The handle owns the buffer from now on; a
  /// [`WriteEvent`] is raised once it has been written, an [`ErrorEvent`] if
  /// that fails. Writes complete in the order they were queued.
  ///
  /// On immediate failure the buffer is handed back inside the error.
  pub fn write(&self, data: impl Into<Vec<u8>>) -> Result<(), WriteError> {
    let data = data.into();
    let mut inner = self.inner.borrow_mut();
    let rejected = if inner.closing {
      Some(UvError::BadFd)
    } else if inner.shutdown != Shutdown::None {
      Some(UvError::Pipe)
    } else if inner.stream().is_none() && inner.connect.is_none() {
      Some(UvError::NotConn)
    } else {
      None
    };
    if let Some(error) = rejected {
      return Err(WriteError::new(error, data));
    }
    log::trace!("tcp#{} queued write of {} bytes", self.rid, data.len());
    inner.write_queue.push_back(WriteRequest::new(data));
    Ok(())
  }

  /// Writes as much of `data` as the socket accepts right now, bypassing
  /// the write queue. Returns the number of bytes written; no event is
  /// raised either way.
  ///
  /// Fails with [`UvError::Again`] while queued writes are pending.
  pub fn try_write(&self, data: &[u8]) -> Result<usize, UvError> {
    let inner = self.inner.borrow();
    inner.check_open()?;
    if inner.shutdown != Shutdown::None {
      return Err(UvError::Pipe);
    }
    let stream = inner.stream().ok_or(UvError::NotConn)?;
    if !inner.write_queue.is_empty() {
      return Err(UvError::Again);
    }
    Ok(stream.try_write(data)?)
  }

  /// Shuts down the write side once every queued write is done, then raises
  /// a [`ShutdownEvent`].
  pub fn shutdown(&self) -> Result<(), UvError> {
    let mut inner = self.inner.borrow_mut();
    inner.check_open()?;
    if inner.stream().is_none() {
      return Err(UvError::NotConn);
    }
    if inner.shutdown != Shutdown::None {
      return Err(UvError::Already);
    }
    inner.shutdown = Shutdown::Requested;
    Ok(())
  }

  /// Closes the handle. In-flight operations are abandoned without further
  /// events; a single [`CloseEvent`] follows in the loop's close phase.
  /// Calling it again before that is a no-op.
  pub fn close(&self) {
    {
      let mut inner = self.inner.borrow_mut();
      if inner.closing {
        return;
      }
      inner.closing = true;
      inner.release();
    }
    log::debug!("tcp#{} closing", self.rid);
    match self.parent.upgrade() {
      Some(parent) => parent.close_later(self.rid),
      None => self.finish_close(),
    }
  }

  /// Closes the connection with a reset (RST) instead of a FIN.
  pub fn close_reset(&self) -> Result<(), UvError> {
    {
      let inner = self.inner.borrow();
      inner.check_open()?;
      let stream = inner.stream().ok_or(UvError::NotConn)?;
      sock_ref(stream).set_linger(Some(Duration::ZERO))?;
    }
    self.close();
    Ok(())
  }

  pub fn writable(&self) -> bool {
    let inner = self.inner.borrow();
    !inner.closing && inner.stream().is_some() && inner.shutdown == Shutdown::None
  }

  pub fn readable(&self) -> bool {
    let inner = self.inner.borrow();
    !inner.closing && inner.stream().is_some() && !inner.eof
  }

  /// Enables or disables Nagle's algorithm. Also applies to sockets the
  /// handle creates later.
  pub fn no_delay(&self, enable: bool) -> bool {
    self.set_option(|options| options.nodelay = enable, |socket| {
      socket.set_nodelay(enable)
    })
  }

  /// Enables TCP keep-alive with the given initial delay, or disables it.
  pub fn keep_alive(&self, enable: bool, delay: Duration) -> bool {
    let delay = enable.then_some(delay);
    self.set_option(|options| options.keepalive = delay, |socket| {
      set_keepalive(&socket, delay)
    })
  }

  /// Only meaningful on Windows, where libuv queues several accepts at
  /// once. Recorded and otherwise ignored.
  pub fn simultaneous_accepts(&self, enable: bool) -> bool {
    self.set_option(
      |options| options.simultaneous_accepts = enable,
      |_| Ok(()),
    )
  }

  fn set_option(
    &self,
    record: impl FnOnce(&mut SocketOptions),
    apply: impl FnOnce(socket2::SockRef<'_>) -> io::Result<()>,
  ) -> bool {
    let mut inner = self.inner.borrow_mut();
    if inner.closing {
      return false;
    }
    record(&mut inner.options);
    let result = match &inner.socket {
      Socket::None => Ok(()),
      Socket::Bound(socket) => apply(sock_ref(socket)),
      Socket::Listener(listener) => apply(sock_ref(listener)),
      Socket::Stream(stream) => apply(sock_ref(stream)),
    };
    match result {
      Ok(()) => true,
      Err(err) => {
        log::debug!("tcp#{} failed to set socket option: {}", self.rid, err);
        false
      }
    }
  }

  /// Local address, or the empty address if there is none.
  pub fn sock(&self) -> SocketAddress {
    let inner = self.inner.borrow();
    let addr = match &inner.socket {
      Socket::Bound(socket) => socket.local_addr().ok(),
      Socket::Listener(listener) => listener.local_addr().ok(),
      Socket::Stream(stream) => stream.local_addr().ok(),
      Socket::None => None,
    };
    addr.map(SocketAddress::from).unwrap_or_default()
  }

  /// Remote address, or the empty address if not connected.
  pub fn peer(&self) -> SocketAddress {
    let inner = self.inner.borrow();
    inner
      .stream()
      .and_then(|stream| stream.peer_addr().ok())
      .map(SocketAddress::from)
      .unwrap_or_default()
  }

  /// Number of bytes queued by [`TcpHandle::write`] and not written yet.
  pub fn write_queue_size(&self) -> usize {
    let inner = self.inner.borrow();
    inner.write_queue.iter().map(|req| req.remaining().len()).sum()
  }

  /// Publishes `event` unless the handle is closing. Only the close event
  /// may be published after `close()`.
  fn emit<E: Event>(&self, event: E) {
    if E::KIND != EventKind::Close && self.is_closing() {
      log::trace!("tcp#{} dropping {:?} event after close", self.rid, E::KIND);
      return;
    }
    log::trace!("tcp#{} {:?}", self.rid, E::KIND);
    self.emitter.publish(&event, self);
  }

  fn emit_error(&self, error: UvError) {
    if !self.emitter.has::<ErrorEvent>() && !self.is_closing() {
      log::debug!("tcp#{} unhandled error: {}", self.rid, error);
    }
    self.emit(ErrorEvent::new(error));
  }

  fn poll_connect(self: &Rc<Self>, cx: &mut Context) -> bool {
    let result = {
      let mut inner = self.inner.borrow_mut();
      let Some(future) = inner.connect.as_mut() else {
        return false;
      };
      match future.poll_unpin(cx) {
        Poll::Pending => return false,
        Poll::Ready(result) => {
          inner.connect = None;
          result
        }
      }
    };
    match result {
      Ok(stream) => {
        log::debug!(
          "tcp#{} connected to {:?}",
          self.rid,
          stream.peer_addr().ok()
        );
        self.adopt(stream);
        self.emit(ConnectEvent);
      }
      Err(err) => {
        log::debug!("tcp#{} connect failed: {}", self.rid, err);
        let canceled = std::mem::take(&mut self.inner.borrow_mut().write_queue);
        self.emit_error(UvError::from(err));
        // Queued writes fail on the next iteration, after the connect error.
        if let Some(parent) = self.parent.upgrade() {
          for req in canceled {
            let this = self.clone();
            parent.defer(Box::new(move || {
              drop(req);
              this.emit_error(UvError::Canceled);
            }));
          }
        }
      }
    }
    true
  }

  fn poll_listen(&self, cx: &mut Context) -> bool {
    let mut progressed = false;
    loop {
      let accepted = {
        let inner = self.inner.borrow();
        let Socket::Listener(listener) = &inner.socket else {
          return progressed;
        };
        listener.poll_accept(cx)
      };
      match accepted {
        Poll::Pending => return progressed,
        Poll::Ready(Ok((stream, peer))) => {
          progressed = true;
          self.inner.borrow_mut().pending_accept = Some(stream);
          self.emit(ListenEvent);
          let unaccepted = self.inner.borrow_mut().pending_accept.take();
          if unaccepted.is_some() {
            log::debug!(
              "tcp#{} connection from {} was not accepted, dropping",
              self.rid,
              peer
            );
          }
          if self.is_closing() {
            return progressed;
          }
        }
        Poll::Ready(Err(err)) => {
          self.emit_error(UvError::from(err));
          return true;
        }
      }
    }
  }

  fn poll_read(&self, cx: &mut Context) -> bool {
    let mut progressed = false;
    for _ in 0..self.options.max_reads_per_tick {
      let outcome = {
        let inner = self.inner.borrow();
        if !inner.reading {
          return progressed;
        }
        let Some(stream) = inner.stream() else {
          return progressed;
        };
        poll_read_chunk(stream, cx, self.options.read_buffer_size)
      };
      match outcome {
        Poll::Pending => return progressed,
        Poll::Ready(Ok(data)) if data.is_empty() => {
          {
            let mut inner = self.inner.borrow_mut();
            inner.reading = false;
            inner.eof = true;
          }
          self.emit(EndEvent);
          return true;
        }
        Poll::Ready(Ok(data)) => {
          progressed = true;
          self.emit(DataEvent { data });
        }
        Poll::Ready(Err(err)) => {
          self.inner.borrow_mut().reading = false;
          self.emit_error(UvError::from(err));
          return true;
        }
      }
    }
    // Budget exhausted with data possibly still buffered.
    cx.waker().wake_by_ref();
    progressed
  }

  fn poll_write(&self, cx: &mut Context) -> bool {
    let mut progressed = false;
    loop {
      let outcome = {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Socket::Stream(stream) = &inner.socket else {
          return progressed;
        };
        let Some(req) = inner.write_queue.front_mut() else {
          return progressed;
        };
        match req.poll_flush(stream, cx) {
          Poll::Pending => return progressed,
          Poll::Ready(result) => {
            inner.write_queue.pop_front();
            result
          }
        }
      };
      progressed = true;
      match outcome {
        Ok(()) => self.emit(WriteEvent),
        Err(err) => self.emit_error(UvError::from(err)),
      }
      if self.is_closing() {
        return progressed;
      }
    }
  }

  fn poll_shutdown(&self, cx: &mut Context) -> bool {
    let result = {
      let mut guard = self.inner.borrow_mut();
      let inner = &mut *guard;
      if inner.shutdown != Shutdown::Requested || !inner.write_queue.is_empty()
      {
        return false;
      }
      let Socket::Stream(stream) = &mut inner.socket else {
        return false;
      };
      match Pin::new(stream).poll_shutdown(cx) {
        Poll::Pending => return false,
        Poll::Ready(result) => {
          inner.shutdown = Shutdown::Done;
          result
        }
      }
    };
    match result {
      Ok(()) => self.emit(ShutdownEvent),
      Err(err) => self.emit_error(UvError::from(err)),
    }
    true
  }
}

/// Reads one chunk once the stream is readable. An empty chunk means EOF.
fn poll_read_chunk(
  stream: &TcpStream,
  cx: &mut Context,
  size: usize,
) -> Poll<io::Result<Bytes>> {
  ready!(stream.poll_read_ready(cx))?;
  let mut chunk = vec![0u8; size];
  loop {
    match stream.try_read(&mut chunk) {
      Ok(n) => {
        chunk.truncate(n);
        return Poll::Ready(Ok(Bytes::from(chunk)));
      }
      Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
        ready!(stream.poll_read_ready(cx))?;
      }
      Err(e) => return Poll::Ready(Err(e)),
    }
  }
}

impl Resource for TcpHandle {
  fn name(&self) -> Cow<'_, str> {
    Cow::Borrowed("tcp")
  }

  fn create(parent: &Loop, rid: ResourceId) -> Rc<Self> {
    Rc::new(Self {
      rid,
      parent: parent.downgrade(),
      options: *parent.options(),
      emitter: Emitter::default(),
      inner: RefCell::new(TcpInner {
        socket: Socket::None,
        connect: None,
        pending_accept: None,
        reading: false,
        eof: false,
        write_queue: VecDeque::new(),
        shutdown: Shutdown::None,
        options: SocketOptions::default(),
        has_ref: true,
        closing: false,
        closed: false,
      }),
    })
  }

  fn rid(&self) -> ResourceId {
    self.rid
  }

  fn is_active(&self) -> bool {
    TcpHandle::is_active(self)
  }

  fn has_ref(&self) -> bool {
    TcpHandle::has_ref(self)
  }

  fn is_closing(&self) -> bool {
    TcpHandle::is_closing(self)
  }

  fn poll_io(self: Rc<Self>, cx: &mut Context) -> bool {
    let mut progressed = self.poll_connect(cx);
    progressed |= self.poll_listen(cx);
    progressed |= self.poll_read(cx);
    progressed |= self.poll_write(cx);
    progressed |= self.poll_shutdown(cx);
    progressed
  }

  fn close(&self) {
    TcpHandle::close(self)
  }

  fn finish_close(&self) {
    {
      let mut inner = self.inner.borrow_mut();
      if inner.closed {
        return;
      }
      inner.closed = true;
    }
    self.emit(CloseEvent);
    // Listeners often capture other handles or the loop; dropping them
    // breaks those cycles.
    self.emitter.reset_all();
  }
}

impl std::fmt::Debug for TcpHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TcpHandle")
      .field("rid", &self.rid)
      .field("state", &self.state())
      .finish()
  }
}
