// Copyright 2018-2025 the Deno authors. MIT license.

use crate::CloseEvent;
use crate::ConnectEvent;
use crate::DataEvent;
use crate::EndEvent;
use crate::ErrorEvent;
use crate::ListenEvent;
use crate::Loop;
use crate::ShutdownEvent;
use crate::SocketAddress;
use crate::TcpHandle;
use crate::TcpState;
use crate::UvError;
use crate::WriteEvent;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

fn counter() -> Rc<Cell<usize>> {
  Rc::new(Cell::new(0))
}

/// Listens on an ephemeral loopback port and accepts exactly one
/// connection. `setup` registers listeners on the accepted socket before it
/// starts reading.
fn serve_once(
  lp: &Loop,
  setup: impl Fn(&TcpHandle) + 'static,
) -> (Rc<TcpHandle>, SocketAddress) {
  let server = lp.resource::<TcpHandle>();
  server.bind(("127.0.0.1", 0)).unwrap();
  server.listen().unwrap();
  server.on::<ListenEvent>(move |_, srv| {
    let socket = srv.parent().unwrap().resource::<TcpHandle>();
    setup(&socket);
    srv.accept(&socket).unwrap();
    socket.read().unwrap();
    srv.close();
  });
  let addr = server.sock();
  (server, addr)
}

/// Counts every `ErrorEvent` raised on `handle`.
fn count_errors(handle: &TcpHandle, errors: &Rc<Cell<usize>>) {
  let e = errors.clone();
  handle.on::<ErrorEvent>(move |ev, _| {
    log::debug!("unexpected error: {}", ev.what());
    e.set(e.get() + 1);
  });
}

/// An address nothing listens on.
fn closed_port() -> SocketAddress {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  SocketAddress::from(listener.local_addr().unwrap())
}

// 1. Socket options on a fresh handle
#[test]
fn test_options_on_fresh_handle() {
  let lp = Loop::new().unwrap();
  let handle = lp.resource::<TcpHandle>();
  let errors = counter();
  let closes = counter();
  let e = errors.clone();
  handle.on::<ErrorEvent>(move |_, _| e.set(e.get() + 1));
  let c = closes.clone();
  handle.on::<CloseEvent>(move |_, _| c.set(c.get() + 1));

  assert!(handle.no_delay(true));
  assert!(handle.keep_alive(true, Duration::from_secs(1)));
  assert!(handle.simultaneous_accepts(true));
  handle.close();
  assert!(!handle.no_delay(false));

  assert!(!lp.run());
  assert_eq!(errors.get(), 0);
  assert_eq!(closes.get(), 1);
}

// 2. try_write + write round trip on a fixed port
#[test]
fn test_read_write() {
  let lp = Loop::new().unwrap();
  let received = Rc::new(RefCell::new(Vec::new()));
  let errors = counter();
  let literal = SocketAddress::new("127.0.0.1", 4242);

  let server = lp.resource::<TcpHandle>();
  count_errors(&server, &errors);
  server.bind(("127.0.0.1", 4242)).unwrap();
  server.listen().unwrap();
  assert_eq!(server.sock(), literal);
  let r = received.clone();
  let e = errors.clone();
  server.on::<ListenEvent>(move |_, srv| {
    let socket = srv.parent().unwrap().resource::<TcpHandle>();
    count_errors(&socket, &e);
    let r = r.clone();
    socket.on::<DataEvent>(move |ev, _| r.borrow_mut().extend_from_slice(&ev.data));
    socket.on::<EndEvent>(|_, s| s.close());
    assert_eq!(srv.accept(&socket), Ok(()));
    assert_eq!(socket.read(), Ok(()));
    srv.close();
  });

  let client = lp.resource::<TcpHandle>();
  count_errors(&client, &errors);
  let peer = Rc::new(RefCell::new(None));
  let p = peer.clone();
  client.on::<ConnectEvent>(move |_, c| {
    *p.borrow_mut() = Some(c.peer());
    assert!(c.writable());
    assert_eq!(c.try_write(b"a"), Ok(1));
    assert!(c.write(b"bc".to_vec()).is_ok());
  });
  client.on::<WriteEvent>(|_, c| c.close());
  client.connect(("127.0.0.1", 4242)).unwrap();

  lp.run();
  assert_eq!(received.borrow().as_slice(), b"abc");
  assert_eq!(*peer.borrow(), Some(literal));
  assert_eq!(errors.get(), 0);
  assert_eq!(lp.resource_count(), 0);
}

// 3. Local and remote addresses
#[test]
fn test_sock_peer() {
  let lp = Loop::new().unwrap();
  let errors = counter();
  let e = errors.clone();
  let (server, addr) = serve_once(&lp, move |socket| {
    count_errors(socket, &e);
    socket.on::<EndEvent>(|_, s| s.close());
  });
  count_errors(&server, &errors);
  assert_eq!(addr.ip, "127.0.0.1");
  assert_ne!(addr.port, 0);
  assert_eq!(server.state(), TcpState::Listening);
  assert_eq!(server.peer(), SocketAddress::default());

  let peer = Rc::new(RefCell::new(None));
  let client = lp.resource::<TcpHandle>();
  count_errors(&client, &errors);
  let p = peer.clone();
  client.on::<ConnectEvent>(move |_, c| {
    *p.borrow_mut() = Some((c.sock(), c.peer()));
    c.close();
  });
  client.connect(addr.clone()).unwrap();
  assert_eq!(client.state(), TcpState::Connecting);

  lp.run();
  let (sock, peer) = peer.borrow_mut().take().unwrap();
  assert_eq!(peer, addr);
  assert_eq!(sock.ip, "127.0.0.1");
  assert_ne!(sock.port, addr.port);
  assert_eq!(client.state(), TcpState::Closed);
  assert_eq!(errors.get(), 0);
}

// 4. Half-close: one shutdown on the client, one end on the server
#[test]
fn test_shutdown() {
  let lp = Loop::new().unwrap();
  let ends = counter();
  let shutdowns = counter();

  let errors = counter();

  let e = ends.clone();
  let err = errors.clone();
  let (server, addr) = serve_once(&lp, move |socket| {
    count_errors(socket, &err);
    let e = e.clone();
    socket.on::<EndEvent>(move |_, s| {
      e.set(e.get() + 1);
      assert!(!s.readable());
      s.close();
    });
  });

  count_errors(&server, &errors);

  let client = lp.resource::<TcpHandle>();
  count_errors(&client, &errors);
  client.on::<ConnectEvent>(|_, c| {
    assert_eq!(c.shutdown(), Ok(()));
    assert_eq!(c.shutdown(), Err(UvError::Already));
    assert!(!c.writable());
    assert_eq!(c.write(b"late".to_vec()).unwrap_err().error(), UvError::Pipe);
  });
  let s = shutdowns.clone();
  client.on::<ShutdownEvent>(move |_, c| {
    s.set(s.get() + 1);
    c.close();
  });
  client.connect(addr).unwrap();

  lp.run();
  assert_eq!(shutdowns.get(), 1);
  assert_eq!(ends.get(), 1);
  assert_eq!(errors.get(), 0);
}

// 5. Writes on a closed handle fail synchronously and return the buffer
#[test]
fn test_write_after_close() {
  let lp = Loop::new().unwrap();
  let handle = lp.resource::<TcpHandle>();
  let events = Rc::new(RefCell::new(Vec::new()));
  let ev = events.clone();
  handle.on::<WriteEvent>(move |_, _| ev.borrow_mut().push("write"));
  let ev = events.clone();
  handle.on::<ErrorEvent>(move |_, _| ev.borrow_mut().push("error"));
  let ev = events.clone();
  handle.on::<CloseEvent>(move |_, _| ev.borrow_mut().push("close"));
  handle.close();

  let err = handle.write(b"data".to_vec()).unwrap_err();
  assert_eq!(err.error(), UvError::BadFd);
  assert!(err.code() < 0);
  assert_eq!(err.into_inner(), b"data".to_vec());

  let err = handle.write(Vec::new()).unwrap_err();
  assert_eq!(err.error(), UvError::BadFd);
  assert!(err.into_inner().is_empty());

  let res = handle.try_write(b"data");
  assert_eq!(res, Err(UvError::BadFd));
  assert!(res.unwrap_err().code() < 0);
  assert_eq!(handle.try_write(&[]), Err(UvError::BadFd));
  assert!(events.borrow().is_empty());

  lp.run();
  assert_eq!(*events.borrow(), vec!["close"]);
}

// 6. Close fires once, last, and only once
#[test]
fn test_close_is_last_and_idempotent() {
  let lp = Loop::new().unwrap();
  let handle = lp.resource::<TcpHandle>();
  let events = Rc::new(RefCell::new(Vec::new()));
  let ev = events.clone();
  handle.on::<ErrorEvent>(move |_, _| ev.borrow_mut().push("error"));
  let ev = events.clone();
  handle.on::<CloseEvent>(move |_, h| {
    assert!(h.is_closing());
    ev.borrow_mut().push("close");
  });

  handle.bind(("127.0.0.1", 0)).unwrap();
  assert_eq!(handle.state(), TcpState::Bound);
  handle.close();
  handle.close();
  assert_eq!(handle.state(), TcpState::Closing);
  assert!(!handle.is_active());
  assert_eq!(handle.sock(), SocketAddress::default());

  lp.run();
  handle.close();
  lp.run();
  assert_eq!(*events.borrow(), vec!["close"]);
  assert_eq!(handle.state(), TcpState::Closed);
  // Listeners are dropped once the close event is out.
  assert!(!handle.has::<CloseEvent>());
}

// 7. A refused connect is reported as an error event
#[test]
fn test_connect_refused() {
  let lp = Loop::new().unwrap();
  let client = lp.resource::<TcpHandle>();
  let errors = Rc::new(RefCell::new(Vec::new()));
  let e = errors.clone();
  client.on::<ErrorEvent>(move |ev, c| {
    e.borrow_mut().push(ev.error());
    c.close();
  });
  let connects = counter();
  let c = connects.clone();
  client.on::<ConnectEvent>(move |_, _| c.set(c.get() + 1));

  client.connect(closed_port()).unwrap();
  assert_eq!(client.connect(closed_port()), Err(UvError::Already));
  client.write(b"never".to_vec()).unwrap();

  lp.run();
  assert_eq!(connects.get(), 0);
  // The queued write is canceled, but the close from the first error
  // listener suppresses its event.
  assert_eq!(*errors.borrow(), vec![UvError::ConnRefused]);
}

// 8. Queued writes complete in order
#[test]
fn test_writes_are_fifo() {
  let lp = Loop::new().unwrap();
  let received = Rc::new(RefCell::new(Vec::new()));
  let r = received.clone();
  let (_server, addr) = serve_once(&lp, move |socket| {
    let r = r.clone();
    socket.on::<DataEvent>(move |ev, _| r.borrow_mut().extend_from_slice(&ev.data));
    socket.on::<EndEvent>(|_, s| s.close());
  });

  let client = lp.resource::<TcpHandle>();
  client.connect(addr).unwrap();
  for chunk in ["one", "two", "three"] {
    client.write(chunk).unwrap();
  }
  assert_eq!(client.write_queue_size(), 11);
  assert!(client.is_active());

  let writes = counter();
  let w = writes.clone();
  client.on::<WriteEvent>(move |_, c| {
    w.set(w.get() + 1);
    if w.get() == 3 {
      assert_eq!(c.write_queue_size(), 0);
      c.close();
    }
  });

  lp.run();
  assert_eq!(writes.get(), 3);
  assert_eq!(received.borrow().as_slice(), b"onetwothree");
}

// 9. Closing in the connect callback abandons queued writes silently
#[test]
fn test_close_in_connect_callback() {
  let lp = Loop::new().unwrap();
  let (_server, addr) = serve_once(&lp, |socket| {
    socket.on::<EndEvent>(|_, s| s.close());
  });

  let client = lp.resource::<TcpHandle>();
  let events = Rc::new(RefCell::new(Vec::new()));
  let ev = events.clone();
  client.on::<ConnectEvent>(move |_, c| {
    ev.borrow_mut().push("connect");
    c.close();
  });
  let ev = events.clone();
  client.on::<WriteEvent>(move |_, _| ev.borrow_mut().push("write"));
  let ev = events.clone();
  client.on::<ErrorEvent>(move |_, _| ev.borrow_mut().push("error"));
  let ev = events.clone();
  client.on::<CloseEvent>(move |_, _| ev.borrow_mut().push("close"));

  client.connect(addr).unwrap();
  client.write(b"dropped".to_vec()).unwrap();

  lp.run();
  assert_eq!(*events.borrow(), vec!["connect", "close"]);
}

// 10. Synchronous precondition failures
#[test]
fn test_precondition_errors() {
  let lp = Loop::new().unwrap();
  let handle = lp.resource::<TcpHandle>();
  assert_eq!(handle.state(), TcpState::Idle);
  assert_eq!(handle.read(), Err(UvError::NotConn));
  assert_eq!(handle.shutdown(), Err(UvError::NotConn));
  assert_eq!(handle.try_write(b"x"), Err(UvError::NotConn));
  assert_eq!(handle.close_reset(), Err(UvError::NotConn));
  assert_eq!(
    handle.write(b"x".to_vec()).unwrap_err().error(),
    UvError::NotConn
  );
  assert_eq!(handle.connect(("not an ip", 80)), Err(UvError::Invalid));
  assert!(!handle.readable());
  assert!(!handle.writable());

  let server = lp.resource::<TcpHandle>();
  server.bind(("127.0.0.1", 0)).unwrap();
  assert_eq!(server.bind(("127.0.0.1", 0)), Err(UvError::Invalid));
  server.listen().unwrap();
  assert_eq!(server.connect(server.sock()), Err(UvError::Invalid));

  // No connection pending outside a listen callback.
  assert_eq!(server.accept(&handle), Err(UvError::Again));
  assert_eq!(server.accept(&server), Err(UvError::Invalid));
  let other_loop = Loop::new().unwrap();
  let foreign = other_loop.resource::<TcpHandle>();
  assert_eq!(server.accept(&foreign), Err(UvError::Invalid));

  lp.walk(|resource| resource.close());
  other_loop.walk(|resource| resource.close());
  assert!(!lp.run());
  assert!(!other_loop.run());
  assert_eq!(handle.bind(("127.0.0.1", 0)), Err(UvError::BadFd));
  assert_eq!(handle.listen(), Err(UvError::BadFd));
}

// 11. Adopting an already connected std socket
#[test]
fn test_open() {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  let stream = std::net::TcpStream::connect(addr).unwrap();
  let (mut remote, _) = listener.accept().unwrap();

  let lp = Loop::new().unwrap();
  let handle = lp.resource::<TcpHandle>();
  handle.open(stream).unwrap();
  assert_eq!(handle.state(), TcpState::Connected);
  assert_eq!(handle.peer(), SocketAddress::from(addr));

  let received = Rc::new(RefCell::new(Vec::new()));
  let r = received.clone();
  handle.on::<DataEvent>(move |ev, _| r.borrow_mut().extend_from_slice(&ev.data));
  handle.on::<EndEvent>(|_, h| h.close());
  handle.read().unwrap();
  assert_eq!(handle.read(), Err(UvError::Already));

  remote.write_all(b"hi").unwrap();
  drop(remote);

  lp.run();
  assert_eq!(received.borrow().as_slice(), b"hi");
}

// 12. An unreferenced handle does not keep the loop alive
#[test]
fn test_unreference() {
  let lp = Loop::new().unwrap();
  let server = lp.resource::<TcpHandle>();
  server.bind(("127.0.0.1", 0)).unwrap();
  server.listen().unwrap();
  assert!(server.has_ref());
  assert!(lp.alive());

  server.unreference();
  assert!(server.is_active());
  assert!(!lp.alive());
  assert!(!lp.run());

  server.reference();
  assert!(lp.alive());
  server.close();
  assert!(!lp.run());
}

// 13. Unaccepted connections are dropped
#[test]
fn test_unaccepted_connection_is_dropped() {
  let lp = Loop::new().unwrap();
  let server = lp.resource::<TcpHandle>();
  server.bind(("127.0.0.1", 0)).unwrap();
  server.listen().unwrap();
  server.on::<ListenEvent>(|_, srv| srv.close());

  let client = lp.resource::<TcpHandle>();
  let outcome = Rc::new(RefCell::new(Vec::new()));
  let o = outcome.clone();
  client.on::<ConnectEvent>(|_, c| c.read().unwrap());
  client.on::<EndEvent>(move |_, c| {
    o.borrow_mut().push("end");
    c.close();
  });
  let o = outcome.clone();
  client.on::<ErrorEvent>(move |_, c| {
    o.borrow_mut().push("error");
    c.close();
  });
  client.connect(server.sock()).unwrap();

  lp.run();
  // The peer either sees a clean FIN or a reset, never data.
  assert_eq!(outcome.borrow().len(), 1);
}

// 14. stop() pauses reading and lets the loop return
#[test]
fn test_read_stop() {
  let lp = Loop::new().unwrap();
  let received = Rc::new(RefCell::new(Vec::new()));
  let r = received.clone();
  let (_server, addr) = serve_once(&lp, move |socket| {
    let r = r.clone();
    socket.on::<DataEvent>(move |ev, s| {
      r.borrow_mut().extend_from_slice(&ev.data);
      s.stop();
      assert!(!s.is_active());
      assert!(s.readable());
    });
  });

  let client = lp.resource::<TcpHandle>();
  client.on::<ConnectEvent>(|_, c| c.write(b"x".to_vec()).unwrap());
  client.connect(addr).unwrap();

  assert!(!lp.run());
  assert_eq!(received.borrow().as_slice(), b"x");
  assert_eq!(client.state(), TcpState::Connected);
  assert_eq!(lp.resource_count(), 2);

  lp.walk(|resource| resource.close());
  assert!(!lp.run());
  assert_eq!(lp.resource_count(), 0);
}

// 15. A failed listen keeps the handle bound
#[test]
fn test_listen_failure_keeps_binding() {
  let lp = Loop::new().unwrap();
  let first = lp.resource::<TcpHandle>();
  first.bind(("127.0.0.1", 0)).unwrap();
  let addr = first.sock();

  let second = lp.resource::<TcpHandle>();
  second.bind(addr.clone()).unwrap();
  first.listen().unwrap();

  assert_eq!(second.listen(), Err(UvError::AddrInUse));
  assert_eq!(second.state(), TcpState::Bound);
  assert_eq!(second.sock(), addr);

  lp.walk(|resource| resource.close());
  assert!(!lp.run());
}

// 16. Options reach a listening socket
#[test]
fn test_options_on_listener() {
  let lp = Loop::new().unwrap();
  let server = lp.resource::<TcpHandle>();
  server.listen().unwrap();
  assert_eq!(server.state(), TcpState::Listening);
  assert_eq!(server.sock().ip, "0.0.0.0");

  assert!(server.no_delay(true));
  assert!(server.keep_alive(true, Duration::from_secs(5)));
  assert!(server.keep_alive(false, Duration::ZERO));

  server.close();
  assert!(!lp.run());
}

// 17. Writes queued behind a failed connect are canceled one by one
#[test]
fn test_connect_failure_cancels_queued_writes() {
  let lp = Loop::new().unwrap();
  let client = lp.resource::<TcpHandle>();
  let errors = Rc::new(RefCell::new(Vec::new()));
  let e = errors.clone();
  client.on::<ErrorEvent>(move |ev, c| {
    e.borrow_mut().push(ev.error());
    if ev.error() == UvError::Canceled && e.borrow().len() == 3 {
      c.close();
    }
  });

  client.connect(closed_port()).unwrap();
  client.write(b"one".to_vec()).unwrap();
  client.write(b"two".to_vec()).unwrap();

  lp.run();
  assert_eq!(
    *errors.borrow(),
    vec![UvError::ConnRefused, UvError::Canceled, UvError::Canceled]
  );
  assert_eq!(client.state(), TcpState::Closed);
}
