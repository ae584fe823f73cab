// Copyright 2018-2025 the Deno authors. MIT license.

// Single-threaded loop driving `Resource`s on top of tokio's reactor. The
// loop owns a current-thread tokio runtime; `run()` blocks the calling
// thread on it and, on every iteration, runs the pending, poll and close
// phases described in `event_loop.rs`. Resources register reactor interest
// with the task context while polling, so an iteration that made no progress
// parks until the reactor has something for us.

use crate::error::UvError;
use crate::event_loop::CloseCallback;
use crate::event_loop::EventLoopPhase;
use crate::event_loop::EventLoopPhases;
use crate::event_loop::PendingCallback;
use crate::event_loop::RunMode;
use crate::io::Resource;
use crate::io::ResourceId;
use crate::io::ResourceTable;
use std::cell::Cell;
use std::cell::RefCell;
use std::future::poll_fn;
use std::rc::Rc;
use std::rc::Weak;
use std::task::Context;
use std::task::Poll;
use std::time::Instant;

thread_local! {
  static DEFAULT_LOOP: RefCell<Weak<LoopInner>> = const { RefCell::new(Weak::new()) };
}

/// Tuning knobs for a [`Loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
  /// Size of the buffer allocated for every read from a socket.
  pub read_buffer_size: usize,
  /// Backlog used by [`TcpHandle::listen`](crate::TcpHandle::listen).
  pub default_backlog: u32,
  /// Upper bound of reads performed for one handle in one iteration, so a
  /// busy peer cannot starve the other handles.
  pub max_reads_per_tick: usize,
}

impl Default for LoopOptions {
  fn default() -> Self {
    Self {
      read_buffer_size: 64 * 1024,
      default_backlog: 128,
      max_reads_per_tick: 32,
    }
  }
}

/// The event loop. Cheap to clone; all clones refer to the same loop.
///
/// Handles are created with [`Loop::resource`] and driven by [`Loop::run`].
/// A loop must only be used from the thread that created it.
#[derive(Clone)]
pub struct Loop(Rc<LoopInner>);

// Field order matters: resources must be dropped before the runtime that
// owns their reactor registrations.
pub(crate) struct LoopInner {
  resources: RefCell<ResourceTable>,
  phases: RefCell<EventLoopPhases>,
  stop_flag: Cell<bool>,
  running: Cell<bool>,
  options: LoopOptions,
  time_origin: Instant,
  runtime: tokio::runtime::Runtime,
}

impl Loop {
  pub fn new() -> Result<Self, UvError> {
    Self::with_options(LoopOptions::default())
  }

  pub fn with_options(options: LoopOptions) -> Result<Self, UvError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_io()
      .enable_time()
      .build()?;
    let options = LoopOptions {
      read_buffer_size: options.read_buffer_size.max(1),
      max_reads_per_tick: options.max_reads_per_tick.max(1),
      ..options
    };
    Ok(Self(Rc::new(LoopInner {
      resources: RefCell::new(ResourceTable::default()),
      phases: RefCell::new(EventLoopPhases::default()),
      stop_flag: Cell::new(false),
      running: Cell::new(false),
      options,
      time_origin: Instant::now(),
      runtime,
    })))
  }

  /// Returns the default loop of the current thread, creating it if no
  /// clone of it is alive anymore.
  pub fn get_default() -> Result<Self, UvError> {
    DEFAULT_LOOP.with(|slot| {
      let existing = slot.borrow().upgrade();
      if let Some(inner) = existing {
        return Ok(Self(inner));
      }
      let new_loop = Self::new()?;
      *slot.borrow_mut() = Rc::downgrade(&new_loop.0);
      Ok(new_loop)
    })
  }

  /// Creates a new handle bound to this loop.
  ///
  /// The loop keeps the handle alive until its close event has been
  /// delivered, even if the returned reference is dropped earlier.
  pub fn resource<T: Resource>(&self) -> Rc<T> {
    let rid = self.0.resources.borrow_mut().next_rid();
    let resource = T::create(self, rid);
    self
      .0
      .resources
      .borrow_mut()
      .add_rc_dyn(rid, resource.clone());
    log::debug!("{}#{} created", resource.name(), rid);
    resource
  }

  /// Runs the loop until no referenced handle is active and every close
  /// event has been delivered, or until [`Loop::stop`] is called.
  ///
  /// Returns true if there is still work left (the loop was stopped).
  pub fn run(&self) -> bool {
    self.run_mode(RunMode::Default)
  }

  pub fn run_mode(&self, mode: RunMode) -> bool {
    let inner = &*self.0;
    if inner.running.get() {
      log::warn!("Loop::run called from inside the loop, ignoring");
      return inner.alive();
    }
    inner.stop_flag.set(false);
    inner.running.set(true);
    let alive = inner.runtime.block_on(inner.drive(mode));
    inner.running.set(false);
    alive
  }

  /// Makes a running loop return after the current iteration.
  pub fn stop(&self) {
    self.0.stop_flag.set(true);
  }

  /// Whether `run()` would have anything to do.
  pub fn alive(&self) -> bool {
    self.0.alive()
  }

  /// Milliseconds elapsed since the loop was created.
  pub fn now(&self) -> u64 {
    self.0.time_origin.elapsed().as_millis() as u64
  }

  pub fn options(&self) -> &LoopOptions {
    &self.0.options
  }

  /// Number of handles the loop currently holds, closing ones included.
  pub fn resource_count(&self) -> usize {
    self.0.resources.borrow().len()
  }

  /// Calls `f` for every handle the loop holds, in creation order.
  ///
  /// `f` may close handles or create new ones; handles created during the
  /// walk are not visited.
  pub fn walk(&self, mut f: impl FnMut(&dyn Resource)) {
    let snapshot = self.0.resources.borrow().snapshot();
    for resource in snapshot.iter() {
      f(resource.as_ref());
    }
  }

  /// `(rid, name)` of every handle, for diagnostics.
  pub fn names(&self) -> Vec<(ResourceId, String)> {
    self
      .0
      .resources
      .borrow()
      .names()
      .map(|(rid, name)| (rid, name.into_owned()))
      .collect()
  }

  pub(crate) fn from_inner(inner: Rc<LoopInner>) -> Self {
    Self(inner)
  }

  pub(crate) fn downgrade(&self) -> Weak<LoopInner> {
    Rc::downgrade(&self.0)
  }

  #[cfg(test)]
  pub(crate) fn inner(&self) -> &LoopInner {
    &self.0
  }
}

impl std::fmt::Debug for Loop {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Loop")
      .field("resources", &self.resource_count())
      .field("alive", &self.alive())
      .finish()
  }
}

impl LoopInner {
  /// Enters the runtime context, required to register new sockets with the
  /// reactor outside of `run()`.
  pub(crate) fn enter(&self) -> tokio::runtime::EnterGuard<'_> {
    self.runtime.enter()
  }

  /// Queues `callback` for the pending phase of the next iteration.
  pub(crate) fn defer(&self, callback: Box<dyn FnOnce()>) {
    self
      .phases
      .borrow_mut()
      .pending_callbacks
      .push_back(PendingCallback { callback });
  }

  /// Queues the close event of resource `rid` for the close phase. The
  /// resource leaves the table once the event has been delivered.
  pub(crate) fn close_later(self: &Rc<Self>, rid: ResourceId) {
    let this = Rc::downgrade(self);
    let callback = Box::new(move || {
      let Some(this) = this.upgrade() else {
        return;
      };
      let taken = this.resources.borrow_mut().take_any(rid);
      if let Ok(resource) = taken {
        resource.finish_close();
        log::debug!("{}#{} closed", resource.name(), rid);
      }
    });
    self
      .phases
      .borrow_mut()
      .close_callbacks
      .push_back(CloseCallback { callback });
  }

  fn alive(&self) -> bool {
    if self.phases.borrow().has_pending_work() {
      return true;
    }
    self
      .resources
      .borrow()
      .snapshot()
      .iter()
      .any(|resource| resource.is_active() && resource.has_ref())
  }

  async fn drive(&self, mode: RunMode) -> bool {
    loop {
      if self.stop_flag.get() || !self.alive() {
        break;
      }
      let progressed = match mode {
        RunMode::NoWait => poll_fn(|cx| Poll::Ready(self.tick(cx))).await,
        RunMode::Default | RunMode::Once => {
          poll_fn(|cx| self.poll_tick(cx)).await
        }
      };
      if mode != RunMode::Default {
        break;
      }
      if progressed {
        // Let the reactor refresh readiness before the next iteration.
        tokio::task::yield_now().await;
      }
    }
    self.alive()
  }

  fn poll_tick(&self, cx: &mut Context) -> Poll<bool> {
    let progressed = self.tick(cx);
    if progressed
      || self.stop_flag.get()
      || self.phases.borrow().has_pending_work()
      || !self.alive()
    {
      Poll::Ready(progressed)
    } else {
      Poll::Pending
    }
  }

  /// One loop iteration. Returns true if any callback ran.
  fn tick(&self, cx: &mut Context) -> bool {
    let mut progressed = false;
    for phase in EventLoopPhase::all() {
      progressed |= match phase {
        EventLoopPhase::PendingCallbacks => self.run_pending(),
        EventLoopPhase::Poll => self.run_io(cx),
        EventLoopPhase::CloseCallbacks => self.run_close(),
      };
    }
    progressed
  }

  fn run_pending(&self) -> bool {
    let batch = self.phases.borrow_mut().take_pending_callbacks();
    let ran = !batch.is_empty();
    for pending in batch {
      (pending.callback)();
    }
    ran
  }

  fn run_io(&self, cx: &mut Context) -> bool {
    let snapshot = self.resources.borrow().snapshot();
    let mut progressed = false;
    for resource in snapshot {
      if resource.is_closing() {
        continue;
      }
      progressed |= resource.poll_io(cx);
    }
    progressed
  }

  fn run_close(&self) -> bool {
    let batch = self.phases.borrow_mut().take_close_callbacks();
    let ran = !batch.is_empty();
    for close in batch {
      (close.callback)();
    }
    ran
  }
}
