// Copyright 2018-2025 the Deno authors. MIT license.

//! Typed publish/subscribe table embedded in every handle.
//!
//! There is one ordered listener list per event type. Publishing takes a
//! snapshot of the list before invoking anything, so a listener may register
//! new listeners, reset lists or close its handle while the publish is in
//! progress. Listeners added during a publish only see later events.

use crate::events::CloseEvent;
use crate::events::ConnectEvent;
use crate::events::DataEvent;
use crate::events::EndEvent;
use crate::events::ErrorEvent;
use crate::events::EventKind;
use crate::events::ListenEvent;
use crate::events::ShutdownEvent;
use crate::events::WriteEvent;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

/// A registered callback, invoked with the event and the owning handle.
pub type Listener<E, H> = Rc<dyn Fn(&E, &H)>;

pub struct Listeners<E, H> {
  slot: RefCell<SmallVec<[Listener<E, H>; 2]>>,
}

impl<E, H> Default for Listeners<E, H> {
  fn default() -> Self {
    Self {
      slot: RefCell::new(SmallVec::new()),
    }
  }
}

impl<E, H> Listeners<E, H> {
  fn push(&self, listener: Listener<E, H>) {
    self.slot.borrow_mut().push(listener);
  }

  fn snapshot(&self) -> SmallVec<[Listener<E, H>; 4]> {
    self.slot.borrow().iter().cloned().collect()
  }

  fn is_empty(&self) -> bool {
    self.slot.borrow().is_empty()
  }

  fn clear(&self) {
    // Take the list out first: dropping a listener may drop a handle whose
    // own emitter is being cleared.
    let taken = std::mem::take(&mut *self.slot.borrow_mut());
    drop(taken);
  }
}

/// Maps an event type to its slot in an [`Emitter`].
pub trait Event: Sized + 'static {
  const KIND: EventKind;

  fn listeners<H>(emitter: &Emitter<H>) -> &Listeners<Self, H>;
}

macro_rules! impl_event {
  ($($event:ty => $field:ident: $kind:ident),* $(,)?) => {
    /// Listener table with one slot per event type.
    pub struct Emitter<H> {
      $($field: Listeners<$event, H>,)*
    }

    impl<H> Default for Emitter<H> {
      fn default() -> Self {
        Self {
          $($field: Listeners::default(),)*
        }
      }
    }

    impl<H> Emitter<H> {
      /// Drops every registered listener.
      pub fn reset_all(&self) {
        $(self.$field.clear();)*
      }
    }

    $(
      impl Event for $event {
        const KIND: EventKind = EventKind::$kind;

        fn listeners<H>(emitter: &Emitter<H>) -> &Listeners<Self, H> {
          &emitter.$field
        }
      }
    )*
  };
}

impl_event! {
  ErrorEvent => error: Error,
  ConnectEvent => connect: Connect,
  ListenEvent => listen: Listen,
  WriteEvent => write: Write,
  DataEvent => data: Data,
  EndEvent => end: End,
  ShutdownEvent => shutdown: Shutdown,
  CloseEvent => close: Close,
}

impl<H> Emitter<H> {
  /// Registers `listener` for events of type `E`, after the ones already
  /// registered.
  pub fn on<E: Event>(&self, listener: impl Fn(&E, &H) + 'static) {
    E::listeners(self).push(Rc::new(listener));
  }

  /// Returns true if at least one listener is registered for `E`.
  pub fn has<E: Event>(&self) -> bool {
    !E::listeners(self).is_empty()
  }

  /// Drops the listeners registered for `E`.
  pub fn reset<E: Event>(&self) {
    E::listeners(self).clear();
  }

  /// Invokes the listeners registered for `E`, in registration order.
  ///
  /// Returns the number of listeners that were invoked.
  pub fn publish<E: Event>(&self, event: &E, owner: &H) -> usize {
    let listeners = E::listeners(self).snapshot();
    for listener in listeners.iter() {
      listener(event, owner);
    }
    listeners.len()
  }
}
