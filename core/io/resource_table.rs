// Copyright 2018-2025 the Deno authors. MIT license.

use super::Resource;
use crate::error::UvError;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::iter::Iterator;
use std::rc::Rc;

/// A `ResourceId` is an integer value referencing a resource in the loop's
/// table. It is commonly abbreviated to `rid`.
pub type ResourceId = u32;

/// Map-like data structure storing the loop's resources.
///
/// Each resource is identified through a _resource ID (rid)_, which acts as
/// the key in the map. Iteration order is creation order.
#[derive(Default)]
pub struct ResourceTable {
  index: BTreeMap<ResourceId, Rc<dyn Resource>>,
  next_rid: ResourceId,
}

impl ResourceTable {
  /// Reserves the id the next inserted resource will be stored under.
  pub fn next_rid(&mut self) -> ResourceId {
    let rid = self.next_rid;
    self.next_rid += 1;
    rid
  }

  /// Inserts a `Rc`-wrapped resource under an id obtained from
  /// [`ResourceTable::next_rid`].
  pub fn add_rc_dyn(&mut self, rid: ResourceId, resource: Rc<dyn Resource>) {
    let removed_resource = self.index.insert(rid, resource);
    assert!(removed_resource.is_none());
  }

  /// Returns true if any resource with the given `rid` exists.
  pub fn has(&self, rid: ResourceId) -> bool {
    self.index.contains_key(&rid)
  }

  pub fn len(&self) -> usize {
    self.index.len()
  }

  /// Removes a resource from the resource table and returns it. Note that
  /// the resource's `close()` method is *not* called.
  pub fn take_any(
    &mut self,
    rid: ResourceId,
  ) -> Result<Rc<dyn Resource>, UvError> {
    self.index.remove(&rid).ok_or(UvError::BadFd)
  }

  /// Clones out every resource, so the caller can drive them while the table
  /// stays free to be modified.
  pub fn snapshot(&self) -> Vec<Rc<dyn Resource>> {
    self.index.values().cloned().collect()
  }

  /// Returns an iterator that yields a `(id, name)` pair for every resource
  /// that's currently in the resource table.
  pub fn names(&self) -> impl Iterator<Item = (ResourceId, Cow<'_, str>)> {
    self
      .index
      .iter()
      .map(|(&id, resource)| (id, resource.name()))
  }
}
