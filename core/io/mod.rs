// Copyright 2018-2025 the Deno authors. MIT license.

// Think of Resources as libuv handles. Every resource is created through
// `Loop::resource()`, lives in the loop's resource table while it is open,
// and is removed from it once its close event has been delivered. A resource
// owns at most one reactor registration (a socket), never more.

mod resource;
mod resource_table;

pub use resource::Resource;
pub use resource_table::ResourceId;
pub use resource_table::ResourceTable;
