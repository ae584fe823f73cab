// Copyright 2018-2025 the Deno authors. MIT license.

mod handle;
mod write;

#[cfg(test)]
mod tests;

pub use handle::TcpHandle;
pub use handle::TcpState;
pub(crate) use write::WriteRequest;
