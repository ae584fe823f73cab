// Copyright 2018-2025 the Deno authors. MIT license.
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::unused_async)]
#![deny(clippy::unnecessary_wraps)]
#![doc = include_str!("README.md")]

mod emitter;
mod error;
mod event_loop;
mod events;
mod io;
mod socket_address;
mod tcp;
mod uv_loop;

// Re-exports
pub use bytes;
pub use log;

pub use crate::emitter::Emitter;
pub use crate::emitter::Event;
pub use crate::emitter::Listener;
pub use crate::emitter::Listeners;
pub use crate::error::UV_EOF;
pub use crate::error::UvError;
pub use crate::error::WriteError;
pub use crate::event_loop::EventLoopPhase;
pub use crate::event_loop::RunMode;
pub use crate::events::CloseEvent;
pub use crate::events::ConnectEvent;
pub use crate::events::DataEvent;
pub use crate::events::EndEvent;
pub use crate::events::ErrorEvent;
pub use crate::events::EventKind;
pub use crate::events::ListenEvent;
pub use crate::events::ShutdownEvent;
pub use crate::events::WriteEvent;
pub use crate::io::Resource;
pub use crate::io::ResourceId;
pub use crate::io::ResourceTable;
pub use crate::socket_address::SocketAddress;
pub use crate::tcp::TcpHandle;
pub use crate::tcp::TcpState;
pub use crate::uv_loop::Loop;
pub use crate::uv_loop::LoopOptions;
