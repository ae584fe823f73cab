// Copyright 2018-2025 the Deno authors. MIT license.

use crate::error::UvError;
use std::fmt;
use std::net::IpAddr;
use std::net::SocketAddr;

/// An IP + port pair as reported by [`TcpHandle::sock`] and
/// [`TcpHandle::peer`].
///
/// The default value (empty ip, port 0) is what queries return when the
/// handle has no such endpoint.
///
/// [`TcpHandle::sock`]: crate::TcpHandle::sock
/// [`TcpHandle::peer`]: crate::TcpHandle::peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SocketAddress {
  pub ip: String,
  pub port: u16,
}

impl SocketAddress {
  pub fn new(ip: impl Into<String>, port: u16) -> Self {
    Self {
      ip: ip.into(),
      port,
    }
  }

  pub fn is_ipv6(&self) -> bool {
    self.ip.contains(':')
  }

  /// Parses the address. Fails with [`UvError::Invalid`] if `ip` is not a
  /// literal IPv4 or IPv6 address.
  pub fn to_socket_addr(&self) -> Result<SocketAddr, UvError> {
    let ip = self
      .ip
      .parse::<IpAddr>()
      .map_err(|_| UvError::Invalid)?;
    Ok(SocketAddr::new(ip, self.port))
  }
}

impl fmt::Display for SocketAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_ipv6() {
      write!(f, "[{}]:{}", self.ip, self.port)
    } else {
      write!(f, "{}:{}", self.ip, self.port)
    }
  }
}

impl From<SocketAddr> for SocketAddress {
  fn from(addr: SocketAddr) -> Self {
    Self {
      ip: addr.ip().to_string(),
      port: addr.port(),
    }
  }
}

impl From<(&str, u16)> for SocketAddress {
  fn from((ip, port): (&str, u16)) -> Self {
    Self::new(ip, port)
  }
}

impl From<(String, u16)> for SocketAddress {
  fn from((ip, port): (String, u16)) -> Self {
    Self { ip, port }
  }
}

impl From<&SocketAddress> for SocketAddress {
  fn from(addr: &SocketAddress) -> Self {
    addr.clone()
  }
}
