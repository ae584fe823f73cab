// Copyright 2018-2025 the Deno authors. MIT license.

use std::io;

// libuv-compatible error codes (negative errno values on unix,
// which vary depending on platform, fixed values on windows).
macro_rules! uv_errno {
  ($name:ident, $unix:expr, $win:expr) => {
    #[cfg(unix)]
    pub const $name: i32 = -($unix);
    #[cfg(windows)]
    pub const $name: i32 = $win;
  };
}

uv_errno!(UV_EAGAIN, libc::EAGAIN, -4088);
uv_errno!(UV_EALREADY, libc::EALREADY, -4084);
uv_errno!(UV_EADDRINUSE, libc::EADDRINUSE, -4091);
uv_errno!(UV_EADDRNOTAVAIL, libc::EADDRNOTAVAIL, -4090);
uv_errno!(UV_EBADF, libc::EBADF, -4083);
uv_errno!(UV_ECANCELED, libc::ECANCELED, -4081);
uv_errno!(UV_ECONNABORTED, libc::ECONNABORTED, -4079);
uv_errno!(UV_ECONNREFUSED, libc::ECONNREFUSED, -4078);
uv_errno!(UV_ECONNRESET, libc::ECONNRESET, -4077);
uv_errno!(UV_EINVAL, libc::EINVAL, -4071);
uv_errno!(UV_EISCONN, libc::EISCONN, -4069);
uv_errno!(UV_ENOTCONN, libc::ENOTCONN, -4053);
uv_errno!(UV_EPIPE, libc::EPIPE, -4047);
uv_errno!(UV_ETIMEDOUT, libc::ETIMEDOUT, -4039);
uv_errno!(UV_EACCES, libc::EACCES, -4092);
uv_errno!(UV_ENETUNREACH, libc::ENETUNREACH, -4062);
uv_errno!(UV_EHOSTUNREACH, libc::EHOSTUNREACH, -4065);
pub const UV_EOF: i32 = -4095;

/// Error returned by handle operations and carried by
/// [`ErrorEvent`](crate::ErrorEvent).
///
/// Every variant maps to one libuv error code, see [`UvError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum UvError {
  #[error("resource temporarily unavailable")]
  Again,
  #[error("connection already in progress")]
  Already,
  #[error("address already in use")]
  AddrInUse,
  #[error("address not available")]
  AddrNotAvail,
  #[error("bad file descriptor")]
  BadFd,
  #[error("operation canceled")]
  Canceled,
  #[error("software caused connection abort")]
  ConnAborted,
  #[error("connection refused")]
  ConnRefused,
  #[error("connection reset by peer")]
  ConnReset,
  #[error("invalid argument")]
  Invalid,
  #[error("socket is already connected")]
  IsConn,
  #[error("socket is not connected")]
  NotConn,
  #[error("broken pipe")]
  Pipe,
  #[error("connection timed out")]
  TimedOut,
  #[error("permission denied")]
  Access,
  #[error("network is unreachable")]
  NetUnreach,
  #[error("host is unreachable")]
  HostUnreach,
  #[error("end of file")]
  Eof,
  #[error("unknown system error {0}")]
  Unknown(i32),
}

impl UvError {
  /// The libuv status code for this error. Always negative.
  pub fn code(&self) -> i32 {
    match self {
      UvError::Again => UV_EAGAIN,
      UvError::Already => UV_EALREADY,
      UvError::AddrInUse => UV_EADDRINUSE,
      UvError::AddrNotAvail => UV_EADDRNOTAVAIL,
      UvError::BadFd => UV_EBADF,
      UvError::Canceled => UV_ECANCELED,
      UvError::ConnAborted => UV_ECONNABORTED,
      UvError::ConnRefused => UV_ECONNREFUSED,
      UvError::ConnReset => UV_ECONNRESET,
      UvError::Invalid => UV_EINVAL,
      UvError::IsConn => UV_EISCONN,
      UvError::NotConn => UV_ENOTCONN,
      UvError::Pipe => UV_EPIPE,
      UvError::TimedOut => UV_ETIMEDOUT,
      UvError::Access => UV_EACCES,
      UvError::NetUnreach => UV_ENETUNREACH,
      UvError::HostUnreach => UV_EHOSTUNREACH,
      UvError::Eof => UV_EOF,
      UvError::Unknown(code) => *code,
    }
  }

  /// The symbolic libuv name, e.g. `"EADDRINUSE"`.
  pub fn name(&self) -> &'static str {
    match self {
      UvError::Again => "EAGAIN",
      UvError::Already => "EALREADY",
      UvError::AddrInUse => "EADDRINUSE",
      UvError::AddrNotAvail => "EADDRNOTAVAIL",
      UvError::BadFd => "EBADF",
      UvError::Canceled => "ECANCELED",
      UvError::ConnAborted => "ECONNABORTED",
      UvError::ConnRefused => "ECONNREFUSED",
      UvError::ConnReset => "ECONNRESET",
      UvError::Invalid => "EINVAL",
      UvError::IsConn => "EISCONN",
      UvError::NotConn => "ENOTCONN",
      UvError::Pipe => "EPIPE",
      UvError::TimedOut => "ETIMEDOUT",
      UvError::Access => "EACCES",
      UvError::NetUnreach => "ENETUNREACH",
      UvError::HostUnreach => "EHOSTUNREACH",
      UvError::Eof => "EOF",
      UvError::Unknown(_) => "UNKNOWN",
    }
  }

  /// Maps a libuv status code back to an error. Returns `None` for `0` and
  /// positive values, which are not errors.
  pub fn from_code(code: i32) -> Option<Self> {
    if code >= 0 {
      return None;
    }
    let err = match code {
      UV_EAGAIN => UvError::Again,
      UV_EALREADY => UvError::Already,
      UV_EADDRINUSE => UvError::AddrInUse,
      UV_EADDRNOTAVAIL => UvError::AddrNotAvail,
      UV_EBADF => UvError::BadFd,
      UV_ECANCELED => UvError::Canceled,
      UV_ECONNABORTED => UvError::ConnAborted,
      UV_ECONNREFUSED => UvError::ConnRefused,
      UV_ECONNRESET => UvError::ConnReset,
      UV_EINVAL => UvError::Invalid,
      UV_EISCONN => UvError::IsConn,
      UV_ENOTCONN => UvError::NotConn,
      UV_EPIPE => UvError::Pipe,
      UV_ETIMEDOUT => UvError::TimedOut,
      UV_EACCES => UvError::Access,
      UV_ENETUNREACH => UvError::NetUnreach,
      UV_EHOSTUNREACH => UvError::HostUnreach,
      UV_EOF => UvError::Eof,
      other => UvError::Unknown(other),
    };
    Some(err)
  }
}

impl From<io::Error> for UvError {
  fn from(err: io::Error) -> Self {
    Self::from(&err)
  }
}

impl From<&io::Error> for UvError {
  fn from(err: &io::Error) -> Self {
    use io::ErrorKind;
    match err.kind() {
      ErrorKind::WouldBlock => UvError::Again,
      ErrorKind::AddrInUse => UvError::AddrInUse,
      ErrorKind::AddrNotAvailable => UvError::AddrNotAvail,
      ErrorKind::ConnectionAborted => UvError::ConnAborted,
      ErrorKind::ConnectionRefused => UvError::ConnRefused,
      ErrorKind::ConnectionReset => UvError::ConnReset,
      ErrorKind::InvalidInput => UvError::Invalid,
      ErrorKind::NotConnected => UvError::NotConn,
      ErrorKind::BrokenPipe => UvError::Pipe,
      ErrorKind::TimedOut => UvError::TimedOut,
      ErrorKind::PermissionDenied => UvError::Access,
      ErrorKind::UnexpectedEof => UvError::Eof,
      ErrorKind::NetworkUnreachable => UvError::NetUnreach,
      ErrorKind::HostUnreachable => UvError::HostUnreach,
      _ => match err.raw_os_error() {
        #[cfg(unix)]
        Some(errno) => {
          UvError::from_code(-errno).unwrap_or(UvError::Unknown(-errno))
        }
        #[cfg(not(unix))]
        Some(errno) => UvError::Unknown(-errno.abs()),
        None => UvError::Invalid,
      },
    }
  }
}

/// A rejected [`TcpHandle::write`](crate::TcpHandle::write).
///
/// Hands the buffer back to the caller, who owns it again.
#[derive(Debug, thiserror::Error)]
#[error("write rejected: {error}")]
pub struct WriteError {
  error: UvError,
  data: Vec<u8>,
}

impl WriteError {
  pub(crate) fn new(error: UvError, data: Vec<u8>) -> Self {
    Self { error, data }
  }

  pub fn error(&self) -> UvError {
    self.error
  }

  pub fn code(&self) -> i32 {
    self.error.code()
  }

  /// Returns ownership of the rejected buffer.
  pub fn into_inner(self) -> Vec<u8> {
    self.data
  }
}

impl From<WriteError> for UvError {
  fn from(err: WriteError) -> Self {
    err.error
  }
}
