//! The hub's single error type.
//!
//! Every fallible public operation returns `Result<T, Error>` (aliased below). `io::Error` and
//! `nix::Error` convert in via `#[from]`, matching how the reference crate's `error.rs` wraps
//! `nix::Error` for its ioctl layer; this is just those same two arms plus the hub-level kinds
//! from the error handling design (duplicate device ids, unsupported capability, exhausted
//! controller pool, ...).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown device id, unknown path, or unknown video device.
    #[error("not found: {0}")]
    NotFound(String),

    /// `open()` failed with `EACCES`.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A read or ioctl failed; the caller should treat the device as closed.
    #[error("i/o error on device: {0}")]
    IoError(#[from] std::io::Error),

    /// The device lacks the capability the caller asked to use.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A bad index, range, or other malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The controller number pool has no free slots.
    #[error("controller number pool exhausted")]
    Exhausted,

    /// An advisory, non-fatal status: `enable` on an already-enabled device, or the reverse.
    #[error("device already in requested state")]
    AlreadyInState,

    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> std::io::Error {
        match e {
            Error::IoError(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        }
    }
}
