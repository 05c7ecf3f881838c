//! # One-shot readiness pipe.
//!
//! The parent keeps the read end as a non-blocking tokio
//! [`Receiver`](tokio::net::unix::pipe::Receiver); the write end is installed
//! in the child as descriptor [`READY_FD`]. Both ends are close-on-exec, so no
//! other child ever inherits them.

use std::io::{self, PipeWriter, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe::Receiver;
use tokio::process::Command;

/// Descriptor number of the readiness pipe inside the manager process.
pub const READY_FD: RawFd = 3;

/// Sentinel byte signalling "initialized".
pub const READY_BYTE: u8 = b'i';

/// Parent side of the readiness handshake.
pub struct ReadinessPipe {
    reader: Receiver,
    writer: Option<PipeWriter>,
}

impl ReadinessPipe {
    /// Creates the pipe. Must be called from within a tokio runtime.
    pub fn new() -> io::Result<Self> {
        let (reader, writer) = io::pipe()?;
        let reader = Receiver::from_owned_fd(OwnedFd::from(reader))?;
        Ok(Self {
            reader,
            writer: Some(writer),
        })
    }

    /// Arranges for the write end to appear as [`READY_FD`] in `cmd`'s child.
    pub fn install(&self, cmd: &mut Command) -> io::Result<RawFd> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| io::Error::other("readiness write end already closed"))?;
        inherit_fd(cmd, writer.as_raw_fd(), READY_FD);
        Ok(READY_FD)
    }

    /// Closes the parent's copy of the write end.
    pub fn close_writer(&mut self) {
        self.writer = None;
    }

    /// Reads the first byte; `None` when every writer closed without writing.
    pub async fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.reader.read(&mut buf).await? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// Child side of the readiness handshake.
pub struct ReadinessNotifier {
    fd: OwnedFd,
}

impl ReadinessNotifier {
    /// Adopts an inherited descriptor and marks it close-on-exec, so that
    /// processes spawned later do not hold the pipe open.
    ///
    /// # Safety
    /// `fd` must be a descriptor owned by nobody else in this process
    /// (in practice: the one named in the manager's context).
    pub unsafe fn from_fd(fd: RawFd) -> io::Result<Self> {
        // SAFETY: fcntl on an arbitrary integer is harmless; EBADF is reported.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: ownership is guaranteed by the caller.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Writes the sentinel byte and closes the descriptor.
    pub fn notify(self) -> io::Result<()> {
        let mut writer = PipeWriter::from(self.fd);
        writer.write_all(&[READY_BYTE])
    }
}

/// Makes `fd` available as `target` in the child spawned from `cmd`.
///
/// The source descriptor stays close-on-exec in the parent; only the
/// duplicate in the child survives `exec`.
pub(crate) fn inherit_fd(cmd: &mut Command, fd: RawFd, target: RawFd) {
    // SAFETY: the closure runs between fork and exec and only calls the
    // async-signal-safe dup2/fcntl.
    unsafe {
        cmd.pre_exec(move || {
            if fd == target {
                // dup2 onto itself leaves FD_CLOEXEC set.
                if libc::fcntl(target, libc::F_SETFD, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
            } else if libc::dup2(fd, target) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}
