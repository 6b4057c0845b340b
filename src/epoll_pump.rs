//! Readiness multiplexing: epoll over device descriptors plus inotify watches and a self-pipe
//! wakeup (§4.5).
//!
//! `nix`'s `epoll`/`inotify`/`unistd` modules are already the reference crate's syscall layer
//! (`sys.rs` builds its ioctls on the same crate); this just exercises the parts of `nix` the
//! reference crate never needed.

use crate::error::{Error, Result};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent};
use nix::unistd::{close, pipe, read, write};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::Path;

/// Readiness source tag carried as the `u64` payload of each `EpollEvent`, so a dispatcher can
/// tell a woken device fd from the inotify fd or the wake pipe without a second lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeSource {
    WakePipe,
    Inotify,
    Device(RawFd),
}

impl WakeSource {
    fn encode(self) -> u64 {
        match self {
            WakeSource::WakePipe => 0,
            WakeSource::Inotify => 1,
            WakeSource::Device(fd) => 2 + fd as u64,
        }
    }

    fn decode(tag: u64) -> Self {
        match tag {
            0 => WakeSource::WakePipe,
            1 => WakeSource::Inotify,
            fd => WakeSource::Device((fd - 2) as RawFd),
        }
    }
}

/// Maximum number of readiness events returned by one `wait` call (§4.5).
const MAX_EVENTS_PER_WAIT: usize = 16;

pub struct EpollPump {
    epoll: Epoll,
    inotify: Inotify,
    input_watch: nix::sys::inotify::WatchDescriptor,
    video_watch: nix::sys::inotify::WatchDescriptor,
    wake_read_fd: RawFd,
    wake_write_fd: RawFd,
}

impl EpollPump {
    pub fn new(input_dir: &Path, video_dir: &Path) -> Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::empty())?;

        let inotify = Inotify::init(InitFlags::IN_NONBLOCK)?;
        let watch_flags = AddWatchFlags::IN_CREATE
            | AddWatchFlags::IN_DELETE
            | AddWatchFlags::IN_MOVED_TO
            | AddWatchFlags::IN_MOVED_FROM;
        let input_watch = inotify.add_watch(input_dir, watch_flags)?;
        let video_watch = inotify.add_watch(video_dir, watch_flags)?;

        let (read_fd, write_fd) = pipe()?;
        let wake_read_fd = read_fd.as_raw_fd();
        let wake_write_fd = write_fd.as_raw_fd();
        set_nonblocking(wake_read_fd)?;
        set_nonblocking(wake_write_fd)?;
        // The pump owns these fds for its lifetime; leak the safe wrappers so they aren't closed
        // out from under the raw fds we keep.
        std::mem::forget(read_fd);
        std::mem::forget(write_fd);

        let pump = EpollPump {
            epoll,
            inotify,
            input_watch,
            video_watch,
            wake_read_fd,
            wake_write_fd,
        };

        pump.epoll.add(
            unsafe { BorrowedFd::borrow_raw(pump.wake_read_fd) },
            EpollEvent::new(EpollFlags::EPOLLIN, WakeSource::WakePipe.encode()),
        )?;
        pump.epoll.add(
            pump.inotify.as_fd(),
            EpollEvent::new(EpollFlags::EPOLLIN, WakeSource::Inotify.encode()),
        )?;

        Ok(pump)
    }

    pub fn register_fd(&self, fd: RawFd) -> Result<()> {
        self.epoll.add(
            unsafe { BorrowedFd::borrow_raw(fd) },
            EpollEvent::new(EpollFlags::EPOLLIN, WakeSource::Device(fd).encode()),
        )?;
        Ok(())
    }

    pub fn unregister_fd(&self, fd: RawFd) -> Result<()> {
        match self.epoll.delete(unsafe { BorrowedFd::borrow_raw(fd) }) {
            Ok(()) => Ok(()),
            Err(Errno::ENOENT) | Err(Errno::EBADF) => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Blocks for up to `timeout_ms`, retrying transient `EINTR` without adjusting the timeout
    /// (the caller's deadline bookkeeping lives in the event loop, not here).
    pub fn wait(&self, timeout_ms: i32) -> Result<Vec<WakeSource>> {
        let mut raw_events = [EpollEvent::empty(); MAX_EVENTS_PER_WAIT];
        let timeout = EpollTimeout::try_from(timeout_ms).unwrap_or(EpollTimeout::NONE);
        loop {
            match self.epoll.wait(&mut raw_events, timeout) {
                Ok(n) => {
                    return Ok(raw_events[..n].iter().map(|e| WakeSource::decode(e.data())).collect());
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(Error::from(e)),
            }
        }
    }

    /// Writes one byte to the self-pipe; safe to call from any thread, coalesces with pending
    /// wakes already queued.
    pub fn wake(&self) -> Result<()> {
        match write(unsafe { BorrowedFd::borrow_raw(self.wake_write_fd) }, &[1u8]) {
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Drains every pending byte from the wake pipe so a burst of `wake()` calls collapses into
    /// one wakeup.
    pub fn drain_wake_pipe(&self) {
        let mut buf = [0u8; 64];
        loop {
            match read(self.wake_read_fd, &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) if n < buf.len() => break,
                Ok(_) => continue,
            }
        }
    }

    /// Decodes and returns the pending inotify name events, tagged by which watched directory
    /// they came from.
    pub fn drain_inotify(&self) -> Result<Vec<(InotifyDirectory, InotifyEvent)>> {
        match self.inotify.read_events() {
            Ok(events) => Ok(events
                .into_iter()
                .map(|e| {
                    let dir = if e.wd == self.input_watch {
                        InotifyDirectory::Input
                    } else if e.wd == self.video_watch {
                        InotifyDirectory::Video
                    } else {
                        InotifyDirectory::Input
                    };
                    (dir, e)
                })
                .collect()),
            Err(Errno::EAGAIN) => Ok(Vec::new()),
            Err(e) => Err(Error::from(e)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InotifyDirectory {
    Input,
    Video,
}

fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

impl Drop for EpollPump {
    fn drop(&mut self) {
        let _ = close(self.wake_read_fd);
        let _ = close(self.wake_write_fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_source_round_trips_through_encode() {
        assert_eq!(WakeSource::decode(WakeSource::WakePipe.encode()), WakeSource::WakePipe);
        assert_eq!(WakeSource::decode(WakeSource::Inotify.encode()), WakeSource::Inotify);
        assert_eq!(
            WakeSource::decode(WakeSource::Device(7).encode()),
            WakeSource::Device(7)
        );
    }

    #[test]
    fn pump_wakes_promptly_on_wake_call() {
        let dir_in = tempfile::tempdir().unwrap();
        let dir_video = tempfile::tempdir().unwrap();
        let pump = EpollPump::new(dir_in.path(), dir_video.path()).unwrap();
        pump.wake().unwrap();
        let events = pump.wait(5000).unwrap();
        assert!(events.contains(&WakeSource::WakePipe));
        pump.drain_wake_pipe();
    }
}
