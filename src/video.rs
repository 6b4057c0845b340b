//! Touch-video device pairing and frame buffering (§4.6, §6, scenario S6).
//!
//! The frame decoder itself is out of scope (§1); this module only owns the descriptor lifecycle
//! and the bounded FIFO queue that `get_video_frames` drains.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

/// Largest chunk read per `read_frames` call; frame boundaries are whatever the host's video
/// pipe produces, so one `read()` that returns fewer than this many bytes ends the current burst.
const FRAME_READ_CHUNK: usize = 4096;

/// A raw frame handed up from a `/dev/v4l-touch*` descriptor. The payload format is the
/// decoder's concern; the hub only transports it.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub timestamp_ns: i64,
    pub data: Vec<u8>,
}

/// An open touch-video descriptor, either sitting unattached in the registry or owned by exactly
/// one `DeviceRecord` after pairing (§3 invariant).
pub struct TouchVideoDevice {
    pub path: PathBuf,
    pub fd: RawFd,
    /// The `/dev/input/event*` path this video stream is expected to pair with, as reported by
    /// the host's sysfs convention. The exact mapping is a host contract (§4.6), not derived here.
    pub associated_input_path: PathBuf,
    frames: VecDeque<VideoFrame>,
    capacity: usize,
}

impl TouchVideoDevice {
    pub fn new(path: PathBuf, fd: RawFd, associated_input_path: PathBuf, capacity: usize) -> Self {
        TouchVideoDevice {
            path,
            fd,
            associated_input_path,
            frames: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Pushes a decoded frame, dropping the oldest queued frame if the buffer is full.
    pub fn push_frame(&mut self, frame: VideoFrame) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Drains every frame accumulated since the previous call, oldest first.
    pub fn drain_frames(&mut self) -> Vec<VideoFrame> {
        self.frames.drain(..).collect()
    }

    /// Reads as many pending chunks as are available off the video fd, queuing one `VideoFrame`
    /// per `read()` call (§4.7 step 4, video-fd case). The frame payload format itself is the
    /// decoder's concern (module doc); this only transports whatever bytes the kernel hands back.
    pub fn read_frames(&mut self, now_ns: i64) -> Result<()> {
        let mut buf = [0u8; FRAME_READ_CHUNK];
        loop {
            match nix::unistd::read(self.fd, &mut buf) {
                Ok(0) => return Err(Error::IoError(io::Error::from(io::ErrorKind::UnexpectedEof))),
                Ok(n) => {
                    self.push_frame(VideoFrame { timestamp_ns: now_ns, data: buf[..n].to_vec() });
                    if n < buf.len() {
                        return Ok(());
                    }
                }
                Err(nix::errno::Errno::EAGAIN) => return Ok(()),
                Err(e) => return Err(Error::from(e)),
            }
        }
    }
}

impl Drop for TouchVideoDevice {
    fn drop(&mut self) {
        let _ = nix::unistd::close(self.fd);
    }
}

/// Unattached touch-video descriptors waiting for a matching touchscreen to appear (or vice
/// versa).
#[derive(Default)]
pub struct VideoDeviceRegistry {
    pub(crate) unattached: Vec<TouchVideoDevice>,
}

impl VideoDeviceRegistry {
    pub fn new() -> Self {
        VideoDeviceRegistry { unattached: Vec::new() }
    }

    pub fn insert_unattached(&mut self, device: TouchVideoDevice) {
        self.unattached.push(device);
    }

    /// Removes and returns the unattached video device whose `associated_input_path` matches
    /// `input_path`, if any (called after a touchscreen is opened).
    pub fn take_matching(&mut self, input_path: &std::path::Path) -> Option<TouchVideoDevice> {
        let idx = self
            .unattached
            .iter()
            .position(|d| d.associated_input_path == input_path)?;
        Some(self.unattached.remove(idx))
    }

    /// Moves a device back to the unattached pool, e.g. when its paired touchscreen closes but
    /// the video stream itself is still live.
    pub fn return_unattached(&mut self, device: TouchVideoDevice) {
        self.unattached.push(device);
    }

    /// Looks up an unattached video device by its raw fd (§4.7 step 4, video-fd dispatch for a
    /// video stream that hasn't been paired to a touchscreen yet).
    pub fn find_by_fd_mut(&mut self, fd: RawFd) -> Option<&mut TouchVideoDevice> {
        self.unattached.iter_mut().find(|d| d.fd == fd)
    }

    pub fn len(&self) -> usize {
        self.unattached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unattached.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_queue_drops_oldest_on_overflow() {
        let mut device = TouchVideoDevice::new(PathBuf::from("/dev/v4l-touch0"), -1, PathBuf::from("/dev/input/event0"), 2);
        device.push_frame(VideoFrame { timestamp_ns: 1, data: vec![1] });
        device.push_frame(VideoFrame { timestamp_ns: 2, data: vec![2] });
        device.push_frame(VideoFrame { timestamp_ns: 3, data: vec![3] });
        let drained = device.drain_frames();
        assert_eq!(drained.iter().map(|f| f.timestamp_ns).collect::<Vec<_>>(), vec![2, 3]);
        assert!(device.drain_frames().is_empty());
    }

    #[test]
    fn read_frames_queues_one_frame_per_read_and_stops_on_eagain() {
        use std::os::unix::io::IntoRawFd;
        let (read_fd, write_fd) = nix::unistd::pipe().unwrap();
        let read_fd = read_fd.into_raw_fd();
        let write_fd = write_fd.into_raw_fd();
        nix::fcntl::fcntl(read_fd, nix::fcntl::FcntlArg::F_SETFL(nix::fcntl::OFlag::O_NONBLOCK)).unwrap();

        let mut device = TouchVideoDevice::new(PathBuf::from("/dev/v4l-touch0"), read_fd, PathBuf::from("/dev/input/event0"), 8);
        nix::unistd::write(unsafe { std::os::unix::io::BorrowedFd::borrow_raw(write_fd) }, b"frame-bytes").unwrap();
        device.read_frames(42).unwrap();
        let frames = device.drain_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp_ns, 42);
        assert_eq!(frames[0].data, b"frame-bytes");
        let _ = nix::unistd::close(write_fd);
    }

    #[test]
    fn registry_pairs_by_associated_input_path() {
        let mut registry = VideoDeviceRegistry::new();
        registry.insert_unattached(TouchVideoDevice::new(
            PathBuf::from("/dev/v4l-touch0"),
            -1,
            PathBuf::from("/dev/input/event0"),
            8,
        ));
        assert!(registry.take_matching(std::path::Path::new("/dev/input/event1")).is_none());
        let matched = registry.take_matching(std::path::Path::new("/dev/input/event0"));
        assert!(matched.is_some());
        assert!(registry.is_empty());
    }
}
