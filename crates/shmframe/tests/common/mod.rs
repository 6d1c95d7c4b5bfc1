#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::os::unix::fs::MetadataExt;
use std::ptr::NonNull;
use std::rc::Rc;

use shmframe::{
    AnonShmAllocator, ImageDesc, ImageError, ImageView, ProtocolError, Rasterizer, ShmAllocator,
    ShmContext, ShmProtocol, SoftwareRasterizer,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Ordered record of teardown calls across all fakes of one harness.
pub type Events = Rc<RefCell<Vec<&'static str>>>;

#[derive(Debug)]
pub struct FakePool {
    pub id: u64,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeBuffer {
    pub id: u64,
    pub pool_id: u64,
    pub offset: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: u32,
}

#[derive(Default)]
pub struct ProtocolState {
    next_id: u64,
    pub pools_created: usize,
    pub pools_destroyed: usize,
    pub buffers_created: usize,
    pub buffers_destroyed: usize,
    pub fail_pool: bool,
    pub fail_buffer: bool,
    /// Descriptors duplicated on `create_pool`, standing in for the compositor's copy.
    pub server_fds: Vec<OwnedFd>,
    pub last_buffer: Option<FakeBuffer>,
}

impl ProtocolState {
    pub fn live_pools(&self) -> usize {
        self.pools_created - self.pools_destroyed
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_destroyed
    }
}

/// In-process stand-in for a `wl_shm` connection.
#[derive(Clone)]
pub struct RecordingProtocol {
    pub state: Rc<RefCell<ProtocolState>>,
    events: Events,
}

impl ShmProtocol for RecordingProtocol {
    type Pool = FakePool;
    type Buffer = FakeBuffer;

    fn create_pool(&self, fd: BorrowedFd<'_>, size: i32) -> Result<FakePool, ProtocolError> {
        let mut state = self.state.borrow_mut();
        if state.fail_pool {
            return Err(ProtocolError::Disconnected);
        }
        let dup = fd
            .try_clone_to_owned()
            .map_err(|_| ProtocolError::Disconnected)?;
        state.server_fds.push(dup);
        state.next_id += 1;
        state.pools_created += 1;
        Ok(FakePool {
            id: state.next_id,
            size,
        })
    }

    fn create_buffer(
        &self,
        pool: &FakePool,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: u32,
    ) -> Result<FakeBuffer, ProtocolError> {
        let mut state = self.state.borrow_mut();
        if state.fail_buffer {
            return Err(ProtocolError::Disconnected);
        }
        assert!(i64::from(offset) + i64::from(height) * i64::from(stride) <= i64::from(pool.size));
        state.next_id += 1;
        state.buffers_created += 1;
        let buffer = FakeBuffer {
            id: state.next_id,
            pool_id: pool.id,
            offset,
            width,
            height,
            stride,
            format,
        };
        state.last_buffer = Some(buffer.clone());
        Ok(buffer)
    }

    fn destroy_pool(&self, _pool: FakePool) {
        self.state.borrow_mut().pools_destroyed += 1;
        self.events.borrow_mut().push("destroy_pool");
    }

    fn destroy_buffer(&self, _buffer: FakeBuffer) {
        self.state.borrow_mut().buffers_destroyed += 1;
        self.events.borrow_mut().push("destroy_buffer");
    }
}

/// Software image that reports its release.
pub struct CountedImage {
    pub view: ImageView,
    live: Rc<Cell<usize>>,
    events: Events,
}

impl Drop for CountedImage {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
        self.events.borrow_mut().push("release_image");
    }
}

#[derive(Clone)]
pub struct CountingRasterizer {
    pub live: Rc<Cell<usize>>,
    pub created: Rc<Cell<usize>>,
    events: Events,
}

impl Rasterizer for CountingRasterizer {
    type Image = CountedImage;

    unsafe fn create_image(
        &self,
        desc: ImageDesc,
        bits: NonNull<u8>,
    ) -> Result<CountedImage, ImageError> {
        let view = SoftwareRasterizer.create_image(desc, bits)?;
        self.live.set(self.live.get() + 1);
        self.created.set(self.created.get() + 1);
        Ok(CountedImage {
            view,
            live: self.live.clone(),
            events: self.events.clone(),
        })
    }
}

/// Identity of a shared-memory region: `st_dev` and `st_ino` of its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionId {
    pub dev: u64,
    pub ino: u64,
}

/// Number of descriptors in this process that refer to `region`.
#[cfg(target_os = "linux")]
pub fn open_descriptors(region: RegionId) -> usize {
    fs::read_dir("/proc/self/fd")
        .expect("list /proc/self/fd")
        .filter_map(|entry| entry.ok())
        // Entries can vanish between listing and stat (the listing's own fd, other threads).
        .filter_map(|entry| fs::metadata(entry.path()).ok())
        .filter(|meta| meta.dev() == region.dev && meta.ino() == region.ino)
        .count()
}

/// Number of mappings in this process backed by `region`.
#[cfg(target_os = "linux")]
pub fn mappings(region: RegionId) -> usize {
    fs::read_to_string("/proc/self/maps")
        .expect("read /proc/self/maps")
        .lines()
        .filter(|line| maps_region(line) == Some(region))
        .count()
}

#[cfg(not(target_os = "linux"))]
pub fn open_descriptors(_region: RegionId) -> usize {
    0
}

#[cfg(not(target_os = "linux"))]
pub fn mappings(_region: RegionId) -> usize {
    0
}

/// Parse the `major:minor inode` columns of a `/proc/self/maps` line.
fn maps_region(line: &str) -> Option<RegionId> {
    let mut fields = line.split_whitespace();
    let (major, minor) = fields.nth(3)?.split_once(':')?;
    let ino = fields.next()?.parse().ok()?;
    let major = u64::from_str_radix(major, 16).ok()?;
    let minor = u64::from_str_radix(minor, 16).ok()?;
    let dev = ((major & 0xffff_f000) << 32)
        | ((major & 0xfff) << 8)
        | ((minor & 0xffff_ff00) << 12)
        | (minor & 0xff);
    Some(RegionId { dev, ino })
}

#[derive(Clone)]
pub struct CountingAllocator {
    pub calls: Rc<Cell<usize>>,
    pub fail: Rc<Cell<bool>>,
    /// Every region handed out, in allocation order.
    pub regions: Rc<RefCell<Vec<RegionId>>>,
}

impl ShmAllocator for CountingAllocator {
    fn allocate(&self, size: usize) -> io::Result<OwnedFd> {
        self.calls.set(self.calls.get() + 1);
        if self.fail.get() {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "allocation refused"));
        }
        let file = File::from(AnonShmAllocator.allocate(size)?);
        let meta = file.metadata()?;
        self.regions.borrow_mut().push(RegionId {
            dev: meta.dev(),
            ino: meta.ino(),
        });
        Ok(file.into())
    }
}

pub type TestContext = ShmContext<RecordingProtocol, CountingRasterizer, CountingAllocator>;

/// Fakes for one test, all sharing an event log.
pub struct Harness {
    pub protocol: RecordingProtocol,
    pub rasterizer: CountingRasterizer,
    pub allocator: CountingAllocator,
    pub events: Events,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let events: Events = Rc::default();
        Self {
            protocol: RecordingProtocol {
                state: Rc::default(),
                events: events.clone(),
            },
            rasterizer: CountingRasterizer {
                live: Rc::default(),
                created: Rc::default(),
                events: events.clone(),
            },
            allocator: CountingAllocator {
                calls: Rc::default(),
                fail: Rc::default(),
                regions: Rc::default(),
            },
            events,
        }
    }

    pub fn context(&self) -> TestContext {
        ShmContext::with_parts(
            self.protocol.clone(),
            self.rasterizer.clone(),
            self.allocator.clone(),
        )
    }

    pub fn state(&self) -> std::cell::Ref<'_, ProtocolState> {
        self.protocol.state.borrow()
    }

    pub fn state_mut(&self) -> std::cell::RefMut<'_, ProtocolState> {
        self.protocol.state.borrow_mut()
    }

    pub fn live_images(&self) -> usize {
        self.rasterizer.live.get()
    }

    pub fn allocations(&self) -> usize {
        self.allocator.calls.get()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn regions(&self) -> Vec<RegionId> {
        self.allocator.regions.borrow().clone()
    }

    /// Close the compositor-side copies of every descriptor.
    pub fn drop_server_fds(&self) {
        self.state_mut().server_fds.clear();
    }

    /// Nothing created through this harness is still alive.
    ///
    /// Drops the compositor-side descriptors first, so any remaining reference
    /// to an allocated region is the client's.
    pub fn assert_no_leaks(&self) {
        self.drop_server_fds();
        {
            let state = self.state();
            assert_eq!(state.live_pools(), 0, "protocol pools leaked");
            assert_eq!(state.live_buffers(), 0, "protocol buffers leaked");
        }
        assert_eq!(self.live_images(), 0, "image views leaked");
        for region in self.regions() {
            assert_eq!(open_descriptors(region), 0, "descriptor of {region:?} leaked");
            assert_eq!(mappings(region), 0, "mapping of {region:?} leaked");
        }
    }
}
