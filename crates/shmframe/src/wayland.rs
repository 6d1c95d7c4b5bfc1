//! [`ShmProtocol`] over a bound `wl_shm` global.

use std::os::fd::BorrowedFd;

use wayland_client::protocol::{wl_buffer::WlBuffer, wl_shm, wl_shm::WlShm, wl_shm_pool::WlShmPool};
use wayland_client::{Dispatch, Proxy, QueueHandle};

use crate::error::ProtocolError;
use crate::protocol::ShmProtocol;

/// `wl_shm` plus the queue new pool and buffer objects are assigned to.
///
/// The state type `D` has to dispatch `wl_buffer.release` itself; that is the
/// caller's signal that a buffer can be written again.
pub struct WaylandShm<D> {
    shm: WlShm,
    qh: QueueHandle<D>,
}

impl<D> WaylandShm<D> {
    pub fn new(shm: WlShm, qh: QueueHandle<D>) -> Self {
        Self { shm, qh }
    }

    pub fn shm(&self) -> &WlShm {
        &self.shm
    }
}

impl<D: 'static> Clone for WaylandShm<D> {
    fn clone(&self) -> Self {
        Self {
            shm: self.shm.clone(),
            qh: self.qh.clone(),
        }
    }
}

impl<D> ShmProtocol for WaylandShm<D>
where
    D: Dispatch<WlShmPool, ()> + Dispatch<WlBuffer, ()> + 'static,
{
    type Pool = WlShmPool;
    type Buffer = WlBuffer;

    fn create_pool(&self, fd: BorrowedFd<'_>, size: i32) -> Result<WlShmPool, ProtocolError> {
        if !self.shm.is_alive() {
            return Err(ProtocolError::Disconnected);
        }
        let pool = self.shm.create_pool(fd, size, &self.qh, ());
        if !pool.is_alive() {
            return Err(ProtocolError::Disconnected);
        }
        Ok(pool)
    }

    fn create_buffer(
        &self,
        pool: &WlShmPool,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: u32,
    ) -> Result<WlBuffer, ProtocolError> {
        // Codes other than argb8888/xrgb8888 are passed through as raw fourcc
        // values; only send them if `wl_shm.format` actually defines them.
        let format =
            wl_shm::Format::try_from(format).map_err(|_| ProtocolError::UnknownFormat(format))?;
        let buffer = pool.create_buffer(offset, width, height, stride, format, &self.qh, ());
        if !buffer.is_alive() {
            return Err(ProtocolError::Disconnected);
        }
        Ok(buffer)
    }

    fn destroy_pool(&self, pool: WlShmPool) {
        pool.destroy();
    }

    fn destroy_buffer(&self, buffer: WlBuffer) {
        buffer.destroy();
    }
}
