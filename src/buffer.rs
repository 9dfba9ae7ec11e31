//! GPU-resident storage buffers.
//!
//! A [`StorageBuffer<T>`] is a GL buffer object viewed as a slice of `T`.
//! Uploads and downloads are synchronous and run inside the device section.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::Pod;
use glow::HasContext;

use crate::device::{Device, take_error};
use crate::error::GpuError;

const TARGET: u32 = glow::SHADER_STORAGE_BUFFER;

/// Access pattern hint passed to `glBufferData`.
///
/// Hints only steer where the driver places the allocation; they never change
/// what a kernel or a readback observes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StreamDraw,
    StreamRead,
    StreamCopy,
    StaticDraw,
    /// Written once, read back by the host often.
    StaticRead,
    #[default]
    StaticCopy,
    DynamicDraw,
    DynamicRead,
    DynamicCopy,
}

impl BufferUsage {
    pub fn as_gl(self) -> u32 {
        match self {
            BufferUsage::StreamDraw => glow::STREAM_DRAW,
            BufferUsage::StreamRead => glow::STREAM_READ,
            BufferUsage::StreamCopy => glow::STREAM_COPY,
            BufferUsage::StaticDraw => glow::STATIC_DRAW,
            BufferUsage::StaticRead => glow::STATIC_READ,
            BufferUsage::StaticCopy => glow::STATIC_COPY,
            BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
            BufferUsage::DynamicRead => glow::DYNAMIC_READ,
            BufferUsage::DynamicCopy => glow::DYNAMIC_COPY,
        }
    }
}

/// A GL buffer object holding elements of `T`.
///
/// Share one between several dispatches with `Arc<StorageBuffer<T>>`; all
/// methods take `&self`. Callers that write from one thread while another
/// reads must order those calls themselves.
pub struct StorageBuffer<'d, T> {
    device: &'d Device,
    raw: glow::Buffer,
    size: AtomicUsize,
    _element: PhantomData<fn() -> T>,
}

impl<'d, T: Pod> StorageBuffer<'d, T> {
    /// Creates an empty buffer.
    pub fn new(device: &'d Device) -> Result<Self, GpuError> {
        let raw = device
            .section(|gl| unsafe { gl.create_buffer() })?
            .map_err(GpuError::CreateFailed)?;
        Ok(Self {
            device,
            raw,
            size: AtomicUsize::new(0),
            _element: PhantomData,
        })
    }

    /// Creates a buffer and uploads `data` into it.
    pub fn from_slice(device: &'d Device, data: &[T], usage: BufferUsage) -> Result<Self, GpuError> {
        let buffer = Self::new(device)?;
        buffer.set_data(data, usage)?;
        Ok(buffer)
    }

    /// Replaces the buffer storage with a copy of `data`.
    pub fn set_data(&self, data: &[T], usage: BufferUsage) -> Result<(), GpuError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        gl_size(bytes.len())?;
        self.allocate(bytes.len(), |gl| unsafe {
            gl.buffer_data_u8_slice(TARGET, bytes, usage.as_gl())
        })
    }

    /// Replaces the buffer storage with `bytes` of uninitialized memory.
    ///
    /// Typical for output buffers a kernel writes before anything reads them.
    pub fn set_size(&self, bytes: usize, usage: BufferUsage) -> Result<(), GpuError> {
        let len = gl_size(bytes)?;
        self.allocate(bytes, |gl| unsafe {
            gl.buffer_data_size(TARGET, len, usage.as_gl())
        })
    }

    /// Copies the whole buffer back to the host.
    ///
    /// Returns `size_bytes() / size_of::<T>()` elements; a trailing partial
    /// element is not read. Zero-sized `T` reads back as an empty `Vec`.
    pub fn get_data(&self) -> Result<Vec<T>, GpuError> {
        if self.size_bytes() == 0 {
            return Err(GpuError::Empty);
        }
        let len = self.len();
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut data = vec![T::zeroed(); len];
        let raw = self.raw;
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut data);
        let error = self.device.section(|gl| unsafe {
            gl.bind_buffer(TARGET, Some(raw));
            gl.get_buffer_sub_data(TARGET, 0, dst);
            gl.bind_buffer(TARGET, None);
            take_error(gl)
        })?;
        match error {
            Some(code) => Err(GpuError::Backend(code)),
            None => Ok(data),
        }
    }

    /// Number of whole elements in the buffer.
    pub fn len(&self) -> usize {
        element_count::<T>(self.size_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte length of the last successful upload or allocation.
    pub fn size_bytes(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn device(&self) -> &'d Device {
        self.device
    }

    /// GL name of the buffer object.
    pub fn raw(&self) -> glow::Buffer {
        self.raw
    }

    /// Runs `write` against the bound buffer and records `bytes` as the new
    /// size, both under the device lock so concurrent uploads cannot leave
    /// `size` describing an older allocation.
    fn allocate(&self, bytes: usize, write: impl FnOnce(&glow::Context)) -> Result<(), GpuError> {
        let raw = self.raw;
        self.device.section(|gl| {
            unsafe { gl.bind_buffer(TARGET, Some(raw)) };
            write(gl);
            unsafe { gl.bind_buffer(TARGET, None) };
            if let Some(code) = take_error(gl) {
                return Err(GpuError::Backend(code));
            }
            self.size.store(bytes, Ordering::Release);
            Ok(())
        })??;
        log::trace!("Buffer {:?} now holds {} bytes", raw, bytes);
        Ok(())
    }
}

impl<T> fmt::Debug for StorageBuffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBuffer")
            .field("raw", &self.raw)
            .field("size", &self.size.load(Ordering::Relaxed))
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Drop for StorageBuffer<'_, T> {
    fn drop(&mut self) {
        let raw = self.raw;
        if let Err(e) = self.device.section(|gl| unsafe { gl.delete_buffer(raw) }) {
            log::warn!("Leaking buffer {:?}: {}", raw, e);
        }
    }
}

fn element_count<T>(bytes: usize) -> usize {
    match mem::size_of::<T>() {
        0 => 0,
        size => bytes / size,
    }
}

/// GL takes buffer sizes as a signed 32-bit count.
fn gl_size(bytes: usize) -> Result<i32, GpuError> {
    i32::try_from(bytes).map_err(|_| GpuError::TooLarge { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_usage_is_static_copy() {
        assert_eq!(BufferUsage::default(), BufferUsage::StaticCopy);
        assert_eq!(BufferUsage::default().as_gl(), glow::STATIC_COPY);
    }

    #[test]
    fn usage_maps_to_distinct_gl_enums() {
        let all = [
            BufferUsage::StreamDraw,
            BufferUsage::StreamRead,
            BufferUsage::StreamCopy,
            BufferUsage::StaticDraw,
            BufferUsage::StaticRead,
            BufferUsage::StaticCopy,
            BufferUsage::DynamicDraw,
            BufferUsage::DynamicRead,
            BufferUsage::DynamicCopy,
        ];
        let mut codes: Vec<u32> = all.iter().map(|u| u.as_gl()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert_eq!(BufferUsage::StaticRead.as_gl(), 0x88E5);
        assert_eq!(BufferUsage::StaticDraw.as_gl(), 0x88E4);
    }

    #[test]
    fn element_count_drops_partial_elements() {
        assert_eq!(element_count::<f32>(16), 4);
        assert_eq!(element_count::<f32>(18), 4);
        assert_eq!(element_count::<[u32; 4]>(15), 0);
        assert_eq!(element_count::<u8>(7), 7);
    }

    #[test]
    fn zero_sized_elements_count_as_none() {
        assert_eq!(element_count::<()>(0), 0);
        assert_eq!(element_count::<()>(64), 0);
    }

    #[test]
    fn sizes_beyond_i32_are_rejected() {
        assert_eq!(gl_size(4096).unwrap(), 4096);
        assert!(matches!(
            gl_size(i32::MAX as usize + 1),
            Err(GpuError::TooLarge { .. })
        ));
    }
}
