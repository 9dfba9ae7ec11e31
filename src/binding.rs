use std::sync::Arc;

use bytemuck::Pod;

use crate::buffer::StorageBuffer;
use crate::device::Device;

/// Anything that can sit in a shader storage slot during a dispatch.
///
/// Erases the element type so buffers of different `T` can be bound in one call.
pub trait StorageBinding: Send + Sync {
    fn device(&self) -> &Device;
    fn raw(&self) -> glow::Buffer;
    fn size_bytes(&self) -> usize;
}

impl<T: Pod> StorageBinding for StorageBuffer<'_, T> {
    fn device(&self) -> &Device {
        StorageBuffer::device(self)
    }

    fn raw(&self) -> glow::Buffer {
        StorageBuffer::raw(self)
    }

    fn size_bytes(&self) -> usize {
        StorageBuffer::size_bytes(self)
    }
}

impl<B> StorageBinding for Arc<B>
where
    B: StorageBinding + ?Sized,
{
    fn device(&self) -> &Device {
        (**self).device()
    }

    fn raw(&self) -> glow::Buffer {
        (**self).raw()
    }

    fn size_bytes(&self) -> usize {
        (**self).size_bytes()
    }
}

impl<B> StorageBinding for &B
where
    B: StorageBinding + ?Sized,
{
    fn device(&self) -> &Device {
        (**self).device()
    }

    fn raw(&self) -> glow::Buffer {
        (**self).raw()
    }

    fn size_bytes(&self) -> usize {
        (**self).size_bytes()
    }
}
