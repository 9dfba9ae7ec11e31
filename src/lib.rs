//! glkompute - headless GPU compute over EGL/GBM
//!
//! Opens a DRM render node without any display server, creates an OpenGL
//! context on it, and runs GLSL compute kernels against storage buffers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use glkompute::{BufferUsage, Device, Kernel, StorageBuffer, Uniform};
//!
//! # fn main() -> glkompute::Result<()> {
//! let device = Device::open("/dev/dri/renderD128")?;
//! let kernel = Kernel::from_file(&device, "kernel.glsl")?;
//!
//! let input = Arc::new(StorageBuffer::<f32>::new(&device)?);
//! let output = Arc::new(StorageBuffer::<f32>::new(&device)?);
//! input.set_data(&[1.0, 2.0, 3.0], BufferUsage::StaticRead)?;
//! output.set_size(3 * 4, BufferUsage::StaticDraw)?;
//!
//! device.dispatch(&kernel, &[Uniform::new("count", 3i32)], &[&input, &output], 1u32)?;
//! let result = output.get_data()?;
//! # Ok(())
//! # }
//! ```

mod binding;
mod buffer;
mod device;
mod dispatch;
mod error;
mod kernel;
mod uniform;

pub use binding::StorageBinding;
pub use buffer::{BufferUsage, StorageBuffer};
pub use device::{
    DRI_DIR, Device, DeviceConfig, DeviceInfo, Limits, MIN_COMPUTE_VERSION, UnresolvedUniforms,
    render_nodes, render_nodes_in,
};
pub use dispatch::Workgroups;
pub use error::{
    CompileError, CurrentError, DeviceError, DispatchError, Error, GlError, GpuError, Result,
};
pub use kernel::{INFO_LOG_LIMIT, Kernel};
pub use uniform::{MAX_COMPONENTS, Uniform, UniformValue};
