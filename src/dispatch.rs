//! The serialized dispatch sequence.
//!
//! Buffers bind to consecutive storage slots starting at 0, so a kernel
//! declaring `layout(std430, binding = N)` sees the N-th buffer passed in.

use glow::HasContext;

use crate::binding::StorageBinding;
use crate::device::{Device, Limits, UnresolvedUniforms, take_error};
use crate::error::DispatchError;
use crate::kernel::Kernel;
use crate::uniform::{Uniform, apply as apply_uniform};

/// Workgroup counts of a dispatch grid.
///
/// Converts from `x`, `(x, y)` or `(x, y, z)`; missing axes default to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Workgroups {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Workgroups {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Smallest 1-D grid covering `elements` invocations at `local_size` per group.
    pub fn for_elements(elements: u32, local_size: u32) -> Self {
        let x = elements.div_ceil(local_size.max(1)).max(1);
        Self::new(x, 1, 1)
    }

    /// Total number of workgroups.
    pub fn total(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    fn check(&self, limits: &Limits) -> Result<(), DispatchError> {
        let within = [self.x, self.y, self.z]
            .iter()
            .zip(limits.max_workgroups)
            .all(|(&count, max)| (1..=max).contains(&count));
        if within {
            Ok(())
        } else {
            Err(DispatchError::InvalidWorkgroups {
                groups: *self,
                max: limits.max_workgroups,
            })
        }
    }
}

impl From<u32> for Workgroups {
    fn from(x: u32) -> Self {
        Self::new(x, 1, 1)
    }
}

impl From<(u32, u32)> for Workgroups {
    fn from((x, y): (u32, u32)) -> Self {
        Self::new(x, y, 1)
    }
}

impl From<(u32, u32, u32)> for Workgroups {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self::new(x, y, z)
    }
}

impl Device {
    /// Runs `kernel` over `groups` with `buffers` bound to slots 0, 1, 2, ...
    ///
    /// Blocks until the driver has accepted the work and a storage barrier is
    /// in place, so a later [`StorageBuffer::get_data`](crate::StorageBuffer::get_data)
    /// observes every write the kernel made. Only one dispatch runs at a time
    /// per device; concurrent callers wait on the device lock.
    ///
    /// Everything that can be checked on the host is checked before any GL
    /// call is made. A failure leaves earlier bindings in place; nothing is
    /// rolled back.
    pub fn dispatch(
        &self,
        kernel: &Kernel<'_>,
        uniforms: &[Uniform],
        buffers: &[&dyn StorageBinding],
        groups: impl Into<Workgroups>,
    ) -> Result<(), DispatchError> {
        let groups = groups.into();
        self.validate(kernel, uniforms, buffers, groups)?;

        let program = kernel.program();
        let policy = self.unresolved_uniforms();
        log::trace!(
            "Dispatching {:?} with {} buffers, {} uniforms over {}x{}x{}",
            program,
            buffers.len(),
            uniforms.len(),
            groups.x,
            groups.y,
            groups.z
        );
        self.section(|gl| record(gl, program, uniforms, buffers, groups, policy))?
    }

    fn validate(
        &self,
        kernel: &Kernel<'_>,
        uniforms: &[Uniform],
        buffers: &[&dyn StorageBinding],
        groups: Workgroups,
    ) -> Result<(), DispatchError> {
        if !self.same_as(kernel.device()) {
            return Err(DispatchError::ForeignResource("kernel"));
        }
        if buffers.iter().any(|buffer| !self.same_as(buffer.device())) {
            return Err(DispatchError::ForeignResource("storage buffer"));
        }
        check_bindings(buffers.len(), self.limits())?;
        groups.check(self.limits())?;
        uniforms
            .iter()
            .try_for_each(|uniform| uniform.value().check(uniform.name()))
    }
}

/// Buffers bind to slots `0..count`, which must all exist on the device.
fn check_bindings(count: usize, limits: &Limits) -> Result<(), DispatchError> {
    let max = limits.max_storage_bindings;
    if count > max as usize {
        return Err(DispatchError::TooManyBuffers { count, max });
    }
    Ok(())
}

fn record(
    gl: &glow::Context,
    program: glow::Program,
    uniforms: &[Uniform],
    buffers: &[&dyn StorageBinding],
    groups: Workgroups,
    policy: UnresolvedUniforms,
) -> Result<(), DispatchError> {
    // SAFETY: runs inside a device section; every handle was checked to
    // belong to this device.
    unsafe {
        for (slot, buffer) in buffers.iter().enumerate() {
            gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, slot as u32, Some(buffer.raw()));
        }
        gl.use_program(Some(program));

        for uniform in uniforms {
            match gl.get_uniform_location(program, uniform.name()) {
                Some(location) => apply_uniform(gl, &location, uniform)?,
                None => match policy {
                    UnresolvedUniforms::Ignore => {}
                    UnresolvedUniforms::Warn => {
                        log::warn!("Kernel has no active uniform '{}'; skipping", uniform.name())
                    }
                    UnresolvedUniforms::Fail => {
                        return Err(DispatchError::UnknownUniform(uniform.name().to_owned()));
                    }
                },
            }
        }

        gl.dispatch_compute(groups.x, groups.y, groups.z);
        // Later kernels read through SSBOs; host readback goes through glGetBufferSubData.
        gl.memory_barrier(glow::SHADER_STORAGE_BARRIER_BIT | glow::BUFFER_UPDATE_BARRIER_BIT);
    }

    match take_error(gl) {
        Some(code) => Err(DispatchError::BackendError(code)),
        None => Ok(()),
    }
}
