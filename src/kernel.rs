//! Compute kernels: one compute-stage shader linked into a program.

use std::fmt;
use std::fs;
use std::path::Path;

use glow::HasContext;

use crate::device::Device;
use crate::error::CompileError;

/// Longest compiler or linker log kept, in bytes (including the C terminator).
pub const INFO_LOG_LIMIT: usize = 512;

/// A linked compute program.
///
/// Owns its shader and program objects and deletes both on drop.
pub struct Kernel<'d> {
    device: &'d Device,
    shader: glow::Shader,
    program: glow::Program,
}

impl<'d> Kernel<'d> {
    /// Compiles and links GLSL compute source.
    pub fn compile(device: &'d Device, source: &str) -> Result<Self, CompileError> {
        let (shader, program) = device.section(|gl| build(gl, source))??;
        log::debug!("Linked compute kernel ({} bytes of source)", source.len());
        Ok(Self {
            device,
            shader,
            program,
        })
    }

    /// Reads GLSL compute source from `path` and compiles it.
    pub fn from_file(device: &'d Device, path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Compiling kernel from {}", path.display());
        Self::compile(device, &source)
    }

    /// Device this kernel was compiled on.
    pub fn device(&self) -> &'d Device {
        self.device
    }

    pub(crate) fn program(&self) -> glow::Program {
        self.program
    }
}

impl fmt::Debug for Kernel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("shader", &self.shader)
            .field("program", &self.program)
            .finish()
    }
}

impl Drop for Kernel<'_> {
    fn drop(&mut self) {
        let (shader, program) = (self.shader, self.program);
        let released = self.device.section(|gl| unsafe {
            gl.delete_program(program);
            gl.delete_shader(shader);
        });
        if let Err(e) = released {
            log::warn!("Leaking kernel objects: {}", e);
        }
    }
}

fn build(gl: &glow::Context, source: &str) -> Result<(glow::Shader, glow::Program), CompileError> {
    // SAFETY: runs inside a device section; every object created here is
    // either returned or deleted before the error is.
    unsafe {
        let shader = gl
            .create_shader(glow::COMPUTE_SHADER)
            .map_err(CompileError::CreateFailed)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = bounded_log(gl.get_shader_info_log(shader));
            gl.delete_shader(shader);
            return Err(CompileError::ShaderCompileFailed(log));
        }

        let program = match gl.create_program() {
            Ok(program) => program,
            Err(e) => {
                gl.delete_shader(shader);
                return Err(CompileError::CreateFailed(e));
            }
        };
        gl.attach_shader(program, shader);
        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            let log = bounded_log(gl.get_program_info_log(program));
            gl.delete_program(program);
            gl.delete_shader(shader);
            return Err(CompileError::LinkFailed(log));
        }

        Ok((shader, program))
    }
}

/// Cuts a driver log down to what a fixed `INFO_LOG_LIMIT` buffer would hold.
fn bounded_log(mut log: String) -> String {
    let limit = INFO_LOG_LIMIT - 1;
    if log.len() > limit {
        let mut end = limit;
        while !log.is_char_boundary(end) {
            end -= 1;
        }
        log.truncate(end);
    }
    let trimmed = log.trim_end_matches(['\0', '\n', ' ']).len();
    log.truncate(trimmed);
    log
}
