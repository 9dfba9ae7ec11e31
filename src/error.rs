//! Error types for every stage of the compute pipeline.
//!
//! Each stage has its own enum so callers can tell a startup failure from a
//! per-call failure. [`Error`] folds them together for callers that do not care.

use std::fmt;
use std::io;
use std::path::PathBuf;

use khronos_egl as egl;
use thiserror::Error;

use crate::dispatch::Workgroups;

/// A GL error flag as returned by `glGetError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlError(pub u32);

impl GlError {
    /// Symbolic name of the flag, or `"GL_UNKNOWN_ERROR"`.
    pub fn name(self) -> &'static str {
        match self.0 {
            glow::INVALID_ENUM => "GL_INVALID_ENUM",
            glow::INVALID_VALUE => "GL_INVALID_VALUE",
            glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
            glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
            glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
            glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
            glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
            glow::CONTEXT_LOST => "GL_CONTEXT_LOST",
            _ => "GL_UNKNOWN_ERROR",
        }
    }

    /// Native error code.
    pub fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04x})", self.name(), self.0)
    }
}

/// The compute context could not be bound to the calling thread.
#[derive(Debug, Error)]
#[error("failed to make the compute context current: {0}")]
pub struct CurrentError(pub egl::Error);

/// Failures while opening a [`Device`](crate::Device). All of them are fatal to startup.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("cannot create GBM device on {}: {source}", .path.display())]
    BackendInitFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("libEGL is not available: {0}")]
    EglUnavailable(String),

    #[error("failed to get EGL display")]
    NoDisplay,

    #[error("failed to initialize EGL: {0}")]
    InitFailed(egl::Error),

    #[error("no EGL config supports desktop OpenGL")]
    NoConfig,

    #[error("failed to create EGL context, error: {0} ({0:?})")]
    ContextCreateFailed(egl::Error),

    #[error("failed to make EGL context current: {0}")]
    MakeCurrentFailed(egl::Error),

    #[error("failed to load GL entry point {0}")]
    LoaderFailed(&'static str),

    #[error("GL {found} does not support compute shaders (need {}.{})", .required.0, .required.1)]
    Unsupported { found: String, required: (u32, u32) },
}

/// Failures while building a [`Kernel`](crate::Kernel).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compute shader compilation failed:\n{0}")]
    ShaderCompileFailed(String),

    #[error("shader program linking failed:\n{0}")]
    LinkFailed(String),

    #[error("cannot read kernel source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to allocate GL object: {0}")]
    CreateFailed(String),

    #[error(transparent)]
    Current(#[from] CurrentError),
}

/// Failures while moving data in or out of a [`StorageBuffer`](crate::StorageBuffer).
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to allocate GL buffer: {0}")]
    CreateFailed(String),

    #[error("buffer has no storage; call set_data or set_size first")]
    Empty,

    #[error("{bytes} bytes exceeds the largest GL buffer size")]
    TooLarge { bytes: usize },

    #[error("GL error: {0}")]
    Backend(GlError),

    #[error(transparent)]
    Current(#[from] CurrentError),
}

/// Failures while dispatching a kernel.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("uniform '{name}' has {len} components; only 1 to 4 are supported")]
    UnsupportedUniformArity { name: String, len: usize },

    #[error("workgroup counts {}x{}x{} outside 1..={:?}", .groups.x, .groups.y, .groups.z, .max)]
    InvalidWorkgroups { groups: Workgroups, max: [u32; 3] },

    #[error("{count} buffers bound but the device has {max} storage slots")]
    TooManyBuffers { count: usize, max: u32 },

    #[error("{0} belongs to a different device")]
    ForeignResource(&'static str),

    #[error("kernel has no active uniform named '{0}'")]
    UnknownUniform(String),

    #[error("GL error: {0}")]
    BackendError(GlError),

    #[error(transparent)]
    Current(#[from] CurrentError),
}

impl DispatchError {
    /// Whether the GPU state may be corrupt and the session should end.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchError::BackendError(_) | DispatchError::Current(_))
    }
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
