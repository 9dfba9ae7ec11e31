//! Headless EGL context on a DRM render node.
//!
//! The stack is built bottom-up: render node descriptor, GBM device, EGL
//! display, GL context. It is torn down in the opposite order.
//!
//! The GL context is thread-affine. Instead of pinning it to the thread that
//! opened the device, every GL call runs inside `Device::section`, which
//! takes the device lock, makes the context current on the calling thread,
//! and releases it again on the way out. Two callers can therefore never
//! interleave GL state, and any thread holding a `&Device` may issue work.

use std::ffi::c_void;
use std::fmt;
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::ptr;

use gbm::AsRaw;
use glow::HasContext;
use khronos_egl as egl;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use parking_lot::Mutex;

use super::config::{DeviceConfig, MIN_COMPUTE_VERSION, UnresolvedUniforms};
use super::info::{DeviceInfo, Limits};
use crate::error::{CurrentError, DeviceError, GlError};

type Egl = egl::DynamicInstance<egl::EGL1_4>;

// EGL 1.5 / EGL_KHR_create_context attribute names.
const CONTEXT_MAJOR_VERSION: egl::Int = 0x3098;
const CONTEXT_MINOR_VERSION: egl::Int = 0x30FB;

/// Entry points a compute context cannot work without.
const REQUIRED_SYMBOLS: &[&str] = &[
    "glGetString",
    "glGetError",
    "glDispatchCompute",
    "glMemoryBarrier",
    "glBindBufferBase",
    "glGetBufferSubData",
];

/// Upper bound on flags drained per `glGetError` sweep. A lost context can
/// keep reporting errors forever.
const MAX_ERROR_FLAGS: usize = 16;

/// A headless compute context on one render node.
///
/// Kernels and buffers borrow the device, so it cannot be dropped while any
/// of them is alive.
pub struct Device {
    gl: glow::Context,
    lock: Mutex<()>,
    display: egl::Display,
    context: egl::Context,
    // Dropped after the EGL display is terminated: closes the GBM device,
    // then the descriptor.
    _gbm: gbm::Device<OwnedFd>,
    egl: Egl,
    path: PathBuf,
    info: DeviceInfo,
    limits: Limits,
    unresolved_uniforms: UnresolvedUniforms,
}

// SAFETY: GL is only touched inside `section`, which serializes callers and
// binds the context to the calling thread for the duration of the call. EGL
// display and context handles are process-wide.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    /// Opens `path` with the default [`DeviceConfig`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        Self::with_config(DeviceConfig::new(path.as_ref()))
    }

    pub fn with_config(config: DeviceConfig) -> Result<Self, DeviceError> {
        let path = config.path;
        log::debug!("Opening render node {}", path.display());

        let raw = nix::fcntl::open(&path, OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())
            .map_err(|source| DeviceError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        // SAFETY: `open` just returned this descriptor and nothing else owns it.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let gbm = gbm::Device::new(fd).map_err(|source| DeviceError::BackendInitFailed {
            path: path.clone(),
            source,
        })?;
        log::debug!("GBM device created on {}", path.display());

        // SAFETY: loading libEGL runs its initializers; the system library is trusted.
        let egl = unsafe { Egl::load_required() }
            .map_err(|e| DeviceError::EglUnavailable(e.to_string()))?;

        // SAFETY: the GBM device is a valid native display and outlives the
        // EGL display, which is terminated before `gbm` drops.
        let display = unsafe { egl.get_display(gbm.as_raw() as *mut c_void) }
            .ok_or(DeviceError::NoDisplay)?;

        let (major, minor) = egl.initialize(display).map_err(DeviceError::InitFailed)?;
        log::debug!("EGL {}.{} initialized", major, minor);

        let (context, config_id) = match create_context(&egl, display, config.gl_version) {
            Ok(created) => created,
            Err(e) => {
                terminate(&egl, display);
                return Err(e);
            }
        };

        let (gl, info, limits) = match load_gl(&egl, display, context, config_id) {
            Ok(loaded) => loaded,
            Err(e) => {
                if let Err(err) = egl.destroy_context(display, context) {
                    log::warn!("Failed to destroy EGL context: {}", err);
                }
                terminate(&egl, display);
                return Err(e);
            }
        };

        log::info!("Opened {} on {}", info, path.display());
        log::debug!("Compute limits: {}", limits);

        Ok(Self {
            gl,
            lock: Mutex::new(()),
            display,
            context,
            _gbm: gbm,
            egl,
            path,
            info,
            limits,
            unresolved_uniforms: config.unresolved_uniforms,
        })
    }

    /// Render node this device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn unresolved_uniforms(&self) -> UnresolvedUniforms {
        self.unresolved_uniforms
    }

    /// Runs `f` with the context current on this thread and the device locked.
    ///
    /// Error flags left over from earlier work are drained first, so a flag
    /// read inside `f` belongs to `f`.
    pub(crate) fn section<R>(&self, f: impl FnOnce(&glow::Context) -> R) -> Result<R, CurrentError> {
        let _lock = self.lock.lock();
        let _bound = self.bind()?;
        if let Some(stale) = take_error(&self.gl) {
            log::warn!("Discarding stale GL error {}", stale);
        }
        Ok(f(&self.gl))
    }

    fn bind(&self) -> Result<Bound<'_>, CurrentError> {
        self.egl
            .make_current(self.display, None, None, Some(self.context))
            .map_err(CurrentError)?;
        Ok(Bound(self))
    }

    pub(crate) fn same_as(&self, other: &Device) -> bool {
        ptr::eq(self, other)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let _lock = self.lock.lock();
        log::debug!("Closing compute context on {}", self.path.display());
        if let Err(e) = self.egl.destroy_context(self.display, self.context) {
            log::warn!("Failed to destroy EGL context: {}", e);
        }
        terminate(&self.egl, self.display);
    }
}

/// Releases the context from the current thread when dropped.
struct Bound<'a>(&'a Device);

impl Drop for Bound<'_> {
    fn drop(&mut self) {
        let device = self.0;
        if let Err(e) = device.egl.make_current(device.display, None, None, None) {
            log::warn!("Failed to release compute context: {}", e);
        }
    }
}

/// Drains every pending GL error flag and returns the first one.
pub(crate) fn take_error(gl: &glow::Context) -> Option<GlError> {
    let mut first = None;
    for _ in 0..MAX_ERROR_FLAGS {
        // SAFETY: only called while the context is current.
        let code = unsafe { gl.get_error() };
        if code == glow::NO_ERROR {
            break;
        }
        first.get_or_insert(GlError(code));
    }
    first
}

fn create_context(
    egl: &Egl,
    display: egl::Display,
    (major, minor): (u32, u32),
) -> Result<(egl::Context, Option<i32>), DeviceError> {
    let attributes = [egl::RENDERABLE_TYPE, egl::OPENGL_BIT, egl::NONE];
    let config = egl
        .choose_first_config(display, &attributes)
        .ok()
        .flatten()
        .ok_or(DeviceError::NoConfig)?;
    let config_id = egl.get_config_attrib(display, config, egl::CONFIG_ID).ok();

    egl.bind_api(egl::OPENGL_API)
        .map_err(DeviceError::ContextCreateFailed)?;

    let context_attributes = [
        CONTEXT_MAJOR_VERSION,
        major as egl::Int,
        CONTEXT_MINOR_VERSION,
        minor as egl::Int,
        egl::NONE,
    ];
    let context = egl
        .create_context(display, config, None, &context_attributes)
        .map_err(DeviceError::ContextCreateFailed)?;
    log::debug!("Created GL {}.{} context (config {:?})", major, minor, config_id);

    Ok((context, config_id))
}

/// Resolves GL entry points and queries the device while the context is
/// current on the opening thread, then releases it.
fn load_gl(
    egl: &Egl,
    display: egl::Display,
    context: egl::Context,
    config_id: Option<i32>,
) -> Result<(glow::Context, DeviceInfo, Limits), DeviceError> {
    egl.make_current(display, None, None, Some(context))
        .map_err(DeviceError::MakeCurrentFailed)?;
    let loaded = resolve(egl, config_id);
    if let Err(e) = egl.make_current(display, None, None, None) {
        log::warn!("Failed to release compute context: {}", e);
    }
    loaded
}

fn resolve(egl: &Egl, config_id: Option<i32>) -> Result<(glow::Context, DeviceInfo, Limits), DeviceError> {
    if let Some(missing) = REQUIRED_SYMBOLS
        .iter()
        .copied()
        .find(|name| egl.get_proc_address(name).is_none())
    {
        return Err(DeviceError::LoaderFailed(missing));
    }

    // SAFETY: the context is current and every pointer comes from eglGetProcAddress.
    let gl = unsafe {
        glow::Context::from_loader_function(|name| {
            egl.get_proc_address(name)
                .map_or(ptr::null(), |f| f as *const c_void)
        })
    };

    let version = gl.version();
    if version.is_embedded || (version.major, version.minor) < MIN_COMPUTE_VERSION {
        return Err(DeviceError::Unsupported {
            found: format!("{}.{}", version.major, version.minor),
            required: MIN_COMPUTE_VERSION,
        });
    }

    let info = DeviceInfo::query(&gl, config_id);
    let limits = Limits::query(&gl);
    Ok((gl, info, limits))
}

fn terminate(egl: &Egl, display: egl::Display) {
    if let Err(e) = egl.terminate(display) {
        log::warn!("Failed to terminate EGL display: {}", e);
    }
}
