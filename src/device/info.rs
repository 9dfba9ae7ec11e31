use std::fmt;

use glow::HasContext;

/// Identification strings reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    /// `EGL_CONFIG_ID` of the chosen config.
    pub config_id: Option<i32>,
}

impl DeviceInfo {
    pub(crate) fn query(gl: &glow::Context, config_id: Option<i32>) -> Self {
        // SAFETY: only called while the context is current.
        unsafe {
            Self {
                vendor: gl.get_parameter_string(glow::VENDOR),
                renderer: gl.get_parameter_string(glow::RENDERER),
                version: gl.get_parameter_string(glow::VERSION),
                config_id,
            }
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}), GL {}", self.renderer, self.vendor, self.version)
    }
}

/// Compute limits used to validate dispatches before they reach the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// `GL_MAX_COMPUTE_WORK_GROUP_COUNT` per axis.
    pub max_workgroups: [u32; 3],
    /// `GL_MAX_SHADER_STORAGE_BUFFER_BINDINGS`.
    pub max_storage_bindings: u32,
}

impl Limits {
    pub(crate) fn query(gl: &glow::Context) -> Self {
        let mut max_workgroups = [0u32; 3];
        // SAFETY: only called while the context is current.
        unsafe {
            for (axis, max) in max_workgroups.iter_mut().enumerate() {
                let value =
                    gl.get_parameter_indexed_i32(glow::MAX_COMPUTE_WORK_GROUP_COUNT, axis as u32);
                *max = value.max(0) as u32;
            }
            let bindings = gl.get_parameter_i32(glow::MAX_SHADER_STORAGE_BUFFER_BINDINGS);
            Self {
                max_workgroups,
                max_storage_bindings: bindings.max(0) as u32,
            }
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.max_workgroups;
        write!(
            f,
            "workgroups {}x{}x{}, {} storage bindings",
            x, y, z, self.max_storage_bindings
        )
    }
}
