use std::path::PathBuf;

/// Lowest desktop GL version with compute shaders.
pub const MIN_COMPUTE_VERSION: (u32, u32) = (4, 3);

/// What a dispatch does with a uniform name the kernel does not declare.
///
/// GLSL compilers drop uniforms that the kernel never reads, so a missing
/// location is often harmless. `Warn` keeps the call going but leaves a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedUniforms {
    /// Skip the uniform silently.
    Ignore,
    /// Skip the uniform and log a warning.
    #[default]
    Warn,
    /// Fail the dispatch with [`DispatchError::UnknownUniform`](crate::DispatchError::UnknownUniform).
    Fail,
}

/// Configuration for opening a [`Device`](super::Device).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// DRM render node to open (e.g. `/dev/dri/renderD128`).
    pub path: PathBuf,
    /// Requested desktop GL context version.
    pub gl_version: (u32, u32),
    /// Policy for uniforms that do not resolve to a location.
    pub unresolved_uniforms: UnresolvedUniforms,
}

impl DeviceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gl_version: MIN_COMPUTE_VERSION,
            unresolved_uniforms: UnresolvedUniforms::default(),
        }
    }

    pub fn gl_version(mut self, major: u32, minor: u32) -> Self {
        self.gl_version = (major, minor);
        self
    }

    pub fn unresolved_uniforms(mut self, policy: UnresolvedUniforms) -> Self {
        self.unresolved_uniforms = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requests_compute_capable_context() {
        let config = DeviceConfig::new("/dev/dri/renderD128");
        assert_eq!(config.path, PathBuf::from("/dev/dri/renderD128"));
        assert_eq!(config.gl_version, MIN_COMPUTE_VERSION);
        assert_eq!(config.unresolved_uniforms, UnresolvedUniforms::Warn);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = DeviceConfig::new("/dev/dri/renderD129")
            .gl_version(4, 6)
            .unresolved_uniforms(UnresolvedUniforms::Fail);
        assert_eq!(config.gl_version, (4, 6));
        assert_eq!(config.unresolved_uniforms, UnresolvedUniforms::Fail);
    }
}
