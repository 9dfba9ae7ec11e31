//! Named per-dispatch parameters.

use glow::HasContext;

use crate::error::DispatchError;

/// Largest vector uniform GLSL accepts (`vec4` / `ivec4`).
pub const MAX_COMPONENTS: usize = 4;

/// Value of a uniform.
///
/// Vector variants must hold 1 to [`MAX_COMPONENTS`] components; other
/// lengths are rejected when the dispatch is validated.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    FloatVec(Vec<f32>),
    IntVec(Vec<i32>),
}

impl UniformValue {
    /// Number of components.
    pub fn arity(&self) -> usize {
        match self {
            UniformValue::Float(_) | UniformValue::Int(_) => 1,
            UniformValue::FloatVec(v) => v.len(),
            UniformValue::IntVec(v) => v.len(),
        }
    }

    pub(crate) fn check(&self, name: &str) -> Result<(), DispatchError> {
        match self.arity() {
            1..=MAX_COMPONENTS => Ok(()),
            len => Err(arity_error(name, len)),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(value: Vec<f32>) -> Self {
        UniformValue::FloatVec(value)
    }
}

impl From<Vec<i32>> for UniformValue {
    fn from(value: Vec<i32>) -> Self {
        UniformValue::IntVec(value)
    }
}

impl From<&[f32]> for UniformValue {
    fn from(value: &[f32]) -> Self {
        UniformValue::FloatVec(value.to_vec())
    }
}

impl From<&[i32]> for UniformValue {
    fn from(value: &[i32]) -> Self {
        UniformValue::IntVec(value.to_vec())
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(value: [f32; N]) -> Self {
        UniformValue::FloatVec(value.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for UniformValue {
    fn from(value: [i32; N]) -> Self {
        UniformValue::IntVec(value.to_vec())
    }
}

/// A uniform name paired with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    name: String,
    value: UniformValue,
}

impl Uniform {
    pub fn new(name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &UniformValue {
        &self.value
    }
}

/// Sets `uniform` at `location` on the program currently in use.
pub(crate) fn apply(
    gl: &glow::Context,
    location: &glow::UniformLocation,
    uniform: &Uniform,
) -> Result<(), DispatchError> {
    let at = Some(location);
    // SAFETY: runs inside a device section with the owning program in use.
    unsafe {
        match &uniform.value {
            UniformValue::Float(x) => gl.uniform_1_f32(at, *x),
            UniformValue::Int(x) => gl.uniform_1_i32(at, *x),
            UniformValue::FloatVec(v) => match v.as_slice() {
                &[x] => gl.uniform_1_f32(at, x),
                &[x, y] => gl.uniform_2_f32(at, x, y),
                &[x, y, z] => gl.uniform_3_f32(at, x, y, z),
                &[x, y, z, w] => gl.uniform_4_f32(at, x, y, z, w),
                other => return Err(arity_error(&uniform.name, other.len())),
            },
            UniformValue::IntVec(v) => match v.as_slice() {
                &[x] => gl.uniform_1_i32(at, x),
                &[x, y] => gl.uniform_2_i32(at, x, y),
                &[x, y, z] => gl.uniform_3_i32(at, x, y, z),
                &[x, y, z, w] => gl.uniform_4_i32(at, x, y, z, w),
                other => return Err(arity_error(&uniform.name, other.len())),
            },
        }
    }
    Ok(())
}

fn arity_error(name: &str, len: usize) -> DispatchError {
    DispatchError::UnsupportedUniformArity {
        name: name.to_owned(),
        len,
    }
}
