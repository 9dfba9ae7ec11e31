//! Device module for the headless compute context
//!
//! This module handles the render node, the GBM/EGL stack on top of it,
//! and the GL context every kernel and buffer runs against.

mod config;
mod context;
mod info;
mod node;

pub use config::{DeviceConfig, MIN_COMPUTE_VERSION, UnresolvedUniforms};
pub use context::Device;
pub(crate) use context::take_error;
pub use info::{DeviceInfo, Limits};
pub use node::{DRI_DIR, render_nodes, render_nodes_in};
