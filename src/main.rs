//! glkompute - probe a render node for headless GPU compute
//!
//! Opens a DRM render node through GBM/EGL, reports what the driver offers,
//! and optionally compiles a kernel file or runs a copy-kernel self test.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use glkompute::{
    BufferUsage, CompileError, Device, Kernel, StorageBuffer, Uniform, Workgroups, render_nodes,
};

/// Invocations per workgroup in the self-test kernel.
const SELF_TEST_LOCAL_SIZE: u32 = 64;

const SELF_TEST_KERNEL: &str = r#"#version 430
layout(local_size_x = 64) in;
layout(std430, binding = 0) readonly buffer Input { int src[]; };
layout(std430, binding = 1) writeonly buffer Output { int dst[]; };
uniform int count;

void main() {
    uint i = gl_GlobalInvocationID.x;
    if (i < uint(count)) {
        dst[i] = src[i];
    }
}
"#;

/// Command line arguments for the compute probe
#[derive(Parser, Debug)]
#[clap(
    name = "glkompute",
    about = "Probe a DRM render node for headless OpenGL compute.",
    version
)]
struct Args {
    /// Render node to open
    #[clap(short, long, default_value = "/dev/dri/renderD128")]
    device: PathBuf,

    /// Compile this GLSL compute shader and report errors
    #[clap(short, long)]
    kernel: Option<PathBuf>,

    /// Run a copy kernel over N elements and verify the result
    #[clap(long, value_name = "N", num_args = 0..=1, default_missing_value = "4096")]
    self_test: Option<u32>,

    /// Enable verbose logging
    #[clap(short, long)]
    verbose: bool,

    /// List available render nodes and exit
    #[clap(long)]
    list_devices: bool,
}

/// Lists render nodes and what each one reports.
fn list_render_nodes() -> Result<()> {
    println!("Available render nodes:");
    let nodes = render_nodes().context("Failed to enumerate render nodes")?;
    if nodes.is_empty() {
        println!("  No render nodes found.");
        return Ok(());
    }

    for node in &nodes {
        match Device::open(node) {
            Ok(device) => {
                let [x, y, z] = device.limits().max_workgroups;
                println!("\n{}: {}", node.display(), device.info());
                println!(
                    "  Max workgroups: {}x{}x{}, storage bindings: {}",
                    x,
                    y,
                    z,
                    device.limits().max_storage_bindings
                );
            }
            Err(e) => {
                println!("\n{}: unusable ({})", node.display(), e);
            }
        }
    }
    Ok(())
}

fn check_kernel(device: &Device, path: &Path) -> Result<()> {
    match Kernel::from_file(device, path) {
        Ok(_) => {
            println!("{}: OK", path.display());
            Ok(())
        }
        Err(CompileError::ShaderCompileFailed(log)) | Err(CompileError::LinkFailed(log)) => {
            eprintln!("{}", log);
            bail!("{} failed to build", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to build {}", path.display())),
    }
}

/// The self-test kernel compares against a GLSL `int`, so the element count
/// must fit in one.
fn self_test_len(count: u32) -> Result<i32> {
    if count == 0 {
        bail!("Self test needs at least one element");
    }
    match i32::try_from(count) {
        Ok(len) => Ok(len),
        Err(_) => bail!("Self test supports at most {} elements, got {}", i32::MAX, count),
    }
}

fn self_test(device: &Device, count: u32) -> Result<()> {
    let len = self_test_len(count)?;
    let kernel =
        Kernel::compile(device, SELF_TEST_KERNEL).context("Failed to build self-test kernel")?;

    let expected: Vec<i32> = (0..len).map(|i| i.wrapping_mul(2_654_435)).collect();
    let input = Arc::new(
        StorageBuffer::from_slice(device, &expected, BufferUsage::StaticRead)
            .context("Failed to upload self-test input")?,
    );
    let output = Arc::new(StorageBuffer::<i32>::new(device)?);
    output
        .set_size(expected.len() * std::mem::size_of::<i32>(), BufferUsage::StaticDraw)
        .context("Failed to allocate self-test output")?;

    let started = std::time::Instant::now();
    device
        .dispatch(
            &kernel,
            &[Uniform::new("count", len)],
            &[&input, &output],
            Workgroups::for_elements(count, SELF_TEST_LOCAL_SIZE),
        )
        .context("Self-test dispatch failed")?;
    let result = output.get_data().context("Failed to read back self-test output")?;
    log::info!("Self test round trip took {:?}", started.elapsed());

    if let Some(index) = result.iter().zip(&expected).position(|(a, b)| a != b) {
        bail!(
            "Self test mismatch at element {}: expected {}, got {}",
            index,
            expected[index],
            result[index]
        );
    }
    println!("Self test passed ({} elements)", count);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    if args.list_devices {
        return list_render_nodes();
    }

    let device = Device::open(&args.device)
        .with_context(|| format!("Failed to open {}", args.device.display()))?;
    log::info!("Limits: {}", device.limits());

    if let Some(path) = &args.kernel {
        check_kernel(&device, path)?;
    }

    if let Some(count) = args.self_test {
        self_test(&device, count)?;
    }

    Ok(())
}
