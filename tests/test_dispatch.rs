// tests/test_dispatch.rs: end-to-end kernel dispatches.

mod common;

use std::sync::Arc;
use std::thread;

use glkompute::{
    BufferUsage, Device, DeviceConfig, DispatchError, Kernel, StorageBinding, StorageBuffer,
    UnresolvedUniforms, Uniform, Workgroups,
};

#[test]
#[ignore = "requires a DRM render node"]
fn copy_kernel_moves_single_value() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COPY_KERNEL).unwrap();

    let input = Arc::new(StorageBuffer::<i32>::new(&device).unwrap());
    let output = Arc::new(StorageBuffer::<i32>::new(&device).unwrap());
    input.set_data(&[42], BufferUsage::StaticRead).unwrap();
    output.set_size(4, BufferUsage::StaticDraw).unwrap();

    device
        .dispatch(&kernel, &[Uniform::new("count", 1i32)], &[&input, &output], 1u32)
        .unwrap();
    assert_eq!(output.get_data().unwrap(), vec![42]);
}

#[test]
#[ignore = "requires a DRM render node"]
fn copy_kernel_covers_partial_workgroup() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COPY_KERNEL).unwrap();

    let data: Vec<i32> = (0..1000).map(|i| i * 3 - 500).collect();
    let input = StorageBuffer::from_slice(&device, &data, BufferUsage::StaticRead).unwrap();
    let output = StorageBuffer::<i32>::new(&device).unwrap();
    output.set_size(data.len() * 4, BufferUsage::StaticDraw).unwrap();

    device
        .dispatch(
            &kernel,
            &[Uniform::new("count", data.len() as i32)],
            &[&input, &output],
            Workgroups::for_elements(data.len() as u32, 64),
        )
        .unwrap();
    assert_eq!(output.get_data().unwrap(), data);
}

#[test]
#[ignore = "requires a DRM render node"]
fn scalar_and_vector_uniforms_reach_the_kernel() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::AFFINE_KERNEL).unwrap();

    let data = [1.0f32, 2.0, 3.0, 4.0];
    let input = StorageBuffer::from_slice(&device, &data, BufferUsage::StaticRead).unwrap();
    let output = StorageBuffer::<f32>::new(&device).unwrap();
    output.set_size(16, BufferUsage::StaticDraw).unwrap();

    let uniforms = [
        Uniform::new("scale", 2.0f32),
        Uniform::new("offset", [0.5f32, 0.25]),
        Uniform::new("dims", vec![4i32, 1, 1]),
    ];
    device
        .dispatch(&kernel, &uniforms, &[&input, &output], 1u32)
        .unwrap();
    assert_eq!(output.get_data().unwrap(), vec![2.75, 4.75, 6.75, 8.75]);
}

#[test]
#[ignore = "requires a DRM render node"]
fn five_component_uniform_fails_before_dispatch() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap();

    let err = device
        .dispatch(
            &kernel,
            &[Uniform::new("weights", [1.0f32, 2.0, 3.0, 4.0, 5.0])],
            &[&counter],
            1u32,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::UnsupportedUniformArity { len: 5, .. }
    ));
    // The kernel never ran.
    assert_eq!(counter.get_data().unwrap(), vec![0]);
}

#[test]
#[ignore = "requires a DRM render node"]
fn unresolved_uniform_is_skipped_by_default() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap();

    device
        .dispatch(&kernel, &[Uniform::new("not_declared", 3i32)], &[&counter], 1u32)
        .unwrap();
    assert_eq!(counter.get_data().unwrap(), vec![1]);
}

#[test]
#[ignore = "requires a DRM render node"]
fn unresolved_uniform_fails_in_strict_mode() {
    let config = DeviceConfig::new(common::node()).unresolved_uniforms(UnresolvedUniforms::Fail);
    let device = Device::with_config(config).unwrap();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap();

    let err = device
        .dispatch(&kernel, &[Uniform::new("not_declared", 3i32)], &[&counter], 1u32)
        .unwrap_err();
    assert!(matches!(err, DispatchError::UnknownUniform(ref name) if name == "not_declared"));
}

#[test]
#[ignore = "requires a DRM render node"]
fn unresolved_uniform_is_skipped_when_ignored() {
    let config = DeviceConfig::new(common::node()).unresolved_uniforms(UnresolvedUniforms::Ignore);
    let device = Device::with_config(config).unwrap();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap();

    for _ in 0..2 {
        device
            .dispatch(&kernel, &[Uniform::new("not_declared", 3i32)], &[&counter], 1u32)
            .unwrap();
    }
    assert_eq!(counter.get_data().unwrap(), vec![2]);
}

#[test]
#[ignore = "requires a DRM render node"]
fn zero_workgroups_are_rejected() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap();

    let err = device
        .dispatch(&kernel, &[], &[&counter], (1u32, 0u32))
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidWorkgroups { .. }));
}

#[test]
#[ignore = "requires a DRM render node"]
fn resources_from_another_device_are_rejected() {
    let device = common::open_device();
    let other = common::open_device();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let foreign = StorageBuffer::from_slice(&other, &[0u32], BufferUsage::DynamicCopy).unwrap();

    let err = device.dispatch(&kernel, &[], &[&foreign], 1u32).unwrap_err();
    assert!(matches!(err, DispatchError::ForeignResource(_)));

    let counter = StorageBuffer::from_slice(&other, &[0u32], BufferUsage::DynamicCopy).unwrap();
    let err = other.dispatch(&kernel, &[], &[&counter], 1u32).unwrap_err();
    assert!(matches!(err, DispatchError::ForeignResource("kernel")));
}

#[test]
#[ignore = "requires a DRM render node"]
fn sequential_dispatches_see_previous_writes() {
    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap();

    for _ in 0..50 {
        device.dispatch(&kernel, &[], &[&counter], 1u32).unwrap();
    }
    assert_eq!(counter.get_data().unwrap(), vec![50]);
}

#[test]
#[ignore = "requires a DRM render node"]
fn dispatches_from_two_threads_never_interleave() {
    const PER_THREAD: u32 = 100;

    let device = common::open_device();
    let kernel = Kernel::compile(&device, common::COUNTER_KERNEL).unwrap();
    let counter = Arc::new(
        StorageBuffer::from_slice(&device, &[0u32], BufferUsage::DynamicCopy).unwrap(),
    );

    thread::scope(|scope| {
        for _ in 0..2 {
            let counter = Arc::clone(&counter);
            let (device, kernel) = (&device, &kernel);
            scope.spawn(move || {
                for _ in 0..PER_THREAD {
                    let bound: &dyn StorageBinding = &counter;
                    device.dispatch(kernel, &[], &[bound], 1u32).unwrap();
                }
            });
        }
    });

    assert_eq!(counter.get_data().unwrap(), vec![2 * PER_THREAD]);
}
