use vislum_cache::Cached;
use vislum_device::{
    BindGroupLayoutDescriptor, ComputePipelineDescriptor, DeviceBackend, Device,
    DeviceCreateInfo, DeviceError, MultisampleAttachmentDescriptor, PipelineLayoutDescriptor, SamplerDescriptor,
    ShaderModuleDescriptor, WgpuBackend, backend::TextureCreateInfo,
};

fn device() -> Option<Device<WgpuBackend>> {
    let _ = env_logger::builder().is_test(true).try_init();

    match WgpuBackend::request_headless() {
        Ok(backend) => Some(Device::new(backend, DeviceCreateInfo::default())),
        Err(error) => {
            eprintln!("skipping wgpu test: no adapter available ({error})");
            None
        }
    }
}

#[test]
fn realizes_and_shares_objects() {
    let Some(device) = device() else {
        return;
    };

    let attachment = MultisampleAttachmentDescriptor::new(wgpu::TextureFormat::Rgba8Unorm, 64, 64, 4);
    let a = device.get_or_create_multisample_attachment(attachment).unwrap();
    let b = device.get_or_create_multisample_attachment(attachment).unwrap();
    assert!(Cached::ptr_eq(&a, &b));
    assert_eq!(a.texture().sample_count(), 4);

    let layout = device
        .get_or_create_bind_group_layout(BindGroupLayoutDescriptor::new([
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ]))
        .unwrap();
    let pipeline_layout = device
        .get_or_create_pipeline_layout(PipelineLayoutDescriptor::new([layout.clone()]))
        .unwrap();
    let again = device
        .get_or_create_pipeline_layout(PipelineLayoutDescriptor::new([layout]))
        .unwrap();
    assert!(Cached::ptr_eq(&pipeline_layout, &again));

    let sampler = device
        .get_or_create_sampler(SamplerDescriptor::linear())
        .unwrap();
    assert!(sampler.is_cached_reference());

    let shader = device
        .get_or_create_shader_module(ShaderModuleDescriptor::wgsl(
            "@compute @workgroup_size(1) fn main() {}",
        ))
        .unwrap();
    assert!(shader.is_cached_reference());

    let pipeline = device
        .get_or_create_compute_pipeline(ComputePipelineDescriptor::new(
            again.clone(),
            shader.clone(),
            "main",
        ))
        .unwrap();
    let same = device
        .get_or_create_compute_pipeline(ComputePipelineDescriptor::new(again, shader, "main"))
        .unwrap();
    assert!(Cached::ptr_eq(&pipeline, &same));
}

#[test]
fn backend_validation_errors_are_captured() {
    let Some(device) = device() else {
        return;
    };

    // Storage textures cannot be multisampled.
    let result = device.backend().create_texture(&TextureCreateInfo {
        label: None,
        format: wgpu::TextureFormat::Rgba8Unorm,
        width: 4,
        height: 4,
        sample_count: 4,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::STORAGE_BINDING,
    });
    assert!(matches!(result, Err(DeviceError::Validation(_))));

    let oversized = MultisampleAttachmentDescriptor::new(
        wgpu::TextureFormat::Rgba8Unorm,
        device.limits().max_texture_dimension_2d + 1,
        1,
        1,
    );
    assert!(matches!(
        device.get_or_create_multisample_attachment(oversized),
        Err(DeviceError::Validation(_))
    ));
}
