//! Light uniforms and their GPU resources.
//!
//! The scene carries two light sources in one uniform: a hemisphere light
//! (sky colour above, ground colour below) and a directional sun light.

use cgmath::InnerSpace;
use wgpu::util::DeviceExt;

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl std::fmt::Debug for LightResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightResources")
            .field("uniform", &self.uniform)
            .finish()
    }
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

// Uniforms require 16 byte (4 float) field alignment, hence the padding
// interleaved with the vec3 colours.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub sky_color: [f32; 3],
    pub hemisphere_intensity: f32,
    pub ground_color: [f32; 3],
    pub sun_intensity: f32,
    pub sun_direction: [f32; 3],
    _pad0: f32,
    pub sun_color: [f32; 3],
    _pad1: f32,
}

impl LightUniform {
    /// Build the uniform from light positions rather than a raw direction:
    /// the sun shines from `position` towards `target`.
    pub fn new(
        sky_color: [f32; 3],
        ground_color: [f32; 3],
        hemisphere_intensity: f32,
        sun_position: cgmath::Point3<f32>,
        sun_target: cgmath::Point3<f32>,
        sun_color: [f32; 3],
        sun_intensity: f32,
    ) -> Self {
        let direction = (sun_target - sun_position).normalize();
        Self {
            sky_color,
            hemisphere_intensity,
            ground_color,
            sun_intensity,
            sun_direction: direction.into(),
            _pad0: 0.0,
            sun_color,
            _pad1: 0.0,
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sun_direction_is_normalized() {
        let uniform = LightUniform::new(
            [1.0; 3],
            [1.0; 3],
            1.0,
            cgmath::Point3::new(0.0, 10.0, 0.0),
            cgmath::Point3::new(-5.0, 0.0, 0.0),
            [1.0; 3],
            1.0,
        );
        let d = uniform.sun_direction;
        let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-5);
        // Shines downwards and towards negative x.
        assert!(d[1] < 0.0 && d[0] < 0.0);
    }

    #[test]
    fn uniform_respects_std140_size() {
        // The WGSL struct is 64 bytes; a mismatch here corrupts the lights.
        assert_eq!(std::mem::size_of::<LightUniform>(), 64);
    }
}
