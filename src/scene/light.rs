//! Light components and the aggregated GPU light set

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Maximum number of lights packed into the shared light buffer
pub const MAX_LIGHTS: usize = 16;

/// Point light; position comes from the owning entity's world transform
#[derive(Debug, Clone)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
        }
    }
}

/// Spot light; position comes from the owning entity's world transform
#[derive(Debug, Clone)]
pub struct SpotLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub inner_angle: f32,
    pub outer_angle: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            direction: -Vec3::Y,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            inner_angle: 0.3,
            outer_angle: 0.5,
        }
    }
}

/// Directional light, position-independent
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.3).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

/// Light component attached to scene entities
#[derive(Debug, Clone)]
pub enum Light {
    Point(PointLight),
    Spot(SpotLight),
    Directional(DirectionalLight),
}

impl Light {
    /// Pack into the GPU layout, resolving world position from the entity
    pub fn to_gpu_data(&self, position: Vec3) -> GpuLightData {
        match self {
            Light::Point(light) => GpuLightData {
                position: position.extend(light.radius),
                color_intensity: light.color.extend(light.intensity),
                direction_type: Vec4::new(0.0, 0.0, 0.0, 0.0),
                spot_params: Vec4::ZERO,
            },
            Light::Spot(light) => GpuLightData {
                position: position.extend(light.radius),
                color_intensity: light.color.extend(light.intensity),
                direction_type: light.direction.normalize().extend(1.0),
                spot_params: Vec4::new(
                    light.inner_angle.cos(),
                    light.outer_angle.cos(),
                    0.0,
                    0.0,
                ),
            },
            Light::Directional(light) => GpuLightData {
                position: Vec4::ZERO,
                color_intensity: light.color.extend(light.intensity),
                direction_type: light.direction.normalize().extend(2.0),
                spot_params: Vec4::ZERO,
            },
        }
    }
}

/// One light in the GPU layout
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = radius
    pub position: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// xyz = direction, w = type (0 point, 1 spot, 2 directional)
    pub direction_type: Vec4,
    /// x = cos(inner), y = cos(outer)
    pub spot_params: Vec4,
}

/// The aggregated light buffer contents, uploaded once per update tick
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightSetUniform {
    /// x = active light count
    pub count: [u32; 4],
    pub lights: [GpuLightData; MAX_LIGHTS],
}

impl Default for LightSetUniform {
    fn default() -> Self {
        Self {
            count: [0; 4],
            lights: [GpuLightData {
                position: Vec4::ZERO,
                color_intensity: Vec4::ZERO,
                direction_type: Vec4::ZERO,
                spot_params: Vec4::ZERO,
            }; MAX_LIGHTS],
        }
    }
}

impl LightSetUniform {
    /// Pack up to [`MAX_LIGHTS`] resolved lights, dropping the rest
    pub fn pack(lights: &[GpuLightData]) -> Self {
        let mut uniform = Self::default();
        let n = lights.len().min(MAX_LIGHTS);
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "light set overflow: {} lights, keeping first {}",
                lights.len(),
                MAX_LIGHTS
            );
        }
        uniform.count[0] = n as u32;
        uniform.lights[..n].copy_from_slice(&lights[..n]);
        uniform
    }
}
