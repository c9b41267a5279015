//! Texture provider contract and placeholder construction

use crate::backend::{
    GpuBackend, GpuResult, SamplerDescriptor, SamplerHandle, TextureDescriptor, TextureDimension,
    TextureFormat, TextureHandle, TextureUsage, TextureViewHandle,
};

/// A sampleable image/view/sampler triple consumed by `Material::binding_set`
#[derive(Debug)]
pub struct Texture {
    pub name: String,
    pub dimension: TextureDimension,
    pub image: TextureHandle,
    pub view: TextureViewHandle,
    pub sampler: SamplerHandle,
}

impl Texture {
    /// Create a texture from raw RGBA8 pixels
    pub fn from_pixels(
        gpu: &mut dyn GpuBackend,
        name: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> GpuResult<Self> {
        let image = gpu.create_texture(&TextureDescriptor {
            label: Some(name.to_string()),
            width,
            height,
            layers: 1,
            mip_levels: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        gpu.write_texture(image, pixels, width, height);
        let view = gpu.create_texture_view(image)?;
        let sampler = gpu.create_sampler(&SamplerDescriptor {
            label: Some(format!("{name} sampler")),
            ..Default::default()
        })?;
        Ok(Self {
            name: name.to_string(),
            dimension: TextureDimension::D2,
            image,
            view,
            sampler,
        })
    }

    /// 1x1 white placeholder resolved for unset 2D texture references
    pub fn placeholder_2d(gpu: &mut dyn GpuBackend, name: &str) -> GpuResult<Self> {
        Self::placeholder(gpu, name, TextureDimension::D2, 1)
    }

    /// Six-layer white placeholder for unset cube references
    pub fn placeholder_cube(gpu: &mut dyn GpuBackend, name: &str) -> GpuResult<Self> {
        Self::placeholder(gpu, name, TextureDimension::Cube, 6)
    }

    /// Single-slice white placeholder for unset 3D references
    pub fn placeholder_3d(gpu: &mut dyn GpuBackend, name: &str) -> GpuResult<Self> {
        Self::placeholder(gpu, name, TextureDimension::D3, 1)
    }

    fn placeholder(
        gpu: &mut dyn GpuBackend,
        name: &str,
        dimension: TextureDimension,
        layers: u32,
    ) -> GpuResult<Self> {
        let image = gpu.create_texture(&TextureDescriptor {
            label: Some(name.to_string()),
            width: 1,
            height: 1,
            layers,
            mip_levels: 1,
            dimension,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        let white = [255u8; 4];
        for _ in 0..layers {
            gpu.write_texture(image, &white, 1, 1);
        }
        let view = gpu.create_texture_view(image)?;
        let sampler = gpu.create_sampler(&SamplerDescriptor {
            label: Some(format!("{name} sampler")),
            ..Default::default()
        })?;
        Ok(Self {
            name: name.to_string(),
            dimension,
            image,
            view,
            sampler,
        })
    }

    pub fn destroy(&self, gpu: &mut dyn GpuBackend) {
        gpu.destroy_texture(self.image);
    }
}
