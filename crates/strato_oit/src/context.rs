//! Device ownership, checked allocation and readback

use std::sync::Arc;

use crate::error::{OitError, Result};

/// Depth format of the opaque scene the transparency passes test against
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Row pitch for texture-to-buffer copies of 4-byte texels
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn preferred_backends() -> wgpu::Backends {
    #[cfg(target_os = "macos")]
    {
        wgpu::Backends::METAL
    }
    #[cfg(target_os = "windows")]
    {
        wgpu::Backends::DX12
    }
    #[cfg(target_os = "linux")]
    {
        wgpu::Backends::VULKAN
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        wgpu::Backends::PRIMARY
    }
}

fn device_required_limits(adapter: &wgpu::Adapter) -> wgpu::Limits {
    // Default limits cap storage bindings at 128 MiB, which a 1080p arena
    // with 8 entries per pixel already exceeds. Ask for what the adapter has.
    let supported = adapter.limits();
    let mut limits = wgpu::Limits::default();
    limits.max_storage_buffer_binding_size = supported.max_storage_buffer_binding_size;
    limits.max_buffer_size = supported.max_buffer_size;

    tracing::debug!(
        "wgpu limits: max_buffer_size={} MiB, max_storage_buffer_binding_size={} MiB",
        limits.max_buffer_size / (1024 * 1024),
        limits.max_storage_buffer_binding_size / (1024 * 1024)
    );
    limits
}

/// Device and queue shared by every transparency renderer
#[derive(Clone)]
pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    limits: wgpu::Limits,
    downlevel: wgpu::DownlevelFlags,
    adapter_name: String,
}

impl GpuContext {
    /// Create a device without a surface.
    ///
    /// `WGPU_BACKEND` overrides the platform backend choice.
    pub async fn headless() -> Result<Self> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(preferred_backends);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(OitError::AdapterNotFound)?;

        let info = adapter.get_info();
        tracing::info!("using adapter {} ({:?})", info.name, info.backend);

        let required_limits = device_required_limits(&adapter);
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Strato OIT Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: required_limits.clone(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            limits: required_limits,
            downlevel: adapter.get_downlevel_capabilities().flags,
            adapter_name: info.name,
        })
    }

    /// Blocking wrapper around [`GpuContext::headless`]
    pub fn headless_blocking() -> Result<Self> {
        pollster::block_on(Self::headless())
    }

    /// Wrap a device created elsewhere (for example by a windowing layer)
    pub fn from_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        downlevel: wgpu::DownlevelFlags,
    ) -> Self {
        let limits = device.limits();
        Self {
            device,
            queue,
            limits,
            downlevel,
            adapter_name: String::from("external"),
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Fragment shaders may write storage buffers (needed by the gather pass)
    pub fn supports_fragment_storage(&self) -> bool {
        self.downlevel
            .contains(wgpu::DownlevelFlags::FRAGMENT_WRITABLE_STORAGE)
    }

    /// Largest buffer accepted for `usage`
    pub fn buffer_limit(&self, usage: wgpu::BufferUsages) -> u64 {
        let mut limit = self.limits.max_buffer_size;
        if usage.contains(wgpu::BufferUsages::STORAGE) {
            limit = limit.min(u64::from(self.limits.max_storage_buffer_binding_size));
        }
        limit
    }

    /// Create a buffer, reporting limit, out-of-memory and validation
    /// failures as errors instead of device-lost panics
    pub fn create_buffer_checked(
        &self,
        label: &'static str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer> {
        let limit = self.buffer_limit(usage);
        if size > limit {
            return Err(OitError::BufferTooLarge {
                label,
                requested: size,
                limit,
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if out_of_memory.is_some() {
            return Err(OitError::OutOfMemory { label, bytes: size });
        }
        if let Some(err) = validation {
            return Err(OitError::Validation(err.to_string()));
        }
        tracing::trace!("allocated {} ({} bytes)", label, size);
        Ok(buffer)
    }

    /// Block until `buffer` is mapped and copy its contents out
    pub fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>> {
        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(data)
    }

    /// Copy an RGBA8 texture to host memory, tightly packed
    pub fn read_texture_rgba8(
        &self,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        let bytes_per_row = padded_bytes_per_row(width);
        let buffer = self.create_buffer_checked(
            "strato_texture_readback",
            u64::from(bytes_per_row) * u64::from(height),
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        )?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strato_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let padded = self.read_buffer(&buffer)?;
        let row = (width * 4) as usize;
        let mut rgba = Vec::with_capacity(row * height as usize);
        for chunk in padded.chunks(bytes_per_row as usize).take(height as usize) {
            rgba.extend_from_slice(&chunk[..row]);
        }
        Ok(rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
    }
}
