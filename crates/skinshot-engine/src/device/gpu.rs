use std::marker::PhantomData;

use anyhow::{Context, Result};

use super::GpuInit;

/// Owns the wgpu core objects of one worker.
///
/// This type is the low-level rendering context:
/// - creates and stores Adapter/Device/Queue (no surface, rendering is off-screen)
/// - exposes device limits so renderers can size their targets
/// - blocks on submitted work when a renderer reads pixels back
pub struct Gpu {
    /// Selected adapter (kept for diagnostics).
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Pins the context to the thread that created it.
    _thread_bound: PhantomData<*const ()>,
}

impl Gpu {
    /// Creates a headless GPU context.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let GpuInit {
            backends,
            power_preference,
            allow_fallback_adapter,
            required_features,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let hardware = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await;

        let adapter = match hardware {
            Ok(adapter) => adapter,
            Err(err) if allow_fallback_adapter => {
                log::warn!("no hardware adapter ({err}); trying fallback adapter");
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::LowPower,
                        compatible_surface: None,
                        force_fallback_adapter: true,
                    })
                    .await
                    .context("failed to find a suitable GPU adapter (hardware or fallback)")?
            }
            Err(err) => return Err(err).context("failed to find a suitable GPU adapter"),
        };

        // Texture size caps come from the adapter; everything else as requested.
        let required_limits = required_limits.using_resolution(adapter.limits());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("skinshot device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let info = adapter.get_info();
        log::info!("using GPU adapter {} ({:?})", info.name, info.backend);

        Ok(Gpu {
            adapter,
            device,
            queue,
            _thread_bound: PhantomData,
        })
    }

    /// Blocking variant of [`Gpu::new`] for worker threads.
    pub fn new_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns adapter metadata.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Largest width/height a 2D texture may have on this device.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Largest buffer this device will allocate.
    pub fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    /// Blocks until all submitted work (and pending map callbacks) completed.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .context("GPU device poll failed")?;
        Ok(())
    }
}
