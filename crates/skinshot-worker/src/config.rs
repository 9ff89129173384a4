use skinshot_engine::device::GpuInit;
use skinshot_engine::render::RendererLimits;

/// Worker configuration.
///
/// Keep this structure small; the binary fills it from CLI flags and the
/// environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity written into every response frame.
    pub name: String,

    /// Output size caps for 3D modes, before supersampling.
    pub limits: RendererLimits,

    /// Create the GPU context when the thread starts instead of on the first
    /// 3D job. A failure then stops that worker.
    pub eager_gpu: bool,

    /// Adapter/device selection.
    pub gpu: GpuInit,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "skinshot".to_string(),
            limits: RendererLimits::default(),
            eager_gpu: false,
            gpu: GpuInit::default(),
        }
    }
}
