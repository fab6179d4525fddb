//! GPU context management
//!
//! The `GpuContext` holds the wgpu device and queue plus the compute
//! pipelines. Pipelines are compiled on first use and then reused for the
//! lifetime of the context.

use crate::config::{DeviceConfig, PowerPreference};
use crate::error::{AmpereError, Result};
use log::{debug, info, warn};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use wgpu::PipelineCompilationOptions;
use wgpu::util::DeviceExt;

/// Pending submissions allowed before a forced sync
const DEFAULT_SYNC_THRESHOLD: u32 = 16;

/// Threads per workgroup for the 1-D kernels
pub(crate) const WORKGROUP_SIZE: u32 = 256;

/// Hardware limit on workgroups per dispatch dimension
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Compiled compute pipelines, one per kernel entry point
pub(crate) struct ComputePipelines {
    pub add: wgpu::ComputePipeline,
    pub sub: wgpu::ComputePipeline,
    pub mul: wgpu::ComputePipeline,
    pub div: wgpu::ComputePipeline,
    pub axpy: wgpu::ComputePipeline,

    pub affine: wgpu::ComputePipeline,
    pub mask: wgpu::ComputePipeline,
    pub exp_affine: wgpu::ComputePipeline,
    pub log_shift: wgpu::ComputePipeline,

    pub matmul: wgpu::ComputePipeline,
    pub strided_sum: wgpu::ComputePipeline,
    pub broadcast: wgpu::ComputePipeline,
}

/// One compute dispatch: pipeline, buffers in binding order, grid size
pub(crate) struct Dispatch<'a> {
    pub pipeline: &'a wgpu::ComputePipeline,
    pub buffers: Vec<&'a wgpu::Buffer>,
    pub workgroups: [u32; 3],
}

pub(crate) struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    /// Compiled lazily on the first dispatch
    pipelines: OnceLock<ComputePipelines>,
    pending_submissions: AtomicU32,
    sync_threshold: u32,
    sync_timeout: Duration,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .field("pipelines_ready", &self.pipelines.get().is_some())
            .finish()
    }
}

impl GpuContext {
    /// Open an adapter and device
    ///
    /// # Errors
    /// `DeviceUnavailable` when no adapter matches or the device request fails
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        // wgpu is async; pollster keeps the public API synchronous
        pollster::block_on(Self::new_async(config))
    }

    async fn new_async(config: &DeviceConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power_preference = match config.power_preference {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .map_err(|e| AmpereError::DeviceUnavailable(format!("no suitable adapter: {e}")))?;

        let adapter_info = adapter.get_info();

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("ampere device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        };

        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .map_err(|e| AmpereError::DeviceUnavailable(format!("device request failed: {e}")))?;

        info!(
            "GPU adapter opened: {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            pipelines: OnceLock::new(),
            pending_submissions: AtomicU32::new(0),
            sync_threshold: DEFAULT_SYNC_THRESHOLD,
            sync_timeout: config.sync_timeout,
        })
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    pub(crate) fn pipelines(&self) -> &ComputePipelines {
        self.pipelines.get_or_init(|| {
            debug!("compiling compute pipelines for {}", self.adapter_info.name);
            Self::create_pipelines(&self.device)
        })
    }

    /// Number of submissions not yet waited on
    pub(crate) fn pending_count(&self) -> u32 {
        self.pending_submissions.load(Ordering::Relaxed)
    }

    /// Wait for every submitted command buffer
    ///
    /// # Errors
    /// `LibraryCallFailed` if the device does not finish within the
    /// configured timeout
    pub fn sync(&self) -> Result<()> {
        let pending = self.pending_submissions.swap(0, Ordering::Relaxed);
        if pending == 0 {
            return Ok(());
        }
        self.wait("sync")
    }

    fn wait(&self, call_site: &'static str) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(self.sync_timeout),
            })
            .map(|_| ())
            .map_err(|e| {
                warn!("{call_site}: device poll failed after {:?}: {e}", self.sync_timeout);
                AmpereError::LibraryCallFailed {
                    call_site,
                    message: e.to_string(),
                }
            })
    }

    /// Back-pressure: sync once too many submissions are outstanding
    fn maybe_sync(&self) -> Result<()> {
        if self.pending_count() >= self.sync_threshold {
            debug!("auto-sync after {} pending submissions", self.pending_count());
            self.sync()?;
        }
        Ok(())
    }

    /// Run `f` inside a wgpu error scope and surface what it caught
    fn scoped<T>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce() -> T,
    ) -> std::result::Result<T, wgpu::Error> {
        self.device.push_error_scope(filter);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    /// Zero-initialised storage buffer holding `len` f32 values
    pub(crate) fn create_storage(&self, label: &str, len: usize) -> Result<wgpu::Buffer> {
        // Zero-length bindings are invalid; keep at least one slot
        let bytes = (len.max(1) * std::mem::size_of::<f32>()) as u64;
        self.scoped(wgpu::ErrorFilter::OutOfMemory, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
        .map_err(|e| AmpereError::DeviceAllocationFailed {
            bytes,
            message: e.to_string(),
        })
    }

    /// Storage buffer initialised from `data`
    pub(crate) fn upload_storage(&self, label: &str, data: &[f32]) -> Result<wgpu::Buffer> {
        let padded;
        let contents = if data.is_empty() {
            padded = [0.0f32];
            &padded[..]
        } else {
            data
        };
        let bytes = std::mem::size_of_val(contents) as u64;
        self.scoped(wgpu::ErrorFilter::OutOfMemory, || {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(contents),
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                })
        })
        .map_err(|e| AmpereError::DeviceAllocationFailed {
            bytes,
            message: e.to_string(),
        })
    }

    /// Small uniform buffer for kernel parameters
    pub(crate) fn uniform<P: bytemuck::Pod>(&self, label: &str, params: &P) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Encode every dispatch into one command buffer and submit it
    ///
    /// # Errors
    /// `LibraryCallFailed` tagged with `call_site` if validation rejects
    /// the work
    pub(crate) fn run(&self, call_site: &'static str, dispatches: &[Dispatch<'_>]) -> Result<()> {
        self.scoped(wgpu::ErrorFilter::Validation, || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(call_site),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(call_site),
                    timestamp_writes: None,
                });
                for dispatch in dispatches {
                    let layout = dispatch.pipeline.get_bind_group_layout(0);
                    let entries: Vec<wgpu::BindGroupEntry<'_>> = dispatch
                        .buffers
                        .iter()
                        .enumerate()
                        .map(|(binding, buffer)| wgpu::BindGroupEntry {
                            binding: binding as u32,
                            resource: buffer.as_entire_binding(),
                        })
                        .collect();
                    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(call_site),
                        layout: &layout,
                        entries: &entries,
                    });
                    pass.set_pipeline(dispatch.pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    let [x, y, z] = dispatch.workgroups;
                    pass.dispatch_workgroups(x, y, z);
                }
            }
            self.queue.submit(Some(encoder.finish()));
        })
        .map_err(|e| AmpereError::LibraryCallFailed {
            call_site,
            message: e.to_string(),
        })?;

        self.pending_submissions.fetch_add(1, Ordering::Relaxed);
        self.maybe_sync()
    }

    /// Copy `len` f32 values out of a storage buffer
    ///
    /// # Errors
    /// `DeviceTransferFailed` if mapping the staging buffer fails or the
    /// device does not finish in time
    pub(crate) fn read_buffer(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<f32>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let byte_size = (len * std::mem::size_of::<f32>()) as u64;

        // STORAGE buffers cannot be mapped; go through a MAP_READ staging copy
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging readback"),
            size: byte_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, byte_size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only disappears if this function already returned
            let _ = sender.send(result);
        });

        self.wait("download")
            .map_err(|e| AmpereError::DeviceTransferFailed(e.to_string()))?;
        // Everything submitted so far has completed
        self.pending_submissions.store(0, Ordering::Relaxed);

        receiver
            .recv()
            .map_err(|e| AmpereError::DeviceTransferFailed(format!("map callback dropped: {e}")))?
            .map_err(|e| AmpereError::DeviceTransferFailed(format!("buffer map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let values: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(values)
    }

    fn create_pipelines(device: &wgpu::Device) -> ComputePipelines {
        let elementwise_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Elementwise Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/elementwise.wgsl").into()),
        });
        let axpy_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Axpy Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/axpy.wgsl").into()),
        });
        let unary_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Unary Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/unary.wgsl").into()),
        });
        let matmul_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("MatMul Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/matmul.wgsl").into()),
        });
        let reduce_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Reduce Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/reduce.wgsl").into()),
        });
        let cast_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cast Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/cast.wgsl").into()),
        });

        let create_pipeline = |module: &wgpu::ShaderModule, entry_point: &str, label: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module,
                entry_point: Some(entry_point),
                compilation_options: PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        ComputePipelines {
            add: create_pipeline(&elementwise_shader, "add_kernel", "Add Pipeline"),
            sub: create_pipeline(&elementwise_shader, "sub_kernel", "Sub Pipeline"),
            mul: create_pipeline(&elementwise_shader, "mul_kernel", "Mul Pipeline"),
            div: create_pipeline(&elementwise_shader, "div_kernel", "Div Pipeline"),
            axpy: create_pipeline(&axpy_shader, "axpy_kernel", "Axpy Pipeline"),

            affine: create_pipeline(&unary_shader, "affine_kernel", "Affine Pipeline"),
            mask: create_pipeline(&unary_shader, "mask_kernel", "Mask Pipeline"),
            exp_affine: create_pipeline(&unary_shader, "exp_affine_kernel", "ExpAffine Pipeline"),
            log_shift: create_pipeline(&unary_shader, "log_shift_kernel", "LogShift Pipeline"),

            matmul: create_pipeline(&matmul_shader, "matmul_kernel", "MatMul Pipeline"),
            strided_sum: create_pipeline(
                &reduce_shader,
                "strided_sum_kernel",
                "Strided Sum Pipeline",
            ),
            broadcast: create_pipeline(&cast_shader, "broadcast_kernel", "Broadcast Pipeline"),
        }
    }
}

/// Grid for a 1-D kernel over `len` elements
///
/// Spills into the y dimension once x would exceed the per-dimension limit;
/// kernels rebuild the flat index from `num_workgroups`.
pub(crate) fn linear_workgroups(len: usize) -> [u32; 3] {
    let groups = len.div_ceil(WORKGROUP_SIZE as usize).max(1);
    let max = MAX_WORKGROUPS_PER_DIM as usize;
    if groups <= max {
        [groups as u32, 1, 1]
    } else {
        [MAX_WORKGROUPS_PER_DIM, groups.div_ceil(max) as u32, 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_workgroups() {
        assert_eq!(linear_workgroups(0), [1, 1, 1]);
        assert_eq!(linear_workgroups(256), [1, 1, 1]);
        assert_eq!(linear_workgroups(257), [2, 1, 1]);
        let big = 65_535 * 256 + 1;
        assert_eq!(linear_workgroups(big), [65_535, 2, 1]);
    }
}
