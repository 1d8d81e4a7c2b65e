use std::time::{Duration, Instant};

use isoterra_core::config::PipelineConfig;
use isoterra_render::TerrainDrawBuffers;
use isoterra_sim::AllocError;
use isoterra_world::{CycleStats, TerrainController, TerrainError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error("GPU upload failed: {0}")]
    Upload(#[from] AllocError),
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Timing data over all cycles of a run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl TimingSeries {
    pub fn from_samples(samples: &[Duration]) -> Self {
        let mut ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        if ms.is_empty() {
            return Self {
                mean_ms: 0.0,
                median_ms: 0.0,
                p95_ms: 0.0,
                min_ms: 0.0,
                max_ms: 0.0,
            };
        }
        ms.sort_by(f64::total_cmp);
        let n = ms.len();
        let percentile = |p: f64| ms[((n as f64 * p).ceil() as usize).clamp(1, n) - 1];
        Self {
            mean_ms: ms.iter().sum::<f64>() / n as f64,
            median_ms: percentile(0.5),
            p95_ms: percentile(0.95),
            min_ms: ms[0],
            max_ms: ms[n - 1],
        }
    }
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunResult {
    pub chunks_per_axis: [u32; 3],
    pub voxels_per_axis: [u32; 3],
    pub cycles: u32,
    pub device_threads: usize,
    pub events: u64,
    pub draw_count: u32,
    pub vertices: u64,
    pub pages_in_use: u32,
    /// Geometry pages that received backing memory over the run.
    #[serde(default)]
    pub pages_materialized: u32,
    /// Failed page-lock attempts over the run.
    #[serde(default)]
    pub lock_contention: u64,
    pub uploaded_draws: Option<u32>,
    pub cycle: TimingSeries,
    pub generation: TimingSeries,
    pub meshing: TimingSeries,
    pub collection: TimingSeries,
}

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuContext {
    /// Initialize wgpu natively. Blocks on the async adapter request.
    fn new() -> Result<Self, RunnerError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(RunnerError::NoAdapter)?;
        log::info!("Upload adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("terrain-runner-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;
        Ok(Self { device, queue })
    }
}

/// Runs full terrain cycles headlessly.
pub struct TerrainRunner {
    controller: TerrainController,
    cycles: u32,
    gpu: Option<GpuContext>,
}

impl TerrainRunner {
    pub fn new(config: PipelineConfig, cycles: u32, upload: bool) -> Result<Self, RunnerError> {
        let controller = TerrainController::from_config(config)?;
        let gpu = if upload { Some(GpuContext::new()?) } else { None };
        Ok(Self {
            controller,
            cycles: cycles.max(1),
            gpu,
        })
    }

    pub fn controller(&self) -> &TerrainController {
        &self.controller
    }

    /// Run every cycle, then optionally upload the final geometry.
    pub fn run(&mut self) -> Result<RunResult, RunnerError> {
        let mut cycle_times = Vec::with_capacity(self.cycles as usize);
        let mut stats: Vec<CycleStats> = Vec::with_capacity(self.cycles as usize);

        for cycle in 0..self.cycles {
            let started = Instant::now();
            let cycle_stats = self.controller.run_cycle()?.clone();
            cycle_times.push(started.elapsed());
            log::info!(
                "Cycle {}/{}: {} draws, {} vertices",
                cycle + 1,
                self.cycles,
                cycle_stats.draw_count,
                cycle_stats.vertices
            );
            stats.push(cycle_stats);
        }

        let uploaded_draws = match &self.gpu {
            Some(gpu) => {
                let layout = self.controller.layout();
                let mut buffers = TerrainDrawBuffers::new(
                    &gpu.device,
                    self.controller.config().page_size,
                    layout.chunk_count(),
                );
                buffers.upload(&gpu.device, &gpu.queue, self.controller.stores())?;
                Some(buffers.draw_count())
            }
            None => None,
        };

        let series = |f: fn(&CycleStats) -> Duration| {
            TimingSeries::from_samples(&stats.iter().map(f).collect::<Vec<_>>())
        };
        let config = self.controller.config();
        let stores = self.controller.stores();
        let last = stats.last().cloned().unwrap_or_default();
        Ok(RunResult {
            chunks_per_axis: config.chunks_per_axis,
            voxels_per_axis: config.voxels_per_axis,
            cycles: self.cycles,
            device_threads: self.controller.device_threads(),
            events: last.events,
            draw_count: last.draw_count,
            vertices: last.vertices,
            pages_in_use: self.controller.pages_in_use(),
            pages_materialized: stores.geometry.materialized_pages() as u32,
            lock_contention: stores.allocator.contention(),
            uploaded_draws,
            cycle: TimingSeries::from_samples(&cycle_times),
            generation: series(|s| s.generation_time),
            meshing: series(|s| s.meshing_time),
            collection: series(|s| s.collection_time),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_series_percentiles() {
        let samples: Vec<Duration> = (1..=20).map(Duration::from_millis).collect();
        let t = TimingSeries::from_samples(&samples);
        assert!((t.mean_ms - 10.5).abs() < 1e-9);
        assert_eq!(t.median_ms, 10.0);
        assert_eq!(t.p95_ms, 19.0);
        assert_eq!(t.min_ms, 1.0);
        assert_eq!(t.max_ms, 20.0);
    }

    #[test]
    fn test_empty_series_is_zero() {
        assert_eq!(TimingSeries::from_samples(&[]).max_ms, 0.0);
    }

    #[test]
    fn test_headless_run_reports_geometry() {
        let config = PipelineConfig {
            chunks_per_axis: [2, 2, 2],
            generation_batch: 4,
            meshing_rows_per_event: 4,
            max_pages: 32,
            ..Default::default()
        };
        let mut runner = TerrainRunner::new(config, 2, false).expect("runner");
        let result = runner.run().expect("run");
        assert_eq!(result.cycles, 2);
        assert!(result.draw_count > 0);
        assert_eq!(result.vertices % 3, 0);
        assert_eq!(result.pages_in_use, result.draw_count);
        // The second cycle takes fresh pages before releasing the first
        // cycle's, so more pages were touched than are held at the end.
        assert!(result.pages_materialized > result.pages_in_use);
        assert!(result.uploaded_draws.is_none());
    }
}
