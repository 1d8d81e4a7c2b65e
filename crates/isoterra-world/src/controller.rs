//! Event-driven terrain pipeline.
//!
//! Each progress event runs one bounded batch and, if work remains, queues
//! its own continuation. Meshing completion triggers draw collection.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::IVec3;
use isoterra_core::config::PipelineConfig;
use isoterra_core::types::{GridLayout, Ray};
use isoterra_sim::passes::{draw_collection, generation, meshing};
use isoterra_sim::{DensitySource, Device, DrawIndirectCommand, TerrainStores};
use isoterra_tables::{load_tables_or_builtin, McTables};

use crate::dispatch::{plan_generation_batch, plan_meshing_rows};
use crate::error::TerrainError;
use crate::events::{EventQueue, TerrainEvent};
use crate::state_machine::{compare_progress, Stage, StageState};
use crate::terrain::TerrainDensity;

/// Result of processing one queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An event was handled and more are queued.
    Pending,
    /// An event was handled and the queue is now empty.
    Idle,
    /// The queue was already empty.
    Empty,
}

/// Counters and timings of the current cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    pub events: u64,
    pub stale_events: u64,
    pub generated_chunks: u32,
    pub meshed_chunks: u32,
    pub failed_chunks: u32,
    pub vertices: u64,
    pub draw_count: u32,
    pub generation_time: Duration,
    pub meshing_time: Duration,
    pub collection_time: Duration,
}

pub struct TerrainController {
    config: PipelineConfig,
    layout: GridLayout,
    device: Device,
    stores: Arc<TerrainStores>,
    tables: Arc<McTables>,
    source: Arc<dyn DensitySource>,
    generation: Stage,
    meshing: Stage,
    queue: EventQueue,
    stats: CycleStats,
}

impl TerrainController {
    /// Controller over a caller-supplied density source and tables.
    pub fn new(
        config: PipelineConfig,
        tables: McTables,
        source: Arc<dyn DensitySource>,
    ) -> Result<Self, TerrainError> {
        config.validate()?;
        let layout = config.layout();
        let device = Device::new(
            config.worker_threads,
            Duration::from_millis(config.wait_timeout_ms),
        )?;
        let stores = Arc::new(TerrainStores::new(&config));
        log::info!(
            "TerrainController: {} chunks of {} voxels",
            layout.chunk_count(),
            layout.voxels_per_chunk()
        );
        Ok(Self {
            config,
            layout,
            device,
            stores,
            tables: Arc::new(tables),
            source,
            generation: Stage::new(layout.chunks),
            meshing: Stage::new(layout.chunks),
            queue: EventQueue::new(),
            stats: CycleStats::default(),
        })
    }

    /// Controller using the configured lookup tables (built-in when no
    /// paths are set) and the seeded terrain density.
    pub fn from_config(config: PipelineConfig) -> Result<Self, TerrainError> {
        config.validate()?;
        let tables = load_tables_or_builtin(
            config.configuration_lut.as_deref(),
            config.vertex_count_lut.as_deref(),
        )?;
        let source: Arc<dyn DensitySource> =
            Arc::new(TerrainDensity::for_layout(config.seed, &config.layout()));
        Self::new(config, tables, source)
    }

    /// Queue an event for the next `step`.
    pub fn submit(&mut self, event: TerrainEvent) {
        self.queue.push(event);
    }

    /// Handle the next queued event.
    pub fn step(&mut self) -> Result<StepOutcome, TerrainError> {
        let Some(event) = self.queue.pop() else {
            return Ok(StepOutcome::Empty);
        };
        self.handle(event)?;
        Ok(if self.queue.is_empty() {
            StepOutcome::Idle
        } else {
            StepOutcome::Pending
        })
    }

    /// Handle queued events until none remain. Returns how many ran.
    pub fn run_until_idle(&mut self) -> Result<u64, TerrainError> {
        let mut handled = 0;
        while self.step()? != StepOutcome::Empty {
            handled += 1;
        }
        Ok(handled)
    }

    /// Route one event to its handler.
    pub fn handle(&mut self, event: TerrainEvent) -> Result<(), TerrainError> {
        self.stats.events += 1;
        log::trace!("Handling {} event", event.name());
        match event {
            TerrainEvent::GenerationProgress { cursor } => self.on_generation_progress(cursor),
            TerrainEvent::MeshingProgress { cursor } => self.on_meshing_progress(cursor),
            TerrainEvent::ModificationRequest { ray } => self.on_modification(ray),
        }
    }

    /// Reset both stages and the draw state so the grid can be processed
    /// again. Geometry pages stay owned until each chunk is re-meshed.
    pub fn begin_cycle(&mut self) {
        self.generation.reset();
        self.meshing.reset();
        self.queue.clear();
        self.stores.counters.reset();
        self.stats = CycleStats::default();
        log::debug!("Cycle reset");
    }

    /// Checks an inbound cursor against the stage. `Ok(false)` means the
    /// event is stale and should be dropped.
    fn accept_cursor(
        stage: &Stage,
        name: &'static str,
        received: IVec3,
    ) -> Result<bool, TerrainError> {
        let expected = stage.cursor.position();
        match compare_progress(received, expected) {
            Ordering::Equal => Ok(!stage.cursor.is_done()),
            Ordering::Less => Ok(false),
            Ordering::Greater => Err(TerrainError::CursorMismatch {
                stage: name,
                expected,
                received,
            }),
        }
    }

    pub fn on_generation_progress(&mut self, cursor: IVec3) -> Result<(), TerrainError> {
        if !Self::accept_cursor(&self.generation, "generation", cursor)? {
            self.stats.stale_events += 1;
            log::debug!("Ignoring stale generation event at {cursor}");
            return Ok(());
        }

        let started = Instant::now();
        let chunks =
            plan_generation_batch(&mut self.generation.cursor, self.config.generation_batch);
        generation::generate_chunks(&self.device, &self.stores, &self.source, &chunks)?;
        self.stats.generation_time += started.elapsed();
        self.stats.generated_chunks += chunks.len() as u32;
        self.generation.settle();

        let next = self.generation.cursor.position();
        log::debug!("Generated {} chunks, cursor now {}", chunks.len(), next);
        if self.generation.state == StageState::Done {
            log::info!(
                "Generation complete: {} chunks in {:.1} ms",
                self.stats.generated_chunks,
                self.stats.generation_time.as_secs_f64() * 1000.0
            );
        } else {
            self.queue.push(TerrainEvent::GenerationProgress { cursor: next });
        }
        Ok(())
    }

    pub fn on_meshing_progress(&mut self, cursor: IVec3) -> Result<(), TerrainError> {
        if !Self::accept_cursor(&self.meshing, "meshing", cursor)? {
            self.stats.stale_events += 1;
            log::debug!("Ignoring stale meshing event at {cursor}");
            return Ok(());
        }

        let started = Instant::now();
        let rows = plan_meshing_rows(&mut self.meshing.cursor, self.config.meshing_rows_per_event);
        let mut failures = Vec::new();
        for row in &rows {
            let chunks = row.chunks(&self.layout);
            let failed = meshing::mesh_chunks(&self.device, &self.stores, &self.tables, &chunks)?;
            self.stats.meshed_chunks += (chunks.len() - failed.len()) as u32;
            self.stats.failed_chunks += failed.len() as u32;
            failures.extend(failed);
        }
        self.stats.meshing_time += started.elapsed();
        self.meshing.settle();

        let next = self.meshing.cursor.position();
        log::debug!("Meshed {} rows, cursor now {}", rows.len(), next);
        if self.meshing.state == StageState::Done {
            log::info!(
                "Meshing complete: {} chunks in {:.1} ms",
                self.stats.meshed_chunks,
                self.stats.meshing_time.as_secs_f64() * 1000.0
            );
            self.collect_draws()?;
        } else {
            self.queue.push(TerrainEvent::MeshingProgress { cursor: next });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            for failure in &failures {
                log::warn!("{failure}");
            }
            Err(TerrainError::Meshing { failures })
        }
    }

    pub fn on_modification(&mut self, ray: Ray) -> Result<(), TerrainError> {
        log::warn!(
            "Modification request from {} along {} rejected",
            ray.origin,
            ray.direction
        );
        Err(TerrainError::Unsupported("isosurface modification"))
    }

    fn collect_draws(&mut self) -> Result<(), TerrainError> {
        let started = Instant::now();
        let draw_count = draw_collection::collect_draws(&self.device, &self.stores)?;
        self.stats.collection_time += started.elapsed();
        self.stats.draw_count = draw_count;
        self.stats.vertices = self
            .stores
            .draw_table
            .entries()
            .iter()
            .map(|e| e.vertex_count as u64)
            .sum();
        log::info!(
            "Draw collection: {} draws, {} vertices, {} pages in use",
            draw_count,
            self.stats.vertices,
            self.pages_in_use()
        );
        Ok(())
    }

    /// Generate and mesh the whole grid from scratch.
    pub fn run_cycle(&mut self) -> Result<&CycleStats, TerrainError> {
        self.begin_cycle();
        self.submit(TerrainEvent::GenerationProgress { cursor: IVec3::ZERO });
        self.run_until_idle()?;
        self.submit(TerrainEvent::MeshingProgress { cursor: IVec3::ZERO });
        self.run_until_idle()?;
        Ok(&self.stats)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn stores(&self) -> &Arc<TerrainStores> {
        &self.stores
    }

    pub fn tables(&self) -> &McTables {
        &self.tables
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn generation_state(&self) -> StageState {
        self.generation.state
    }

    pub fn meshing_state(&self) -> StageState {
        self.meshing.state
    }

    pub fn generation_cursor(&self) -> IVec3 {
        self.generation.cursor.position()
    }

    pub fn meshing_cursor(&self) -> IVec3 {
        self.meshing.cursor.position()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn pages_in_use(&self) -> u32 {
        self.stores.allocator.capacity() - self.stores.allocator.free_count()
    }

    /// Commands produced by the last draw collection.
    pub fn draw_commands(&self) -> Vec<DrawIndirectCommand> {
        self.stores.draw_commands()
    }

    pub fn draw_count(&self) -> u32 {
        self.stores.counters.draw_count()
    }

    pub fn device_threads(&self) -> usize {
        self.device.threads()
    }
}
