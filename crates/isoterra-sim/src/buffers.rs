//! Shared stores touched by device invocations.
//!
//! Every store is a region of atomics so any number of invocations can read
//! and write it through a shared reference. Floats are stored as their bit
//! patterns.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use isoterra_core::config::PipelineConfig;
use isoterra_core::constants::VERTEX_STRIDE;
use isoterra_core::math::world_field_index;
use isoterra_core::types::{GridLayout, PageIndex, Vertex, VoxelCoord};

use crate::allocator::PageAllocator;
use crate::error::AllocError;

/// Bit pattern of a sample no generation pass has written yet.
const UNDEFINED_SAMPLE: u32 = 0x7FC0_0000;

fn atomic_region(len: usize, init: u32) -> Box<[AtomicU32]> {
    (0..len).map(|_| AtomicU32::new(init)).collect()
}

/// Density samples of every chunk, laid out by `field_index`.
pub struct ScalarFieldStore {
    layout: GridLayout,
    samples: Box<[AtomicU32]>,
}

impl ScalarFieldStore {
    pub fn new(layout: GridLayout) -> Self {
        let len = layout.total_voxels() as usize;
        log::info!(
            "ScalarFieldStore: {} samples ({} KB)",
            len,
            len * std::mem::size_of::<f32>() / 1024
        );
        Self {
            layout,
            samples: atomic_region(len, UNDEFINED_SAMPLE),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn write(&self, index: u32, value: f32) {
        self.samples[index as usize].store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn read(&self, index: u32) -> f32 {
        f32::from_bits(self.samples[index as usize].load(Ordering::Relaxed))
    }

    /// Sample at a grid-global voxel coordinate. The coordinate must be
    /// inside the grid.
    #[inline]
    pub fn sample(&self, world: VoxelCoord) -> f32 {
        self.read(world_field_index(&self.layout, world))
    }

    /// Whether a generation pass has written this sample.
    pub fn is_defined(&self, index: u32) -> bool {
        !self.read(index).is_nan()
    }

    /// Mark every sample undefined again.
    pub fn clear(&self) {
        for s in self.samples.iter() {
            s.store(UNDEFINED_SAMPLE, Ordering::Relaxed);
        }
    }
}

/// One large vertex store split into fixed-size pages.
///
/// Pages are materialized on first write, so the store can span the full
/// allocator address space without reserving it.
pub struct GeometryStore {
    page_size: u32,
    pages: Box<[OnceLock<Box<[AtomicU32]>>]>,
}

impl GeometryStore {
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        log::info!(
            "GeometryStore: {} pages of {} vertices, materialized on demand",
            max_pages,
            page_size
        );
        Self {
            page_size,
            pages: (0..max_pages).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Pages that have backing memory.
    pub fn materialized_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.get().is_some()).count()
    }

    fn locate(&self, vertex: u32) -> Result<(usize, usize), AllocError> {
        let page = vertex / self.page_size;
        if page >= self.page_count() {
            return Err(AllocError::OutOfRange {
                first: page,
                count: 1,
                capacity: self.page_count(),
            });
        }
        let offset = (vertex % self.page_size) as usize * VERTEX_STRIDE;
        Ok((page as usize, offset))
    }

    /// Write one vertex at a global vertex index.
    pub fn write_vertex(&self, vertex: u32, value: Vertex) -> Result<(), AllocError> {
        let (page, offset) = self.locate(vertex)?;
        let words = self.pages[page]
            .get_or_init(|| atomic_region(self.page_size as usize * VERTEX_STRIDE, 0));
        for (slot, component) in words[offset..offset + VERTEX_STRIDE].iter().zip(value) {
            slot.store(component.to_bits(), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Read one vertex. Unwritten pages read as zeros.
    pub fn read_vertex(&self, vertex: u32) -> Result<Vertex, AllocError> {
        let (page, offset) = self.locate(vertex)?;
        let mut out = [0.0; VERTEX_STRIDE];
        if let Some(words) = self.pages[page].get() {
            for (dst, slot) in out.iter_mut().zip(&words[offset..offset + VERTEX_STRIDE]) {
                *dst = f32::from_bits(slot.load(Ordering::Relaxed));
            }
        }
        Ok(out)
    }

    /// Copy `count` vertices starting at `first`.
    pub fn read_range(&self, first: u32, count: u32) -> Result<Vec<Vertex>, AllocError> {
        (first..first + count).map(|v| self.read_vertex(v)).collect()
    }
}

/// Per-chunk mesh result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawEntry {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    /// First page of the run holding this chunk's vertices.
    pub first_page: PageIndex,
    /// Pages in the run; 0 when the chunk owns no geometry.
    pub page_count: u32,
}

const ENTRY_WORDS: usize = 4;

/// Draw table indexed by `chunk_index`. One writer per entry per cycle.
pub struct ChunkDrawTable {
    words: Box<[AtomicU32]>,
}

impl ChunkDrawTable {
    pub fn new(chunk_count: u32) -> Self {
        Self {
            words: atomic_region(chunk_count as usize * ENTRY_WORDS, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len() / ENTRY_WORDS
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, chunk: u32) -> DrawEntry {
        let base = chunk as usize * ENTRY_WORDS;
        let w = |i: usize| self.words[base + i].load(Ordering::Acquire);
        DrawEntry {
            vertex_offset: w(0),
            vertex_count: w(1),
            first_page: w(2),
            page_count: w(3),
        }
    }

    pub fn set(&self, chunk: u32, entry: DrawEntry) {
        let base = chunk as usize * ENTRY_WORDS;
        for (i, value) in [
            entry.vertex_offset,
            entry.vertex_count,
            entry.first_page,
            entry.page_count,
        ]
        .into_iter()
        .enumerate()
        {
            self.words[base + i].store(value, Ordering::Release);
        }
    }

    pub fn entries(&self) -> Vec<DrawEntry> {
        (0..self.len() as u32).map(|c| self.get(c)).collect()
    }

    /// Reset every entry to `(0, 0)` with no pages.
    pub fn clear(&self) {
        for w in self.words.iter() {
            w.store(0, Ordering::Release);
        }
    }
}

/// Counters shared by every invocation of a pass.
#[derive(Default)]
pub struct GlobalCounters {
    draw_count: AtomicU32,
}

impl GlobalCounters {
    pub fn draw_count(&self) -> u32 {
        self.draw_count.load(Ordering::Acquire)
    }

    /// Claim the next command slot.
    #[inline]
    pub fn claim_draw_slot(&self) -> u32 {
        self.draw_count.fetch_add(1, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.draw_count.store(0, Ordering::Release);
    }
}

/// Non-indexed indirect draw arguments, laid out as the graphics API reads
/// them.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectCommand {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectCommand {
    pub fn for_entry(entry: &DrawEntry) -> Self {
        Self {
            vertex_count: entry.vertex_count,
            instance_count: 1,
            first_vertex: entry.vertex_offset,
            first_instance: 0,
        }
    }
}

const COMMAND_WORDS: usize = 4;

/// Indirect command array, one slot per chunk.
pub struct IndirectCommandStore {
    words: Box<[AtomicU32]>,
}

impl IndirectCommandStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            words: atomic_region(capacity as usize * COMMAND_WORDS, 0),
        }
    }

    pub fn capacity(&self) -> u32 {
        (self.words.len() / COMMAND_WORDS) as u32
    }

    pub fn write(&self, slot: u32, command: DrawIndirectCommand) {
        let base = slot as usize * COMMAND_WORDS;
        let words: [u32; COMMAND_WORDS] = bytemuck::cast(command);
        for (i, value) in words.into_iter().enumerate() {
            self.words[base + i].store(value, Ordering::Release);
        }
    }

    pub fn read(&self, slot: u32) -> DrawIndirectCommand {
        let base = slot as usize * COMMAND_WORDS;
        let words: [u32; COMMAND_WORDS] =
            std::array::from_fn(|i| self.words[base + i].load(Ordering::Acquire));
        bytemuck::cast(words)
    }

    /// The first `count` commands.
    pub fn commands(&self, count: u32) -> Vec<DrawIndirectCommand> {
        (0..count.min(self.capacity())).map(|s| self.read(s)).collect()
    }
}

/// Every store of one terrain pipeline, shared by all invocations.
pub struct TerrainStores {
    pub layout: GridLayout,
    pub field: ScalarFieldStore,
    pub geometry: GeometryStore,
    pub allocator: PageAllocator,
    pub draw_table: ChunkDrawTable,
    pub counters: GlobalCounters,
    pub commands: IndirectCommandStore,
}

impl TerrainStores {
    /// Create all stores from a validated config.
    pub fn new(config: &PipelineConfig) -> Self {
        let layout = config.layout();
        let chunk_count = layout.chunk_count();
        Self {
            layout,
            field: ScalarFieldStore::new(layout),
            geometry: GeometryStore::new(config.page_size, config.max_pages),
            allocator: PageAllocator::new(config.max_pages),
            draw_table: ChunkDrawTable::new(chunk_count),
            counters: GlobalCounters::default(),
            commands: IndirectCommandStore::new(chunk_count),
        }
    }

    /// Compacted commands of the last draw collection.
    pub fn draw_commands(&self) -> Vec<DrawIndirectCommand> {
        self.commands.commands(self.counters.draw_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    #[test]
    fn test_indirect_command_layout() {
        assert_eq!(std::mem::size_of::<DrawIndirectCommand>(), 16);
        let cmd = DrawIndirectCommand::for_entry(&DrawEntry {
            vertex_offset: 8192,
            vertex_count: 3,
            first_page: 1,
            page_count: 1,
        });
        let words: [u32; 4] = bytemuck::cast(cmd);
        assert_eq!(words, [3, 1, 8192, 0]);
    }

    #[test]
    fn test_field_starts_undefined() {
        let field = ScalarFieldStore::new(GridLayout::new(IVec3::ONE, IVec3::splat(2)));
        assert_eq!(field.len(), 8);
        assert!((0..8).all(|i| !field.is_defined(i)));
        field.write(3, -0.5);
        assert!(field.is_defined(3));
        assert_eq!(field.read(3), -0.5);
        field.clear();
        assert!(!field.is_defined(3));
    }

    #[test]
    fn test_geometry_pages_materialize_on_write() {
        let geometry = GeometryStore::new(16, 1000);
        assert_eq!(geometry.materialized_pages(), 0);
        assert_eq!(geometry.read_vertex(40).expect("in range"), [0.0; 4]);

        geometry.write_vertex(33, [1.0, 2.0, 3.0, 1.0]).expect("in range");
        assert_eq!(geometry.materialized_pages(), 1);
        assert_eq!(geometry.read_vertex(33).expect("in range"), [1.0, 2.0, 3.0, 1.0]);
        // Reads never materialize a page.
        assert_eq!(geometry.read_vertex(48).expect("in range"), [0.0; 4]);
        assert_eq!(geometry.materialized_pages(), 1);
        geometry.write_vertex(47, [0.0; 4]).expect("in range");
        assert_eq!(geometry.materialized_pages(), 2);
    }

    #[test]
    fn test_geometry_rejects_out_of_range_vertex() {
        let geometry = GeometryStore::new(16, 2);
        assert!(matches!(
            geometry.write_vertex(32, [0.0; 4]),
            Err(AllocError::OutOfRange { first: 2, .. })
        ));
    }

    #[test]
    fn test_draw_table_set_get_clear() {
        let table = ChunkDrawTable::new(4);
        assert_eq!(table.get(2), DrawEntry::default());
        let entry = DrawEntry {
            vertex_offset: 16384,
            vertex_count: 42,
            first_page: 2,
            page_count: 1,
        };
        table.set(2, entry);
        assert_eq!(table.get(2), entry);
        assert_eq!(table.entries().iter().filter(|e| e.vertex_count > 0).count(), 1);
        table.clear();
        assert_eq!(table.get(2), DrawEntry::default());
    }

    #[test]
    fn test_command_store_roundtrip_and_bounds() {
        let store = IndirectCommandStore::new(2);
        let cmd = DrawIndirectCommand {
            vertex_count: 6,
            instance_count: 1,
            first_vertex: 24,
            first_instance: 0,
        };
        store.write(1, cmd);
        assert_eq!(store.read(1), cmd);
        assert_eq!(store.commands(5).len(), 2);
    }
}
