use isoterra_core::constants::VERTEX_STRIDE;
use isoterra_core::types::Vertex;
use isoterra_sim::{AllocError, DrawIndirectCommand, TerrainStores};

/// Bytes per vertex in the GPU vertex buffer.
pub const VERTEX_BYTES: u64 = (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64;
/// Bytes per indirect command.
pub const COMMAND_BYTES: u64 = std::mem::size_of::<DrawIndirectCommand>() as u64;

/// Vertex layout of the shared geometry: one `vec4<f32>` position.
pub const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_BYTES,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Vertex range of one draw, in vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexRegion {
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// What an upload needs to copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub commands: Vec<DrawIndirectCommand>,
    pub regions: Vec<VertexRegion>,
    /// One past the highest vertex any command reads.
    pub vertex_extent: u32,
}

/// Plan an upload of the last draw collection.
pub fn plan_upload(commands: Vec<DrawIndirectCommand>) -> UploadPlan {
    let regions: Vec<VertexRegion> = commands
        .iter()
        .map(|c| VertexRegion {
            first_vertex: c.first_vertex,
            vertex_count: c.vertex_count,
        })
        .collect();
    let vertex_extent = regions
        .iter()
        .map(|r| r.first_vertex.saturating_add(r.vertex_count))
        .max()
        .unwrap_or(0);
    UploadPlan {
        commands,
        regions,
        vertex_extent,
    }
}

impl UploadPlan {
    /// Keep only the draws whose vertices end at or before `vertex_limit`.
    /// Commands and regions stay paired, so every kept command reads
    /// uploaded vertices.
    pub fn within(self, vertex_limit: u32) -> UploadPlan {
        let fits = |c: &DrawIndirectCommand| {
            c.first_vertex as u64 + c.vertex_count as u64 <= vertex_limit as u64
        };
        let total = self.commands.len();
        let commands: Vec<_> = self.commands.into_iter().filter(fits).collect();
        if commands.len() < total {
            log::warn!(
                "Dropping {} draws past vertex {}",
                total - commands.len(),
                vertex_limit
            );
        }
        plan_upload(commands)
    }
}

/// GPU copies of the geometry store and the indirect command list.
///
/// The vertex buffer mirrors the store's addressing, so commands keep their
/// `first_vertex` unchanged; it grows when a draw reads past its end.
pub struct TerrainDrawBuffers {
    vertex_buffer: wgpu::Buffer,
    indirect_buffer: wgpu::Buffer,
    vertex_capacity: u32,
    command_capacity: u32,
    draw_count: u32,
}

impl TerrainDrawBuffers {
    pub fn new(device: &wgpu::Device, vertex_capacity: u32, command_capacity: u32) -> Self {
        let vertex_capacity = vertex_capacity.max(1);
        let command_capacity = command_capacity.max(1);
        log::info!(
            "TerrainDrawBuffers: {} vertices ({} KB), {} commands",
            vertex_capacity,
            vertex_capacity as u64 * VERTEX_BYTES / 1024,
            command_capacity
        );
        Self {
            vertex_buffer: Self::create_vertex_buffer(device, vertex_capacity),
            indirect_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("terrain-indirect-buffer"),
                size: command_capacity as u64 * COMMAND_BYTES,
                usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            vertex_capacity,
            command_capacity,
            draw_count: 0,
        }
    }

    fn create_vertex_buffer(device: &wgpu::Device, vertices: u32) -> wgpu::Buffer {
        let max = device.limits().max_buffer_size;
        let size = (vertices as u64 * VERTEX_BYTES).min(max);
        if size < vertices as u64 * VERTEX_BYTES {
            log::warn!(
                "Terrain vertex buffer clamped to device maxBufferSize={} bytes",
                max
            );
        }
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain-vertex-buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Copy the compacted commands and the vertices they read.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        stores: &TerrainStores,
    ) -> Result<(), AllocError> {
        let plan = plan_upload(stores.draw_commands());

        if plan.vertex_extent > self.vertex_capacity {
            self.vertex_capacity = plan
                .vertex_extent
                .checked_next_power_of_two()
                .unwrap_or(plan.vertex_extent);
            self.vertex_buffer = Self::create_vertex_buffer(device, self.vertex_capacity);
        }
        if plan.commands.len() as u32 > self.command_capacity {
            self.command_capacity = plan.commands.len() as u32;
            self.indirect_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("terrain-indirect-buffer"),
                size: self.command_capacity as u64 * COMMAND_BYTES,
                usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
        }

        let vertex_limit = (self.vertex_buffer.size() / VERTEX_BYTES).min(u32::MAX as u64);
        let plan = plan.within(vertex_limit as u32);
        for region in &plan.regions {
            let vertices: Vec<Vertex> = stores
                .geometry
                .read_range(region.first_vertex, region.vertex_count)?;
            queue.write_buffer(
                &self.vertex_buffer,
                region.first_vertex as u64 * VERTEX_BYTES,
                bytemuck::cast_slice(&vertices),
            );
        }
        if !plan.commands.is_empty() {
            queue.write_buffer(&self.indirect_buffer, 0, bytemuck::cast_slice(&plan.commands));
        }
        self.draw_count = plan.commands.len() as u32;
        log::debug!(
            "Uploaded {} draws reading {} vertices",
            self.draw_count,
            plan.vertex_extent
        );
        Ok(())
    }

    /// Commands in the indirect buffer, all reading uploaded vertices.
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn indirect_buffer(&self) -> &wgpu::Buffer {
        &self.indirect_buffer
    }
}
