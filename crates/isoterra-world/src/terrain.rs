use isoterra_core::types::{GridLayout, VoxelCoord};
use isoterra_sim::DensitySource;

/// Heightfield density: negative below a noise-displaced surface, positive
/// above it, in voxel units.
pub struct TerrainDensity {
    /// Permutation table for simplex noise (doubled for wrapping).
    perm: [u8; 512],
    /// Surface height with zero noise.
    base_height: f64,
    /// Height swing of the first octave.
    amplitude: f64,
}

impl TerrainDensity {
    pub fn new(seed: u64, base_height: f64, amplitude: f64) -> Self {
        Self {
            perm: build_permutation(seed),
            base_height,
            amplitude,
        }
    }

    /// Surface around mid-height of the grid, swinging a quarter of it.
    pub fn for_layout(seed: u64, layout: &GridLayout) -> Self {
        let height = layout.grid_voxels().y as f64;
        Self::new(seed, height * 0.5, height * 0.25)
    }

    /// Surface height at (x, z), three octaves of simplex noise.
    pub fn surface_height(&self, wx: i32, wz: i32) -> f64 {
        let x = wx as f64;
        let z = wz as f64;
        let scale = 0.03;
        let mut h = 0.0f64;
        h += self.simplex2d(x * scale, z * scale);
        h += self.simplex2d(x * scale * 2.0 + 100.0, z * scale * 2.0 + 100.0) * 0.5;
        h += self.simplex2d(x * scale * 4.0 + 200.0, z * scale * 4.0 + 200.0) * 0.25;
        self.base_height + h * self.amplitude
    }

    /// 2D simplex noise in [-1, 1].
    fn simplex2d(&self, x: f64, z: f64) -> f64 {
        const F2: f64 = 0.5 * (1.732_050_807_568_877_2 - 1.0);
        const G2: f64 = (3.0 - 1.732_050_807_568_877_2) / 6.0;

        let s = (x + z) * F2;
        let i = (x + s).floor();
        let j = (z + s).floor();

        let t = (i + j) * G2;
        let x0 = x - (i - t);
        let y0 = z - (j - t);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + G2;
        let y1 = y0 - j1 as f64 + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;

        let ii = (i as i32 & 255) as usize;
        let jj = (j as i32 & 255) as usize;
        let p = &self.perm;

        let g0 = p[ii + p[jj] as usize] as usize;
        let g1 = p[ii + i1 + p[jj + j1] as usize] as usize;
        let g2 = p[ii + 1 + p[jj + 1] as usize] as usize;

        70.0 * (corner(g0, x0, y0) + corner(g1, x1, y1) + corner(g2, x2, y2))
    }
}

impl DensitySource for TerrainDensity {
    fn density(&self, world: VoxelCoord) -> f32 {
        (world.y as f64 - self.surface_height(world.x, world.z)) as f32
    }
}

fn corner(hash: usize, x: f64, y: f64) -> f64 {
    const GRAD: [[f64; 2]; 8] = [
        [1.0, 1.0],
        [-1.0, 1.0],
        [1.0, -1.0],
        [-1.0, -1.0],
        [1.0, 0.0],
        [-1.0, 0.0],
        [0.0, 1.0],
        [0.0, -1.0],
    ];
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        return 0.0;
    }
    let g = GRAD[hash % GRAD.len()];
    let t = t * t;
    t * t * (g[0] * x + g[1] * y)
}

/// Seeded Fisher-Yates shuffle of 0..256, doubled.
fn build_permutation(seed: u64) -> [u8; 512] {
    let mut p: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut rng = seed;
    for i in (1..256).rev() {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = (rng >> 33) as usize % (i + 1);
        p.swap(i, j);
    }
    std::array::from_fn(|i| p[i & 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    #[test]
    fn test_density_deterministic_per_seed() {
        let a = TerrainDensity::new(7, 32.0, 16.0);
        let b = TerrainDensity::new(7, 32.0, 16.0);
        let c = TerrainDensity::new(8, 32.0, 16.0);
        let p = IVec3::new(13, 30, 41);
        assert_eq!(a.density(p), b.density(p));
        let differs = (0..64).any(|x| a.surface_height(x, 5) != c.surface_height(x, 5));
        assert!(differs, "different seeds should give different terrain");
    }

    #[test]
    fn test_density_sign_follows_height() {
        let layout = GridLayout::default();
        let terrain = TerrainDensity::for_layout(42, &layout);
        for x in [0, 17, 63] {
            for z in [0, 29, 63] {
                let h = terrain.surface_height(x, z);
                assert!(terrain.density(IVec3::new(x, 0, z)) < 0.0, "floor is solid");
                assert!(terrain.density(IVec3::new(x, 63, z)) > 0.0, "ceiling is open");
                let above = IVec3::new(x, h.ceil() as i32 + 1, z);
                assert!(terrain.density(above) > 0.0);
            }
        }
    }

    #[test]
    fn test_surface_stays_within_amplitude() {
        let terrain = TerrainDensity::new(3, 32.0, 16.0);
        for x in (0..256).step_by(7) {
            for z in (0..256).step_by(11) {
                let h = terrain.surface_height(x, z);
                // Octave weights sum to 1.75.
                assert!((32.0 - 16.0 * 1.75..=32.0 + 16.0 * 1.75).contains(&h));
            }
        }
    }
}
