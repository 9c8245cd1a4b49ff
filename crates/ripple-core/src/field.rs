use glam::Vec2;

use crate::encoding::StorageEncoding;

/// One decoded field cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldSample {
    pub pressure: f32,
    pub velocity: f32,
    pub grad_x: f32,
    pub grad_y: f32,
}

impl FieldSample {
    pub fn gradient(&self) -> Vec2 {
        Vec2::new(self.grad_x, self.grad_y)
    }

    fn to_array(self) -> [f32; 4] {
        [self.pressure, self.velocity, self.grad_x, self.grad_y]
    }

    fn from_array(v: [f32; 4]) -> Self {
        Self { pressure: v[0], velocity: v[1], grad_x: v[2], grad_y: v[3] }
    }
}

/// Square grid of 4-channel cells stored in a [`StorageEncoding`].
///
/// Addressing clamps to the edge, matching `CLAMP_TO_EDGE` sampling on the
/// GPU path. Row 0 is the bottom of the image (uv.y = 0).
#[derive(Debug, Clone)]
pub struct FieldGrid {
    resolution: u32,
    encoding: StorageEncoding,
    cells: Vec<[f32; 4]>,
}

impl FieldGrid {
    /// A grid whose every cell decodes to zero.
    pub fn new(resolution: u32, encoding: StorageEncoding) -> Self {
        let zero = encoding.zero();
        Self {
            resolution,
            encoding,
            cells: vec![[zero; 4]; (resolution as usize) * (resolution as usize)],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn encoding(&self) -> StorageEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> usize {
        let max = self.resolution as i64 - 1;
        let cx = x.clamp(0, max) as usize;
        let cy = y.clamp(0, max) as usize;
        cy * self.resolution as usize + cx
    }

    /// Raw stored channels at a clamped cell coordinate.
    #[inline]
    pub fn stored(&self, x: i64, y: i64) -> [f32; 4] {
        self.cells[self.index(x, y)]
    }

    /// Decoded pressure only. Hot path for the stencil.
    #[inline]
    pub fn pressure(&self, x: i64, y: i64) -> f32 {
        self.encoding.decode(self.cells[self.index(x, y)][0])
    }

    /// Decoded cell at a clamped coordinate.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> FieldSample {
        let s = self.stored(x, y);
        let e = self.encoding;
        FieldSample::from_array([e.decode(s[0]), e.decode(s[1]), e.decode(s[2]), e.decode(s[3])])
    }

    /// Encode and store a decoded cell.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, sample: FieldSample) {
        let i = (y as usize) * self.resolution as usize + x as usize;
        let e = self.encoding;
        self.cells[i] = sample.to_array().map(|v| e.encode(v));
    }

    /// Overwrite just the gradient channels of a cell.
    #[inline]
    pub fn set_gradient(&mut self, x: u32, y: u32, grad_x: f32, grad_y: f32) {
        let i = (y as usize) * self.resolution as usize + x as usize;
        self.cells[i][2] = self.encoding.encode(grad_x);
        self.cells[i][3] = self.encoding.encode(grad_y);
    }

    /// Bilinearly filtered decoded sample at a `[0, 1]²` coordinate.
    pub fn sample_bilinear(&self, uv: Vec2) -> FieldSample {
        let n = self.resolution as f32;
        let fx = uv.x * n - 0.5;
        let fy = uv.y * n - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.stored(x0, y0);
        let b = self.stored(x0 + 1, y0);
        let c = self.stored(x0, y0 + 1);
        let d = self.stored(x0 + 1, y0 + 1);

        let mut out = [0.0f32; 4];
        for ch in 0..4 {
            let bottom = a[ch] + (b[ch] - a[ch]) * tx;
            let top = c[ch] + (d[ch] - c[ch]) * tx;
            out[ch] = self.encoding.decode(bottom + (top - bottom) * ty);
        }
        FieldSample::from_array(out)
    }

    /// Cell nearest to a `[0, 1]²` coordinate.
    pub fn cell_at(&self, uv: Vec2) -> (u32, u32) {
        let max = self.resolution - 1;
        let x = ((uv.x * self.resolution as f32) as i64).clamp(0, max as i64) as u32;
        let y = ((uv.y * self.resolution as f32) as i64).clamp(0, max as i64) as u32;
        (x, y)
    }

    /// Centre of a cell in `[0, 1]²`.
    #[inline]
    pub fn cell_uv(&self, x: u32, y: u32) -> Vec2 {
        let n = self.resolution as f32;
        Vec2::new((x as f32 + 0.5) / n, (y as f32 + 0.5) / n)
    }

    /// Mean absolute decoded pressure over the grid.
    pub fn mean_abs_pressure(&self) -> f32 {
        if self.cells.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .cells
            .iter()
            .map(|c| self.encoding.decode(c[0]).abs() as f64)
            .sum();
        (sum / self.cells.len() as f64) as f32
    }

    /// Iterator over every decoded cell, row-major from the bottom row.
    pub fn samples(&self) -> impl Iterator<Item = FieldSample> + '_ {
        let e = self.encoding;
        self.cells
            .iter()
            .map(move |s| FieldSample::from_array(s.map(|v| e.decode(v))))
    }

    pub fn clear(&mut self) {
        let zero = self.encoding.zero();
        self.cells.fill([zero; 4]);
    }
}

/// Ping-pong pair of field grids.
///
/// The stepper reads from [`read`](Self::read) and writes the other grid;
/// [`swap`](Self::swap) exchanges their roles. Nothing else writes either grid.
#[derive(Debug, Clone)]
pub struct FieldBuffers {
    grids: [FieldGrid; 2],
    read_idx: usize,
    swaps: u64,
}

impl FieldBuffers {
    pub fn new(resolution: u32, encoding: StorageEncoding) -> Self {
        Self {
            grids: [FieldGrid::new(resolution, encoding), FieldGrid::new(resolution, encoding)],
            read_idx: 0,
            swaps: 0,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.grids[0].resolution()
    }

    pub fn encoding(&self) -> StorageEncoding {
        self.grids[0].encoding()
    }

    /// The grid holding the latest completed step.
    pub fn read(&self) -> &FieldGrid {
        &self.grids[self.read_idx]
    }

    /// Index (0 or 1) of the grid currently in the read role.
    pub fn read_index(&self) -> usize {
        self.read_idx
    }

    /// Index of the grid currently in the write role.
    pub fn write_index(&self) -> usize {
        1 - self.read_idx
    }

    /// Borrow the read grid immutably and the write grid mutably.
    pub fn split_mut(&mut self) -> (&FieldGrid, &mut FieldGrid) {
        let [a, b] = &mut self.grids;
        if self.read_idx == 0 {
            (&*a, b)
        } else {
            (&*b, a)
        }
    }

    /// Exchange read/write roles.
    pub fn swap(&mut self) {
        self.read_idx = 1 - self.read_idx;
        self.swaps += 1;
    }

    /// Number of completed swaps.
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    pub fn clear(&mut self) {
        for grid in &mut self.grids {
            grid.clear();
        }
    }
}
