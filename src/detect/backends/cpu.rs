use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::frame::rgb_len;

const CELL_SIZE: u32 = 8;
const LUMA_THRESHOLD: u32 = 200;
const MIN_BLOB_CELLS: usize = 2;

/// CPU backend that reports bright blobs as people.
///
/// The frame is split into 8x8 cells; a cell is lit when at least half of
/// its pixels have luma >= 200. Four-connected lit cells form a blob, and
/// every blob of two or more cells becomes one person box. This is what the
/// synthetic `stub://` scenes are drawn for.
#[derive(Default)]
pub struct CpuBackend {
    lit: Vec<bool>,
    visited: Vec<bool>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn light_cells(&mut self, pixels: &[u8], width: u32, height: u32) -> (usize, usize) {
        let cols = width.div_ceil(CELL_SIZE) as usize;
        let rows = height.div_ceil(CELL_SIZE) as usize;
        self.lit.clear();
        self.lit.resize(cols * rows, false);

        for row in 0..rows {
            for col in 0..cols {
                let x0 = col as u32 * CELL_SIZE;
                let y0 = row as u32 * CELL_SIZE;
                let x1 = (x0 + CELL_SIZE).min(width);
                let y1 = (y0 + CELL_SIZE).min(height);

                let mut bright = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        let offset = ((y * width + x) * 3) as usize;
                        if luma(&pixels[offset..offset + 3]) >= LUMA_THRESHOLD {
                            bright += 1;
                        }
                    }
                }
                let total = (x1 - x0) * (y1 - y0);
                self.lit[row * cols + col] = bright * 2 >= total;
            }
        }
        (cols, rows)
    }

    fn collect_blobs(&mut self, cols: usize, rows: usize, width: u32, height: u32) -> Vec<BoundingBox> {
        self.visited.clear();
        self.visited.resize(cols * rows, false);

        let mut boxes = Vec::new();
        let mut stack = Vec::new();
        for start in 0..cols * rows {
            if !self.lit[start] || self.visited[start] {
                continue;
            }
            self.visited[start] = true;
            stack.push(start);

            let (mut min_c, mut min_r) = (usize::MAX, usize::MAX);
            let (mut max_c, mut max_r) = (0usize, 0usize);
            let mut cells = 0usize;

            while let Some(idx) = stack.pop() {
                let (r, c) = (idx / cols, idx % cols);
                cells += 1;
                min_c = min_c.min(c);
                min_r = min_r.min(r);
                max_c = max_c.max(c);
                max_r = max_r.max(r);

                let mut visit = |n: usize| {
                    if self.lit[n] && !self.visited[n] {
                        self.visited[n] = true;
                        stack.push(n);
                    }
                };
                if c > 0 {
                    visit(idx - 1);
                }
                if c + 1 < cols {
                    visit(idx + 1);
                }
                if r > 0 {
                    visit(idx - cols);
                }
                if r + 1 < rows {
                    visit(idx + cols);
                }
            }

            if cells >= MIN_BLOB_CELLS {
                let cell = CELL_SIZE as f32;
                boxes.push(BoundingBox::person(
                    min_c as f32 * cell,
                    min_r as f32 * cell,
                    ((max_c + 1) as f32 * cell).min(width as f32),
                    ((max_r + 1) as f32 * cell).min(height as f32),
                    1.0,
                ));
            }
        }
        boxes
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }
        let (cols, rows) = self.light_cells(pixels, width, height);
        Ok(DetectionResult::new(
            self.collect_blobs(cols, rows, width, height),
        ))
    }
}

// ITU-R BT.601 integer approximation.
fn luma(rgb: &[u8]) -> u32 {
    (299 * rgb[0] as u32 + 587 * rgb[1] as u32 + 114 * rgb[2] as u32) / 1000
}
