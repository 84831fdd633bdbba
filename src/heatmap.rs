//! Spatial density rendering.
//!
//! Every detection point adds one count to a frame-sized grid. The grid is
//! smoothed with a Gaussian, min-max normalized to `[0, 1]` and mapped
//! through a jet colormap (blue = rarely occupied, red = busiest).

use image::{ImageBuffer, Luma, Rgb, RgbImage};

use crate::{Point, DEFAULT_FRAME_SHAPE};

type DensityMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Rendering parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct HeatmapOptions {
    /// Gaussian standard deviation in pixels.
    pub sigma: f32,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self { sigma: 25.0 }
    }
}

/// Render a density heatmap for `points` over a frame of `shape`
/// `(height, width)`.
///
/// Returns `None` when there is nothing to draw. Points outside the frame
/// are ignored. A zero-sized shape falls back to 720x1280.
pub fn render_heatmap(points: &[Point], shape: (u32, u32), options: &HeatmapOptions) -> Option<RgbImage> {
    if points.is_empty() {
        log::warn!("no detections found; skipping heatmap");
        return None;
    }
    let (height, width) = if shape.0 == 0 || shape.1 == 0 {
        DEFAULT_FRAME_SHAPE
    } else {
        shape
    };

    let counts = accumulate(points, width, height);
    let smoothed = if options.sigma > 0.0 {
        image::imageops::blur(&counts, options.sigma)
    } else {
        counts
    };
    let normalized = normalize(smoothed);

    Some(ImageBuffer::from_fn(width, height, |x, y| {
        jet(normalized.get_pixel(x, y)[0])
    }))
}

/// Per-pixel hit counts, pre-scaled so the busiest pixel is 1.0.
///
/// Float images saturate at 1.0 when resampled, so the scale is applied
/// before blurring; min-max normalization afterwards makes it irrelevant to
/// the final image.
fn accumulate(points: &[Point], width: u32, height: u32) -> DensityMap {
    let mut counts = DensityMap::new(width, height);
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            counts.get_pixel_mut(p.x as u32, p.y as u32)[0] += 1.0;
        }
    }
    let max = counts.pixels().map(|p| p[0]).fold(0.0f32, f32::max);
    if max > 0.0 {
        for p in counts.pixels_mut() {
            p[0] /= max;
        }
    }
    counts
}

fn normalize(mut map: DensityMap) -> DensityMap {
    let (min, max) = map
        .pixels()
        .map(|p| p[0])
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    for p in map.pixels_mut() {
        p[0] = if range > 0.0 { (p[0] - min) / range } else { 0.0 };
    }
    map
}

/// Jet colormap for `v` in `[0, 1]`.
fn jet(v: f32) -> Rgb<u8> {
    let v = v.clamp(0.0, 1.0);
    let channel = |center: f32| {
        let c = (1.5 - (4.0 * v - center).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_points_renders_nothing() {
        assert!(render_heatmap(&[], (48, 64), &HeatmapOptions::default()).is_none());
    }

    #[test]
    fn heatmap_matches_frame_shape() {
        let image = render_heatmap(&[Point::new(10, 10)], (48, 64), &HeatmapOptions { sigma: 3.0 })
            .expect("heatmap");
        assert_eq!(image.dimensions(), (64, 48));
    }

    #[test]
    fn zero_shape_falls_back_to_default_frame() {
        let image = render_heatmap(&[Point::new(1, 1)], (0, 0), &HeatmapOptions { sigma: 0.0 })
            .expect("heatmap");
        assert_eq!(image.dimensions(), (1280, 720));
    }

    #[test]
    fn hottest_pixel_is_red_and_far_pixels_are_blue() {
        let points = vec![Point::new(20, 20); 5];
        let image = render_heatmap(&points, (64, 64), &HeatmapOptions { sigma: 3.0 })
            .expect("heatmap");
        assert_eq!(image.get_pixel(20, 20), &jet(1.0));
        assert_eq!(image.get_pixel(63, 63), &jet(0.0));
    }

    #[test]
    fn out_of_frame_points_are_ignored() {
        let counts = accumulate(
            &[Point::new(-1, 0), Point::new(64, 0), Point::new(3, 4), Point::new(3, 4)],
            64,
            32,
        );
        let total: f32 = counts.pixels().map(|p| p[0]).sum();
        assert_eq!(total, 1.0);
        assert_eq!(counts.get_pixel(3, 4)[0], 1.0);
    }

    #[test]
    fn flat_map_normalizes_to_zero() {
        let map = normalize(DensityMap::from_pixel(4, 4, Luma([0.5])));
        assert!(map.pixels().all(|p| p[0] == 0.0));
    }

    #[test]
    fn jet_endpoints() {
        assert_eq!(jet(0.0), Rgb([0, 0, 128]));
        assert_eq!(jet(0.5), Rgb([128, 255, 128]));
        assert_eq!(jet(1.0), Rgb([128, 0, 0]));
    }
}
