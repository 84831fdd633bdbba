#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{non_max_suppression, BoundingBox, DetectionResult, ObjectClass};

/// Grey fill for letterbox padding, as used by YOLOv8 training.
const PAD_VALUE: u8 = 114;

/// Tract-based backend for YOLOv8 ONNX exports.
///
/// The model is loaded once from a local file. Each frame is letterboxed
/// into the square model input, run through the network, and decoded from the
/// `[1, 4 + classes, anchors]` output layout into pixel-space boxes.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded detector model {} ({}x{} input)",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        })
    }

    /// Override the default score and NMS thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<(Tensor, Letterbox)> {
        let frame = RgbImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
            anyhow!(
                "expected {}x{} RGB frame, received {} bytes",
                width,
                height,
                pixels.len()
            )
        })?;
        let letterbox = Letterbox::fit(width, height, self.input_size)?;
        let resized = image::imageops::resize(
            &frame,
            letterbox.new_width,
            letterbox.new_height,
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(self.input_size, self.input_size, Rgb([PAD_VALUE; 3]));
        image::imageops::overlay(
            &mut canvas,
            &resized,
            i64::from(letterbox.pad_x),
            i64::from(letterbox.pad_y),
        );

        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok((input.into_tensor(), letterbox))
    }
}

/// Aspect-preserving fit of a frame into the square model input, padded
/// evenly on the short side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Letterbox {
    scale: f32,
    pad_x: u32,
    pad_y: u32,
    new_width: u32,
    new_height: u32,
}

impl Letterbox {
    pub(crate) fn fit(width: u32, height: u32, side: u32) -> Result<Self> {
        if width == 0 || height == 0 || side == 0 {
            return Err(anyhow!("cannot letterbox a {}x{} frame", width, height));
        }
        let scale = (side as f32 / width as f32).min(side as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, side);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, side);
        Ok(Self {
            scale,
            pad_x: (side - new_width) / 2,
            pad_y: (side - new_height) / 2,
            new_width,
            new_height,
        })
    }

    /// Map a model-space point back to frame pixels.
    fn frame_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Decode a YOLOv8 `[1, 4 + classes, anchors]` output into frame-space boxes.
///
/// Each anchor takes its best-scoring class; anchors under
/// `confidence_threshold` are dropped, boxes are mapped out of the
/// letterbox and clipped to the frame, then NMS runs per class.
pub(crate) fn decode_yolo(
    view: tract_ndarray::ArrayView3<f32>,
    width: u32,
    height: u32,
    letterbox: &Letterbox,
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<BoundingBox>> {
    let (batch, rows, anchors) = view.dim();
    if batch != 1 || rows < 5 {
        return Err(anyhow!(
            "unexpected YOLO output shape [{}, {}, {}], expected [1, 4 + classes, anchors]",
            batch,
            rows,
            anchors
        ));
    }

    let (max_x, max_y) = (width as f32, height as f32);
    let mut boxes = Vec::new();
    for i in 0..anchors {
        let (mut class_id, mut score) = (0usize, f32::NEG_INFINITY);
        for row in 4..rows {
            let s = view[[0, row, i]];
            if s > score {
                score = s;
                class_id = row - 4;
            }
        }
        if score < confidence_threshold {
            continue;
        }

        let (cx, cy) = (view[[0, 0, i]], view[[0, 1, i]]);
        let (half_w, half_h) = (view[[0, 2, i]] / 2.0, view[[0, 3, i]] / 2.0);
        let (x1, y1) = letterbox.frame_point(cx - half_w, cy - half_h);
        let (x2, y2) = letterbox.frame_point(cx + half_w, cy + half_h);

        boxes.push(BoundingBox {
            x1: x1.clamp(0.0, max_x),
            y1: y1.clamp(0.0, max_y),
            x2: x2.clamp(0.0, max_x),
            y2: y2.clamp(0.0, max_y),
            confidence: score,
            class: ObjectClass::from_coco(class_id),
        });
    }

    Ok(non_max_suppression(boxes, iou_threshold))
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let (input, letterbox) = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("YOLO output must be rank 3")?;
        let boxes = decode_yolo(
            view,
            width,
            height,
            &letterbox,
            self.confidence_threshold,
            self.iou_threshold,
        )?;
        Ok(DetectionResult::new(boxes))
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = vec![0u8; (side * side * 3) as usize];
        self.detect(&blank, side, side).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    const SIDE: u32 = 640;

    /// Build a `[1, 4 + classes, anchors]` output from `(cx, cy, w, h, class, score)`.
    fn yolo_output(classes: usize, anchors: &[(f32, f32, f32, f32, usize, f32)]) -> tract_ndarray::Array3<f32> {
        let mut out = tract_ndarray::Array3::<f32>::zeros((1, 4 + classes, anchors.len()));
        for (i, &(cx, cy, w, h, class, score)) in anchors.iter().enumerate() {
            out[[0, 0, i]] = cx;
            out[[0, 1, i]] = cy;
            out[[0, 2, i]] = w;
            out[[0, 3, i]] = h;
            out[[0, 4 + class, i]] = score;
        }
        out
    }

    #[test]
    fn letterbox_pads_the_short_side() -> Result<()> {
        let lb = Letterbox::fit(1280, 720, SIDE)?;
        assert_eq!((lb.new_width, lb.new_height), (640, 360));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 140));
        assert_eq!(lb.scale, 0.5);

        let tall = Letterbox::fit(480, 640, SIDE)?;
        assert_eq!((tall.pad_x, tall.pad_y), (80, 0));
        assert!(Letterbox::fit(0, 720, SIDE).is_err());
        Ok(())
    }

    #[test]
    fn person_box_is_mapped_back_to_the_frame() -> Result<()> {
        let lb = Letterbox::fit(1280, 720, SIDE)?;
        let out = yolo_output(3, &[(320.0, 320.0, 100.0, 100.0, 0, 0.9)]);
        let boxes = decode_yolo(out.view(), 1280, 720, &lb, 0.25, 0.7)?;
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (540.0, 260.0, 740.0, 460.0));
        assert_eq!(b.class, ObjectClass::Person);
        assert_eq!(DetectionResult::new(boxes).person_centers(), vec![Point::new(640, 360)]);
        Ok(())
    }

    #[test]
    fn boxes_are_clipped_at_the_frame_edge() -> Result<()> {
        let lb = Letterbox::fit(1280, 720, SIDE)?;
        let out = yolo_output(1, &[(630.0, 150.0, 40.0, 40.0, 0, 0.8)]);
        let boxes = decode_yolo(out.view(), 1280, 720, &lb, 0.25, 0.7)?;
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].x2, 1280.0);
        assert_eq!(boxes[0].y1, 0.0);
        assert_eq!(boxes[0].x1, 1220.0);
        Ok(())
    }

    #[test]
    fn low_scores_and_other_classes_are_not_people() -> Result<()> {
        let lb = Letterbox::fit(SIDE, SIDE, SIDE)?;
        let out = yolo_output(
            3,
            &[
                (100.0, 100.0, 20.0, 40.0, 0, 0.2),
                (300.0, 300.0, 50.0, 50.0, 2, 0.9),
            ],
        );
        let boxes = decode_yolo(out.view(), SIDE, SIDE, &lb, 0.25, 0.7)?;
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class, ObjectClass::Other(2));
        assert!(DetectionResult::new(boxes).person_centers().is_empty());
        Ok(())
    }

    #[test]
    fn overlapping_people_collapse_to_one() -> Result<()> {
        let lb = Letterbox::fit(SIDE, SIDE, SIDE)?;
        let out = yolo_output(
            1,
            &[
                (200.0, 200.0, 100.0, 200.0, 0, 0.7),
                (204.0, 202.0, 100.0, 200.0, 0, 0.9),
                (500.0, 200.0, 100.0, 200.0, 0, 0.6),
            ],
        );
        let boxes = decode_yolo(out.view(), SIDE, SIDE, &lb, 0.25, 0.7)?;
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence, 0.9);
        assert_eq!(boxes[1].confidence, 0.6);
        Ok(())
    }

    #[test]
    fn rejects_outputs_without_class_rows() {
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
            new_width: SIDE,
            new_height: SIDE,
        };
        let out = tract_ndarray::Array3::<f32>::zeros((1, 4, 8));
        assert!(decode_yolo(out.view(), SIDE, SIDE, &lb, 0.25, 0.7).is_err());
    }
}
