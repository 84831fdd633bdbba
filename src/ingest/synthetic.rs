//! Synthetic `stub://` scenes.
//!
//! A scene is a dark background with bright 16x32 "walkers", one per
//! horizontal lane, sliding left to right at different speeds. Query
//! parameters (all optional):
//!
//! - `frames` (default 90): stream length
//! - `fps` (default 30): reported frame rate, may be 0 to simulate a
//!   container that reports none
//! - `width` / `height` (default 320x240)
//! - `people` (default 2): number of lanes
//! - `stagger` (default 0): walker `k` only appears from frame `k * stagger + 1`
//!
//! Lanes are spaced so that the `cpu` detector always sees every walker as
//! exactly one blob.

use anyhow::{anyhow, Context, Result};

use super::VideoInfo;
use crate::frame::Frame;

const BACKGROUND: u8 = 16;
const WALKER: u8 = 240;
const WALKER_W: u32 = 16;
const WALKER_H: u32 = 32;
const MIN_LANE_SPACING: u32 = WALKER_H + 16;

pub(crate) struct SyntheticFileSource {
    frames: u64,
    fps: f64,
    width: u32,
    height: u32,
    people: u32,
    stagger: u64,
}

impl SyntheticFileSource {
    pub(crate) fn parse(path: &str) -> Result<Self> {
        let mut scene = Self {
            frames: 90,
            fps: 30.0,
            width: 320,
            height: 240,
            people: 2,
            stagger: 0,
        };

        let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("stub parameter '{}' must be key=value", pair))?;
            let bad = || format!("invalid stub parameter {}={}", key, value);
            match key {
                "frames" => scene.frames = value.parse().with_context(bad)?,
                "fps" => scene.fps = value.parse().with_context(bad)?,
                "width" => scene.width = value.parse().with_context(bad)?,
                "height" => scene.height = value.parse().with_context(bad)?,
                "people" => scene.people = value.parse().with_context(bad)?,
                "stagger" => scene.stagger = value.parse().with_context(bad)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }

        if scene.width <= WALKER_W {
            return Err(anyhow!("stub scene width must exceed {}", WALKER_W));
        }
        if scene.people > 0 && scene.lane_spacing() < MIN_LANE_SPACING {
            return Err(anyhow!(
                "stub scene height {} cannot fit {} walkers",
                scene.height,
                scene.people
            ));
        }
        Ok(scene)
    }

    pub(crate) fn info(&self) -> VideoInfo {
        VideoInfo {
            fps: Some(self.fps),
            width: Some(self.width),
            height: Some(self.height),
            frame_count_hint: Some(self.frames),
        }
    }

    pub(crate) fn next_frame(&mut self, index: u64) -> Result<Option<Frame>> {
        if index > self.frames {
            return Ok(None);
        }
        let mut pixels = vec![BACKGROUND; (self.width * self.height * 3) as usize];
        for k in 0..self.people {
            if index <= k as u64 * self.stagger {
                continue;
            }
            let (x0, y0) = self.walker_origin(k, index);
            for y in y0..y0 + WALKER_H {
                let row = (y * self.width) as usize * 3;
                let start = row + x0 as usize * 3;
                let end = start + WALKER_W as usize * 3;
                pixels[start..end].fill(WALKER);
            }
        }
        Frame::new(pixels, self.width, self.height, index).map(Some)
    }

    fn lane_spacing(&self) -> u32 {
        self.height / (self.people + 1)
    }

    fn walker_origin(&self, k: u32, index: u64) -> (u32, u32) {
        let travel = (self.width - WALKER_W) as u64;
        let speed = 2 * (k as u64 + 1);
        let x0 = ((index - 1) * speed % travel) as u32;
        let y0 = (k + 1) * self.lane_spacing() - WALKER_H / 2;
        (x0, y0)
    }
}
