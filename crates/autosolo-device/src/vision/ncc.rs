//! Normalized cross-correlation (the `TM_CCOEFF_NORMED` measure) on grayscale planes.
//!
//! Window sums come from integral images, so each placement costs one pass
//! over the template for the cross term only.

use image::GrayImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Flat-variance cutoff below which a window or template is treated as featureless.
const EPS: f64 = 1e-6;

#[derive(Debug, Clone)]
pub(crate) struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn from_luma(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| f32::from(v)).collect(),
        }
    }

    /// Box-filter downsample by integer factors per axis; trailing pixels are dropped.
    pub fn downsample(&self, fx: usize, fy: usize) -> Self {
        let (fx, fy) = (fx.max(1), fy.max(1));
        if (fx, fy) == (1, 1) {
            return self.clone();
        }
        let width = self.width / fx;
        let height = self.height / fy;
        let area = (fx * fy) as f32;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let mut sum = 0.0f32;
                for dy in 0..fy {
                    let row = (y * fy + dy) * self.width + x * fx;
                    sum += self.data[row..row + fx].iter().sum::<f32>();
                }
                data.push(sum / area);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// Summed-area tables of values and squared values, (w+1) x (h+1).
#[derive(Debug)]
pub(crate) struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    pub fn new(plane: &Plane) -> Self {
        let stride = plane.width + 1;
        let mut sum = vec![0.0f64; stride * (plane.height + 1)];
        let mut sq = vec![0.0f64; stride * (plane.height + 1)];
        for y in 0..plane.height {
            let mut row_sum = 0.0f64;
            let mut row_sq = 0.0f64;
            for x in 0..plane.width {
                let v = f64::from(plane.data[y * plane.width + x]);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq[idx] = sq[idx - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn rect(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let a = table[y * stride + x];
        let b = table[y * stride + x + w];
        let c = table[(y + h) * stride + x];
        let d = table[(y + h) * stride + x + w];
        d - b - c + a
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        (
            Self::rect(&self.sum, self.stride, x, y, w, h),
            Self::rect(&self.sq, self.stride, x, y, w, h),
        )
    }
}

/// A plane with its summed-area tables.
#[derive(Debug)]
pub(crate) struct Level {
    pub plane: Plane,
    pub integral: Integral,
}

impl Level {
    pub fn new(plane: Plane) -> Self {
        let integral = Integral::new(&plane);
        Self { plane, integral }
    }
}

/// Matching levels of one frame: full resolution plus every coarse scale
/// requested so far. Built lazily and shared by all templates searched on it.
#[derive(Debug)]
pub(crate) struct Pyramid {
    full: Level,
    coarse: Mutex<HashMap<(usize, usize), Arc<Level>>>,
}

impl Pyramid {
    pub fn new(luma: &GrayImage) -> Self {
        Self {
            full: Level::new(Plane::from_luma(luma)),
            coarse: Mutex::new(HashMap::new()),
        }
    }

    pub fn full(&self) -> &Level {
        &self.full
    }

    pub fn coarse(&self, fx: usize, fy: usize) -> Arc<Level> {
        let mut levels = self.coarse.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            levels
                .entry((fx, fy))
                .or_insert_with(|| Arc::new(Level::new(self.full.plane.downsample(fx, fy)))),
        )
    }
}

/// Template with its mean removed, ready for correlation.
#[derive(Debug, Clone)]
pub(crate) struct ZeroMean {
    pub width: usize,
    pub height: usize,
    data: Vec<f32>,
    /// Sum of squared deviations
    norm: f64,
}

impl ZeroMean {
    pub fn new(plane: &Plane) -> Self {
        let n = plane.data.len().max(1) as f64;
        let mean = plane.data.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let data: Vec<f32> = plane.data.iter().map(|&v| (f64::from(v) - mean) as f32).collect();
        let norm = data.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        Self {
            width: plane.width,
            height: plane.height,
            data,
            norm,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.norm < EPS
    }
}

/// Score of `tmpl` placed with its top-left corner at (x, y).
pub(crate) fn score_at(level: &Level, tmpl: &ZeroMean, x: usize, y: usize) -> f32 {
    let screen = &level.plane;
    if tmpl.is_flat() {
        return 0.0;
    }
    let n = (tmpl.width * tmpl.height) as f64;
    let (sum, sq) = level.integral.window(x, y, tmpl.width, tmpl.height);
    let window_norm = sq - sum * sum / n;
    if window_norm < EPS {
        return 0.0;
    }

    let mut cross = 0.0f64;
    for ty in 0..tmpl.height {
        let srow = &screen.data[(y + ty) * screen.width + x..][..tmpl.width];
        let trow = &tmpl.data[ty * tmpl.width..][..tmpl.width];
        let row: f32 = srow.iter().zip(trow).map(|(s, t)| s * t).sum();
        cross += f64::from(row);
    }

    (cross / (tmpl.norm * window_norm).sqrt()).clamp(-1.0, 1.0) as f32
}

/// A scored placement (top-left corner).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// Exhaustive search keeping the `keep` best placements, spaced apart so
/// neighbours of one peak do not crowd out a second peak.
pub(crate) fn search(level: &Level, tmpl: &ZeroMean, keep: usize) -> Vec<Candidate> {
    let screen = &level.plane;
    if tmpl.width == 0 || tmpl.height == 0 || tmpl.width > screen.width || tmpl.height > screen.height {
        return Vec::new();
    }
    let mut best: Vec<Candidate> = Vec::with_capacity(keep + 1);
    let spacing = (tmpl.width.min(tmpl.height) / 2).max(1);

    for y in 0..=screen.height - tmpl.height {
        for x in 0..=screen.width - tmpl.width {
            let score = score_at(level, tmpl, x, y);
            insert_candidate(&mut best, Candidate { x, y, score }, keep, spacing);
        }
    }
    best
}

fn insert_candidate(best: &mut Vec<Candidate>, cand: Candidate, keep: usize, spacing: usize) {
    if let Some(near) = best
        .iter_mut()
        .find(|c| c.x.abs_diff(cand.x) < spacing && c.y.abs_diff(cand.y) < spacing)
    {
        if cand.score > near.score {
            *near = cand;
            best.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        return;
    }
    if best.len() < keep || best.last().is_some_and(|last| cand.score > last.score) {
        best.push(cand);
        best.sort_by(|a, b| b.score.total_cmp(&a.score));
        best.truncate(keep);
    }
}

/// Best placement within `rx` by `ry` pixels of (cx, cy), clamped to the screen.
pub(crate) fn refine(
    level: &Level,
    tmpl: &ZeroMean,
    cx: usize,
    cy: usize,
    rx: usize,
    ry: usize,
) -> Option<Candidate> {
    let screen = &level.plane;
    if tmpl.width > screen.width || tmpl.height > screen.height {
        return None;
    }
    let max_x = screen.width - tmpl.width;
    let max_y = screen.height - tmpl.height;
    let mut best: Option<Candidate> = None;
    for y in cy.saturating_sub(ry)..=(cy + ry).min(max_y) {
        for x in cx.saturating_sub(rx)..=(cx + rx).min(max_x) {
            let score = score_at(level, tmpl, x, y);
            if best.is_none_or(|b| score > b.score) {
                best = Some(Candidate { x, y, score });
            }
        }
    }
    best
}
