//! Subregion frames and the `SourceGraphic`/`SourceAlpha` inputs.

use kurbo::{Shape, Stroke, StrokeOpts};

use crate::foundation::core::{BezPath, Point, RasterImage, Rect, Rgba};
use crate::graph::builder::{FilterGraph, NodeId, SourceKind};
use crate::policy::resolve::PolicyConfig;
use crate::services::ShapeContext;

/// Pixel grid a raster fallback is rendered on: one pixel per user unit, integer-aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Left edge in user units.
    pub x: i32,
    /// Top edge in user units.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Frame {
    /// Smallest integer-aligned frame covering `r`.
    pub fn covering(r: Rect) -> Self {
        let x0 = r.x0.floor();
        let y0 = r.y0.floor();
        let x1 = r.x1.ceil().max(x0 + 1.0);
        let y1 = r.y1.ceil().max(y0 + 1.0);
        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    /// User-space rectangle of the frame.
    pub fn rect(&self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x) + f64::from(self.width),
            f64::from(self.y) + f64::from(self.height),
        )
    }

    /// Pixel area.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// User-space centre of pixel `(px, py)`.
    pub fn user_point(&self, px: u32, py: u32) -> Point {
        Point::new(
            f64::from(self.x) + f64::from(px) + 0.5,
            f64::from(self.y) + f64::from(py) + 0.5,
        )
    }

    /// Pixel bounds `(x0, y0, x1, y1)` of a user rectangle, clamped to the frame.
    pub fn pixel_rect(&self, r: Rect) -> (u32, u32, u32, u32) {
        let clamp_x = |v: f64| (v - f64::from(self.x)).clamp(0.0, f64::from(self.width)) as u32;
        let clamp_y = |v: f64| (v - f64::from(self.y)).clamp(0.0, f64::from(self.height)) as u32;
        (
            clamp_x(r.x0.floor()),
            clamp_y(r.y0.floor()),
            clamp_x(r.x1.ceil()),
            clamp_y(r.y1.ceil()),
        )
    }
}

/// Filter region for rasterizing `target`: the shape bounds grown by the reach of every
/// contributing primitive, and never by less than 10% of the larger bounds side.
pub fn frame_for(graph: &FilterGraph, target: NodeId, shape: &ShapeContext, cfg: &PolicyConfig) -> Frame {
    let bounds = shape.bounds();
    let marks = graph.contributes_to(target);
    let reach: f64 = graph
        .nodes()
        .iter()
        .filter(|n| marks[n.id.index()])
        .map(|n| n.primitive.reach(cfg.raster_margin_sigma))
        .sum();
    let minimum = 0.1 * bounds.width().max(bounds.height());
    let margin = reach.max(minimum).max(1.0);
    Frame::covering(bounds.inflate(margin, margin))
}

const SUPERSAMPLE: [f64; 2] = [0.25, 0.75];

/// Coverage of `path` per pixel in `[0, 1]`, four samples per pixel, nonzero winding.
fn coverage(path: &BezPath, frame: &Frame) -> Vec<f32> {
    let mut cov = vec![0.0f32; frame.pixel_count() as usize];
    let (x0, y0, x1, y1) = frame.pixel_rect(path.bounding_box());
    let w = frame.width as usize;
    for py in y0..y1 {
        for px in x0..x1 {
            let mut hits = 0u8;
            for oy in SUPERSAMPLE {
                for ox in SUPERSAMPLE {
                    let p = Point::new(
                        f64::from(frame.x) + f64::from(px) + ox,
                        f64::from(frame.y) + f64::from(py) + oy,
                    );
                    if path.contains(p) {
                        hits += 1;
                    }
                }
            }
            cov[py as usize * w + px as usize] = f32::from(hits) / 4.0;
        }
    }
    cov
}

fn paint_layer(dst: &mut RasterImage, cov: &[f32], color: Rgba) {
    let src = color.premultiplied().map(f32::from);
    for (d, &c) in dst.as_raw_mut().chunks_exact_mut(4).zip(cov) {
        if c <= 0.0 {
            continue;
        }
        let sa = src[3] * c / 255.0;
        for k in 0..4 {
            let v = src[k] * c + f32::from(d[k]) * (1.0 - sa);
            d[k] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Render one of the well-known filter inputs.
pub fn render_source(kind: SourceKind, shape: &ShapeContext, frame: &Frame) -> RasterImage {
    let (w, h) = (frame.width, frame.height);
    match kind {
        SourceKind::SourceGraphic | SourceKind::SourceAlpha => {
            let alpha_only = kind == SourceKind::SourceAlpha;
            let tint = |c: Rgba| {
                let c = c.with_alpha_factor(shape.opacity);
                if alpha_only { Rgba::new(0, 0, 0, c.a) } else { c }
            };
            let mut img = RasterImage::new(w, h);
            if let Some(fill) = shape.fill {
                paint_layer(&mut img, &coverage(&shape.geometry, frame), tint(fill));
            }
            if let Some(stroke) = shape.stroke.filter(|s| s.width > 0.0) {
                let outline = kurbo::stroke(
                    shape.geometry.iter(),
                    &Stroke::new(stroke.width),
                    &StrokeOpts::default(),
                    0.1,
                );
                paint_layer(&mut img, &coverage(&outline, frame), tint(stroke.color));
            }
            img
        }
        SourceKind::FillPaint => flood(w, h, shape.fill.unwrap_or(Rgba::TRANSPARENT)),
        SourceKind::StrokePaint => flood(
            w,
            h,
            shape.stroke.map_or(Rgba::TRANSPARENT, |s| s.color),
        ),
        SourceKind::BackgroundImage | SourceKind::BackgroundAlpha => RasterImage::new(w, h),
    }
}

/// Image filled with one colour.
pub fn flood(width: u32, height: u32, color: Rgba) -> RasterImage {
    let px = color.premultiplied();
    RasterImage::from_fn(width, height, |_, _| px)
}

#[cfg(test)]
#[path = "../../tests/unit/raster/source.rs"]
mod tests;
