//! Geometry and colour constructions for vector approximations.

use kurbo::{PathEl, Shape, Stroke, StrokeOpts};

use crate::cache::fingerprint::StableHasher;
use crate::emit::drawingml::{EmuRect, GeometryPath, PathCommand};
use crate::foundation::core::{Affine, BezPath, Point, Rect, Rgba};
use crate::graph::primitive::{ColorMatrix, LightSource, TransferFunction};
use crate::services::{ColorSpace, ConversionServices};

const STROKE_TOLERANCE: f64 = 0.05;

/// Outline grown by `radius`. Each subpath becomes the outer contour of its round-joined
/// `2 * radius` stroke, i.e. its Minkowski sum with a disc, so growing by `a` then `b` equals
/// growing once by `a + b`.
pub fn dilate(path: &BezPath, radius: f64) -> BezPath {
    if radius <= 0.0 {
        return path.clone();
    }
    let stroke = Stroke::new(2.0 * radius);
    let mut out = BezPath::new();
    for sub in subpaths(path) {
        let band = kurbo::stroke(sub.iter(), &stroke, &StrokeOpts::default(), STROKE_TOLERANCE);
        let outer = subpaths(&band)
            .into_iter()
            .max_by(|a, b| a.bounding_box().area().total_cmp(&b.bounding_box().area()));
        for el in outer.iter().flat_map(|o| o.elements()) {
            out.push(*el);
        }
    }
    out
}

/// Split at every `MoveTo`.
fn subpaths(path: &BezPath) -> Vec<BezPath> {
    let mut out: Vec<BezPath> = Vec::new();
    for el in path.elements() {
        if out.is_empty() || matches!(el, PathEl::MoveTo(_)) {
            out.push(BezPath::new());
        }
        if let Some(last) = out.last_mut() {
            last.push(*el);
        }
    }
    out
}

/// Outline shrunk by `radius` on every side, scaling about the bounds centre. Collapses to an
/// empty path when the shape is thinner than `2 * radius`.
pub fn erode(path: &BezPath, radius: f64) -> BezPath {
    let b = path.bounding_box();
    let (w, h) = (b.width(), b.height());
    if w <= 2.0 * radius || h <= 2.0 * radius {
        return BezPath::new();
    }
    let c = b.center();
    let scale = Affine::translate(c.to_vec2())
        * Affine::scale_non_uniform((w - 2.0 * radius) / w, (h - 2.0 * radius) / h)
        * Affine::translate(-c.to_vec2());
    scale * path.clone()
}

/// Offset every on-curve and control point by a deterministic amount in `[-scale/2, scale/2]`.
///
/// Offsets are derived from the point index and `seed`, so the same input always yields the same
/// path.
pub fn jitter(path: &BezPath, scale: f64, seed: u64) -> BezPath {
    let amp = scale.abs() / 2.0;
    let mut index = 0u32;
    let mut nudge = |p: Point| -> Point {
        let mut h = StableHasher::new();
        h.write_u64(seed);
        h.write_u32(index);
        index += 1;
        let k = h.finish();
        let unit = |v: u64| (v >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0;
        Point::new(p.x + amp * unit(k.hi), p.y + amp * unit(k.lo))
    };
    let mut out = BezPath::new();
    for el in path.elements() {
        out.push(match *el {
            PathEl::MoveTo(p) => PathEl::MoveTo(nudge(p)),
            PathEl::LineTo(p) => PathEl::LineTo(nudge(p)),
            PathEl::QuadTo(a, p) => PathEl::QuadTo(nudge(a), nudge(p)),
            PathEl::CurveTo(a, b, p) => PathEl::CurveTo(nudge(a), nudge(b), nudge(p)),
            PathEl::ClosePath => PathEl::ClosePath,
        });
    }
    out
}

/// Straight-alpha colour transform, optionally in linear light.
fn map_color(color: Rgba, space: Option<&dyn ColorSpace>, f: impl Fn([f64; 4]) -> [f64; 4]) -> Rgba {
    let mut c = color.to_unit();
    if let Some(cs) = space {
        for v in c.iter_mut().take(3) {
            *v = cs.to_linear(*v);
        }
    }
    let mut r = f(c);
    if let Some(cs) = space {
        for v in r.iter_mut().take(3) {
            *v = cs.to_srgb(v.clamp(0.0, 1.0));
        }
    }
    Rgba::from_unit(r)
}

/// Apply `m` to a solid colour, linearizing through `space` when given.
pub fn bake_matrix(color: Rgba, m: &ColorMatrix, space: Option<&dyn ColorSpace>) -> Rgba {
    map_color(color, space, |c| m.apply(c))
}

/// Per-channel transfer functions applied to a solid colour.
pub fn bake_transfer(
    color: Rgba,
    funcs: &[TransferFunction; 4],
    space: Option<&dyn ColorSpace>,
) -> Rgba {
    map_color(color, space, |c| {
        [
            funcs[0].apply(c[0]),
            funcs[1].apply(c[1]),
            funcs[2].apply(c[2]),
            funcs[3].apply(c[3]),
        ]
    })
}

/// `(rig, direction)` for the light rig closest to a filter light source.
pub fn light_rig(light: &LightSource) -> (&'static str, &'static str) {
    match *light {
        LightSource::Distant { azimuth, .. } => {
            // SVG azimuth is clockwise from +x in a y-down space.
            let a = azimuth.rem_euclid(360.0);
            let dir = match ((a + 22.5) / 45.0) as u32 % 8 {
                0 => "r",
                1 => "br",
                2 => "b",
                3 => "bl",
                4 => "l",
                5 => "tl",
                6 => "t",
                _ => "tr",
            };
            ("threePt", dir)
        }
        LightSource::Point { .. } => ("balanced", "t"),
        LightSource::Spot { .. } => ("harsh", "t"),
    }
}

/// Shape-space geometry converted to EMU: the transform of its bounds and one path per input,
/// relative to that transform's origin.
pub fn to_emu_geometry(
    paths: &[BezPath],
    translate: (f64, f64),
    services: &dyn ConversionServices,
) -> (EmuRect, Vec<GeometryPath>) {
    let t = services.current_transform() * Affine::translate(translate);
    let placed: Vec<BezPath> = paths.iter().map(|p| t * p.clone()).collect();
    let bounds = placed
        .iter()
        .filter(|p| !p.elements().is_empty())
        .map(Shape::bounding_box)
        .reduce(|a, b| a.union(b))
        .unwrap_or(Rect::ZERO);
    let xfrm = emu_rect(bounds, services);
    let rel = |p: Point| {
        (
            services.to_emu(p.x) - xfrm.x,
            services.to_emu(p.y) - xfrm.y,
        )
    };
    let geometry = placed
        .iter()
        .filter(|p| !p.elements().is_empty())
        .map(|p| {
            let commands = p
                .elements()
                .iter()
                .map(|el| match *el {
                    PathEl::MoveTo(a) => {
                        let (x, y) = rel(a);
                        PathCommand::MoveTo(x, y)
                    }
                    PathEl::LineTo(a) => {
                        let (x, y) = rel(a);
                        PathCommand::LineTo(x, y)
                    }
                    PathEl::QuadTo(a, b) => {
                        let ((x1, y1), (x, y)) = (rel(a), rel(b));
                        PathCommand::QuadTo(x1, y1, x, y)
                    }
                    PathEl::CurveTo(a, b, c) => {
                        let ((x1, y1), (x2, y2), (x, y)) = (rel(a), rel(b), rel(c));
                        PathCommand::CubicTo(x1, y1, x2, y2, x, y)
                    }
                    PathEl::ClosePath => PathCommand::Close,
                })
                .collect();
            GeometryPath {
                width: xfrm.cx,
                height: xfrm.cy,
                commands,
            }
        })
        .collect();
    (xfrm, geometry)
}

/// User-space rectangle to an EMU transform.
pub fn emu_rect(r: Rect, services: &dyn ConversionServices) -> EmuRect {
    let x = services.to_emu(r.x0);
    let y = services.to_emu(r.y0);
    EmuRect {
        x,
        y,
        cx: services.to_emu(r.x1) - x,
        cy: services.to_emu(r.y1) - y,
    }
}

/// Length scale of the current transform, for distances that are not points.
pub fn length_scale(services: &dyn ConversionServices) -> f64 {
    let det = services.current_transform().determinant().abs();
    if det > 0.0 && det.is_finite() { det.sqrt() } else { 1.0 }
}

/// `dist` and `dir` (60000ths of a degree) of an offset.
pub fn polar(dx: f64, dy: f64) -> (f64, i64) {
    let dist = dx.hypot(dy);
    if dist == 0.0 {
        return (0.0, 0);
    }
    let deg = dy.atan2(dx).to_degrees().rem_euclid(360.0);
    (dist, (deg * 60_000.0).round() as i64 % 21_600_000)
}

#[cfg(test)]
#[path = "../../tests/unit/emit/vector.rs"]
mod tests;
