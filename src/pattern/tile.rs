//! Procedural repeating patterns.
//!
//! Every pattern is reduced to integer geometry that is exactly periodic in its tile, so a tile
//! repeated by `a:tile` has no seam. Shapes that straddle the tile edge are emitted together with
//! their lattice copies and the renderer clips them to the cell.

use crate::emf::encoder::{EmfBlob, encode_tile_geometry};
use crate::emf::records::{EmfRecord, RectL};
use crate::foundation::core::{RasterImage, Rgba};
use crate::foundation::error::EncodeError;

/// Smallest spacing accepted by [`PatternTile::geometry`], in pixels.
pub const MIN_SPACING: f64 = 2.0;
/// Largest spacing accepted.
pub const MAX_SPACING: f64 = 512.0;
/// Hatch angles whose tile would be more than this many spacings long snap to the nearest axis.
const MAX_TILE_RATIO: f64 = 16.0;

/// Pattern family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Parallel lines.
    Hatch,
    /// Two perpendicular line sets.
    Crosshatch,
    /// Dots on a square lattice.
    Dot,
    /// Axis-aligned grid lines.
    Grid,
    /// Running-bond brick courses.
    Brick,
}

/// A repeating pattern description. Equal tiles render identically and share one cache entry.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternTile {
    /// Pattern family.
    pub kind: PatternKind,
    /// Degrees, clockwise from +x (y down).
    pub angle: f64,
    /// Distance between repeats in pixels.
    pub spacing: f64,
    /// Ink colour.
    pub color: Rgba,
    /// Ink fraction of the spacing, in `(0, 1]`.
    pub density: f64,
    /// Fill behind the ink; `None` leaves it transparent.
    pub background: Option<Rgba>,
}

impl PatternTile {
    /// Pattern at angle 0 with density 0.25 and no background.
    pub fn new(kind: PatternKind, spacing: f64, color: Rgba) -> Self {
        Self {
            kind,
            angle: 0.0,
            spacing,
            color,
            density: 0.25,
            background: None,
        }
    }

    /// Set the angle in degrees.
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set the ink fraction.
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Set or clear the background.
    pub fn with_background(mut self, background: Option<Rgba>) -> Self {
        self.background = background;
        self
    }

    fn validate(&self) -> Result<(), EncodeError> {
        if !self.spacing.is_finite() || !(MIN_SPACING..=MAX_SPACING).contains(&self.spacing) {
            return Err(EncodeError::MalformedTile(format!(
                "spacing {} outside [{MIN_SPACING}, {MAX_SPACING}]",
                self.spacing
            )));
        }
        if !self.angle.is_finite() {
            return Err(EncodeError::MalformedTile(format!(
                "angle {} is not finite",
                self.angle
            )));
        }
        if !self.density.is_finite() || self.density <= 0.0 || self.density > 1.0 {
            return Err(EncodeError::MalformedTile(format!(
                "density {} outside (0, 1]",
                self.density
            )));
        }
        Ok(())
    }

    /// Tile size and the untranslated shapes of one period.
    fn prototype(&self) -> Result<Prototype, EncodeError> {
        self.validate()?;
        let s = self.spacing.round() as i32;
        let t = ((self.density * f64::from(s)).round() as i32).clamp(1, s - 1);
        let proto = match self.kind {
            PatternKind::Hatch => hatch(self.angle, s, t),
            PatternKind::Crosshatch => crosshatch(self.angle, s, t),
            PatternKind::Grid => grid(s, t),
            PatternKind::Dot => {
                let off = (s - t) / 2;
                Prototype {
                    width: s,
                    height: s,
                    shapes: vec![TileShape::Ellipse(RectL::new(off, off, off + t, off + t))],
                }
            }
            PatternKind::Brick => brick(s, t),
        };
        Ok(proto)
    }

    /// Integer geometry of one tile, including the lattice copies of shapes crossing its edges.
    pub fn geometry(&self) -> Result<TileGeometry, EncodeError> {
        let proto = self.prototype()?;
        let (w, h) = (proto.width, proto.height);
        let mut shapes = Vec::new();
        for j in -1..=1 {
            for i in -1..=1 {
                for shape in &proto.shapes {
                    let moved = shape.translated(i * w, j * h);
                    if moved.intersects(w, h) {
                        shapes.push(moved);
                    }
                }
            }
        }
        Ok(TileGeometry {
            width: w as u32,
            height: h as u32,
            shapes,
            color: self.color,
            background: self.background,
        })
    }

    /// Render one tile cell.
    pub fn rasterize(&self) -> Result<RasterImage, EncodeError> {
        Ok(self.geometry()?.rasterize())
    }

    /// Render the infinite pattern over `[0, width) x [0, height)` without tiling a cell.
    pub fn rasterize_region(&self, width: u32, height: u32) -> Result<RasterImage, EncodeError> {
        let proto = self.prototype()?;
        let (w, h) = (proto.width, proto.height);
        let reps_x = (width as i32 + w - 1) / w;
        let reps_y = (height as i32 + h - 1) / h;
        let mut shapes = Vec::new();
        for j in -1..=reps_y {
            for i in -1..=reps_x {
                shapes.extend(proto.shapes.iter().map(|s| s.translated(i * w, j * h)));
            }
        }
        Ok(render_shapes(
            &shapes,
            width,
            height,
            self.color,
            self.background,
        ))
    }

    /// Vector EMF of one tile.
    pub fn encode(&self) -> Result<EmfBlob, EncodeError> {
        encode_tile_geometry(&self.geometry()?)
    }
}

struct Prototype {
    width: i32,
    height: i32,
    shapes: Vec<TileShape>,
}

fn band(x0: i32, y0: i32, x1: i32, y1: i32) -> TileShape {
    TileShape::Polygon(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
}

fn hatch(angle: f64, s: i32, t: i32) -> Prototype {
    let theta = angle.rem_euclid(180.0).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let limit = 1.0 / MAX_TILE_RATIO;
    if sin < limit {
        return Prototype {
            width: s,
            height: s,
            shapes: vec![band(0, 0, s, t)],
        };
    }
    if cos < limit {
        return Prototype {
            width: s,
            height: s,
            shapes: vec![band(0, 0, t, s)],
        };
    }
    let w = (f64::from(s) / sin).round() as i32;
    let h = (f64::from(s) / cos).round() as i32;
    let rising = theta.to_degrees() > 90.0;
    Prototype {
        width: w,
        height: h,
        shapes: vec![diagonal(w, h, s, t, rising)],
    }
}

/// Band along the tile diagonal. Adjacent diagonals of the `w x h` lattice are `s` apart.
fn diagonal(w: i32, h: i32, s: i32, t: i32, rising: bool) -> TileShape {
    let wt = ((f64::from(t) * f64::from(w) / f64::from(s)).round() as i32).max(1);
    if rising {
        TileShape::Polygon(vec![(0, h), (wt, h), (w + wt, 0), (w, 0)])
    } else {
        TileShape::Polygon(vec![(0, 0), (wt, 0), (w + wt, h), (w, h)])
    }
}

fn crosshatch(angle: f64, s: i32, t: i32) -> Prototype {
    let a = angle.rem_euclid(90.0);
    if a < 1.0 || a > 89.0 {
        return grid(s, t);
    }
    let d = (f64::from(s) * std::f64::consts::SQRT_2).round() as i32;
    Prototype {
        width: d,
        height: d,
        shapes: vec![diagonal(d, d, s, t, false), diagonal(d, d, s, t, true)],
    }
}

fn grid(s: i32, t: i32) -> Prototype {
    Prototype {
        width: s,
        height: s,
        shapes: vec![band(0, 0, s, t), band(0, 0, t, s)],
    }
}

/// Running bond: courses `s` high, bricks `2s` long, head joints offset by half a brick.
fn brick(s: i32, t: i32) -> Prototype {
    let w = 2 * s;
    Prototype {
        width: w,
        height: w,
        shapes: vec![
            band(0, 0, w, t),
            band(0, s, w, s + t),
            band(0, 0, t, s),
            band(s, s, s + t, w),
        ],
    }
}

/// One filled outline of a tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TileShape {
    /// Closed polygon in tile pixels.
    Polygon(Vec<(i32, i32)>),
    /// Ellipse inscribed in the rectangle.
    Ellipse(RectL),
}

impl TileShape {
    fn translated(&self, dx: i32, dy: i32) -> Self {
        match self {
            Self::Polygon(pts) => Self::Polygon(pts.iter().map(|&(x, y)| (x + dx, y + dy)).collect()),
            Self::Ellipse(r) => Self::Ellipse(RectL::new(
                r.left + dx,
                r.top + dy,
                r.right + dx,
                r.bottom + dy,
            )),
        }
    }

    fn bounds(&self) -> (i32, i32, i32, i32) {
        match self {
            Self::Polygon(pts) => pts.iter().fold(
                (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
                |(l, t, r, b), &(x, y)| (l.min(x), t.min(y), r.max(x), b.max(y)),
            ),
            Self::Ellipse(r) => (r.left, r.top, r.right, r.bottom),
        }
    }

    fn intersects(&self, w: i32, h: i32) -> bool {
        let (l, t, r, b) = self.bounds();
        l < w && t < h && r > 0 && b > 0
    }

    /// Nonzero-winding containment, exact for the quarter-pixel sample grid.
    fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Polygon(pts) => winding(pts, x, y) != 0,
            Self::Ellipse(r) => {
                let rx = f64::from(r.right - r.left);
                let ry = f64::from(r.bottom - r.top);
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let dx = 2.0 * x - f64::from(r.left + r.right);
                let dy = 2.0 * y - f64::from(r.top + r.bottom);
                dx * dx * ry * ry + dy * dy * rx * rx <= rx * rx * ry * ry
            }
        }
    }
}

fn winding(pts: &[(i32, i32)], x: f64, y: f64) -> i32 {
    let mut wn = 0;
    for (k, &(x0, y0)) in pts.iter().enumerate() {
        let (x1, y1) = pts[(k + 1) % pts.len()];
        let (x0, y0, x1, y1) = (f64::from(x0), f64::from(y0), f64::from(x1), f64::from(y1));
        let cross = (x1 - x0) * (y - y0) - (x - x0) * (y1 - y0);
        if y0 <= y {
            if y1 > y && cross > 0.0 {
                wn += 1;
            }
        } else if y1 <= y && cross < 0.0 {
            wn -= 1;
        }
    }
    wn
}

/// Drawable form of one tile: what the EMF encoder writes and what the rasterizer reads back.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGeometry {
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
    /// Ink shapes.
    pub shapes: Vec<TileShape>,
    /// Ink colour.
    pub color: Rgba,
    /// Background colour, if any.
    pub background: Option<Rgba>,
}

impl TileGeometry {
    /// Rebuild geometry from the records of a tile EMF.
    ///
    /// Polygons drawn before the clip rectangle are the background; everything after it is ink.
    pub fn from_records(
        width: u32,
        height: u32,
        records: &[EmfRecord],
    ) -> Result<Self, EncodeError> {
        let mut brush = None;
        let mut clipped = false;
        let mut geometry = Self {
            width,
            height,
            shapes: Vec::new(),
            color: Rgba::BLACK,
            background: None,
        };
        for rec in records {
            match rec {
                EmfRecord::CreateBrush { color, .. } => brush = Some(*color),
                EmfRecord::IntersectClipRect(_) => clipped = true,
                EmfRecord::Polygon16 { points, .. } if !clipped => {
                    geometry.background = brush;
                    if points.len() < 3 {
                        return Err(EncodeError::MalformedTile("degenerate background".into()));
                    }
                }
                EmfRecord::Polygon16 { points, .. } => {
                    geometry.color = brush.unwrap_or(Rgba::BLACK);
                    geometry.shapes.push(TileShape::Polygon(
                        points
                            .iter()
                            .map(|&(x, y)| (i32::from(x), i32::from(y)))
                            .collect(),
                    ));
                }
                EmfRecord::Ellipse(r) => {
                    geometry.color = brush.unwrap_or(Rgba::BLACK);
                    geometry.shapes.push(TileShape::Ellipse(*r));
                }
                _ => {}
            }
        }
        Ok(geometry)
    }

    /// Render the tile at one pixel per unit.
    pub fn rasterize(&self) -> RasterImage {
        render_shapes(
            &self.shapes,
            self.width,
            self.height,
            self.color,
            self.background,
        )
    }
}

const SAMPLE_OFFSETS: [f64; 2] = [0.25, 0.75];

fn render_shapes(
    shapes: &[TileShape],
    width: u32,
    height: u32,
    ink: Rgba,
    background: Option<Rgba>,
) -> RasterImage {
    let ink_p = ink.premultiplied().map(f64::from);
    let bg_p = background.unwrap_or(Rgba::TRANSPARENT).premultiplied().map(f64::from);
    let ink_a = ink.alpha_f64();
    let samples = (SAMPLE_OFFSETS.len() * SAMPLE_OFFSETS.len()) as f64;
    RasterImage::from_fn(width, height, |x, y| {
        let mut hits = 0u32;
        for oy in SAMPLE_OFFSETS {
            for ox in SAMPLE_OFFSETS {
                let (px, py) = (f64::from(x) + ox, f64::from(y) + oy);
                if shapes.iter().any(|s| s.contains(px, py)) {
                    hits += 1;
                }
            }
        }
        let c = f64::from(hits) / samples;
        let mut out = [0u8; 4];
        for k in 0..4 {
            let v = ink_p[k] * c + bg_p[k] * (1.0 - c * ink_a);
            out[k] = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    })
}

#[cfg(test)]
#[path = "../../tests/unit/pattern/tile.rs"]
mod tests;
