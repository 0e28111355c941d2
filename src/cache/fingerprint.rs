use xxhash_rust::xxh3::Xxh3;

use crate::cache::store::CacheKey;
use crate::foundation::core::{BezPath, RasterImage, Rect, Rgba};
use crate::graph::builder::{FilterGraph, InputRef, NodeId, SourceKind, Subregion};
use crate::graph::primitive::{
    BlendMode, Channel, ColorMatrix, CompositeOperator, EdgeMode, LightSource, Lighting,
    MorphologyOperator, Primitive, TransferFunction, TurbulenceKind,
};
use crate::pattern::tile::{PatternKind, PatternTile};
use crate::services::{ColorSpace, ShapeContext};

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// Key for the rasterization of `target` and everything feeding it, over `frame`, with
/// `linearRGB` math done in `color_space`.
///
/// Node ids are hashed relative to the subgraph, so the same chain embedded in different filters
/// shares a key.
pub(crate) fn fingerprint_subgraph(
    graph: &FilterGraph,
    target: NodeId,
    shape: &ShapeContext,
    frame: Rect,
    color_space: &dyn ColorSpace,
) -> CacheKey {
    let mut h = StableHasher::new();
    h.write_str("raster");
    write_rect(&mut h, frame);
    write_shape(&mut h, shape);
    h.write_str(color_space.id());

    let marks = graph.contributes_to(target);
    let mut local = vec![u32::MAX; graph.len()];
    let mut next = 0u32;
    for (i, &m) in marks.iter().enumerate() {
        if m {
            local[i] = next;
            next += 1;
        }
    }
    h.write_u32(next);
    for node in graph.nodes().iter().filter(|n| marks[n.id.index()]) {
        write_primitive(&mut h, &node.primitive);
        h.write_u32(node.inputs.len() as u32);
        for input in &node.inputs {
            match input {
                InputRef::Source(s) => {
                    h.write_u8(0);
                    h.write_u8(source_tag(*s));
                }
                InputRef::Node(id) => {
                    h.write_u8(1);
                    h.write_u32(local[id.index()]);
                }
            }
        }
        write_subregion(&mut h, &node.subregion);
        h.write_bool(node.linear_rgb);
    }
    h.finish()
}

pub(crate) fn fingerprint_tile(tile: &PatternTile) -> CacheKey {
    let mut h = StableHasher::new();
    h.write_str("tile");
    h.write_u8(match tile.kind {
        PatternKind::Hatch => 0,
        PatternKind::Crosshatch => 1,
        PatternKind::Dot => 2,
        PatternKind::Grid => 3,
        PatternKind::Brick => 4,
    });
    h.write_f64(tile.angle);
    h.write_f64(tile.spacing);
    write_rgba(&mut h, tile.color);
    h.write_f64(tile.density);
    match tile.background {
        None => h.write_u8(0),
        Some(bg) => {
            h.write_u8(1);
            write_rgba(&mut h, bg);
        }
    }
    h.finish()
}

/// Key for a raw raster tile cell that did not classify as a procedural pattern.
pub(crate) fn fingerprint_cell(cell: &RasterImage) -> CacheKey {
    let mut h = StableHasher::new();
    h.write_str("cell");
    h.write_u32(cell.width());
    h.write_u32(cell.height());
    h.write_bytes(cell.as_raw());
    h.finish()
}

pub(crate) struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    pub(crate) fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_f64(&mut self, v: f64) {
        // -0.0 and 0.0 draw the same.
        let v = if v == 0.0 { 0.0 } else { v };
        self.write_u64(v.to_bits());
    }

    pub(crate) fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    pub(crate) fn finish(self) -> CacheKey {
        let v = self.inner.digest128();
        CacheKey {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

fn write_rgba(h: &mut StableHasher, c: Rgba) {
    h.write_bytes(&[c.r, c.g, c.b, c.a]);
}

fn write_rect(h: &mut StableHasher, r: Rect) {
    h.write_f64(r.x0);
    h.write_f64(r.y0);
    h.write_f64(r.x1);
    h.write_f64(r.y1);
}

fn write_path(h: &mut StableHasher, path: &BezPath) {
    use kurbo::PathEl;
    let els = path.elements();
    h.write_u32(els.len() as u32);
    for el in els {
        let pts: &[kurbo::Point] = match el {
            PathEl::MoveTo(p) => {
                h.write_u8(0);
                std::slice::from_ref(p)
            }
            PathEl::LineTo(p) => {
                h.write_u8(1);
                std::slice::from_ref(p)
            }
            PathEl::QuadTo(a, b) => {
                h.write_u8(2);
                h.write_f64(a.x);
                h.write_f64(a.y);
                std::slice::from_ref(b)
            }
            PathEl::CurveTo(a, b, c) => {
                h.write_u8(3);
                h.write_f64(a.x);
                h.write_f64(a.y);
                h.write_f64(b.x);
                h.write_f64(b.y);
                std::slice::from_ref(c)
            }
            PathEl::ClosePath => {
                h.write_u8(4);
                &[]
            }
        };
        for p in pts {
            h.write_f64(p.x);
            h.write_f64(p.y);
        }
    }
}

fn write_shape(h: &mut StableHasher, shape: &ShapeContext) {
    write_path(h, &shape.geometry);
    match shape.fill {
        None => h.write_u8(0),
        Some(c) => {
            h.write_u8(1);
            write_rgba(h, c);
        }
    }
    match &shape.stroke {
        None => h.write_u8(0),
        Some(s) => {
            h.write_u8(1);
            write_rgba(h, s.color);
            h.write_f64(s.width);
        }
    }
    h.write_f64(shape.opacity);
}

fn write_subregion(h: &mut StableHasher, s: &Subregion) {
    for v in [s.x, s.y, s.width, s.height] {
        match v {
            None => h.write_u8(0),
            Some(v) => {
                h.write_u8(1);
                h.write_f64(v);
            }
        }
    }
}

fn source_tag(s: SourceKind) -> u8 {
    match s {
        SourceKind::SourceGraphic => 0,
        SourceKind::SourceAlpha => 1,
        SourceKind::BackgroundImage => 2,
        SourceKind::BackgroundAlpha => 3,
        SourceKind::FillPaint => 4,
        SourceKind::StrokePaint => 5,
    }
}

fn write_pair(h: &mut StableHasher, p: (f64, f64)) {
    h.write_f64(p.0);
    h.write_f64(p.1);
}

fn write_lighting(h: &mut StableHasher, l: &Lighting) {
    h.write_f64(l.surface_scale);
    h.write_f64(l.constant);
    h.write_f64(l.specular_exponent);
    write_rgba(h, l.color);
    match l.light {
        LightSource::Distant { azimuth, elevation } => {
            h.write_u8(0);
            h.write_f64(azimuth);
            h.write_f64(elevation);
        }
        LightSource::Point { x, y, z } => {
            h.write_u8(1);
            h.write_f64(x);
            h.write_f64(y);
            h.write_f64(z);
        }
        LightSource::Spot {
            x,
            y,
            z,
            points_at,
            specular_exponent,
            limiting_cone_angle,
        } => {
            h.write_u8(2);
            h.write_f64(x);
            h.write_f64(y);
            h.write_f64(z);
            h.write_f64(points_at.0);
            h.write_f64(points_at.1);
            h.write_f64(points_at.2);
            h.write_f64(specular_exponent);
            h.write_f64(limiting_cone_angle.unwrap_or(f64::NAN));
        }
    }
}

fn write_transfer(h: &mut StableHasher, f: &TransferFunction) {
    match f {
        TransferFunction::Identity => h.write_u8(0),
        TransferFunction::Table(t) | TransferFunction::Discrete(t) => {
            h.write_u8(if matches!(f, TransferFunction::Table(_)) { 1 } else { 2 });
            h.write_u32(t.len() as u32);
            for v in t {
                h.write_f64(*v);
            }
        }
        TransferFunction::Linear { slope, intercept } => {
            h.write_u8(3);
            h.write_f64(*slope);
            h.write_f64(*intercept);
        }
        TransferFunction::Gamma {
            amplitude,
            exponent,
            offset,
        } => {
            h.write_u8(4);
            h.write_f64(*amplitude);
            h.write_f64(*exponent);
            h.write_f64(*offset);
        }
    }
}

fn write_primitive(h: &mut StableHasher, p: &Primitive) {
    h.write_str(p.kind().tag());
    match p {
        Primitive::Blur { std_dev } => write_pair(h, *std_dev),
        Primitive::Offset { dx, dy } => write_pair(h, (*dx, *dy)),
        Primitive::ColorMatrix(m) => {
            h.write_u8(match m {
                ColorMatrix::Matrix(_) => 0,
                ColorMatrix::Saturate(_) => 1,
                ColorMatrix::HueRotate(_) => 2,
                ColorMatrix::LuminanceToAlpha => 3,
            });
            for v in m.to_matrix() {
                h.write_f64(v);
            }
        }
        Primitive::Composite { operator, k } => {
            h.write_u8(match operator {
                CompositeOperator::Over => 0,
                CompositeOperator::In => 1,
                CompositeOperator::Out => 2,
                CompositeOperator::Atop => 3,
                CompositeOperator::Xor => 4,
                CompositeOperator::Lighter => 5,
                CompositeOperator::Arithmetic => 6,
            });
            for v in k {
                h.write_f64(*v);
            }
        }
        Primitive::Morphology { operator, radius } => {
            h.write_bool(*operator == MorphologyOperator::Dilate);
            write_pair(h, *radius);
        }
        Primitive::ConvolveMatrix(c) => {
            h.write_u32(c.order.0 as u32);
            h.write_u32(c.order.1 as u32);
            for v in &c.kernel {
                h.write_f64(*v);
            }
            h.write_f64(c.divisor);
            h.write_f64(c.bias);
            h.write_u32(c.target.0 as u32);
            h.write_u32(c.target.1 as u32);
            h.write_u8(match c.edge_mode {
                EdgeMode::Duplicate => 0,
                EdgeMode::Wrap => 1,
                EdgeMode::None => 2,
            });
            h.write_bool(c.preserve_alpha);
        }
        Primitive::DiffuseLighting(l) | Primitive::SpecularLighting(l) => write_lighting(h, l),
        Primitive::DisplacementMap {
            scale,
            x_channel,
            y_channel,
        } => {
            h.write_f64(*scale);
            h.write_u8(channel_tag(*x_channel));
            h.write_u8(channel_tag(*y_channel));
        }
        Primitive::Tile | Primitive::Merge => {}
        Primitive::Turbulence {
            base_frequency,
            octaves,
            seed,
            stitch,
            kind,
        } => {
            write_pair(h, *base_frequency);
            h.write_u32(*octaves);
            h.write_f64(*seed);
            h.write_bool(*stitch);
            h.write_bool(*kind == TurbulenceKind::FractalNoise);
        }
        Primitive::ComponentTransfer { funcs } => {
            for f in funcs {
                write_transfer(h, f);
            }
        }
        Primitive::Flood { color } => write_rgba(h, *color),
        Primitive::DropShadow {
            dx,
            dy,
            std_dev,
            color,
        } => {
            write_pair(h, (*dx, *dy));
            write_pair(h, *std_dev);
            write_rgba(h, *color);
        }
        Primitive::Blend { mode } => h.write_u8(match mode {
            BlendMode::Normal => 0,
            BlendMode::Multiply => 1,
            BlendMode::Screen => 2,
            BlendMode::Darken => 3,
            BlendMode::Lighten => 4,
            BlendMode::Difference => 5,
        }),
        Primitive::Unsupported { name } => h.write_str(name),
    }
}

fn channel_tag(c: Channel) -> u8 {
    c.index() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/cache/fingerprint.rs"]
mod tests;
