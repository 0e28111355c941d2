//! Topological evaluation of a subgraph into a premultiplied image.

use crate::foundation::core::RasterImage;
use crate::foundation::error::EncodeError;
use crate::foundation::math::mul_div255_u8;
use crate::graph::builder::{FilterGraph, FilterNode, InputRef, NodeId, SourceKind};
use crate::graph::primitive::Primitive;
use crate::raster::ops::{self, TurbulenceParams};
use crate::raster::source::{Frame, flood, render_source};
use crate::services::{ColorSpace, ShapeContext};

/// Everything a subgraph render reads besides the graph itself.
pub struct RasterInputs<'a> {
    /// Element supplying `SourceGraphic` and the paints.
    pub shape: &'a ShapeContext,
    /// Output grid.
    pub frame: Frame,
    /// Space for `color-interpolation-filters="linearRGB"`.
    pub color_space: &'a dyn ColorSpace,
    /// Largest frame area allowed.
    pub max_pixels: u32,
}

/// Render `target` and every node feeding it over `inputs.frame`.
#[tracing::instrument(skip_all, fields(target = target.0, w = inputs.frame.width, h = inputs.frame.height))]
pub fn render_subgraph(
    graph: &FilterGraph,
    target: NodeId,
    inputs: &RasterInputs<'_>,
) -> Result<RasterImage, EncodeError> {
    let frame = inputs.frame;
    if frame.pixel_count() > u64::from(inputs.max_pixels) || frame.width == 0 || frame.height == 0 {
        return Err(EncodeError::UnsupportedDimensions {
            width: u64::from(frame.width),
            height: u64::from(frame.height),
            max_pixels: u64::from(inputs.max_pixels),
        });
    }

    let marks = graph.contributes_to(target);
    let mut sources: Vec<(SourceKind, RasterImage)> = Vec::new();
    for node in graph.nodes().iter().filter(|n| marks[n.id.index()]) {
        for input in &node.inputs {
            let InputRef::Source(kind) = input else {
                continue;
            };
            if !sources.iter().any(|(k, _)| k == kind) {
                sources.push((*kind, render_source(*kind, inputs.shape, &frame)));
            }
        }
    }

    let blank = RasterImage::new(frame.width, frame.height);
    let mut memo: Vec<Option<RasterImage>> = vec![None; graph.len()];
    for node in graph.nodes()[..=target.index()].iter() {
        if !marks[node.id.index()] {
            continue;
        }
        let layers: Vec<&RasterImage> = node
            .inputs
            .iter()
            .map(|input| match input {
                InputRef::Source(kind) => sources
                    .iter()
                    .find(|(k, _)| k == kind)
                    .map_or(&blank, |(_, img)| img),
                InputRef::Node(id) => memo[id.index()].as_ref().unwrap_or(&blank),
            })
            .collect();
        let mut out = apply(graph, node, &layers, &blank, inputs);
        let region = node.subregion.resolve(frame.rect());
        ops::clip(&mut out, frame.pixel_rect(region));
        tracing::trace!(node = node.label.as_str(), "rasterized");
        memo[node.id.index()] = Some(out);
    }
    Ok(memo.swap_remove(target.index()).unwrap_or(blank))
}

/// Pixel rectangle of the cell an `feTile` node repeats: its input's subregion.
pub fn tile_cell_rect(graph: &FilterGraph, tile: NodeId, frame: &Frame) -> (u32, u32, u32, u32) {
    let region = match graph.node(tile).inputs.first() {
        Some(InputRef::Node(id)) => graph.node(*id).subregion.resolve(frame.rect()),
        _ => frame.rect(),
    };
    frame.pixel_rect(region)
}

fn apply(
    graph: &FilterGraph,
    node: &FilterNode,
    layers: &[&RasterImage],
    blank: &RasterImage,
    inputs: &RasterInputs<'_>,
) -> RasterImage {
    let frame = inputs.frame;
    let a = layers.first().copied().unwrap_or(blank);
    let b = layers.get(1).copied().unwrap_or(blank);
    let space = node.linear_rgb.then_some(inputs.color_space);
    let origin = (f64::from(frame.x), f64::from(frame.y));

    match &node.primitive {
        Primitive::Blur { std_dev } => ops::gaussian_blur(a, *std_dev),
        Primitive::Offset { dx, dy } => ops::offset(a, *dx, *dy),
        Primitive::ColorMatrix(m) => ops::color_matrix(a, m, space),
        Primitive::ComponentTransfer { funcs } => ops::component_transfer(a, funcs, space),
        Primitive::Composite { operator, k } => ops::composite(a, b, *operator, *k),
        Primitive::Blend { mode } => ops::blend(a, b, *mode),
        Primitive::Merge => ops::merge(layers, frame.width, frame.height),
        Primitive::Morphology { operator, radius } => ops::morphology(a, *operator, *radius),
        Primitive::ConvolveMatrix(p) => ops::convolve(a, p),
        Primitive::DisplacementMap {
            scale,
            x_channel,
            y_channel,
        } => ops::displacement_map(a, b, *scale, *x_channel, *y_channel),
        Primitive::DiffuseLighting(l) => ops::lighting(a, l, false, origin),
        Primitive::SpecularLighting(l) => ops::lighting(a, l, true, origin),
        Primitive::Tile => ops::tile(a, tile_cell_rect(graph, node.id, &frame)),
        Primitive::Turbulence {
            base_frequency,
            octaves,
            seed,
            stitch,
            kind,
        } => {
            let region = node.subregion.resolve(frame.rect());
            ops::turbulence(
                frame.width,
                frame.height,
                &TurbulenceParams {
                    base_frequency: *base_frequency,
                    octaves: *octaves,
                    seed: *seed,
                    stitch: *stitch,
                    kind: *kind,
                    origin,
                    tile: (region.x0, region.y0, region.width(), region.height()),
                },
            )
        }
        Primitive::Flood { color } => flood(frame.width, frame.height, *color),
        Primitive::DropShadow {
            dx,
            dy,
            std_dev,
            color,
        } => {
            let tint = color.premultiplied();
            let silhouette = RasterImage::from_fn(frame.width, frame.height, |x, y| {
                let alpha = u16::from(a.pixel(x, y)[3]);
                tint.map(|c| mul_div255_u8(u16::from(c), alpha))
            });
            let shadow = ops::offset(&ops::gaussian_blur(&silhouette, *std_dev), *dx, *dy);
            ops::merge(&[&shadow, a], frame.width, frame.height)
        }
        Primitive::Unsupported { .. } => a.clone(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/eval.rs"]
mod tests;
