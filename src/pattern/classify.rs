//! Detection of procedural patterns in raster tiles.

use std::collections::HashMap;

use crate::foundation::core::{RasterImage, Rgba};
use crate::pattern::tile::{MAX_SPACING, MIN_SPACING, PatternKind, PatternTile};

/// Share of pixels that must agree with the procedural rendering.
const MATCH_THRESHOLD: f64 = 0.97;
/// Per-channel tolerance when comparing pixels.
const CHANNEL_TOLERANCE: u8 = 24;

/// Recognize a two-colour square cell as a hatch, grid or dot pattern.
///
/// Returns `None` for anything that does not reproduce within tolerance; the caller then embeds
/// the cell as a raster instead.
pub fn classify_cell(cell: &RasterImage) -> Option<PatternTile> {
    let (w, h) = (cell.width(), cell.height());
    if w != h || !(MIN_SPACING..=MAX_SPACING).contains(&f64::from(w)) {
        return None;
    }
    let (background, ink, ink_fraction) = two_tone(cell)?;
    let s = f64::from(w);
    let bg = (background.a > 0).then_some(background);

    let dot_d = (4.0 * ink_fraction / std::f64::consts::PI).sqrt();
    let grid_d = 1.0 - (1.0 - ink_fraction).max(0.0).sqrt();
    let candidates = [
        PatternTile::new(PatternKind::Hatch, s, ink).with_density(ink_fraction),
        PatternTile::new(PatternKind::Hatch, s, ink)
            .with_angle(90.0)
            .with_density(ink_fraction),
        PatternTile::new(PatternKind::Grid, s, ink).with_density(grid_d),
        PatternTile::new(PatternKind::Dot, s, ink).with_density(dot_d),
    ];

    candidates
        .into_iter()
        .filter(|t| t.density > 0.0 && t.density <= 1.0)
        .filter_map(|t| {
            let tile = t.with_background(bg);
            let rendered = tile.rasterize().ok()?;
            if rendered.width() != w || rendered.height() != h {
                return None;
            }
            Some((agreement(cell, &rendered), tile))
        })
        .filter(|(score, _)| *score >= MATCH_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, tile)| tile)
}

/// Dominant background colour, ink colour and the fraction of pixels closer to the ink.
fn two_tone(cell: &RasterImage) -> Option<(Rgba, Rgba, f64)> {
    let mut counts: HashMap<[u8; 4], u32> = HashMap::new();
    for px in cell.as_raw().chunks_exact(4) {
        *counts.entry([px[0], px[1], px[2], px[3]]).or_default() += 1;
    }
    let mut ranked: Vec<([u8; 4], u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    if ranked.len() < 2 {
        return None;
    }
    let total = cell.pixel_count() as f64;
    let top_two = f64::from(ranked[0].1 + ranked[1].1);
    if top_two / total < MATCH_THRESHOLD - 0.07 {
        return None;
    }

    // The more opaque of the two is the ink.
    let (mut bg, mut ink) = (ranked[0].0, ranked[1].0);
    if ink[3] < bg[3] {
        std::mem::swap(&mut bg, &mut ink);
    }
    if ink[3] == 0 {
        return None;
    }
    let ink_pixels = cell
        .as_raw()
        .chunks_exact(4)
        .filter(|px| distance(px, &ink) < distance(px, &bg))
        .count();
    let fraction = ink_pixels as f64 / total;
    Some((
        Rgba::from_premultiplied(bg),
        Rgba::from_premultiplied(ink),
        fraction,
    ))
}

fn distance(a: &[u8], b: &[u8; 4]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| u32::from(x.abs_diff(y)))
        .sum()
}

fn agreement(a: &RasterImage, b: &RasterImage) -> f64 {
    let same = a
        .as_raw()
        .chunks_exact(4)
        .zip(b.as_raw().chunks_exact(4))
        .filter(|(p, q)| p.iter().zip(q.iter()).all(|(x, y)| x.abs_diff(*y) <= CHANNEL_TOLERANCE))
        .count();
    same as f64 / a.pixel_count().max(1) as f64
}

#[cfg(test)]
#[path = "../../tests/unit/pattern/classify.rs"]
mod tests;
