//! Pixel operations on premultiplied RGBA8 rasters.

use std::collections::VecDeque;

use crate::foundation::core::RasterImage;
use crate::foundation::math::{mul_div255_u8, unit_to_u8};
use crate::graph::primitive::{
    BlendMode, Channel, ColorMatrix, CompositeOperator, ConvolveParams, EdgeMode, LightSource,
    Lighting, MorphologyOperator, TransferFunction, TurbulenceKind,
};
use crate::services::ColorSpace;

/// Kernels wider than this use three box passes instead of a direct Gaussian.
const MAX_DIRECT_RADIUS: u32 = 32;

/// Separable Gaussian blur with per-axis deviations in pixels.
pub fn gaussian_blur(src: &RasterImage, std_dev: (f64, f64)) -> RasterImage {
    let (w, h) = (src.width(), src.height());
    let mut out = src.clone();
    if w == 0 || h == 0 {
        return out;
    }
    let mut tmp = vec![0u8; src.as_raw().len()];
    let (sx, sy) = std_dev;
    if sx > 0.0 {
        blur_axis(&mut out, &mut tmp, sx, Axis::X);
    }
    if sy > 0.0 {
        blur_axis(&mut out, &mut tmp, sy, Axis::Y);
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

fn blur_axis(img: &mut RasterImage, tmp: &mut [u8], sigma: f64, axis: Axis) {
    let (w, h) = (img.width(), img.height());
    let radius = (3.0 * sigma).ceil() as u32;
    if radius > MAX_DIRECT_RADIUS {
        // Box approximation: three passes of width d.
        let d = ((sigma * 3.0 * (2.0 * std::f64::consts::PI).sqrt() / 4.0) + 0.5).floor() as u32;
        let d = d.max(1);
        for _ in 0..3 {
            tmp.copy_from_slice(img.as_raw());
            box_pass(tmp, img.as_raw_mut(), w, h, d, axis);
        }
        return;
    }
    let kernel = gaussian_kernel_q16(radius, sigma);
    tmp.copy_from_slice(img.as_raw());
    match axis {
        Axis::X => horizontal_blur_q16(tmp, img.as_raw_mut(), w, h, &kernel),
        Axis::Y => vertical_blur_q16(tmp, img.as_raw_mut(), w, h, &kernel),
    }
}

/// Normalized Gaussian weights in Q16; the rounding remainder goes to the centre tap.
pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f64) -> Vec<u32> {
    if radius == 0 || !sigma.is_finite() || sigma <= 0.0 {
        return vec![1 << 16];
    }
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = Vec::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    weights
}

fn horizontal_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let (w, h) = (width as i32, height as i32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

/// Running-sum box filter of width `d` along one axis, transparent outside the image.
fn box_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, d: u32, axis: Axis) {
    let (w, h) = (width as usize, height as usize);
    let (lines, len) = match axis {
        Axis::X => (h, w),
        Axis::Y => (w, h),
    };
    let index = |line: usize, i: usize| match axis {
        Axis::X => (line * w + i) * 4,
        Axis::Y => (i * w + line) * 4,
    };
    // Even widths are centred half a pixel left, matching the usual three-pass scheme.
    let d = d as isize;
    let lo = d / 2;
    let hi = d - lo - 1;
    for line in 0..lines {
        let mut sum = [0u32; 4];
        for i in -lo..=hi.min(len as isize - 1) {
            if i >= 0 {
                let idx = index(line, i as usize);
                for c in 0..4 {
                    sum[c] += u32::from(src[idx + c]);
                }
            }
        }
        for i in 0..len as isize {
            let out = index(line, i as usize);
            for c in 0..4 {
                dst[out + c] = ((sum[c] + d as u32 / 2) / d as u32).min(255) as u8;
            }
            let enter = i + hi + 1;
            let leave = i - lo;
            if enter >= 0 && (enter as usize) < len {
                let idx = index(line, enter as usize);
                for c in 0..4 {
                    sum[c] += u32::from(src[idx + c]);
                }
            }
            if leave >= 0 && (leave as usize) < len {
                let idx = index(line, leave as usize);
                for c in 0..4 {
                    sum[c] -= u32::from(src[idx + c]);
                }
            }
        }
    }
}

/// Shift by whole pixels; uncovered pixels become transparent.
pub fn offset(src: &RasterImage, dx: f64, dy: f64) -> RasterImage {
    let (dx, dy) = (dx.round() as i64, dy.round() as i64);
    let (w, h) = (i64::from(src.width()), i64::from(src.height()));
    RasterImage::from_fn(src.width(), src.height(), |x, y| {
        let (sx, sy) = (i64::from(x) - dx, i64::from(y) - dy);
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0; 4]
        } else {
            src.pixel(sx as u32, sy as u32)
        }
    })
}

/// Run `f` on straight-alpha unit colour, in linear light when `space` is given.
fn map_straight(
    src: &RasterImage,
    space: Option<&dyn ColorSpace>,
    f: impl Fn([f64; 4]) -> [f64; 4],
) -> RasterImage {
    let mut out = src.clone();
    for px in out.as_raw_mut().chunks_exact_mut(4) {
        let a = f64::from(px[3]) / 255.0;
        let mut c = [0.0; 4];
        for k in 0..3 {
            c[k] = if a > 0.0 {
                (f64::from(px[k]) / 255.0 / a).min(1.0)
            } else {
                0.0
            };
            if let Some(cs) = space {
                c[k] = cs.to_linear(c[k]);
            }
        }
        c[3] = a;
        let mut r = f(c);
        if let Some(cs) = space {
            for v in r.iter_mut().take(3) {
                *v = cs.to_srgb(v.clamp(0.0, 1.0));
            }
        }
        let oa = r[3].clamp(0.0, 1.0);
        for k in 0..3 {
            px[k] = unit_to_u8(r[k].clamp(0.0, 1.0) * oa);
        }
        px[3] = unit_to_u8(oa);
    }
    out
}

/// `feColorMatrix` on straight colour, optionally in linear RGB.
pub fn color_matrix(src: &RasterImage, m: &ColorMatrix, space: Option<&dyn ColorSpace>) -> RasterImage {
    map_straight(src, space, |c| m.apply(c))
}

/// `feComponentTransfer`. All-identity functions return a clone.
pub fn component_transfer(
    src: &RasterImage,
    funcs: &[TransferFunction; 4],
    space: Option<&dyn ColorSpace>,
) -> RasterImage {
    if funcs.iter().all(TransferFunction::is_identity) {
        return src.clone();
    }
    map_straight(src, space, |c| {
        [
            funcs[0].apply(c[0]),
            funcs[1].apply(c[1]),
            funcs[2].apply(c[2]),
            funcs[3].apply(c[3]),
        ]
    })
}

/// Porter-Duff `over`, as used by merge.
pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Stack layers bottom to top.
pub fn merge(layers: &[&RasterImage], width: u32, height: u32) -> RasterImage {
    let mut out = RasterImage::new(width, height);
    for layer in layers {
        for (d, s) in out.as_raw_mut().chunks_exact_mut(4).zip(layer.as_raw().chunks_exact(4)) {
            let r = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&r);
        }
    }
    out
}

/// `in` composited onto `in2`.
pub fn composite(a: &RasterImage, b: &RasterImage, op: CompositeOperator, k: [f64; 4]) -> RasterImage {
    let mut out = a.clone();
    for (o, q) in out.as_raw_mut().chunks_exact_mut(4).zip(b.as_raw().chunks_exact(4)) {
        let ca: [f64; 4] = [o[0], o[1], o[2], o[3]].map(|v| f64::from(v) / 255.0);
        let cb: [f64; 4] = [q[0], q[1], q[2], q[3]].map(|v| f64::from(v) / 255.0);
        let (aa, ab) = (ca[3], cb[3]);
        let mut r = [0.0; 4];
        for i in 0..4 {
            r[i] = match op {
                CompositeOperator::Over => ca[i] + cb[i] * (1.0 - aa),
                CompositeOperator::In => ca[i] * ab,
                CompositeOperator::Out => ca[i] * (1.0 - ab),
                CompositeOperator::Atop => ca[i] * ab + cb[i] * (1.0 - aa),
                CompositeOperator::Xor => ca[i] * (1.0 - ab) + cb[i] * (1.0 - aa),
                CompositeOperator::Lighter => ca[i] + cb[i],
                CompositeOperator::Arithmetic => {
                    k[0] * ca[i] * cb[i] + k[1] * ca[i] + k[2] * cb[i] + k[3]
                }
            };
        }
        let ra = r[3].clamp(0.0, 1.0);
        for i in 0..3 {
            o[i] = unit_to_u8(r[i].clamp(0.0, ra));
        }
        o[3] = unit_to_u8(ra);
    }
    out
}

/// `in` (source) blended over `in2` (backdrop).
pub fn blend(a: &RasterImage, b: &RasterImage, mode: BlendMode) -> RasterImage {
    let f = |s: f64, d: f64| match mode {
        BlendMode::Normal => s,
        BlendMode::Multiply => s * d,
        BlendMode::Screen => s + d - s * d,
        BlendMode::Darken => s.min(d),
        BlendMode::Lighten => s.max(d),
        BlendMode::Difference => (d - s).abs(),
    };
    let mut out = a.clone();
    for (o, q) in out.as_raw_mut().chunks_exact_mut(4).zip(b.as_raw().chunks_exact(4)) {
        let sp: [f64; 4] = [o[0], o[1], o[2], o[3]].map(|v| f64::from(v) / 255.0);
        let dp: [f64; 4] = [q[0], q[1], q[2], q[3]].map(|v| f64::from(v) / 255.0);
        let (sa, da) = (sp[3], dp[3]);
        let out_a = sa + da - sa * da;
        for i in 0..3 {
            let sc = if sa > 0.0 { (sp[i] / sa).min(1.0) } else { 0.0 };
            let dc = if da > 0.0 { (dp[i] / da).min(1.0) } else { 0.0 };
            let v = sp[i] * (1.0 - da) + dp[i] * (1.0 - sa) + sa * da * f(sc, dc);
            o[i] = unit_to_u8(v.clamp(0.0, out_a));
        }
        o[3] = unit_to_u8(out_a);
    }
    out
}

/// Per-channel min (erode) or max (dilate) over a `(2rx+1) x (2ry+1)` window. Pixels outside
/// the image count as transparent black.
pub fn morphology(src: &RasterImage, op: MorphologyOperator, radius: (f64, f64)) -> RasterImage {
    let (rx, ry) = (radius.0.round().max(0.0) as usize, radius.1.round().max(0.0) as usize);
    if rx == 0 && ry == 0 {
        return src.clone();
    }
    let dilate = op == MorphologyOperator::Dilate;
    let (w, h) = (src.width() as usize, src.height() as usize);
    let mut out = src.clone();
    let mut line = Vec::new();
    let mut res = Vec::new();
    if rx > 0 {
        let data = out.as_raw_mut();
        for y in 0..h {
            for c in 0..4 {
                line.clear();
                line.extend((0..w).map(|x| data[(y * w + x) * 4 + c]));
                sliding_extreme(&line, &mut res, rx, dilate);
                for x in 0..w {
                    data[(y * w + x) * 4 + c] = res[x];
                }
            }
        }
    }
    if ry > 0 {
        let data = out.as_raw_mut();
        for x in 0..w {
            for c in 0..4 {
                line.clear();
                line.extend((0..h).map(|y| data[(y * w + x) * 4 + c]));
                sliding_extreme(&line, &mut res, ry, dilate);
                for y in 0..h {
                    data[(y * w + x) * 4 + c] = res[y];
                }
            }
        }
    }
    out
}

/// `out[i] = max/min(src[i - r ..= i + r])` with zero padding, using a monotonic deque.
fn sliding_extreme(src: &[u8], out: &mut Vec<u8>, r: usize, take_max: bool) {
    let n = src.len() as isize;
    let r = r as isize;
    let value = |j: isize| if j < 0 || j >= n { 0 } else { src[j as usize] };
    let worse = |a: u8, b: u8| if take_max { a <= b } else { a >= b };
    out.clear();
    let mut dq: VecDeque<isize> = VecDeque::new();
    for j in -r..n + r {
        let v = value(j);
        while dq.back().is_some_and(|&b| worse(value(b), v)) {
            dq.pop_back();
        }
        dq.push_back(j);
        let i = j - r;
        if i >= 0 {
            while dq.front().is_some_and(|&f| f < i - r) {
                dq.pop_front();
            }
            if let Some(&f) = dq.front() {
                out.push(value(f));
            }
        }
    }
}

/// `feConvolveMatrix` with divisor, bias and edge mode.
pub fn convolve(src: &RasterImage, p: &ConvolveParams) -> RasterImage {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let (ox, oy) = (p.order.0 as i64, p.order.1 as i64);
    let (tx, ty) = (p.target.0 as i64, p.target.1 as i64);
    let divisor = if p.divisor == 0.0 { 1.0 } else { p.divisor };
    let sample = |x: i64, y: i64| -> Option<[f64; 4]> {
        let (x, y) = match p.edge_mode {
            EdgeMode::Duplicate => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
            EdgeMode::Wrap => (x.rem_euclid(w), y.rem_euclid(h)),
            EdgeMode::None => {
                if x < 0 || y < 0 || x >= w || y >= h {
                    return None;
                }
                (x, y)
            }
        };
        let px = src.pixel(x as u32, y as u32);
        let mut c = px.map(|v| f64::from(v) / 255.0);
        let a = c[3];
        if p.preserve_alpha && a > 0.0 {
            for v in c.iter_mut().take(3) {
                *v = (*v / a).min(1.0);
            }
        }
        Some(c)
    };
    RasterImage::from_fn(src.width(), src.height(), |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let mut acc = [0.0; 4];
        for j in 0..oy {
            for i in 0..ox {
                let kv = p.kernel[((ox * oy - 1) - (j * ox + i)) as usize];
                if let Some(c) = sample(x - tx + i, y - ty + j) {
                    for k in 0..4 {
                        acc[k] += c[k] * kv;
                    }
                }
            }
        }
        let own = src.pixel(x as u32, y as u32);
        if p.preserve_alpha {
            let a = f64::from(own[3]) / 255.0;
            let mut out = [0u8; 4];
            for k in 0..3 {
                out[k] = unit_to_u8((acc[k] / divisor + p.bias).clamp(0.0, 1.0) * a);
            }
            out[3] = own[3];
            out
        } else {
            let a = (acc[3] / divisor + p.bias).clamp(0.0, 1.0);
            let mut out = [0u8; 4];
            for k in 0..3 {
                out[k] = unit_to_u8((acc[k] / divisor + p.bias * a).clamp(0.0, a));
            }
            out[3] = unit_to_u8(a);
            out
        }
    })
}

/// Offset each pixel by the `in2` map channels, nearest-neighbour sampled.
pub fn displacement_map(
    src: &RasterImage,
    map: &RasterImage,
    scale: f64,
    x_channel: Channel,
    y_channel: Channel,
) -> RasterImage {
    let (w, h) = (i64::from(src.width()), i64::from(src.height()));
    RasterImage::from_fn(src.width(), src.height(), |x, y| {
        let m = map.pixel(x, y);
        let a = f64::from(m[3]) / 255.0;
        let channel = |c: Channel| {
            let v = f64::from(m[c.index()]) / 255.0;
            if c == Channel::A || a <= 0.0 {
                v
            } else {
                (v / a).min(1.0)
            }
        };
        let sx = f64::from(x) + scale * (channel(x_channel) - 0.5);
        let sy = f64::from(y) + scale * (channel(y_channel) - 0.5);
        let (sx, sy) = (sx.round() as i64, sy.round() as i64);
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0; 4]
        } else {
            src.pixel(sx as u32, sy as u32)
        }
    })
}

/// Diffuse or specular lighting of the input's alpha surface. `origin` is the user-space
/// position of pixel `(0, 0)`.
pub fn lighting(src: &RasterImage, l: &Lighting, specular: bool, origin: (f64, f64)) -> RasterImage {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let alpha = |x: i64, y: i64| -> f64 {
        f64::from(src.pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[3]) / 255.0
    };
    let color = l.color.to_unit();
    let light_dir = |px: f64, py: f64, z: f64| -> ([f64; 3], f64) {
        match l.light {
            LightSource::Distant { azimuth, elevation } => {
                let (az, el) = (azimuth.to_radians(), elevation.to_radians());
                ([az.cos() * el.cos(), az.sin() * el.cos(), el.sin()], 1.0)
            }
            LightSource::Point { x, y, z: lz } => (normalize([x - px, y - py, lz - z]), 1.0),
            LightSource::Spot {
                x,
                y,
                z: lz,
                points_at,
                specular_exponent,
                limiting_cone_angle,
            } => {
                let lv = normalize([x - px, y - py, lz - z]);
                let s = normalize([points_at.0 - x, points_at.1 - y, points_at.2 - lz]);
                let minus_l_dot_s = -(lv[0] * s[0] + lv[1] * s[1] + lv[2] * s[2]);
                let inside = limiting_cone_angle
                    .is_none_or(|cone| minus_l_dot_s >= cone.to_radians().cos());
                let factor = if minus_l_dot_s <= 0.0 || !inside {
                    0.0
                } else {
                    minus_l_dot_s.powf(specular_exponent)
                };
                (lv, factor)
            }
        }
    };
    RasterImage::from_fn(src.width(), src.height(), |x, y| {
        let (xi, yi) = (i64::from(x), i64::from(y));
        let gx = (alpha(xi + 1, yi - 1) + 2.0 * alpha(xi + 1, yi) + alpha(xi + 1, yi + 1))
            - (alpha(xi - 1, yi - 1) + 2.0 * alpha(xi - 1, yi) + alpha(xi - 1, yi + 1));
        let gy = (alpha(xi - 1, yi + 1) + 2.0 * alpha(xi, yi + 1) + alpha(xi + 1, yi + 1))
            - (alpha(xi - 1, yi - 1) + 2.0 * alpha(xi, yi - 1) + alpha(xi + 1, yi - 1));
        let n = normalize([
            -l.surface_scale * 0.25 * gx,
            -l.surface_scale * 0.25 * gy,
            1.0,
        ]);
        let z = l.surface_scale * alpha(xi, yi);
        let (lv, spot) = light_dir(origin.0 + f64::from(x), origin.1 + f64::from(y), z);
        let (factor, straight_alpha) = if specular {
            let hv = normalize([lv[0], lv[1], lv[2] + 1.0]);
            let nh = (n[0] * hv[0] + n[1] * hv[1] + n[2] * hv[2]).max(0.0);
            (l.constant * nh.powf(l.specular_exponent), None)
        } else {
            let nl = (n[0] * lv[0] + n[1] * lv[1] + n[2] * lv[2]).max(0.0);
            (l.constant * nl, Some(1.0))
        };
        let rgb = [0, 1, 2].map(|k| (factor * spot * color[k]).clamp(0.0, 1.0));
        let a = straight_alpha.unwrap_or_else(|| rgb[0].max(rgb[1]).max(rgb[2]));
        [
            unit_to_u8(rgb[0] * a),
            unit_to_u8(rgb[1] * a),
            unit_to_u8(rgb[2] * a),
            unit_to_u8(a),
        ]
    })
}

fn normalize(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > 0.0 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Repeat the `cell` rectangle `(x0, y0, x1, y1)` of `src` across the whole image.
pub fn tile(src: &RasterImage, cell: (u32, u32, u32, u32)) -> RasterImage {
    let (x0, y0, x1, y1) = cell;
    if x1 <= x0 || y1 <= y0 {
        return RasterImage::new(src.width(), src.height());
    }
    let (cw, ch) = (i64::from(x1 - x0), i64::from(y1 - y0));
    RasterImage::from_fn(src.width(), src.height(), |x, y| {
        let sx = i64::from(x0) + (i64::from(x) - i64::from(x0)).rem_euclid(cw);
        let sy = i64::from(y0) + (i64::from(y) - i64::from(y0)).rem_euclid(ch);
        src.pixel(sx as u32, sy as u32)
    })
}

/// Copy of the `(x0, y0, x1, y1)` rectangle.
pub fn crop(src: &RasterImage, rect: (u32, u32, u32, u32)) -> RasterImage {
    let (x0, y0, x1, y1) = rect;
    RasterImage::from_fn(x1.saturating_sub(x0), y1.saturating_sub(y0), |x, y| {
        src.pixel(x0 + x, y0 + y)
    })
}

/// Clear everything outside `(x0, y0, x1, y1)`.
pub fn clip(img: &mut RasterImage, rect: (u32, u32, u32, u32)) {
    let (x0, y0, x1, y1) = rect;
    let w = img.width();
    for (i, px) in img.as_raw_mut().chunks_exact_mut(4).enumerate() {
        let (x, y) = (i as u32 % w, i as u32 / w);
        if x < x0 || x >= x1 || y < y0 || y >= y1 {
            px.fill(0);
        }
    }
}

// Perlin turbulence, the reference generator from SVG 1.1 filter effects.

const BSIZE: usize = 0x100;
const BM: i64 = 0xff;
const PERLIN_N: f64 = 4096.0;
const RAND_M: i64 = 2_147_483_647;
const RAND_A: i64 = 16_807;
const RAND_Q: i64 = 127_773;
const RAND_R: i64 = 2_836;

fn random(seed: &mut i64) -> i64 {
    *seed = RAND_A * (*seed % RAND_Q) - RAND_R * (*seed / RAND_Q);
    if *seed <= 0 {
        *seed += RAND_M;
    }
    *seed
}

struct Noise {
    lattice: Vec<usize>,
    gradient: [Vec<[f64; 2]>; 4],
}

#[derive(Clone, Copy)]
struct Stitch {
    width: i64,
    height: i64,
    wrap_x: i64,
    wrap_y: i64,
}

impl Noise {
    fn new(seed: f64) -> Self {
        let mut seed = seed.round() as i64;
        if seed <= 0 {
            seed = -(seed % (RAND_M - 1)) + 1;
        }
        if seed > RAND_M - 1 {
            seed = RAND_M - 1;
        }
        let n = BSIZE + BSIZE + 2;
        let mut lattice = vec![0usize; n];
        let mut gradient: [Vec<[f64; 2]>; 4] = std::array::from_fn(|_| vec![[0.0; 2]; n]);
        for g in gradient.iter_mut() {
            for (i, cell) in g.iter_mut().enumerate().take(BSIZE) {
                lattice[i] = i;
                for v in cell.iter_mut() {
                    *v = ((random(&mut seed) % (2 * BSIZE as i64)) - BSIZE as i64) as f64
                        / BSIZE as f64;
                }
                let s = (cell[0] * cell[0] + cell[1] * cell[1]).sqrt();
                if s > 0.0 {
                    cell[0] /= s;
                    cell[1] /= s;
                }
            }
        }
        for i in (1..BSIZE).rev() {
            let k = lattice[i];
            let j = (random(&mut seed) % BSIZE as i64) as usize;
            lattice[i] = lattice[j];
            lattice[j] = k;
        }
        for i in 0..BSIZE + 2 {
            lattice[BSIZE + i] = lattice[i];
            for g in gradient.iter_mut() {
                g[BSIZE + i] = g[i];
            }
        }
        Self { lattice, gradient }
    }

    fn noise2(&self, channel: usize, vx: f64, vy: f64, stitch: Option<Stitch>) -> f64 {
        let s_curve = |t: f64| t * t * (3.0 - 2.0 * t);
        let lerp = |t: f64, a: f64, b: f64| a + t * (b - a);

        let t = vx + PERLIN_N;
        let mut bx0 = (t as i64) & BM;
        let mut bx1 = (bx0 + 1) & BM;
        let rx0 = t - (t as i64) as f64;
        let rx1 = rx0 - 1.0;
        let t = vy + PERLIN_N;
        let mut by0 = (t as i64) & BM;
        let mut by1 = (by0 + 1) & BM;
        let ry0 = t - (t as i64) as f64;
        let ry1 = ry0 - 1.0;

        if let Some(st) = stitch {
            if bx0 >= st.wrap_x {
                bx0 -= st.width;
            }
            if bx1 >= st.wrap_x {
                bx1 -= st.width;
            }
            if by0 >= st.wrap_y {
                by0 -= st.height;
            }
            if by1 >= st.wrap_y {
                by1 -= st.height;
            }
        }
        let (bx0, bx1, by0, by1) = (
            (bx0 & BM) as usize,
            (bx1 & BM) as usize,
            (by0 & BM) as usize,
            (by1 & BM) as usize,
        );
        let i = self.lattice[bx0];
        let j = self.lattice[bx1];
        let b00 = self.lattice[i + by0];
        let b10 = self.lattice[j + by0];
        let b01 = self.lattice[i + by1];
        let b11 = self.lattice[j + by1];
        let g = &self.gradient[channel];
        let sx = s_curve(rx0);
        let sy = s_curve(ry0);
        let u = rx0 * g[b00][0] + ry0 * g[b00][1];
        let v = rx1 * g[b10][0] + ry0 * g[b10][1];
        let a = lerp(sx, u, v);
        let u = rx0 * g[b01][0] + ry1 * g[b01][1];
        let v = rx1 * g[b11][0] + ry1 * g[b11][1];
        let b = lerp(sx, u, v);
        lerp(sy, a, b)
    }
}

/// Parameters of an `feTurbulence` render.
#[derive(Clone, Copy, Debug)]
pub struct TurbulenceParams {
    /// Frequency along x and y.
    pub base_frequency: (f64, f64),
    /// Number of noise octaves.
    pub octaves: u32,
    /// Seed, rounded the way `feTurbulence` rounds it.
    pub seed: f64,
    /// Adjust frequencies so the noise tiles over `tile`.
    pub stitch: bool,
    /// Fractal noise or turbulence.
    pub kind: TurbulenceKind,
    /// User-space position of pixel `(0, 0)`.
    pub origin: (f64, f64),
    /// Stitching tile `(x, y, width, height)` in user space.
    pub tile: (f64, f64, f64, f64),
}

/// Render Perlin noise into a `width` by `height` image.
pub fn turbulence(width: u32, height: u32, p: &TurbulenceParams) -> RasterImage {
    let noise = Noise::new(p.seed);
    let (mut fx, mut fy) = p.base_frequency;
    let (tx, ty, tw, th) = p.tile;
    let mut stitch = None;
    if p.stitch && tw > 0.0 && th > 0.0 {
        if fx != 0.0 {
            let lo = (tw * fx).floor() / tw;
            let hi = (tw * fx).ceil() / tw;
            fx = if lo > 0.0 && fx / lo < hi / fx { lo } else { hi };
        }
        if fy != 0.0 {
            let lo = (th * fy).floor() / th;
            let hi = (th * fy).ceil() / th;
            fy = if lo > 0.0 && fy / lo < hi / fy { lo } else { hi };
        }
        let sw = (tw * fx + 0.5) as i64;
        let sh = (th * fy + 0.5) as i64;
        stitch = Some(Stitch {
            width: sw,
            height: sh,
            wrap_x: (tx * fx + PERLIN_N + sw as f64) as i64,
            wrap_y: (ty * fy + PERLIN_N + sh as f64) as i64,
        });
    }
    let fractal = p.kind == TurbulenceKind::FractalNoise;

    RasterImage::from_fn(width, height, |x, y| {
        let px = p.origin.0 + f64::from(x);
        let py = p.origin.1 + f64::from(y);
        let mut rgba = [0.0; 4];
        for (channel, out) in rgba.iter_mut().enumerate() {
            let mut st = stitch;
            let (mut vx, mut vy) = (px * fx, py * fy);
            let mut ratio = 1.0;
            let mut sum = 0.0;
            for _ in 0..p.octaves {
                let n = noise.noise2(channel, vx, vy, st);
                sum += if fractal { n / ratio } else { n.abs() / ratio };
                vx *= 2.0;
                vy *= 2.0;
                ratio *= 2.0;
                if let Some(s) = st.as_mut() {
                    s.width *= 2;
                    s.wrap_x = 2 * s.wrap_x - PERLIN_N as i64;
                    s.height *= 2;
                    s.wrap_y = 2 * s.wrap_y - PERLIN_N as i64;
                }
            }
            *out = if fractal { (sum + 1.0) / 2.0 } else { sum }.clamp(0.0, 1.0);
        }
        let a = rgba[3];
        [
            unit_to_u8(rgba[0] * a),
            unit_to_u8(rgba[1] * a),
            unit_to_u8(rgba[2] * a),
            unit_to_u8(a),
        ]
    })
}

#[cfg(test)]
#[path = "../../tests/unit/raster/ops.rs"]
mod tests;
