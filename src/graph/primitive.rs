//! Typed filter primitives and attribute parsing with clamping.

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::foundation::core::Rgba;
use crate::graph::element::FilterElement;
use crate::services::ConversionServices;

/// Closed set of filter primitive kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum PrimitiveKind {
    /// `feGaussianBlur`.
    Blur,
    /// `feOffset`.
    Offset,
    /// `feColorMatrix`.
    ColorMatrix,
    /// `feComposite`.
    Composite,
    /// `feMorphology`.
    Morphology,
    /// `feConvolveMatrix`.
    ConvolveMatrix,
    /// `feDiffuseLighting`.
    DiffuseLighting,
    /// `feSpecularLighting`.
    SpecularLighting,
    /// `feDisplacementMap`.
    DisplacementMap,
    /// `feTile`.
    Tile,
    /// `feMerge`.
    Merge,
    /// `feTurbulence`.
    Turbulence,
    /// `feComponentTransfer`.
    ComponentTransfer,
    /// `feFlood`.
    Flood,
    /// `feDropShadow`.
    DropShadow,
    /// `feBlend`.
    Blend,
    /// Anything else; the filter still builds.
    Unsupported,
}

impl PrimitiveKind {
    /// Map an element tag to a kind, ignoring ASCII case.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "fegaussianblur" => Self::Blur,
            "feoffset" => Self::Offset,
            "fecolormatrix" => Self::ColorMatrix,
            "fecomposite" => Self::Composite,
            "femorphology" => Self::Morphology,
            "feconvolvematrix" => Self::ConvolveMatrix,
            "fediffuselighting" => Self::DiffuseLighting,
            "fespecularlighting" => Self::SpecularLighting,
            "fedisplacementmap" => Self::DisplacementMap,
            "fetile" => Self::Tile,
            "femerge" => Self::Merge,
            "feturbulence" => Self::Turbulence,
            "fecomponenttransfer" => Self::ComponentTransfer,
            "feflood" => Self::Flood,
            "fedropshadow" => Self::DropShadow,
            "feblend" => Self::Blend,
            _ => Self::Unsupported,
        }
    }

    /// Canonical SVG tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Blur => "feGaussianBlur",
            Self::Offset => "feOffset",
            Self::ColorMatrix => "feColorMatrix",
            Self::Composite => "feComposite",
            Self::Morphology => "feMorphology",
            Self::ConvolveMatrix => "feConvolveMatrix",
            Self::DiffuseLighting => "feDiffuseLighting",
            Self::SpecularLighting => "feSpecularLighting",
            Self::DisplacementMap => "feDisplacementMap",
            Self::Tile => "feTile",
            Self::Merge => "feMerge",
            Self::Turbulence => "feTurbulence",
            Self::ComponentTransfer => "feComponentTransfer",
            Self::Flood => "feFlood",
            Self::DropShadow => "feDropShadow",
            Self::Blend => "feBlend",
            Self::Unsupported => "unsupported",
        }
    }
}

/// `feColorMatrix` operation by `type`.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorMatrix {
    /// Row-major 4x5 matrix.
    Matrix([f64; 20]),
    /// Saturation factor, `0` is greyscale.
    Saturate(f64),
    /// Degrees.
    HueRotate(f64),
    /// Luminance into alpha, colour cleared.
    LuminanceToAlpha,
}

impl ColorMatrix {
    /// The 4x5 identity.
    pub const IDENTITY: [f64; 20] = [
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ];

    /// Expand to the equivalent 4x5 matrix.
    pub fn to_matrix(&self) -> [f64; 20] {
        match *self {
            Self::Matrix(m) => m,
            Self::Saturate(s) => [
                0.213 + 0.787 * s,
                0.715 - 0.715 * s,
                0.072 - 0.072 * s,
                0.0,
                0.0,
                0.213 - 0.213 * s,
                0.715 + 0.285 * s,
                0.072 - 0.072 * s,
                0.0,
                0.0,
                0.213 - 0.213 * s,
                0.715 - 0.715 * s,
                0.072 + 0.928 * s,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
                0.0,
            ],
            Self::HueRotate(deg) => {
                let (sin, cos) = deg.to_radians().sin_cos();
                [
                    0.213 + cos * 0.787 - sin * 0.213,
                    0.715 - cos * 0.715 - sin * 0.715,
                    0.072 - cos * 0.072 + sin * 0.928,
                    0.0,
                    0.0,
                    0.213 - cos * 0.213 + sin * 0.143,
                    0.715 + cos * 0.285 + sin * 0.140,
                    0.072 - cos * 0.072 - sin * 0.283,
                    0.0,
                    0.0,
                    0.213 - cos * 0.213 - sin * 0.787,
                    0.715 - cos * 0.715 + sin * 0.715,
                    0.072 + cos * 0.928 + sin * 0.072,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                    1.0,
                    0.0,
                ]
            }
            Self::LuminanceToAlpha => [
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.2125, 0.7154, 0.0721, 0.0, 0.0,
            ],
        }
    }

    /// Apply to straight-alpha unit RGBA.
    pub fn apply(&self, c: [f64; 4]) -> [f64; 4] {
        let m = self.to_matrix();
        let mut out = [0.0; 4];
        for (row, o) in out.iter_mut().enumerate() {
            let r = &m[row * 5..row * 5 + 5];
            *o = (r[0] * c[0] + r[1] * c[1] + r[2] * c[2] + r[3] * c[3] + r[4]).clamp(0.0, 1.0);
        }
        out
    }
}

/// Porter-Duff operator of `feComposite`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeOperator {
    /// `in` over `in2`.
    Over,
    /// `in` masked by `in2` alpha.
    In,
    /// `in` outside `in2`.
    Out,
    /// `in` on top of `in2`, clipped to `in2`.
    Atop,
    /// Either input where the other is absent.
    Xor,
    /// Sum of both inputs.
    Lighter,
    /// `k1*i1*i2 + k2*i1 + k3*i2 + k4`.
    Arithmetic,
}

/// `feMorphology` operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MorphologyOperator {
    /// Shrink (minimum filter).
    Erode,
    /// Grow (maximum filter).
    Dilate,
}

/// Sampling outside the input image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeMode {
    /// Repeat the nearest edge pixel.
    Duplicate,
    /// Wrap to the opposite edge.
    Wrap,
    /// Transparent black.
    None,
}

/// `feConvolveMatrix` parameters after defaulting and validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvolveParams {
    /// Kernel columns and rows.
    pub order: (usize, usize),
    /// Row-major weights, `order.0 * order.1` of them.
    pub kernel: Vec<f64>,
    /// Never zero; defaults to the kernel sum, or 1.
    pub divisor: f64,
    /// Added after division.
    pub bias: f64,
    /// Kernel cell aligned with the output pixel.
    pub target: (usize, usize),
    /// Sampling past the image edge.
    pub edge_mode: EdgeMode,
    /// Convolve colour only and keep the source alpha.
    pub preserve_alpha: bool,
}

impl ConvolveParams {
    /// Edge-detection kernels (Sobel, Prewitt, Laplacian family): weights sum to zero and the
    /// kernel has both signs.
    pub fn is_edge_kernel(&self) -> bool {
        let sum: f64 = self.kernel.iter().sum();
        let has_pos = self.kernel.iter().any(|&k| k > 0.0);
        let has_neg = self.kernel.iter().any(|&k| k < 0.0);
        sum.abs() < 1e-9 && has_pos && has_neg && self.bias.abs() < 1e-9
    }
}

/// Light source child of a lighting primitive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightSource {
    /// `feDistantLight`.
    Distant {
        /// Degrees clockwise from the x axis.
        azimuth: f64,
        /// Degrees above the surface.
        elevation: f64,
    },
    /// `fePointLight`.
    Point {
        /// User units.
        x: f64,
        /// User units.
        y: f64,
        /// Height above the surface.
        z: f64,
    },
    /// `feSpotLight`.
    Spot {
        /// User units.
        x: f64,
        /// User units.
        y: f64,
        /// Height above the surface.
        z: f64,
        /// `pointsAtX`, `pointsAtY`, `pointsAtZ`.
        points_at: (f64, f64, f64),
        /// Falloff around the cone axis.
        specular_exponent: f64,
        /// Half angle in degrees; `None` is unbounded.
        limiting_cone_angle: Option<f64>,
    },
}

/// Shared parameters of `feDiffuseLighting` and `feSpecularLighting`.
#[derive(Clone, Debug, PartialEq)]
pub struct Lighting {
    /// Height multiplier applied to input alpha.
    pub surface_scale: f64,
    /// `diffuseConstant` or `specularConstant`.
    pub constant: f64,
    /// Only meaningful for specular lighting.
    pub specular_exponent: f64,
    /// `lighting-color`.
    pub color: Rgba,
    /// The first light source child.
    pub light: LightSource,
}

/// Displacement map channel selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Red.
    R,
    /// Green.
    G,
    /// Blue.
    B,
    /// Alpha.
    A,
}

impl Channel {
    /// Offset of the channel in an RGBA pixel.
    pub fn index(self) -> usize {
        match self {
            Self::R => 0,
            Self::G => 1,
            Self::B => 2,
            Self::A => 3,
        }
    }
}

/// `feTurbulence` `type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurbulenceKind {
    /// Signed noise sum, remapped to `[0, 1]`.
    FractalNoise,
    /// Sum of absolute noise.
    Turbulence,
}

/// One `feFuncX` child of `feComponentTransfer`.
#[derive(Clone, Debug, PartialEq)]
pub enum TransferFunction {
    /// Channel passes through.
    Identity,
    /// Piecewise-linear interpolation over `tableValues`.
    Table(Vec<f64>),
    /// Step function over `tableValues`.
    Discrete(Vec<f64>),
    /// `slope * c + intercept`.
    Linear {
        /// Multiplier.
        slope: f64,
        /// Offset.
        intercept: f64,
    },
    /// `amplitude * c^exponent + offset`.
    Gamma {
        /// Multiplier.
        amplitude: f64,
        /// Power.
        exponent: f64,
        /// Offset.
        offset: f64,
    },
}

impl TransferFunction {
    /// Evaluate on a unit value.
    pub fn apply(&self, c: f64) -> f64 {
        let c = c.clamp(0.0, 1.0);
        let v = match self {
            Self::Identity => c,
            Self::Table(t) => {
                if t.is_empty() {
                    c
                } else if t.len() == 1 {
                    t[0]
                } else {
                    let n = (t.len() - 1) as f64;
                    let k = ((c * n).floor() as usize).min(t.len() - 2);
                    let frac = c * n - k as f64;
                    t[k] + (t[k + 1] - t[k]) * frac
                }
            }
            Self::Discrete(t) => {
                if t.is_empty() {
                    c
                } else {
                    let n = t.len();
                    let k = ((c * n as f64).floor() as usize).min(n - 1);
                    t[k]
                }
            }
            Self::Linear { slope, intercept } => slope * c + intercept,
            Self::Gamma {
                amplitude,
                exponent,
                offset,
            } => amplitude * c.powf(*exponent) + offset,
        };
        v.clamp(0.0, 1.0)
    }

    /// `true` for [`TransferFunction::Identity`].
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

/// `feBlend` mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Source over.
    Normal,
    /// Channel product.
    Multiply,
    /// Inverted product of inverses.
    Screen,
    /// Per-channel minimum.
    Darken,
    /// Per-channel maximum.
    Lighten,
    /// Absolute difference.
    Difference,
}

/// A primitive with its parsed, clamped parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Gaussian blur.
    Blur {
        /// Standard deviation along x and y, never negative.
        std_dev: (f64, f64),
    },
    /// Translation.
    Offset {
        /// User units.
        dx: f64,
        /// User units.
        dy: f64,
    },
    /// Colour matrix.
    ColorMatrix(ColorMatrix),
    /// Two-input compositing.
    Composite {
        /// Porter-Duff operator.
        operator: CompositeOperator,
        /// `k1` to `k4`, only read by [`CompositeOperator::Arithmetic`].
        k: [f64; 4],
    },
    /// Erode or dilate.
    Morphology {
        /// Direction.
        operator: MorphologyOperator,
        /// Radius along x and y.
        radius: (f64, f64),
    },
    /// Kernel convolution.
    ConvolveMatrix(ConvolveParams),
    /// Diffuse lighting.
    DiffuseLighting(Lighting),
    /// Specular lighting.
    SpecularLighting(Lighting),
    /// Pixel displacement by a second input.
    DisplacementMap {
        /// Displacement amount in user units.
        scale: f64,
        /// Channel driving x displacement.
        x_channel: Channel,
        /// Channel driving y displacement.
        y_channel: Channel,
    },
    /// Repeat the input's subregion.
    Tile,
    /// Stack of `feMergeNode` inputs.
    Merge,
    /// Perlin noise.
    Turbulence {
        /// Frequency along x and y.
        base_frequency: (f64, f64),
        /// Octave count.
        octaves: u32,
        /// Noise seed.
        seed: f64,
        /// `stitchTiles="stitch"`.
        stitch: bool,
        /// Fractal noise or turbulence.
        kind: TurbulenceKind,
    },
    /// Per-channel transfer.
    ComponentTransfer {
        /// R, G, B, A in order.
        funcs: [TransferFunction; 4],
    },
    /// Solid fill of the subregion.
    Flood {
        /// `flood-color` with `flood-opacity` applied.
        color: Rgba,
    },
    /// Offset blurred shadow under the input.
    DropShadow {
        /// User units.
        dx: f64,
        /// User units.
        dy: f64,
        /// Blur standard deviation along x and y.
        std_dev: (f64, f64),
        /// Shadow colour with opacity applied.
        color: Rgba,
    },
    /// Two-input blend.
    Blend {
        /// Blend mode.
        mode: BlendMode,
    },
    /// Unknown element kept so the graph shape is preserved.
    Unsupported {
        /// Tag as written.
        name: String,
    },
}

impl Primitive {
    /// Kind of this primitive.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Blur { .. } => PrimitiveKind::Blur,
            Self::Offset { .. } => PrimitiveKind::Offset,
            Self::ColorMatrix(_) => PrimitiveKind::ColorMatrix,
            Self::Composite { .. } => PrimitiveKind::Composite,
            Self::Morphology { .. } => PrimitiveKind::Morphology,
            Self::ConvolveMatrix(_) => PrimitiveKind::ConvolveMatrix,
            Self::DiffuseLighting(_) => PrimitiveKind::DiffuseLighting,
            Self::SpecularLighting(_) => PrimitiveKind::SpecularLighting,
            Self::DisplacementMap { .. } => PrimitiveKind::DisplacementMap,
            Self::Tile => PrimitiveKind::Tile,
            Self::Merge => PrimitiveKind::Merge,
            Self::Turbulence { .. } => PrimitiveKind::Turbulence,
            Self::ComponentTransfer { .. } => PrimitiveKind::ComponentTransfer,
            Self::Flood { .. } => PrimitiveKind::Flood,
            Self::DropShadow { .. } => PrimitiveKind::DropShadow,
            Self::Blend { .. } => PrimitiveKind::Blend,
            Self::Unsupported { .. } => PrimitiveKind::Unsupported,
        }
    }

    /// How far the primitive can move ink outside its input's bounds, in user units.
    pub fn reach(&self, margin_sigma: f64) -> f64 {
        match self {
            Self::Blur { std_dev } => margin_sigma * std_dev.0.max(std_dev.1),
            Self::Offset { dx, dy } => dx.abs().max(dy.abs()),
            Self::Morphology {
                operator: MorphologyOperator::Dilate,
                radius,
            } => radius.0.max(radius.1),
            Self::DisplacementMap { scale, .. } => scale.abs() / 2.0,
            Self::DropShadow { dx, dy, std_dev, .. } => {
                dx.abs().max(dy.abs()) + margin_sigma * std_dev.0.max(std_dev.1)
            }
            Self::ConvolveMatrix(p) => p.order.0.max(p.order.1) as f64,
            _ => 0.0,
        }
    }
}

/// Parameter parsing context for one primitive: clamps are recorded against `label`.
pub(crate) struct ParseCx<'a> {
    pub(crate) services: &'a dyn ConversionServices,
    pub(crate) label: &'a str,
    pub(crate) diags: &'a mut Diagnostics,
}

impl ParseCx<'_> {
    fn clamped(&mut self, what: &str, v: f64, lo: f64, hi: f64) -> f64 {
        if v.is_nan() {
            self.diags.warn(
                DiagnosticCode::ParameterClamped,
                Some(self.label),
                format!("{what} is not a number; using {lo}"),
            );
            return lo;
        }
        let c = v.clamp(lo, hi);
        if c != v {
            self.diags.warn(
                DiagnosticCode::ParameterClamped,
                Some(self.label),
                format!("{what}={v} clamped to {c}"),
            );
        }
        c
    }

    fn numbers(&mut self, el: &FilterElement, name: &str) -> Option<Vec<f64>> {
        let raw = el.get(name)?;
        let parsed: Result<Vec<f64>, _> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::parse::<f64>)
            .collect();
        match parsed {
            Ok(v) if v.iter().all(|x| x.is_finite()) => Some(v),
            _ => {
                self.diags.warn(
                    DiagnosticCode::ParameterClamped,
                    Some(self.label),
                    format!("{name}=\"{raw}\" is not a number list; using default"),
                );
                None
            }
        }
    }

    fn number(&mut self, el: &FilterElement, name: &str, default: f64) -> f64 {
        self.numbers(el, name)
            .and_then(|v| v.first().copied())
            .unwrap_or(default)
    }

    /// `"a"` or `"a b"`; a single value applies to both axes.
    fn pair(&mut self, el: &FilterElement, name: &str, default: f64) -> (f64, f64) {
        match self.numbers(el, name).as_deref() {
            Some([a]) => (*a, *a),
            Some([a, b, ..]) => (*a, *b),
            _ => (default, default),
        }
    }

    fn color(&mut self, el: &FilterElement, color_attr: &str, opacity_attr: &str, default: Rgba) -> Rgba {
        let base = match el.get(color_attr) {
            None => default,
            Some(raw) => match self.services.parse_color(raw) {
                Some(c) => c,
                None => {
                    self.diags.warn(
                        DiagnosticCode::ParameterClamped,
                        Some(self.label),
                        format!("{color_attr}=\"{raw}\" is not a color; using default"),
                    );
                    default
                }
            },
        };
        let opacity = self.number(el, opacity_attr, 1.0);
        let opacity = self.clamped(opacity_attr, opacity, 0.0, 1.0);
        base.with_alpha_factor(opacity)
    }

    fn std_dev(&mut self, el: &FilterElement, default: f64) -> (f64, f64) {
        let (sx, sy) = self.pair(el, "stdDeviation", default);
        (
            self.clamped("stdDeviation", sx, 0.0, 1000.0),
            self.clamped("stdDeviation", sy, 0.0, 1000.0),
        )
    }
}

/// Parse one primitive element into its typed form.
pub(crate) fn parse_primitive(el: &FilterElement, cx: &mut ParseCx<'_>) -> Primitive {
    match PrimitiveKind::from_tag(&el.tag) {
        PrimitiveKind::Blur => Primitive::Blur {
            std_dev: cx.std_dev(el, 0.0),
        },
        PrimitiveKind::Offset => Primitive::Offset {
            dx: cx.number(el, "dx", 0.0),
            dy: cx.number(el, "dy", 0.0),
        },
        PrimitiveKind::ColorMatrix => Primitive::ColorMatrix(parse_color_matrix(el, cx)),
        PrimitiveKind::Composite => {
            let operator = match el.get("operator").unwrap_or("over") {
                "over" => CompositeOperator::Over,
                "in" => CompositeOperator::In,
                "out" => CompositeOperator::Out,
                "atop" => CompositeOperator::Atop,
                "xor" => CompositeOperator::Xor,
                "lighter" => CompositeOperator::Lighter,
                "arithmetic" => CompositeOperator::Arithmetic,
                other => {
                    cx.diags.warn(
                        DiagnosticCode::ParameterClamped,
                        Some(cx.label),
                        format!("unknown composite operator '{other}'; using over"),
                    );
                    CompositeOperator::Over
                }
            };
            let k = [
                cx.number(el, "k1", 0.0),
                cx.number(el, "k2", 0.0),
                cx.number(el, "k3", 0.0),
                cx.number(el, "k4", 0.0),
            ];
            Primitive::Composite { operator, k }
        }
        PrimitiveKind::Morphology => {
            let operator = match el.get("operator") {
                Some("dilate") => MorphologyOperator::Dilate,
                _ => MorphologyOperator::Erode,
            };
            let (rx, ry) = cx.pair(el, "radius", 0.0);
            Primitive::Morphology {
                operator,
                radius: (
                    cx.clamped("radius", rx.abs(), 0.0, 1000.0),
                    cx.clamped("radius", ry.abs(), 0.0, 1000.0),
                ),
            }
        }
        PrimitiveKind::ConvolveMatrix => parse_convolve(el, cx),
        PrimitiveKind::DiffuseLighting => {
            let l = parse_lighting(el, cx, "diffuseConstant");
            Primitive::DiffuseLighting(l)
        }
        PrimitiveKind::SpecularLighting => {
            let l = parse_lighting(el, cx, "specularConstant");
            Primitive::SpecularLighting(l)
        }
        PrimitiveKind::DisplacementMap => {
            let scale = cx.number(el, "scale", 0.0);
            Primitive::DisplacementMap {
                scale: cx.clamped("scale", scale, -1000.0, 1000.0),
                x_channel: parse_channel(el.get("xChannelSelector")),
                y_channel: parse_channel(el.get("yChannelSelector")),
            }
        }
        PrimitiveKind::Tile => Primitive::Tile,
        PrimitiveKind::Merge => Primitive::Merge,
        PrimitiveKind::Turbulence => {
            let (fx, fy) = cx.pair(el, "baseFrequency", 0.0);
            let octaves = cx.number(el, "numOctaves", 1.0).round();
            Primitive::Turbulence {
                base_frequency: (
                    cx.clamped("baseFrequency", fx, 0.0, 1.0),
                    cx.clamped("baseFrequency", fy, 0.0, 1.0),
                ),
                octaves: cx.clamped("numOctaves", octaves, 1.0, 8.0) as u32,
                seed: cx.number(el, "seed", 0.0),
                stitch: el.get("stitchTiles") == Some("stitch"),
                kind: match el.get("type") {
                    Some("fractalNoise") => TurbulenceKind::FractalNoise,
                    _ => TurbulenceKind::Turbulence,
                },
            }
        }
        PrimitiveKind::ComponentTransfer => {
            let mut funcs = [
                TransferFunction::Identity,
                TransferFunction::Identity,
                TransferFunction::Identity,
                TransferFunction::Identity,
            ];
            for child in &el.children {
                let slot = match child.tag.to_ascii_lowercase().as_str() {
                    "fefuncr" => 0,
                    "fefuncg" => 1,
                    "fefuncb" => 2,
                    "fefunca" => 3,
                    _ => continue,
                };
                funcs[slot] = parse_transfer(child, cx);
            }
            Primitive::ComponentTransfer { funcs }
        }
        PrimitiveKind::Flood => Primitive::Flood {
            color: cx.color(el, "flood-color", "flood-opacity", Rgba::BLACK),
        },
        PrimitiveKind::DropShadow => Primitive::DropShadow {
            dx: cx.number(el, "dx", 2.0),
            dy: cx.number(el, "dy", 2.0),
            std_dev: cx.std_dev(el, 2.0),
            color: cx.color(el, "flood-color", "flood-opacity", Rgba::BLACK),
        },
        PrimitiveKind::Blend => {
            let mode = match el.get("mode").unwrap_or("normal") {
                "normal" => BlendMode::Normal,
                "multiply" => BlendMode::Multiply,
                "screen" => BlendMode::Screen,
                "darken" => BlendMode::Darken,
                "lighten" => BlendMode::Lighten,
                "difference" => BlendMode::Difference,
                other => {
                    cx.diags.warn(
                        DiagnosticCode::ParameterClamped,
                        Some(cx.label),
                        format!("unsupported blend mode '{other}'; using normal"),
                    );
                    BlendMode::Normal
                }
            };
            Primitive::Blend { mode }
        }
        PrimitiveKind::Unsupported => Primitive::Unsupported {
            name: el.tag.clone(),
        },
    }
}

fn parse_color_matrix(el: &FilterElement, cx: &mut ParseCx<'_>) -> ColorMatrix {
    match el.get("type").unwrap_or("matrix") {
        "saturate" => {
            let s = cx.number(el, "values", 1.0);
            ColorMatrix::Saturate(cx.clamped("saturate", s, 0.0, 10.0))
        }
        "hueRotate" => ColorMatrix::HueRotate(cx.number(el, "values", 0.0)),
        "luminanceToAlpha" => ColorMatrix::LuminanceToAlpha,
        _ => {
            if el.get("values").is_none() {
                return ColorMatrix::Matrix(ColorMatrix::IDENTITY);
            }
            match cx.numbers(el, "values") {
                Some(v) if v.len() == 20 => {
                    let mut m = [0.0; 20];
                    m.copy_from_slice(&v);
                    ColorMatrix::Matrix(m)
                }
                Some(v) => {
                    cx.diags.warn(
                        DiagnosticCode::ParameterClamped,
                        Some(cx.label),
                        format!("color matrix has {} values, expected 20; using identity", v.len()),
                    );
                    ColorMatrix::Matrix(ColorMatrix::IDENTITY)
                }
                None => ColorMatrix::Matrix(ColorMatrix::IDENTITY),
            }
        }
    }
}

fn parse_convolve(el: &FilterElement, cx: &mut ParseCx<'_>) -> Primitive {
    let (ox, oy) = cx.pair(el, "order", 3.0);
    let ox = cx.clamped("order", ox.round(), 1.0, 9.0) as usize;
    let oy = cx.clamped("order", oy.round(), 1.0, 9.0) as usize;
    let kernel = cx.numbers(el, "kernelMatrix").unwrap_or_default();
    if kernel.len() != ox * oy {
        cx.diags.warn(
            DiagnosticCode::UnsupportedPrimitive,
            Some(cx.label),
            format!(
                "kernelMatrix has {} values but order is {ox}x{oy}; primitive disabled",
                kernel.len()
            ),
        );
        return Primitive::Unsupported {
            name: el.tag.clone(),
        };
    }
    let sum: f64 = kernel.iter().sum();
    let mut divisor = cx.number(el, "divisor", if sum == 0.0 { 1.0 } else { sum });
    if divisor == 0.0 {
        cx.diags.warn(
            DiagnosticCode::ParameterClamped,
            Some(cx.label),
            "divisor=0 replaced by 1",
        );
        divisor = 1.0;
    }
    let tx = cx.number(el, "targetX", (ox / 2) as f64).round();
    let ty = cx.number(el, "targetY", (oy / 2) as f64).round();
    let target = (
        cx.clamped("targetX", tx, 0.0, (ox - 1) as f64) as usize,
        cx.clamped("targetY", ty, 0.0, (oy - 1) as f64) as usize,
    );
    let edge_mode = match el.get("edgeMode") {
        Some("wrap") => EdgeMode::Wrap,
        Some("none") => EdgeMode::None,
        _ => EdgeMode::Duplicate,
    };
    Primitive::ConvolveMatrix(ConvolveParams {
        order: (ox, oy),
        kernel,
        divisor,
        bias: cx.number(el, "bias", 0.0),
        target,
        edge_mode,
        preserve_alpha: el.get("preserveAlpha") == Some("true"),
    })
}

fn parse_lighting(el: &FilterElement, cx: &mut ParseCx<'_>, constant_attr: &str) -> Lighting {
    let surface_scale = cx.number(el, "surfaceScale", 1.0);
    let constant = cx.number(el, constant_attr, 1.0);
    let exponent = cx.number(el, "specularExponent", 1.0);
    let light = el
        .children
        .iter()
        .find_map(|c| parse_light(c, cx))
        .unwrap_or_else(|| {
            cx.diags.warn(
                DiagnosticCode::ParameterClamped,
                Some(cx.label),
                "no light source; using a distant light from above",
            );
            LightSource::Distant {
                azimuth: 0.0,
                elevation: 90.0,
            }
        });
    Lighting {
        surface_scale: cx.clamped("surfaceScale", surface_scale, -100.0, 100.0),
        constant: cx.clamped(constant_attr, constant, 0.0, 100.0),
        specular_exponent: cx.clamped("specularExponent", exponent, 1.0, 128.0),
        color: cx.color(el, "lighting-color", "lighting-opacity", Rgba::WHITE),
        light,
    }
}

fn parse_light(el: &FilterElement, cx: &mut ParseCx<'_>) -> Option<LightSource> {
    match el.tag.to_ascii_lowercase().as_str() {
        "fedistantlight" => Some(LightSource::Distant {
            azimuth: cx.number(el, "azimuth", 0.0),
            elevation: cx.number(el, "elevation", 0.0),
        }),
        "fepointlight" => Some(LightSource::Point {
            x: cx.number(el, "x", 0.0),
            y: cx.number(el, "y", 0.0),
            z: cx.number(el, "z", 0.0),
        }),
        "fespotlight" => {
            let exp = cx.number(el, "specularExponent", 1.0);
            Some(LightSource::Spot {
                x: cx.number(el, "x", 0.0),
                y: cx.number(el, "y", 0.0),
                z: cx.number(el, "z", 0.0),
                points_at: (
                    cx.number(el, "pointsAtX", 0.0),
                    cx.number(el, "pointsAtY", 0.0),
                    cx.number(el, "pointsAtZ", 0.0),
                ),
                specular_exponent: cx.clamped("specularExponent", exp, 1.0, 128.0),
                limiting_cone_angle: el
                    .get("limitingConeAngle")
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite()),
            })
        }
        _ => None,
    }
}

fn parse_transfer(el: &FilterElement, cx: &mut ParseCx<'_>) -> TransferFunction {
    match el.get("type").unwrap_or("identity") {
        "table" => TransferFunction::Table(cx.numbers(el, "tableValues").unwrap_or_default()),
        "discrete" => {
            TransferFunction::Discrete(cx.numbers(el, "tableValues").unwrap_or_default())
        }
        "linear" => TransferFunction::Linear {
            slope: cx.number(el, "slope", 1.0),
            intercept: cx.number(el, "intercept", 0.0),
        },
        "gamma" => TransferFunction::Gamma {
            amplitude: cx.number(el, "amplitude", 1.0),
            exponent: cx.number(el, "exponent", 1.0),
            offset: cx.number(el, "offset", 0.0),
        },
        _ => TransferFunction::Identity,
    }
}

fn parse_channel(v: Option<&str>) -> Channel {
    match v {
        Some("R") => Channel::R,
        Some("G") => Channel::G,
        Some("B") => Channel::B,
        _ => Channel::A,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/primitive.rs"]
mod tests;
