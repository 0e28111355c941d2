//! Typed DrawingML shape-property fragments and their serialization.
//!
//! Element names and child order follow the `a:CT_ShapeProperties` schema: transform, geometry,
//! fill, line, effect list, 3D scene, 3D shape.

use std::fmt::{self, Write};

use crate::foundation::core::Rgba;
use crate::services::RelationshipId;

/// Shape transform in EMU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmuRect {
    /// Horizontal offset from the slide origin.
    pub x: i64,
    /// Vertical offset.
    pub y: i64,
    /// Width.
    pub cx: i64,
    /// Height.
    pub cy: i64,
}

/// One segment of an `a:path`, coordinates in path units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathCommand {
    /// `a:moveTo`.
    MoveTo(i64, i64),
    /// `a:lnTo`.
    LineTo(i64, i64),
    /// `a:quadBezTo`: control point, end point.
    QuadTo(i64, i64, i64, i64),
    /// `a:cubicBezTo`: two control points, end point.
    CubicTo(i64, i64, i64, i64, i64, i64),
    /// `a:close`.
    Close,
}

/// One `a:path`, coordinates relative to the shape origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeometryPath {
    /// Path coordinate space width.
    pub width: i64,
    /// Path coordinate space height.
    pub height: i64,
    /// Segments in drawing order.
    pub commands: Vec<PathCommand>,
}

/// Shape outline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Geometry {
    /// `a:prstGeom prst="rect"`.
    Rect,
    /// `a:custGeom` with one `a:path` per entry.
    Custom(Vec<GeometryPath>),
}

/// `a:srgbClr` with optional colour transforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorXml {
    /// Base colour; alpha becomes `a:alpha`.
    pub color: Rgba,
    /// `a:satMod`, 1000ths of a percent.
    pub sat_mod: Option<i64>,
    /// `a:hueOff`, 60000ths of a degree.
    pub hue_off: Option<i64>,
}

impl ColorXml {
    /// Colour without transforms.
    pub fn plain(color: Rgba) -> Self {
        Self {
            color,
            sat_mod: None,
            hue_off: None,
        }
    }
}

/// How a picture fill covers the shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlipMode {
    /// `a:stretch` over the whole shape.
    Stretch,
    /// `a:tile` with the cell origin offset in EMU.
    Tile {
        /// Horizontal offset.
        tx: i64,
        /// Vertical offset.
        ty: i64,
    },
}

/// Shape fill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FillXml {
    /// `a:noFill`.
    None,
    /// `a:solidFill`.
    Solid(ColorXml),
    /// `a:blipFill` referencing an embedded EMF.
    Blip {
        /// `r:embed` target.
        relationship: RelationshipId,
        /// Stretch or tile.
        mode: BlipMode,
        /// `a:alphaModFix` amount, 1000ths of a percent.
        alpha: Option<i64>,
    },
}

/// Solid outline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineXml {
    /// EMU.
    pub width: i64,
    /// Line colour.
    pub color: ColorXml,
    /// Writes `a:prstDash val="dash"`.
    pub dashed: bool,
}

/// Inner or outer shadow parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowXml {
    /// Blur radius in EMU.
    pub blur_rad: i64,
    /// Offset distance in EMU.
    pub dist: i64,
    /// 60000ths of a degree, clockwise from the positive x axis.
    pub dir: i64,
    /// Shadow colour.
    pub color: ColorXml,
}

/// Children of `a:effectLst`, in schema order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectListXml {
    /// `a:blur` radius in EMU.
    pub blur: Option<i64>,
    /// `a:innerShdw`.
    pub inner_shadow: Option<ShadowXml>,
    /// `a:outerShdw`.
    pub outer_shadow: Option<ShadowXml>,
}

impl EffectListXml {
    /// No effect is set.
    pub fn is_empty(&self) -> bool {
        self.blur.is_none() && self.inner_shadow.is_none() && self.outer_shadow.is_none()
    }
}

/// `a:scene3d` + `a:sp3d` bevel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bevel3dXml {
    /// Light rig preset.
    pub rig: &'static str,
    /// Light rig direction.
    pub direction: &'static str,
    /// Preset material.
    pub material: &'static str,
    /// Bevel width in EMU.
    pub width: i64,
    /// Bevel height in EMU.
    pub height: i64,
}

/// Shape properties for one filtered element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawingMlFragment {
    /// Position and extent.
    pub xfrm: EmuRect,
    /// Preset or custom outline.
    pub geometry: Geometry,
    /// Fill.
    pub fill: FillXml,
    /// `None` writes `a:ln` with `a:noFill`.
    pub line: Option<LineXml>,
    /// Effect list; omitted when empty.
    pub effects: EffectListXml,
    /// Bevel written as `a:scene3d` plus `a:sp3d`.
    pub bevel: Option<Bevel3dXml>,
}

impl DrawingMlFragment {
    /// The fragment draws an embedded picture.
    pub fn is_image(&self) -> bool {
        matches!(self.fill, FillXml::Blip { .. })
    }

    /// Relationship ids referenced by the fragment.
    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipId> {
        match &self.fill {
            FillXml::Blip { relationship, .. } => Some(relationship),
            _ => None,
        }
        .into_iter()
    }

    /// Serialized `p:spPr` element.
    pub fn to_xml(&self) -> String {
        self.to_string()
    }

    fn write_xml(&self, out: &mut impl Write) -> fmt::Result {
        out.write_str("<p:spPr>")?;
        let x = &self.xfrm;
        write!(
            out,
            r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            x.x,
            x.y,
            x.cx.max(0),
            x.cy.max(0)
        )?;
        write_geometry(out, &self.geometry)?;
        write_fill(out, &self.fill)?;
        match &self.line {
            None => out.write_str("<a:ln><a:noFill/></a:ln>")?,
            Some(l) => {
                write!(out, r#"<a:ln w="{}"><a:solidFill>"#, l.width.max(0))?;
                write_color(out, &l.color)?;
                out.write_str("</a:solidFill>")?;
                if l.dashed {
                    out.write_str(r#"<a:prstDash val="dash"/>"#)?;
                }
                out.write_str("</a:ln>")?;
            }
        }
        if !self.effects.is_empty() {
            out.write_str("<a:effectLst>")?;
            if let Some(rad) = self.effects.blur {
                write!(out, r#"<a:blur rad="{rad}" grow="1"/>"#)?;
            }
            if let Some(s) = &self.effects.inner_shadow {
                write!(
                    out,
                    r#"<a:innerShdw blurRad="{}" dist="{}" dir="{}">"#,
                    s.blur_rad, s.dist, s.dir
                )?;
                write_color(out, &s.color)?;
                out.write_str("</a:innerShdw>")?;
            }
            if let Some(s) = &self.effects.outer_shadow {
                write!(
                    out,
                    r#"<a:outerShdw blurRad="{}" dist="{}" dir="{}" algn="ctr" rotWithShape="0">"#,
                    s.blur_rad, s.dist, s.dir
                )?;
                write_color(out, &s.color)?;
                out.write_str("</a:outerShdw>")?;
            }
            out.write_str("</a:effectLst>")?;
        }
        if let Some(b) = &self.bevel {
            write!(
                out,
                r#"<a:scene3d><a:camera prst="orthographicFront"/><a:lightRig rig="{}" dir="{}"/></a:scene3d>"#,
                b.rig, b.direction
            )?;
            write!(
                out,
                r#"<a:sp3d prstMaterial="{}"><a:bevelT w="{}" h="{}" prst="softRound"/></a:sp3d>"#,
                b.material, b.width, b.height
            )?;
        }
        out.write_str("</p:spPr>")
    }
}

impl fmt::Display for DrawingMlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_xml(f)
    }
}

fn write_geometry(out: &mut impl Write, geometry: &Geometry) -> fmt::Result {
    let paths = match geometry {
        Geometry::Rect => return out.write_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#),
        Geometry::Custom(paths) => paths,
    };
    out.write_str(
        r#"<a:custGeom><a:avLst/><a:gdLst/><a:ahLst/><a:cxnLst/><a:rect l="l" t="t" r="r" b="b"/><a:pathLst>"#,
    )?;
    for path in paths {
        write!(out, r#"<a:path w="{}" h="{}">"#, path.width.max(0), path.height.max(0))?;
        for cmd in &path.commands {
            match *cmd {
                PathCommand::MoveTo(x, y) => {
                    write!(out, r#"<a:moveTo><a:pt x="{x}" y="{y}"/></a:moveTo>"#)?
                }
                PathCommand::LineTo(x, y) => {
                    write!(out, r#"<a:lnTo><a:pt x="{x}" y="{y}"/></a:lnTo>"#)?
                }
                PathCommand::QuadTo(x1, y1, x, y) => write!(
                    out,
                    r#"<a:quadBezTo><a:pt x="{x1}" y="{y1}"/><a:pt x="{x}" y="{y}"/></a:quadBezTo>"#
                )?,
                PathCommand::CubicTo(x1, y1, x2, y2, x, y) => write!(
                    out,
                    r#"<a:cubicBezTo><a:pt x="{x1}" y="{y1}"/><a:pt x="{x2}" y="{y2}"/><a:pt x="{x}" y="{y}"/></a:cubicBezTo>"#
                )?,
                PathCommand::Close => out.write_str("<a:close/>")?,
            }
        }
        out.write_str("</a:path>")?;
    }
    out.write_str("</a:pathLst></a:custGeom>")
}

fn write_fill(out: &mut impl Write, fill: &FillXml) -> fmt::Result {
    match fill {
        FillXml::None => out.write_str("<a:noFill/>"),
        FillXml::Solid(c) => {
            out.write_str("<a:solidFill>")?;
            write_color(out, c)?;
            out.write_str("</a:solidFill>")
        }
        FillXml::Blip {
            relationship,
            mode,
            alpha,
        } => {
            write!(out, r#"<a:blipFill rotWithShape="1"><a:blip r:embed="{relationship}">"#)?;
            if let Some(a) = alpha {
                write!(out, r#"<a:alphaModFix amt="{a}"/>"#)?;
            }
            out.write_str("</a:blip>")?;
            match mode {
                BlipMode::Stretch => out.write_str("<a:stretch><a:fillRect/></a:stretch>")?,
                BlipMode::Tile { tx, ty } => write!(
                    out,
                    r#"<a:tile tx="{tx}" ty="{ty}" sx="100000" sy="100000" flip="none" algn="tl"/>"#
                )?,
            }
            out.write_str("</a:blipFill>")
        }
    }
}

fn write_color(out: &mut impl Write, c: &ColorXml) -> fmt::Result {
    let rgb = c.color.hex();
    let alpha = alpha_amount(c.color.a);
    if c.sat_mod.is_none() && c.hue_off.is_none() && alpha.is_none() {
        return write!(out, r#"<a:srgbClr val="{rgb}"/>"#);
    }
    write!(out, r#"<a:srgbClr val="{rgb}">"#)?;
    if let Some(h) = c.hue_off {
        write!(out, r#"<a:hueOff val="{h}"/>"#)?;
    }
    if let Some(s) = c.sat_mod {
        write!(out, r#"<a:satMod val="{s}"/>"#)?;
    }
    if let Some(a) = alpha {
        write!(out, r#"<a:alpha val="{a}"/>"#)?;
    }
    out.write_str("</a:srgbClr>")
}

/// `a:alpha` amount for an 8-bit alpha, `None` when opaque.
pub fn alpha_amount(a: u8) -> Option<i64> {
    (a < 255).then(|| (f64::from(a) / 255.0 * 100_000.0).round() as i64)
}

#[cfg(test)]
#[path = "../../tests/unit/emit/drawingml.rs"]
mod tests;
