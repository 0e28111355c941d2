use super::*;

fn rect_fragment(fill: FillXml) -> DrawingMlFragment {
    DrawingMlFragment {
        xfrm: EmuRect {
            x: 9525,
            y: 19050,
            cx: 95250,
            cy: 47625,
        },
        geometry: Geometry::Rect,
        fill,
        line: None,
        effects: EffectListXml::default(),
        bevel: None,
    }
}

#[test]
fn solid_rect_serializes_in_schema_order() {
    let f = rect_fragment(FillXml::Solid(ColorXml::plain(Rgba::opaque(255, 0, 0))));
    assert_eq!(
        f.to_xml(),
        concat!(
            "<p:spPr>",
            r#"<a:xfrm><a:off x="9525" y="19050"/><a:ext cx="95250" cy="47625"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#,
            r#"<a:solidFill><a:srgbClr val="FF0000"/></a:solidFill>"#,
            "<a:ln><a:noFill/></a:ln>",
            "</p:spPr>"
        )
    );
    assert!(!f.is_image());
    assert_eq!(f.relationships().count(), 0);
}

#[test]
fn color_transforms_and_alpha_are_children_of_srgb_clr() {
    let f = rect_fragment(FillXml::Solid(ColorXml {
        color: Rgba::new(0, 128, 255, 128),
        sat_mod: Some(50_000),
        hue_off: Some(5_400_000),
    }));
    let xml = f.to_xml();
    assert!(xml.contains(
        r#"<a:srgbClr val="0080FF"><a:hueOff val="5400000"/><a:satMod val="50000"/><a:alpha val="50196"/></a:srgbClr>"#
    ));
}

#[test]
fn custom_geometry_line_and_effects() {
    let f = DrawingMlFragment {
        xfrm: EmuRect {
            x: 0,
            y: 0,
            cx: 100,
            cy: 100,
        },
        geometry: Geometry::Custom(vec![GeometryPath {
            width: 100,
            height: 100,
            commands: vec![
                PathCommand::MoveTo(0, 0),
                PathCommand::LineTo(100, 0),
                PathCommand::CubicTo(100, 50, 50, 100, 0, 100),
                PathCommand::Close,
            ],
        }]),
        fill: FillXml::None,
        line: Some(LineXml {
            width: 9525,
            color: ColorXml::plain(Rgba::BLACK),
            dashed: true,
        }),
        effects: EffectListXml {
            blur: Some(38100),
            inner_shadow: None,
            outer_shadow: Some(ShadowXml {
                blur_rad: 57150,
                dist: 19050,
                dir: 2_700_000,
                color: ColorXml::plain(Rgba::new(0, 0, 0, 255)),
            }),
        },
        bevel: None,
    };
    let xml = f.to_xml();
    assert!(xml.contains(r#"<a:path w="100" h="100"><a:moveTo><a:pt x="0" y="0"/></a:moveTo><a:lnTo><a:pt x="100" y="0"/></a:lnTo><a:cubicBezTo>"#));
    assert!(xml.contains("<a:close/></a:path></a:pathLst></a:custGeom><a:noFill/>"));
    assert!(xml.contains(
        r#"<a:ln w="9525"><a:solidFill><a:srgbClr val="000000"/></a:solidFill><a:prstDash val="dash"/></a:ln>"#
    ));
    let blur = xml.find("<a:blur ").unwrap();
    let shadow = xml.find("<a:outerShdw ").unwrap();
    assert!(blur < shadow);
    assert!(xml.contains(
        r#"<a:outerShdw blurRad="57150" dist="19050" dir="2700000" algn="ctr" rotWithShape="0">"#
    ));
    assert!(xml.ends_with("</a:effectLst></p:spPr>"));
}

#[test]
fn tiled_blip_carries_relationship_and_alpha() {
    let rel = RelationshipId("rIdFx3".to_owned());
    let f = rect_fragment(FillXml::Blip {
        relationship: rel.clone(),
        mode: BlipMode::Tile { tx: 9525, ty: 0 },
        alpha: Some(40_000),
    });
    let xml = f.to_xml();
    assert!(f.is_image());
    assert_eq!(f.relationships().collect::<Vec<_>>(), vec![&rel]);
    assert!(xml.contains(
        r#"<a:blipFill rotWithShape="1"><a:blip r:embed="rIdFx3"><a:alphaModFix amt="40000"/></a:blip><a:tile tx="9525" ty="0" sx="100000" sy="100000" flip="none" algn="tl"/></a:blipFill>"#
    ));
}

#[test]
fn bevel_follows_effect_list() {
    let mut f = rect_fragment(FillXml::Solid(ColorXml::plain(Rgba::WHITE)));
    f.effects.inner_shadow = Some(ShadowXml {
        blur_rad: 0,
        dist: 0,
        dir: 0,
        color: ColorXml::plain(Rgba::BLACK),
    });
    f.bevel = Some(Bevel3dXml {
        rig: "threePt",
        direction: "tl",
        material: "matte",
        width: 19050,
        height: 19050,
    });
    let xml = f.to_xml();
    let effects = xml.find("</a:effectLst>").unwrap();
    let scene = xml.find("<a:scene3d>").unwrap();
    assert!(effects < scene);
    assert!(xml.contains(r#"<a:lightRig rig="threePt" dir="tl"/>"#));
    assert!(xml.contains(
        r#"<a:sp3d prstMaterial="matte"><a:bevelT w="19050" h="19050" prst="softRound"/></a:sp3d>"#
    ));
}

#[test]
fn negative_extents_are_clamped() {
    let mut f = rect_fragment(FillXml::None);
    f.xfrm.cx = -5;
    assert!(f.to_xml().contains(r#"<a:ext cx="0" cy="47625"/>"#));
}

#[test]
fn alpha_amounts() {
    assert_eq!(alpha_amount(255), None);
    assert_eq!(alpha_amount(0), Some(0));
    assert_eq!(alpha_amount(128), Some(50_196));
}
