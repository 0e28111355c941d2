use super::*;
use crate::services::{SrgbColorSpace, StandardServices};

fn square(size: f64) -> BezPath {
    Rect::new(0.0, 0.0, size, size).to_path(0.1)
}

fn approx_rect(a: Rect, b: Rect, tol: f64) -> bool {
    (a.x0 - b.x0).abs() <= tol
        && (a.y0 - b.y0).abs() <= tol
        && (a.x1 - b.x1).abs() <= tol
        && (a.y1 - b.y1).abs() <= tol
}

#[test]
fn dilate_is_one_outer_contour() {
    assert_eq!(dilate(&square(10.0), 0.0), square(10.0));
    let grown = dilate(&square(10.0), 2.0);
    let moves = grown
        .elements()
        .iter()
        .filter(|el| matches!(el, PathEl::MoveTo(_)))
        .count();
    assert_eq!(moves, 1);
    let b = grown.bounding_box();
    assert!(approx_rect(b, Rect::new(-2.0, -2.0, 12.0, 12.0), 0.1), "{b:?}");
}

#[test]
fn dilate_keeps_one_contour_per_subpath() {
    let mut two = square(4.0);
    for el in (Affine::translate((20.0, 0.0)) * square(4.0)).elements() {
        two.push(*el);
    }
    let grown = dilate(&two, 1.0);
    let moves = grown
        .elements()
        .iter()
        .filter(|el| matches!(el, PathEl::MoveTo(_)))
        .count();
    assert_eq!(moves, 2);
    let b = grown.bounding_box();
    assert!(approx_rect(b, Rect::new(-1.0, -1.0, 25.0, 5.0), 0.1), "{b:?}");
}

#[test]
fn erode_shrinks_about_the_centre() {
    let shrunk = erode(&square(10.0), 2.0).bounding_box();
    assert!(approx_rect(shrunk, Rect::new(2.0, 2.0, 8.0, 8.0), 1e-9));
    assert!(erode(&square(10.0), 5.0).elements().is_empty());
}

#[test]
fn jitter_is_seeded_and_bounded() {
    let path = square(10.0);
    let a = jitter(&path, 4.0, 7);
    assert_eq!(a, jitter(&path, 4.0, 7));
    assert_ne!(a, jitter(&path, 4.0, 8));
    for (before, after) in path.elements().iter().zip(a.elements()) {
        match (before, after) {
            (PathEl::MoveTo(p), PathEl::MoveTo(q)) | (PathEl::LineTo(p), PathEl::LineTo(q)) => {
                assert!((p.x - q.x).abs() <= 2.0 && (p.y - q.y).abs() <= 2.0);
            }
            (PathEl::ClosePath, PathEl::ClosePath) => {}
            other => panic!("element kind changed: {other:?}"),
        }
    }
}

#[test]
fn baked_matrix_swaps_channels() {
    let swap = ColorMatrix::Matrix([
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]);
    assert_eq!(
        bake_matrix(Rgba::opaque(255, 0, 0), &swap, None),
        Rgba::opaque(0, 0, 255)
    );
}

#[test]
fn baked_transfer_respects_linear_light() {
    let half = TransferFunction::Linear {
        slope: 0.0,
        intercept: 0.5,
    };
    let funcs = [
        half,
        TransferFunction::Identity,
        TransferFunction::Identity,
        TransferFunction::Identity,
    ];
    let srgb = bake_transfer(Rgba::BLACK, &funcs, None);
    assert!((127..=128).contains(&srgb.r), "{srgb:?}");
    let linear = bake_transfer(Rgba::BLACK, &funcs, Some(&SrgbColorSpace));
    assert!((187..=188).contains(&linear.r), "{linear:?}");
    assert_eq!(linear.a, 255);
}

#[test]
fn light_rig_follows_azimuth() {
    let distant = |azimuth| LightSource::Distant {
        azimuth,
        elevation: 45.0,
    };
    assert_eq!(light_rig(&distant(0.0)), ("threePt", "r"));
    assert_eq!(light_rig(&distant(90.0)), ("threePt", "b"));
    assert_eq!(light_rig(&distant(225.0)), ("threePt", "tl"));
    assert_eq!(light_rig(&distant(-90.0)), ("threePt", "t"));
    assert_eq!(
        light_rig(&LightSource::Point {
            x: 0.0,
            y: 0.0,
            z: 10.0
        }),
        ("balanced", "t")
    );
}

#[test]
fn geometry_is_relative_to_the_transform_origin() {
    let services = StandardServices::default();
    let (xfrm, paths) = to_emu_geometry(&[square(10.0)], (5.0, 0.0), &services);
    assert_eq!(
        xfrm,
        EmuRect {
            x: 47_625,
            y: 0,
            cx: 95_250,
            cy: 95_250
        }
    );
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].width, 95_250);
    assert_eq!(paths[0].commands[0], PathCommand::MoveTo(0, 0));
    assert_eq!(paths[0].commands[2], PathCommand::LineTo(95_250, 95_250));
    assert_eq!(paths[0].commands.last(), Some(&PathCommand::Close));
}

#[test]
fn empty_paths_are_skipped() {
    let services = StandardServices::default();
    let (xfrm, paths) = to_emu_geometry(&[BezPath::new()], (0.0, 0.0), &services);
    assert!(paths.is_empty());
    assert_eq!(xfrm, EmuRect::default());
}

#[test]
fn scale_and_polar() {
    let scaled = StandardServices::with_transform(Affine::scale(2.0));
    assert!((length_scale(&scaled) - 2.0).abs() < 1e-12);
    assert_eq!(length_scale(&StandardServices::default()), 1.0);

    assert_eq!(polar(0.0, 0.0), (0.0, 0));
    let (dist, _) = polar(3.0, 4.0);
    assert!((dist - 5.0).abs() < 1e-12);
    assert_eq!(polar(0.0, 1.0).1, 5_400_000);
    assert_eq!(polar(-1.0, 0.0).1, 10_800_000);
    assert_eq!(polar(0.0, -1.0).1, 16_200_000);
}
