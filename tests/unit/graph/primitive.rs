use super::*;
use crate::services::StandardServices;

fn parse(el: &FilterElement) -> (Primitive, Diagnostics) {
    let services = StandardServices::default();
    let mut diags = Diagnostics::new();
    let p = {
        let mut cx = ParseCx {
            services: &services,
            label: "test",
            diags: &mut diags,
        };
        parse_primitive(el, &mut cx)
    };
    (p, diags)
}

#[test]
fn tags_match_case_insensitively() {
    assert_eq!(PrimitiveKind::from_tag("FEGAUSSIANBLUR"), PrimitiveKind::Blur);
    assert_eq!(PrimitiveKind::from_tag("feDropShadow"), PrimitiveKind::DropShadow);
    assert_eq!(PrimitiveKind::from_tag("feImage"), PrimitiveKind::Unsupported);
}

#[test]
fn blur_std_dev_is_clamped_with_warning() {
    let (p, d) = parse(&FilterElement::new("feGaussianBlur").attr("stdDeviation", "-3 5000"));
    assert_eq!(
        p,
        Primitive::Blur {
            std_dev: (0.0, 1000.0)
        }
    );
    assert_eq!(d.warnings().count(), 2);
}

#[test]
fn morphology_radius_takes_absolute_value() {
    let (p, d) = parse(
        &FilterElement::new("feMorphology")
            .attr("operator", "dilate")
            .attr("radius", "-2"),
    );
    assert_eq!(
        p,
        Primitive::Morphology {
            operator: MorphologyOperator::Dilate,
            radius: (2.0, 2.0)
        }
    );
    assert!(d.is_empty());
}

#[test]
fn color_matrix_with_wrong_count_falls_back_to_identity() {
    let (p, d) = parse(&FilterElement::new("feColorMatrix").attr("values", "1 0 0"));
    assert_eq!(p, Primitive::ColorMatrix(ColorMatrix::Matrix(ColorMatrix::IDENTITY)));
    assert!(d.has_code(DiagnosticCode::ParameterClamped));
}

#[test]
fn saturate_zero_produces_gray() {
    let m = ColorMatrix::Saturate(0.0);
    let out = m.apply([1.0, 0.0, 0.0, 1.0]);
    assert!((out[0] - out[1]).abs() < 1e-9);
    assert!((out[1] - out[2]).abs() < 1e-9);
    assert!((out[0] - 0.213).abs() < 1e-9);
    assert_eq!(out[3], 1.0);
}

#[test]
fn convolve_with_mismatched_kernel_degrades_to_unsupported() {
    let (p, d) = parse(
        &FilterElement::new("feConvolveMatrix")
            .attr("order", "3")
            .attr("kernelMatrix", "1 2 3"),
    );
    assert_eq!(p.kind(), PrimitiveKind::Unsupported);
    assert!(d.has_code(DiagnosticCode::UnsupportedPrimitive));
}

#[test]
fn laplacian_is_an_edge_kernel() {
    let (p, _) = parse(
        &FilterElement::new("feConvolveMatrix")
            .attr("order", "3")
            .attr("kernelMatrix", "0 1 0 1 -4 1 0 1 0"),
    );
    let Primitive::ConvolveMatrix(params) = p else {
        panic!("expected convolve");
    };
    assert!(params.is_edge_kernel());
    assert_eq!(params.divisor, 1.0);
    assert_eq!(params.target, (1, 1));
}

#[test]
fn flood_combines_color_and_opacity() {
    let (p, _) = parse(
        &FilterElement::new("feFlood")
            .attr("flood-color", "#ff0000")
            .attr("flood-opacity", "0.5"),
    );
    assert_eq!(
        p,
        Primitive::Flood {
            color: Rgba::new(255, 0, 0, 128)
        }
    );
}

#[test]
fn turbulence_octaves_are_bounded() {
    let (p, d) = parse(
        &FilterElement::new("feTurbulence")
            .attr("baseFrequency", "0.05")
            .attr("numOctaves", "40"),
    );
    let Primitive::Turbulence {
        octaves,
        base_frequency,
        ..
    } = p
    else {
        panic!("expected turbulence");
    };
    assert_eq!(octaves, 8);
    assert_eq!(base_frequency, (0.05, 0.05));
    assert_eq!(d.warnings().count(), 1);
}

#[test]
fn transfer_table_interpolates() {
    let f = TransferFunction::Table(vec![0.0, 1.0, 0.0]);
    assert!((f.apply(0.25) - 0.5).abs() < 1e-9);
    assert!((f.apply(1.0) - 0.0).abs() < 1e-9);
    let d = TransferFunction::Discrete(vec![0.2, 0.8]);
    assert_eq!(d.apply(0.3), 0.2);
    assert_eq!(d.apply(0.7), 0.8);
}

#[test]
fn lighting_reads_child_light_source() {
    let (p, d) = parse(
        &FilterElement::new("feSpecularLighting")
            .attr("specularExponent", "500")
            .child(
                FilterElement::new("feDistantLight")
                    .attr("azimuth", "45")
                    .attr("elevation", "30"),
            ),
    );
    let Primitive::SpecularLighting(l) = p else {
        panic!("expected lighting");
    };
    assert_eq!(l.specular_exponent, 128.0);
    assert_eq!(
        l.light,
        LightSource::Distant {
            azimuth: 45.0,
            elevation: 30.0
        }
    );
    assert_eq!(d.warnings().count(), 1);
}
