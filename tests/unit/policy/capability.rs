use super::*;
use crate::foundation::core::Rgba;
use crate::graph::primitive::{ConvolveParams, EdgeMode};

fn cfg() -> PolicyConfig {
    PolicyConfig::default()
}

fn morph(r: f64) -> Primitive {
    Primitive::Morphology {
        operator: MorphologyOperator::Dilate,
        radius: (r, r),
    }
}

#[test]
fn blur_and_offset_follow_the_layer() {
    let blur = Primitive::Blur { std_dev: (2.0, 2.0) };
    assert_eq!(
        assess(&blur, &[LayerClass::Shape], &cfg()),
        Capability::Native(NativeEffect::Blur, LayerClass::Shape)
    );
    assert_eq!(
        assess(&blur, &[LayerClass::Shadow], &cfg()),
        Capability::Native(NativeEffect::ShadowBlur, LayerClass::Shadow)
    );
    let off = Primitive::Offset { dx: 1.0, dy: 1.0 };
    assert_eq!(
        assess(&off, &[LayerClass::Shadow], &cfg()),
        Capability::Native(NativeEffect::ShadowOffset, LayerClass::Shadow)
    );
}

#[test]
fn morphology_radius_threshold_is_configurable() {
    assert_eq!(
        assess(&morph(2.0), &[LayerClass::Shape], &cfg()),
        Capability::Vector(Approximation::OutlineExpand, LayerClass::Shape)
    );
    assert!(matches!(
        assess(&morph(500.0), &[LayerClass::Shape], &cfg()),
        Capability::Raster(_)
    ));
    let tight = PolicyConfig {
        morphology_vector_max_radius: 1.0,
        ..cfg()
    };
    assert!(matches!(
        assess(&morph(2.0), &[LayerClass::Shape], &tight),
        Capability::Raster(_)
    ));
    assert_eq!(
        assess(&morph(0.0), &[LayerClass::Shape], &cfg()),
        Capability::Vector(Approximation::Passthrough, LayerClass::Shape)
    );
}

#[test]
fn only_edge_kernels_are_vector() {
    let mut p = ConvolveParams {
        order: (3, 3),
        kernel: vec![-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0],
        divisor: 1.0,
        bias: 0.0,
        target: (1, 1),
        edge_mode: EdgeMode::Duplicate,
        preserve_alpha: false,
    };
    assert_eq!(
        assess(&Primitive::ConvolveMatrix(p.clone()), &[LayerClass::Shape], &cfg()),
        Capability::Vector(Approximation::DashedEdgeOutline, LayerClass::Shape)
    );
    p.kernel = vec![1.0; 9];
    assert!(matches!(
        assess(&Primitive::ConvolveMatrix(p), &[LayerClass::Shape], &cfg()),
        Capability::Raster(_)
    ));
}

#[test]
fn union_needs_one_shape_and_no_pixels() {
    let merge = Primitive::Merge;
    assert_eq!(
        assess(&merge, &[LayerClass::Shadow, LayerClass::Shape], &cfg()),
        Capability::Native(NativeEffect::EffectUnion, LayerClass::Shape)
    );
    assert!(matches!(
        assess(&merge, &[LayerClass::Shape, LayerClass::Shape], &cfg()),
        Capability::Raster(_)
    ));
    assert!(matches!(
        assess(&merge, &[LayerClass::Fill, LayerClass::Shape], &cfg()),
        Capability::Raster(_)
    ));
}

#[test]
fn flood_in_shadow_recolors() {
    let comp = Primitive::Composite {
        operator: CompositeOperator::In,
        k: [0.0; 4],
    };
    assert_eq!(
        assess(&comp, &[LayerClass::Fill, LayerClass::Shadow], &cfg()),
        Capability::Native(NativeEffect::Recolor, LayerClass::Shadow)
    );
    let xor = Primitive::Composite {
        operator: CompositeOperator::Xor,
        k: [0.0; 4],
    };
    assert!(matches!(
        assess(&xor, &[LayerClass::Shape, LayerClass::Shape], &cfg()),
        Capability::Raster(_)
    ));
    let flood = Primitive::Flood { color: Rgba::BLACK };
    assert_eq!(
        assess(&flood, &[], &cfg()),
        Capability::Native(NativeEffect::SolidFill, LayerClass::Fill)
    );
}

#[test]
fn costs_grow_with_tier() {
    let blur = Primitive::Blur { std_dev: (1.0, 1.0) };
    assert!(cost(&blur, Tier::Native) < cost(&blur, Tier::VectorApprox));
    assert!(cost(&blur, Tier::VectorApprox) < cost(&blur, Tier::RasterFallback));
    assert_eq!(cost(&morph(3.0), Tier::RasterFallback), 20);
}
