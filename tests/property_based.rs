use image::{DynamicImage, GenericImageView, RgbImage};
use proptest::prelude::*;
use tr_image::engine::{
    compute_geometry, execute_geometry, resolve_dimensions, Directive, TargetDimensions,
    TransformRequest,
};
use tr_image::ops::FocusSide;
use tr_image::{resolve_plan, EncoderCapabilities, ResizeStrategy, Rgb, SourceFormat, SourceInfo};

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn focus_strategy() -> impl Strategy<Value = FocusSide> {
    prop_oneof![
        Just(FocusSide::None),
        Just(FocusSide::Left),
        Just(FocusSide::Right),
        Just(FocusSide::Top),
        Just(FocusSide::Bottom),
    ]
}

fn enlarging_strategy() -> impl Strategy<Value = ResizeStrategy> {
    prop_oneof![
        Just(ResizeStrategy::Force),
        Just(ResizeStrategy::AtMaxEnlarge),
    ]
}

fn shrinking_strategy() -> impl Strategy<Value = ResizeStrategy> {
    prop_oneof![
        Just(ResizeStrategy::Cover),
        Just(ResizeStrategy::AtMax),
        Just(ResizeStrategy::AtLeast),
        focus_strategy().prop_map(|focus| ResizeStrategy::Pad { focus }),
    ]
}

/// One token per directive key, in random order.
fn directive_tokens() -> impl Strategy<Value = Vec<String>> {
    (
        1u32..5000,
        1u32..5000,
        0u8..=100,
        prop_oneof![Just("force"), Just("at_max"), Just("at_max_enlarge"), Just("at_least")],
        prop_oneof![Just("left"), Just("right"), Just("top"), Just("bottom")],
        prop_oneof![Just("auto"), Just("jpg"), Just("png"), Just("webp"), Just("avif")],
        any::<[u8; 3]>(),
        (1u32..50, 1u32..50),
    )
        .prop_map(|(w, h, q, c, fo, f, bg, (num, den))| {
            vec![
                format!("w-{w}"),
                format!("h-{h}"),
                format!("q-{q}"),
                format!("c-{c}"),
                "cm-pad_resize".to_string(),
                format!("fo-{fo}"),
                format!("f-{f}"),
                format!("bg-{:02x}{:02x}{:02x}", bg[0], bg[1], bg[2]),
                format!("ar-{num}-{den}"),
            ]
        })
        .prop_flat_map(|tokens| Just(tokens).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_parser_never_panics(input in ".{0,64}") {
        let directive = Directive::parse(&input);
        let request = TransformRequest::from_directive(&directive);
        prop_assert!(request.quality <= 100);
        prop_assert!(request.width.map_or(true, |w| w > 0));
        prop_assert!(request.height.map_or(true, |h| h > 0));
    }

    #[test]
    fn prop_independent_keys_are_order_invariant(tokens in directive_tokens()) {
        let mut sorted = tokens.clone();
        sorted.sort();
        let shuffled = TransformRequest::from_directive(&Directive::parse(&tokens.join(",")));
        let canonical = TransformRequest::from_directive(&Directive::parse(&sorted.join(",")));
        prop_assert_eq!(shuffled, canonical);
    }

    #[test]
    fn prop_last_value_wins(first in 1u32..10_000, second in 1u32..10_000) {
        let req = TransformRequest::from_directive(&Directive::parse(&format!("w-{first},w-{second}")));
        prop_assert_eq!(req.width, Some(second));
    }

    #[test]
    fn prop_plans_are_deterministic(
        tokens in directive_tokens(),
        src_w in 1u32..6000,
        src_h in 1u32..6000,
        transparent in any::<bool>(),
    ) {
        let url = format!("https://cdn.test/a.png?tr={}", tokens.join(","));
        let request = TransformRequest::from_url(&url);
        let source = SourceInfo {
            width: src_w,
            height: src_h,
            format: SourceFormat::Png,
            has_transparency: transparent,
        };
        let a = resolve_plan(&request, &source, EncoderCapabilities::WEBP);
        let b = resolve_plan(&TransformRequest::from_url(&url), &source, EncoderCapabilities::WEBP);
        match (a, b) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            _ => prop_assert!(false, "plans diverged"),
        }
    }

    #[test]
    fn prop_both_axes_are_kept_verbatim(w in 1u32..10_000, h in 1u32..10_000) {
        let dims = resolve_dimensions(Some(w), Some(h), None).unwrap();
        prop_assert_eq!((dims.width, dims.height), (w, h));
        prop_assert!(dims.ignore_aspect_ratio);
    }

    #[test]
    fn prop_enlarging_geometry_stays_in_bounds(
        src_w in 1u32..4000,
        src_h in 1u32..4000,
        tw in 1u32..4000,
        th in 1u32..4000,
        strategy in enlarging_strategy(),
    ) {
        let target = TargetDimensions { width: tw, height: th, ignore_aspect_ratio: true };
        let g = compute_geometry((src_w, src_h), &target, strategy).unwrap();
        prop_assert!(g.dest_width >= 1 && g.dest_height >= 1);
        prop_assert!(g.dest_width <= tw && g.dest_height <= th);
        prop_assert_eq!((g.src_width, g.src_height), (src_w as f64, src_h as f64));
    }

    #[test]
    fn prop_shrinking_geometry_stays_in_bounds(
        tw in 1u32..1000,
        th in 1u32..1000,
        extra_w in 0u32..3000,
        extra_h in 0u32..3000,
        strategy in shrinking_strategy(),
    ) {
        let (src_w, src_h) = (tw + extra_w, th + extra_h);
        let target = TargetDimensions { width: tw, height: th, ignore_aspect_ratio: true };
        let g = compute_geometry((src_w, src_h), &target, strategy).unwrap();

        prop_assert!(g.src_x >= 0.0 && g.src_y >= 0.0);
        prop_assert!(g.src_x + g.src_width <= src_w as f64 + 1e-6);
        prop_assert!(g.src_y + g.src_height <= src_h as f64 + 1e-6);
        prop_assert!(g.resize_width >= 1 && g.resize_height >= 1);

        match strategy {
            ResizeStrategy::Cover => {
                prop_assert_eq!((g.dest_width, g.dest_height), (tw, th));
            }
            ResizeStrategy::Pad { .. } => {
                prop_assert_eq!((g.dest_width, g.dest_height), (tw, th));
                prop_assert!(g.pad_x + g.resize_width <= tw);
                prop_assert!(g.pad_y + g.resize_height <= th);
            }
            ResizeStrategy::AtMax => {
                prop_assert!(g.dest_width <= tw && g.dest_height <= th);
            }
            ResizeStrategy::AtLeast => {
                prop_assert!(g.dest_width >= tw || g.dest_height >= th);
            }
            _ => {}
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 16,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_executed_geometry_matches_plan(
        tw in 1u32..48,
        th in 1u32..48,
        extra_w in 0u32..48,
        extra_h in 0u32..48,
        strategy in prop_oneof![Just(ResizeStrategy::Cover), focus_strategy().prop_map(|focus| ResizeStrategy::Pad { focus })],
    ) {
        let (src_w, src_h) = (tw + extra_w, th + extra_h);
        let target = TargetDimensions { width: tw, height: th, ignore_aspect_ratio: true };
        let g = compute_geometry((src_w, src_h), &target, strategy).unwrap();
        let out = execute_geometry(create_test_image(src_w, src_h), &g, Rgb::DEFAULT_BACKGROUND).unwrap();
        prop_assert_eq!(out.dimensions(), (g.dest_width, g.dest_height));
    }
}
