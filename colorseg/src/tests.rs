//! Pipeline-level scenarios over synthetic images.

use image::{Rgb, RgbImage};

use crate::{
    ClusterSelection, InputConfig, NullSink, RefinementConfig, SegmentationConfig,
    SegmentationError, SegmentationPipeline,
};

const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// 2x2 image with blue pixels on the main diagonal and white elsewhere.
fn blue_white_image() -> RgbImage {
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(0, 0, BLUE);
    image.put_pixel(1, 0, WHITE);
    image.put_pixel(0, 1, WHITE);
    image.put_pixel(1, 1, BLUE);
    image
}

fn small_config(width: u32, height: u32) -> SegmentationConfig {
    SegmentationConfig::new()
        .with_input(InputConfig::new().with_resize(width, height))
        .with_refinement(
            RefinementConfig::new().with_cluster_selection(ClusterSelection::ClosestTo([0, 0, 255])),
        )
}

#[test]
fn test_end_to_end_blue_white_separation() {
    let pipeline = SegmentationPipeline::new(small_config(2, 2)).expect("config is valid");
    let image = blue_white_image();
    let segmentation = pipeline
        .segment(&image, &mut NullSink)
        .expect("segmentation should succeed");

    // The component means separate into approximately pure blue and white.
    let (mean, _) = segmentation
        .mixture
        .component(segmentation.component)
        .expect("selected component is valid");
    assert!(mean[0] < 1.0 && mean[1] < 1.0 && (mean[2] - 255.0).abs() < 1.0);

    // The refined mask is 1 exactly at the blue positions.
    assert_eq!(segmentation.refined_mask[[0, 0]], 1);
    assert_eq!(segmentation.refined_mask[[1, 1]], 1);
    assert_eq!(segmentation.refined_mask[[0, 1]], 0);
    assert_eq!(segmentation.refined_mask[[1, 0]], 0);
    assert_eq!(segmentation.foreground_pixel_count(), 2);

    // Foreground pixels keep their color, background pixels are black.
    assert_eq!(*segmentation.foreground.get_pixel(0, 0), BLUE);
    assert_eq!(*segmentation.foreground.get_pixel(1, 0), Rgb([0, 0, 0]));
}

#[test]
fn test_end_to_end_is_reproducible() {
    let pipeline = SegmentationPipeline::new(small_config(2, 2)).expect("config is valid");
    let image = blue_white_image();

    let first = pipeline
        .segment(&image, &mut NullSink)
        .expect("segmentation should succeed");
    let second = pipeline
        .segment(&image, &mut NullSink)
        .expect("segmentation should succeed");

    assert_eq!(first.rough_mask, second.rough_mask);
    assert_eq!(first.probability_map, second.probability_map);
    assert_eq!(first.refined_mask, second.refined_mask);
    assert_eq!(first.component, second.component);
}

#[test]
fn test_shape_invariants_follow_resize_dimensions() {
    // Left half bluish with slight variation, right half whitish.
    let image = RgbImage::from_fn(8, 6, |x, y| {
        if x < 4 {
            Rgb([(x as u8) * 2, y as u8, 250 - (y as u8)])
        } else {
            Rgb([250 - (x as u8), 252, 251 - (y as u8)])
        }
    });
    let pipeline = SegmentationPipeline::new(small_config(6, 4)).expect("config is valid");
    let segmentation = pipeline
        .segment(&image, &mut NullSink)
        .expect("segmentation should succeed");

    assert_eq!((segmentation.resized.width(), segmentation.resized.height()), (6, 4));
    assert_eq!(segmentation.rough_mask.dim(), (4, 6));
    assert_eq!(segmentation.probability_map.dim(), (4, 6));
    assert_eq!(segmentation.refined_mask.dim(), (4, 6));
    assert_eq!(
        (segmentation.foreground.width(), segmentation.foreground.height()),
        (6, 4)
    );
    assert!(
        segmentation.probability_map.iter().all(|&v| v >= 0.0),
        "densities must be non-negative"
    );
}

#[test]
fn test_constant_image_fails_deterministically() {
    let image = RgbImage::from_pixel(4, 4, Rgb([42, 42, 42]));
    let pipeline = SegmentationPipeline::new(small_config(4, 4)).expect("config is valid");

    for _ in 0..2 {
        let result = pipeline.segment(&image, &mut NullSink);
        assert!(
            matches!(result, Err(SegmentationError::InsufficientData { .. })),
            "an all-identical image must fail at fit time"
        );
    }
}

#[test]
fn test_fixed_index_selection_is_supported() {
    let config = small_config(2, 2).with_refinement(
        RefinementConfig::new().with_cluster_selection(ClusterSelection::Index(1)),
    );
    let pipeline = SegmentationPipeline::new(config).expect("config is valid");
    let segmentation = pipeline
        .segment(&blue_white_image(), &mut NullSink)
        .expect("segmentation should succeed");
    assert_eq!(segmentation.component, 1);
    // Exactly one two-pixel cluster is selected either way.
    assert_eq!(segmentation.foreground_pixel_count(), 2);
}

#[test]
fn test_zero_resize_dimensions_are_rejected() {
    let config = SegmentationConfig::new().with_input(InputConfig::new().with_resize(0, 800));
    match SegmentationPipeline::new(config) {
        Err(SegmentationError::InvalidConfiguration { reason }) => {
            assert!(reason.contains("resize"), "unexpected reason: {reason}");
        }
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_cluster_index_is_rejected() {
    let config = SegmentationConfig::new().with_refinement(
        RefinementConfig::new().with_cluster_selection(ClusterSelection::Index(2)),
    );
    match SegmentationPipeline::new(config) {
        Err(SegmentationError::InvalidConfiguration { reason }) => {
            assert!(reason.contains("cluster index"), "unexpected reason: {reason}");
        }
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[test]
fn test_negative_threshold_is_rejected() {
    let config = SegmentationConfig::new()
        .with_refinement(RefinementConfig::new().with_probability_threshold(-1.0));
    assert!(matches!(
        SegmentationPipeline::new(config),
        Err(SegmentationError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_raising_threshold_never_grows_the_foreground() {
    let image = RgbImage::from_fn(8, 6, |x, y| {
        if x < 4 {
            Rgb([(x as u8) * 3, (y as u8) * 2, 240 + (y as u8)])
        } else {
            Rgb([250 - (x as u8), 249, 248])
        }
    });
    let mut previous = usize::MAX;
    for threshold in [0.0, 1e-12, 5e-9, 1e-6, 1e-3] {
        let config = small_config(8, 6)
            .with_refinement(
                RefinementConfig::new()
                    .with_probability_threshold(threshold)
                    .with_cluster_selection(ClusterSelection::ClosestTo([0, 0, 255])),
            );
        let pipeline = SegmentationPipeline::new(config).expect("config is valid");
        let segmentation = pipeline
            .segment(&image, &mut NullSink)
            .expect("segmentation should succeed");
        let count = segmentation.foreground_pixel_count();
        assert!(
            count <= previous,
            "foreground grew from {previous} to {count} when threshold rose to {threshold}"
        );
        previous = count;
    }
}
