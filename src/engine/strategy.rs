// src/engine/strategy.rs
//
// Resize strategy selection and geometry.
//
// A strategy is picked once per request and then matched exhaustively. The
// geometry is everything the pixel pipeline needs: canvas size, the source
// rectangle to read, the size it is resampled to and where it lands on the
// canvas.

use crate::engine::dimensions::TargetDimensions;
use crate::error::{Result, TransformError};
use crate::ops::{CropMode, CropStrategy, FocusSide, ResizeStrategy};

/// Pixel geometry for one request.
///
/// The source rectangle stays fractional; the resampler supports sub-pixel
/// crops. Canvas and resize sizes are truncated and never below 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Canvas (output) width
    pub dest_width: u32,
    /// Canvas (output) height
    pub dest_height: u32,
    /// Size the source rectangle is resampled to
    pub resize_width: u32,
    pub resize_height: u32,
    pub src_x: f64,
    pub src_y: f64,
    pub src_width: f64,
    pub src_height: f64,
    /// Offset of the resampled image on the canvas
    pub pad_x: u32,
    pub pad_y: u32,
    /// Canvas is filled with the background colour before compositing
    pub fill_background: bool,
}

impl Geometry {
    fn full_source(source: (u32, u32), size: (u32, u32)) -> Self {
        Self {
            dest_width: size.0,
            dest_height: size.1,
            resize_width: size.0,
            resize_height: size.1,
            src_x: 0.0,
            src_y: 0.0,
            src_width: source.0 as f64,
            src_height: source.1 as f64,
            pad_x: 0,
            pad_y: 0,
            fill_background: false,
        }
    }

    /// True when the resampled image does not cover the whole canvas.
    pub fn is_padded(&self) -> bool {
        self.pad_x > 0
            || self.pad_y > 0
            || self.resize_width < self.dest_width
            || self.resize_height < self.dest_height
    }
}

/// Pick the strategy for a request that has target dimensions.
///
/// Crop strategies are honored only when both axes were given explicitly.
/// Otherwise a crop mode selects padding, and cover-crop is the fallback.
pub fn select_strategy(
    crop: Option<CropStrategy>,
    crop_mode: CropMode,
    focus: FocusSide,
    target: &TargetDimensions,
) -> ResizeStrategy {
    match (crop, crop_mode) {
        (Some(crop), _) if target.ignore_aspect_ratio => crop.into(),
        (_, CropMode::Pad) => ResizeStrategy::Pad { focus },
        _ => ResizeStrategy::Cover,
    }
}

/// Compute the geometry of `strategy` for a `source` of `(width, height)`.
///
/// Strategies that never enlarge fail with `ImageTooSmall` when the source is
/// smaller than the target on either axis.
pub fn compute_geometry(
    source: (u32, u32),
    target: &TargetDimensions,
    strategy: ResizeStrategy,
) -> Result<Geometry> {
    let (sw, sh) = source;
    if sw == 0 || sh == 0 {
        return Err(TransformError::decode_failed("source has zero area"));
    }
    let (tw, th) = (target.width, target.height);

    if !strategy.allows_enlargement() && (sw < tw || sh < th) {
        return Err(TransformError::image_too_small((sw, sh), (tw, th)));
    }

    let (swf, shf) = (sw as f64, sh as f64);
    let (twf, thf) = (tw as f64, th as f64);
    let aspect = swf / shf;

    let geometry = match strategy {
        ResizeStrategy::Force => Geometry::full_source(source, (tw, th)),

        ResizeStrategy::AtMax => {
            let size = if swf / twf > shf / thf {
                (tw, to_px(twf / aspect))
            } else {
                (to_px(thf * aspect), th)
            };
            Geometry::full_source(source, size)
        }

        // The binding axis is clamped to the source, so this never grows the
        // image past its own size.
        ResizeStrategy::AtMaxEnlarge => {
            let size = if swf / twf > shf / thf {
                let w = sw.min(tw);
                (w, to_px(w as f64 / aspect))
            } else {
                let h = sh.min(th);
                (to_px(h as f64 * aspect), h)
            };
            Geometry::full_source(source, size)
        }

        ResizeStrategy::AtLeast => {
            let mut w = twf;
            let mut h = twf / aspect;
            if h < thf {
                h = thf;
                w = thf * aspect;
            }
            Geometry::full_source(source, (to_px(w), to_px(h)))
        }

        ResizeStrategy::Cover => {
            let x_scale = swf / twf;
            let y_scale = shf / thf;
            let mut geometry = Geometry::full_source(source, (tw, th));
            if x_scale > y_scale {
                let resample_width = swf / y_scale;
                geometry.src_x = ((resample_width - twf) / 2.0) * y_scale;
                geometry.src_width = twf * y_scale;
            } else {
                let resample_height = shf / x_scale;
                geometry.src_y = ((resample_height - thf) / 2.0) * x_scale;
                geometry.src_height = thf * x_scale;
            }
            geometry
        }

        ResizeStrategy::Pad { focus } => {
            let x_scale = twf / swf;
            let y_scale = thf / shf;
            let (rw, rh) = if x_scale < y_scale {
                (tw, to_px(twf / aspect))
            } else {
                (to_px(thf * aspect), th)
            };
            let free_x = tw.saturating_sub(rw);
            let free_y = th.saturating_sub(rh);
            let (pad_x, pad_y) = match focus {
                FocusSide::Left => (0, free_y / 2),
                FocusSide::Right => (free_x, free_y / 2),
                FocusSide::Top => (free_x / 2, 0),
                FocusSide::Bottom => (free_x / 2, free_y),
                FocusSide::None => (free_x / 2, free_y / 2),
            };
            Geometry {
                dest_width: tw,
                dest_height: th,
                resize_width: rw,
                resize_height: rh,
                pad_x,
                pad_y,
                fill_background: true,
                ..Geometry::full_source(source, (tw, th))
            }
        }
    };

    Ok(geometry)
}

fn to_px(value: f64) -> u32 {
    (value.trunc() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn target(width: u32, height: u32) -> TargetDimensions {
        TargetDimensions {
            width,
            height,
            ignore_aspect_ratio: true,
        }
    }

    #[test]
    fn selection_prefers_crop_strategy() {
        let t = target(300, 200);
        let s = select_strategy(Some(CropStrategy::AtMax), CropMode::Pad, FocusSide::Left, &t);
        assert_eq!(s, ResizeStrategy::AtMax);
    }

    #[test]
    fn crop_strategy_needs_both_axes() {
        let t = TargetDimensions {
            width: 300,
            height: 300,
            ignore_aspect_ratio: false,
        };
        let s = select_strategy(Some(CropStrategy::Force), CropMode::None, FocusSide::None, &t);
        assert_eq!(s, ResizeStrategy::Cover);
        let s = select_strategy(Some(CropStrategy::Force), CropMode::Pad, FocusSide::Top, &t);
        assert_eq!(s, ResizeStrategy::Pad { focus: FocusSide::Top });
    }

    #[test]
    fn force_distorts() {
        let g = compute_geometry((1000, 500), &target(300, 300), ResizeStrategy::Force).unwrap();
        assert_eq!((g.dest_width, g.dest_height), (300, 300));
        assert_eq!((g.src_x, g.src_y, g.src_width, g.src_height), (0.0, 0.0, 1000.0, 500.0));
        assert!(!g.fill_background);
    }

    #[test]
    fn force_may_enlarge() {
        let g = compute_geometry((100, 100), &target(300, 300), ResizeStrategy::Force).unwrap();
        assert_eq!((g.dest_width, g.dest_height), (300, 300));
    }

    #[test]
    fn at_max_binds_wider_axis() {
        let g = compute_geometry((1000, 500), &target(300, 300), ResizeStrategy::AtMax).unwrap();
        assert_eq!((g.dest_width, g.dest_height), (300, 150));
        let g = compute_geometry((500, 1000), &target(300, 300), ResizeStrategy::AtMax).unwrap();
        assert_eq!((g.dest_width, g.dest_height), (150, 300));
    }

    #[test]
    fn at_max_rejects_small_source() {
        let err = compute_geometry((100, 100), &target(300, 300), ResizeStrategy::AtMax).unwrap_err();
        assert!(matches!(err, TransformError::ImageTooSmall { .. }));
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn at_max_enlarge_clamps_to_source_size() {
        // Despite the name the result never exceeds the source.
        let g = compute_geometry((100, 100), &target(300, 300), ResizeStrategy::AtMaxEnlarge)
            .unwrap();
        assert_eq!((g.dest_width, g.dest_height), (100, 100));
        let g = compute_geometry((1000, 500), &target(300, 300), ResizeStrategy::AtMaxEnlarge)
            .unwrap();
        assert_eq!((g.dest_width, g.dest_height), (300, 150));
    }

    #[test]
    fn at_least_covers_both_axes() {
        let g = compute_geometry((800, 400), &target(300, 300), ResizeStrategy::AtLeast).unwrap();
        assert_eq!((g.dest_width, g.dest_height), (600, 300));
        let g = compute_geometry((400, 800), &target(300, 300), ResizeStrategy::AtLeast).unwrap();
        assert_eq!((g.dest_width, g.dest_height), (300, 600));
    }

    #[test]
    fn cover_crops_horizontally() {
        let g = compute_geometry((1000, 500), &target(300, 300), ResizeStrategy::Cover).unwrap();
        let y_scale = 500.0 / 300.0;
        let resample_width = 1000.0 / y_scale;
        assert_eq!(g.src_x, ((resample_width - 300.0) / 2.0) * y_scale);
        assert!((g.src_x - 250.0).abs() < 1e-9);
        assert!((g.src_width - 500.0).abs() < 1e-9);
        assert_eq!(g.src_y, 0.0);
        assert_eq!(g.src_height, 500.0);
        assert_eq!((g.dest_width, g.dest_height), (300, 300));
        assert_eq!((g.resize_width, g.resize_height), (300, 300));
    }

    #[test]
    fn cover_crops_vertically() {
        let g = compute_geometry((500, 1000), &target(300, 300), ResizeStrategy::Cover).unwrap();
        assert!((g.src_y - 250.0).abs() < 1e-9);
        assert!((g.src_height - 500.0).abs() < 1e-9);
        assert_eq!(g.src_x, 0.0);
    }

    #[test]
    fn cover_rejects_small_source() {
        assert!(compute_geometry((200, 500), &target(300, 300), ResizeStrategy::Cover).is_err());
    }

    #[test]
    fn pad_centres_by_default() {
        let g = compute_geometry(
            (1000, 500),
            &target(300, 300),
            ResizeStrategy::Pad { focus: FocusSide::None },
        )
        .unwrap();
        assert_eq!((g.dest_width, g.dest_height), (300, 300));
        assert_eq!((g.resize_width, g.resize_height), (300, 150));
        assert_eq!((g.pad_x, g.pad_y), (0, 75));
        assert!(g.fill_background);
        assert!(g.is_padded());
    }

    #[test]
    fn pad_focus_sides() {
        let src = (500, 1000);
        let t = target(300, 300);
        let pad = |focus| {
            let g = compute_geometry(src, &t, ResizeStrategy::Pad { focus }).unwrap();
            (g.pad_x, g.pad_y)
        };
        // resized to 150x300
        assert_eq!(pad(FocusSide::Left), (0, 0));
        assert_eq!(pad(FocusSide::Right), (150, 0));
        assert_eq!(pad(FocusSide::Top), (75, 0));
        assert_eq!(pad(FocusSide::Bottom), (75, 0));
        assert_eq!(pad(FocusSide::None), (75, 0));
    }

    #[test]
    fn pad_bottom_pushes_down() {
        let g = compute_geometry(
            (1000, 500),
            &target(300, 300),
            ResizeStrategy::Pad { focus: FocusSide::Bottom },
        )
        .unwrap();
        assert_eq!((g.pad_x, g.pad_y), (0, 150));
    }

    #[test]
    fn zero_area_source_is_rejected() {
        assert!(compute_geometry((0, 10), &target(1, 1), ResizeStrategy::Force).is_err());
    }
}
