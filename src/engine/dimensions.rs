// src/engine/dimensions.rs
//
// Target dimension resolution.

use crate::ops::AspectRatio;

/// Target canvas size requested by a directive.
///
/// `ignore_aspect_ratio` is set only when both axes were given explicitly; the
/// crop strategies (`c-`) are only honored in that case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
    pub ignore_aspect_ratio: bool,
}

/// Resolve target dimensions from the explicit width/height and an optional
/// aspect ratio.
///
/// - both axes: used verbatim, aspect ratio ignored
/// - one axis: mirrored onto the other, or derived through the aspect ratio
/// - neither: `None` (the source is served unmodified)
///
/// Derived axes truncate toward zero and never go below 1.
pub fn resolve_dimensions(
    width: Option<u32>,
    height: Option<u32>,
    aspect_ratio: Option<AspectRatio>,
) -> Option<TargetDimensions> {
    match (width, height) {
        (Some(width), Some(height)) => Some(TargetDimensions {
            width,
            height,
            ignore_aspect_ratio: true,
        }),
        (Some(width), None) => {
            let height = match aspect_ratio {
                Some(ar) => derive_axis(width as f64 / ar.ratio()),
                None => width,
            };
            Some(TargetDimensions {
                width,
                height,
                ignore_aspect_ratio: false,
            })
        }
        (None, Some(height)) => {
            let width = match aspect_ratio {
                Some(ar) => derive_axis(height as f64 * ar.ratio()),
                None => height,
            };
            Some(TargetDimensions {
                width,
                height,
                ignore_aspect_ratio: false,
            })
        }
        (None, None) => None,
    }
}

fn derive_axis(value: f64) -> u32 {
    // `as` saturates, NaN maps to 0
    (value.trunc() as u32).max(1)
}
