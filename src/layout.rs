//! Viewport sizing for the image row.

/// Width in logical pixels reserved for one rendered image group.
pub const GROUP_WIDTH: f32 = 700.0;

/// Compute how many image groups fit in the current viewport.
///
/// `max(1, floor((view_width - 2 * nav_width) / GROUP_WIDTH))` — the nav
/// controls flank the image row on both sides. Never returns zero, so a
/// too-narrow window still shows one group. Recomputed on every resize
/// and tab switch.
#[must_use]
pub fn image_count(view_width: f32, nav_width: f32) -> usize {
    let usable = view_width - 2.0 * nav_width;
    let count = (usable / GROUP_WIDTH).floor();
    if count >= 1.0 { count as usize } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_viewport_fits_multiple_groups() {
        assert_eq!(image_count(2100.0, 50.0), 2);
        assert_eq!(image_count(2900.0, 50.0), 4);
    }

    #[test]
    fn test_exact_fit_boundary() {
        // 1500 - 2*50 = 1400 = exactly two group widths.
        assert_eq!(image_count(1500.0, 50.0), 2);
        assert_eq!(image_count(1499.0, 50.0), 1);
    }

    #[test]
    fn test_narrow_viewport_clamps_to_one() {
        assert_eq!(image_count(700.0, 50.0), 1);
        assert_eq!(image_count(100.0, 50.0), 1);
        assert_eq!(image_count(0.0, 50.0), 1);
        assert_eq!(image_count(-10.0, 50.0), 1);
    }

    #[test]
    fn test_matches_closed_form() {
        for (width, nav) in [(1600.0_f32, 40.0_f32), (2805.0, 25.0), (4200.0, 0.0)] {
            let expected = (((width - 2.0 * nav) / GROUP_WIDTH).floor() as usize).max(1);
            assert_eq!(image_count(width, nav), expected);
        }
    }
}
