//! Math utilities and helpers.

use glam::UVec2;

/// Largest power of two less than or equal to `value` (0 for 0).
#[inline]
pub const fn prev_power_of_two(value: u32) -> u32 {
    if value == 0 {
        0
    } else {
        1 << (31 - value.leading_zeros())
    }
}

/// Clamp a size to a per-axis resolution limit.
///
/// Sizes within the limit are returned unchanged. Otherwise each axis is
/// replaced by the largest power of two not exceeding `min(axis, limit)`.
#[inline]
pub fn limit_size(size: UVec2, limit: u32) -> UVec2 {
    if size.x <= limit && size.y <= limit {
        return size;
    }
    UVec2::new(
        prev_power_of_two(size.x.min(limit)),
        prev_power_of_two(size.y.min(limit)),
    )
}

/// Map a source span `[offset, offset + len)` onto a scaled axis.
///
/// `full` is the source extent and `limit` the destination extent. The start
/// is truncated and the length rounded up, then shrunk by one pixel if the
/// span would run past `limit`.
#[inline]
pub fn scale_span(offset: i32, len: i32, full: u32, limit: u32) -> (i32, i32) {
    let ratio = limit as f32 / full as f32;
    let scaled_offset = (offset as f32 * ratio) as i32;
    let mut scaled_len = (ratio * len as f32).ceil() as i32;
    if scaled_offset + scaled_len > limit as i32 {
        scaled_len -= 1;
    }
    (scaled_offset, scaled_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prev_power_of_two_values() {
        assert_eq!(prev_power_of_two(0), 0);
        assert_eq!(prev_power_of_two(1), 1);
        assert_eq!(prev_power_of_two(3), 2);
        assert_eq!(prev_power_of_two(1024), 1024);
        assert_eq!(prev_power_of_two(1500), 1024);
        assert_eq!(prev_power_of_two(u32::MAX), 1 << 31);
    }

    #[test]
    fn limit_size_keeps_small_sizes() {
        assert_eq!(limit_size(UVec2::new(300, 700), 1024), UVec2::new(300, 700));
    }

    #[test]
    fn limit_size_forces_powers_of_two() {
        assert_eq!(limit_size(UVec2::new(3000, 700), 1024), UVec2::new(1024, 512));
        assert_eq!(limit_size(UVec2::new(2048, 2048), 1000), UVec2::new(512, 512));
    }

    #[test]
    fn scale_span_halves() {
        assert_eq!(scale_span(10, 10, 64, 32), (5, 5));
        // Rounded-up length is shrunk when it would overflow the destination.
        assert_eq!(scale_span(63, 1, 64, 32), (31, 1));
        assert_eq!(scale_span(61, 3, 64, 32), (30, 2));
    }
}
