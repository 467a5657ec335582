//! Box resampling of packed RGBA data.
//!
//! Each destination pixel averages the source pixels it covers, weighted by
//! the covered area. The filter is separable and runs horizontally first.

use rayon::prelude::*;

/// Resample packed RGBA floats from `src_w x src_h` to `dst_w x dst_h`.
pub fn resample_rgba_f32(src: &[f32], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<f32> {
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }
    resample(src, src_w, src_h, dst_w, dst_h)
}

/// Resample packed RGBA bytes from `src_w x src_h` to `dst_w x dst_h`.
pub fn resample_rgba_u8(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }
    let widened: Vec<f32> = src.iter().map(|&v| f32::from(v)).collect();
    resample(&widened, src_w, src_h, dst_w, dst_h)
        .into_iter()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect()
}

fn resample(src: &[f32], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<f32> {
    if dst_w == 0 || dst_h == 0 || src_w == 0 || src_h == 0 {
        return Vec::new();
    }
    let x_weights = weights(src_w, dst_w);
    let y_weights = weights(src_h, dst_h);
    let src_row = 4 * src_w as usize;
    let dst_row = 4 * dst_w as usize;

    // Horizontal pass: src_h rows of dst_w pixels.
    let mut horizontal = vec![0.0f32; dst_row * src_h as usize];
    horizontal
        .par_chunks_mut(dst_row)
        .zip(src.par_chunks(src_row))
        .for_each(|(dst, row)| {
            for (px, taps) in dst.chunks_exact_mut(4).zip(&x_weights) {
                for &(sx, w) in taps {
                    for c in 0..4 {
                        px[c] += row[4 * sx + c] * w;
                    }
                }
            }
        });

    // Vertical pass.
    let mut out = vec![0.0f32; dst_row * dst_h as usize];
    out.par_chunks_mut(dst_row)
        .zip(y_weights.par_iter())
        .for_each(|(dst, taps)| {
            for &(sy, w) in taps {
                let row = &horizontal[sy * dst_row..(sy + 1) * dst_row];
                for (d, s) in dst.iter_mut().zip(row) {
                    *d += s * w;
                }
            }
        });
    out
}

/// Source taps and normalized weights for every destination pixel of an axis.
fn weights(src_len: u32, dst_len: u32) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|i| {
            let start = i as f32 * scale;
            let end = (start + scale).min(src_len as f32);
            let first = (start.floor() as u32).min(src_len - 1);
            let last = (end.ceil() as u32).clamp(first + 1, src_len);
            let mut taps: Vec<(usize, f32)> = (first..last)
                .map(|s| {
                    let lo = (s as f32).max(start);
                    let hi = (s as f32 + 1.0).min(end);
                    (s as usize, (hi - lo).max(0.0))
                })
                .filter(|&(_, w)| w > 0.0)
                .collect();
            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                for tap in &mut taps {
                    tap.1 /= total;
                }
            } else {
                taps = vec![(first as usize, 1.0)];
            }
            taps
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn halving_averages_blocks() {
        // 2x2 -> 1x1
        let src = [
            0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 1.0, //
            0.0, 1.0, 0.0, 1.0, //
            1.0, 1.0, 0.0, 1.0,
        ];
        let out = resample_rgba_f32(&src, 2, 2, 1, 1);
        assert_eq!(out.len(), 4);
        assert_relative_eq!(out[0], 0.5);
        assert_relative_eq!(out[1], 0.5);
        assert_relative_eq!(out[3], 1.0);
    }

    #[test]
    fn same_size_is_copy() {
        let src = [10u8, 20, 30, 40];
        assert_eq!(resample_rgba_u8(&src, 1, 1, 1, 1), src.to_vec());
    }

    #[test]
    fn upscaling_replicates() {
        let src = [255u8, 0, 0, 255];
        let out = resample_rgba_u8(&src, 1, 1, 3, 2);
        assert_eq!(out.len(), 4 * 6);
        assert!(out.chunks_exact(4).all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn uneven_ratio_preserves_constant() {
        let src = vec![0.75f32; 4 * 5 * 3];
        let out = resample_rgba_f32(&src, 5, 3, 2, 2);
        for v in out {
            assert_relative_eq!(v, 0.75, epsilon = 1e-6);
        }
    }
}
