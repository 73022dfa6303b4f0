//! Per-pixel and neighbourhood filters on interleaved RGB and gray buffers.

use camtools_core::{GrayImage, GrayImageView, RgbImage, RgbImageView};

/// Reflect an out-of-range index without repeating the edge pixel
/// (`dcb|abcd|cba`).
#[inline]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// Normalised `k × k` box filter with the anchor at `k / 2` and reflected
/// borders.
pub fn box_blur_rgb(src: &RgbImageView<'_>, k: usize) -> RgbImage {
    let (w, h) = (src.width, src.height);
    if k <= 1 || w == 0 || h == 0 {
        return RgbImage {
            width: w,
            height: h,
            data: src.data.to_vec(),
        };
    }
    let before = (k / 2) as isize;

    // Horizontal pass into integer row sums.
    let mut rows = vec![0u32; w * h * 3];
    for y in 0..h {
        let line = &src.data[y * w * 3..(y + 1) * w * 3];
        for x in 0..w {
            let mut acc = [0u32; 3];
            for d in 0..k as isize {
                let sx = reflect101(x as isize - before + d, w);
                for c in 0..3 {
                    acc[c] += line[sx * 3 + c] as u32;
                }
            }
            rows[(y * w + x) * 3..(y * w + x) * 3 + 3].copy_from_slice(&acc);
        }
    }

    let area = (k * k) as f32;
    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 3];
            for d in 0..k as isize {
                let sy = reflect101(y as isize - before + d, h);
                for c in 0..3 {
                    acc[c] += rows[(sy * w + x) * 3 + c];
                }
            }
            for c in 0..3 {
                out.data[(y * w + x) * 3 + c] = (acc[c] as f32 / area).round().min(255.0) as u8;
            }
        }
    }
    out
}

/// Per-channel `|a - b|`. Both images must have the same size.
pub fn abs_diff_rgb(a: &RgbImageView<'_>, b: &RgbImageView<'_>) -> RgbImage {
    debug_assert_eq!((a.width, a.height), (b.width, b.height));
    RgbImage {
        width: a.width,
        height: a.height,
        data: a
            .data
            .iter()
            .zip(b.data)
            .map(|(&x, &y)| x.abs_diff(y))
            .collect(),
    }
}

/// Luma `0.299 R + 0.587 G + 0.114 B` in 14-bit fixed point.
pub fn rgb_to_gray(src: &RgbImageView<'_>) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    GrayImage {
        width: src.width,
        height: src.height,
        data: src
            .data
            .chunks_exact(3)
            .map(|p| ((p[0] as u32 * R + p[1] as u32 * G + p[2] as u32 * B + (1 << 13)) >> 14) as u8)
            .collect(),
    }
}

/// `max_value` where the pixel is strictly above `thresh`, 0 elsewhere.
pub fn threshold_binary(src: &GrayImageView<'_>, thresh: u8, max_value: u8) -> GrayImage {
    GrayImage {
        width: src.width,
        height: src.height,
        data: src
            .data
            .iter()
            .map(|&v| if v > thresh { max_value } else { 0 })
            .collect(),
    }
}

pub fn count_non_zero(src: &GrayImageView<'_>) -> usize {
    src.data.iter().filter(|&&v| v != 0).count()
}
