//! Separable Gaussian blur over premultiplied RGBA8.
//!
//! Weights are Q16 fixed point and sum to exactly 1.0, so flat areas stay flat.
//! Samples past the edge of the blurred region clamp to the edge pixel, which makes the
//! result depend only on pixels inside the region.

/// Q16 Gaussian kernel of `2 * radius + 1` taps.
pub fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    if radius == 0 || !sigma.is_finite() || sigma <= 0.0 {
        return vec![1 << 16];
    }

    let r = radius as i32;
    let denom = 2.0 * (sigma as f64) * (sigma as f64);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = i as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();

    // Put the rounding error on the center tap.
    let total: i64 = weights.iter().map(|&w| w as i64).sum();
    let mid = weights.len() / 2;
    weights[mid] = (weights[mid] as i64 + 65536 - total).clamp(0, 65536) as u32;

    weights
}

/// Kernel for a blur radius given in device pixels.
pub fn kernel_for_radius(radius_px: f32) -> Vec<u32> {
    if !radius_px.is_finite() || radius_px < 0.5 {
        return vec![1 << 16];
    }
    let radius = radius_px.ceil() as u32;
    gaussian_kernel_q16(radius, (radius_px / 2.0).max(0.5))
}

/// Blur a `width` x `height` RGBA8 buffer in place.
pub fn blur_rgba8_premul(data: &mut [u8], width: u32, height: u32, kernel: &[u32]) {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    debug_assert_eq!(data.len(), width as usize * height as usize * 4);

    let mut tmp = vec![0u8; data.len()];
    horizontal_pass(data, &mut tmp, width, height, kernel);
    vertical_pass(&tmp, data, width, height, kernel);
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_sums_to_one() {
        for radius in [1, 3, 8, 24] {
            let kernel = gaussian_kernel_q16(radius, radius as f32 / 2.0);
            assert_eq!(kernel.len(), radius as usize * 2 + 1);
            assert_eq!(kernel.iter().sum::<u32>(), 1 << 16);
        }
        assert_eq!(kernel_for_radius(0.0), vec![1 << 16]);
    }

    #[test]
    fn flat_color_is_unchanged() {
        let mut data = [40u8, 80, 120, 255].repeat(16 * 9);
        let original = data.clone();

        blur_rgba8_premul(&mut data, 16, 9, &kernel_for_radius(4.0));

        assert_eq!(data, original);
    }

    #[test]
    fn edge_is_softened() {
        // Left half black, right half white.
        let (w, h) = (20u32, 4u32);
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..h {
            for x in 0..w {
                let v = if x < w / 2 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }

        blur_rgba8_premul(&mut data, w, h, &kernel_for_radius(3.0));

        let at = |x: u32| data[(x * 4) as usize];
        assert_eq!(at(0), 0);
        assert_eq!(at(w - 1), 255);
        assert!(at(w / 2 - 1) > 0 && at(w / 2 - 1) < 128);
        assert!(at(w / 2) > 128 && at(w / 2) < 255);
    }
}
