//! Equirectangular to rectilinear resampling

use image::{Rgb, RgbImage};
use rayon::prelude::*;

use crate::geometry::ViewMapping;
use crate::panorama::Panorama;

/// Bilinear sample at fractional position `(u, v)`
///
/// Pixel `i` sits at coordinate `i`. Columns wrap around the seam, rows are
/// clamped at the poles.
pub fn sample_bilinear(panorama: &Panorama, u: f64, v: f64) -> Rgb<u8> {
    let width = panorama.width() as i64;
    let height = panorama.height() as i64;

    let x0 = u.floor();
    let y0 = v.floor();
    let fx = (u - x0) as f32;
    let fy = (v - y0) as f32;

    let x0 = (x0 as i64).rem_euclid(width);
    let x1 = (x0 + 1).rem_euclid(width);
    let y0_clamped = (y0 as i64).clamp(0, height - 1);
    let y1 = (y0 as i64 + 1).clamp(0, height - 1);
    let y0 = y0_clamped;

    let p00 = panorama.get_pixel(x0 as u32, y0 as u32);
    let p10 = panorama.get_pixel(x1 as u32, y0 as u32);
    let p01 = panorama.get_pixel(x0 as u32, y1 as u32);
    let p11 = panorama.get_pixel(x1 as u32, y1 as u32);

    let mut out = [0u8; 3];
    for (c, value) in out.iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Render one `size`×`size` view; rows are computed in parallel
pub fn render_view(panorama: &Panorama, mapping: &ViewMapping, size: u32) -> RgbImage {
    let mut view = RgbImage::new(size, size);
    if panorama.width() == 0 || panorama.height() == 0 {
        return view;
    }

    let pano_width = panorama.width() as f64;
    let pano_height = panorama.height() as f64;
    let row_bytes = size as usize * 3;

    view.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
                let (u, v) = mapping.source_pixel(x as u32, y as u32, pano_width, pano_height);
                pixel.copy_from_slice(&sample_bilinear(panorama, u, v).0);
            }
        });

    view
}
