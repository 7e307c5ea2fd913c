//! Per-pixel compositing primitives shared by the combinators.

use image::RgbaImage;

/// Composites `upper` onto `lower` ("over"): color channels blend by the
/// upper layer's alpha, `c = lower·(1−α) + upper·α`; the result's alpha is
/// the union `α = α_u + α_l·(1−α_u)`.
pub fn over(lower: &RgbaImage, upper: &RgbaImage) -> RgbaImage {
	let mut out = lower.clone();
	for (dst, src) in out.pixels_mut().zip(upper.pixels()) {
		let alpha = u32::from(src.0[3]);
		let inverse = 255 - alpha;
		for channel in 0..3 {
			let blended = u32::from(dst.0[channel]) * inverse + u32::from(src.0[channel]) * alpha;
			dst.0[channel] = ((blended + 127) / 255) as u8;
		}
		let union = alpha * 255 + u32::from(dst.0[3]) * inverse;
		dst.0[3] = ((union + 127) / 255) as u8;
	}
	out
}

/// Destination-out: keeps `dest` only where `mask` is transparent,
/// `α_d *= 1 − α_m`. Used to cut a region hole into the default style
/// before the region style is blended in.
pub fn dest_out(dest: &mut RgbaImage, mask: &RgbaImage) {
	for (dst, m) in dest.pixels_mut().zip(mask.pixels()) {
		let keep = 255 - u32::from(m.0[3]);
		dst.0[3] = ((u32::from(dst.0[3]) * keep + 127) / 255) as u8;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::Rgba;

	#[test]
	fn opaque_upper_layer_wins() {
		let lower = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
		let upper = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
		assert_eq!(over(&lower, &upper).get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
	}

	#[test]
	fn half_transparent_blue_over_red() {
		let lower = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
		let upper = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 255, 128]));
		let out = over(&lower, &upper);
		let pixel = out.get_pixel(0, 0);
		assert!((i32::from(pixel.0[0]) - 128).abs() <= 1);
		assert_eq!(pixel.0[1], 0);
		assert!((i32::from(pixel.0[2]) - 128).abs() <= 1);
		assert_eq!(pixel.0[3], 255);
	}

	#[test]
	fn dest_out_cuts_holes() {
		let mut dest = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 255]));
		let mask = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
		dest_out(&mut dest, &mask);
		assert_eq!(dest.get_pixel(0, 0).0[3], 0);
	}
}
