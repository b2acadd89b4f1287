//! Image normalization ahead of candidate detection.
//!
//! Grayscale, then edge preserving denoise, then adaptive histogram
//! equalization. Denoising has to come first or the equalization amplifies
//! sensor noise into spurious contours.

use image::{ DynamicImage, GrayImage, GenericImageView };
use imageproc::filter;
use tracing::trace;

use crate::config::PreprocessConfig;
use crate::error::{ LprError, LprErrorKind };

const HIST_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {

    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn preprocess(&self, frame: &DynamicImage) -> Result<GrayImage, LprError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(LprErrorKind::EmptyImage(width, height).into());
        }
        let config = &self.config;

        let mut gray = frame.to_luma8();
        if config.denoise {
            gray = filter::bilateral_filter(&gray, config.bilateral_radius,
                config.sigma_color, config.sigma_spatial);
        }
        if config.enhance_contrast {
            gray = clahe(&gray, config.clip_limit, config.tile_grid);
        }
        trace!(width, height, "preprocessed frame");
        Ok(gray)
    }
}

/// Contrast limited adaptive histogram equalization.
///
/// The image is split into `grid`×`grid` tiles (fewer when the image is smaller
/// than the grid), each tile gets its own clipped equalization table and every
/// pixel is bilinearly interpolated between the tables of the four nearest
/// tile centres.
pub fn clahe(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let tiles_x = grid.max(1).min(width) as usize;
    let tiles_y = grid.max(1).min(height) as usize;
    let tile_w = (width as usize + tiles_x - 1) / tiles_x;
    let tile_h = (height as usize + tiles_y - 1) / tiles_y;

    // one lut per tile, row major
    let mut luts = Vec::with_capacity(tiles_x*tiles_y);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            // tiles running past the border are filled by reflection so every
            // tile covers the same area
            let mut hist = [0u32; HIST_SIZE];
            for y in ty*tile_h..(ty + 1)*tile_h {
                for x in tx*tile_w..(tx + 1)*tile_w {
                    let sx = reflect(x, width as usize) as u32;
                    let sy = reflect(y, height as usize) as u32;
                    hist[img.get_pixel(sx, sy).0[0] as usize] += 1;
                }
            }
            let area = (tile_w*tile_h) as u32;
            if clip_limit > 0.0 {
                let limit = ((clip_limit*area as f32/HIST_SIZE as f32) as u32).max(1);
                clip_histogram(&mut hist, limit);
            }
            luts.push(equalization_lut(&hist, area));
        }
    }

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let value = img.get_pixel(x, y).0[0] as usize;
        // position relative to tile centres
        let gx = (x as f32 + 0.5)/tile_w as f32 - 0.5;
        let gy = (y as f32 + 0.5)/tile_h as f32 - 0.5;
        let tx0 = gx.floor().max(0.0) as usize;
        let ty0 = gy.floor().max(0.0) as usize;
        let tx0 = tx0.min(tiles_x - 1);
        let ty0 = ty0.min(tiles_y - 1);
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (gx - tx0 as f32).max(0.0).min(1.0);
        let ay = (gy - ty0 as f32).max(0.0).min(1.0);

        let lut = |tx: usize, ty: usize| luts[ty*tiles_x + tx][value] as f32;
        let top = lut(tx0, ty0)*(1.0 - ax) + lut(tx1, ty0)*ax;
        let bottom = lut(tx0, ty1)*(1.0 - ax) + lut(tx1, ty1)*ax;
        let v = top*(1.0 - ay) + bottom*ay;
        pixel.0[0] = v.round().max(0.0).min(255.0) as u8;
    }
    out
}

fn reflect(i: usize, len: usize) -> usize {
    if i < len {
        i
    } else {
        (2*(len - 1)).saturating_sub(i)
    }
}

/// Cap every bin at `limit` and spread the excess evenly, the remainder going
/// to the lowest bins. The total count is preserved.
pub fn clip_histogram(hist: &mut [u32; HIST_SIZE], limit: u32) {
    let mut excess = 0;
    hist.iter_mut().for_each(|v| {
        if *v > limit {
            excess += *v - limit;
            *v = limit;
        }
    });
    let share = excess/HIST_SIZE as u32;
    let remainder = (excess % HIST_SIZE as u32) as usize;
    hist.iter_mut().enumerate().for_each(|(i, v)| {
        *v += share;
        if i < remainder {
            *v += 1;
        }
    });
}

fn equalization_lut(hist: &[u32; HIST_SIZE], area: u32) -> [u8; HIST_SIZE] {
    let mut lut = [0u8; HIST_SIZE];
    if area == 0 {
        return lut;
    }
    let scale = (HIST_SIZE - 1) as f32/area as f32;
    let mut cdf = 0;
    hist.iter().zip(lut.iter_mut()).for_each(|(count, v)| {
        cdf += *count;
        *v = (cdf as f32*scale).round().min(255.0) as u8;
    });
    lut
}


#[cfg(test)]
mod test {

    use image::{ DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage };

    use super::*;

    #[test]
    fn output_is_single_channel_with_same_size() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([10, 200, 30])));
        let out = Preprocessor::new(PreprocessConfig::default()).preprocess(&frame).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn empty_frame_is_an_error() {
        let frame = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        let res = Preprocessor::new(PreprocessConfig::default()).preprocess(&frame);
        assert!(matches!(res.unwrap_err().kind(), LprErrorKind::EmptyImage(0, 10)));
    }

    #[test]
    fn disabled_steps_only_convert_to_gray() {
        let config = PreprocessConfig { denoise: false, enhance_contrast: false, ..Default::default() };
        let frame = DynamicImage::ImageLuma8(GrayImage::from_fn(20, 20, |x, y| Luma([(x*10 + y) as u8])));
        let out = Preprocessor::new(config).preprocess(&frame).unwrap();
        assert_eq!(&out, frame.as_luma8().unwrap());
    }

    #[test]
    fn clip_keeps_total_count() {
        let mut hist = [0u32; HIST_SIZE];
        hist[0] = 1000;
        hist[255] = 37;
        clip_histogram(&mut hist, 10);
        assert_eq!(hist.iter().sum::<u32>(), 1037);
        assert!(hist.iter().all(|v| *v <= 10 + 5));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img: GrayImage = ImageBuffer::from_pixel(100, 60, Luma([90]));
        let out = clahe(&img, 2.0, 8);
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn image_smaller_than_grid() {
        let img: GrayImage = GrayImage::from_fn(3, 2, |x, _| Luma([(x*100) as u8]));
        let out = clahe(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn equalization_spreads_dark_image() {
        // without clipping a two level image is stretched towards the full range
        let img: GrayImage = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 10 } else { 20 }]));
        let out = clahe(&img, 0.0, 1);
        assert_eq!(out.get_pixel(15, 0).0[0], 255);
        assert!(out.get_pixel(0, 0).0[0] > 10);
    }
}
