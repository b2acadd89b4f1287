use image::{ DynamicImage, GenericImageView, Rgb, RgbImage };
use imageproc::{ drawing, rect };

use crate::detect::Region;

const CANDIDATE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PLATE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

pub fn crop(img: &DynamicImage, region: &Region) -> DynamicImage {
    img.crop_imm(region.x, region.y, region.width, region.height)
}

/// Copy of `img` with every candidate outlined, the ones that produced a
/// plate in a second colour and drawn twice as thick.
pub fn annotate(img: &DynamicImage, candidates: &[Region], plates: &[Region]) -> RgbImage {
    let mut out = img.to_rgb8();
    let (width, height) = img.dimensions();
    for region in candidates {
        draw_region(&mut out, region, CANDIDATE_COLOR);
    }
    for region in plates {
        let grown = region.expand_clamped(1, width, height);
        draw_region(&mut out, region, PLATE_COLOR);
        draw_region(&mut out, &grown, PLATE_COLOR);
    }
    out
}

fn draw_region(img: &mut RgbImage, region: &Region, color: Rgb<u8>) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let r = rect::Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height);
    drawing::draw_hollow_rect_mut(img, r, color);
}


#[cfg(test)]
mod test {

    use image::{ DynamicImage, GenericImageView, Rgb, RgbImage };

    use super::*;

    #[test]
    fn crop_matches_region() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(50, 40, |x, y| Rgb([x as u8, y as u8, 0])));
        let c = crop(&img, &Region::new(10, 5, 20, 8));
        assert_eq!(c.dimensions(), (20, 8));
        assert_eq!(c.to_rgb8().get_pixel(0, 0), &Rgb([10, 5, 0]));
    }

    #[test]
    fn annotation_outlines_regions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 60));
        let out = annotate(&img, &[Region::new(10, 10, 30, 10)], &[Region::new(50, 20, 40, 12)]);
        assert_eq!(out.get_pixel(10, 10), &CANDIDATE_COLOR);
        assert_eq!(out.get_pixel(50, 20), &PLATE_COLOR);
        assert_eq!(out.get_pixel(49, 19), &PLATE_COLOR);
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }
}
