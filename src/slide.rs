use crate::config::Settings;
use crate::error::{Result, ShortsError};
use crate::storyboard::SlideSpec;
use crate::text_wrap::wrap_lines;
use fontdue::{Font, FontSettings};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use std::path::Path;

const TEXT_COLOR: [u8; 3] = [255, 255, 255];

/// Anything that can turn a [`SlideSpec`] into an image file on disk.
pub trait SlidePainter: Send + Sync {
    fn paint(&self, spec: &SlideSpec) -> Result<()>;
}

pub struct SlideRenderer {
    font: Font,
    font_size: f32,
    width: u32,
    height: u32,
    text_margin: u32,
    overlay_alpha: u8,
}

impl SlideRenderer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let bytes = std::fs::read(&settings.font_path).map_err(|e| {
            ShortsError::Config(format!(
                "cannot read font {}: {e}",
                settings.font_path.display()
            ))
        })?;
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| {
            ShortsError::Config(format!(
                "cannot parse font {}: {e}",
                settings.font_path.display()
            ))
        })?;

        Ok(Self {
            font,
            font_size: settings.font_size,
            width: settings.width,
            height: settings.height,
            text_margin: settings.text_margin,
            overlay_alpha: settings.overlay_alpha,
        })
    }

    pub fn text_width(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<char> = None;
        for c in text.chars() {
            if let Some(p) = prev {
                width += self.font.horizontal_kern(p, c, self.font_size).unwrap_or(0.0);
            }
            width += self.font.metrics(c, self.font_size).advance_width;
            prev = Some(c);
        }
        width
    }

    fn line_metrics(&self) -> (f32, f32) {
        match self.font.horizontal_line_metrics(self.font_size) {
            Some(m) => (m.ascent, m.new_line_size),
            None => (self.font_size, self.font_size * 1.2),
        }
    }

    pub fn render(&self, image_path: &Path, text: &str, slide_path: &Path) -> Result<()> {
        let source = decode_image(image_path)?;
        let mut frame = resize_and_crop(&source, self.width, self.height);
        darken(&mut frame, self.overlay_alpha);

        let max_width = self.width.saturating_sub(self.text_margin) as f32;
        let lines = wrap_lines(text, max_width, |s| self.text_width(s));
        self.draw_centered(&mut frame, &lines);

        if let Some(parent) = slide_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        frame.save(slide_path)?;
        Ok(())
    }

    fn draw_centered(&self, frame: &mut RgbImage, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        let (ascent, line_height) = self.line_metrics();
        let block_height = line_height * lines.len() as f32;
        let top = (frame.height() as f32 - block_height) / 2.0;

        for (i, line) in lines.iter().enumerate() {
            let line_width = self.text_width(line);
            let x = (frame.width() as f32 - line_width) / 2.0;
            let baseline = top + i as f32 * line_height + ascent;
            self.draw_line(frame, x, baseline, line);
        }
    }

    fn draw_line(&self, frame: &mut RgbImage, x: f32, baseline: f32, text: &str) {
        let mut pen = x;
        let mut prev: Option<char> = None;
        for c in text.chars() {
            if let Some(p) = prev {
                pen += self.font.horizontal_kern(p, c, self.font_size).unwrap_or(0.0);
            }
            let (metrics, bitmap) = self.font.rasterize(c, self.font_size);
            let gx = (pen + metrics.xmin as f32).round() as i32;
            let gy = (baseline - (metrics.height as i32 + metrics.ymin) as f32).round() as i32;
            blend_glyph(frame, gx, gy, metrics.width, metrics.height, &bitmap);
            pen += metrics.advance_width;
            prev = Some(c);
        }
    }
}

impl SlidePainter for SlideRenderer {
    fn paint(&self, spec: &SlideSpec) -> Result<()> {
        self.render(&spec.image_path, &spec.text, &spec.output_slide_path)
    }
}

pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let decode_err = |reason: String| ShortsError::Decode {
        path: path.to_path_buf(),
        reason,
    };
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| decode_err(e.to_string()))
}

/// Center-crops the source to the frame's aspect ratio, then scales the crop to
/// exactly `width` x `height`. Cropping first keeps memory bounded by the frame
/// size whatever the source's proportions.
pub fn resize_and_crop(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let (width, height) = (width.max(1), height.max(1));
    let (iw, ih) = (image.width().max(1), image.height().max(1));
    let aspect = width as f64 / height as f64;

    let crop_w = ((ih as f64 * aspect).round() as u32).clamp(1, iw);
    let crop_h = ((iw as f64 / aspect).round() as u32).clamp(1, ih);
    let left = (iw - crop_w) / 2;
    let top = (ih - crop_h) / 2;

    let region = image.crop_imm(left, top, crop_w, crop_h).to_rgb8();
    imageops::resize(&region, width, height, FilterType::Lanczos3)
}

/// Composites opaque-black at `alpha` over every pixel.
pub fn darken(frame: &mut RgbImage, alpha: u8) {
    let keep = 255 - u16::from(alpha);
    for px in frame.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = ((u16::from(*c) * keep + 127) / 255) as u8;
        }
    }
}

fn blend_glyph(frame: &mut RgbImage, x: i32, y: i32, w: usize, h: usize, coverage: &[u8]) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    for row in 0..h {
        let py = y + row as i32;
        if py < 0 || py >= fh {
            continue;
        }
        for col in 0..w {
            let px = x + col as i32;
            if px < 0 || px >= fw {
                continue;
            }
            let mask = u16::from(coverage[row * w + col]);
            if mask == 0 {
                continue;
            }
            let inv = 255 - mask;
            let dst = frame.get_pixel_mut(px as u32, py as u32);
            let mut out = [0u8; 3];
            for i in 0..3 {
                out[i] = ((u16::from(TEXT_COLOR[i]) * mask + u16::from(dst.0[i]) * inv + 127) / 255) as u8;
            }
            *dst = Rgb(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::path::PathBuf;

    fn solid(w: u32, h: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([value, value, value])))
    }

    #[test]
    fn output_matches_target_for_any_aspect() {
        for (w, h) in [(1920, 1080), (300, 2000), (1080, 1920), (50, 50), (4000, 100), (1, 1)] {
            let out = resize_and_crop(&solid(w, h, 128), 1080, 1920);
            assert_eq!(out.dimensions(), (1080, 1920), "source {w}x{h}");
        }
    }

    #[test]
    fn extreme_strips_stay_within_frame_memory() {
        for (w, h) in [(3000, 2), (2, 3000), (20000, 1)] {
            let out = resize_and_crop(&solid(w, h, 90), 1080, 1920);
            assert_eq!(out.dimensions(), (1080, 1920), "source {w}x{h}");
            assert_eq!(out.get_pixel(540, 960).0, [90, 90, 90]);
        }
    }

    #[test]
    fn crop_keeps_the_center_of_wide_sources() {
        let mut src = RgbImage::from_pixel(300, 100, Rgb([0, 0, 0]));
        for y in 0..100 {
            for x in 120..180 {
                src.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let out = resize_and_crop(&DynamicImage::ImageRgb8(src), 9, 16);
        assert_eq!(out.dimensions(), (9, 16));
        assert_eq!(out.get_pixel(4, 8).0, [255, 255, 255]);
    }

    #[test]
    fn darken_applies_overlay_alpha() {
        let mut frame = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        darken(&mut frame, 200);
        assert_eq!(frame.get_pixel(0, 0).0, [55, 55, 55]);

        let mut frame = RgbImage::from_pixel(1, 1, Rgb([100, 0, 255]));
        darken(&mut frame, 0);
        assert_eq!(frame.get_pixel(0, 0).0, [100, 0, 255]);
    }

    #[test]
    fn decode_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"<html>not an image</html>").unwrap();
        assert!(matches!(decode_image(&path), Err(ShortsError::Decode { .. })));
    }

    fn system_font() -> Option<PathBuf> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
    }

    #[test]
    fn rendered_slide_has_target_size_and_text() {
        let Some(font_path) = system_font() else {
            eprintln!("no system font found; skipping");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        solid(640, 480, 0).save(&src).unwrap();

        let settings = Settings {
            font_path,
            width: 360,
            height: 640,
            text_margin: 60,
            font_size: 32.0,
            ..Settings::default()
        };
        let renderer = SlideRenderer::from_settings(&settings).unwrap();
        let out = dir.path().join("slide.png");
        renderer.render(&src, "Be still and know", &out).unwrap();

        let img = image::open(&out).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (360, 640));
        assert!(img.pixels().any(|p| p.0[0] > 200), "expected white text pixels");
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
