use ab_glyph::FontVec;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::endpoint::ImagePrediction;
use crate::error::{DetectError, Result};
use crate::mapping::SymbolNames;
use crate::postprocess::{PixelRect, detections, passes, percent};
use crate::text::{blend_rect, draw_text, draw_text_centered, text_extent};

/// Width of the annotated figure; the height follows the image aspect.
pub const FIGURE_WIDTH: u32 = 1200;
const TITLE_LINE: u32 = 34;
const TITLE_PAD: u32 = 16;
const LABEL_SCALE: f32 = 14.0;
/// Gap between a label and the top edge of its box.
const LABEL_OFFSET: i32 = 10;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Figure size for an image, falling back to a square when either side is zero.
pub fn figure_size(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (FIGURE_WIDTH, FIGURE_WIDTH);
    }
    let h = (FIGURE_WIDTH as f64 * height as f64 / width as f64).round().max(1.0);
    (FIGURE_WIDTH, h as u32)
}

/// Title lines: the plotted count, then the source basename (if any) with the threshold.
pub fn detection_title(plotted: usize, image_uri: Option<&str>, threshold: f64) -> Vec<String> {
    let head = format!("Object Detection Results (Total Plotted: {plotted})");
    let conf = format!("(Conf >= {}%)", percent(threshold));
    match image_uri.filter(|u| !u.is_empty()) {
        Some(uri) => {
            let basename = uri.rsplit('/').next().unwrap_or(uri);
            vec![head, format!("({basename}) {conf}")]
        }
        None => vec![format!("{head} {conf}")],
    }
}

/// A box as it will be drawn, in source image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PlottedBox {
    pub label: String,
    pub rect: PixelRect,
}

/// Detections at or above `threshold`, denormalized against the image size.
pub fn boxes_to_plot(
    prediction: &ImagePrediction,
    image_width: u32,
    image_height: u32,
    threshold: f64,
    names: &SymbolNames,
) -> Result<Vec<PlottedBox>> {
    Ok(detections(prediction)?
        .into_iter()
        .filter(|d| passes(d.confidence, threshold))
        .map(|d| PlottedBox {
            label: format!("{}: {:.2}", names.label(d.class_id), d.confidence),
            rect: d.bbox.to_pixels(image_width, image_height),
        })
        .collect())
}

#[derive(Debug)]
pub struct AnnotatedImage {
    pub image: RgbaImage,
    pub plotted: usize,
}

/// Scales the source image to the figure size.
fn resize_rgba(src: &DynamicImage, width: u32, height: u32) -> Result<RgbaImage> {
    let src = DynamicImage::ImageRgba8(src.to_rgba8());
    let mut dst = Image::new(width, height, PixelType::U8x4);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new().resize(&src, &mut dst, Some(&options))?;
    RgbaImage::from_raw(width, height, dst.buffer().to_vec())
        .ok_or_else(|| DetectError::Io(std::io::Error::other("resized buffer has the wrong size")))
}

/// Draws every detection at or above `threshold` over the decoded image.
/// The figure is produced even when nothing passes the threshold.
pub fn draw_boxes(
    prediction: &ImagePrediction,
    image_bytes: &[u8],
    image_uri: Option<&str>,
    threshold: f64,
    names: &SymbolNames,
    font: Option<&FontVec>,
) -> Result<AnnotatedImage> {
    let original = image::load_from_memory(image_bytes)?;
    let (orig_w, orig_h) = (original.width(), original.height());
    let boxes = boxes_to_plot(prediction, orig_w, orig_h, threshold, names)?;

    let (fig_w, fig_h) = figure_size(orig_w, orig_h);
    let title = detection_title(boxes.len(), image_uri, threshold);
    let band = TITLE_PAD * 2 + TITLE_LINE * title.len() as u32;

    let mut canvas = RgbaImage::from_pixel(fig_w, fig_h + band, WHITE);
    if orig_w > 0 && orig_h > 0 {
        let resized = resize_rgba(&original, fig_w, fig_h)?;
        image::imageops::overlay(&mut canvas, &resized, 0, band as i64);
    }

    let sx = if orig_w > 0 { fig_w as f64 / orig_w as f64 } else { 0.0 };
    let sy = if orig_h > 0 { fig_h as f64 / orig_h as f64 } else { 0.0 };
    for b in &boxes {
        let left = (b.rect.x * sx).round() as i32;
        let top = (b.rect.y * sy).round() as i32 + band as i32;
        let width = (b.rect.width * sx).round().max(1.0) as u32;
        let height = (b.rect.height * sy).round().max(1.0) as u32;
        draw_hollow_rect_mut(&mut canvas, Rect::at(left, top).of_size(width, height), RED);

        if let Some(font) = font {
            let (tw, th) = text_extent(font, LABEL_SCALE, &b.label);
            let y = top - LABEL_OFFSET - th as i32;
            blend_rect(&mut canvas, left - 2, y - 2, tw + 4, th + 4, RED, 0.7);
            draw_text(&mut canvas, font, LABEL_SCALE, left, y, WHITE, &b.label);
        }
    }

    if let Some(font) = font {
        for (i, line) in title.iter().enumerate() {
            let y = (TITLE_PAD + TITLE_LINE * i as u32) as i32;
            draw_text_centered(&mut canvas, font, 24.0, (fig_w / 2) as i32, y, BLACK, line);
        }
    }

    Ok(AnnotatedImage {
        image: canvas,
        plotted: boxes.len(),
    })
}
