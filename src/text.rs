use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::debug;

use crate::error::{DetectError, Result};

const FONT_FILES: [&str; 6] = [
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
    "Helvetica.ttc",
    "NotoSans-Regular.ttf",
];

const SYSTEM_FONT_DIRS: [&str; 8] = [
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/noto",
    "/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
    "C:\\Windows\\Fonts",
];

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .map_err(|e| DetectError::Font(format!("cannot read {}: {e}", path.display())))?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| DetectError::Font(format!("{} is not a usable font: {e}", path.display())))
}

/// An explicit `path` must load. Otherwise the first usable font from the
/// user and system font directories is taken, if any.
pub fn find_font(path: Option<&Path>) -> Result<Option<FontVec>> {
    if let Some(path) = path {
        return load_font(path).map(Some);
    }
    let mut font_dirs: Vec<PathBuf> = dirs::font_dir().into_iter().collect();
    font_dirs.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));

    for dir in &font_dirs {
        for name in FONT_FILES {
            let candidate = dir.join(name);
            if !candidate.is_file() {
                continue;
            }
            match load_font(&candidate) {
                Ok(font) => {
                    debug!("Using font {}", candidate.display());
                    return Ok(Some(font));
                }
                Err(e) => debug!("Skipping font: {e}"),
            }
        }
    }
    Ok(None)
}

pub fn text_extent(font: &FontVec, scale: f32, text: &str) -> (u32, u32) {
    text_size(PxScale::from(scale), font, text)
}

pub fn draw_text(
    canvas: &mut RgbaImage,
    font: &FontVec,
    scale: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    draw_text_mut(canvas, color, x, y, PxScale::from(scale), font, text);
}

/// Draws `text` horizontally centred on `center_x`, top at `y`.
pub fn draw_text_centered(
    canvas: &mut RgbaImage,
    font: &FontVec,
    scale: f32,
    center_x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    let (w, _) = text_extent(font, scale, text);
    draw_text(canvas, font, scale, center_x - w as i32 / 2, y, color, text);
}

/// Alpha-blends a solid colour over the part of the rectangle inside the canvas.
pub fn blend_rect(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    color: Rgba<u8>,
    alpha: f32,
) {
    let (cw, ch) = canvas.dimensions();
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = (x + w as i32).clamp(0, cw as i32) as u32;
    let y1 = (y + h as i32).clamp(0, ch as i32) as u32;
    for py in y0..y1 {
        for px in x0..x1 {
            blend_pixel(canvas.get_pixel_mut(px, py), color, alpha);
        }
    }
}

fn blend_pixel(pixel: &mut Rgba<u8>, color: Rgba<u8>, alpha: f32) {
    for c in 0..3 {
        let mixed = pixel[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha;
        pixel[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    pixel[3] = 255;
}

/// Draws `text` rotated counter-clockwise by `degrees` with the end of its
/// top edge pinned at (`anchor_x`, `anchor_y`), the way right-aligned tick
/// labels hang under an axis.
#[allow(clippy::too_many_arguments)]
pub fn draw_text_rotated(
    canvas: &mut RgbaImage,
    font: &FontVec,
    scale: f32,
    anchor_x: i32,
    anchor_y: i32,
    degrees: f32,
    color: Rgba<u8>,
    text: &str,
) {
    let (tw, th) = text_extent(font, scale, text);
    if tw == 0 || th == 0 {
        return;
    }
    // Glyph coverage, rendered upright.
    let mut mask = GrayImage::new(tw + 2, th + 2);
    draw_text_mut(&mut mask, Luma([255u8]), 1, 1, PxScale::from(scale), font, text);

    let (sin, cos) = degrees.to_radians().sin_cos();
    let right = (tw + 1) as f32;
    let corners = [(-right, 0.0), (0.0, 0.0), (-right, th as f32 + 2.0), (0.0, th as f32 + 2.0)];
    let rotated: Vec<(f32, f32)> = corners
        .iter()
        .map(|&(dx, dy)| (dx * cos + dy * sin, -dx * sin + dy * cos))
        .collect();
    let min_x = rotated.iter().map(|p| p.0).fold(f32::INFINITY, f32::min).floor() as i32;
    let max_x = rotated.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;
    let min_y = rotated.iter().map(|p| p.1).fold(f32::INFINITY, f32::min).floor() as i32;
    let max_y = rotated.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

    let (cw, ch) = canvas.dimensions();
    for oy in min_y..=max_y {
        for ox in min_x..=max_x {
            let (cx, cy) = (anchor_x + ox, anchor_y + oy);
            if cx < 0 || cy < 0 || cx >= cw as i32 || cy >= ch as i32 {
                continue;
            }
            // Inverse rotation back into mask space.
            let (fx, fy) = (ox as f32, oy as f32);
            let mx = (fx * cos - fy * sin + right).round();
            let my = (fx * sin + fy * cos).round();
            if mx < 0.0 || my < 0.0 || mx >= mask.width() as f32 || my >= mask.height() as f32 {
                continue;
            }
            let coverage = mask.get_pixel(mx as u32, my as u32)[0];
            if coverage > 0 {
                let alpha = coverage as f32 / 255.0;
                blend_pixel(canvas.get_pixel_mut(cx as u32, cy as u32), color, alpha);
            }
        }
    }
}
