use ab_glyph::FontVec;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::endpoint::ImagePrediction;
use crate::error::Result;
use crate::mapping::SymbolNames;
use crate::postprocess::{count_by_class, passes, percent, scored_labels};
use crate::text::{blend_rect, draw_text, draw_text_centered, draw_text_rotated, text_extent};

pub const CHART_WIDTH: u32 = 2000;
pub const CHART_HEIGHT: u32 = 1500;

const MARGIN_LEFT: u32 = 130;
const MARGIN_RIGHT: u32 = 60;
const MARGIN_TOP: u32 = 150;
const MARGIN_BOTTOM: u32 = 360;

/// Fraction of each category slot covered by its bar.
const BAR_WIDTH: f64 = 0.8;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const BAR_COLOR: Rgba<u8> = Rgba([0x42, 0x85, 0xF4, 255]);
const GRID_COLOR: Rgba<u8> = Rgba([0xB0, 0xB0, 0xB0, 255]);

/// One bar: a class ID, its display label and how often it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCount {
    pub class_id: String,
    pub label: String,
    pub count: usize,
}

/// Counts the detections at or above `threshold` per class, in numeric class order.
pub fn count_symbols(
    prediction: &ImagePrediction,
    threshold: f64,
    names: &SymbolNames,
) -> Result<Vec<SymbolCount>> {
    let kept = scored_labels(prediction)?
        .into_iter()
        .filter(|&(_, confidence)| passes(confidence, threshold))
        .map(|(class_id, _)| class_id);

    Ok(count_by_class(kept)
        .into_iter()
        .map(|(class_id, count)| SymbolCount {
            label: names.label(&class_id).to_string(),
            class_id,
            count,
        })
        .collect())
}

/// `0, step, 2*step, ...` up to `max_count + 1`, with `step = max(1, max_count / 10)`.
pub fn y_ticks(max_count: usize) -> Vec<usize> {
    let step = (max_count / 10).max(1);
    (0..max_count + 2).step_by(step).collect()
}

pub fn chart_title(total: usize, threshold: f64) -> [String; 2] {
    [
        format!("Detected P&ID Symbol Counts (Total: {total})"),
        format!("(Confidence >= {}%)", percent(threshold)),
    ]
}

/// Bar in chart pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ChartLayout {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub y_top: f64,
    pub ticks: Vec<usize>,
    pub bars: Vec<Bar>,
}

impl ChartLayout {
    pub fn new(counts: &[SymbolCount]) -> Self {
        let max_count = counts.iter().map(|c| c.count).max().unwrap_or(0);
        let mut layout = Self {
            left: MARGIN_LEFT as i32,
            top: MARGIN_TOP as i32,
            width: CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
            height: CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
            y_top: (max_count + 1) as f64,
            ticks: y_ticks(max_count),
            bars: Vec::with_capacity(counts.len()),
        };

        let slot = layout.width as f64 / counts.len().max(1) as f64;
        let bar_width = (slot * BAR_WIDTH).round().max(1.0);
        for (i, c) in counts.iter().enumerate() {
            let center = layout.left as f64 + slot * (i as f64 + 0.5);
            let y = layout.y_to_px(c.count as f64);
            layout.bars.push(Bar {
                x: (center - bar_width / 2.0).round() as i32,
                y,
                width: bar_width as u32,
                height: (layout.bottom() - y).max(1) as u32,
            });
        }
        layout
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }

    pub fn y_to_px(&self, value: f64) -> i32 {
        let frac = (value / self.y_top).clamp(0.0, 1.0);
        self.bottom() - (frac * self.height as f64).round() as i32
    }
}

/// Draws the bar chart. Without a font only the geometry is drawn.
pub fn render_bar_chart(
    counts: &[SymbolCount],
    threshold: f64,
    font: Option<&FontVec>,
) -> RgbaImage {
    let layout = ChartLayout::new(counts);
    let mut canvas = RgbaImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let right = layout.left + layout.width as i32;

    // Dashed horizontal grid, behind the bars.
    for &tick in &layout.ticks {
        let y = layout.y_to_px(tick as f64);
        let mut x = layout.left;
        while x < right {
            blend_rect(&mut canvas, x, y, 8u32.min((right - x) as u32), 1, GRID_COLOR, 0.7);
            x += 14;
        }
    }

    for bar in &layout.bars {
        let rect = Rect::at(bar.x, bar.y).of_size(bar.width, bar.height);
        draw_filled_rect_mut(&mut canvas, rect, BAR_COLOR);
        draw_hollow_rect_mut(&mut canvas, rect, BLACK);
    }

    let frame = Rect::at(layout.left, layout.top).of_size(layout.width, layout.height);
    draw_hollow_rect_mut(&mut canvas, frame, BLACK);
    for &tick in &layout.ticks {
        let y = layout.y_to_px(tick as f64) as f32;
        let left = layout.left as f32;
        draw_line_segment_mut(&mut canvas, (left - 6.0, y), (left, y), BLACK);
    }
    for bar in &layout.bars {
        let x = (bar.x + bar.width as i32 / 2) as f32;
        let y = layout.bottom() as f32;
        draw_line_segment_mut(&mut canvas, (x, y), (x, y + 6.0), BLACK);
    }

    let Some(font) = font else {
        return canvas;
    };

    let total: usize = counts.iter().map(|c| c.count).sum();
    let [line1, line2] = chart_title(total, threshold);
    let center = (CHART_WIDTH / 2) as i32;
    draw_text_centered(&mut canvas, font, 30.0, center, 40, BLACK, &line1);
    draw_text_centered(&mut canvas, font, 30.0, center, 80, BLACK, &line2);

    for &tick in &layout.ticks {
        let label = tick.to_string();
        let (w, h) = text_extent(font, 18.0, &label);
        let y = layout.y_to_px(tick as f64) - h as i32 / 2;
        draw_text(&mut canvas, font, 18.0, layout.left - 10 - w as i32, y, BLACK, &label);
    }

    for (bar, c) in layout.bars.iter().zip(counts) {
        let x = bar.x + bar.width as i32 / 2;
        draw_text_rotated(&mut canvas, font, 18.0, x, layout.bottom() + 10, 45.0, BLACK, &c.label);

        let count = c.count.to_string();
        let (_, h) = text_extent(font, 18.0, &count);
        let y = layout.y_to_px(c.count as f64 + 0.05) - h as i32 - 2;
        draw_text_centered(&mut canvas, font, 18.0, x, y, BLACK, &count);
    }

    let x_title = "Symbol Type";
    let (_, h) = text_extent(font, 22.0, x_title);
    draw_text_centered(
        &mut canvas,
        font,
        22.0,
        layout.left + layout.width as i32 / 2,
        CHART_HEIGHT as i32 - h as i32 - 20,
        BLACK,
        x_title,
    );
    let y_title = "Count";
    let (w, _) = text_extent(font, 22.0, y_title);
    let mid = layout.top + layout.height as i32 / 2;
    draw_text_rotated(&mut canvas, font, 22.0, 30, mid - w as i32 / 2, 90.0, BLACK, y_title);

    canvas
}
