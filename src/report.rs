use std::path::PathBuf;

use ab_glyph::FontVec;
use tracing::{info, warn};

use crate::chart::{count_symbols, render_bar_chart};
use crate::endpoint::PredictionResponse;
use crate::error::Result;
use crate::helpers::draw_boxes;
use crate::mapping::SymbolNames;
use crate::postprocess::percent;

pub const BAR_CHART_FILE: &str = "symbol_counts_barchart.png";
pub const BOXES_FILE: &str = "detection_results_with_boxes.png";

/// Default threshold of the count chart when none is configured.
pub const DEFAULT_COUNT_THRESHOLD: f64 = 0.0;
/// Default threshold of the box figure when none is configured.
pub const DEFAULT_BOX_THRESHOLD: f64 = 0.5;

/// What a reporter did with the prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Written { path: PathBuf, plotted: usize },
    /// Nothing met the threshold and no file was written.
    Skipped,
}

/// Renders both diagnostic plots into `output_dir`, overwriting earlier runs.
pub struct Reporter {
    names: SymbolNames,
    font: Option<FontVec>,
    output_dir: PathBuf,
}

impl Reporter {
    pub fn new(names: SymbolNames, font: Option<FontVec>, output_dir: impl Into<PathBuf>) -> Self {
        if font.is_none() {
            warn!("No font available; plots will be written without text");
        }
        Self {
            names,
            font,
            output_dir: output_dir.into(),
        }
    }

    /// Bar chart of per-class counts. Skips the write when nothing passes `threshold`,
    /// which defaults to [`DEFAULT_COUNT_THRESHOLD`].
    pub fn plot_symbol_counts(
        &self,
        response: &PredictionResponse,
        threshold: Option<f64>,
    ) -> Result<ReportOutcome> {
        let threshold = threshold.unwrap_or(DEFAULT_COUNT_THRESHOLD);
        let counts = count_symbols(response.first()?, threshold, &self.names)?;
        if counts.is_empty() {
            info!(
                "No symbols found meeting confidence threshold >= {}% to plot counts.",
                percent(threshold)
            );
            return Ok(ReportOutcome::Skipped);
        }

        let total: usize = counts.iter().map(|c| c.count).sum();
        let chart = render_bar_chart(&counts, threshold, self.font.as_ref());
        let path = self.output_dir.join(BAR_CHART_FILE);
        chart.save(&path)?;
        info!("Symbol Count Bar Chart saved to {} ({total} symbols)", path.display());
        Ok(ReportOutcome::Written { path, plotted: total })
    }

    /// Source image with a box per detection. Always writes, even with zero boxes.
    /// `threshold` defaults to [`DEFAULT_BOX_THRESHOLD`].
    pub fn plot_detections(
        &self,
        response: &PredictionResponse,
        image_bytes: &[u8],
        image_uri: Option<&str>,
        threshold: Option<f64>,
    ) -> Result<ReportOutcome> {
        let threshold = threshold.unwrap_or(DEFAULT_BOX_THRESHOLD);
        let annotated = draw_boxes(
            response.first()?,
            image_bytes,
            image_uri,
            threshold,
            &self.names,
            self.font.as_ref(),
        )?;
        let path = self.output_dir.join(BOXES_FILE);
        annotated.image.save(&path)?;
        info!("Image with Bounding Boxes saved to {}", path.display());

        if annotated.plotted == 0 {
            info!("No objects plotted with confidence >= {}%.", percent(threshold));
        }
        Ok(ReportOutcome::Written {
            path,
            plotted: annotated.plotted,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, Rgba, RgbaImage};

    use super::*;
    use crate::chart::chart_title;
    use crate::endpoint::ImagePrediction;
    use crate::helpers::detection_title;

    fn response() -> PredictionResponse {
        PredictionResponse {
            predictions: vec![ImagePrediction {
                display_names: vec!["1".into(), "2".into(), "3".into(), "3".into()],
                confidences: vec![0.0, 0.49, 0.5, 0.9],
                bboxes: vec![vec![0.1, 0.4, 0.1, 0.4]; 4],
            }],
            deployed_model_id: None,
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255; 4])))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn count_chart_defaults_to_every_detection() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(SymbolNames::builtin(), None, dir.path());

        let outcome = reporter.plot_symbol_counts(&response(), None).unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::Written {
                path: dir.path().join(BAR_CHART_FILE),
                plotted: 4
            }
        );
        assert_eq!(chart_title(4, DEFAULT_COUNT_THRESHOLD)[1], "(Confidence >= 0%)");
    }

    #[test]
    fn box_figure_defaults_to_half_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(SymbolNames::builtin(), None, dir.path());

        let outcome = reporter
            .plot_detections(&response(), &png(40, 40), None, None)
            .unwrap();
        // 0.5 and 0.9 pass, 0.49 and 0.0 do not.
        assert_eq!(
            outcome,
            ReportOutcome::Written {
                path: dir.path().join(BOXES_FILE),
                plotted: 2
            }
        );
        assert_eq!(
            detection_title(2, None, DEFAULT_BOX_THRESHOLD),
            vec!["Object Detection Results (Total Plotted: 2) (Conf >= 50%)".to_string()]
        );
    }

    #[test]
    fn explicit_threshold_overrides_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(SymbolNames::builtin(), None, dir.path());
        let response = response();

        let counts = reporter.plot_symbol_counts(&response, Some(0.5)).unwrap();
        assert!(matches!(counts, ReportOutcome::Written { plotted: 2, .. }));
        let boxes = reporter
            .plot_detections(&response, &png(40, 40), None, Some(0.0))
            .unwrap();
        assert!(matches!(boxes, ReportOutcome::Written { plotted: 4, .. }));
    }
}
