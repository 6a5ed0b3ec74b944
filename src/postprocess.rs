use std::cmp::Ordering;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::endpoint::ImagePrediction;
use crate::error::{DetectError, Result};

/// Normalized box in the endpoint's `[xmin, xmax, ymin, ymax]` layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// Box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        match *coords {
            [xmin, xmax, ymin, ymax] => Some(Self {
                xmin,
                xmax,
                ymin,
                ymax,
            }),
            _ => None,
        }
    }

    /// Scales the x pair by `width` and the y pair by `height`.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let (w, h) = (width as f64, height as f64);
        let (x0, x1) = (self.xmin * w, self.xmax * w);
        let (y0, y1) = (self.ymin * h, self.ymax * h);
        PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// Index `i` across the parallel sequences of one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<'a> {
    pub class_id: &'a str,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Pairs each class ID with its confidence. Bounding boxes are not needed.
pub fn scored_labels(prediction: &ImagePrediction) -> Result<Vec<(&str, f64)>> {
    check_len("confidences", prediction.confidences.len(), prediction.display_names.len())?;
    Ok(prediction
        .display_names
        .iter()
        .map(String::as_str)
        .zip(prediction.confidences.iter().copied())
        .collect())
}

/// Zips all three sequences into detections.
pub fn detections(prediction: &ImagePrediction) -> Result<Vec<Detection<'_>>> {
    let expected = prediction.display_names.len();
    check_len("confidences", prediction.confidences.len(), expected)?;
    check_len("bboxes", prediction.bboxes.len(), expected)?;

    prediction
        .display_names
        .iter()
        .zip(&prediction.confidences)
        .zip(&prediction.bboxes)
        .enumerate()
        .map(|(i, ((class_id, &confidence), coords))| {
            let Some(bbox) = BoundingBox::from_slice(coords) else {
                return Err(DetectError::MalformedPrediction(format!(
                    "bbox {i} has {} coordinates, expected 4",
                    coords.len()
                )));
            };
            Ok(Detection {
                class_id: class_id.as_str(),
                confidence,
                bbox,
            })
        })
        .collect()
}

fn check_len(field: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(DetectError::MalformedPrediction(format!(
            "{field} has {found} entries but displayNames has {expected}"
        )));
    }
    Ok(())
}

/// Inclusive threshold: a score equal to `threshold` passes.
pub fn passes(confidence: f64, threshold: f64) -> bool {
    confidence >= threshold
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ClassKey<'a> {
    Numeric(OrderedFloat<f64>),
    Text(&'a str),
}

fn class_key(id: &str) -> ClassKey<'_> {
    match id.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => ClassKey::Numeric(OrderedFloat(v)),
        _ => ClassKey::Text(id),
    }
}

/// Numeric IDs ascending by value, then any non-numeric IDs lexicographically.
pub fn compare_class_ids(a: &str, b: &str) -> Ordering {
    class_key(a).cmp(&class_key(b)).then_with(|| a.cmp(b))
}

/// Occurrences per class ID (exact string match), ordered by `compare_class_ids`.
pub fn count_by_class<'a, I>(class_ids: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in class_ids {
        *counts.entry(id).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(id, n)| (id.to_string(), n))
        .collect();
    counts.sort_by(|a, b| compare_class_ids(&a.0, &b.0));
    counts
}

/// `0.6` -> `"60"`, as shown in plot titles and log lines.
pub fn percent(threshold: f64) -> String {
    format!("{:.0}", threshold * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(names: &[&str], confidences: &[f64]) -> ImagePrediction {
        ImagePrediction {
            display_names: names.iter().map(|s| s.to_string()).collect(),
            confidences: confidences.to_vec(),
            bboxes: names.iter().map(|_| vec![0.0, 1.0, 0.0, 1.0]).collect(),
        }
    }

    #[test]
    fn box_layout_is_x_pair_then_y_pair() {
        let bbox = BoundingBox::from_slice(&[0.1, 0.5, 0.2, 0.8]).unwrap();
        let rect = bbox.to_pixels(200, 100);
        assert!((rect.x - 20.0).abs() < 1e-9);
        assert!((rect.width - 80.0).abs() < 1e-9);
        assert!((rect.y - 20.0).abs() < 1e-9);
        assert!((rect.height - 60.0).abs() < 1e-9);
    }

    #[test]
    fn box_needs_four_coordinates() {
        assert!(BoundingBox::from_slice(&[0.1, 0.2, 0.3]).is_none());
        let mut p = prediction(&["1"], &[0.9]);
        p.bboxes[0].push(1.0);
        assert!(matches!(detections(&p), Err(DetectError::MalformedPrediction(_))));
    }

    #[test]
    fn threshold_filter_is_inclusive() {
        let p = prediction(&["a", "b", "c"], &[0.9, 0.4, 0.6]);
        let kept: Vec<_> = scored_labels(&p)
            .unwrap()
            .into_iter()
            .filter(|&(_, c)| passes(c, 0.5))
            .map(|(id, _)| id)
            .collect();
        assert_eq!(kept, vec!["a", "c"]);
        assert!(passes(0.5, 0.5));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut p = prediction(&["1", "2"], &[0.9, 0.4]);
        p.confidences.pop();
        assert!(matches!(scored_labels(&p), Err(DetectError::MalformedPrediction(_))));
        assert!(matches!(detections(&p), Err(DetectError::MalformedPrediction(_))));
    }

    #[test]
    fn counts_sort_numerically() {
        let counts = count_by_class(["2", "10", "1"]);
        let ids: Vec<_> = counts.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
    }

    #[test]
    fn counts_ignore_frequency_when_ordering() {
        let counts = count_by_class(["10", "10", "10", "3", "x", "3"]);
        assert_eq!(
            counts,
            vec![
                ("3".to_string(), 2),
                ("10".to_string(), 3),
                ("x".to_string(), 1)
            ]
        );
    }

    #[test]
    fn percent_rounds_to_whole_number() {
        assert_eq!(percent(0.6), "60");
        assert_eq!(percent(0.0), "0");
        assert_eq!(percent(0.557), "56");
    }
}
