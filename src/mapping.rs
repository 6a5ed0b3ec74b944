use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{DetectError, Result};

/// Display names of the P&ID symbol classes the endpoint was trained on.
pub const SYMBOL_NAMES: [(&str, &str); 32] = [
    ("1", "Gate Valve"),
    ("2", "Cross Ball Valve"),
    ("3", "Globe Valve"),
    ("4", "Valve"),
    ("5", "Ball Valve"),
    ("6", "Butterfly Valve"),
    ("7", "Plug Valve"),
    ("8", "Diode"),
    ("9", "Diaphragm Valve"),
    ("10", "Needle Valve"),
    ("11", "Closed Gate Valve"),
    ("12", "Normally Closed Gate Valve"),
    ("13", "Normally Closed Ball Valve"),
    ("14", "Control Valve"),
    ("15", "Rotary Valve"),
    ("16", "Closed Rotary Valve"),
    ("17", "Spacer Ring"),
    ("18", "Closed Spectacle Blind"),
    ("19", "Open Spectacle Blind"),
    ("20", "Concentric Reducer"),
    ("21", "Flanged Connection"),
    ("22", "Filter"),
    ("23", "Heat Exchanger"),
    ("24", "Flow Direction"),
    ("25", "Circle Valve"),
    ("26", "GRI-808"),
    ("27", "R0-10-871"),
    ("28", "SDL-973"),
    ("29", "DDL-686"),
    ("30", "STA"),
    ("31", "ZL0-946"),
    ("32", "121-LG-10-190"),
];

/// Class-ID to label lookup shared by both reporters.
#[derive(Debug, Clone)]
pub struct SymbolNames {
    names: HashMap<String, String>,
}

impl SymbolNames {
    pub fn builtin() -> Self {
        let names = SYMBOL_NAMES
            .iter()
            .map(|&(id, name)| (id.to_string(), name.to_string()))
            .collect();
        Self { names }
    }

    /// Label for `id`; unknown IDs come back verbatim.
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.names.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Overlays the entries of a label file on top of the current table.
    pub fn extend_from_file(&mut self, file_path: &Path) -> Result<()> {
        let file = File::open(file_path).map_err(|e| {
            DetectError::Labels(format!("cannot open {}: {e}", file_path.display()))
        })?;
        let reader = BufReader::new(file);
        let mut lines = Vec::new();
        for line in reader.lines() {
            lines.push(line?);
        }
        self.names.extend(parse_class_mapping(&lines));
        Ok(())
    }
}

/// Parses label lines. `id<TAB>name` and `id=name` lines carry their own ID,
/// any other non-blank line on row N (1-based) names class N.
pub fn parse_class_mapping<S: AsRef<str>>(lines: &[S]) -> HashMap<String, String> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(row, line)| {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            match line.split_once('\t').or_else(|| line.split_once('=')) {
                Some((id, name)) if !id.trim().is_empty() => {
                    Some((id.trim().to_string(), name.trim().to_string()))
                }
                _ => Some(((row + 1).to_string(), line.to_string())),
            }
        })
        .collect()
}
