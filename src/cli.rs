use std::path::PathBuf;

use clap::Parser;

use crate::storage::DEFAULT_STORAGE_URL;

#[derive(Parser, Clone, Debug)]
#[command(
    author,
    version,
    about = "Counts and outlines P&ID symbols found by a hosted detection endpoint",
    long_about = None
)]
pub struct Args {
    /// Cloud project that owns the endpoint
    #[arg(long, env = "PID_PROJECT")]
    pub project: String,

    /// Region of the endpoint
    #[arg(long, env = "PID_LOCATION", default_value = "us-central1")]
    pub location: String,

    /// Endpoint ID
    #[arg(long, env = "PID_ENDPOINT")]
    pub endpoint: String,

    /// Drawing to analyse, as gs://bucket/object
    #[arg(long, env = "PID_SOURCE")]
    pub source: String,

    /// Minimum confidence for a detection to be counted and drawn
    #[arg(long, env = "PID_CONFIDENCE", default_value_t = 0.6, value_parser = parse_confidence)]
    pub confidence: f64,

    /// Directory for the bar chart and the annotated image
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    /// OAuth bearer token for the storage and prediction APIs
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Label file overriding the built-in symbol names
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// TTF/OTF font for plot text; searched for when absent
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Base URL of the storage API
    #[arg(long, default_value_t = String::from(DEFAULT_STORAGE_URL))]
    pub storage_url: String,

    /// Base URL of the prediction API; regional default when absent
    #[arg(long)]
    pub prediction_url: Option<String>,
}

fn parse_confidence(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside [0, 1]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "pid-symbols",
        "--project",
        "plant",
        "--endpoint",
        "123",
        "--source",
        "gs://drawings/sheet.png",
    ];

    #[test]
    fn defaults_match_the_reference_run() {
        let args = Args::try_parse_from(REQUIRED).unwrap();
        assert_eq!(args.location, "us-central1");
        assert_eq!(args.confidence, 0.6);
        assert_eq!(args.output, PathBuf::from("."));
        assert_eq!(args.storage_url, DEFAULT_STORAGE_URL);
        assert!(args.prediction_url.is_none());
    }

    #[test]
    fn confidence_must_be_a_probability() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--confidence", "1.5"]);
        assert!(Args::try_parse_from(&argv).is_err());

        let mut argv = REQUIRED.to_vec();
        argv.extend(["--confidence", "0.25"]);
        assert_eq!(Args::try_parse_from(&argv).unwrap().confidence, 0.25);
    }
}
