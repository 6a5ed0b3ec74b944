use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pid_symbols::text::find_font;
use pid_symbols::{Args, GcsStore, Predictor, Reporter, SymbolNames, VertexEndpoint};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut names = SymbolNames::builtin();
    if let Some(path) = &args.labels {
        names
            .extend_from_file(path)
            .with_context(|| format!("loading labels from {}", path.display()))?;
    }
    let font = find_font(args.font.as_deref()).context("loading font")?;
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let store = GcsStore::new(&args.storage_url, args.access_token.clone())?;
    let endpoint = VertexEndpoint::new(
        &args.project,
        &args.location,
        &args.endpoint,
        args.prediction_url.as_deref(),
        args.access_token.clone(),
    )?;
    let predictor = Predictor::new(store, endpoint);

    let Some(prediction) = predictor.predict(&args.source).context("prediction failed")? else {
        error!(
            "Prediction process failed. Image might not have been downloaded \
             or an early error occurred."
        );
        info!("Run finished");
        return Ok(());
    };

    let reporter = Reporter::new(names, font, &args.output);
    reporter
        .plot_symbol_counts(&prediction.response, Some(args.confidence))
        .context("plotting symbol counts")?;

    let image_uri = prediction.uri.to_string();
    if prediction.image_bytes.is_empty() {
        error!("Image bytes not available, cannot plot bounding boxes on image.");
    } else {
        reporter
            .plot_detections(
                &prediction.response,
                &prediction.image_bytes,
                Some(image_uri.as_str()),
                Some(args.confidence),
            )
            .context("plotting detections")?;
    }

    info!("Run finished");
    Ok(())
}
