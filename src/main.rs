use anyhow::{Context, Result};
use clap::Parser;
use leakcluster::cli::{Cli, OutputFormat};
use leakcluster::{dataset, report, Experiment, ExperimentConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; warnings by default, everything with --debug
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    args.apply_overrides(&mut config);

    let path = args.dataset_path(&config);
    let data = dataset::load_dataset(&path).context("loading dataset")?;

    let experiment = Experiment::new(config, data).context("preparing experiment")?;
    let result = experiment.run().context("running experiment")?;

    match args.format {
        OutputFormat::Text => print!("{}", report::render_text(&result)),
        OutputFormat::Json => println!("{}", result.to_json()?),
    }

    Ok(())
}
