// Ballon d'Or points linker entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Fetch rankings, then link and merge every configured year
// 4. Write per-year CSVs
// 5. Fit and report the optional points forecast
// 6. Write the run summary

use ballon_app::forecast;
use ballon_app::output::{self, Summary};
use ballon_app::sources::SourceFetcher;
use ballon_core::config;
use ballon_core::pipeline::{Pipeline, YearOutput};
use ballon_core::ratings::CsvRatingsLoader;

use anyhow::Context;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("ballon starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: years {:?}, tie-break {:?}, top {}",
        config.years, config.tie_break, config.top_n
    );

    // 3. Run the pipeline
    let fetcher = SourceFetcher::from_config(&config).context("failed to build ranking fetcher")?;
    let loader = CsvRatingsLoader;
    let pipeline = Pipeline::from_config(&config);
    let results = pipeline.run(&fetcher, &loader).await;

    // 4. Per-year outputs
    let mut completed: Vec<&YearOutput> = Vec::new();
    for result in &results {
        match result {
            Ok(out) => {
                output::write_year(&config.output_dir, out, config.positions)
                    .with_context(|| format!("failed to write output for year {}", out.year))?;
                println!(
                    "{}: linked {}/{} ranked players, {} rows with points",
                    out.year,
                    out.report.linked,
                    out.ranking.len(),
                    out.report.points_rows
                );
                completed.push(out);
            }
            Err(e) => {
                error!("{e}");
                eprintln!("{e}");
            }
        }
    }

    let mut summary = Summary::new(&results);

    // 5. Forecast
    if let Some(prediction) = &config.prediction {
        match forecast::forecast(prediction, &config, &pipeline, &completed, &loader) {
            Ok(result) => {
                if let Some(closest) = result.closest_reference() {
                    println!(
                        "Closest season to version {}: {} (distance {:.3})",
                        result.target_year, closest.year, closest.distance
                    );
                }
                println!("Expected points for version {}:", result.target_year);
                for (i, p) in result.predictions.iter().enumerate() {
                    println!("{:>3}. {:<40} {:>8.1}", i + 1, p.long_name, p.expected_points);
                }
                summary.forecast = Some(result);
            }
            Err(e) => warn!("forecast skipped: {e:#}"),
        }
    }

    // 6. Summary
    let path = output::write_summary(&config.output_dir, &summary)?;
    info!("summary written to {}", path.display());

    if completed.is_empty() {
        anyhow::bail!("no year completed; see {}", path.display());
    }

    info!("ballon finished");
    Ok(())
}

/// Initialize tracing to log to `logs/ballon.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("ballon.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ballon=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
