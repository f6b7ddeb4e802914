// Points forecast for a season without award results, fitted on the seasons
// the pipeline completed.

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use ballon_core::config::{Config, PredictionConfig};
use ballon_core::pipeline::{Pipeline, YearOutput};
use ballon_core::predict::{fit, reference_distance, LinearModel, Prediction};
use ballon_core::ratings::{RatingsLoader, RatingsTable};

#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub target_year: u32,
    /// Years whose linked rows trained the model.
    pub trained_on: Vec<u32>,
    /// How far each training year's feature means sit from the target's.
    pub references: Vec<ReferenceYear>,
    pub model: LinearModel,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceYear {
    pub year: u32,
    pub distance: f64,
}

impl Forecast {
    /// Training year whose attribute means are closest to the target's.
    pub fn closest_reference(&self) -> Option<&ReferenceYear> {
        self.references
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

pub fn forecast<L>(
    prediction: &PredictionConfig,
    config: &Config,
    pipeline: &Pipeline,
    completed: &[&YearOutput],
    loader: &L,
) -> anyhow::Result<Forecast>
where
    L: RatingsLoader + ?Sized,
{
    let training: Vec<&YearOutput> = completed
        .iter()
        .copied()
        .filter(|out| out.year != prediction.target_year)
        .collect();
    let tables: Vec<&RatingsTable> = training.iter().map(|out| &out.table).collect();
    let model = fit(&tables, &prediction.features).context("failed to fit points model")?;
    info!(
        "fitted points model on {} rows from {} years",
        model.rows,
        training.len()
    );

    let path = config.ratings_paths.get(&prediction.target_year).with_context(|| {
        format!("no ratings path for target year {}", prediction.target_year)
    })?;
    let raw = loader
        .load(path)
        .with_context(|| format!("failed to load ratings for year {}", prediction.target_year))?;
    let target = pipeline.prepare_table(prediction.target_year, &raw);

    let references: Vec<ReferenceYear> = training
        .iter()
        .map(|out| ReferenceYear {
            year: out.year,
            distance: reference_distance(&out.table, &target, &prediction.features),
        })
        .collect();
    for r in &references {
        debug!("year {} distance to {}: {:.3}", r.year, prediction.target_year, r.distance);
    }

    let predictions = model.rank(&target, prediction.top_n);
    Ok(Forecast {
        target_year: prediction.target_year,
        trained_on: training.iter().map(|out| out.year).collect(),
        references,
        model,
        predictions,
    })
}
