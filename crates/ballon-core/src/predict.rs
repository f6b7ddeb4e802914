// Linear prediction of award points from player attributes.
//
// Ordinary least squares over the rows that carry points, solved through the
// normal equations. Feature counts are tiny (a handful of attributes), so the
// (k+1)x(k+1) system is solved directly with partial pivoting.

use serde::Serialize;
use tracing::{debug, warn};

use crate::ratings::{RatingsRow, RatingsTable};

const PIVOT_EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("need at least {needed} rows with points to fit, found {rows}")]
    NotEnoughRows { rows: usize, needed: usize },

    #[error("feature `{feature}` is not a column of the training data")]
    MissingFeature { feature: String },

    #[error("features are collinear; the fit has no unique solution")]
    Singular,
}

/// Fitted `points = intercept + sum(coefficient_i * feature_i)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearModel {
    pub features: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Number of rows the model was fitted on.
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub long_name: String,
    pub overall: u32,
    pub expected_points: f64,
}

/// Feature vector of `row`, or `None` if any value is missing.
fn features_of(table: &RatingsTable, row: &RatingsRow, features: &[String]) -> Option<Vec<f64>> {
    features.iter().map(|f| table.numeric(row, f)).collect()
}

/// Fit on every row with points across `tables`. Rows missing a feature
/// value are skipped.
pub fn fit(tables: &[&RatingsTable], features: &[String]) -> Result<LinearModel, ModelError> {
    for table in tables {
        if let Some(feature) = features.iter().find(|f| !table.has_column(f)) {
            return Err(ModelError::MissingFeature {
                feature: feature.clone(),
            });
        }
    }

    let k = features.len() + 1;
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut rows = 0;

    for table in tables {
        for row in table.linked_rows() {
            let Some(points) = row.points else { continue };
            let Some(values) = features_of(table, row, features) else {
                warn!("skipping '{}' in fit: missing feature value", row.long_name);
                continue;
            };
            let x: Vec<f64> = std::iter::once(1.0).chain(values).collect();
            for i in 0..k {
                xty[i] += x[i] * points;
                for j in 0..k {
                    xtx[i][j] += x[i] * x[j];
                }
            }
            rows += 1;
        }
    }

    if rows < k {
        return Err(ModelError::NotEnoughRows { rows, needed: k });
    }

    let beta = solve(xtx, xty).ok_or(ModelError::Singular)?;
    debug!(?beta, rows, "fitted linear model");

    Ok(LinearModel {
        features: features.to_vec(),
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
        rows,
    })
}

/// Gaussian elimination with partial pivoting. Returns `None` for singular
/// systems.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    // Pivots are judged against their column's original magnitude; wage
    // columns are many orders larger than rating columns.
    let scale: Vec<f64> = (0..n)
        .map(|c| a.iter().map(|r| r[c].abs()).fold(0.0, f64::max))
        .collect();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= PIVOT_EPSILON * scale[col] {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|c| a[row][c] * x[c]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

impl LinearModel {
    pub fn predict(&self, table: &RatingsTable, row: &RatingsRow) -> Option<f64> {
        let values = features_of(table, row, &self.features)?;
        Some(
            self.intercept
                + values
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(v, c)| v * c)
                    .sum::<f64>(),
        )
    }

    /// Top `top_n` rows of `table` by expected points, highest first. Rows
    /// missing a feature are left out; ties keep table order.
    pub fn rank(&self, table: &RatingsTable, top_n: usize) -> Vec<Prediction> {
        let mut predictions: Vec<Prediction> = table
            .rows
            .iter()
            .filter_map(|row| {
                self.predict(table, row).map(|expected_points| Prediction {
                    long_name: row.long_name.clone(),
                    overall: row.overall,
                    expected_points,
                })
            })
            .collect();
        predictions.sort_by(|a, b| b.expected_points.total_cmp(&a.expected_points));
        predictions.truncate(top_n);
        predictions
    }
}

/// Mean of `column` over the rows of `table` that have a numeric value.
fn column_mean(table: &RatingsTable, column: &str) -> Option<f64> {
    let (sum, n) = table
        .rows
        .iter()
        .filter_map(|row| table.numeric(row, column))
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Sum of squared differences between the per-feature means of `year` and
/// `target`. Features without a numeric value on either side are skipped.
/// Smaller means the season looks more like the target.
pub fn reference_distance(year: &RatingsTable, target: &RatingsTable, features: &[String]) -> f64 {
    features
        .iter()
        .filter_map(|f| Some((column_mean(year, f)?, column_mean(target, f)?)))
        .map(|(a, b)| (a - b).powi(2))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, u32, f64, Option<f64>)]) -> RatingsTable {
        RatingsTable {
            columns: vec!["age".into()],
            rows: rows
                .iter()
                .map(|(name, overall, age, points)| RatingsRow {
                    fifa_version: 19,
                    long_name: name.to_string(),
                    overall: *overall,
                    player_positions: "ST".into(),
                    extra: vec![age.to_string()],
                    points: *points,
                })
                .collect(),
        }
    }

    fn features() -> Vec<String> {
        vec!["overall".into(), "age".into()]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    // points = 10 + 5*overall - 2*age
    fn exact(overall: u32, age: f64) -> Option<f64> {
        Some(10.0 + 5.0 * f64::from(overall) - 2.0 * age)
    }

    #[test]
    fn recovers_exact_linear_relationship() {
        let t = table(&[
            ("A", 90, 30.0, exact(90, 30.0)),
            ("B", 85, 25.0, exact(85, 25.0)),
            ("C", 92, 33.0, exact(92, 33.0)),
            ("D", 88, 22.0, exact(88, 22.0)),
            ("E", 70, 19.0, None),
        ]);
        let model = fit(&[&t], &features()).unwrap();
        assert_eq!(model.rows, 4);
        assert!(close(model.intercept, 10.0));
        assert!(close(model.coefficients[0], 5.0));
        assert!(close(model.coefficients[1], -2.0));
    }

    #[test]
    fn fits_across_several_tables() {
        let a = table(&[("A", 90, 30.0, exact(90, 30.0)), ("B", 85, 25.0, exact(85, 25.0))]);
        let b = table(&[("C", 92, 33.0, exact(92, 33.0)), ("D", 88, 22.0, exact(88, 22.0))]);
        let model = fit(&[&a, &b], &features()).unwrap();
        assert_eq!(model.rows, 4);
        assert!(close(model.coefficients[0], 5.0));
    }

    #[test]
    fn too_few_rows_is_error() {
        let t = table(&[("A", 90, 30.0, Some(100.0)), ("B", 85, 25.0, Some(50.0))]);
        match fit(&[&t], &features()).unwrap_err() {
            ModelError::NotEnoughRows { rows, needed } => {
                assert_eq!(rows, 2);
                assert_eq!(needed, 3);
            }
            other => panic!("expected NotEnoughRows, got: {other}"),
        }
    }

    #[test]
    fn unknown_feature_is_error() {
        let t = table(&[("A", 90, 30.0, Some(100.0))]);
        let err = fit(&[&t], &["wage_eur".to_string()]).unwrap_err();
        assert!(matches!(err, ModelError::MissingFeature { feature } if feature == "wage_eur"));
    }

    #[test]
    fn collinear_features_are_singular() {
        // age is constant, indistinguishable from the intercept.
        let t = table(&[
            ("A", 90, 30.0, Some(300.0)),
            ("B", 85, 30.0, Some(200.0)),
            ("C", 80, 30.0, Some(100.0)),
            ("D", 95, 30.0, Some(400.0)),
        ]);
        assert!(matches!(fit(&[&t], &features()), Err(ModelError::Singular)));
    }

    #[test]
    fn rank_orders_by_expected_points() {
        let model = LinearModel {
            features: features(),
            intercept: 10.0,
            coefficients: vec![5.0, -2.0],
            rows: 4,
        };
        let t = table(&[
            ("Old", 90, 35.0, None),
            ("Young", 90, 21.0, None),
            ("Weak", 70, 21.0, None),
        ]);
        let ranked = model.rank(&t, 2);
        let names: Vec<_> = ranked.iter().map(|p| p.long_name.as_str()).collect();
        assert_eq!(names, ["Young", "Old"]);
        assert!(close(ranked[0].expected_points, 10.0 + 450.0 - 42.0));
    }

    #[test]
    fn rank_skips_rows_missing_features() {
        let model = LinearModel {
            features: features(),
            intercept: 0.0,
            coefficients: vec![1.0, 1.0],
            rows: 3,
        };
        let mut t = table(&[("A", 90, 30.0, None), ("B", 80, 20.0, None)]);
        t.rows[0].extra[0] = String::new();
        let ranked = model.rank(&t, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].long_name, "B");
    }

    // -- reference distance --

    #[test]
    fn reference_distance_sums_squared_mean_gaps() {
        // overall means 85 vs 88, age means 25 vs 29.
        let year = table(&[("A", 80, 20.0, None), ("B", 90, 30.0, None)]);
        let target = table(&[("C", 86, 27.0, None), ("D", 90, 31.0, None)]);
        assert!(close(reference_distance(&year, &target, &features()), 9.0 + 16.0));
        assert!(close(reference_distance(&target, &target, &features()), 0.0));
    }

    #[test]
    fn reference_distance_skips_features_without_values() {
        let year = table(&[("A", 80, 20.0, None)]);
        let mut target = table(&[("C", 84, 27.0, None)]);
        target.rows[0].extra[0] = String::new();
        let with_unknown = vec!["overall".to_string(), "age".to_string(), "wage_eur".to_string()];
        assert!(close(reference_distance(&year, &target, &with_unknown), 16.0));
    }
}
