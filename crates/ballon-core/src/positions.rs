// Position preparation: primary-position simplification, generic position
// buckets, and goalkeeper separation.

use serde::{Deserialize, Serialize};

use crate::ratings::RatingsTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GeneralPosition {
    #[serde(rename = "ATT")]
    Attacker,
    #[serde(rename = "MID")]
    Midfielder,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "GK")]
    Goalkeeper,
}

impl GeneralPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attacker => "ATT",
            Self::Midfielder => "MID",
            Self::Defender => "DEF",
            Self::Goalkeeper => "GK",
        }
    }
}

/// Bucket a single position code. Unknown codes return `None`.
pub fn general_position(position: &str) -> Option<GeneralPosition> {
    match position.trim() {
        "LW" | "RW" | "ST" | "CF" | "LF" | "RF" | "LM" | "RM" => Some(GeneralPosition::Attacker),
        "CM" | "CAM" | "CDM" => Some(GeneralPosition::Midfielder),
        "CB" | "LB" | "RB" | "LWB" | "RWB" => Some(GeneralPosition::Defender),
        "GK" => Some(GeneralPosition::Goalkeeper),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    /// Reduce `player_positions` to its first entry.
    pub single_position: bool,
    /// Write goalkeepers to their own table.
    pub split_goalkeepers: bool,
}

/// Reduce every row's `player_positions` to the first listed position.
pub fn single_position(table: &mut RatingsTable) {
    for row in &mut table.rows {
        let primary = row.primary_position().to_string();
        row.player_positions = primary;
    }
}

/// Partition into `(outfield, goalkeepers)` by primary position, keeping
/// row order within each part.
pub fn split_goalkeepers(table: RatingsTable) -> (RatingsTable, RatingsTable) {
    let (keepers, outfield): (Vec<_>, Vec<_>) = table
        .rows
        .into_iter()
        .partition(|r| r.primary_position() == "GK");
    (
        RatingsTable {
            columns: table.columns.clone(),
            rows: outfield,
        },
        RatingsTable {
            columns: table.columns,
            rows: keepers,
        },
    )
}
