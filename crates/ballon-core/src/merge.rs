// Points merger: transplants ranking points onto linked ratings rows.
//
// This is an update, never a filter. The output has the same rows in the
// same order as the input; only `points` changes, and only on rows reached
// through a link.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::index::CandidateIndex;
use crate::link::{LinkResult, TieBreak};
use crate::ranking::RankingRow;
use crate::ratings::RatingsTable;

/// Return a copy of `table` with points set on the row each linked ranking
/// entry resolves to.
///
/// When a long name has several rows, `policy` picks one: the
/// highest-`overall` row under [`TieBreak::HighestOverall`], the first row
/// otherwise. Points are assigned, not accumulated, so merging the same
/// link result again yields the same table.
pub fn merge(
    table: &RatingsTable,
    link: &LinkResult,
    ranking: &[RankingRow],
    policy: TieBreak,
) -> RatingsTable {
    let points_by_name: HashMap<&str, f64> = ranking
        .iter()
        .rev()
        .map(|r| (r.player.as_str(), r.points))
        .collect();

    let mut targets: Vec<(usize, f64)> = Vec::new();
    {
        let index = CandidateIndex::build(table);
        for (short_name, long_name) in link.links() {
            let Some(&points) = points_by_name.get(short_name) else {
                warn!("linked name {short_name:?} has no ranking entry");
                continue;
            };
            let Some(row) = target_row(&index, long_name, policy) else {
                warn!("linked long name {long_name:?} not present in table");
                continue;
            };
            debug!("{short_name:?} -> row {row} ({long_name}) = {points}");
            targets.push((row, points));
        }
    }

    let mut merged = table.clone();
    for (row, points) in targets {
        merged.rows[row].points = Some(points);
    }
    merged
}

fn target_row(index: &CandidateIndex<'_>, long_name: &str, policy: TieBreak) -> Option<usize> {
    let rows = index.row_indices(long_name);
    if rows.len() > 1 {
        debug!("{long_name:?} has {} rows", rows.len());
    }
    match policy {
        TieBreak::HighestOverall => {
            let table = index.table();
            let mut best: Option<usize> = None;
            for &i in rows {
                if best.map_or(true, |b| table.rows[i].overall > table.rows[b].overall) {
                    best = Some(i);
                }
            }
            best
        }
        TieBreak::FirstRow | TieBreak::WordStarts | TieBreak::Strict => rows.first().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::link;
    use crate::pattern::PatternCache;
    use crate::ratings::RatingsRow;

    fn row(name: &str, overall: u32) -> RatingsRow {
        RatingsRow {
            fifa_version: 22,
            long_name: name.into(),
            overall,
            player_positions: "ST".into(),
            extra: vec![],
            points: None,
        }
    }

    fn entry(rank: u32, player: &str, points: f64) -> RankingRow {
        RankingRow {
            rank,
            player: player.into(),
            club: String::new(),
            points,
        }
    }

    fn sample_table() -> RatingsTable {
        RatingsTable {
            columns: vec![],
            rows: vec![
                row("Cristiano Ronaldo dos Santos Aveiro", 91),
                row("Virgil van Dijk", 89),
                row("Lionel Andrés Messi Cuccittini", 93),
                row("Jan Oblak", 91),
            ],
        }
    }

    fn sample_ranking() -> Vec<RankingRow> {
        vec![
            entry(1, "L. Messi", 613.0),
            entry(2, "R. Lewandowski", 580.0),
            entry(3, "Jorginho", 460.0),
            entry(6, "C. Ronaldo", 178.0),
        ]
    }

    fn linked(table: &RatingsTable, ranking: &[RankingRow]) -> LinkResult {
        let mut cache = PatternCache::new();
        cache.warm(ranking.iter().map(|r| r.player.as_str()));
        link(ranking, &CandidateIndex::build(table), &cache, TieBreak::FirstRow).unwrap()
    }

    #[test]
    fn points_land_on_linked_rows_only() {
        let table = sample_table();
        let ranking = sample_ranking();
        let merged = merge(&table, &linked(&table, &ranking), &ranking, TieBreak::FirstRow);

        let points: Vec<_> = merged.rows.iter().map(|r| r.points).collect();
        assert_eq!(points, [Some(178.0), None, Some(613.0), None]);
    }

    #[test]
    fn row_count_and_order_preserved() {
        let table = sample_table();
        let ranking = sample_ranking();
        let merged = merge(&table, &linked(&table, &ranking), &ranking, TieBreak::FirstRow);

        assert_eq!(merged.len(), table.len());
        for (a, b) in merged.rows.iter().zip(&table.rows) {
            assert_eq!(a.long_name, b.long_name);
            assert_eq!(a.extra, b.extra);
        }
    }

    #[test]
    fn empty_link_result_changes_nothing() {
        let table = sample_table();
        let merged = merge(&table, &LinkResult::default(), &sample_ranking(), TieBreak::FirstRow);
        assert_eq!(merged, table);
    }

    #[test]
    fn merge_is_idempotent() {
        let table = sample_table();
        let ranking = sample_ranking();
        let link = linked(&table, &ranking);

        let once = merge(&table, &link, &ranking, TieBreak::FirstRow);
        let twice = merge(&once, &link, &ranking, TieBreak::FirstRow);
        assert_eq!(once, twice);
    }

    #[test]
    fn zero_points_are_kept_distinct_from_absent() {
        let table = sample_table();
        let ranking = vec![entry(10, "J. Oblak", 0.0)];
        let merged = merge(&table, &linked(&table, &ranking), &ranking, TieBreak::FirstRow);
        assert_eq!(merged.rows[3].points, Some(0.0));
        assert_eq!(merged.rows[1].points, None);
    }

    #[test]
    fn duplicate_rows_use_first_by_default() {
        let table = RatingsTable {
            columns: vec![],
            rows: vec![
                row("Karim Benzema", 87),
                row("Karim Benzema", 89),
            ],
        };
        let ranking = vec![entry(1, "K. Benzema", 549.0)];
        let link = linked(&table, &ranking);

        let first = merge(&table, &link, &ranking, TieBreak::FirstRow);
        assert_eq!(first.rows[0].points, Some(549.0));
        assert_eq!(first.rows[1].points, None);

        let best = merge(&table, &link, &ranking, TieBreak::HighestOverall);
        assert_eq!(best.rows[0].points, None);
        assert_eq!(best.rows[1].points, Some(549.0));
    }

    #[test]
    fn link_to_foreign_long_name_is_ignored() {
        let table = sample_table();
        let other = RatingsTable {
            columns: vec![],
            rows: vec![row("Mohamed Salah Ghaly", 90)],
        };
        let ranking = vec![entry(5, "M. Salah", 178.0)];
        let link = linked(&other, &ranking);

        let merged = merge(&table, &link, &ranking, TieBreak::FirstRow);
        assert_eq!(merged, table);
    }
}
