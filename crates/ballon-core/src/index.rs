// Candidate index over one year's ratings table.

use std::collections::HashMap;

use crate::pattern::NamePattern;
use crate::ratings::{RatingsRow, RatingsTable};

/// Lookup of long names by pattern and of rows by long name. Borrows the
/// table it was built from, so it cannot outlive or observe a different
/// version of it.
#[derive(Debug)]
pub struct CandidateIndex<'a> {
    table: &'a RatingsTable,
    by_name: HashMap<&'a str, Vec<usize>>,
}

impl<'a> CandidateIndex<'a> {
    pub fn build(table: &'a RatingsTable) -> Self {
        let mut by_name: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (i, row) in table.rows.iter().enumerate() {
            by_name.entry(row.long_name.as_str()).or_default().push(i);
        }
        Self { table, by_name }
    }

    pub fn table(&self) -> &'a RatingsTable {
        self.table
    }

    /// Long names matching `pattern`, one entry per matching row, in table
    /// order. A player with duplicate rows appears more than once.
    pub fn matches(&self, pattern: &NamePattern) -> Vec<&'a str> {
        self.table
            .rows
            .iter()
            .map(|r| r.long_name.as_str())
            .filter(|name| pattern.is_match(name))
            .collect()
    }

    /// Row positions carrying `long_name`, in table order.
    pub fn row_indices(&self, long_name: &str) -> &[usize] {
        self.by_name.get(long_name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn rows_for(&self, long_name: &str) -> Vec<&'a RatingsRow> {
        self.row_indices(long_name)
            .iter()
            .map(|&i| &self.table.rows[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(names: &[(&str, u32)]) -> RatingsTable {
        let mut t = RatingsTable::new(vec![]);
        for (name, overall) in names {
            t.rows.push(RatingsRow {
                fifa_version: 22,
                long_name: name.to_string(),
                overall: *overall,
                player_positions: "ST".into(),
                extra: vec![],
                points: None,
            });
        }
        t
    }

    #[test]
    fn matches_in_table_order_with_duplicates() {
        let t = table(&[
            ("Cristiano Ronaldo dos Santos Aveiro", 91),
            ("Lionel Andrés Messi Cuccittini", 93),
            ("Ronaldo Luís Nazário de Lima", 80),
            ("Cristiano Ronaldo dos Santos Aveiro", 90),
        ]);
        let index = CandidateIndex::build(&t);
        let p = NamePattern::compile("Ronaldo").unwrap();
        assert_eq!(
            index.matches(&p),
            [
                "Cristiano Ronaldo dos Santos Aveiro",
                "Ronaldo Luís Nazário de Lima",
                "Cristiano Ronaldo dos Santos Aveiro",
            ]
        );
    }

    #[test]
    fn rows_for_returns_every_duplicate() {
        let t = table(&[
            ("Kylian Mbappé Lottin", 91),
            ("Karim Benzema", 89),
            ("Kylian Mbappé Lottin", 88),
        ]);
        let index = CandidateIndex::build(&t);
        let rows = index.rows_for("Kylian Mbappé Lottin");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].overall, 91);
        assert_eq!(rows[1].overall, 88);
        assert_eq!(index.row_indices("Kylian Mbappé Lottin"), [0, 2]);
        assert!(index.rows_for("Nobody").is_empty());
    }

    #[test]
    fn no_match_is_empty() {
        let t = table(&[("Karim Benzema", 89)]);
        let index = CandidateIndex::build(&t);
        assert!(index.matches(&NamePattern::compile("M. Salah").unwrap()).is_empty());
    }
}
