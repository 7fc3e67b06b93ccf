//! Deterministic table aliases.

/// Alias of the fact table.
pub const FACT_ALIAS: &str = "f";

/// Table → alias, in assignment order.
///
/// The fact table is always `f`; every other table gets the next free
/// letter (`a`, `b`, `c`, … skipping `f`) in the order it was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: Vec<(String, String)>,
}

impl AliasMap {
    pub fn assign<'t>(fact_table: &str, tables: impl IntoIterator<Item = &'t str>) -> Self {
        let mut map = Self {
            entries: vec![(fact_table.to_string(), FACT_ALIAS.to_string())],
        };
        let mut letters = ('a'..='z').filter(|c| *c != 'f');
        let mut overflow = 0usize;

        for table in tables {
            if map.get(table).is_some() {
                continue;
            }
            let alias = match letters.next() {
                Some(c) => c.to_string(),
                None => {
                    overflow += 1;
                    format!("t{}", overflow)
                }
            };
            map.entries.push((table.to_string(), alias));
        }
        map
    }

    pub fn get(&self, table: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, a)| a.as_str())
    }

    /// `(table, alias)` pairs, fact table first.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}
