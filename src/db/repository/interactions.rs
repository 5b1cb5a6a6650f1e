use rusqlite::Connection;

use crate::db::DatabaseError;
use crate::engine::medication::{DdiRule, InteractionTable};

/// Load the drug interaction reference into an in-memory table. Called once
/// at process start; the engine never reads the table from the database on
/// the request path.
pub fn load_interaction_table(conn: &Connection) -> Result<InteractionTable, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT drug_a, drug_b, severity, message FROM drug_interactions")?;
    let rows = stmt.query_map([], |row| {
        let severity: String = row.get(2)?;
        Ok(DdiRule {
            drug_a: row.get(0)?,
            drug_b: row.get(1)?,
            severity: severity.parse().map_err(|e| super::conversion_err(2, e))?,
            message: row.get(3)?,
        })
    })?;
    let rules = rows.collect::<Result<Vec<_>, _>>()?;
    tracing::info!(pairs = rules.len(), "drug interaction table loaded");
    Ok(InteractionTable::from_rows(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn seeded_table_loads() {
        let conn = open_memory_database().unwrap();
        let table = load_interaction_table(&conn).unwrap();
        assert_eq!(table.len(), 11);
    }
}
