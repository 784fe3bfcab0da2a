//! Junction tables holding the one-to-many children of a parent row

use super::fragments::{in_clause, Dialect};
use super::ident::Ident;
use apim_core::errors::ApimError;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;

/// `(parent column, value column)` or `(parent column, key column, value column)` table
#[derive(Debug, Clone)]
pub struct ChildTable {
    table: Ident,
    parent_column: String,
    key_column: Option<String>,
    value_column: String,
}

impl ChildTable {
    /// Child rows holding a single value per row
    pub fn values(
        dialect: Dialect,
        table: &str,
        parent_column: &str,
        value_column: &str,
    ) -> Result<Self, ApimError> {
        Ok(Self {
            table: Ident::new(table)?,
            parent_column: escaped(dialect, parent_column)?,
            key_column: None,
            value_column: escaped(dialect, value_column)?,
        })
    }

    /// Child rows holding a key/value entry per row
    pub fn entries(
        dialect: Dialect,
        table: &str,
        parent_column: &str,
        key_column: &str,
        value_column: &str,
    ) -> Result<Self, ApimError> {
        Ok(Self {
            table: Ident::new(table)?,
            parent_column: escaped(dialect, parent_column)?,
            key_column: Some(escaped(dialect, key_column)?),
            value_column: escaped(dialect, value_column)?,
        })
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    pub fn delete_for(&self, conn: &Connection, parent_id: &str) -> rusqlite::Result<usize> {
        conn.execute(
            &format!("delete from {} where {} = ?", self.table, self.parent_column),
            [parent_id],
        )
    }

    /// Delete the children of many parents at once; nothing to do for none
    pub fn delete_for_all(&self, conn: &Connection, parent_ids: &[String]) -> rusqlite::Result<usize> {
        if parent_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "delete from {} where {} in ({})",
            self.table,
            self.parent_column,
            in_clause(parent_ids.len()).map_err(to_sql_error)?
        );
        conn.execute(&sql, params_from_iter(parent_ids))
    }

    /// Insert one row per value, skipping empty strings
    pub fn insert_values<'a>(
        &self,
        conn: &Connection,
        parent_id: &str,
        values: impl IntoIterator<Item = &'a String>,
    ) -> rusqlite::Result<()> {
        let sql = format!(
            "insert into {} ({}, {}) values (?, ?)",
            self.table, self.parent_column, self.value_column
        );
        let mut stmt = conn.prepare(&sql)?;
        for value in values.into_iter().filter(|v| !v.is_empty()) {
            stmt.execute([parent_id, value.as_str()])?;
        }
        Ok(())
    }

    /// Insert one row per entry, skipping empty keys
    pub fn insert_entries(
        &self,
        conn: &Connection,
        parent_id: &str,
        entries: &BTreeMap<String, String>,
    ) -> rusqlite::Result<()> {
        let key_column = self.key_column()?;
        let sql = format!(
            "insert into {} ({}, {}, {}) values (?, ?, ?)",
            self.table, self.parent_column, key_column, self.value_column
        );
        let mut stmt = conn.prepare(&sql)?;
        for (key, value) in entries.iter().filter(|(k, _)| !k.is_empty()) {
            stmt.execute([parent_id, key.as_str(), value.as_str()])?;
        }
        Ok(())
    }

    /// Delete-then-insert the values of one parent
    pub fn replace_values<'a>(
        &self,
        conn: &Connection,
        parent_id: &str,
        values: impl IntoIterator<Item = &'a String>,
    ) -> rusqlite::Result<()> {
        self.delete_for(conn, parent_id)?;
        self.insert_values(conn, parent_id, values)
    }

    pub fn replace_entries(
        &self,
        conn: &Connection,
        parent_id: &str,
        entries: &BTreeMap<String, String>,
    ) -> rusqlite::Result<()> {
        self.delete_for(conn, parent_id)?;
        self.insert_entries(conn, parent_id, entries)
    }

    /// Overwrite the values of keys the parent already has
    ///
    /// Keys the parent does not have are ignored. Returns the number of
    /// entries changed.
    pub fn update_entries(
        &self,
        conn: &Connection,
        parent_id: &str,
        entries: &BTreeMap<String, String>,
    ) -> rusqlite::Result<usize> {
        let key_column = self.key_column()?;
        let sql = format!(
            "update {} set {} = ? where {} = ? and {} = ?",
            self.table, self.value_column, self.parent_column, key_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut changed = 0;
        for (key, value) in entries {
            changed += stmt.execute([value.as_str(), parent_id, key.as_str()])?;
        }
        Ok(changed)
    }

    /// Values of one parent in storage order
    pub fn load_values(&self, conn: &Connection, parent_id: &str) -> rusqlite::Result<Vec<String>> {
        let sql = format!(
            "select {} from {} where {} = ?",
            self.value_column, self.table, self.parent_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([parent_id], |row| row.get::<_, Option<String>>(0))?;
        let mut values = Vec::new();
        for value in rows {
            if let Some(value) = value? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// `(parent id, value)` pairs for many parents with a single IN query
    pub fn load_values_for_all(
        &self,
        conn: &Connection,
        parent_ids: &[String],
    ) -> rusqlite::Result<Vec<(String, String)>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "select {}, {} from {} where {} in ({})",
            self.parent_column,
            self.value_column,
            self.table,
            self.parent_column,
            in_clause(parent_ids.len()).map_err(to_sql_error)?
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(parent_ids), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        let mut pairs = Vec::new();
        for pair in rows {
            if let (parent, Some(value)) = pair? {
                pairs.push((parent, value));
            }
        }
        Ok(pairs)
    }

    fn key_column(&self) -> rusqlite::Result<&str> {
        self.key_column
            .as_deref()
            .ok_or_else(|| rusqlite::Error::InvalidColumnName(format!("{}.<key>", self.table)))
    }
}

fn escaped(dialect: Dialect, column: &str) -> Result<String, ApimError> {
    let ident = Ident::new(column)?;
    Ok(dialect.escape_reserved_word(ident.as_str()))
}

fn to_sql_error(err: ApimError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}
