//! Descriptor-driven table mapper
//!
//! Builds the CRUD statements of one table from its column descriptors and
//! maps result rows back onto records.

use super::collate::collate_rows;
use super::column::{Column, SqlType};
use super::fragments::{in_clause, to_snake_case, Dialect};
use super::ident::Ident;
use apim_core::errors::ApimError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;

/// Immutable mapping of a record type onto one table
#[derive(Debug)]
pub struct TableMapper<T> {
    table: Ident,
    id_column: Ident,
    dialect: Dialect,
    columns: Vec<Column<T>>,
}

pub struct TableMapperBuilder<T> {
    table: String,
    id_column: String,
    dialect: Dialect,
    columns: Vec<Column<T>>,
}

impl<T> TableMapperBuilder<T> {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn column(mut self, column: Column<T>) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column<T>>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Validate identifiers and freeze the mapping
    pub fn build(self) -> Result<TableMapper<T>, ApimError> {
        let table = Ident::new(self.table)?;
        let id_column = Ident::new(self.id_column)?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            Ident::new(column.name)?;
            if !seen.insert(column.name) {
                return Err(ApimError::DuplicateColumn {
                    column: column.name.to_string(),
                    table: table.to_string(),
                });
            }
        }
        if !seen.contains(id_column.as_str()) {
            return Err(ApimError::MissingIdColumn {
                column: id_column.to_string(),
                table: table.to_string(),
            });
        }

        Ok(TableMapper {
            table,
            id_column,
            dialect: self.dialect,
            columns: self.columns,
        })
    }
}

impl<T> TableMapper<T> {
    pub fn builder(table: impl Into<String>, id_column: impl Into<String>) -> TableMapperBuilder<T> {
        TableMapperBuilder {
            table: table.into(),
            id_column: id_column.into(),
            dialect: Dialect::default(),
            columns: Vec::new(),
        }
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    pub fn id_column(&self) -> &Ident {
        &self.id_column
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    /// Column name as it must appear in SQL text
    pub fn escaped(&self, column: &str) -> String {
        self.dialect.escape_reserved_word(column)
    }

    fn escaped_columns(&self) -> impl Iterator<Item = String> + '_ {
        self.columns.iter().map(|c| self.escaped(c.name))
    }

    /// Comma separated projection, optionally qualified with a table alias
    ///
    /// Columns listed in `nulled` are selected as `null` under their own
    /// name so the row mapper still finds them.
    pub fn projection(&self, alias: Option<&Ident>, nulled: &[&str]) -> String {
        self.columns
            .iter()
            .map(|c| {
                let escaped = self.escaped(c.name);
                if nulled.contains(&c.name) {
                    format!("null as {}", escaped)
                } else {
                    match alias {
                        Some(alias) => alias.qualify(&escaped),
                        None => escaped,
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolve a caller-supplied sort field to a mapped column
    ///
    /// camelCase is accepted and converted; anything that does not name a
    /// mapped column is rejected.
    pub fn sort_column(&self, field: &str) -> Result<String, ApimError> {
        let snake = to_snake_case(field);
        self.columns
            .iter()
            .find(|c| c.name == snake)
            .map(|c| self.escaped(c.name))
            .ok_or_else(|| ApimError::UnknownSortField {
                field: field.to_string(),
                table: self.table.to_string(),
            })
    }

    /// `order by` expression for a caller-supplied sort field
    ///
    /// Text columns sort case-insensitively.
    pub fn sort_expression(&self, alias: Option<&Ident>, field: &str) -> Result<String, ApimError> {
        let snake = to_snake_case(field);
        let column = self
            .columns
            .iter()
            .find(|c| c.name == snake)
            .ok_or_else(|| ApimError::UnknownSortField {
                field: field.to_string(),
                table: self.table.to_string(),
            })?;
        let escaped = self.escaped(column.name);
        let qualified = match alias {
            Some(alias) => alias.qualify(&escaped),
            None => escaped,
        };
        Ok(match column.sql_type {
            SqlType::Text => format!("lower({})", qualified),
            _ => qualified,
        })
    }

    pub fn select_all_sql(&self) -> String {
        format!("select * from {}", self.table)
    }

    pub fn select_by_id_sql(&self) -> String {
        format!("{} where {} = ?", self.select_all_sql(), self.escaped(self.id_column.as_str()))
    }

    pub fn insert_sql(&self) -> String {
        let columns: Vec<String> = self.escaped_columns().collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "insert into {} ({}) values ({})",
            self.table,
            columns.join(", "),
            placeholders
        )
    }

    pub fn update_sql(&self) -> String {
        let assignments: Vec<String> = self
            .escaped_columns()
            .map(|c| format!("{} = ?", c))
            .collect();
        format!(
            "update {} set {} where {} = ?",
            self.table,
            assignments.join(", "),
            self.escaped(self.id_column.as_str())
        )
    }

    pub fn delete_sql(&self) -> String {
        format!(
            "delete from {} where {} = ?",
            self.table,
            self.escaped(self.id_column.as_str())
        )
    }

    /// Bind values in column order
    pub fn insert_params(&self, record: &T) -> Vec<Value> {
        self.columns.iter().map(|c| (c.encode)(record)).collect()
    }

    /// Bind values in column order followed by the id of the row to update
    pub fn update_params(&self, record: &T, id: &str) -> Vec<Value> {
        let mut params = self.insert_params(record);
        params.push(Value::Text(id.to_string()));
        params
    }

    pub fn insert(&self, conn: &Connection, record: &T) -> rusqlite::Result<usize> {
        conn.execute(
            &self.insert_sql(),
            params_from_iter(self.insert_params(record)),
        )
    }

    /// Returns the number of rows changed; zero means the id did not exist
    pub fn update(&self, conn: &Connection, record: &T, id: &str) -> rusqlite::Result<usize> {
        conn.execute(
            &self.update_sql(),
            params_from_iter(self.update_params(record, id)),
        )
    }

    pub fn delete(&self, conn: &Connection, id: &str) -> rusqlite::Result<usize> {
        conn.execute(&self.delete_sql(), [id])
    }

    /// `delete from <table> where <column> in (…)`
    pub fn delete_in_sql(&self, column: &str, len: usize) -> Result<String, ApimError> {
        Ok(format!(
            "delete from {} where {} in ({})",
            self.table,
            self.escaped(column),
            in_clause(len)?
        ))
    }
}

impl<T: Default> TableMapper<T> {
    /// Decode one row into a fresh record
    pub fn map_row(&self, row: &Row<'_>) -> rusqlite::Result<T> {
        let mut record = T::default();
        for column in &self.columns {
            (column.decode)(&mut record, row, column.name)?;
        }
        Ok(record)
    }

    pub fn find_by_id(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<T>> {
        conn.query_row(&self.select_by_id_sql(), [id], |row| self.map_row(row))
            .optional()
    }

    /// Run a query whose rows each map to one record
    pub fn query(&self, conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<T>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| self.map_row(row))?;
        rows.collect()
    }

    /// Run a joined query and merge consecutive rows sharing an id
    ///
    /// The query must be ordered so that rows of one parent are contiguous.
    pub fn query_collated<F>(
        &self,
        conn: &Connection,
        sql: &str,
        params: &[Value],
        add_child: F,
    ) -> rusqlite::Result<Vec<T>>
    where
        F: Fn(&mut T, &Row<'_>) -> rusqlite::Result<()>,
    {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query(params_from_iter(params))?;
        collate_rows(rows, self.id_column.as_str(), |row| self.map_row(row), add_child)
    }
}
