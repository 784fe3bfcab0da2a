//! Row collation
//!
//! A left join repeats the parent columns once per child row. Collation
//! folds those physical rows back into one record per parent: a row whose
//! key differs from the previous row starts a new parent, a row with the
//! same key is added to the parent already built. Rows of one parent must be
//! contiguous; `[A, B, A]` yields three parents.

use rusqlite::types::Value;
use rusqlite::{Row, Rows};
use std::collections::{BTreeMap, BTreeSet};

/// Fold state: the parent currently being filled and those already closed
#[derive(Debug)]
pub struct Collator<K, T> {
    current: Option<(K, T)>,
    done: Vec<T>,
}

impl<K: PartialEq, T> Default for Collator<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, T> Collator<K, T> {
    pub fn new() -> Self {
        Self {
            current: None,
            done: Vec::new(),
        }
    }

    /// Return the parent a row with `key` belongs to
    ///
    /// `make` runs only when the key differs from the previous row's.
    pub fn push_row<E>(
        &mut self,
        key: K,
        make: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let entry = match self.current.take() {
            Some((current_key, parent)) if current_key == key => (current_key, parent),
            previous => {
                if let Some((_, parent)) = previous {
                    self.done.push(parent);
                }
                (key, make()?)
            }
        };
        let (_, parent) = self.current.insert(entry);
        Ok(parent)
    }

    /// Parents in first-seen order
    pub fn finish(mut self) -> Vec<T> {
        if let Some((_, parent)) = self.current.take() {
            self.done.push(parent);
        }
        self.done
    }
}

/// Collate any fallible sequence of rows
pub fn collate<R, K, T, E, I>(
    rows: I,
    key: impl Fn(&R) -> Result<K, E>,
    map: impl Fn(&R) -> Result<T, E>,
    add_child: impl Fn(&mut T, &R) -> Result<(), E>,
) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Result<R, E>>,
    K: PartialEq,
{
    let mut collator = Collator::new();
    for row in rows {
        let row = row?;
        let parent = collator.push_row(key(&row)?, || map(&row))?;
        add_child(parent, &row)?;
    }
    Ok(collator.finish())
}

/// Collate a live result cursor keyed on `key_column`
pub fn collate_rows<T>(
    mut rows: Rows<'_>,
    key_column: &str,
    map: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
    add_child: impl Fn(&mut T, &Row<'_>) -> rusqlite::Result<()>,
) -> rusqlite::Result<Vec<T>> {
    let mut collator: Collator<Value, T> = Collator::new();
    while let Some(row) = rows.next()? {
        let key: Value = row.get(key_column)?;
        let parent = collator.push_row(key, || map(row))?;
        add_child(parent, row)?;
    }
    Ok(collator.finish())
}

/// Append a child value unless the outer join found none
pub fn push_non_null(target: &mut Vec<String>, row: &Row<'_>, column: &str) -> rusqlite::Result<()> {
    if let Some(value) = row.get::<_, Option<String>>(column)? {
        target.push(value);
    }
    Ok(())
}

pub fn insert_non_null(
    target: &mut BTreeSet<String>,
    row: &Row<'_>,
    column: &str,
) -> rusqlite::Result<()> {
    if let Some(value) = row.get::<_, Option<String>>(column)? {
        target.insert(value);
    }
    Ok(())
}

/// Put a key/value child; rows with a null key or value add nothing
pub fn put_non_null(
    target: &mut BTreeMap<String, String>,
    row: &Row<'_>,
    key_column: &str,
    value_column: &str,
) -> rusqlite::Result<()> {
    let key: Option<String> = row.get(key_column)?;
    let value: Option<String> = row.get(value_column)?;
    if let (Some(key), Some(value)) = (key, value) {
        target.insert(key, value);
    }
    Ok(())
}
