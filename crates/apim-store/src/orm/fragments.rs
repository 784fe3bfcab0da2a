//! SQL fragment builders: IN lists, paging, identifier escaping

use apim_core::errors::ApimError;
use serde::Deserialize;

/// Target SQL flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgresql,
    Mysql,
    Sqlserver,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgresql" | "postgres" => Ok(Dialect::Postgresql),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "sqlserver" | "mssql" => Ok(Dialect::Sqlserver),
            other => Err(format!("unsupported dialect '{}'", other)),
        }
    }
}

/// Column names used by the schema that collide with a keyword in at least
/// one supported dialect
const RESERVED_WORDS: &[&str] = &["condition", "group", "key", "order", "plan", "user", "value"];

pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(word))
}

impl Dialect {
    /// Quote an identifier unconditionally
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident),
            Dialect::Sqlserver => format!("[{}]", ident),
            Dialect::Sqlite | Dialect::Postgresql => format!("\"{}\"", ident),
        }
    }

    /// Quote an identifier only when it is a reserved word
    pub fn escape_reserved_word(&self, word: &str) -> String {
        if is_reserved_word(word) {
            self.quote(word)
        } else {
            word.to_string()
        }
    }

    /// `limit`/`offset` fragment with a leading space
    ///
    /// Both values are integers rendered inline, capped at the largest
    /// signed 64-bit value every engine accepts.
    pub fn paging_clause(&self, limit: usize, offset: usize) -> String {
        let (limit, offset) = (sql_int(limit), sql_int(offset));
        match self {
            Dialect::Sqlserver => {
                format!(" offset {} rows fetch next {} rows only", offset, limit)
            }
            Dialect::Sqlite | Dialect::Postgresql | Dialect::Mysql => {
                format!(" limit {} offset {}", limit, offset)
            }
        }
    }

    /// Offset without a limit
    ///
    /// SQL Server refuses an ordered sub-select without an offset, while
    /// SQLite and MySQL refuse an offset without a limit, so those two get
    /// an unbounded limit.
    pub fn offset_clause(&self, offset: usize) -> String {
        let offset = sql_int(offset);
        match self {
            Dialect::Sqlserver => format!(" offset {} rows", offset),
            Dialect::Postgresql => format!(" offset {}", offset),
            Dialect::Sqlite => format!(" limit -1 offset {}", offset),
            Dialect::Mysql => format!(" limit 18446744073709551615 offset {}", offset),
        }
    }
}

fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `?, ?, ?` with one placeholder per value
///
/// An empty list would render `in ()`, which no engine accepts.
pub fn in_clause(len: usize) -> Result<String, ApimError> {
    if len == 0 {
        return Err(ApimError::EmptyInClause);
    }
    Ok(vec!["?"; len].join(", "))
}

/// ` where <column> in (…)` or ` and <column> in (…)`
pub fn in_condition(first: bool, column: &str, len: usize) -> Result<String, ApimError> {
    Ok(format!(
        " {} {} in ({})",
        if first { "where" } else { "and" },
        column,
        in_clause(len)?
    ))
}

/// `createdAt` -> `created_at`
pub fn to_snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
