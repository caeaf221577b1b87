#![forbid(unsafe_code)]
//! Minimal SQL string builders for the txscope scope helpers.
//!
//! These produce MySQL-flavored statements with `?` placeholders. WHERE
//! clauses are appended verbatim; their bound parameters travel separately and
//! trail the SET/VALUES parameters in the final parameter list.

/// Build `INSERT INTO <table> (<cols>) VALUES (?, ...)` with one placeholder
/// per column.
pub fn insert(table: &str, columns: &[&str]) -> String {
    let cols = columns.join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {table} ({cols}) VALUES ({placeholders})")
}

/// Build `` UPDATE <table> SET `a`=?,`b`=? `` in caller column order, with an
/// optional `WHERE` clause appended verbatim.
pub fn update(table: &str, columns: &[&str], where_clause: Option<&str>) -> String {
    let assignments: Vec<String> = columns.iter().map(|col| format!("`{col}`=?")).collect();
    let mut sql = format!("UPDATE {table} SET {}", assignments.join(","));
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

/// Build `DELETE FROM <table>` with an optional `WHERE` clause appended
/// verbatim.
pub fn delete(table: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("DELETE FROM {table}");
    if let Some(clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}
