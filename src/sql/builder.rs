//! Compiles a CRUD pattern plus request data into parameterized SELECT, COUNT, INSERT, UPDATE, DELETE.
//! Identifiers come from the pattern only; every request value becomes a `$n` parameter.

use crate::config::CrudPattern;
use crate::pagination::PageRequest;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from patterns).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name, quoting each part of a schema-qualified name.
fn qualified_table(table: &str) -> String {
    table.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Bind `v` and return its placeholder, cast when the pattern declares a type for `column`.
    fn placeholder(&mut self, pattern: &CrudPattern, column: &str, v: Value) -> String {
        let n = self.push_param(v);
        match pattern.casts.get(column) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// Cast types the row decoder cannot read natively: numeric and custom enums (schema.typename).
fn selects_as_text(pg_type: &str) -> bool {
    let t = pg_type.to_ascii_lowercase();
    t == "numeric" || t == "decimal" || t.contains('.')
}

fn text_column(col: &str) -> String {
    format!("{}::text AS {}", quoted(col), quoted(col))
}

/// SELECT list: declared columns, or `*` when the pattern lists none. Columns cast to
/// numeric or an enum come back as text; with `*` they are appended and shadow the raw column.
fn select_column_list(pattern: &CrudPattern) -> String {
    let as_text = |c: &str| pattern.casts.get(c).is_some_and(|t| selects_as_text(t));
    if pattern.columns.is_empty() {
        let mut text_cols: Vec<&str> = pattern.casts.keys().map(String::as_str).filter(|c| as_text(c)).collect();
        text_cols.sort_unstable();
        std::iter::once("*".to_string())
            .chain(text_cols.into_iter().map(text_column))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        pattern
            .columns
            .iter()
            .map(|c| if as_text(c) { text_column(c) } else { quoted(c) })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// WHERE clause over the pattern's filters that are present in `data`, in pattern order.
/// Fields outside the filter list are ignored. A JSON null filters with `IS NULL`.
fn filter_clause(pattern: &CrudPattern, data: &Map<String, Value>, q: &mut QueryBuf) -> String {
    let mut where_parts = Vec::new();
    for col in &pattern.filters {
        let Some(val) = data.get(col) else { continue };
        if val.is_null() {
            where_parts.push(format!("{} IS NULL", quoted(col)));
        } else {
            let ph = q.placeholder(pattern, col, val.clone());
            where_parts.push(format!("{} = {}", quoted(col), ph));
        }
    }
    if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    }
}

/// One page of rows: filters, ORDER BY pk, LIMIT/OFFSET bound as parameters.
pub fn select_list(pattern: &CrudPattern, data: &Map<String, Value>, page: &PageRequest) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = filter_clause(pattern, data, &mut q);
    let limit = q.push_param(Value::from(page.per_page));
    let offset = q.push_param(Value::from(page.offset()));
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT ${} OFFSET ${}",
        select_column_list(pattern),
        qualified_table(&pattern.table),
        where_clause,
        quoted(&pattern.primary_key),
        limit,
        offset
    );
    q
}

/// Row count under exactly the filters `select_list` applies, without paging.
pub fn select_count(pattern: &CrudPattern, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = filter_clause(pattern, data, &mut q);
    q.sql = format!(
        "SELECT COUNT(*) AS {} FROM {}{}",
        quoted("total"),
        qualified_table(&pattern.table),
        where_clause
    );
    q
}

/// SELECT by primary key.
pub fn select_by_id(pattern: &CrudPattern, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &pattern.primary_key;
    let ph = q.placeholder(pattern, pk, id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(pattern),
        qualified_table(&pattern.table),
        quoted(pk),
        ph
    );
    q
}

/// INSERT the creatable columns present in `data`; anything else in `data` is dropped.
/// Returns the stored row so no separate read-back is needed.
pub fn insert(pattern: &CrudPattern, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&pattern.table);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for col in &pattern.creatable {
        let Some(val) = data.get(col) else { continue };
        let ph = q.placeholder(pattern, col, val.clone());
        cols.push(quoted(col));
        placeholders.push(ph);
    }
    let returning = select_column_list(pattern);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by primary key: SET only updatable columns present in `data`, never the key itself.
/// With nothing to set this degrades to a SELECT by id, so a missing row still comes back empty.
pub fn update(pattern: &CrudPattern, id: &Value, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &pattern.primary_key;
    let mut sets = Vec::new();
    for col in &pattern.updatable {
        if col == pk {
            continue;
        }
        let Some(val) = data.get(col) else { continue };
        let ph = q.placeholder(pattern, col, val.clone());
        sets.push(format!("{} = {}", quoted(col), ph));
    }
    if sets.is_empty() {
        return select_by_id(pattern, id);
    }
    let id_ph = q.placeholder(pattern, pk, id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(&pattern.table),
        sets.join(", "),
        quoted(pk),
        id_ph,
        select_column_list(pattern)
    );
    q
}

/// DELETE by primary key.
pub fn delete(pattern: &CrudPattern, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &pattern.primary_key;
    let ph = q.placeholder(pattern, pk, id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(&pattern.table),
        quoted(pk),
        ph
    );
    q
}
