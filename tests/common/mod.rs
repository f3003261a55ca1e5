//! In-memory `Store` that understands the statements the CRUD compiler emits for one table.

#![allow(dead_code)]

use async_trait::async_trait;
use crudkit::{AppError, ExecResult, Store};
use serde_json::{json, Map, Value};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Map<String, Value>>>,
    pub statements: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MemoryStore {
    /// `n` products with ids 1..=n.
    pub fn with_products(n: i64) -> Self {
        let rows = (1..=n)
            .map(|i| {
                json!({ "id": i, "name": format!("product {}", i), "price": i * 10 })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        MemoryStore {
            rows: Mutex::new(rows),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn last_statement(&self) -> (String, Vec<Value>) {
        self.statements.lock().unwrap().last().cloned().unwrap()
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn param_index(ph: &str) -> usize {
    let digits: String = ph.trim().trim_start_matches('$').chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<usize>().unwrap() - 1
}

/// `"col" = $n` pairs from a WHERE clause (up to ORDER BY / end).
fn filters(sql: &str, params: &[Value]) -> Vec<(String, Value)> {
    let Some((_, rest)) = sql.split_once(" WHERE ") else { return Vec::new() };
    let rest = rest.split(" ORDER BY ").next().unwrap();
    rest.split(" AND ")
        .filter_map(|cond| {
            let (col, ph) = cond.split_once(" = ")?;
            Some((unquote(col), params[param_index(ph)].clone()))
        })
        .collect()
}

fn matches(row: &Map<String, Value>, filters: &[(String, Value)]) -> bool {
    filters.iter().all(|(c, v)| row.get(c) == Some(v))
}

#[async_trait]
impl Store for MemoryStore {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, AppError> {
        self.statements.lock().unwrap().push((sql.to_string(), params.to_vec()));
        let mut rows = self.rows.lock().unwrap();
        if sql.starts_with("SELECT COUNT(*)") {
            let f = filters(sql, params);
            let total = rows.iter().filter(|r| matches(r, &f)).count();
            return Ok(vec![json!({ "total": total })]);
        }
        if sql.starts_with("SELECT") {
            let f = filters(sql, params);
            let mut found: Vec<Value> = rows.iter().filter(|r| matches(r, &f)).cloned().map(Value::Object).collect();
            if sql.contains(" LIMIT ") {
                let limit = params[params.len() - 2].as_u64().unwrap() as usize;
                let offset = params[params.len() - 1].as_u64().unwrap() as usize;
                found = found.into_iter().skip(offset).take(limit).collect();
            }
            return Ok(found);
        }
        if sql.starts_with("INSERT") {
            let cols = sql.split_once(" (").unwrap().1.split_once(") VALUES").unwrap().0;
            let next_id = rows.iter().filter_map(|r| r["id"].as_i64()).max().unwrap_or(0) + 1;
            let mut row = Map::new();
            row.insert("id".into(), json!(next_id));
            for (i, col) in cols.split(", ").enumerate() {
                row.insert(unquote(col), params[i].clone());
            }
            rows.push(row.clone());
            return Ok(vec![Value::Object(row)]);
        }
        if sql.starts_with("UPDATE") {
            let sets = sql.split_once(" SET ").unwrap().1.split_once(" WHERE ").unwrap().0;
            let id = params.last().unwrap();
            let Some(row) = rows.iter_mut().find(|r| r.get("id") == Some(id)) else {
                return Ok(Vec::new());
            };
            for set in sets.split(", ") {
                let (col, ph) = set.split_once(" = ").unwrap();
                row.insert(unquote(col), params[param_index(ph)].clone());
            }
            return Ok(vec![Value::Object(row.clone())]);
        }
        Err(AppError::Unhandled(format!("unsupported statement: {}", sql)))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, AppError> {
        self.statements.lock().unwrap().push((sql.to_string(), params.to_vec()));
        let mut rows = self.rows.lock().unwrap();
        if sql.starts_with("DELETE") {
            let before = rows.len();
            rows.retain(|r| r.get("id") != Some(&params[0]));
            return Ok(ExecResult {
                rows_affected: (before - rows.len()) as u64,
            });
        }
        Ok(ExecResult::default())
    }
}
