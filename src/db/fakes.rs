//! A scripted [`Session`] double for exercising the executor, reconciler
//! and commands without a PostgreSQL backend.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::session::{Session, SessionError};

type Rows = Vec<Vec<Option<String>>>;

/// Records every statement it is handed; answers queries from stubs keyed
/// on a SQL substring. A stub with several queued results pops one per
/// call (the last result repeats), so evolving database state across
/// re-reads can be scripted.
#[derive(Default)]
pub struct FakeSession {
    pub executed: Vec<String>,
    stubs: Vec<(String, VecDeque<Rows>)>,
    failures: Vec<(String, String)>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub_query(&mut self, sql_contains: &str, rows: Rows) -> &mut Self {
        if let Some((_, queue)) = self
            .stubs
            .iter_mut()
            .find(|(pattern, _)| pattern == sql_contains)
        {
            queue.push_back(rows);
        } else {
            self.stubs
                .push((sql_contains.to_string(), VecDeque::from([rows])));
        }
        self
    }

    /// Make every `execute` whose SQL contains `sql_contains` fail.
    pub fn fail_matching(&mut self, sql_contains: &str, message: &str) -> &mut Self {
        self.failures
            .push((sql_contains.to_string(), message.to_string()));
        self
    }

    pub fn executed_matching(&self, sql_contains: &str) -> Vec<&str> {
        self.executed
            .iter()
            .filter(|sql| sql.contains(sql_contains))
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        self.executed.push(sql.to_string());
        for (pattern, message) in &self.failures {
            if sql.contains(pattern.as_str()) {
                return Err(SessionError::new(message.clone()));
            }
        }
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Rows, SessionError> {
        self.executed.push(sql.to_string());
        for (pattern, queue) in &mut self.stubs {
            if sql.contains(pattern.as_str()) {
                return Ok(if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                });
            }
        }
        Ok(Vec::new())
    }
}
