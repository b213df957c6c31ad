//! Sid-keyed view over a policy document's statement list.
//!
//! Statements without a Sid (or repeating a Sid already seen) get a
//! placeholder key from a counter so they round-trip untouched. Iteration
//! order is insertion order: pre-existing statements keep their relative
//! positions and statements added through the index are appended after them.

use indexmap::IndexMap;

use crate::types::Statement;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKey {
    Sid(String),
    Unnamed(usize),
}

#[derive(Debug, Clone, Default)]
pub struct StatementIndex {
    statements: IndexMap<StatementKey, Statement>,
    next_placeholder: usize,
}

impl StatementIndex {
    pub fn from_statements(statements: Vec<Statement>) -> Self {
        let mut index = Self::default();
        for statement in statements {
            let key = match statement.sid.as_deref() {
                Some(sid) if !index.contains(sid) => StatementKey::Sid(sid.to_string()),
                _ => index.placeholder(),
            };
            index.statements.insert(key, statement);
        }
        index
    }

    fn placeholder(&mut self) -> StatementKey {
        let key = StatementKey::Unnamed(self.next_placeholder);
        self.next_placeholder += 1;
        key
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.statements
            .contains_key(&StatementKey::Sid(sid.to_string()))
    }

    pub fn get(&self, sid: &str) -> Option<&Statement> {
        self.statements.get(&StatementKey::Sid(sid.to_string()))
    }

    /// Insert or replace the statement stored under `sid`. A replaced
    /// statement keeps its position; a new one is appended.
    pub fn upsert(&mut self, sid: &str, mut statement: Statement) {
        statement.sid = Some(sid.to_string());
        self.statements
            .insert(StatementKey::Sid(sid.to_string()), statement);
    }

    /// Remove the statement stored under `sid`, keeping the order of the rest.
    pub fn remove(&mut self, sid: &str) -> Option<Statement> {
        self.statements
            .shift_remove(&StatementKey::Sid(sid.to_string()))
    }

    /// Statements without a Sid, in document order.
    pub fn unnamed(&self) -> impl Iterator<Item = (usize, &Statement)> {
        self.statements.iter().filter_map(|(key, statement)| match key {
            StatementKey::Unnamed(placeholder) if statement.sid.is_none() => {
                Some((*placeholder, statement))
            }
            _ => None,
        })
    }

    /// Give an unnamed statement a Sid in place. Returns false when the
    /// placeholder is unknown or the Sid is already taken.
    pub fn assign_sid(&mut self, placeholder: usize, sid: &str) -> bool {
        if self.contains(sid) {
            return false;
        }
        let Some((position, _, mut statement)) = self
            .statements
            .shift_remove_full(&StatementKey::Unnamed(placeholder))
        else {
            return false;
        };
        statement.sid = Some(sid.to_string());
        self.statements
            .shift_insert(position, StatementKey::Sid(sid.to_string()), statement);
        true
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements.into_values().collect()
    }
}
