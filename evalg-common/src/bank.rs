//! In-memory record collection
//!
//! A `Bank` is a named table of typed cells. Algorithms find banks by name
//! once at start, cache the position, and read or mask rows per event.
//! Masked rows stay in the bank but are skipped by `active_rows` and dropped
//! from serialized output.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cell value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
}

/// One row: column name to cell
pub type Row = BTreeMap<String, Cell>;

/// Ordered collection of banks making up one event
pub type BankList = Vec<Bank>;

/// A named table of rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    name: String,
    #[serde(default)]
    rows: Vec<Row>,
    /// Per-row acceptance; empty means every row is active
    #[serde(skip)]
    mask: Vec<bool>,
}

impl Bank {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            mask: Vec::new(),
        }
    }

    /// Bank with the given rows
    pub fn with_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
            mask: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
        if !self.mask.is_empty() {
            self.mask.push(true);
        }
    }

    pub fn is_active(&self, row: usize) -> bool {
        self.mask.get(row).copied().unwrap_or(true)
    }

    /// Indices of rows not masked out
    pub fn active_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows.len()).filter(|&row| self.is_active(row))
    }

    pub fn num_active(&self) -> usize {
        self.active_rows().count()
    }

    /// Mask every active row for which `accept` returns false
    pub fn filter<F>(&mut self, mut accept: F) -> Result<()>
    where
        F: FnMut(&Bank, usize) -> Result<bool>,
    {
        let mut mask = Vec::with_capacity(self.rows.len());
        for row in 0..self.rows.len() {
            mask.push(self.is_active(row) && accept(self, row)?);
        }
        self.mask = mask;
        Ok(())
    }

    fn cell(&self, column: &str, row: usize) -> Result<Cell> {
        let r = self.rows.get(row).ok_or_else(|| Error::RowOutOfRange {
            bank: self.name.clone(),
            row,
            rows: self.rows.len(),
        })?;
        r.get(column).copied().ok_or_else(|| Error::MissingColumn {
            bank: self.name.clone(),
            column: column.to_string(),
        })
    }

    /// Integer cell; a float cell is truncated
    pub fn get_int(&self, column: &str, row: usize) -> Result<i64> {
        Ok(match self.cell(column, row)? {
            Cell::Int(v) => v,
            Cell::Float(v) => v as i64,
        })
    }

    /// Float cell; an integer cell is widened
    pub fn get_float(&self, column: &str, row: usize) -> Result<f64> {
        Ok(match self.cell(column, row)? {
            Cell::Int(v) => v as f64,
            Cell::Float(v) => v,
        })
    }

    fn row_mut(&mut self, row: usize) -> Result<&mut Row> {
        let rows = self.rows.len();
        let name = &self.name;
        self.rows.get_mut(row).ok_or_else(|| Error::RowOutOfRange {
            bank: name.clone(),
            row,
            rows,
        })
    }

    pub fn put_int(&mut self, column: &str, row: usize, value: i64) -> Result<()> {
        self.row_mut(row)?.insert(column.to_string(), Cell::Int(value));
        Ok(())
    }

    pub fn put_float(&mut self, column: &str, row: usize, value: f64) -> Result<()> {
        self.row_mut(row)?.insert(column.to_string(), Cell::Float(value));
        Ok(())
    }

    /// Copy holding only the active rows
    pub fn to_filtered(&self) -> Bank {
        Bank::with_rows(
            self.name.clone(),
            self.active_rows().map(|row| self.rows[row].clone()).collect(),
        )
    }
}

/// Position of the bank named `name`, if present
pub fn find_bank(banks: &[Bank], name: &str) -> Option<usize> {
    banks.iter().position(|bank| bank.name() == name)
}
