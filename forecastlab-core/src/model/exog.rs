//! Named, column-major regressor matrix aligned row-for-row with the target.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExogenousMatrix {
    names: Vec<String>,
    /// `columns[j][t]` = regressor `j` at observation `t`.
    columns: Vec<Vec<f64>>,
}

impl ExogenousMatrix {
    /// Columns shorter or longer than the first are kept as given; use
    /// [`is_rectangular`](Self::is_rectangular) to check before fitting.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Self {
        Self { names, columns }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_rectangular(&self) -> bool {
        let n = self.n_rows();
        self.columns.iter().all(|c| c.len() == n)
    }

    pub fn is_finite(&self) -> bool {
        self.columns.iter().flatten().all(|v| v.is_finite())
    }

    /// Rows `[start, end)` of every column.
    pub fn slice_rows(&self, start: usize, end: usize) -> ExogenousMatrix {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let end = end.min(c.len());
                c[start.min(end)..end].to_vec()
            })
            .collect();
        Self {
            names: self.names.clone(),
            columns,
        }
    }
}
