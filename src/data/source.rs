//! The host's column store.

/// Borrowed contents of one column.
#[derive(Debug, Clone, Copy)]
pub enum ColumnData<'a> {
    Numeric(&'a [f64]),
    Text(&'a [String]),
}

impl<'a> ColumnData<'a> {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The numeric value at `row`.
    ///
    /// `Ok(None)` marks a missing cell (NaN or empty text); `Err(())` marks
    /// text that does not parse as a number.
    pub fn value(&self, row: usize) -> Result<Option<f64>, ()> {
        match self {
            ColumnData::Numeric(values) => Ok(values.get(row).copied().filter(|v| !v.is_nan())),
            ColumnData::Text(values) => {
                let Some(text) = values.get(row) else {
                    return Ok(None);
                };
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse::<f64>()
                    .map(|v| if v.is_nan() { None } else { Some(v) })
                    .map_err(|_| ())
            }
        }
    }
}

/// Named column lookup provided by the host application.
pub trait ColumnSource {
    /// The column called `name`, if it exists.
    fn column(&self, name: &str) -> Option<ColumnData<'_>>;

    /// All column names in display order.
    fn column_names(&self) -> Vec<String>;

    /// Number of rows in column `name`.
    fn row_count(&self, name: &str) -> Option<usize> {
        self.column(name).map(|c| c.len())
    }
}

#[derive(Debug, Clone)]
enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

/// A simple in-memory [`ColumnSource`].
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    columns: Vec<(String, Column)>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add (or replace) a numeric column.
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert(name.into(), Column::Numeric(values));
        self
    }

    /// Add (or replace) a text column.
    pub fn with_text<S: Into<String>>(mut self, name: impl Into<String>, values: Vec<S>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.insert(name.into(), Column::Text(values));
        self
    }

    fn insert(&mut self, name: String, column: Column) {
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = column,
            None => self.columns.push((name, column)),
        }
    }
}

impl ColumnSource for Table {
    fn column(&self, name: &str) -> Option<ColumnData<'_>> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, column)| match column {
                Column::Numeric(values) => ColumnData::Numeric(values),
                Column::Text(values) => ColumnData::Text(values),
            })
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }
}
