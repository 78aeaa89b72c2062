//! Single-sheet table: ordered columns, ordered rows

use indexmap::IndexMap;

use super::value::CellValue;

/// One record keyed by column name, in column order
pub type Row = IndexMap<String, CellValue>;

/// How a new sheet is seeded by `create_sheet`
#[derive(Debug, Clone)]
pub enum SheetSeed {
    /// Empty table with these columns
    Columns(Vec<String>),
    /// Populated table; columns are the union of keys in first-seen order
    Rows(Vec<Row>),
}

impl From<Vec<String>> for SheetSeed {
    fn from(columns: Vec<String>) -> Self {
        SheetSeed::Columns(columns)
    }
}

impl From<Vec<Row>> for SheetSeed {
    fn from(rows: Vec<Row>) -> Self {
        SheetSeed::Rows(rows)
    }
}

/// An ordered 2-D table
///
/// Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Empty table with the given columns (duplicates are dropped)
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sheet = Sheet::default();
        for column in columns {
            sheet.ensure_column(column.into());
        }
        sheet
    }

    /// Populated table from records
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut sheet = Sheet::default();
        for row in &rows {
            sheet.push_row(row);
        }
        sheet
    }

    /// Build from already-aligned cells; short rows are padded with nulls
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut cells| {
                cells.resize(width, CellValue::Null);
                cells
            })
            .collect();
        Sheet { columns, rows }
    }

    pub fn from_seed(seed: SheetSeed) -> Self {
        match seed {
            SheetSeed::Columns(columns) => Sheet::with_columns(columns),
            SheetSeed::Rows(rows) => Sheet::from_rows(rows),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// A sheet with no rows counts as empty even when it has columns
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    /// Overwrite a cell, returning the previous value, or `None` when out of bounds
    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Option<CellValue> {
        let cell = self.rows.get_mut(row)?.get_mut(col)?;
        Some(std::mem::replace(cell, value))
    }

    /// Raw cells of every row, in row order
    pub fn cells(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn row(&self, index: usize) -> Option<Row> {
        self.rows.get(index).map(|cells| self.to_row(cells))
    }

    /// Append a record at the end of row order
    ///
    /// Columns missing from `row` are null. Keys that are not yet columns are
    /// added at the end of column order and back-filled with null.
    pub fn push_row(&mut self, row: &Row) {
        for key in row.keys() {
            self.ensure_column(key.clone());
        }

        let cells = self
            .columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or_default())
            .collect();
        self.rows.push(cells);
    }

    /// Append all-null rows until the sheet has `count` rows
    pub fn pad_rows(&mut self, count: usize) {
        let width = self.columns.len();
        while self.rows.len() < count {
            self.rows.push(vec![CellValue::Null; width]);
        }
    }

    /// Condition keys that are not columns of this sheet, in condition order
    pub fn unknown_columns<'a>(&self, conditions: &'a Row) -> Vec<&'a str> {
        conditions
            .keys()
            .filter(|key| self.column_index(key).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Indices of rows whose cells equal every condition
    ///
    /// Unknown condition columns never match; callers validate them first.
    pub fn matching_indices<'a>(&'a self, conditions: &'a Row) -> impl Iterator<Item = usize> + 'a {
        let resolved: Vec<(Option<usize>, &CellValue)> = conditions
            .iter()
            .map(|(column, value)| (self.column_index(column), value))
            .collect();

        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, cells)| {
                resolved
                    .iter()
                    .all(|(col, value)| col.is_some_and(|c| &cells[c] == *value))
            })
            .map(|(index, _)| index)
    }

    fn ensure_column(&mut self, name: String) {
        if self.column_index(&name).is_none() {
            self.columns.push(name);
            for cells in &mut self.rows {
                cells.push(CellValue::Null);
            }
        }
    }

    fn to_row(&self, cells: &[CellValue]) -> Row {
        self.columns
            .iter()
            .cloned()
            .zip(cells.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_from_rows_infers_union_of_columns_in_first_seen_order() {
        let sheet = Sheet::from_rows(vec![
            row(&[("id", 1.into()), ("name", "Ann".into())]),
            row(&[("email", "bo@example.com".into()), ("id", 2.into())]),
        ]);

        assert_eq!(sheet.columns(), ["id", "name", "email"]);
        assert_eq!(sheet.cell(0, 2), Some(&CellValue::Null));
        assert_eq!(sheet.cell(1, 1), Some(&CellValue::Null));
        assert_eq!(sheet.cell(1, 2), Some(&CellValue::from("bo@example.com")));
    }

    #[test]
    fn test_push_row_fills_missing_and_adds_new_columns() {
        let mut sheet = Sheet::with_columns(["id", "name"]);
        sheet.push_row(&row(&[("id", 1.into()), ("name", "Ann".into())]));
        sheet.push_row(&row(&[("id", 2.into()), ("team", "Ops".into())]));

        assert_eq!(sheet.columns(), ["id", "name", "team"]);
        assert_eq!(sheet.row(0).unwrap()["team"], CellValue::Null);
        assert_eq!(sheet.row(1).unwrap()["name"], CellValue::Null);
        assert_eq!(sheet.row(1).unwrap()["team"], CellValue::from("Ops"));
    }

    #[test]
    fn test_set_cell_out_of_bounds() {
        let mut sheet = Sheet::from_rows(vec![row(&[("id", 1.into())])]);
        assert_eq!(sheet.set_cell(1, 0, 5.into()), None);
        assert_eq!(sheet.set_cell(0, 1, 5.into()), None);
        assert_eq!(sheet.set_cell(0, 0, 5.into()), Some(CellValue::from(1)));
    }

    #[test]
    fn test_pad_rows_only_grows() {
        let mut sheet = Sheet::from_rows(vec![row(&[("id", 1.into()), ("name", "Ann".into())])]);
        sheet.pad_rows(3);
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.row(2).unwrap()["name"], CellValue::Null);

        sheet.pad_rows(1);
        assert_eq!(sheet.row_count(), 3);
    }

    #[test]
    fn test_matching_indices() {
        let sheet = Sheet::from_rows(vec![
            row(&[("team", "Ops".into()), ("active", true.into())]),
            row(&[("team", "Dev".into()), ("active", true.into())]),
            row(&[("team", "Ops".into()), ("active", false.into())]),
        ]);

        let ops = row(&[("team", "Ops".into())]);
        assert_eq!(sheet.matching_indices(&ops).collect::<Vec<_>>(), [0, 2]);

        let active_ops = row(&[("team", "Ops".into()), ("active", true.into())]);
        assert_eq!(sheet.matching_indices(&active_ops).collect::<Vec<_>>(), [0]);

        assert_eq!(sheet.matching_indices(&Row::new()).count(), 3);
    }
}
