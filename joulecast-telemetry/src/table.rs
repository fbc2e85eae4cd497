//! Raw Telemetry Tables
//!
//! The external sampler writes a plain CSV file: the first row defines the
//! column names, every following row is one sample. Column sets differ by
//! host platform family, so the table keeps values as strings and resolves
//! columns by name on demand.

/// A parsed raw telemetry table: header row plus data rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// An empty table with no headers and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse CSV text: first non-blank line defines headers, the rest are rows.
    ///
    /// Sampler output is plain numeric CSV, so fields are split on commas
    /// without quoting rules. Blank lines are skipped; a short row is kept and
    /// simply has no value for its trailing columns.
    pub fn parse(text: &str) -> Self {
        let mut lines = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let headers: Vec<String> = match lines.next() {
            Some(header_line) => header_line
                .split(',')
                .map(|h| h.trim().to_string())
                .collect(),
            None => return Self::default(),
        };

        let rows = lines
            .map(|line| line.split(',').map(|v| v.trim().to_string()).collect())
            .collect();

        Self { headers, rows }
    }

    /// Construct a table directly from headers and rows (used by tests and
    /// the dry-run sampler).
    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// The column names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows (the header row is not counted).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a column name to its index, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw string value at (row, column), if the row extends that far.
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }

    /// Numeric value at (row, column). Malformed or absent values are `None`;
    /// the caller decides whether a missing value is tolerable.
    pub fn number(&self, row: usize, column: usize) -> Option<f64> {
        let raw = self.value(row, column)?;
        if raw.is_empty() {
            return None;
        }
        raw.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// All numeric values of one column, positionally aligned with the rows.
    pub fn column_numbers(&self, column: usize) -> Vec<Option<f64>> {
        (0..self.rows.len()).map(|r| self.number(r, column)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let table = RawTable::parse("Time,CPU_POWER\n0,10.5\n500,12.0\n");
        assert_eq!(table.headers(), &["Time", "CPU_POWER"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.number(0, 1), Some(10.5));
        assert_eq!(table.number(1, 0), Some(500.0));
    }

    #[test]
    fn test_parse_empty_text() {
        let table = RawTable::parse("");
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
    }

    #[test]
    fn test_parse_header_only() {
        let table = RawTable::parse("Time,PACKAGE_ENERGY (J)\n");
        assert_eq!(table.headers().len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_header_with_unit_suffix() {
        let table = RawTable::parse("Delta, PACKAGE_ENERGY (J)\n500,100.0\n");
        assert_eq!(table.column("PACKAGE_ENERGY (J)"), Some(1));
    }

    #[test]
    fn test_malformed_and_missing_values() {
        let table = RawTable::parse("a,b\n1.0,oops\n2.0\n");
        assert_eq!(table.number(0, 1), None);
        assert_eq!(table.number(1, 1), None);
        assert_eq!(table.number(1, 0), Some(2.0));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let table = RawTable::parse("a\n\n1\n\n2\n");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_crlf_line_endings() {
        let table = RawTable::parse("a,b\r\n1,2\r\n");
        assert_eq!(table.headers(), &["a", "b"]);
        assert_eq!(table.number(0, 1), Some(2.0));
    }
}
