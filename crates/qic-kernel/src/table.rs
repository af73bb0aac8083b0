//! Box-drawn text tables for the `_t` family of helpers.
//!
//! ```text
//! +------+-----+
//! | name | age |
//! +------+-----+
//! | al   | 7   |
//! +------+-----+
//! ```

use crate::value::Value;

/// Cell width limit when the caller gives none.
pub const DEFAULT_MAX_WIDTH: usize = 100;

/// Rows of text cells with an optional header.
#[derive(Debug, Clone)]
pub struct Table {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    data_only: bool,
    max_width: usize,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            header: None,
            rows,
            data_only: false,
            max_width: DEFAULT_MAX_WIDTH,
        }
    }

    /// Explicit column names. Without them the first row is the header.
    pub fn with_header(mut self, header: Option<Vec<String>>) -> Self {
        self.header = header;
        self
    }

    /// Treat every row as data and draw no header.
    pub fn data_only(mut self, data_only: bool) -> Self {
        self.data_only = data_only;
        self
    }

    /// Truncate cells to `width` characters. Zero disables truncation.
    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    fn parts(&self) -> (Option<&[String]>, &[Vec<String>]) {
        match (&self.header, self.data_only) {
            (_, true) => (None, self.rows.as_slice()),
            (Some(header), false) => (Some(header.as_slice()), self.rows.as_slice()),
            (None, false) => match self.rows.split_first() {
                Some((first, rest)) => (Some(first.as_slice()), rest),
                None => (None, self.rows.as_slice()),
            },
        }
    }

    pub fn render(&self) -> String {
        let (header, rows) = self.parts();
        draw(header, rows, self.max_width)
    }

    /// Columns drawn as rows, each led by its header name.
    pub fn render_pivot(&self) -> String {
        let (header, rows) = self.parts();
        let columns = column_count(header, rows);
        let pivoted: Vec<Vec<String>> = (0..columns)
            .map(|c| {
                header
                    .map(|h| h.get(c).cloned().unwrap_or_default())
                    .into_iter()
                    .chain(rows.iter().map(|row| row.get(c).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect();
        draw(None, &pivoted, self.max_width)
    }
}

/// A table from a list of records. The header is the union of the record
/// keys in first-seen order unless given.
pub fn from_records(records: &[Value], header: Option<Vec<String>>) -> Table {
    let header = header.unwrap_or_else(|| {
        let mut keys: Vec<String> = Vec::new();
        for record in records {
            if let Value::Map(map) = record {
                for key in map.keys() {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        keys
    });
    let rows = records
        .iter()
        .map(|record| match record {
            Value::Map(map) => header
                .iter()
                .map(|k| map.get(k).map(Value::to_display_string).unwrap_or_default())
                .collect(),
            other => vec![other.to_display_string()],
        })
        .collect();
    Table::new(rows).with_header(Some(header))
}

fn column_count(header: Option<&[String]>, rows: &[Vec<String>]) -> usize {
    rows.iter()
        .map(Vec::len)
        .chain(header.map(<[String]>::len))
        .max()
        .unwrap_or(0)
}

fn clip(cell: &str, max_width: usize) -> String {
    let flat = cell.replace('\n', " ");
    if max_width > 0 && flat.chars().count() > max_width {
        flat.chars().take(max_width).collect()
    } else {
        flat
    }
}

fn draw(header: Option<&[String]>, rows: &[Vec<String>], max_width: usize) -> String {
    let columns = column_count(header, rows);
    if columns == 0 {
        return String::new();
    }
    let normalize = |row: &[String]| -> Vec<String> {
        (0..columns)
            .map(|c| clip(row.get(c).map(String::as_str).unwrap_or(""), max_width))
            .collect()
    };
    let header = header.map(normalize);
    let rows: Vec<Vec<String>> = rows.iter().map(|r| normalize(r)).collect();

    let mut widths = vec![0usize; columns];
    for row in header.iter().chain(rows.iter()) {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let rule: String = widths.iter().fold("+".to_string(), |mut acc, w| {
        acc.push_str(&"-".repeat(w + 2));
        acc.push('+');
        acc
    });
    let line = |row: &[String]| -> String {
        widths.iter().zip(row).fold("|".to_string(), |mut acc, (&w, cell)| {
            acc.push_str(&format!(" {cell:<w$} |"));
            acc
        })
    };

    let mut out = vec![rule.clone()];
    if let Some(header) = &header {
        out.push(line(header));
        out.push(rule.clone());
    }
    out.extend(rows.iter().map(|r| line(r)));
    out.push(rule);
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn first_row_is_header() {
        let table = Table::new(rows(&[&["a", "b"], &["1", "22"]]));
        assert_eq!(
            table.render(),
            "+---+----+\n| a | b  |\n+---+----+\n| 1 | 22 |\n+---+----+"
        );
    }

    #[test]
    fn data_only_draws_no_header() {
        let table = Table::new(rows(&[&["a", "b"], &["1"]])).data_only(true);
        assert_eq!(table.render(), "+---+---+\n| a | b |\n| 1 |   |\n+---+---+");
    }

    #[test]
    fn cells_are_truncated() {
        let table = Table::new(rows(&[&["abcdef"]]))
            .with_header(Some(vec!["h".into()]))
            .max_width(3);
        assert_eq!(table.render(), "+-----+\n| h   |\n+-----+\n| abc |\n+-----+");
    }

    #[test]
    fn pivot_turns_columns_into_rows() {
        let table = Table::new(rows(&[&["1", "2"]])).with_header(Some(vec!["x".into(), "y".into()]));
        assert_eq!(table.render_pivot(), "+---+---+\n| x | 1 |\n| y | 2 |\n+---+---+");
    }

    #[test]
    fn records_share_a_header() {
        let records = Value::from(serde_json::json!([{"a": 1}, {"b": "x", "a": 2}]));
        let Value::List(records) = records else { unreachable!() };
        let table = from_records(&records, None);
        assert_eq!(
            table.render(),
            "+---+---+\n| a | b |\n+---+---+\n| 1 |   |\n| 2 | x |\n+---+---+"
        );
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(Table::new(Vec::new()).render(), "");
    }
}
