use serde::Serialize;

/// Column names consumed from the `Foglio1` sheet. Missing columns degrade to
/// empty-string reads, never a hard failure.
pub const COL_LOCATION: &str = "LUOGO";
pub const COL_EVENT: &str = "TEST o GARA";
pub const COL_WEATHER: &str = "CONDIZIONI METEO E VENTO";
pub const COL_AIR_TEMP_START: &str = "TEMP. ARIA INIZIO";
pub const COL_AIR_TEMP_END: &str = "TEMP. ARIA FINE";
pub const COL_SNOW_TEMP_START: &str = "TEMP. NEVE INIZIO";
pub const COL_SNOW_TEMP_END: &str = "TEMP. NEVE FINE";
pub const COL_SNOW_TYPE: &str = "TIPO NEVE";
pub const COL_HUMIDITY_START: &str = "UMIDITA % INIZIO";
pub const COL_HUMIDITY_END: &str = "UMIDITA' % FINE";
pub const COL_CONSIDERATION: &str = "CONSIDERAZIONE POST GARA o TEST";

/// Ordered column names of a dataset; resolves names to cell positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cell value of `row` under the named column, empty when absent.
    pub fn value<'a>(&self, row: &'a Row, name: &str) -> &'a str {
        self.column_index(name)
            .and_then(|index| row.cells.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One dataset row; all cells are text, identity is positional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Row {
    cells: Vec<String>,
}

impl Row {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| cell.trim().is_empty())
    }
}

/// A maximal run of consecutive non-blank rows; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Group {
    rows: Vec<Row>,
}

impl Group {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub header: Header,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Builds a dataset from a raw text grid; the first row is the header,
    /// data rows are padded to the header width.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut iter = grid.into_iter();
        let header = Header::new(iter.next().unwrap_or_default());
        let width = header.len();
        let rows = iter
            .map(|mut cells| {
                if cells.len() < width {
                    cells.resize(width, String::new());
                }
                Row::new(cells)
            })
            .collect();
        Self { header, rows }
    }
}

/// Partitions rows into groups separated by fully-blank rows.
///
/// Separator rows are discarded; concatenating the emitted groups reproduces
/// the non-blank input rows in their original order.
pub fn group_rows(rows: Vec<Row>) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current: Vec<Row> = Vec::new();

    for row in rows {
        if row.is_blank() {
            if !current.is_empty() {
                groups.push(Group {
                    rows: std::mem::take(&mut current),
                });
            }
        } else {
            current.push(row);
        }
    }
    if !current.is_empty() {
        groups.push(Group { rows: current });
    }

    groups
}
