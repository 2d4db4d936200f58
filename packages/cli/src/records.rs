//! CSV record source and sink.
//!
//! Reads an exported case sheet (one header row, optionally preceded by
//! title rows), pulls the home-region and prior-country columns out as
//! [`CaseRecord`]s, and writes the sheet back with four coordinate columns
//! appended. Every other column is passed through untouched.

use std::io::{Read, Write};
use std::path::Path;

use case_geo_location_models::{CaseRecord, EnrichedRecord};

/// Default home-region column in the published case sheets.
pub const DEFAULT_HOME_COLUMN: &str = "DHB";

/// Default prior-country column in the published case sheets.
pub const DEFAULT_PRIOR_COLUMN: &str = "Last country before return";

/// Columns appended to the output, in order.
pub const OUTPUT_COLUMNS: [&str; 4] = [
    "DHB_Latitude",
    "DHB_Longitude",
    "Arrived_From_Latitude",
    "Arrived_From_Longitude",
];

/// Errors reading or writing case sheets.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sheet had no header row.
    #[error("No header row found (after skipping {skip_rows} row(s))")]
    MissingHeader {
        /// Number of rows skipped before the header.
        skip_rows: usize,
    },

    /// A required column is missing from the header row.
    #[error("Column {column:?} not found; available columns: {available}")]
    MissingColumn {
        /// The column that was looked for.
        column: String,
        /// Comma-separated header names.
        available: String,
    },

    /// The number of enriched records does not match the number of rows.
    #[error("Expected {expected} enriched record(s), got {actual}")]
    LengthMismatch {
        /// Rows in the sheet.
        expected: usize,
        /// Enriched records supplied.
        actual: usize,
    },
}

/// Which columns hold the place names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    /// Home-region column header.
    pub home: String,
    /// Prior-country column header.
    pub prior: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            home: DEFAULT_HOME_COLUMN.to_string(),
            prior: DEFAULT_PRIOR_COLUMN.to_string(),
        }
    }
}

/// A case sheet held in memory.
#[derive(Debug, Clone)]
pub struct CaseTable {
    headers: csv::StringRecord,
    rows: Vec<csv::StringRecord>,
}

impl CaseTable {
    /// Reads a sheet from `path`, skipping `skip_rows` rows before the
    /// header.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError`] if the file cannot be opened or parsed.
    pub fn read(path: &Path, skip_rows: usize) -> Result<Self, RecordsError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, skip_rows)
    }

    /// Reads a sheet from any reader.
    ///
    /// Cells are trimmed. Fully blank rows are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError`] if the CSV cannot be parsed or has no
    /// header row.
    pub fn from_reader<R: Read>(reader: R, skip_rows: usize) -> Result<Self, RecordsError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = reader.records().skip(skip_rows);

        let headers = records
            .next()
            .transpose()?
            .ok_or(RecordsError::MissingHeader { skip_rows })?;

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record);
        }

        Ok(Self { headers, rows })
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the sheet has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Result<usize, RecordsError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| RecordsError::MissingColumn {
                column: name.to_string(),
                available: self.headers.iter().collect::<Vec<_>>().join(", "),
            })
    }

    /// Extracts the case records. An empty prior-country cell becomes
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::MissingColumn`] if either column is absent.
    pub fn case_records(&self, columns: &ColumnNames) -> Result<Vec<CaseRecord>, RecordsError> {
        let home_idx = self.column_index(&columns.home)?;
        let prior_idx = self.column_index(&columns.prior)?;

        Ok(self
            .rows
            .iter()
            .map(|row| CaseRecord {
                home_region: row.get(home_idx).unwrap_or_default().to_string(),
                prior_country: row
                    .get(prior_idx)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string),
            })
            .collect())
    }

    /// Writes the sheet with the coordinate columns appended.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError`] if `enriched` does not line up with the
    /// rows or writing fails.
    pub fn write_enriched<W: Write>(
        &self,
        enriched: &[EnrichedRecord],
        writer: W,
    ) -> Result<(), RecordsError> {
        if enriched.len() != self.rows.len() {
            return Err(RecordsError::LengthMismatch {
                expected: self.rows.len(),
                actual: enriched.len(),
            });
        }

        let width = self
            .rows
            .iter()
            .map(csv::StringRecord::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or_default();

        let mut writer = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = padded(&self.headers, width);
        header.extend(OUTPUT_COLUMNS);
        writer.write_record(&header)?;

        for (row, record) in self.rows.iter().zip(enriched) {
            let mut out: Vec<String> = padded(row, width).into_iter().map(String::from).collect();
            out.push(record.home_lat.to_string());
            out.push(record.home_long.to_string());
            out.push(record.prior_lat.map(|v| v.to_string()).unwrap_or_default());
            out.push(record.prior_long.map(|v| v.to_string()).unwrap_or_default());
            writer.write_record(&out)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Writes the enriched sheet to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError`] if the file cannot be created or written.
    pub fn write_enriched_file(
        &self,
        enriched: &[EnrichedRecord],
        path: &Path,
    ) -> Result<(), RecordsError> {
        let file = std::fs::File::create(path)?;
        self.write_enriched(enriched, std::io::BufWriter::new(file))
    }
}

fn padded(record: &csv::StringRecord, width: usize) -> Vec<&str> {
    let mut cells: Vec<&str> = record.iter().collect();
    cells.resize(width, "");
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_geo_location_models::CoordinateEntry;

    const SHEET: &str = "\
Date notified of potential case,Sex,Age group,DHB,Overseas travel,Last country before return
2020-03-20,Female,20 to 29,Capital and Coast,Yes,Australia
2020-03-21,Male,50 to 59,Waikato,No,
2020-03-21,Male,60 to 69, MidCentral ,No,New Zealand
";

    #[test]
    fn extracts_home_and_prior_columns() {
        let table = CaseTable::from_reader(SHEET.as_bytes(), 0).unwrap();
        let records = table.case_records(&ColumnNames::default()).unwrap();

        assert_eq!(
            records,
            vec![
                CaseRecord::new("Capital and Coast", Some("Australia")),
                CaseRecord::new("Waikato", None),
                CaseRecord::new("MidCentral", Some("New Zealand")),
            ]
        );
    }

    #[test]
    fn skips_title_rows_before_header() {
        let sheet = format!("Confirmed cases\nAs at 10:00am\n{SHEET}");
        let table = CaseTable::from_reader(sheet.as_bytes(), 2).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn missing_column_lists_available_headers() {
        let table = CaseTable::from_reader(SHEET.as_bytes(), 0).unwrap();
        let err = table
            .case_records(&ColumnNames {
                home: "Region".to_string(),
                prior: DEFAULT_PRIOR_COLUMN.to_string(),
            })
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("\"Region\""));
        assert!(message.contains("DHB"));
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(
            CaseTable::from_reader("".as_bytes(), 0),
            Err(RecordsError::MissingHeader { skip_rows: 0 })
        ));
    }

    #[test]
    fn writes_coordinate_columns() {
        let table = CaseTable::from_reader(SHEET.as_bytes(), 0).unwrap();
        let records = table.case_records(&ColumnNames::default()).unwrap();
        let wellington = CoordinateEntry::new(-41.2887953, 174.7772114);
        let enriched = vec![
            EnrichedRecord::new(
                records[0].clone(),
                wellington,
                Some(CoordinateEntry::new(-24.776109, 134.755)),
            ),
            EnrichedRecord::new(records[1].clone(), CoordinateEntry::new(-37.5, 175.5), None),
            EnrichedRecord::new(records[2].clone(), CoordinateEntry::new(-40.5, 175.5), None),
        ];

        let mut out = Vec::new();
        table.write_enriched(&enriched, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Date notified of potential case,Sex,Age group,DHB,Overseas travel,\
             Last country before return,DHB_Latitude,DHB_Longitude,\
             Arrived_From_Latitude,Arrived_From_Longitude"
        );
        assert_eq!(
            lines[1],
            "2020-03-20,Female,20 to 29,Capital and Coast,Yes,Australia,\
             -41.2887953,174.7772114,-24.776109,134.755"
        );
        assert_eq!(lines[2], "2020-03-21,Male,50 to 59,Waikato,No,,-37.5,175.5,,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let table = CaseTable::from_reader(SHEET.as_bytes(), 0).unwrap();
        let err = table.write_enriched(&[], Vec::<u8>::new()).unwrap_err();
        assert!(matches!(
            err,
            RecordsError::LengthMismatch {
                expected: 3,
                actual: 0
            }
        ));
    }
}
