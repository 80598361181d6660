use std::io::Read;
use std::path::Path;

use sea_orm::DatabaseConnection;
use thiserror::Error;
use tracing::info;

use crate::db::services::catalog_service::{self, ImportSummary};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Row {row}: {message}")]
    InvalidRow { row: usize, message: String },
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Parses `name,measurement_unit` rows. A leading header row with exactly
/// those column names is skipped. Every row must have two non-empty fields.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<(String, String)>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        if row == 1
            && record.get(0) == Some("name")
            && record.get(1) == Some("measurement_unit")
        {
            continue;
        }
        if record.len() != 2 {
            return Err(ImportError::InvalidRow {
                row,
                message: format!("expected 2 fields, found {}", record.len()),
            });
        }
        let name = record.get(0).unwrap_or_default();
        let unit = record.get(1).unwrap_or_default();
        if name.is_empty() || unit.is_empty() {
            return Err(ImportError::InvalidRow {
                row,
                message: "name and measurement_unit must not be empty".to_string(),
            });
        }
        rows.push((name.to_string(), unit.to_string()));
    }
    Ok(rows)
}

pub async fn run(db: &DatabaseConnection, path: &Path) -> Result<ImportSummary, ImportError> {
    info!(path = %path.display(), "Importing ingredients.");
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    let rows = parse_rows(file)?;
    Ok(catalog_service::import_ingredients(db, rows).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_is_optional() {
        let with_header = "name,measurement_unit\nsalt,g\n\"flour, wheat\",kg\n";
        let rows = parse_rows(with_header.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                ("salt".to_string(), "g".to_string()),
                ("flour, wheat".to_string(), "kg".to_string()),
            ]
        );

        let without_header = "salt,g\n";
        assert_eq!(parse_rows(without_header.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn malformed_rows_abort_the_import() {
        let missing_unit = "salt,g\npepper,\n";
        assert!(matches!(
            parse_rows(missing_unit.as_bytes()),
            Err(ImportError::InvalidRow { row: 2, .. })
        ));
    }
}
