//! CSV dataset reader.
//!
//! Accepts both the raw export (`ID`, `Full Name`) and the cleaned dataset
//! (`ID`, `Full Name`, `strict_key`, ...). Column names are matched against
//! a few known aliases; the first non-empty alias wins per row.

use std::io::Read;
use std::path::Path;

use super::{RegistryError, SourceRow};

const ID_COLUMNS: &[&str] = &["id", "ID", "Id"];
const NAME_COLUMNS: &[&str] = &["name", "Full Name", "full_name", "FullName", "nombre", "Name"];
const STRICT_KEY_COLUMN: &str = "strict_key";

/// Positions of every present alias, in alias priority order.
fn column_positions(headers: &[String], aliases: &[&str]) -> Vec<usize> {
    aliases
        .iter()
        .filter_map(|alias| headers.iter().position(|h| h == alias))
        .collect()
}

fn first_non_empty<'r>(record: &'r csv::StringRecord, columns: &[usize]) -> Option<&'r str> {
    columns
        .iter()
        .filter_map(|&i| record.get(i))
        .find(|value| !value.is_empty())
}

/// Read every row of a dataset file.
pub fn read_source_rows(path: &Path) -> Result<Vec<SourceRow>, RegistryError> {
    let label = path.display().to_string();
    let file = std::fs::File::open(path)?;
    parse_source_rows(file, &label)
}

/// Parse dataset rows from any reader. `label` names the source in errors.
///
/// A row without an id or a name, or with a non-integer id, rejects the
/// whole load.
pub fn parse_source_rows<R: Read>(reader: R, label: &str) -> Result<Vec<SourceRow>, RegistryError> {
    let csv_error = |source: csv::Error| RegistryError::Csv {
        path: label.to_string(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let id_columns = column_positions(&headers, ID_COLUMNS);
    let name_columns = column_positions(&headers, NAME_COLUMNS);
    let key_column = headers.iter().position(|h| h == STRICT_KEY_COLUMN);

    if id_columns.is_empty() || name_columns.is_empty() {
        return Err(RegistryError::MissingColumns {
            path: label.to_string(),
            found: headers,
        });
    }

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let row = i + 1;

        let raw_id = first_non_empty(&record, &id_columns)
            .ok_or(RegistryError::MissingField { row, field: "id" })?;
        let id: i64 = raw_id.trim().parse().map_err(|_| RegistryError::InvalidId {
            row,
            value: raw_id.to_string(),
        })?;

        let full_name = first_non_empty(&record, &name_columns)
            .ok_or(RegistryError::MissingField { row, field: "name" })?;

        let strict_key = key_column
            .and_then(|i| record.get(i))
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        rows.push(SourceRow {
            id,
            full_name: full_name.to_string(),
            strict_key,
        });
    }

    tracing::debug!(path = label, rows = rows.len(), "dataset parsed");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_raw_export_columns() {
        let data = "ID,Full Name\n1,Juan Pérez\n2,\"Pérez, Juan\"\n";
        let rows = parse_source_rows(data.as_bytes(), "raw").unwrap();
        assert_eq!(
            rows,
            vec![SourceRow::new(1, "Juan Pérez"), SourceRow::new(2, "Pérez, Juan")]
        );
    }

    #[test]
    fn test_clean_dataset_with_strict_key() {
        let data = "ID,Full Name,name_strict,strict_key\n1,Dr. Ana Paz,ana paz,ana paz\n2,Luis,luis,\n";
        let rows = parse_source_rows(data.as_bytes(), "clean").unwrap();
        assert_eq!(rows[0].strict_key.as_deref(), Some("ana paz"));
        assert_eq!(rows[1].strict_key, None);
    }

    #[test]
    fn test_lowercase_aliases_and_padded_headers() {
        let data = " id , name \n 7 ,Maria\n";
        let rows = parse_source_rows(data.as_bytes(), "aliases").unwrap();
        assert_eq!(rows, vec![SourceRow::new(7, "Maria")]);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let data = "code,label\n1,Juan\n";
        assert!(matches!(
            parse_source_rows(data.as_bytes(), "bad"),
            Err(RegistryError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_missing_or_invalid_fields_reject_load() {
        let missing_name = "id,name\n1,Juan\n2,\n";
        assert!(matches!(
            parse_source_rows(missing_name.as_bytes(), "t"),
            Err(RegistryError::MissingField { row: 2, field: "name" })
        ));

        let bad_id = "id,name\nx1,Juan\n";
        assert!(matches!(
            parse_source_rows(bad_id.as_bytes(), "t"),
            Err(RegistryError::InvalidId { row: 1, .. })
        ));
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ID,Full Name").unwrap();
        writeln!(file, "3,Pedro Gómez").unwrap();

        let rows = read_source_rows(file.path()).unwrap();
        assert_eq!(rows, vec![SourceRow::new(3, "Pedro Gómez")]);
    }
}
