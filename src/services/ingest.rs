//! Turns tabular source rows into document records.
//!
//! Record text is a fixed, labeled rendering of the schema fields so the same
//! row always embeds to the same vector. Every source field is kept in the
//! record metadata together with the row ordinal under [`DOC_INDEX_KEY`].

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{IngestionFieldError, SourceError};
use crate::models::{
    DOC_INDEX_KEY, DocumentRecord, Metadata, MetadataValue, RecordSchema, SourceFormat, SourceRow,
};
use crate::utils::normalize_whitespace;

/// Records built from a set of rows, plus the rows that were skipped.
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub records: Vec<DocumentRecord>,
    pub skipped: Vec<IngestionFieldError>,
}

/// Builds [`DocumentRecord`]s for one named corpus source.
#[derive(Debug, Clone)]
pub struct RecordIngestor {
    schema: RecordSchema,
    source_id: String,
}

impl RecordIngestor {
    pub fn new(source: &str, schema: RecordSchema) -> Self {
        Self {
            schema,
            source_id: DocumentRecord::source_id(source),
        }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Build the record for one row, or report the first missing schema field.
    pub fn build_record(&self, row: &SourceRow) -> Result<DocumentRecord, IngestionFieldError> {
        let mut lines = Vec::with_capacity(self.schema.fields.len());
        for field in &self.schema.fields {
            let value = row
                .get(&field.column)
                .filter(|v| !v.is_blank())
                .ok_or_else(|| IngestionFieldError::missing(row.ordinal, &field.column))?;
            lines.push(format!(
                "{}: {}",
                field.label,
                normalize_whitespace(&value.to_string())
            ));
        }

        let mut metadata: Metadata = row
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        metadata.insert(
            DOC_INDEX_KEY.to_string(),
            MetadataValue::Integer(row.ordinal as i64),
        );

        let id = DocumentRecord::generate_id(&self.source_id, row.ordinal);
        Ok(DocumentRecord::new(id, lines.join("\n"), metadata))
    }

    /// Build records for all rows, skipping and logging rows that lack fields.
    pub fn ingest_rows<I>(&self, rows: I) -> IngestBatch
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let mut batch = IngestBatch::default();
        for row in rows {
            match self.build_record(&row) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    tracing::warn!(row = e.row, field = %e.field, "skipping row: {}", e.reason);
                    batch.skipped.push(e);
                }
            }
        }
        batch
    }
}

/// Read all rows of a corpus file, choosing the parser by extension.
pub fn read_rows(path: &Path) -> Result<Vec<SourceRow>, SourceError> {
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| SourceError::UnsupportedFormat(path.display().to_string()))?;
    let file = File::open(path)?;
    match format {
        SourceFormat::Csv => parse_csv(file),
        SourceFormat::Jsonl => parse_jsonl(BufReader::new(file)),
    }
}

/// Parse CSV with a header row. Short rows simply lack the trailing fields.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<SourceRow>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (ordinal, result) in reader.records().enumerate() {
        let record = result?;
        let mut row = SourceRow::new(ordinal);
        for (name, raw) in headers.iter().zip(record.iter()) {
            row.fields.push((name.to_string(), MetadataValue::infer(raw)));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Parse JSON Lines, one object per non-blank line.
///
/// Scalars keep their JSON type; `null` becomes empty text and nested
/// arrays or objects are kept as their JSON text.
pub fn parse_jsonl<R: BufRead>(reader: R) -> Result<Vec<SourceRow>, SourceError> {
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(&line).map_err(|source| SourceError::Json {
                line: idx + 1,
                source,
            })?;
        let serde_json::Value::Object(object) = value else {
            return Err(SourceError::NotAnObject(idx + 1));
        };

        let mut row = SourceRow::new(rows.len());
        for (name, value) in object {
            row.fields.push((name, json_to_metadata(value)));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn json_to_metadata(value: serde_json::Value) -> MetadataValue {
    use serde_json::Value;
    match value {
        Value::Null => MetadataValue::Text(String::new()),
        Value::Bool(b) => MetadataValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => MetadataValue::Integer(i),
            None => n
                .as_f64()
                .map(MetadataValue::Float)
                .unwrap_or_else(|| MetadataValue::Text(n.to_string())),
        },
        Value::String(s) => MetadataValue::Text(s),
        nested @ (Value::Array(_) | Value::Object(_)) => MetadataValue::Text(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextField;

    const CSV: &str = "\
Dish Name,Calories (kcal),Carbohydrates (g),Protein (g),Fats (g),Fibre (g)
Hot tea (Garam Chai),16.14,2.58,0.39,0.53,0
Instant coffee,23.16,3.65,0.64,0.75,0
,10,1,1,1,1
Espreso coffee,51.54,6.62,1.75,2.14,0
";

    fn ingestor() -> RecordIngestor {
        RecordIngestor::new("indian_food", RecordSchema::nutrition())
    }

    #[test]
    fn test_parse_csv_types_cells() {
        let rows = parse_csv(CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].ordinal, 0);
        assert_eq!(
            rows[0].get("Dish Name"),
            Some(&MetadataValue::from("Hot tea (Garam Chai)"))
        );
        assert_eq!(
            rows[0].get("Calories (kcal)"),
            Some(&MetadataValue::Float(16.14))
        );
        assert_eq!(rows[0].get("Fibre (g)"), Some(&MetadataValue::Integer(0)));
    }

    #[test]
    fn test_build_record_text_and_metadata() {
        let rows = parse_csv(CSV.as_bytes()).unwrap();
        let record = ingestor().build_record(&rows[1]).unwrap();

        assert_eq!(
            record.text,
            "Food: Instant coffee\nCalories (kcal): 23.16\nCarbohydrates (g): 3.65\n\
             Protein (g): 0.64\nFats (g): 0.75\nFiber (g): 0"
        );
        assert_eq!(record.metadata.len(), 7);
        assert_eq!(
            record.metadata.get(DOC_INDEX_KEY),
            Some(&MetadataValue::Integer(1))
        );
        for (name, value) in &rows[1].fields {
            assert_eq!(record.metadata.get(name), Some(value));
        }
    }

    #[test]
    fn test_build_record_is_deterministic() {
        let rows = parse_csv(CSV.as_bytes()).unwrap();
        let a = ingestor().build_record(&rows[0]).unwrap();
        let b = ingestor().build_record(&rows[0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_blank_required_field_is_skipped() {
        let rows = parse_csv(CSV.as_bytes()).unwrap();
        let batch = ingestor().ingest_rows(rows);

        assert_eq!(batch.records.len(), 3);
        assert_eq!(
            batch.skipped,
            vec![IngestionFieldError::missing(2, "Dish Name")]
        );
    }

    #[test]
    fn test_short_csv_row_is_skipped() {
        let csv = "name,kcal\nApple,95\nBanana\n";
        let schema = RecordSchema::new(vec![
            TextField::new("Food", "name"),
            TextField::new("Calories", "kcal"),
        ]);
        let batch = RecordIngestor::new("fruit", schema).ingest_rows(parse_csv(csv.as_bytes()).unwrap());

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].text, "Food: Apple\nCalories: 95");
        assert_eq!(batch.skipped[0].row, 1);
        assert_eq!(batch.skipped[0].field, "kcal");
    }

    #[test]
    fn test_text_whitespace_is_normalized() {
        let row = SourceRow::new(0)
            .with_field("name", "  Masala \t dosa ")
            .with_field("kcal", 168_i64);
        let schema = RecordSchema::new(vec![
            TextField::new("Food", "name"),
            TextField::new("Calories", "kcal"),
        ]);
        let record = RecordIngestor::new("s", schema).build_record(&row).unwrap();

        assert_eq!(record.text, "Food: Masala dosa\nCalories: 168");
        assert_eq!(
            record.metadata.get("name"),
            Some(&MetadataValue::from("  Masala \t dosa "))
        );
    }

    #[test]
    fn test_parse_jsonl() {
        let input = r#"{"name": "Apple", "kcal": 95, "fat": 0.3, "fresh": true, "tags": ["fruit"]}

{"name": "Rice", "kcal": 206, "fat": null}
"#;
        let rows = parse_jsonl(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].ordinal, 1);
        assert_eq!(rows[0].get("kcal"), Some(&MetadataValue::Integer(95)));
        assert_eq!(rows[0].get("fat"), Some(&MetadataValue::Float(0.3)));
        assert_eq!(rows[0].get("fresh"), Some(&MetadataValue::Bool(true)));
        assert_eq!(rows[0].get("tags"), Some(&MetadataValue::from(r#"["fruit"]"#)));
        assert!(rows[1].get("fat").unwrap().is_blank());
    }

    #[test]
    fn test_parse_jsonl_rejects_non_objects() {
        let err = parse_jsonl("[1, 2]\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SourceError::NotAnObject(1)));

        let err = parse_jsonl("{\"ok\": 1}\n{broken\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SourceError::Json { line: 2, .. }));
    }

    #[test]
    fn test_read_rows_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("food.csv");
        std::fs::write(&csv_path, CSV).unwrap();
        assert_eq!(read_rows(&csv_path).unwrap().len(), 4);

        let txt_path = dir.path().join("food.txt");
        std::fs::write(&txt_path, CSV).unwrap();
        assert!(matches!(
            read_rows(&txt_path),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_ids_stable_across_runs() {
        let rows = parse_csv(CSV.as_bytes()).unwrap();
        let first = ingestor().ingest_rows(rows.clone());
        let second = ingestor().ingest_rows(rows);
        let ids = |b: &IngestBatch| b.records.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }
}
