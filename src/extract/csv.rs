//! CSV file extractor

use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, error, info, info_span, warn};

use super::encoding::Encoding;
use super::error::ExtractionError;
use super::{Extractor, base_metadata};
use crate::config::{ConfigurationError, StageOptions, overlay_settings, parse_settings};
use crate::dataset::{Column, Dataset, infer_from_text};

/// CSV extractor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvSettings {
    /// Byte encoding of the file
    pub encoding: String,
    /// Single-byte field delimiter
    pub delimiter: String,
    /// Raw records skipped before the header
    pub skip_rows: usize,
    /// Maximum number of data rows to read
    pub max_rows: Option<usize>,
    /// First remaining record holds column names
    pub has_header: bool,
    /// Refuse files larger than this
    pub max_file_bytes: Option<u64>,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            delimiter: ",".to_string(),
            skip_rows: 0,
            max_rows: None,
            has_header: true,
            max_file_bytes: None,
        }
    }
}

impl CsvSettings {
    fn encoding(&self) -> Result<Encoding, ConfigurationError> {
        self.encoding
            .parse()
            .map_err(|message| ConfigurationError::invalid("encoding", message))
    }

    fn delimiter(&self) -> Result<u8, ConfigurationError> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ConfigurationError::invalid(
                "delimiter",
                format!("'{}' must be a single byte", self.delimiter),
            )),
        }
    }

    fn check(&self) -> Result<(), ConfigurationError> {
        self.encoding()?;
        self.delimiter()?;
        Ok(())
    }
}

/// Reads delimited text files into datasets
#[derive(Debug)]
pub struct CsvExtractor {
    options: StageOptions,
    settings: CsvSettings,
    span: Span,
}

impl CsvExtractor {
    /// Build from stage options, rejecting unknown keys and bad values
    pub fn new(options: StageOptions) -> Result<Self, ConfigurationError> {
        let settings: CsvSettings = parse_settings("CSV extractor", &options)?;
        settings.check()?;
        Ok(Self {
            options,
            settings,
            span: info_span!("extractor", kind = "csv"),
        })
    }

    /// Build with default options
    pub fn with_defaults() -> Self {
        Self {
            options: StageOptions::new(),
            settings: CsvSettings::default(),
            span: info_span!("extractor", kind = "csv"),
        }
    }

    /// Effective static settings
    pub fn settings(&self) -> &CsvSettings {
        &self.settings
    }

    fn check_path(&self, source: &str) -> Result<(PathBuf, u64), ExtractionError> {
        if source.trim().is_empty() {
            return Err(ExtractionError::InvalidSource(source.to_string()));
        }
        let path = PathBuf::from(source);
        let meta = std::fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExtractionError::FileNotFound { path: path.clone() },
            _ => ExtractionError::Unreadable {
                path: path.clone(),
                source: e,
            },
        })?;
        if !meta.is_file() {
            return Err(ExtractionError::NotAFile { path });
        }
        if !has_csv_extension(&path) {
            warn!(path = %path.display(), "File does not have .csv extension");
        }
        Ok((path, meta.len()))
    }

    fn read_text(
        &self,
        path: &Path,
        size: u64,
        settings: &CsvSettings,
        encoding: Encoding,
    ) -> Result<String, ExtractionError> {
        if let Some(limit) = settings.max_file_bytes {
            if size > limit {
                return Err(ExtractionError::ResourceExhausted {
                    path: path.to_path_buf(),
                    message: format!("file is {size} bytes, limit is {limit}"),
                });
            }
        }

        let unreadable = |source| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(unreadable)?;
        let mut bytes = Vec::new();
        let capacity = usize::try_from(size).unwrap_or(usize::MAX);
        bytes
            .try_reserve_exact(capacity)
            .map_err(|e| ExtractionError::ResourceExhausted {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.read_to_end(&mut bytes).map_err(unreadable)?;

        encoding.decode(bytes).map_err(|failure| ExtractionError::Decode {
            path: path.to_path_buf(),
            encoding: encoding.to_string(),
            message: failure.message,
        })
    }

    fn parse(&self, path: &Path, text: &str, settings: &CsvSettings, delimiter: u8) -> Result<Dataset, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent {
                path: path.to_path_buf(),
            });
        }
        if let Some(line) = unbalanced_quote_line(text, delimiter) {
            return Err(ExtractionError::Malformed {
                path: path.to_path_buf(),
                line,
                message: "unbalanced quote, field never closed".to_string(),
            });
        }

        let malformed = |line: u64, message: String| ExtractionError::Malformed {
            path: path.to_path_buf(),
            line,
            message,
        };

        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        for _ in 0..settings.skip_rows {
            match records.next() {
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(malformed(error_line(&e), e.to_string())),
                None => break,
            }
        }

        let first = match records.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) => return Err(malformed(error_line(&e), e.to_string())),
            None => {
                return Err(ExtractionError::EmptyContent {
                    path: path.to_path_buf(),
                });
            }
        };

        let width = first.len();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        let limit = settings.max_rows.unwrap_or(usize::MAX);
        let names = if settings.has_header {
            header_names(first.iter())
        } else {
            if limit > 0 {
                push_row(path, &mut cells, first.iter())?;
            }
            (0..width).map(|i| format!("column_{i}")).collect()
        };

        let mut rows = cells.first().map(Vec::len).unwrap_or(0);
        while rows < limit {
            let record = match records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => return Err(malformed(error_line(&e), e.to_string())),
                None => break,
            };
            if record.len() > width {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(malformed(
                    line,
                    format!("expected {width} fields, saw {}", record.len()),
                ));
            }
            push_row(path, &mut cells, record.iter())?;
            rows += 1;
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| {
                let (data_type, values) = infer_from_text(raw);
                Column::with_type(name, data_type, values)
            })
            .collect();
        Dataset::new(columns).map_err(|e| malformed(0, e.to_string()))
    }
}

impl Extractor for CsvExtractor {
    fn kind(&self) -> &'static str {
        "csv"
    }

    fn extract(&self, source: &str, params: &StageOptions) -> Result<Dataset, ExtractionError> {
        let _enter = self.span.enter();
        let settings = overlay_settings("CSV extractor", &self.settings, params)
            .map_err(|e| ExtractionError::InvalidParams(e.to_string()))?;
        let encoding = settings
            .encoding()
            .map_err(|e| ExtractionError::InvalidParams(e.to_string()))?;
        let delimiter = settings
            .delimiter()
            .map_err(|e| ExtractionError::InvalidParams(e.to_string()))?;

        let result = self.check_path(source).and_then(|(path, size)| {
            info!(source = %path.display(), size, "Extracting data from CSV");
            let text = self.read_text(&path, size, &settings, encoding)?;
            self.parse(&path, &text, &settings, delimiter)
        });

        match &result {
            Ok(data) if data.is_empty() => warn!(source, "CSV file is empty"),
            Ok(data) => info!(
                source,
                rows = data.num_rows(),
                columns = data.num_columns(),
                "Successfully extracted rows"
            ),
            Err(e) => error!(source, kind = %e.kind(), error = %e, "CSV extraction failed"),
        }
        result
    }

    fn validate_source(&self, source: &str) -> bool {
        let _enter = self.span.enter();
        match self.check_path(source) {
            Ok((path, _)) => match File::open(&path) {
                Ok(_) => true,
                Err(e) => {
                    error!(source, error = %e, "CSV file is not readable");
                    false
                }
            },
            Err(e) => {
                error!(source, error = %e, "CSV source failed validation");
                false
            }
        }
    }

    fn metadata(&self, source: &str) -> StageOptions {
        let mut metadata = base_metadata(self.kind(), source, &self.options);
        match std::fs::metadata(source) {
            Ok(stats) => {
                metadata.insert("file_size_bytes".into(), stats.len().into());
                if let Ok(modified) = stats.modified() {
                    let modified: DateTime<Utc> = modified.into();
                    metadata.insert("file_modified".into(), modified.to_rfc3339().into());
                }
                metadata.insert("encoding".into(), self.settings.encoding.clone().into());
                metadata.insert("delimiter".into(), self.settings.delimiter.clone().into());
                metadata.insert("skip_rows".into(), self.settings.skip_rows.into());
                metadata.insert("max_rows".into(), self.settings.max_rows.into());
            }
            Err(e) => debug!(source, error = %e, "Could not read file metadata"),
        }
        metadata
    }

    fn config(&self) -> &StageOptions {
        &self.options
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn error_line(e: &::csv::Error) -> u64 {
    e.position().map(|p| p.line()).unwrap_or(0)
}

/// Line on which a never-closed quoted field starts
fn unbalanced_quote_line(text: &str, delimiter: u8) -> Option<u64> {
    let bytes = text.as_bytes();
    let mut line = 1u64;
    let mut field_start = true;
    let mut opened_at = None;
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if opened_at.is_some() {
            match byte {
                b'"' if bytes.get(i + 1) == Some(&b'"') => i += 1,
                b'"' => opened_at = None,
                b'\n' => line += 1,
                _ => {}
            }
        } else {
            match byte {
                b'"' if field_start => opened_at = Some(line),
                b'\n' => line += 1,
                _ => {}
            }
            field_start = byte == delimiter || byte == b'\n' || byte == b'\r';
        }
        i += 1;
    }
    opened_at
}

/// Unique, non-empty column names
fn header_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for (index, name) in raw.enumerate() {
        let base = match name.trim() {
            "" => format!("Unnamed: {index}"),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}

fn push_row<'a>(
    path: &Path,
    cells: &mut [Vec<Option<String>>],
    record: impl Iterator<Item = &'a str>,
) -> Result<(), ExtractionError> {
    let mut record = record;
    for column in cells.iter_mut() {
        column
            .try_reserve(1)
            .map_err(|e| ExtractionError::ResourceExhausted {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        column.push(record.next().map(str::to_string));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::dataset::{DataType, Value};
    use crate::extract::ExtractionErrorKind;

    const PEOPLE: &str = "id,name,age\n1,John,25\n2,Jane,30\n3,Bob,35\n";

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn options(value: serde_json::Value) -> StageOptions {
        value.as_object().cloned().unwrap()
    }

    fn no_params() -> StageOptions {
        StageOptions::new()
    }

    #[test]
    fn test_extract_rows() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "people.csv", PEOPLE.as_bytes());
        let data = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap();

        assert_eq!(data.num_rows(), 3);
        assert_eq!(data.column_names(), vec!["id", "name", "age"]);
        assert_eq!(data.column("id").unwrap().data_type, DataType::Integer);
        assert_eq!(data.column("name").unwrap().values[0], Value::Text("John".into()));
    }

    #[test]
    fn test_skip_rows_promotes_first_data_row() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "people.csv", PEOPLE.as_bytes());
        let extractor = CsvExtractor::new(options(json!({"skip_rows": 1}))).unwrap();
        let data = extractor.extract(&source, &no_params()).unwrap();

        assert_eq!(data.num_rows(), 2);
        assert_eq!(data.column_names(), vec!["1", "John", "25"]);
    }

    #[test]
    fn test_max_rows_keeps_file_order() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "people.csv", PEOPLE.as_bytes());
        let extractor = CsvExtractor::new(options(json!({"max_rows": 2}))).unwrap();
        let data = extractor.extract(&source, &no_params()).unwrap();

        assert_eq!(data.num_rows(), 2);
        assert_eq!(
            data.column("name").unwrap().values,
            vec![Value::Text("John".into()), Value::Text("Jane".into())]
        );
    }

    #[test]
    fn test_params_override_for_one_call() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "semi.csv", b"a;b\n1;2\n");
        let extractor = CsvExtractor::with_defaults();
        let params = options(json!({"delimiter": ";"}));

        let data = extractor.extract(&source, &params).unwrap();
        assert_eq!(data.num_columns(), 2);
        assert_eq!(extractor.settings().delimiter, ",");
        assert_eq!(extractor.extract(&source, &no_params()).unwrap().num_columns(), 1);
    }

    #[test]
    fn test_bad_params_rejected() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "people.csv", PEOPLE.as_bytes());
        let err = CsvExtractor::with_defaults()
            .extract(&source, &options(json!({"nrows": 2})))
            .unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::InvalidParams);
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "empty.csv", b"");
        let err = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::EmptyContent);
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_header_only_is_zero_rows() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "header.csv", b"id,name\n");
        let data = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap();
        assert_eq!(data.num_rows(), 0);
        assert_eq!(data.num_columns(), 2);
    }

    #[test]
    fn test_missing_and_directory_sources() {
        let dir = TempDir::new().unwrap();
        let extractor = CsvExtractor::with_defaults();

        let missing = dir.path().join("nope.csv");
        let err = extractor.extract(missing.to_str().unwrap(), &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::FileNotFound);

        let err = extractor.extract(dir.path().to_str().unwrap(), &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::NotAFile);

        let err = extractor.extract("  ", &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::InvalidSource);
    }

    #[test]
    fn test_unbalanced_quote_is_malformed() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "bad.csv", b"id,name\n1,\"John\n2,Jane\n");
        let err = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "pipes.csv", b"id,desc\n1,12\" pipe\n2,\"say \"\"hi\"\"\"\n");
        let data = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap();
        assert_eq!(data.num_rows(), 2);
        assert_eq!(
            data.column("desc").unwrap().values,
            vec![Value::from("12\" pipe"), Value::from("say \"hi\"")]
        );

        let source = write(&dir, "semi.csv", b"id;desc\n1;\"open\n");
        let extractor = CsvExtractor::new(options(json!({"delimiter": ";"}))).unwrap();
        let err = extractor.extract(&source, &no_params()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_too_many_fields_is_malformed() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "wide.csv", b"id,name\n1,John\n2,Jane,extra\n");
        let err = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::Malformed);
    }

    #[test]
    fn test_short_rows_padded_with_nulls() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "short.csv", b"id,name\n1,John\n2\n");
        let data = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap();
        assert_eq!(data.column("name").unwrap().values[1], Value::Null);
    }

    #[test]
    fn test_decode_error() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "latin.csv", b"name\ncaf\xe9\n");
        let err = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::Decode);

        let latin = CsvExtractor::new(options(json!({"encoding": "latin-1"}))).unwrap();
        let data = latin.extract(&source, &no_params()).unwrap();
        assert_eq!(data.column("name").unwrap().values[0], Value::Text("café".into()));
    }

    #[test]
    fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "people.csv", PEOPLE.as_bytes());
        let extractor = CsvExtractor::new(options(json!({"max_file_bytes": 8}))).unwrap();
        let err = extractor.extract(&source, &no_params()).unwrap_err();
        assert_eq!(err.kind(), ExtractionErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_no_header() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "raw.csv", b"1,John\n2,Jane\n");
        let extractor = CsvExtractor::new(options(json!({"has_header": false}))).unwrap();
        let data = extractor.extract(&source, &no_params()).unwrap();
        assert_eq!(data.num_rows(), 2);
        assert_eq!(data.column_names(), vec!["column_0", "column_1"]);

        let data = extractor
            .extract(&source, &options(json!({"max_rows": 0})))
            .unwrap();
        assert_eq!(data.num_rows(), 0);
        assert_eq!(data.num_columns(), 2);

        let data = extractor
            .extract(&source, &options(json!({"max_rows": 1})))
            .unwrap();
        assert_eq!(data.column("column_1").unwrap().values, vec![Value::from("John")]);
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "dup.csv", b"a,a,\n1,2,3\n");
        let data = CsvExtractor::with_defaults().extract(&source, &no_params()).unwrap();
        assert_eq!(data.column_names(), vec!["a", "a.1", "Unnamed: 2"]);
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(CsvExtractor::new(options(json!({"encoding": "ebcdic"}))).is_err());
        assert!(CsvExtractor::new(options(json!({"delimiter": "::"}))).is_err());
        assert!(CsvExtractor::new(options(json!({"sep": ","}))).is_err());
    }

    #[test]
    fn test_validate_source_never_fails() {
        let dir = TempDir::new().unwrap();
        let extractor = CsvExtractor::with_defaults();
        let txt = write(&dir, "data.txt", PEOPLE.as_bytes());

        assert!(extractor.validate_source(&txt));
        assert!(!extractor.validate_source(""));
        assert!(!extractor.validate_source(dir.path().to_str().unwrap()));
        assert!(!extractor.validate_source("/definitely/not/here.csv"));
    }

    #[test]
    fn test_metadata() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "people.csv", PEOPLE.as_bytes());
        let extractor = CsvExtractor::new(options(json!({"delimiter": ","}))).unwrap();

        let metadata = extractor.metadata(&source);
        assert_eq!(metadata["extractor_type"], json!("csv"));
        assert_eq!(metadata["file_size_bytes"], json!(PEOPLE.len()));
        assert_eq!(metadata["max_rows"], json!(null));
        assert!(metadata.contains_key("file_modified"));

        let missing = extractor.metadata("/no/such/file.csv");
        assert!(!missing.contains_key("file_size_bytes"));
        assert_eq!(missing["source"], json!("/no/such/file.csv"));
    }
}
