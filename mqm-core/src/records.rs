use std::fs;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::format::FormattedRecord;

/// One annotated translation example as it appears in the corpus files.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    /// Language pair, source and target codes joined by `-` (e.g. `en-de`).
    pub lp: String,
    pub src: String,
    pub tgt: String,
    pub errors: Vec<ErrorAnnotation>,
}

/// One marked translation defect. The span fields are absent in the simple
/// corpus variant and may carry `<v>...</v>` markers in the extended one.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorAnnotation {
    pub severity: Severity,
    pub category: String,
    #[serde(default)]
    pub src_span: Option<String>,
    #[serde(default)]
    pub tgt_span: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Inhibits comprehension or disrupts the flow of the text.
    Major,
    /// Technically wrong but does not hinder comprehension.
    Minor,
    /// Used for no-error entries.
    Neutral,
}

/// Load raw annotation records from a JSONL file (one JSON object per line).
///
/// Blank lines are skipped; any unreadable or unparseable line fails the
/// whole load with the file and 1-based line number in the error chain.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open annotation file '{}'", path.display()))?;
    let reader = io::BufReader::new(file);

    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!(
                "failed to read line {} of '{}'",
                line_num + 1,
                path.display()
            )
        })?;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: RawRecord = serde_json::from_str(trimmed).with_context(|| {
            format!(
                "failed to parse record at line {} of '{}'",
                line_num + 1,
                path.display()
            )
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Write formatted records as JSONL, one compact `{"messages": [...]}` object
/// per line.
pub fn write_formatted(records: &[FormattedRecord], path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create output file '{}'", path.display()))?;
    let mut writer = io::BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer)?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush output file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SpanMode;
    use crate::format::format_record;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_records_and_skips_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "train.jsonl",
            concat!(
                r#"{"lp": "en-de", "src": "Hello", "tgt": "Hallo", "errors": []}"#,
                "\n\n   \n",
                r#"{"lp": "zh-en", "src": "你好", "tgt": "Hi", "errors": [{"severity": "minor", "category": "fluency"}]}"#,
                "\n",
            ),
        );

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lp, "en-de");
        assert_eq!(records[1].errors.len(), 1);
        assert_eq!(records[1].errors[0].severity, Severity::Minor);
        assert!(records[1].errors[0].src_span.is_none());
    }

    #[test]
    fn parse_error_names_file_and_line() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "bad.jsonl",
            concat!(
                r#"{"lp": "en-de", "src": "a", "tgt": "b", "errors": []}"#,
                "\n",
                r#"{"lp": "en-de", "src": "a"}"#,
                "\n",
            ),
        );

        let error = format!("{:#}", load_records(&path).unwrap_err());
        assert!(error.contains("line 2"), "unexpected error: {error}");
        assert!(error.contains("bad.jsonl"), "unexpected error: {error}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_records(&tmp.path().join("absent.jsonl"));
        assert!(result.is_err());
    }

    #[test]
    fn written_output_is_one_object_per_line() {
        let tmp = TempDir::new().unwrap();
        let record = RawRecord {
            lp: "en-de".to_string(),
            src: "Hello".to_string(),
            tgt: "Hallo".to_string(),
            errors: vec![],
        };
        let formatted = vec![
            format_record(&record, SpanMode::None).unwrap(),
            format_record(&record, SpanMode::None).unwrap(),
        ];

        let path = tmp.path().join("out.jsonl");
        write_formatted(&formatted, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["messages"].as_array().unwrap().len(), 3);
        }
    }
}
