use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Serialize;

use crate::config::ResolvedDatasetConfig;
use crate::format::FormattedRecord;
use crate::format::SpanMode;
use crate::format::format_record;
use crate::records::load_records;

/// Task name attached to every loaded dataset.
pub const TASK_NAME: &str = "WMT";

/// Opaque tag identifying the downstream task a formatted dataset serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDescriptor {
    pub task_name: String,
}

/// In-memory formatted dataset: both splits fully loaded and formatted, plus
/// the task descriptor. Loading is strict and atomic; any bad record or
/// unreadable file fails the whole load.
#[derive(Debug)]
pub struct WmtDataset {
    pub train: Vec<FormattedRecord>,
    pub validation: Vec<FormattedRecord>,
    pub task: TaskDescriptor,
}

impl WmtDataset {
    pub fn load(train: &Path, validation: &Path, span_mode: SpanMode) -> Result<Self> {
        Ok(Self {
            train: load_split(train, span_mode, "train")?,
            validation: load_split(validation, span_mode, "validation")?,
            task: TaskDescriptor {
                task_name: TASK_NAME.to_string(),
            },
        })
    }

    pub fn from_config(dataset: &ResolvedDatasetConfig) -> Result<Self> {
        Self::load(&dataset.train, &dataset.validation, dataset.span_mode)
    }
}

fn load_split(path: &Path, span_mode: SpanMode, split: &str) -> Result<Vec<FormattedRecord>> {
    let records = load_records(path)
        .with_context(|| format!("failed to load the {split} split"))?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            format_record(record, span_mode).with_context(|| {
                format!("failed to format record {index} of the {split} split")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TRAIN: &str = concat!(
        r#"{"lp": "en-de", "src": "first", "tgt": "erste", "errors": []}"#,
        "\n",
        r#"{"lp": "en-de", "src": "second", "tgt": "zweite", "errors": [{"severity": "major", "category": "accuracy/omission"}]}"#,
        "\n",
    );
    const VALIDATION: &str = concat!(
        r#"{"lp": "zh-en", "src": "你好", "tgt": "hello", "errors": []}"#,
        "\n",
    );

    #[test]
    fn loads_both_splits_preserving_order() {
        let tmp = TempDir::new().unwrap();
        let train = tmp.path().join("train.jsonl");
        let validation = tmp.path().join("validation.jsonl");
        fs::write(&train, TRAIN).unwrap();
        fs::write(&validation, VALIDATION).unwrap();

        let dataset = WmtDataset::load(&train, &validation, SpanMode::None).unwrap();

        assert_eq!(dataset.task.task_name, "WMT");
        assert_eq!(dataset.train.len(), 2);
        assert_eq!(dataset.validation.len(), 1);
        assert!(dataset.train[0].messages[1].content.contains("'''first'''"));
        assert!(dataset.train[1].messages[1].content.contains("'''second'''"));
        assert!(dataset.validation[0].messages[1].content.contains("'''你好'''"));
    }

    #[test]
    fn one_bad_record_fails_the_whole_load() {
        let tmp = TempDir::new().unwrap();
        let train = tmp.path().join("train.jsonl");
        let validation = tmp.path().join("validation.jsonl");
        // Second validation record uses a code outside the language table.
        fs::write(&train, TRAIN).unwrap();
        fs::write(
            &validation,
            concat!(
                r#"{"lp": "zh-en", "src": "a", "tgt": "b", "errors": []}"#,
                "\n",
                r#"{"lp": "xx-en", "src": "a", "tgt": "b", "errors": []}"#,
                "\n",
            ),
        )
        .unwrap();

        let error = format!(
            "{:#}",
            WmtDataset::load(&train, &validation, SpanMode::None).unwrap_err()
        );
        assert!(error.contains("validation"), "unexpected error: {error}");
        assert!(error.contains("record 1"), "unexpected error: {error}");
        assert!(error.contains("xx"), "unexpected error: {error}");
    }

    #[test]
    fn missing_split_file_fails_the_load() {
        let tmp = TempDir::new().unwrap();
        let train = tmp.path().join("train.jsonl");
        fs::write(&train, TRAIN).unwrap();

        let result = WmtDataset::load(&train, &tmp.path().join("absent.jsonl"), SpanMode::None);
        assert!(result.is_err());
    }
}
