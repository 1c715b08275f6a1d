use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

use mqm_core::ConfigBundle;
use mqm_core::RawRecord;
use mqm_core::ResolvedDatasetConfig;
use mqm_core::Severity;
use mqm_core::SpanMode;
use mqm_core::WmtDataset;
use mqm_core::format_record;
use mqm_core::load_records;
use mqm_core::write_formatted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

pub fn handle_info(bundle: &ConfigBundle) -> Result<()> {
    println!("Config file: {}", bundle.paths.config_file.display());
    println!("Data dir:    {}", bundle.paths.data_dir.display());
    println!("State dir:   {}", bundle.paths.state_dir.display());

    match bundle.config.resolve_dataset(&bundle.paths) {
        Ok(dataset) => {
            println!("\nDataset:");
            println!("  Train:      {}", dataset.train.display());
            println!("  Validation: {}", dataset.validation.display());
            println!("  Span mode:  {}", span_mode_name(dataset.span_mode));
        }
        Err(error) => {
            println!("\nDataset: not configured ({error:#})");
        }
    }

    Ok(())
}

pub fn handle_format(
    bundle: &ConfigBundle,
    train: Option<PathBuf>,
    validation: Option<PathBuf>,
    span_mode: Option<SpanMode>,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let dataset_config = resolved_dataset(bundle, train, validation, span_mode)?;

    if verbose {
        eprintln!("Loading train split from {}", dataset_config.train.display());
        eprintln!(
            "Loading validation split from {}",
            dataset_config.validation.display()
        );
    }

    let dataset = WmtDataset::from_config(&dataset_config)?;

    let output_dir = output.unwrap_or_else(|| bundle.paths.state_dir.join("formatted"));
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("failed to create output directory '{}'", output_dir.display())
    })?;

    let train_path = output_dir.join("train.jsonl");
    let validation_path = output_dir.join("validation.jsonl");
    write_formatted(&dataset.train, &train_path)?;
    write_formatted(&dataset.validation, &validation_path)?;

    let metadata = serde_json::json!({
        "task": dataset.task.task_name,
        "span_mode": span_mode_name(dataset_config.span_mode),
        "train_records": dataset.train.len(),
        "validation_records": dataset.validation.len(),
        "timestamp": chrono::Local::now().to_rfc3339(),
    });
    fs::write(
        output_dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    println!("✓ Formatted dataset written to {}", output_dir.display());
    println!("  Task: {}", dataset.task.task_name);
    println!("  Span mode: {}", span_mode_name(dataset_config.span_mode));
    println!("  Train:      {} records -> {}", dataset.train.len(), train_path.display());
    println!(
        "  Validation: {} records -> {}",
        dataset.validation.len(),
        validation_path.display()
    );

    Ok(())
}

pub fn handle_stats(
    bundle: &ConfigBundle,
    train: Option<PathBuf>,
    validation: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let dataset_config = resolved_dataset(bundle, train, validation, None)?;

    println!("\n{}", "=".repeat(60));
    println!("Dataset statistics");
    println!("{}", "=".repeat(60));

    for (split, path) in [
        ("train", &dataset_config.train),
        ("validation", &dataset_config.validation),
    ] {
        let records = load_records(path)
            .with_context(|| format!("failed to load the {split} split"))?;
        print_split_stats(split, &records, verbose);
    }

    Ok(())
}

fn print_split_stats(split: &str, records: &[RawRecord], verbose: bool) {
    let mut major = 0usize;
    let mut minor = 0usize;
    let mut neutral = 0usize;

    for record in records {
        for error in &record.errors {
            match error.severity {
                Severity::Major => major += 1,
                Severity::Minor => minor += 1,
                Severity::Neutral => neutral += 1,
            }
        }
    }

    println!("\n{split}: {} records", records.len());
    println!("  Errors: {} total", major + minor + neutral);
    println!("    major:   {major}");
    println!("    minor:   {minor}");
    println!("    neutral: {neutral}");

    if verbose {
        let mut pairs: Vec<(&str, usize)> = Vec::new();
        for record in records {
            match pairs.iter_mut().find(|(lp, _)| *lp == record.lp) {
                Some((_, count)) => *count += 1,
                None => pairs.push((&record.lp, 1)),
            }
        }
        pairs.sort_by(|a, b| b.1.cmp(&a.1));

        println!("  Language pairs:");
        for (lp, count) in pairs {
            println!("    {lp}: {count}");
        }
    }
}

pub fn handle_preview(
    bundle: &ConfigBundle,
    split: Split,
    count: usize,
    span_mode: Option<SpanMode>,
) -> Result<()> {
    let dataset_config = resolved_dataset(bundle, None, None, span_mode)?;
    let (name, path) = match split {
        Split::Train => ("train", &dataset_config.train),
        Split::Validation => ("validation", &dataset_config.validation),
    };

    let records = load_records(path)
        .with_context(|| format!("failed to load the {name} split"))?;

    if records.is_empty() {
        println!("No records in the {name} split.");
        return Ok(());
    }

    for (index, record) in records.iter().take(count).enumerate() {
        let formatted = format_record(record, dataset_config.span_mode)
            .with_context(|| format!("failed to format record {index} of the {name} split"))?;

        println!("\n{}", "-".repeat(60));
        println!("{name} record {index} ({})", record.lp);
        println!("{}", "-".repeat(60));
        println!("{}", serde_json::to_string_pretty(&formatted)?);
    }

    Ok(())
}

fn resolved_dataset(
    bundle: &ConfigBundle,
    train: Option<PathBuf>,
    validation: Option<PathBuf>,
    span_mode: Option<SpanMode>,
) -> Result<ResolvedDatasetConfig> {
    let mut dataset = bundle.config.resolve_dataset(&bundle.paths)?;

    if let Some(train) = train {
        dataset.train = train;
    }
    if let Some(validation) = validation {
        dataset.validation = validation;
    }
    if let Some(span_mode) = span_mode {
        dataset.span_mode = span_mode;
    }

    Ok(dataset)
}

fn span_mode_name(mode: SpanMode) -> &'static str {
    match mode {
        SpanMode::None => "none",
        SpanMode::Tag => "tag",
        SpanMode::Seg => "seg",
    }
}
