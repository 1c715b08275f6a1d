//! Core library for formatting MQM translation-quality annotation corpora
//! into chat-style instruction-tuning data.

pub mod config;
pub mod dataset;
pub mod format;
pub mod records;

pub use config::AppConfig;
pub use config::AppPaths;
pub use config::ConfigBundle;
pub use config::ResolvedDatasetConfig;
pub use config::load_or_initialize_config;
pub use dataset::TASK_NAME;
pub use dataset::TaskDescriptor;
pub use dataset::WmtDataset;
pub use format::ChatMessage;
pub use format::CleanedError;
pub use format::FormattedRecord;
pub use format::Role;
pub use format::SpanMode;
pub use format::format_record;
pub use records::ErrorAnnotation;
pub use records::RawRecord;
pub use records::Severity;
pub use records::load_records;
pub use records::write_formatted;
