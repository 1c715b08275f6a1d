use std::io;
use std::sync::OnceLock;

use anyhow::Result;
use anyhow::anyhow;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::records::ErrorAnnotation;
use crate::records::RawRecord;
use crate::records::Severity;

/// Marker pair delimiting the exact erroneous substring inside a span field.
pub const SPAN_OPEN: &str = "<v>";
pub const SPAN_CLOSE: &str = "</v>";

/// System message shared by every formatted record.
pub const SYSTEM_PROMPT: &str = "You are an annotator for the quality of machine translation. \
Your task is to identify errors and assess the quality of the translation.";

/// Grading instructions appended verbatim to every user message. The wording
/// is fixed; downstream consumers match against it.
pub const GRADING_INSTRUCTIONS: &str = "\nBased on the source and target sentences surrounded \
with triple backticks ('''), identify error types in the translation and classify them. \
Please identify all errors within each translated segment, up to a maximum of five. If \
there are more than five errors, identify only the five most severe. The format of your \
output should be a json object in single line format. Directly generate this output without \
any additional reasoning.\nThe categories of errors are: accuracy (addition, mistranslation, \
omission, untranslated text), fluency (character encoding, grammar, inconsistency, \
punctuation, register, spelling), locale convention (currency, date, name, telephone, or \
time format) style (awkward), terminology (inappropriate for context, inconsistent use), \
non-translation, other, or no-error.\nEach error is classified as one of three categories: \
major, minor, and neutral. Major errors inhibit comprehension of the text or disrupt the \
flow, but what the text is trying to say is still understandable. Minor errors are \
technically errors, but do not disrupt the flow or hinder comprehension. No-errors should \
be marked as neutral.\n";

/// Resolve a language code through the fixed table. Extending coverage means
/// extending this table; there is deliberately no fallback.
pub fn language_name(code: &str) -> Option<&'static str> {
    match code {
        "en" => Some("English"),
        "cz" => Some("Czech"),
        "zh" => Some("Chinese"),
        "de" => Some("German"),
        _ => None,
    }
}

/// How annotated error spans are carried into the assistant payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanMode {
    /// Drop span text entirely; only severity and category survive.
    #[default]
    None,
    /// Keep the full marked span fields as-is, markers included.
    Tag,
    /// Keep only the trimmed substring between the marker pair.
    Seg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// One formatted training example: exactly three messages, in order
/// system, user, assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedRecord {
    pub messages: Vec<ChatMessage>,
}

/// Error entry as embedded in the assistant payload. Which keys appear is
/// decided per entry by which span fields carry the marker pair; field order
/// here is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CleanedError {
    /// Both spans carry markers.
    Dual {
        src_span: Option<String>,
        tgt_span: Option<String>,
        severity: Severity,
        category: String,
    },
    /// Exactly one span carries markers; it is emitted under a single key.
    Single {
        span: Option<String>,
        severity: Severity,
        category: String,
    },
    /// No span information.
    Bare {
        severity: Severity,
        category: String,
    },
}

#[derive(Debug, Serialize)]
struct AssistantPayload {
    errors: Vec<CleanedError>,
}

/// Format one raw annotation record into a three-message chat example.
///
/// Pure except for the hard failure on a language code missing from the
/// fixed table, which aborts the record.
pub fn format_record(record: &RawRecord, mode: SpanMode) -> Result<FormattedRecord> {
    let src_code = record.lp.split('-').next().unwrap_or(&record.lp);
    let tgt_code = record.lp.split('-').next_back().unwrap_or(&record.lp);

    let src_lang = language_name(src_code)
        .ok_or_else(|| anyhow!("unknown language code '{src_code}' in pair '{}'", record.lp))?;
    let tgt_lang = language_name(tgt_code)
        .ok_or_else(|| anyhow!("unknown language code '{tgt_code}' in pair '{}'", record.lp))?;

    let mut user_content = format!(
        "{src_lang} source:\n'''{src}'''\n{tgt_lang} translation:\n'''{tgt}'''\n",
        src = record.src,
        tgt = record.tgt,
    );
    user_content.push_str(GRADING_INSTRUCTIONS);

    let payload = AssistantPayload {
        errors: clean_errors(&record.errors, mode),
    };

    Ok(FormattedRecord {
        messages: vec![
            ChatMessage {
                role: Role::System,
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: user_content,
            },
            ChatMessage {
                role: Role::Assistant,
                content: to_single_line_json(&payload)?,
            },
        ],
    })
}

/// Reduce annotations to the per-mode assistant shape, one entry per input
/// error, order preserved.
pub fn clean_errors(errors: &[ErrorAnnotation], mode: SpanMode) -> Vec<CleanedError> {
    errors.iter().map(|error| clean_error(error, mode)).collect()
}

fn clean_error(error: &ErrorAnnotation, mode: SpanMode) -> CleanedError {
    let severity = error.severity;
    let category = error.category.clone();

    if mode == SpanMode::None {
        return CleanedError::Bare { severity, category };
    }

    let src_marked = has_marker(error.src_span.as_deref());
    let tgt_marked = has_marker(error.tgt_span.as_deref());

    match (src_marked, tgt_marked) {
        (true, false) => CleanedError::Single {
            span: take_span(error.src_span.as_deref(), mode),
            severity,
            category,
        },
        (false, true) => CleanedError::Single {
            span: take_span(error.tgt_span.as_deref(), mode),
            severity,
            category,
        },
        (true, true) => CleanedError::Dual {
            src_span: take_span(error.src_span.as_deref(), mode),
            tgt_span: take_span(error.tgt_span.as_deref(), mode),
            severity,
            category,
        },
        // A full-sentence error with no marked span degrades to the bare
        // shape in every mode.
        (false, false) => CleanedError::Bare { severity, category },
    }
}

fn has_marker(span: Option<&str>) -> bool {
    span.map_or(false, |text| text.contains(SPAN_OPEN))
}

fn take_span(span: Option<&str>, mode: SpanMode) -> Option<String> {
    match mode {
        SpanMode::None => None,
        SpanMode::Tag => span.map(str::to_owned),
        SpanMode::Seg => span.and_then(extract_segment),
    }
}

/// Extract the trimmed substring between the first `<v>...</v>` pair, or
/// `None` when no complete pair is present. The miss is non-fatal and
/// serializes as `null`.
pub fn extract_segment(text: &str) -> Option<String> {
    span_regex()
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

fn span_regex() -> &'static Regex {
    static SPAN_RE: OnceLock<Regex> = OnceLock::new();
    SPAN_RE.get_or_init(|| Regex::new(r"<v>(.*?)</v>").expect("span marker regex is valid"))
}

/// Serialize with `", "` and `": "` separators, matching the reference
/// annotation spacing the corpus was published with.
fn to_single_line_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
