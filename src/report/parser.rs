//! Streaming parse of crash submission documents.
//!
//! One forward pass over the XML token stream — no DOM, no backtracking —
//! so arbitrarily large log bodies never require buffering the whole
//! document. Log bodies typically arrive wrapped in CDATA sections that the
//! tokenizer reports as separate chunks, so field text accumulates every
//! text and CDATA event between a start tag and its matching end tag.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::validate::{validate_field, version_classes};
use super::{IncomingReport, ParseError};
use crate::config::IngestSettings;

/// Byte caps applied while accumulating field text.
///
/// Bounds total parser work on adversarial input; exceeding a cap rejects
/// the submission with [`ParseError::FieldTooLarge`].
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    /// Cap for the `log` element body.
    pub max_log_bytes: usize,
    /// Cap for every other report field.
    pub max_field_bytes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_log_bytes: 256 * 1024,
            max_field_bytes: 512,
        }
    }
}

impl From<&IngestSettings> for ParseLimits {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            max_log_bytes: settings.max_log_bytes,
            max_field_bytes: settings.max_field_bytes,
        }
    }
}

/// Report fields recognised inside a `crashlog` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Version,
    CrashAppVersion,
    StartMemory,
    EndMemory,
    Contact,
    Log,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"version" => Some(Self::Version),
            b"crashappversion" => Some(Self::CrashAppVersion),
            b"startmemory" => Some(Self::StartMemory),
            b"endmemory" => Some(Self::EndMemory),
            b"contact" => Some(Self::Contact),
            b"log" => Some(Self::Log),
            _ => None,
        }
    }

    fn element(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::CrashAppVersion => "crashappversion",
            Self::StartMemory => "startmemory",
            Self::EndMemory => "endmemory",
            Self::Contact => "contact",
            Self::Log => "log",
        }
    }

    fn cap(self, limits: &ParseLimits) -> usize {
        match self {
            Self::Log => limits.max_log_bytes,
            _ => limits.max_field_bytes,
        }
    }
}

/// Field values accumulated during the pass.
#[derive(Debug, Default)]
struct Accumulator {
    app_version: String,
    crash_app_version: String,
    start_memory: String,
    end_memory: String,
    contact: String,
    log_text: String,
}

impl Accumulator {
    fn reset(&mut self) {
        self.app_version.clear();
        self.crash_app_version.clear();
        self.start_memory.clear();
        self.end_memory.clear();
        self.contact.clear();
        self.log_text.clear();
    }

    fn slot_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Version => &mut self.app_version,
            Field::CrashAppVersion => &mut self.crash_app_version,
            Field::StartMemory => &mut self.start_memory,
            Field::EndMemory => &mut self.end_memory,
            Field::Contact => &mut self.contact,
            Field::Log => &mut self.log_text,
        }
    }

    fn to_report(&self) -> IncomingReport {
        IncomingReport {
            app_version: self.app_version.clone(),
            crash_app_version: self.crash_app_version.clone(),
            start_memory: self.start_memory.clone(),
            end_memory: self.end_memory.clone(),
            contact: self.contact.clone(),
            log_text: self.log_text.clone(),
        }
    }
}

/// Parse one submission document into an [`IncomingReport`].
///
/// Returns `Ok(None)` when the document never yields a complete report
/// (no `log` content or no `version`) — the submission is dropped rather
/// than rejected. A `crashlog` start element resets previously accumulated
/// fields; a report is complete at the `log` end tag, so with multiple
/// `crashlog` elements in one stream the last complete one wins.
///
/// `crashappversion` is validated the moment its end tag is seen, before
/// the value can reach any catalog query (fail-closed).
///
/// # Errors
///
/// [`ParseError::Malformed`] for broken markup, [`ParseError::FieldTooLarge`]
/// past a byte cap, [`ParseError::InvalidField`] when `crashappversion`
/// fails its character-class contract.
pub fn parse_submission(
    xml: &str,
    limits: &ParseLimits,
) -> Result<Option<IncomingReport>, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut fields = Accumulator::default();
    let mut current: Option<Field> = None;
    let mut complete: Option<IncomingReport> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == b"crashlog" {
                    fields.reset();
                    current = None;
                } else if let Some(field) = Field::from_name(name.as_ref()) {
                    fields.slot_mut(field).clear();
                    current = Some(field);
                }
            }
            Event::Text(t) => {
                if let Some(field) = current {
                    let chunk = t.unescape().map_err(quick_xml::Error::from)?;
                    append(&mut fields, field, &chunk, limits)?;
                }
            }
            Event::CData(c) => {
                if let Some(field) = current {
                    let raw = c.into_inner();
                    let chunk = String::from_utf8_lossy(&raw);
                    append(&mut fields, field, &chunk, limits)?;
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if let Some(field) = current {
                    if name.as_ref() == field.element().as_bytes() {
                        finish_field(&fields, field)?;
                        if field == Field::Log
                            && !fields.log_text.is_empty()
                            && !fields.app_version.is_empty()
                        {
                            complete = Some(fields.to_report());
                        }
                        current = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(complete)
}

fn append(
    fields: &mut Accumulator,
    field: Field,
    chunk: &str,
    limits: &ParseLimits,
) -> Result<(), ParseError> {
    let cap = field.cap(limits);
    let buf = fields.slot_mut(field);
    if buf.len().saturating_add(chunk.len()) > cap {
        return Err(ParseError::FieldTooLarge {
            field: field.element(),
            max: cap,
        });
    }
    buf.push_str(chunk);
    Ok(())
}

fn finish_field(fields: &Accumulator, field: Field) -> Result<(), ParseError> {
    if field == Field::CrashAppVersion
        && !validate_field(&fields.crash_app_version, version_classes(), 0, 0)
    {
        return Err(ParseError::InvalidField {
            field: field.element(),
        });
    }
    Ok(())
}
