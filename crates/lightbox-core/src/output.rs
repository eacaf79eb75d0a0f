//! Site manifest output as JSON or JSON Lines.
//!
//! JSON writes the whole [`SiteReport`] as one document. JSON Lines writes one
//! record per collection, each tagged with a `kind`, so a consumer can stream
//! a large site without holding the full manifest.

use serde::Serialize;
use std::io::{self, Write};

use crate::collection::CollectionReport;
use crate::site::{CollectionFailure, SiteReport};

/// Manifest format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON document
    Json,
    /// One JSON record per line
    JsonLines,
}

impl OutputFormat {
    /// Parse a format name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }
}

/// One line of a JSON Lines manifest.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ManifestRecord<'a> {
    Collection(&'a CollectionReport),
    FailedCollection(&'a CollectionFailure),
}

/// Serializes manifests to any writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    records_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            records_written: 0,
        }
    }

    /// Write a single value as one JSON document or one line.
    pub fn write<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, value).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, value).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write a site report in the configured format.
    pub fn write_report(&mut self, report: &SiteReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write(report),
            OutputFormat::JsonLines => {
                for collection in &report.collections {
                    self.write(&ManifestRecord::Collection(collection))?;
                }
                for failure in &report.failed_collections {
                    self.write(&ManifestRecord::FailedCollection(failure))?;
                }
                Ok(())
            }
        }
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteTotals;
    use std::path::PathBuf;

    fn report() -> SiteReport {
        let collection = |name: &str| CollectionReport {
            name: name.to_string(),
            title: name.to_uppercase(),
            description: None,
            sortcode: 1,
            cover: None,
            items: vec![],
            failures: vec![],
        };
        SiteReport {
            collections: vec![collection("italy"), collection("japan")],
            failed_collections: vec![CollectionFailure {
                dir: PathBuf::from("/albums/broken"),
                error: "bad descriptor".to_string(),
            }],
            totals: SiteTotals {
                collections: 2,
                failed_collections: 1,
                ..SiteTotals::default()
            },
        }
    }

    #[test]
    fn test_json_report_is_one_document() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::Json, false);
        writer.write_report(&report()).unwrap();
        assert_eq!(writer.records_written(), 1);

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["collections"][1]["name"], "japan");
        assert_eq!(value["totals"]["failed_collections"], 1);
    }

    #[test]
    fn test_jsonl_report_has_one_line_per_collection() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::JsonLines, true);
        writer.write_report(&report()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "collection");
        assert_eq!(lines[0]["name"], "italy");
        assert_eq!(lines[2]["kind"], "failed_collection");
        assert_eq!(lines[2]["error"], "bad descriptor");
    }

    #[test]
    fn test_pretty_json_spans_lines() {
        let mut buffer = Vec::new();
        OutputWriter::new(&mut buffer, OutputFormat::Json, true)
            .write_report(&report())
            .unwrap();
        assert!(String::from_utf8(buffer).unwrap().lines().count() > 3);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("NDJSON"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("yaml"), None);
        assert_eq!(OutputFormat::JsonLines.extension(), "jsonl");
    }
}
