// SPDX-License-Identifier: MPL-2.0
//! TAB-delimited output of extracted revisions.

use std::io::Write;

use compact_str::CompactString;

use crate::processor::PageType;

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub timestamp: String,
    pub lang: CompactString,
    /// Local title, without the namespace prefix.
    pub title: CompactString,
    pub page_type: PageType,
    /// Text inserted by the revision.
    pub text: String,
}

/// Writes rows with every field quoted, separated by TABs and terminated by CRLF. No
/// header row is written.
pub struct RecordSink<W: Write> {
    writer: csv::Writer<W>,
    rows_written: u64,
}

impl<W: Write> std::fmt::Debug for RecordSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> RecordSink<W> {
    pub fn new(writer: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::CRLF)
            .has_headers(false)
            .from_writer(writer);

        Self {
            writer,
            rows_written: 0,
        }
    }

    pub fn write_records(&mut self, records: &[OutputRecord]) -> Result<(), csv::Error> {
        for record in records {
            self.writer.write_record([
                record.timestamp.as_str(),
                record.lang.as_str(),
                record.title.as_str(),
                record.page_type.as_str(),
                record.text.as_str(),
            ])?;
        }
        self.rows_written += records.len() as u64;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flushes buffered rows and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W, std::io::Error> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|error| error.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::prelude::*;

    fn record(title: &str, page_type: PageType, text: &str) -> OutputRecord {
        OutputRecord {
            timestamp: "2001-01-01T00:00:00Z".into(),
            lang: "en".into(),
            title: title.into(),
            page_type,
            text: text.into(),
        }
    }

    #[test]
    fn every_field_is_quoted() {
        let mut sink = RecordSink::new(Vec::new());
        sink.write_records(&[record("Dog", PageType::Normal, "A dog barks.")])
            .unwrap();
        assert_eq!(sink.rows_written(), 1);

        let output = sink.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "\"2001-01-01T00:00:00Z\"\t\"en\"\t\"Dog\"\t\"normal\"\t\"A dog barks.\"\r\n"
        );
    }

    #[test]
    fn special_characters_survive() {
        let text = "He said \"woof\"\tthen\nleft";
        let mut sink = RecordSink::new(Vec::new());
        sink.write_records(&[
            record("Dog", PageType::Talk, text),
            record("Cat", PageType::Normal, ""),
        ])
        .unwrap();
        let output = sink.into_inner().unwrap();

        assert!(String::from_utf8_lossy(&output).contains("\"He said \"\"woof\"\"\tthen\nleft\""));

        let rows = read_rows(&output);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][3], "talk");
        assert_eq!(rows[0][4], text);
        assert_eq!(rows[1], ["2001-01-01T00:00:00Z", "en", "Cat", "normal", ""]);
    }

    #[test]
    fn nothing_written_for_empty_batch() {
        let mut sink = RecordSink::new(Vec::new());
        sink.write_records(&[]).unwrap();
        assert_eq!(sink.rows_written(), 0);
        assert!(sink.into_inner().unwrap().is_empty());
    }
}
