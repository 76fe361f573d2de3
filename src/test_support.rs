// SPDX-License-Identifier: MPL-2.0
//! Fixtures shared by the unit tests: a small builder for export XML and a reader for the
//! rows written by the sink.

use quick_xml::escape::escape;
use std::fmt::Write as _;

use crate::dump_parser::EXPORT_NAMESPACE_0_10;

pub mod prelude {
    pub(crate) use super::{dump_xml, read_rows, TestPage};
    pub(crate) use crate::dump_parser::{ElementNames, EXPORT_NAMESPACE_0_10};
}

const HEADER: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.mediawiki.org/xml/export-0.10/ http://www.mediawiki.org/xml/export-0.10.xsd" version="0.10" xml:lang="en">
  <siteinfo>
    <sitename>Wikipedia</sitename>
    <dbname>enwiki</dbname>
    <base>https://en.wikipedia.org/wiki/Main_Page</base>
    <generator>MediaWiki 1.35.0-wmf.1</generator>
    <case>first-letter</case>
    <namespaces>
      <namespace key="-2" case="first-letter">Media</namespace>
      <namespace key="-1" case="first-letter">Special</namespace>
      <namespace key="0" case="first-letter" />
      <namespace key="1" case="first-letter">Talk</namespace>
      <namespace key="2" case="first-letter">User</namespace>
      <namespace key="3" case="first-letter">User talk</namespace>
      <namespace key="4" case="first-letter">Wikipedia</namespace>
      <namespace key="5" case="first-letter">Wikipedia talk</namespace>
    </namespaces>
  </siteinfo>
"#;

#[derive(Debug, Clone)]
pub struct TestPage {
    title: String,
    redirect: Option<String>,
    revisions: Vec<(String, Option<String>)>,
}

impl TestPage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            redirect: None,
            revisions: Vec::new(),
        }
    }

    pub fn redirect(mut self, target: &str) -> Self {
        self.redirect = Some(target.to_string());
        self
    }

    /// `None` produces an empty `<text />` element.
    pub fn revision(mut self, timestamp: &str, text: Option<&str>) -> Self {
        self.revisions
            .push((timestamp.to_string(), text.map(str::to_string)));
        self
    }
}

pub fn dump_xml(pages: &[TestPage]) -> String {
    debug_assert!(HEADER.contains(EXPORT_NAMESPACE_0_10));

    let mut xml = String::from(HEADER);
    let mut revision_id = 100;

    for (page_id, page) in pages.iter().enumerate() {
        let ns = if page.title.contains(':') { 1 } else { 0 };
        writeln!(xml, "  <page>").unwrap();
        writeln!(xml, "    <title>{}</title>", escape(page.title.as_str())).unwrap();
        writeln!(xml, "    <ns>{}</ns>", ns).unwrap();
        writeln!(xml, "    <id>{}</id>", page_id + 1).unwrap();
        if let Some(target) = &page.redirect {
            writeln!(xml, "    <redirect title=\"{}\" />", escape(target.as_str())).unwrap();
        }
        for (timestamp, text) in &page.revisions {
            revision_id += 1;
            writeln!(xml, "    <revision>").unwrap();
            writeln!(xml, "      <id>{}</id>", revision_id).unwrap();
            writeln!(xml, "      <timestamp>{}</timestamp>", timestamp).unwrap();
            writeln!(
                xml,
                "      <contributor>\n        <username>Tester</username>\n        <id>1</id>\n      </contributor>"
            )
            .unwrap();
            match text {
                Some(text) => writeln!(
                    xml,
                    "      <text bytes=\"{}\" xml:space=\"preserve\">{}</text>",
                    text.len(),
                    escape(text.as_str())
                )
                .unwrap(),
                None => writeln!(xml, "      <text bytes=\"0\" />").unwrap(),
            }
            writeln!(xml, "      <sha1>phoiac9h4m842xq45sp7s6u21eteeq1</sha1>").unwrap();
            writeln!(xml, "    </revision>").unwrap();
        }
        writeln!(xml, "  </page>").unwrap();
    }

    xml.push_str("</mediawiki>\n");
    xml
}

/// Parses the TAB-delimited output of the sink back into rows of fields.
pub fn read_rows(output: &[u8]) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_reader(output);

    reader
        .records()
        .map(|record| {
            record
                .unwrap()
                .iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}
