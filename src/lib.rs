// SPDX-License-Identifier: MPL-2.0
//! # wikidelta
//!
//! Extracts, from a MediaWiki full-history XML dump, the text each revision of a selected set of
//! pages actually added.
//!
//! ## Overview
//!
//! `wikidelta` streams a dump (plain, bzip2 or zstd compressed) once from start to end. Every page
//! is classified as an article or a talk page and checked against an allow-list of titles. For
//! the pages that pass, each revision's text is diffed against the text seen before it and the
//! inserted spans are written as one TAB-delimited row per revision:
//!
//! ```text
//! "2001-01-02T00:00:00Z"	"en"	"Dog"	"normal"	" It wags its tail."
//! ```
//!
//! **Key Features:**
//!
//! - **Constant Memory**: Only the open-element stack and the current revision text are held, no
//!   matter how large the dump is.
//! - **Faithful Deltas**: The default alignment reproduces the classic longest-matching-block
//!   matcher, including its junk heuristic for long texts. Faster `histogram` and `myers`
//!   alignments are available through [`delta::DiffAlgorithm`].
//! - **Localized Namespaces**: The talk namespace prefix is read from the `<siteinfo>` section of
//!   the dump, so non-English dumps work without configuration.
//!
//! ## Usage
//!
//! ```rust
//! use std::io::Cursor;
//! use wikidelta::desired::DesiredPages;
//! use wikidelta::processor::{process_dump, ProcessorConfig};
//! use wikidelta::site_info::SiteInfo;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let xml = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
//!       <siteinfo><namespaces>
//!         <namespace key="0" />
//!         <namespace key="1">Talk</namespace>
//!       </namespaces></siteinfo>
//!       <page>
//!         <title>Dog</title>
//!         <revision><timestamp>2001-01-01T00:00:00Z</timestamp><text>A dog barks.</text></revision>
//!       </page>
//!     </mediawiki>"#;
//!
//!     // the preamble is read from its own reader, the pages from a fresh one
//!     let site_info = SiteInfo::read(Cursor::new(xml.as_bytes()))?;
//!     let config = ProcessorConfig::new("en", site_info.translations()?.talk);
//!     let desired = DesiredPages::new(["Dog"]);
//!
//!     let (output, stats) = process_dump(
//!         Cursor::new(xml.as_bytes()),
//!         site_info.element_names(),
//!         config,
//!         &desired,
//!         Vec::new(),
//!     )?;
//!
//!     assert_eq!(stats.records_written, 1);
//!     assert_eq!(
//!         String::from_utf8(output)?,
//!         "\"2001-01-01T00:00:00Z\"\t\"en\"\t\"Dog\"\t\"normal\"\t\"A dog barks.\"\r\n"
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`dump_parser`]: Event-driven scanning of the XML, calling a [`dump_parser::DumpHandler`]
//!   as elements close.
//! - [`site_info`]: Export namespace and namespace table from the dump preamble.
//! - [`processor`]: Page classification, the revision state machine and [`processor::process_dump`].
//! - [`delta`]: Text alignment and inserted-text extraction.
//! - [`desired`]: The allow-list of titles.
//! - [`sink`]: TAB-delimited output.
//! - [`input`]: Opening (compressed) dumps and parsing dump file names.
//!
//! ## Error Handling
//!
//! Every fallible operation returns a [`Result`] with a module-specific error type. A redirect
//! on a page that is being extracted is treated as corrupt input and aborts processing with
//! [`processor::ProcessError::Redirect`].
//!
//! ## License
//!
//! This project is licensed under the Mozilla Public License 2.0.
pub mod delta;
pub mod desired;
pub mod dump_parser;
pub mod input;
pub mod processor;
pub mod sink;
pub mod site_info;

#[cfg(test)]
mod test_support;
