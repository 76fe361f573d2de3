// SPDX-License-Identifier: MPL-2.0
//! Turning dump events into output rows.
//!
//! [`RevisionProcessor`] is the [`DumpHandler`] that decides, page by page, whether a page is
//! extracted at all and, for those that are, diffs every revision against the text seen
//! before it. Rows of a page are queued and written once the page closes.

use std::{io::BufRead, io::Write, time::Instant};

use compact_str::CompactString;
use tracing::instrument;

use crate::{
    delta::{inserted_text, DiffAlgorithm},
    desired::DesiredPages,
    dump_parser::{DumpHandler, DumpParser, ElementNames, ParsingError},
    sink::{OutputRecord, RecordSink},
};

const PROGRESS_INTERVAL: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to parse dump")]
    Parsing(#[from] ParsingError),
    #[error("desired page {title:?} is a redirect")]
    Redirect { title: CompactString },
    #[error("failed to write output")]
    Csv(#[from] csv::Error),
    #[error("failed to flush output")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Normal,
    Talk,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Normal => "normal",
            PageType::Talk => "talk",
        }
    }
}

/// Which kinds of pages are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PageFilter {
    #[default]
    All,
    Talk,
    #[value(alias = "article")]
    Content,
}

impl PageFilter {
    fn accepts(self, page_type: PageType) -> bool {
        match (self, page_type) {
            (PageFilter::All, _) => true,
            (PageFilter::Talk, PageType::Talk) => true,
            (PageFilter::Content, PageType::Normal) => true,
            _ => false,
        }
    }
}

/// What the first revision of a page is diffed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextCarry {
    /// The empty string.
    #[default]
    PerPage,
    /// The last revision text of the previously extracted page.
    AcrossPages,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub lang: CompactString,
    /// Localized name of namespace 1, e.g. `Talk` or `Discussione`.
    pub talk_namespace: CompactString,
    pub page_filter: PageFilter,
    pub diff_algorithm: DiffAlgorithm,
    pub text_carry: TextCarry,
}

impl ProcessorConfig {
    pub fn new(lang: impl Into<CompactString>, talk_namespace: impl Into<CompactString>) -> Self {
        Self {
            lang: lang.into(),
            talk_namespace: talk_namespace.into(),
            page_filter: PageFilter::default(),
            diff_algorithm: DiffAlgorithm::default(),
            text_carry: TextCarry::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleClass<'a> {
    Article(&'a str),
    /// The title without the `<talk namespace>:` prefix.
    Talk(&'a str),
    /// Any other namespace, or more than one colon.
    Unsupported,
}

impl TitleClass<'_> {
    fn page_type(self) -> Option<PageType> {
        match self {
            TitleClass::Article(_) => Some(PageType::Normal),
            TitleClass::Talk(_) => Some(PageType::Talk),
            TitleClass::Unsupported => None,
        }
    }
}

pub fn classify_title<'a>(raw_title: &'a str, talk_namespace: &str) -> TitleClass<'a> {
    let mut segments = raw_title.split(':');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(title), None, None) => TitleClass::Article(title),
        (Some(prefix), Some(title), None) if prefix == talk_namespace => TitleClass::Talk(title),
        _ => TitleClass::Unsupported,
    }
}

#[derive(Debug)]
struct AcceptedPage {
    title: CompactString,
    page_type: PageType,
    timestamp: String,
}

#[derive(Debug, Default)]
enum PageState {
    #[default]
    Idle,
    Skipped,
    Accepting(AcceptedPage),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Every page of the dump.
    pub pages_seen: u64,
    /// Pages whose revisions were extracted.
    pub pages_processed: u64,
    pub records_written: u64,
}

pub struct RevisionProcessor<'a, W: Write> {
    config: ProcessorConfig,
    desired: &'a DesiredPages,
    sink: RecordSink<W>,
    page: PageState,
    previous_text: String,
    queue: Vec<OutputRecord>,
    stats: ProcessingStats,
}

impl<W: Write> std::fmt::Debug for RevisionProcessor<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionProcessor")
            .field("config", &self.config)
            .field("desired.len", &self.desired.len())
            .field("page", &self.page)
            .field("previous_text.len", &self.previous_text.len())
            .field("queue.len", &self.queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<'a, W: Write> RevisionProcessor<'a, W> {
    pub fn new(config: ProcessorConfig, desired: &'a DesiredPages, writer: W) -> Self {
        Self {
            config,
            desired,
            sink: RecordSink::new(writer),
            page: PageState::Idle,
            previous_text: String::new(),
            queue: Vec::new(),
            stats: ProcessingStats::default(),
        }
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats
    }

    /// Flushes the output and returns the writer together with the final counters.
    pub fn finish(self) -> Result<(W, ProcessingStats), ProcessError> {
        let stats = self.stats;
        let writer = self.sink.into_inner()?;
        Ok((writer, stats))
    }

    fn accept(&self, raw_title: &str) -> Option<AcceptedPage> {
        let class = classify_title(raw_title, &self.config.talk_namespace);
        let page_type = class.page_type()?;
        if !self.config.page_filter.accepts(page_type) {
            return None;
        }
        let title = match class {
            TitleClass::Article(title) | TitleClass::Talk(title) => title,
            TitleClass::Unsupported => return None,
        };
        if !self.desired.contains(title) {
            return None;
        }
        Some(AcceptedPage {
            title: CompactString::from(title),
            page_type,
            timestamp: String::new(),
        })
    }

    fn save(&mut self, text: &str) {
        let PageState::Accepting(page) = &self.page else {
            return;
        };

        let delta = inserted_text(&self.previous_text, text, self.config.diff_algorithm);
        self.previous_text.clear();
        self.previous_text.push_str(text);

        self.queue.push(OutputRecord {
            timestamp: page.timestamp.clone(),
            lang: self.config.lang.clone(),
            title: page.title.clone(),
            page_type: page.page_type,
            text: delta,
        });
    }
}

impl<W: Write> DumpHandler for RevisionProcessor<'_, W> {
    type Error = ProcessError;

    fn title(&mut self, raw_title: &str) -> Result<(), ProcessError> {
        if self.config.text_carry == TextCarry::PerPage {
            self.previous_text.clear();
        }

        self.page = match self.accept(raw_title) {
            Some(page) => {
                tracing::info!(
                    "Start processing desired page {} ({})",
                    page.title,
                    page.page_type.as_str()
                );
                PageState::Accepting(page)
            }
            None => {
                tracing::trace!(title = raw_title, "Skipping page");
                PageState::Skipped
            }
        };
        Ok(())
    }

    fn timestamp(&mut self, timestamp: &str) -> Result<(), ProcessError> {
        if let PageState::Accepting(page) = &mut self.page {
            page.timestamp.clear();
            page.timestamp.push_str(timestamp);
        }
        Ok(())
    }

    fn text(&mut self, text: Option<&str>) -> Result<(), ProcessError> {
        self.save(text.unwrap_or_default());
        Ok(())
    }

    fn redirect(&mut self) -> Result<(), ProcessError> {
        match &self.page {
            PageState::Accepting(page) => {
                tracing::error!(title = %page.title, "Desired page is a redirect");
                Err(ProcessError::Redirect {
                    title: page.title.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn page_end(&mut self) -> Result<(), ProcessError> {
        self.stats.pages_seen += 1;
        if self.stats.pages_seen % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                pages_seen = self.stats.pages_seen,
                pages_processed = self.stats.pages_processed,
                "Processed {} pages",
                self.stats.pages_seen
            );
        }

        if let PageState::Accepting(page) = std::mem::take(&mut self.page) {
            let started = Instant::now();
            self.sink.write_records(&self.queue)?;
            self.stats.pages_processed += 1;
            self.stats.records_written = self.sink.rows_written();
            tracing::debug!(
                title = %page.title,
                records = self.queue.len(),
                elapsed = ?started.elapsed(),
                "Flushed page records"
            );
        }
        self.queue.clear();
        Ok(())
    }
}

/// Streams the pages of a dump whose preamble has been read with
/// [`SiteInfo`](crate::site_info::SiteInfo) and writes the extracted rows to `writer`.
#[instrument(skip_all, fields(lang = %config.lang))]
pub fn process_dump<R: BufRead, W: Write>(
    reader: R,
    names: ElementNames,
    config: ProcessorConfig,
    desired: &DesiredPages,
    writer: W,
) -> Result<(W, ProcessingStats), ProcessError> {
    let mut parser = DumpParser::new(reader, names);
    let mut processor = RevisionProcessor::new(config, desired, writer);
    parser.run(&mut processor)?;
    processor.finish()
}
