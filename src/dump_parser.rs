// SPDX-License-Identifier: MPL-2.0
//! Event-driven scanning of a MediaWiki XML export.
//!
//! [`DumpParser::run`] walks the document once and calls a [`DumpHandler`] whenever one of the
//! configured elements closes. Nothing but the stack of open elements and the text of the
//! element currently being collected is kept, so memory stays flat no matter how large the
//! dump is.

use std::{
    any::type_name_of_val,
    fmt::{self, Debug, Display},
    io::BufRead,
};

use quick_xml::{
    events::Event,
    name::{Namespace, ResolveResult},
    NsReader,
};
use tracing::instrument;

/// Namespace of the element names in current MediaWiki exports.
pub const EXPORT_NAMESPACE_0_10: &str = "http://www.mediawiki.org/xml/export-0.10/";

#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    #[error("XML error")]
    XmlError(#[from] quick_xml::Error),
    #[error("invalid UTF-8 in character data")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("unexpected end of file")]
    Eof,
    #[error("namespace {0} is not declared in the siteinfo section")]
    MissingNamespace(i32),
}

/// An element name, optionally bound to an XML namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementName {
    pub namespace: Option<String>,
    pub local: String,
}

impl ElementName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.to_string(),
        }
    }

    fn matches(&self, resolved: &ResolveResult, local: &[u8]) -> bool {
        if self.local.as_bytes() != local {
            return false;
        }
        match (&self.namespace, resolved) {
            (None, ResolveResult::Unbound) => true,
            (Some(expected), ResolveResult::Bound(Namespace(bound))) => {
                expected.as_bytes() == *bound
            }
            _ => false,
        }
    }
}

// Clark notation, `{namespace}local`
impl Display for ElementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{{{}}}{}", namespace, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// The elements the dispatcher reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNames {
    pub page: ElementName,
    pub title: ElementName,
    pub revision: ElementName,
    pub timestamp: ElementName,
    pub text: ElementName,
    pub redirect: ElementName,
}

impl ElementNames {
    pub fn in_namespace(namespace: Option<&str>) -> Self {
        Self {
            page: ElementName::new(namespace, "page"),
            title: ElementName::new(namespace, "title"),
            revision: ElementName::new(namespace, "revision"),
            timestamp: ElementName::new(namespace, "timestamp"),
            text: ElementName::new(namespace, "text"),
            redirect: ElementName::new(namespace, "redirect"),
        }
    }

    fn classify(&self, resolved: &ResolveResult, local: &[u8]) -> Tag {
        if self.page.matches(resolved, local) {
            Tag::Page
        } else if self.title.matches(resolved, local) {
            Tag::Title
        } else if self.revision.matches(resolved, local) {
            Tag::Revision
        } else if self.timestamp.matches(resolved, local) {
            Tag::Timestamp
        } else if self.text.matches(resolved, local) {
            Tag::Text
        } else if self.redirect.matches(resolved, local) {
            Tag::Redirect
        } else {
            Tag::Other
        }
    }
}

impl Default for ElementNames {
    fn default() -> Self {
        Self::in_namespace(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Page,      // <page>...</page>
    Title,     // <title>Talk:Dog</title>
    Revision,  // <revision>...</revision>
    Timestamp, // <timestamp>2003-12-05T06:41:50Z</timestamp>
    Text,      // <text bytes="20">blah</text> or <text deleted="deleted" />
    Redirect,  // <redirect title="Dog" />
    Other,
}

impl Tag {
    /// Tags whose character data is handed to the handler.
    fn has_value(self) -> bool {
        matches!(self, Tag::Title | Tag::Timestamp | Tag::Text)
    }
}

/// Callbacks invoked in document order as configured elements close.
///
/// Returning an error from any callback stops the scan and is passed through by
/// [`DumpParser::run`].
pub trait DumpHandler {
    type Error: From<ParsingError>;

    fn title(&mut self, title: &str) -> Result<(), Self::Error>;

    fn timestamp(&mut self, timestamp: &str) -> Result<(), Self::Error>;

    /// `None` when the element had no character data at all (`<text/>`, deleted revisions).
    fn text(&mut self, text: Option<&str>) -> Result<(), Self::Error>;

    fn redirect(&mut self) -> Result<(), Self::Error>;

    fn revision_end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn page_end(&mut self) -> Result<(), Self::Error>;
}

// what the event loop has to do once the borrow of the read buffer has ended
enum Step {
    Open(Tag),
    Empty(Tag),
    Close,
    Eof,
    Continue,
}

pub struct DumpParser<R: BufRead> {
    xml_parser: NsReader<R>,
    buf: Vec<u8>,
    names: ElementNames,
    current_path: Vec<Tag>,
    // character data of the innermost open element with a value
    text: String,
    has_text: bool,
}

impl<R: BufRead> Debug for DumpParser<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpParser")
            .field("xml_parser", &type_name_of_val(&self.xml_parser))
            // print buffer length and capacity
            .field("buf.len", &self.buf.len())
            .field("buf.capacity", &self.buf.capacity())
            .field("names", &self.names)
            .field("current_path", &self.current_path)
            .finish()
    }
}

impl<R: BufRead> DumpParser<R> {
    pub fn new(reader: R, names: ElementNames) -> Self {
        Self {
            xml_parser: NsReader::from_reader(reader),
            // preallocate 1 MiB for the buffer
            buf: Vec::with_capacity(1024 * 1024),
            names,
            current_path: Vec::new(),
            text: String::new(),
            has_text: false,
        }
    }

    pub fn element_names(&self) -> &ElementNames {
        &self.names
    }

    /// Scans the remaining document, dispatching to `handler`.
    ///
    /// Malformed XML and a document ending inside an open element are reported as
    /// [`ParsingError`]s; errors returned by the handler are passed through unchanged.
    #[instrument(skip_all)]
    pub fn run<H: DumpHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        loop {
            self.buf.clear();

            let step = {
                let (resolved, event) = self
                    .xml_parser
                    .read_resolved_event_into(&mut self.buf)
                    .map_err(ParsingError::from)?;

                match event {
                    Event::Start(ref e) => {
                        Step::Open(self.names.classify(&resolved, e.local_name().as_ref()))
                    }
                    Event::Empty(ref e) => {
                        Step::Empty(self.names.classify(&resolved, e.local_name().as_ref()))
                    }
                    Event::Text(ref e) => {
                        if Self::collecting(&self.current_path) {
                            self.text
                                .push_str(&e.unescape().map_err(ParsingError::from)?);
                            self.has_text = true;
                        }
                        Step::Continue
                    }
                    Event::CData(ref e) => {
                        if Self::collecting(&self.current_path) {
                            self.text
                                .push_str(std::str::from_utf8(e).map_err(ParsingError::from)?);
                            self.has_text = true;
                        }
                        Step::Continue
                    }
                    Event::End(_) => Step::Close,
                    Event::Eof => Step::Eof,
                    _ => Step::Continue,
                }
            };

            match step {
                Step::Open(tag) => {
                    if tag.has_value() {
                        self.text.clear();
                        self.has_text = false;
                    }
                    self.current_path.push(tag);
                }
                Step::Empty(tag) => Self::dispatch(tag, None, handler)?,
                Step::Close => {
                    let Some(tag) = self.current_path.pop() else {
                        // quick-xml rejects unmatched end tags before we get here
                        tracing::error!(
                            message = "Unexpected end tag",
                            position = self.xml_parser.buffer_position()
                        );
                        return Err(ParsingError::Eof.into());
                    };
                    let value = (tag.has_value() && self.has_text).then_some(self.text.as_str());
                    Self::dispatch(tag, value, handler)?;
                }
                Step::Eof => {
                    if !self.current_path.is_empty() {
                        tracing::error!(current_path = ?self.current_path, "Dump ended inside an open element");
                        return Err(ParsingError::Eof.into());
                    }
                    return Ok(());
                }
                Step::Continue => {}
            }
        }
    }

    fn collecting(current_path: &[Tag]) -> bool {
        current_path.last().is_some_and(|tag| tag.has_value())
    }

    fn dispatch<H: DumpHandler>(
        tag: Tag,
        value: Option<&str>,
        handler: &mut H,
    ) -> Result<(), H::Error> {
        match tag {
            Tag::Title => handler.title(value.unwrap_or_default()),
            Tag::Timestamp => handler.timestamp(value.unwrap_or_default()),
            Tag::Text => handler.text(value),
            Tag::Redirect => handler.redirect(),
            Tag::Revision => handler.revision_end(),
            Tag::Page => handler.page_end(),
            Tag::Other => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dump_xml, TestPage};
    use std::io::Cursor;

    #[derive(Debug, PartialEq, Eq)]
    enum Seen {
        Title(String),
        Timestamp(String),
        Text(Option<String>),
        Redirect,
        RevisionEnd,
        PageEnd,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Seen>,
    }

    impl DumpHandler for Recorder {
        type Error = ParsingError;

        fn title(&mut self, title: &str) -> Result<(), ParsingError> {
            self.events.push(Seen::Title(title.to_string()));
            Ok(())
        }

        fn timestamp(&mut self, timestamp: &str) -> Result<(), ParsingError> {
            self.events.push(Seen::Timestamp(timestamp.to_string()));
            Ok(())
        }

        fn text(&mut self, text: Option<&str>) -> Result<(), ParsingError> {
            self.events.push(Seen::Text(text.map(str::to_string)));
            Ok(())
        }

        fn redirect(&mut self) -> Result<(), ParsingError> {
            self.events.push(Seen::Redirect);
            Ok(())
        }

        fn revision_end(&mut self) -> Result<(), ParsingError> {
            self.events.push(Seen::RevisionEnd);
            Ok(())
        }

        fn page_end(&mut self) -> Result<(), ParsingError> {
            self.events.push(Seen::PageEnd);
            Ok(())
        }
    }

    fn record(xml: &str, names: ElementNames) -> Result<Vec<Seen>, ParsingError> {
        let mut parser = DumpParser::new(Cursor::new(xml.as_bytes()), names);
        let mut recorder = Recorder::default();
        parser.run(&mut recorder)?;
        Ok(recorder.events)
    }

    fn qualified() -> ElementNames {
        ElementNames::in_namespace(Some(EXPORT_NAMESPACE_0_10))
    }

    #[test]
    fn events_arrive_in_document_order() {
        let xml = dump_xml(&[
            TestPage::new("Dog")
                .revision("2001-01-01T00:00:00Z", Some("A dog & a cat"))
                .revision("2001-01-02T00:00:00Z", None),
            TestPage::new("Cat")
                .redirect("Dog")
                .revision("2001-01-01T00:00:00Z", Some("#REDIRECT [[Dog]]")),
        ]);

        let events = record(&xml, qualified()).unwrap();
        assert_eq!(
            events,
            vec![
                Seen::Title("Dog".into()),
                Seen::Timestamp("2001-01-01T00:00:00Z".into()),
                Seen::Text(Some("A dog & a cat".into())),
                Seen::RevisionEnd,
                Seen::Timestamp("2001-01-02T00:00:00Z".into()),
                Seen::Text(None),
                Seen::RevisionEnd,
                Seen::PageEnd,
                Seen::Title("Cat".into()),
                Seen::Redirect,
                Seen::Timestamp("2001-01-01T00:00:00Z".into()),
                Seen::Text(Some("#REDIRECT [[Dog]]".into())),
                Seen::RevisionEnd,
                Seen::PageEnd,
            ]
        );
    }

    #[test]
    fn unqualified_names_do_not_match_namespaced_document() {
        let xml = dump_xml(&[TestPage::new("Dog").revision("2001-01-01T00:00:00Z", Some("x"))]);
        let events = record(&xml, ElementNames::default()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unqualified_names_match_plain_document() {
        let xml = "<mediawiki><page><title>Dog</title><revision>\
                   <timestamp>t</timestamp><text>one\ntwo</text></revision></page></mediawiki>";
        let events = record(xml, ElementNames::default()).unwrap();
        assert_eq!(
            events,
            vec![
                Seen::Title("Dog".into()),
                Seen::Timestamp("t".into()),
                Seen::Text(Some("one\ntwo".into())),
                Seen::RevisionEnd,
                Seen::PageEnd,
            ]
        );
    }

    #[test]
    fn cdata_is_collected_verbatim() {
        let xml = "<mediawiki><page><title>Dog</title><revision>\
                   <text><![CDATA[a <b> & c]]></text></revision></page></mediawiki>";
        let events = record(xml, ElementNames::default()).unwrap();
        assert_eq!(events[1], Seen::Text(Some("a <b> & c".into())));
    }

    #[test]
    fn empty_text_element_has_no_value() {
        let xml = "<mediawiki><page><title>Dog</title><revision>\
                   <text></text></revision></page></mediawiki>";
        let events = record(xml, ElementNames::default()).unwrap();
        assert_eq!(events[1], Seen::Text(None));
    }

    #[test]
    fn truncated_document_is_an_error() {
        let xml = "<mediawiki><page><title>Dog</title><revision><text>abc";
        assert!(record(xml, ElementNames::default()).is_err());
    }

    #[test]
    fn mismatched_end_tag_is_an_error() {
        let xml = "<mediawiki><page><title>Dog</page></title></mediawiki>";
        let result = record(xml, ElementNames::default());
        assert!(matches!(result, Err(ParsingError::XmlError(_))));
    }

    #[test]
    fn handler_errors_stop_the_scan() {
        struct FailOnRedirect(usize);

        impl DumpHandler for FailOnRedirect {
            type Error = ParsingError;

            fn title(&mut self, _: &str) -> Result<(), ParsingError> {
                self.0 += 1;
                Ok(())
            }
            fn timestamp(&mut self, _: &str) -> Result<(), ParsingError> {
                Ok(())
            }
            fn text(&mut self, _: Option<&str>) -> Result<(), ParsingError> {
                Ok(())
            }
            fn redirect(&mut self) -> Result<(), ParsingError> {
                Err(ParsingError::Eof)
            }
            fn page_end(&mut self) -> Result<(), ParsingError> {
                Ok(())
            }
        }

        let xml = dump_xml(&[
            TestPage::new("Cat").redirect("Dog"),
            TestPage::new("Dog").revision("2001-01-01T00:00:00Z", Some("x")),
        ]);
        let mut parser = DumpParser::new(Cursor::new(xml.as_bytes()), qualified());
        let mut handler = FailOnRedirect(0);
        assert!(parser.run(&mut handler).is_err());
        assert_eq!(handler.0, 1);
    }

    #[test]
    fn element_name_display_uses_clark_notation() {
        let names = qualified();
        assert_eq!(
            names.page.to_string(),
            "{http://www.mediawiki.org/xml/export-0.10/}page"
        );
        assert_eq!(ElementNames::default().text.to_string(), "text");
    }
}
