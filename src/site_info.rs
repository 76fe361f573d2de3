// SPDX-License-Identifier: MPL-2.0
//! Discovery of the export namespace and the namespace table from the dump preamble.

use std::{collections::HashMap, fmt::Debug, io::BufRead};

use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};
use tracing::instrument;

use crate::dump_parser::{ElementNames, ParsingError};

const KEY_TALK: i32 = 1;
const KEY_USER: i32 = 2;
const KEY_USER_TALK: i32 = 3;
const KEY_PROJECT: i32 = 4;

// the tags of the preamble we need a value from, and their parents
#[derive(PartialEq, Eq)]
enum Tag {
    MediaWiki,         // <mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/" ...>
    SiteInfo,          // <siteinfo>...</siteinfo>
    DbName,            // <dbname>enwiki</dbname>
    Namespaces,        // <namespaces>...</namespaces>
    Namespace(String), // <namespace key="1" case="first-letter">Talk</namespace>
    Unknown,
}

impl Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::MediaWiki => write!(f, "<mediawiki>"),
            Tag::SiteInfo => write!(f, "<siteinfo>"),
            Tag::DbName => write!(f, "<dbname>"),
            Tag::Namespaces => write!(f, "<namespaces>"),
            Tag::Namespace(key) => write!(f, "<namespace key={}>", key),
            Tag::Unknown => write!(f, "<unknown>"),
        }
    }
}

impl Tag {
    fn from_start_bytes(e: &BytesStart) -> Result<Self, quick_xml::Error> {
        match e.local_name().as_ref() {
            b"mediawiki" => Ok(Tag::MediaWiki),
            b"siteinfo" => Ok(Tag::SiteInfo),
            b"dbname" => Ok(Tag::DbName),
            b"namespaces" => Ok(Tag::Namespaces),
            b"namespace" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.as_ref() == b"key" {
                        return Ok(Tag::Namespace(attr.unescape_value()?.into_owned()));
                    }
                }
                Ok(Tag::Namespace(String::new()))
            }
            _ => Ok(Tag::Unknown),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Default,
    Named(CompactString),
}

impl Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Default => write!(f, "Default"),
            Namespace::Named(name) => write!(f, "{:?}", name),
        }
    }
}

/// Localized names of the namespaces the processor cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translations {
    pub talk: CompactString,
    pub user: Option<CompactString>,
    pub user_talk: Option<CompactString>,
    pub project: Option<CompactString>,
}

#[derive(Debug, Default)]
pub struct SiteInfo {
    /// Default namespace declared on the root element.
    pub xmlns: Option<String>,
    pub dbname: CompactString,
    pub namespaces: HashMap<i32, Namespace>,
}

impl SiteInfo {
    /// Reads the preamble up to the closing `</siteinfo>`, or up to the first `<page>` for
    /// exports without one.
    #[instrument(skip_all)]
    pub fn read<R: BufRead>(reader: R) -> Result<Self, ParsingError> {
        let mut xml_parser = quick_xml::Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut current_path: Vec<Tag> = Vec::new();
        let mut site_info = SiteInfo::default();
        let mut seen_root = false;

        loop {
            match xml_parser.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    if e.local_name().as_ref() == b"page" {
                        break;
                    }
                    let tag = Tag::from_start_bytes(e)?;
                    if tag == Tag::MediaWiki {
                        site_info.xmlns = root_namespace(e)?;
                        seen_root = true;
                    }
                    current_path.push(tag);
                }
                Event::Empty(ref e) => {
                    let tag = Tag::from_start_bytes(e)?;
                    if let [Tag::MediaWiki, Tag::SiteInfo, Tag::Namespaces] =
                        current_path.as_slice()
                    {
                        if let Tag::Namespace(key) = &tag {
                            site_info.insert_namespace(key, Namespace::Default);
                        }
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape()?;

                    match current_path.as_slice() {
                        [Tag::MediaWiki, Tag::SiteInfo, Tag::DbName] => {
                            site_info.dbname = CompactString::from(text.as_ref());
                        }
                        [Tag::MediaWiki, Tag::SiteInfo, Tag::Namespaces, Tag::Namespace(key)] => {
                            site_info.insert_namespace(
                                key,
                                Namespace::Named(CompactString::from(text.as_ref())),
                            );
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    if current_path.pop() == Some(Tag::SiteInfo) {
                        break;
                    }
                }
                Event::Eof => {
                    if !seen_root {
                        tracing::error!(partial_site_info = ?site_info, "No export root element found");
                        return Err(ParsingError::Eof);
                    }
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(site_info)
    }

    fn insert_namespace(&mut self, key: &str, namespace: Namespace) {
        match key.parse() {
            Ok(key) => {
                self.namespaces.insert(key, namespace);
            }
            Err(_) => {
                tracing::warn!(
                    message = "Ignoring namespace with invalid key",
                    key,
                    namespace = ?namespace
                );
            }
        }
    }

    /// Element names qualified with the root namespace of the export.
    pub fn element_names(&self) -> ElementNames {
        ElementNames::in_namespace(self.xmlns.as_deref())
    }

    /// Language prefix of a database name such as `itwiki`.
    pub fn language(&self) -> Option<&str> {
        self.dbname
            .strip_suffix("wiki")
            .filter(|lang| !lang.is_empty())
    }

    pub fn translations(&self) -> Result<Translations, ParsingError> {
        let named = |key: i32| match self.namespaces.get(&key) {
            Some(Namespace::Named(name)) => Some(name.clone()),
            _ => None,
        };

        Ok(Translations {
            talk: named(KEY_TALK).ok_or(ParsingError::MissingNamespace(KEY_TALK))?,
            user: named(KEY_USER),
            user_talk: named(KEY_USER_TALK),
            project: named(KEY_PROJECT),
        })
    }
}

fn root_namespace(e: &BytesStart) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == b"xmlns" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
