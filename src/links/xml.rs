// src/links/xml.rs

//! Link parser for XML structured content
//!
//! Links are stored as `<link>` elements anywhere in the document:
//!
//! ```xml
//! <link name="link0" type="A">
//!   <target><![CDATA[/sites/default/news/b.html#top]]></target>
//!   <uuid>2f3c9a0e-1d5b-4e3a-9a77-6f1f54c1c0de</uuid>
//! </link>
//! ```
//!
//! `type="IMG"` marks an embedded reference, anything else a hyperlink. A link
//! without a `name` attribute is addressed as `link<N>`, counting link
//! elements in document order.

use super::{LinkParser, LinkRewrite, LinkTableEntry};
use crate::error::{Error, Result};
use crate::relation::RelationType;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;

/// Parser for `<link>` elements in XML content
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlLinkParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Target,
    Uuid,
}

struct OpenLink {
    element: String,
    relation_type: RelationType,
    target: String,
    uuid: String,
}

impl OpenLink {
    fn finish(self) -> LinkTableEntry {
        LinkTableEntry {
            element: self.element,
            target: self.target.trim().to_string(),
            target_id: self.uuid.trim().parse().ok(),
            relation_type: self.relation_type,
        }
    }
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("xml: {e}"))
}

/// Name and relation type of a `<link>` start tag
fn link_attributes(start: &BytesStart, index: usize) -> Result<(String, RelationType)> {
    let mut name = None;
    let mut relation_type = RelationType::Hyperlink;
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.into_owned()),
            b"type" if value.eq_ignore_ascii_case("img") => {
                relation_type = RelationType::Embedded;
            }
            _ => {}
        }
    }
    Ok((name.unwrap_or_else(|| format!("link{index}")), relation_type))
}

fn text_of(event: &Event) -> Result<Option<String>> {
    match event {
        Event::Text(t) => Ok(Some(t.unescape().map_err(xml_error)?.into_owned())),
        Event::CData(c) => Ok(Some(String::from_utf8_lossy(c).into_owned())),
        _ => Ok(None),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: &Event) -> Result<()> {
    writer.write_event(event).map_err(xml_error)
}

fn emit_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(writer, &Event::Start(BytesStart::new(name)))?;
    emit(writer, &Event::Text(BytesText::new(text)))?;
    emit(writer, &Event::End(BytesEnd::new(name)))
}

/// Rewrite state of the link element currently being copied
struct Active<'r> {
    rewrite: &'r LinkRewrite,
    field: Field,
    wrote_target: bool,
    wrote_uuid: bool,
    saw_uuid: bool,
}

impl Active<'_> {
    fn new_uuid(&self) -> Option<String> {
        self.rewrite.target_id.map(|id| id.to_string())
    }
}

impl LinkParser for XmlLinkParser {
    fn name(&self) -> &str {
        "xml"
    }

    fn parse(&self, content: &[u8]) -> Result<Vec<LinkTableEntry>> {
        let mut reader = Reader::from_reader(content);
        let mut links = Vec::new();
        let mut seen = 0usize;
        let mut open: Option<OpenLink> = None;
        let mut field = Field::None;

        loop {
            let event = reader.read_event().map_err(xml_error)?;
            match &event {
                Event::Eof => break,
                Event::Start(e) => match e.local_name().as_ref() {
                    b"link" => {
                        let (element, relation_type) = link_attributes(e, seen)?;
                        seen += 1;
                        open = Some(OpenLink {
                            element,
                            relation_type,
                            target: String::new(),
                            uuid: String::new(),
                        });
                    }
                    b"target" if open.is_some() => field = Field::Target,
                    b"uuid" if open.is_some() => field = Field::Uuid,
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"link" => seen += 1,
                Event::Text(_) | Event::CData(_) => {
                    if let Some(link) = open.as_mut()
                        && let Some(text) = text_of(&event)?
                    {
                        match field {
                            Field::Target => link.target.push_str(&text),
                            Field::Uuid => link.uuid.push_str(&text),
                            Field::None => {}
                        }
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"target" | b"uuid" => field = Field::None,
                    b"link" => {
                        if let Some(link) = open.take()
                            && !link.target.trim().is_empty()
                        {
                            links.push(link.finish());
                        }
                        field = Field::None;
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(links)
    }

    fn rewrite(&self, content: &[u8], rewrites: &[LinkRewrite]) -> Result<Vec<u8>> {
        if rewrites.is_empty() {
            return Ok(content.to_vec());
        }
        let by_element: HashMap<&str, &LinkRewrite> =
            rewrites.iter().map(|r| (r.element.as_str(), r)).collect();

        let mut reader = Reader::from_reader(content);
        let mut writer = Writer::new(Vec::with_capacity(content.len()));
        let mut seen = 0usize;
        let mut active: Option<Active> = None;

        loop {
            let event = reader.read_event().map_err(xml_error)?;
            match &event {
                Event::Eof => break,
                Event::Start(e) => {
                    match e.local_name().as_ref() {
                        b"link" => {
                            let (element, _) = link_attributes(e, seen)?;
                            seen += 1;
                            active = by_element.get(element.as_str()).copied().map(|rewrite| Active {
                                rewrite,
                                field: Field::None,
                                wrote_target: false,
                                wrote_uuid: false,
                                saw_uuid: false,
                            });
                        }
                        b"target" => {
                            if let Some(a) = active.as_mut() {
                                a.field = Field::Target;
                            }
                        }
                        b"uuid" => {
                            if let Some(a) = active.as_mut() {
                                a.field = Field::Uuid;
                                a.saw_uuid = true;
                            }
                        }
                        _ => {}
                    }
                    emit(&mut writer, &event)?;
                }
                Event::Empty(e) => {
                    let local = e.local_name();
                    match (local.as_ref(), active.as_mut()) {
                        (b"link", _) => {
                            seen += 1;
                            emit(&mut writer, &event)?;
                        }
                        (b"target", Some(a)) => {
                            emit_element(&mut writer, "target", &a.rewrite.target)?;
                            a.wrote_target = true;
                        }
                        (b"uuid", Some(a)) => {
                            a.saw_uuid = true;
                            match a.new_uuid() {
                                Some(id) => emit_element(&mut writer, "uuid", &id)?,
                                None => emit(&mut writer, &event)?,
                            }
                        }
                        _ => emit(&mut writer, &event)?,
                    }
                }
                Event::Text(_) | Event::CData(_) => match active.as_mut() {
                    Some(a) if a.field == Field::Target => {
                        if !a.wrote_target {
                            emit(&mut writer, &Event::Text(BytesText::new(&a.rewrite.target)))?;
                            a.wrote_target = true;
                        }
                    }
                    Some(a) if a.field == Field::Uuid && a.rewrite.target_id.is_some() => {
                        if !a.wrote_uuid
                            && let Some(id) = a.new_uuid()
                        {
                            emit(&mut writer, &Event::Text(BytesText::new(&id)))?;
                            a.wrote_uuid = true;
                        }
                    }
                    _ => emit(&mut writer, &event)?,
                },
                Event::End(e) => {
                    let mut closed = false;
                    match (e.local_name().as_ref(), active.as_mut()) {
                        (b"target", Some(a)) => {
                            if !a.wrote_target {
                                emit(&mut writer, &Event::Text(BytesText::new(&a.rewrite.target)))?;
                                a.wrote_target = true;
                            }
                            a.field = Field::None;
                        }
                        (b"uuid", Some(a)) => {
                            if !a.wrote_uuid
                                && let Some(id) = a.new_uuid()
                            {
                                emit(&mut writer, &Event::Text(BytesText::new(&id)))?;
                                a.wrote_uuid = true;
                            }
                            a.field = Field::None;
                        }
                        (b"link", Some(a)) => {
                            if !a.saw_uuid
                                && let Some(id) = a.new_uuid()
                            {
                                emit_element(&mut writer, "uuid", &id)?;
                            }
                            closed = true;
                        }
                        _ => {}
                    }
                    if closed {
                        active = None;
                    }
                    emit(&mut writer, &event)?;
                }
                _ => emit(&mut writer, &event)?,
            }
        }

        Ok(writer.into_inner())
    }

    fn validate(&self, content: &[u8]) -> std::result::Result<(), String> {
        let mut reader = Reader::from_reader(content);
        let mut depth = 0usize;
        let mut roots = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(_)) => {
                    if depth == 0 {
                        roots += 1;
                    }
                    depth += 1;
                }
                Ok(Event::Empty(_)) if depth == 0 => roots += 1,
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(format!(
                        "malformed XML at byte {}: {e}",
                        reader.buffer_position()
                    ));
                }
            }
        }

        if depth > 0 {
            return Err(format!("{depth} element(s) left unclosed"));
        }
        match roots {
            0 => Err("document has no root element".to_string()),
            1 => Ok(()),
            n => Err(format!("document has {n} root elements")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::StructureId;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<article>
  <title>Home</title>
  <body>
    <link name="link0" type="A"><target><![CDATA[/sites/default/news/b.html#top]]></target></link>
    <link name="link1" type="IMG"><target>/sites/default/img/logo.png</target><uuid>6f1f54c1-1d5b-4e3a-9a77-2f3c9a0e0001</uuid></link>
    <link type="A"><target>https://example.org/</target></link>
  </body>
</article>"#;

    #[test]
    fn test_parse_links() {
        let links = XmlLinkParser.parse(DOC.as_bytes()).unwrap();
        assert_eq!(links.len(), 3);

        assert_eq!(links[0].element, "link0");
        assert_eq!(links[0].target, "/sites/default/news/b.html#top");
        assert_eq!(links[0].relation_type, RelationType::Hyperlink);
        assert!(links[0].target_id.is_none());

        assert_eq!(links[1].relation_type, RelationType::Embedded);
        assert_eq!(
            links[1].target_id,
            "6f1f54c1-1d5b-4e3a-9a77-2f3c9a0e0001".parse::<StructureId>().ok()
        );

        assert_eq!(links[2].element, "link2");
        assert!(links[2].is_external());
    }

    #[test]
    fn test_rewrite_targets_only() {
        let id = StructureId::new();
        let rewrites = vec![LinkRewrite {
            element: "link0".to_string(),
            target: "/sites/other/news/b.html#top".to_string(),
            target_id: Some(id),
        }];
        let out = XmlLinkParser.rewrite(DOC.as_bytes(), &rewrites).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();

        assert!(text.contains("<title>Home</title>"));
        assert!(text.contains("/sites/default/img/logo.png"));
        assert!(!text.contains("/sites/default/news/b.html"));

        let links = XmlLinkParser.parse(&out).unwrap();
        assert_eq!(links[0].target, "/sites/other/news/b.html#top");
        assert_eq!(links[0].target_id, Some(id));
        assert_eq!(links[1].target, "/sites/default/img/logo.png");
    }

    #[test]
    fn test_rewrite_replaces_existing_uuid() {
        let id = StructureId::new();
        let rewrites = vec![LinkRewrite {
            element: "link1".to_string(),
            target: "/img/logo.png".to_string(),
            target_id: Some(id),
        }];
        let out = XmlLinkParser.rewrite(DOC.as_bytes(), &rewrites).unwrap();
        let links = XmlLinkParser.parse(&out).unwrap();
        assert_eq!(links[1].target, "/img/logo.png");
        assert_eq!(links[1].target_id, Some(id));
        assert_eq!(String::from_utf8(out).unwrap().matches("<uuid>").count(), 1);
    }

    #[test]
    fn test_rewrite_without_changes_is_identity() {
        let out = XmlLinkParser.rewrite(DOC.as_bytes(), &[]).unwrap();
        assert_eq!(out, DOC.as_bytes());
    }

    #[test]
    fn test_validate() {
        assert!(XmlLinkParser.validate(DOC.as_bytes()).is_ok());
        assert!(XmlLinkParser.validate(b"<a><b></a>").is_err());
        assert!(XmlLinkParser.validate(b"<a><b>").is_err());
        assert!(XmlLinkParser.validate(b"just text").is_err());
        assert!(XmlLinkParser.validate(b"<a/><b/>").is_err());
    }
}
