//! 把输出的文档读回元素树

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::writer::XmlElement;
use crate::compendium::error::KnowledgeError;

/// 解析文档，返回唯一的根元素
pub fn parse(markup: &str) -> Result<XmlElement, KnowledgeError> {
    let mut reader = Reader::from_str(markup);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            KnowledgeError::markup(format!(
                "invalid markup at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| KnowledgeError::markup("unbalanced closing tag"))?;
                // 有子元素时，文本只可能是缩进
                if !element.children.is_empty()
                    && element.text.as_deref().is_some_and(|t| t.trim().is_empty())
                {
                    element.text = None;
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| KnowledgeError::markup(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| KnowledgeError::markup(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(KnowledgeError::markup("document ended inside an element"));
    }
    root.ok_or_else(|| KnowledgeError::markup("document has no root element"))
}

fn open_element(start: &BytesStart<'_>) -> Result<XmlElement, KnowledgeError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::new(tag);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| KnowledgeError::markup(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| KnowledgeError::markup(e.to_string()))?
            .into_owned();
        element.attrs.insert(key, value);
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), KnowledgeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(KnowledgeError::markup("multiple root elements")),
    }
}

fn append_text(stack: &mut [XmlElement], text: &str) {
    // 根元素之外的空白直接丢弃
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}
