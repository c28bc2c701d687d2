//! 规范化的标记输出
//!
//! 两个缩进空格，属性按名称排序，自由文本字段用CDATA包裹。
//! 输出只依赖元素树本身，同一棵树多次输出字节一致。

use std::collections::BTreeMap;

/// 使用CDATA包裹文本的标签
const CDATA_TAGS: &[&str] = &[
    "content",
    "summary",
    "overview",
    "evidence",
    "implications",
    "step",
    "question",
    "title",
];

/// 轻量的元素树，同时作为读取端的中间结构
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.is_empty() { None } else { Some(text) };
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// 只含文本的叶子元素
    pub fn leaf(tag: &str, text: impl Into<String>) -> Self {
        Self::new(tag).text(text)
    }

    /// 文本列表包装成 `<wrapper><item/>...</wrapper>`
    pub fn list<I, S>(wrapper: &str, item: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut element = Self::new(wrapper);
        for value in values {
            element.push(Self::leaf(item, value));
        }
        element
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn first(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.tag == tag)
    }

    pub fn all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    pub fn text_content(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// 子元素的文本，缺失时返回None
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.first(tag).map(XmlElement::text_content)
    }

    /// 读取 `<wrapper><item/>...</wrapper>` 列表
    pub fn child_list(&self, wrapper: &str, item: &str) -> Vec<String> {
        self.first(wrapper)
            .map(|list| {
                list.all(item)
                    .map(|element| element.text_content().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 输出完整文档，末尾保留单个换行
pub fn render(root: &XmlElement) -> String {
    let mut out = String::new();
    render_element(root, 0, &mut out);
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push('\n');
    out
}

fn render_element(element: &XmlElement, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');

    let text = element
        .text
        .as_deref()
        .map(|text| render_text(&element.tag, text))
        .unwrap_or_default();

    if element.children.is_empty() {
        out.push_str(&text);
    } else {
        out.push_str(&text);
        out.push('\n');
        for child in &element.children {
            render_element(child, depth + 1, out);
        }
        out.push_str(&indent);
    }

    out.push_str("</");
    out.push_str(&element.tag);
    out.push_str(">\n");
}

fn render_text(tag: &str, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    if CDATA_TAGS.contains(&tag) {
        // `]]>` 不能出现在CDATA内部，拆成两段
        format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
    } else {
        escape_text(text)
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value)
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}
