use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::block::{Alignment, Block, Document, List, ListItem, Span};

/// Elements whose content never reaches the page.
const SKIPPED: &[&str] = &[
    "head", "script", "style", "template", "noscript", "iframe", "object", "embed", "svg",
    "img", "input", "button", "select", "textarea", "link", "meta",
];

/// Elements that only group other blocks.
const CONTAINERS: &[&str] = &[
    "html", "body", "div", "section", "article", "header", "footer", "main", "aside", "nav",
    "address", "blockquote", "figure", "figcaption", "dl", "dt", "dd", "form", "fieldset",
    "details", "summary", "li", "center",
];

/// Parse rendered HTML into blocks.
pub fn parse(html: &str) -> Document {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    let mut lowering = Lowering::default();
    lowering.walk(&dom.document);
    lowering.flush();

    let ignored_stylesheets = count_stylesheets(&dom.document);
    if ignored_stylesheets > 0 {
        tracing::warn!(
            count = ignored_stylesheets,
            "style sheets are not applied to the PDF; only inline style attributes are"
        );
    }

    Document {
        title: find_title(&dom.document),
        blocks: lowering.blocks,
        ignored_stylesheets,
    }
}

#[derive(Default)]
struct Lowering {
    blocks: Vec<Block>,
    // Loose inline content waiting to become a paragraph
    spans: Vec<Span>,
}

impl Lowering {
    fn walk(&mut self, handle: &Handle) {
        match &handle.data {
            NodeData::Document => self.walk_children(handle),
            NodeData::Element { name, attrs, .. } => {
                let attrs = attrs.borrow();
                self.element(name.local.as_ref(), &attrs, handle);
            }
            NodeData::Text { contents } => {
                self.spans
                    .push(Span::Text(collapse_whitespace(&contents.borrow())));
            }
            _ => {}
        }
    }

    fn walk_children(&mut self, handle: &Handle) {
        for child in handle.children.borrow().iter() {
            self.walk(child);
        }
    }

    fn element(&mut self, tag: &str, attrs: &[Attribute], handle: &Handle) {
        if SKIPPED.contains(&tag) {
            return;
        }
        let style = Style::parse(attrs);

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse().unwrap_or(1);
                self.block_element(&style, |this| {
                    let content = normalize(inline_children(handle));
                    if !content.is_empty() {
                        this.blocks.push(Block::Heading { level, content });
                    }
                });
            }
            "p" => self.block_element(&style, |this| {
                let content = normalize(style.wrap(inline_children(handle)));
                if !content.is_empty() {
                    this.blocks.push(Block::Paragraph { content });
                }
            }),
            "pre" => self.block_element(&style, |this| {
                this.blocks.push(Block::CodeBlock {
                    language: code_language(handle),
                    content: collect_text(handle),
                });
            }),
            "ul" | "ol" => self.block_element(&style, |this| {
                let list = build_list(handle, tag == "ol");
                if !list.items.is_empty() {
                    this.blocks.push(Block::List(list));
                }
            }),
            "table" => self.block_element(&style, |this| {
                if let Some(table) = build_table(handle) {
                    this.blocks.push(table);
                }
            }),
            "hr" => self.block_element(&style, |this| this.blocks.push(Block::Rule)),
            "br" => self.spans.push(Span::LineBreak),
            _ if CONTAINERS.contains(&tag) => {
                self.block_element(&style, |this| this.walk_children(handle));
            }
            _ => inline_element(tag, attrs, handle, &mut self.spans),
        }
    }

    /// Emit whatever `f` produces as a standalone run of blocks, honouring
    /// the element's page breaks and alignment.
    fn block_element(&mut self, style: &Style, f: impl FnOnce(&mut Self)) {
        self.flush();
        if style.break_before {
            self.blocks.push(Block::PageBreak);
        }

        let start = self.blocks.len();
        f(self);
        self.flush();

        if let Some(alignment) = style.alignment {
            let blocks = self.blocks.split_off(start);
            self.blocks.extend(align_blocks(alignment, blocks));
        }
        if style.break_after {
            self.blocks.push(Block::PageBreak);
        }
    }

    fn flush(&mut self) {
        let content = normalize(std::mem::take(&mut self.spans));
        if !content.is_empty() {
            self.blocks.push(Block::Paragraph { content });
        }
    }
}

/// Wrap runs of blocks in `Aligned`, keeping page breaks at the top level.
fn align_blocks(alignment: Alignment, blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::new();
    let mut run = Vec::new();
    for block in blocks {
        if block == Block::PageBreak {
            if !run.is_empty() {
                out.push(Block::Aligned {
                    alignment,
                    blocks: std::mem::take(&mut run),
                });
            }
            out.push(Block::PageBreak);
        } else {
            run.push(block);
        }
    }
    if !run.is_empty() {
        out.push(Block::Aligned {
            alignment,
            blocks: run,
        });
    }
    out
}

fn inline_children(handle: &Handle) -> Vec<Span> {
    let mut out = Vec::new();
    for child in handle.children.borrow().iter() {
        inline_node(child, &mut out);
    }
    out
}

fn inline_node(handle: &Handle, out: &mut Vec<Span>) {
    match &handle.data {
        NodeData::Text { contents } => {
            out.push(Span::Text(collapse_whitespace(&contents.borrow())));
        }
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs.borrow();
            inline_element(name.local.as_ref(), &attrs, handle, out);
        }
        _ => {}
    }
}

fn inline_element(tag: &str, attrs: &[Attribute], handle: &Handle, out: &mut Vec<Span>) {
    if SKIPPED.contains(&tag) {
        return;
    }
    let style = Style::parse(attrs);

    let content = match tag {
        "br" => vec![Span::LineBreak],
        "strong" | "b" => vec![Span::Bold(inline_children(handle))],
        "em" | "i" | "cite" => vec![Span::Italic(inline_children(handle))],
        "code" | "kbd" | "samp" | "tt" => vec![Span::Code(collect_text(handle))],
        "a" => match get_attr(attrs, "href") {
            Some(url) if !url.trim().is_empty() => vec![Span::Link {
                url: url.trim().to_string(),
                content: inline_children(handle),
            }],
            _ => inline_children(handle),
        },
        _ if is_block_tag(tag) => {
            // Block content squeezed into a line still needs word separation.
            let mut spans = vec![Span::Text(" ".to_string())];
            spans.extend(inline_children(handle));
            spans.push(Span::Text(" ".to_string()));
            spans
        }
        _ => inline_children(handle),
    };

    out.extend(style.wrap(content));
}

fn is_block_tag(tag: &str) -> bool {
    CONTAINERS.contains(&tag)
        || matches!(
            tag,
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "pre" | "table" | "tr"
                | "td" | "th" | "hr"
        )
}

fn build_list(handle: &Handle, ordered: bool) -> List {
    let mut items = Vec::new();

    for child in handle.children.borrow().iter() {
        if element_name(child).as_deref() != Some("li") {
            continue;
        }

        let mut content = Vec::new();
        let mut nested = None;
        for node in child.children.borrow().iter() {
            match element_name(node).as_deref() {
                Some(tag @ ("ul" | "ol")) if nested.is_none() => {
                    nested = Some(Box::new(build_list(node, tag == "ol")));
                }
                _ => inline_node(node, &mut content),
            }
        }

        items.push(ListItem {
            content: normalize(content),
            nested,
        });
    }

    List { ordered, items }
}

fn build_table(handle: &Handle) -> Option<Block> {
    let mut rows = Vec::new();
    collect_rows(handle, false, &mut rows);

    let mut headers = Vec::new();
    let mut body = Vec::new();
    for (in_head, cells) in rows {
        let all_th = cells.iter().all(|(is_th, _)| *is_th);
        let cells: Vec<Vec<Span>> = cells.into_iter().map(|(_, content)| content).collect();
        if headers.is_empty() && body.is_empty() && (in_head || all_th) {
            headers = cells;
        } else {
            body.push(cells);
        }
    }

    if headers.is_empty() && body.is_empty() {
        return None;
    }
    Some(Block::Table {
        headers,
        rows: body,
    })
}

type Row = (bool, Vec<(bool, Vec<Span>)>);

fn collect_rows(handle: &Handle, in_head: bool, rows: &mut Vec<Row>) {
    for child in handle.children.borrow().iter() {
        match element_name(child).as_deref() {
            Some("thead") => collect_rows(child, true, rows),
            Some("tbody" | "tfoot") => collect_rows(child, in_head, rows),
            Some("tr") => {
                let cells: Vec<(bool, Vec<Span>)> = child
                    .children
                    .borrow()
                    .iter()
                    .filter_map(|cell| match element_name(cell).as_deref() {
                        Some("th") => Some((true, normalize(inline_children(cell)))),
                        Some("td") => Some((false, normalize(inline_children(cell)))),
                        _ => None,
                    })
                    .collect();
                if !cells.is_empty() {
                    rows.push((in_head, cells));
                }
            }
            _ => {}
        }
    }
}

fn find_title(handle: &Handle) -> Option<String> {
    if element_name(handle).as_deref() == Some("title") {
        let title = collapse_whitespace(&collect_text(handle)).trim().to_string();
        return (!title.is_empty()).then_some(title);
    }
    if element_name(handle).as_deref() == Some("body") {
        return None;
    }
    handle.children.borrow().iter().find_map(find_title)
}

/// `<style>` elements and `<link rel="stylesheet">` anywhere in the page.
fn count_stylesheets(handle: &Handle) -> usize {
    let own = match &handle.data {
        NodeData::Element { name, attrs, .. } => match name.local.as_ref() {
            "style" => 1,
            "link" => {
                let rel = get_attr(&attrs.borrow(), "rel").unwrap_or_default();
                usize::from(rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
            }
            _ => 0,
        },
        _ => 0,
    };
    own + handle.children.borrow().iter().map(count_stylesheets).sum::<usize>()
}

fn code_language(handle: &Handle) -> Option<String> {
    handle.children.borrow().iter().find_map(|child| match &child.data {
        NodeData::Element { name, attrs, .. } if name.local.as_ref() == "code" => {
            get_attr(&attrs.borrow(), "class")?
                .split_whitespace()
                .find_map(|class| class.strip_prefix("language-"))
                .map(str::to_string)
        }
        _ => None,
    })
}

fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref().to_string()),
        _ => None,
    }
}

fn get_attr(attrs: &[Attribute], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|attr| attr.name.local.as_ref() == name)
        .map(|attr| attr.value.to_string())
}

/// Text content of an element and all its descendants, whitespace untouched.
fn collect_text(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => text.push_str(&contents.borrow()),
            NodeData::Element { .. } => text.push_str(&collect_text(child)),
            _ => {}
        }
    }
    text
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Merge adjacent text, drop whitespace at line edges and leading or
/// trailing line breaks.
fn normalize(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::new();

    for span in spans {
        match span {
            Span::Text(text) => {
                let at_line_start = matches!(out.last(), None | Some(Span::LineBreak));
                let text = if at_line_start {
                    text.trim_start()
                } else {
                    text.as_str()
                };
                if text.is_empty() {
                    continue;
                }
                match out.last_mut() {
                    Some(Span::Text(prev)) if prev.ends_with(' ') && text.starts_with(' ') => {
                        prev.push_str(&text[1..]);
                    }
                    Some(Span::Text(prev)) => prev.push_str(text),
                    _ => out.push(Span::Text(text.to_string())),
                }
            }
            Span::LineBreak => {
                trim_trailing_text(&mut out);
                if !out.is_empty() {
                    out.push(Span::LineBreak);
                }
            }
            other => out.push(other),
        }
    }

    loop {
        match out.last() {
            Some(Span::LineBreak) => {
                out.pop();
            }
            Some(Span::Text(text)) if text.trim_end().is_empty() => {
                out.pop();
            }
            _ => break,
        }
    }
    trim_trailing_text(&mut out);
    out
}

fn trim_trailing_text(spans: &mut Vec<Span>) {
    if let Some(Span::Text(text)) = spans.last_mut() {
        let len = text.trim_end().len();
        text.truncate(len);
        if text.is_empty() {
            spans.pop();
        }
    }
}

/// The subset of inline CSS the lowering understands.
#[derive(Debug, Default)]
struct Style {
    bold: bool,
    italic: bool,
    alignment: Option<Alignment>,
    break_before: bool,
    break_after: bool,
}

impl Style {
    fn parse(attrs: &[Attribute]) -> Self {
        let mut style = Self::default();
        let Some(css) = get_attr(attrs, "style") else {
            return style;
        };

        for declaration in css.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim().to_ascii_lowercase();

            match property.as_str() {
                "font-weight" => {
                    style.bold = matches!(value.as_str(), "bold" | "bolder")
                        || value.parse::<u16>().is_ok_and(|weight| weight >= 600);
                }
                "font-style" => style.italic = matches!(value.as_str(), "italic" | "oblique"),
                "text-align" => {
                    style.alignment = match value.as_str() {
                        "center" => Some(Alignment::Center),
                        "right" | "end" => Some(Alignment::Right),
                        _ => None,
                    };
                }
                "page-break-before" | "break-before" => {
                    style.break_before = matches!(value.as_str(), "always" | "page");
                }
                "page-break-after" | "break-after" => {
                    style.break_after = matches!(value.as_str(), "always" | "page");
                }
                _ => {}
            }
        }
        style
    }

    fn wrap(&self, mut content: Vec<Span>) -> Vec<Span> {
        if content.is_empty() {
            return content;
        }
        if self.bold {
            content = vec![Span::Bold(content)];
        }
        if self.italic {
            content = vec![Span::Italic(content)];
        }
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Span {
        Span::Text(s.to_string())
    }

    fn blocks(html: &str) -> Vec<Block> {
        parse(html).blocks
    }

    #[test]
    fn headings_and_paragraphs() {
        assert_eq!(
            blocks("<h1>Jane Doe</h1>\n<p>\n  Systems   engineer\n</p>"),
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![text("Jane Doe")],
                },
                Block::Paragraph {
                    content: vec![text("Systems engineer")],
                },
            ]
        );
    }

    #[test]
    fn counts_dropped_style_sheets() {
        let doc = parse(
            "<html><head><style>h1{color:red}</style>\
             <link rel=\"stylesheet\" href=\"a.css\"><link rel=\"icon\" href=\"f.ico\"></head>\
             <body><style>p{}</style><p>x</p></body></html>",
        );
        assert_eq!(doc.ignored_stylesheets, 3);
        assert_eq!(doc.blocks, vec![Block::Paragraph { content: vec![text("x")] }]);
    }

    #[test]
    fn inline_styles_only_count_nothing() {
        let doc = parse("<p style=\"text-align: center\">x</p>");
        assert_eq!(doc.ignored_stylesheets, 0);
    }

    #[test]
    fn title_comes_from_head() {
        let doc = parse("<html><head><title> Jane  Doe - Resume </title><style>h1{}</style></head><body><p>x</p></body></html>");
        assert_eq!(doc.title.as_deref(), Some("Jane Doe - Resume"));
        assert_eq!(doc.blocks, vec![Block::Paragraph { content: vec![text("x")] }]);
    }

    #[test]
    fn loose_text_in_containers_becomes_paragraphs() {
        assert_eq!(
            blocks("<div class=\"contact\">jane@example.com | <b>NYC</b></div><div>second</div>"),
            vec![
                Block::Paragraph {
                    content: vec![text("jane@example.com | "), Span::Bold(vec![text("NYC")])],
                },
                Block::Paragraph {
                    content: vec![text("second")],
                },
            ]
        );
    }

    #[test]
    fn inline_formatting() {
        assert_eq!(
            blocks("<p><strong>Go</strong>, <em>Rust</em> and <code>sql</code><br> <a href=\"https://x.dev\">site</a></p>"),
            vec![Block::Paragraph {
                content: vec![
                    Span::Bold(vec![text("Go")]),
                    text(", "),
                    Span::Italic(vec![text("Rust")]),
                    text(" and "),
                    Span::Code("sql".to_string()),
                    Span::LineBreak,
                    Span::Link {
                        url: "https://x.dev".to_string(),
                        content: vec![text("site")],
                    },
                ],
            }]
        );
    }

    #[test]
    fn nested_lists() {
        let html = "<ul><li>Go<ul><li>gRPC</li></ul></li><li> Rust </li></ul><ol><li>first</li></ol>";
        assert_eq!(
            blocks(html),
            vec![
                Block::List(List {
                    ordered: false,
                    items: vec![
                        ListItem {
                            content: vec![text("Go")],
                            nested: Some(Box::new(List {
                                ordered: false,
                                items: vec![ListItem {
                                    content: vec![text("gRPC")],
                                    nested: None,
                                }],
                            })),
                        },
                        ListItem {
                            content: vec![text("Rust")],
                            nested: None,
                        },
                    ],
                }),
                Block::List(List {
                    ordered: true,
                    items: vec![ListItem {
                        content: vec![text("first")],
                        nested: None,
                    }],
                }),
            ]
        );
    }

    #[test]
    fn tables_with_header_row() {
        let html = "<table><thead><tr><th>Degree</th><th>Year</th></tr></thead>\
                    <tbody><tr><td>BSc</td><td>2020</td></tr></tbody></table>";
        assert_eq!(
            blocks(html),
            vec![Block::Table {
                headers: vec![vec![text("Degree")], vec![text("Year")]],
                rows: vec![vec![vec![text("BSc")], vec![text("2020")]]],
            }]
        );
    }

    #[test]
    fn tables_without_header() {
        let html = "<table><tr><td>a</td></tr></table>";
        assert_eq!(
            blocks(html),
            vec![Block::Table {
                headers: vec![],
                rows: vec![vec![vec![text("a")]]],
            }]
        );
    }

    #[test]
    fn preformatted_code_keeps_whitespace() {
        assert_eq!(
            blocks("<pre><code class=\"language-rust\">fn main() {\n    x\n}</code></pre>"),
            vec![Block::CodeBlock {
                language: Some("rust".to_string()),
                content: "fn main() {\n    x\n}".to_string(),
            }]
        );
    }

    #[test]
    fn inline_css_subset() {
        assert_eq!(
            blocks("<header style=\"text-align: center\"><h1>Jane</h1></header><p><span style=\"font-weight: 700\">B</span></p>"),
            vec![
                Block::Aligned {
                    alignment: Alignment::Center,
                    blocks: vec![Block::Heading {
                        level: 1,
                        content: vec![text("Jane")],
                    }],
                },
                Block::Paragraph {
                    content: vec![Span::Bold(vec![text("B")])],
                },
            ]
        );
    }

    #[test]
    fn page_breaks_stay_outside_alignment() {
        let html = "<div style=\"text-align:right\"><p>a</p><div style=\"page-break-before: always\"><p>b</p></div></div><hr>";
        assert_eq!(
            blocks(html),
            vec![
                Block::Aligned {
                    alignment: Alignment::Right,
                    blocks: vec![Block::Paragraph { content: vec![text("a")] }],
                },
                Block::PageBreak,
                Block::Aligned {
                    alignment: Alignment::Right,
                    blocks: vec![Block::Paragraph { content: vec![text("b")] }],
                },
                Block::Rule,
            ]
        );
    }

    #[test]
    fn scripts_and_empty_markup_vanish() {
        assert_eq!(blocks("<script>alert(1)</script><p>   </p><div>\n</div>"), vec![]);
    }

    #[test]
    fn escaped_entities_are_decoded() {
        assert_eq!(
            blocks("<p>Tom &amp; &lt;Jerry&gt;</p>"),
            vec![Block::Paragraph {
                content: vec![text("Tom & <Jerry>")],
            }]
        );
    }
}
