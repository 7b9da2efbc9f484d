use crate::block::{Alignment, Block, Document, List, Span};
use crate::config::Config;

/// Convert a lowered document to Typst markup
pub fn document_to_typst(doc: &Document, config: &Config) -> String {
    let mut out = String::new();
    emit_preamble(doc.title.as_deref(), config, &mut out);
    blocks_to_typst(&doc.blocks, config, &mut out);
    out
}

fn emit_preamble(title: Option<&str>, config: &Config, out: &mut String) {
    if let Some(title) = title {
        out.push_str(&format!("#set document(title: {})\n", string_literal(title)));
    }

    out.push_str(&format!(
        "#set page(paper: {}, margin: {}, numbering: {})\n",
        string_literal(&config.page.paper),
        config.page.margin,
        if config.page.numbers { "\"1\"" } else { "none" }
    ));
    out.push_str(&format!(
        "#set text(font: {}, size: {})\n",
        string_literal(&config.font.family),
        config.font.size
    ));

    // Set up paragraph settings to prevent widows/orphans
    out.push_str("#set par(linebreaks: \"optimized\")\n");

    out.push_str(&format!(
        "#show link: set text(fill: rgb({}))\n",
        string_literal(&config.links.color)
    ));
    if config.links.underline {
        out.push_str("#show link: underline\n");
    }
    out.push('\n');
}

fn blocks_to_typst(blocks: &[Block], config: &Config, out: &mut String) {
    let mut i = 0;
    while i < blocks.len() {
        let block = &blocks[i];
        let next = blocks.get(i + 1);

        match (block, next) {
            (Block::Heading { .. }, Some(next))
                if config.layout.keep_headings_with_content && *next != Block::PageBreak =>
            {
                // Keep heading with following content using a block that prevents breaks
                out.push_str("#block(breakable: false)[\n");
                emit_block(block, config, out);
                emit_block(next, config, out);
                out.push_str("]\n\n");
                i += 1;
            }
            _ => emit_block(block, config, out),
        }

        i += 1;
    }
}

fn emit_block(block: &Block, config: &Config, out: &mut String) {
    match block {
        Block::Heading { level, content } => {
            for _ in 0..*level {
                out.push('=');
            }
            out.push(' ');
            spans_to_typst(content, out);
            out.push_str("\n\n");
        }
        Block::Paragraph { content } => {
            spans_to_typst(content, out);
            out.push_str("\n\n");
        }
        Block::CodeBlock { language, content } => {
            // Keep code blocks together when possible
            out.push_str("#block(breakable: false)[#raw(block: true, ");
            if let Some(lang) = language {
                out.push_str(&format!("lang: {}, ", string_literal(lang)));
            }
            out.push_str(&string_literal(content.trim_end_matches('\n')));
            out.push_str(")]\n\n");
        }
        Block::List(list) => {
            // Wrap list to keep together when small, allow breaks when large
            if count_list_items(list) <= config.layout.unbreakable_list_items {
                out.push_str("#block(breakable: false)[\n");
                list_to_typst(list, 0, out);
                out.push_str("]\n\n");
            } else {
                list_to_typst(list, 0, out);
                out.push('\n');
            }
        }
        Block::Table { headers, rows } => {
            // Keep tables together when possible
            out.push_str("#block(breakable: false)[\n");
            table_to_typst(headers, rows, out);
            out.push_str("]\n\n");
        }
        Block::Aligned { alignment, blocks } => {
            let alignment = match alignment {
                Alignment::Center => "center",
                Alignment::Right => "right",
            };
            out.push_str(&format!("#align({alignment})[\n"));
            blocks_to_typst(blocks, config, out);
            out.push_str("]\n\n");
        }
        Block::Rule => {
            out.push_str("#line(length: 100%)\n\n");
        }
        Block::PageBreak => {
            out.push_str("#pagebreak(weak: true)\n\n");
        }
    }
}

fn count_list_items(list: &List) -> usize {
    let mut count = list.items.len();
    for item in &list.items {
        if let Some(ref nested) = item.nested {
            count += count_list_items(nested);
        }
    }
    count
}

fn spans_to_typst(spans: &[Span], out: &mut String) {
    let mut after_call = false;
    for (i, span) in spans.iter().enumerate() {
        match span {
            Span::Text(text) if i == 0 => text_to_typst(text, false, true, out),
            _ => span_to_typst(span, after_call, out),
        }
        after_call = !matches!(span, Span::Text(_) | Span::LineBreak);
    }
}

/// `after_call` is set when the previous span ended in a `#func[...]` call,
/// which a directly following `.`, `(` or `[` would otherwise extend.
fn span_to_typst(span: &Span, after_call: bool, out: &mut String) {
    match span {
        Span::Text(text) => text_to_typst(text, after_call, false, out),
        Span::Bold(inner) => {
            out.push_str("#strong[");
            spans_to_typst(inner, out);
            out.push(']');
        }
        Span::Italic(inner) => {
            out.push_str("#emph[");
            spans_to_typst(inner, out);
            out.push(']');
        }
        Span::Code(text) => {
            out.push_str(&format!("#raw({})", string_literal(text)));
        }
        Span::Link { url, content } => {
            out.push_str(&format!("#link({})[", string_literal(url)));
            spans_to_typst(content, out);
            out.push(']');
        }
        Span::LineBreak => {
            // Backslash-space is a line break that also works inside list items and cells
            out.push_str("\\ ");
        }
    }
}

fn text_to_typst(text: &str, after_call: bool, line_start: bool, out: &mut String) {
    // `2020.` opening a line would start a numbered list.
    let marker_dot = if line_start {
        let digits = text.chars().take_while(char::is_ascii_digit).count();
        (digits > 0 && text[digits..].starts_with('.')).then_some(digits)
    } else {
        None
    };

    for (i, ch) in text.chars().enumerate() {
        let continues_call = after_call && i == 0 && matches!(ch, '.' | '(');
        if continues_call || marker_dot == Some(i) || needs_escape(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Characters with markup meaning in Typst
fn needs_escape(ch: char) -> bool {
    matches!(
        ch,
        '#' | '*' | '_' | '@' | '$' | '\\' | '`' | '<' | '>' | '[' | ']' | '/' | '=' | '-' | '+'
            | '~'
    )
}

/// Quote `s` as a Typst string literal.
fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn list_to_typst(list: &List, indent: usize, out: &mut String) {
    let prefix = if list.ordered { "+" } else { "-" };
    let indent_str: String = "  ".repeat(indent);

    for item in &list.items {
        out.push_str(&indent_str);
        out.push_str(prefix);
        out.push(' ');
        spans_to_typst(&item.content, out);
        out.push('\n');

        if let Some(ref nested) = item.nested {
            list_to_typst(nested, indent + 1, out);
        }
    }
}

fn table_to_typst(headers: &[Vec<Span>], rows: &[Vec<Vec<Span>>], out: &mut String) {
    let col_count = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    if col_count == 0 {
        return;
    }

    out.push_str("#table(\n");
    out.push_str(&format!("  columns: {},\n", col_count));

    // Header cells (bold)
    for cell in headers {
        out.push_str("  [#strong[");
        spans_to_typst(cell, out);
        out.push_str("]],\n");
    }
    if !headers.is_empty() {
        for _ in headers.len()..col_count {
            out.push_str("  [],\n");
        }
    }

    // Data rows, padded to a full row
    for row in rows {
        for cell in row {
            out.push_str("  [");
            spans_to_typst(cell, out);
            out.push_str("],\n");
        }
        for _ in row.len()..col_count {
            out.push_str("  [],\n");
        }
    }

    out.push_str(")\n");
}
