// Enhanced HTML to styled terminal lines

use ego_tree::NodeRef;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};

/// Flatten an enhanced document into lines for a `Paragraph`.
///
/// Block elements start new lines, checkboxes become `[x]`/`[ ]` markers.
/// Scripts and styles are dropped.
pub fn html_to_lines(html: &str) -> Vec<Line<'static>> {
    let fragment = Html::parse_fragment(html);
    let mut ctx = TextContext::default();

    for child in fragment.root_element().children() {
        visit_node(child, &mut ctx, Style::default());
    }

    ctx.finish()
}

#[derive(Default)]
struct TextContext {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    list_depth: usize,
    in_pre: bool,
}

impl TextContext {
    fn current_is_blank(&self) -> bool {
        self.current.iter().all(|span| span.content.trim().is_empty())
    }

    fn ends_with_space(&self) -> bool {
        self.current
            .last()
            .map(|span| span.content.ends_with(' '))
            .unwrap_or(true)
    }

    fn push(&mut self, text: impl Into<String>, style: Style) {
        let text = text.into();
        if !text.is_empty() {
            self.current.push(Span::styled(text, style));
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        if self.in_pre {
            let mut parts = text.split('\n').peekable();
            while let Some(part) = parts.next() {
                self.push(format!("    {}", part), style);
                if parts.peek().is_some() {
                    self.break_line();
                }
            }
            return;
        }

        let mut collapsed = String::with_capacity(text.len());
        let mut last_space = self.ends_with_space();
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    collapsed.push(' ');
                    last_space = true;
                }
            } else {
                collapsed.push(c);
                last_space = false;
            }
        }
        self.push(collapsed, style);
    }

    /// End the current line, if it has content.
    fn flush(&mut self) {
        if self.current_is_blank() {
            self.current.clear();
            return;
        }
        self.break_line();
    }

    fn break_line(&mut self) {
        let spans = std::mem::take(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    /// Separate blocks by a single empty line.
    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| line.spans.is_empty()) || self.lines.is_empty() {
            return;
        }
        self.lines.push(Line::default());
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

fn visit_node(node: NodeRef<'_, Node>, ctx: &mut TextContext, style: Style) {
    match node.value() {
        Node::Text(text) => ctx.push_text(text, style),
        Node::Element(element) => visit_element(node, element, ctx, style),
        _ => visit_children(node, ctx, style),
    }
}

fn visit_children(node: NodeRef<'_, Node>, ctx: &mut TextContext, style: Style) {
    for child in node.children() {
        visit_node(child, ctx, style);
    }
}

fn visit_element(node: NodeRef<'_, Node>, element: &Element, ctx: &mut TextContext, style: Style) {
    match element.name() {
        name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let heading = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
            ctx.blank();
            ctx.push(format!("{} ", "#".repeat(level)), heading);
            visit_children(node, ctx, heading);
            ctx.blank();
        }
        "p" => {
            ctx.flush();
            visit_children(node, ctx, style);
            ctx.blank();
        }
        "br" => ctx.break_line(),
        "hr" => {
            ctx.flush();
            ctx.push("─".repeat(40), style.fg(Color::DarkGray));
            ctx.blank();
        }
        "ul" | "ol" => {
            ctx.flush();
            ctx.list_depth += 1;
            visit_children(node, ctx, style);
            ctx.list_depth -= 1;
            if ctx.list_depth == 0 {
                ctx.blank();
            }
        }
        "li" => {
            ctx.flush();
            let indent = "  ".repeat(ctx.list_depth.saturating_sub(1));
            ctx.push(format!("{}• ", indent), style.fg(Color::DarkGray));
            visit_children(node, ctx, style);
            ctx.flush();
        }
        "pre" => {
            ctx.flush();
            ctx.in_pre = true;
            visit_children(node, ctx, style.fg(Color::Yellow));
            ctx.in_pre = false;
            ctx.blank();
        }
        "code" => visit_children(node, ctx, style.fg(Color::Yellow)),
        "strong" | "b" => visit_children(node, ctx, style.add_modifier(Modifier::BOLD)),
        "em" | "i" => visit_children(node, ctx, style.add_modifier(Modifier::ITALIC)),
        "del" | "s" => visit_children(node, ctx, style.add_modifier(Modifier::CROSSED_OUT)),
        "blockquote" => {
            ctx.flush();
            ctx.push("│ ", style.fg(Color::DarkGray));
            visit_children(node, ctx, style.add_modifier(Modifier::ITALIC));
            ctx.blank();
        }
        "a" => {
            let completed = ElementRef::wrap(node)
                .map(|el| el.value().classes().any(|class| class == "completed"))
                .unwrap_or(false);
            let link = if completed {
                style.fg(Color::Green).add_modifier(Modifier::CROSSED_OUT)
            } else {
                style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED)
            };
            visit_children(node, ctx, link);
        }
        "input" => {
            if element.attr("type") == Some("checkbox") {
                if element.attr("checked").is_some() {
                    ctx.push("[x] ", style.fg(Color::Green).add_modifier(Modifier::BOLD));
                } else {
                    ctx.push("[ ] ", style.fg(Color::Gray));
                }
            }
        }
        "tr" => {
            ctx.flush();
            visit_children(node, ctx, style);
            ctx.flush();
        }
        "td" | "th" => {
            let cell = if element.name() == "th" {
                style.add_modifier(Modifier::BOLD)
            } else {
                style
            };
            ctx.push("│ ", style.fg(Color::DarkGray));
            visit_children(node, ctx, cell);
            ctx.push(" ", style);
        }
        "table" => {
            ctx.flush();
            visit_children(node, ctx, style);
            ctx.blank();
        }
        "script" | "style" => {}
        _ => visit_children(node, ctx, style),
    }
}

/// Plain text of a line, for tests and width calculations.
pub fn line_text(line: &Line) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(html: &str) -> Vec<String> {
        html_to_lines(html).iter().map(line_text).collect()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let lines = texts("<h1>Title</h1>\n<p>First   paragraph\nwraps.</p>\n<h2>Next</h2>");
        assert_eq!(lines, vec!["# Title", "", "First paragraph wraps.", "", "## Next"]);
    }

    #[test]
    fn test_checkbox_markers() {
        let html = r#"<ul><li><div class="study-link-wrapper"><input type="checkbox" class="study-checkbox" id="checkbox-a" checked><label class="study-link-label" for="checkbox-a"><a class="study-link completed" href="https://a.example/">Done</a></label></div></li><li><div class="study-link-wrapper"><input type="checkbox" class="study-checkbox" id="checkbox-b"><label class="study-link-label" for="checkbox-b"><a class="study-link" href="https://b.example/">Todo</a></label></div></li></ul>"#;
        assert_eq!(texts(html), vec!["• [x] Done", "• [ ] Todo"]);
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let lines = texts("<pre><code>let a = 1;\nlet b = 2;\n</code></pre><p>after</p>");
        assert_eq!(lines[0], "    let a = 1;");
        assert_eq!(lines[1], "    let b = 2;");
        assert_eq!(lines.last().map(String::as_str), Some("after"));
    }

    #[test]
    fn test_nested_lists_indent() {
        let lines = texts("<ul><li>one<ul><li>inner</li></ul></li><li>two</li></ul>");
        assert_eq!(lines, vec!["• one", "  • inner", "• two"]);
    }

    #[test]
    fn test_scripts_are_dropped() {
        assert_eq!(texts("<p>a</p><script>alert(1)</script>"), vec!["a"]);
    }
}
