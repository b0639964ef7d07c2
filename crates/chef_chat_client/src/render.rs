//! Markdown → terminal text. Pure functions; called on a whole message each time.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};

const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Bold,
    Italic,
    Underline,
    Code,
}

impl Style {
    fn ansi(self) -> &'static str {
        match self {
            Style::Bold => "\x1b[1m",
            Style::Italic => "\x1b[3m",
            Style::Underline => "\x1b[4m",
            Style::Code => "\x1b[36m",
        }
    }
}

/// Render markdown with ANSI styling. Inline HTML tags are dropped; HTML
/// blocks keep their text with the tags stripped.
pub fn render_markdown(text: &str) -> String {
    Renderer::new(true).run(text)
}

/// Render markdown as unstyled text (for non-terminal output).
pub fn render_plain(text: &str) -> String {
    Renderer::new(false).run(text)
}

struct Renderer {
    styled: bool,
    out: String,
    styles: Vec<Style>,
    /// One entry per open list: next ordinal, or `None` for bullets.
    lists: Vec<Option<u64>>,
    link_targets: Vec<String>,
    in_code_block: bool,
    /// Raw source of the HTML block being read.
    html_block: Option<String>,
}

impl Renderer {
    fn new(styled: bool) -> Self {
        Self {
            styled,
            out: String::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            link_targets: Vec::new(),
            in_code_block: false,
            html_block: None,
        }
    }

    fn run(mut self, text: &str) -> String {
        for event in Parser::new(text) {
            self.event(event);
        }
        let trimmed = self.out.trim_end_matches('\n').len();
        self.out.truncate(trimmed);
        self.out
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    for line in text.lines() {
                        self.out.push_str("    ");
                        self.out.push_str(line);
                        self.out.push('\n');
                    }
                } else {
                    self.out.push_str(&text);
                }
            }
            Event::Code(code) => {
                self.push_style(Style::Code);
                self.out.push_str(&code);
                self.pop_style();
            }
            Event::SoftBreak => self.out.push(' '),
            Event::HardBreak => self.out.push('\n'),
            Event::Rule => self.out.push_str("────────────\n\n"),
            Event::TaskListMarker(done) => self.out.push_str(if done { "[x] " } else { "[ ] " }),
            Event::Html(html) => {
                if let Some(raw) = &mut self.html_block {
                    raw.push_str(&html);
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.push_style(Style::Bold);
                if level == HeadingLevel::H1 {
                    self.push_style(Style::Underline);
                }
            }
            Tag::Emphasis => self.push_style(Style::Italic),
            Tag::Strong => self.push_style(Style::Bold),
            Tag::List(start) => {
                if !self.lists.is_empty() && !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("• "),
                }
            }
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.out.push_str(&format!("  [{lang}]\n"));
                    }
                }
                self.push_style(Style::Code);
            }
            Tag::Link { dest_url, .. } => {
                self.link_targets.push(dest_url.to_string());
                self.push_style(Style::Underline);
            }
            Tag::HtmlBlock => self.html_block = Some(String::new()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(level) => {
                if level == HeadingLevel::H1 {
                    self.pop_style();
                }
                self.pop_style();
                self.out.push_str("\n\n");
            }
            TagEnd::Paragraph => self.end_block(),
            TagEnd::HtmlBlock => {
                let raw = self.html_block.take().unwrap_or_default();
                let text = strip_tags(&raw);
                let lines: Vec<&str> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect();
                if !lines.is_empty() {
                    self.out.push_str(&lines.join("\n"));
                    self.end_block();
                }
            }
            TagEnd::Emphasis | TagEnd::Strong => self.pop_style(),
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.out.push('\n');
                }
            }
            TagEnd::Item => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
            }
            TagEnd::CodeBlock => {
                self.pop_style();
                self.in_code_block = false;
                self.out.push('\n');
            }
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link_targets.pop() {
                    self.out.push_str(&format!(" ({url})"));
                }
            }
            _ => {}
        }
    }

    fn end_block(&mut self) {
        self.out.push_str(if self.lists.is_empty() { "\n\n" } else { "\n" });
    }

    fn push_style(&mut self, style: Style) {
        self.styles.push(style);
        if self.styled {
            self.out.push_str(style.ansi());
        }
    }

    fn pop_style(&mut self) {
        self.styles.pop();
        if self.styled {
            self.out.push_str(RESET);
            for style in &self.styles {
                self.out.push_str(style.ansi());
            }
        }
    }
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}
