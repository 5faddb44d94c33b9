//! Bounded HTML-subset reducer for long-note text.
//!
//! Recognised constructs: bold (`strong`, `b`), italic (`em`, `i`), line
//! break (`br` and raw newlines), block quote (`blockquote`) and paragraph
//! break (`p`, `div`). Every other tag is dropped while its inner text is
//! kept. Basic character entities are decoded.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)\b[^>]*>|<[^>]*>").expect("valid tag regex")
});

/// Inline run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text {
        text: String,
        bold: bool,
        italic: bool,
    },
    LineBreak,
}

/// Block-level construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Quote(Vec<Span>),
}

impl Block {
    pub fn spans(&self) -> &[Span] {
        match self {
            Self::Paragraph(spans) | Self::Quote(spans) => spans,
        }
    }
}

#[derive(Default)]
struct Reducer {
    blocks: Vec<Block>,
    current: Vec<Span>,
    bold: u32,
    italic: u32,
    quote: u32,
}

impl Reducer {
    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        for (index, line) in decoded.split('\n').enumerate() {
            if index > 0 {
                self.current.push(Span::LineBreak);
            }
            if line.is_empty() {
                continue;
            }
            let (bold, italic) = (self.bold > 0, self.italic > 0);
            match self.current.last_mut() {
                Some(Span::Text {
                    text,
                    bold: last_bold,
                    italic: last_italic,
                }) if *last_bold == bold && *last_italic == italic => text.push_str(line),
                _ => self.current.push(Span::Text {
                    text: line.to_string(),
                    bold,
                    italic,
                }),
            }
        }
    }

    fn tag(&mut self, closing: bool, name: &str) {
        match name.to_ascii_lowercase().as_str() {
            "strong" | "b" => adjust(&mut self.bold, closing),
            "em" | "i" => adjust(&mut self.italic, closing),
            "br" => self.current.push(Span::LineBreak),
            "p" | "div" => self.flush(),
            "blockquote" => {
                self.flush();
                adjust(&mut self.quote, closing);
            }
            _ => {}
        }
    }

    fn flush(&mut self) {
        let spans = trim_spans(std::mem::take(&mut self.current));
        if spans.is_empty() {
            return;
        }
        self.blocks.push(if self.quote > 0 {
            Block::Quote(spans)
        } else {
            Block::Paragraph(spans)
        });
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn adjust(counter: &mut u32, closing: bool) {
    if closing {
        *counter = counter.saturating_sub(1);
    } else {
        *counter += 1;
    }
}

/// Reduces `html` to the recognised block/span constructs.
pub fn parse(html: &str) -> Vec<Block> {
    let mut reducer = Reducer::default();
    let mut cursor = 0;
    for caps in TAG_RE.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        reducer.text(&html[cursor..whole.start()]);
        cursor = whole.end();
        if let Some(name) = caps.get(2) {
            let closing = caps.get(1).is_some_and(|slash| !slash.as_str().is_empty());
            reducer.tag(closing, name.as_str());
        }
    }
    reducer.text(&html[cursor..]);
    reducer.finish()
}

/// Drops leading/trailing breaks and outer whitespace of a block.
fn trim_spans(mut spans: Vec<Span>) -> Vec<Span> {
    loop {
        match spans.first_mut() {
            Some(Span::LineBreak) => {
                spans.remove(0);
            }
            Some(Span::Text { text, .. }) => {
                let trimmed = text.trim_start();
                if trimmed.is_empty() {
                    spans.remove(0);
                } else {
                    *text = trimmed.to_string();
                    break;
                }
            }
            None => break,
        }
    }
    loop {
        match spans.last_mut() {
            Some(Span::LineBreak) => {
                spans.pop();
            }
            Some(Span::Text { text, .. }) => {
                let trimmed = text.trim_end();
                if trimmed.is_empty() {
                    spans.pop();
                } else {
                    *text = trimmed.to_string();
                    break;
                }
            }
            None => break,
        }
    }
    spans
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Renders spans as Markdown inline text; breaks become `\n`.
pub fn spans_to_markdown(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::LineBreak => out.push('\n'),
            Span::Text { text, bold, italic } => {
                let marker = match (bold, italic) {
                    (true, true) => "***",
                    (true, false) => "**",
                    (false, true) => "*",
                    (false, false) => "",
                };
                out.push_str(marker);
                out.push_str(text);
                out.push_str(marker);
            }
        }
    }
    out
}
