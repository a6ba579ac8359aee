/// The rendered preview that placeholder tokens and references appear in
///
/// The registry never owns the preview. It only asks whether a slot's
/// placeholder is on screen and swaps image sources in and out.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::state::data::{placeholder_token, ObjectUrl};

/// A rendered view that can show attachment images
pub trait PreviewSurface {
    /// Whether the placeholder for `index` is currently rendered
    fn shows_placeholder(&self, index: usize) -> bool;

    /// Show `url` wherever the placeholder for `index` is rendered
    fn render(&mut self, index: usize, url: &ObjectUrl);

    /// Put the placeholder for `index` back wherever `url` is rendered
    fn clear(&mut self, index: usize, url: &ObjectUrl);
}

/// One rendered element of the preview
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewBlock {
    Text { content: String, heading: bool },
    Image { src: String, alt: String },
}

/// Preview of the editor's markdown as a flat list of blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownPreview {
    blocks: Vec<PreviewBlock>,
}

impl MarkdownPreview {
    /// Render markdown into preview blocks
    pub fn parse(markdown: &str) -> Self {
        let mut blocks = Vec::new();
        let mut text = String::new();
        let mut heading = false;
        // (src, alt) of the image currently being read
        let mut image: Option<(String, String)> = None;

        for event in Parser::new(markdown) {
            match event {
                Event::Start(Tag::Heading { .. }) => heading = true,
                Event::Start(Tag::Image { dest_url, .. }) => {
                    flush_text(&mut blocks, &mut text, heading);
                    image = Some((dest_url.to_string(), String::new()));
                }
                Event::End(TagEnd::Image) => {
                    if let Some((src, alt)) = image.take() {
                        blocks.push(PreviewBlock::Image { src, alt });
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    flush_text(&mut blocks, &mut text, true);
                    heading = false;
                }
                Event::End(TagEnd::Paragraph | TagEnd::Item | TagEnd::CodeBlock | TagEnd::BlockQuote) => {
                    flush_text(&mut blocks, &mut text, heading);
                }
                Event::Text(s) | Event::Code(s) => match image.as_mut() {
                    Some((_, alt)) => alt.push_str(&s),
                    None => text.push_str(&s),
                },
                Event::SoftBreak => text.push(' '),
                Event::HardBreak => text.push('\n'),
                _ => {}
            }
        }
        flush_text(&mut blocks, &mut text, heading);

        Self { blocks }
    }

    pub fn blocks(&self) -> &[PreviewBlock] {
        &self.blocks
    }

    /// Sources of every rendered image, in document order
    pub fn image_sources(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                PreviewBlock::Image { src, .. } => Some(src.as_str()),
                PreviewBlock::Text { .. } => None,
            })
            .collect()
    }

    fn replace_sources(&mut self, from: &str, to: &str) {
        for block in &mut self.blocks {
            if let PreviewBlock::Image { src, .. } = block {
                if src == from {
                    *src = to.to_string();
                }
            }
        }
    }
}

impl PreviewSurface for MarkdownPreview {
    fn shows_placeholder(&self, index: usize) -> bool {
        let token = placeholder_token(index);
        self.image_sources().contains(&token.as_str())
    }

    fn render(&mut self, index: usize, url: &ObjectUrl) {
        self.replace_sources(&placeholder_token(index), url.as_str());
    }

    fn clear(&mut self, index: usize, url: &ObjectUrl) {
        self.replace_sources(url.as_str(), &placeholder_token(index));
    }
}

fn flush_text(blocks: &mut Vec<PreviewBlock>, text: &mut String, heading: bool) {
    let content = text.trim();
    if !content.is_empty() {
        blocks.push(PreviewBlock::Text {
            content: content.to_string(),
            heading,
        });
    }
    text.clear();
}
