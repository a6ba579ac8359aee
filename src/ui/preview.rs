/// Live preview pane
/// Shows the rendered markdown with attachment images in place
use std::path::Path;

use iced::widget::{image, scrollable, text, Column};
use iced::{Element, Length};

use attachment_editor::preview::surface::{MarkdownPreview, PreviewBlock};
use crate::Message;

/// Width of embedded images in the preview
const IMAGE_WIDTH: f32 = 320.0;

pub fn preview_pane(preview: &MarkdownPreview) -> Element<'_, Message> {
    let mut content = Column::new().spacing(12).padding(10);

    for block in preview.blocks() {
        content = match block {
            PreviewBlock::Text { content: body, heading } => {
                content.push(text(body).size(if *heading { 24.0 } else { 16.0 }))
            }
            // Bound references are files on disk; anything else is still a placeholder
            PreviewBlock::Image { src, .. } if Path::new(src).is_file() => content.push(
                image(image::Handle::from_path(src)).width(Length::Fixed(IMAGE_WIDTH)),
            ),
            PreviewBlock::Image { src, alt } => {
                let label = if alt.is_empty() { src } else { alt };
                content.push(text(format!("[{}]", label)).size(14))
            }
        };
    }

    scrollable(content).height(Length::Fill).into()
}
