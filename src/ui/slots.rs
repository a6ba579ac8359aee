/// Attachment slot list with add/remove affordances
use iced::widget::{button, row, text, Column};
use iced::{Alignment, Element, Length};

use attachment_editor::preview::store::ReferenceStore;
use attachment_editor::state::form::AttachmentForm;
use crate::Message;

pub fn slot_list<S: ReferenceStore>(form: &AttachmentForm<S>) -> Element<'_, Message> {
    let mut list = Column::new().spacing(6);

    if form.entries().is_empty() {
        list = list.push(text("There are currently no attachments").size(14));
    }

    for entry in form.entries() {
        let index = entry.index;
        list = list.push(
            row![
                text(&entry.label).size(14).width(Length::Fixed(260.0)),
                button("Choose file").on_press(Message::PickFile(index)),
                button("Clear").on_press(Message::ClearFile(index)),
                button("Insert").on_press_maybe(entry.enabled.then_some(Message::InsertImage(index))),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        );
    }

    // Buttons are only shown while the action is possible
    let controls = row![]
        .spacing(8)
        .push_maybe(form.can_add().then(|| button("Add attachment").on_press(Message::AddSlot)))
        .push_maybe(form.can_remove().then(|| button("Remove attachment").on_press(Message::RemoveSlot)));

    list.push(controls).into()
}
