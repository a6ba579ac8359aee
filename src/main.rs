use iced::widget::{button, column, container, row, text, text_editor};
use iced::{Element, Length, Task, Theme};
use rfd::FileDialog;
use std::sync::Arc;
use tracing::{error, info, warn};

use attachment_editor::config::FormConfig;
use attachment_editor::logging;
use attachment_editor::preview::{self, store::CacheDirStore, surface::MarkdownPreview};
use attachment_editor::state::data::{FileStatus, LocalFile};
use attachment_editor::state::form::AttachmentForm;
use attachment_editor::state::library::Library;

mod ui;

/// Main application state
struct AttachmentEditor {
    config: FormConfig,
    /// The attachment catalog
    library: Library,
    /// The current form session
    form: AttachmentForm<CacheDirStore>,
    /// Markdown being edited
    editor: text_editor::Content,
    /// Rendered markdown with attachment images
    preview: MarkdownPreview,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked "Add attachment"
    AddSlot,
    /// User clicked "Remove attachment"
    RemoveSlot,
    /// User wants to choose a file for a slot
    PickFile(usize),
    /// Background file read finished for the slot with the given serial
    FileLoaded(u64, Result<(usize, LocalFile), String>),
    /// User cleared the file of a slot
    ClearFile(usize),
    /// User wants to embed a slot's image in the markdown
    InsertImage(usize),
    /// Editor input
    Edit(text_editor::Action),
    /// User clicked "Save"
    Save,
}

impl AttachmentEditor {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = FormConfig::load().unwrap_or_else(|e| {
            warn!("{}, using defaults", e);
            FormConfig::default()
        });

        // The app cannot function without its catalog or preview cache
        let library = Library::new()
            .expect("Failed to initialize attachment catalog. Check permissions and disk space.");
        let store = CacheDirStore::in_user_cache()
            .expect("Failed to create preview cache directory");

        let mut app = AttachmentEditor {
            form: AttachmentForm::new(&config, store),
            config,
            library,
            editor: text_editor::Content::new(),
            preview: MarkdownPreview::default(),
            status: String::new(),
        };
        app.seed_from_library();

        info!(
            "🎨 Attachment editor ready for '{}' with {} attachments",
            app.config.content_id,
            app.form.management().total_forms
        );
        app.status = format!("Ready. {} attachments.", app.form.management().total_forms);

        (app, Task::none())
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::AddSlot => {
                if self.form.add_slot().is_none() {
                    self.status = format!("At most {} attachments.", self.config.max_attachments);
                }
                Task::none()
            }
            Message::RemoveSlot => {
                if let Err(e) = self.form.remove_slot(&mut self.preview) {
                    error!("Failed to remove attachment: {}", e);
                    self.status = format!("Failed to remove attachment: {}", e);
                }
                Task::none()
            }
            Message::PickFile(index) => {
                let Some(serial) = self.form.slot_serial(index) else {
                    return Task::none();
                };

                // Show the native file picker dialog
                let mut dialog = FileDialog::new()
                    .set_title("Select Image Attachment")
                    .add_filter("Images", &self.config.allowed_extensions[..])
                    .add_filter("All files", &["*"]);
                if let Some(pictures) = dirs::picture_dir() {
                    dialog = dialog.set_directory(pictures);
                }

                match dialog.pick_file() {
                    Some(path) => Task::perform(
                        preview::loader::load_local_file(index, path),
                        move |result| Message::FileLoaded(serial, result),
                    ),
                    None => Task::none(),
                }
            }
            Message::FileLoaded(serial, Ok((index, file))) => {
                // The slot may have been removed or replaced while the file was loading
                if self.form.slot_serial(index) == Some(serial) {
                    self.select_file(index, Some(file));
                }
                Task::none()
            }
            Message::FileLoaded(_, Err(e)) => {
                warn!("{}", e);
                self.status = e;
                Task::none()
            }
            Message::ClearFile(index) => {
                self.select_file(index, None);
                Task::none()
            }
            Message::InsertImage(index) => {
                if let Some(markdown) = self.form.placeholder_markdown(index) {
                    self.editor
                        .perform(text_editor::Action::Edit(text_editor::Edit::Paste(Arc::new(markdown))));
                    self.refresh_preview();
                }
                Task::none()
            }
            Message::Edit(action) => {
                let is_edit = action.is_edit();
                self.editor.perform(action);
                if is_edit {
                    self.refresh_preview();
                }
                Task::none()
            }
            Message::Save => {
                self.save();
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let editor = text_editor(&self.editor)
            .placeholder("Markdown")
            .on_action(Message::Edit)
            .height(Length::Fill);

        let panes = row![
            container(editor).width(Length::FillPortion(1)),
            container(ui::preview::preview_pane(&self.preview)).width(Length::FillPortion(1)),
        ]
        .spacing(20)
        .height(Length::FillPortion(3));

        let content = column![
            text(format!("Content: {}", self.config.content_id)).size(24),
            panes,
            ui::slots::slot_list(&self.form),
            button("Save").on_press(Message::Save).padding(10),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(40);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    /// Forward a slot's file change to the form and report the outcome
    fn select_file(&mut self, index: usize, file: Option<LocalFile>) {
        let name = file.as_ref().map(|f| f.name.clone()).unwrap_or_default();
        self.status = match self.form.select_file(index, file, &mut self.preview) {
            Ok(FileStatus::Valid) => format!("Attachment {}: {}", index, name),
            Ok(FileStatus::Invalid) => format!(
                "{} is not a valid image. Allowed extensions are: {}.",
                name,
                self.config.allowed_extensions.join(", ")
            ),
            Ok(FileStatus::Cleared) => format!("Attachment {} cleared.", index),
            Err(e) => {
                error!("Failed to update attachment {}: {}", index, e);
                format!("Failed to update attachment {}: {}", index, e)
            }
        };
    }

    /// Re-render the preview from the editor and show bound images
    fn refresh_preview(&mut self) {
        self.preview = MarkdownPreview::parse(&self.editor.text());
        self.form.sync_preview(&mut self.preview);
    }

    /// Create slots for the attachments already in the catalog
    fn seed_from_library(&mut self) {
        let attachments = match self.library.attachments_for(&self.config.content_id) {
            Ok(attachments) => attachments,
            Err(e) => {
                error!("Failed to load attachments: {}", e);
                self.status = format!("Failed to load attachments: {}", e);
                return;
            }
        };

        for attachment in attachments {
            let seeded = self
                .form
                .seed_existing(Some(attachment.id.to_string()), Some(attachment.path));
            if let Err(e) = seeded {
                error!("Failed to seed attachment {}: {}", attachment.id, e);
            }
        }
        self.refresh_preview();
    }

    /// Submit the form, write it to the catalog and start a new session
    fn save(&mut self) {
        let store = match CacheDirStore::in_user_cache() {
            Ok(store) => store,
            Err(e) => {
                self.status = format!("Failed to save: {}", e);
                return;
            }
        };

        // An invalid selection keeps the session open so it can be fixed
        let submission = match self.form.submit() {
            Ok(submission) => submission,
            Err(e) => {
                warn!("Save refused: {}", e);
                self.status = format!("Cannot save: {}. Choose another file or clear it.", e);
                return;
            }
        };

        self.form = AttachmentForm::new(&self.config, store);
        let saved = self
            .library
            .apply_submission(&self.config.content_id, &submission);

        self.status = match saved {
            Ok(saved) => format!("✅ Saved {} attachments.", saved.len()),
            Err(e) => {
                error!("Failed to save attachments: {}", e);
                format!("Failed to save: {}", e)
            }
        };
        self.seed_from_library();
    }
}

fn main() -> iced::Result {
    logging::init();

    iced::application(
        "Attachment Editor",
        AttachmentEditor::update,
        AttachmentEditor::view,
    )
    .theme(AttachmentEditor::theme)
    .centered()
    .run_with(AttachmentEditor::new)
}
