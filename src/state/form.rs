/// Attachment form session
///
/// Ties the slot bookkeeping, the reference registry, the management
/// counters and the editor's attachment list together. One session lasts
/// from opening the form until it is submitted.

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::data::{placeholder_markdown, FileStatus, LocalFile, Slot};
use super::registry::{ReferenceRegistry, RegistryError};
use super::slots::{FormTemplate, ManagementForm, SlotManager};
use crate::config::FormConfig;
use crate::preview::store::ReferenceStore;
use crate::preview::surface::PreviewSurface;

/// Name of the counter field the form processor reads
pub const TOTAL_FORMS_FIELD: &str = "form-TOTAL_FORMS";

#[derive(Debug, Error)]
pub enum FormError {
    #[error("no attachment slot at index {0}")]
    NoSuchSlot(usize),
    #[error("{name} in attachment {index} is not a valid image")]
    InvalidSelection { index: usize, name: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// An "insert image" affordance in the editor's attachment list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub index: usize,
    /// Distinguishes this slot from earlier slots at the same index
    pub serial: u64,
    pub label: String,
    pub enabled: bool,
}

impl AttachmentEntry {
    fn new(index: usize, serial: u64) -> Self {
        Self {
            index,
            serial,
            label: format!("Attachment {}", index),
            enabled: false,
        }
    }

    fn relabel(&mut self, filename: Option<&str>) {
        self.label = match filename {
            Some(name) => format!("Attachment {}: {}", self.index, name),
            None => format!("Attachment {}", self.index),
        };
    }
}

/// What the form hands to the processor on submit
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub management: ManagementForm,
    pub slots: Vec<Slot>,
}

impl Submission {
    /// Flat field map as posted by the browser form
    pub fn form_data(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(TOTAL_FORMS_FIELD.into(), json!(self.management.total_forms));
        fields.insert("form-INITIAL_FORMS".into(), json!(self.management.initial_forms));
        fields.insert("form-MAX_NUM_FORMS".into(), json!(self.management.max_num_forms));
        for slot in &self.slots {
            fields.insert(
                format!("{}-id", slot.prefix),
                json!(slot.identifier.as_deref().unwrap_or_default()),
            );
            fields.insert(
                format!("{}-image", slot.prefix),
                json!(slot.file.as_ref().map(|f| f.name.as_str()).unwrap_or_default()),
            );
        }
        Value::Object(fields)
    }
}

/// One editing session of an attachment form
#[derive(Debug)]
pub struct AttachmentForm<S: ReferenceStore> {
    slots: SlotManager,
    registry: ReferenceRegistry<S>,
    management: ManagementForm,
    entries: Vec<AttachmentEntry>,
    next_serial: u64,
}

impl<S: ReferenceStore> AttachmentForm<S> {
    pub fn new(config: &FormConfig, store: S) -> Self {
        let slots = SlotManager::new(config.max_attachments, FormTemplate::default())
            .with_redistribution(config.redistribute_restored_identifiers);
        Self {
            slots,
            registry: ReferenceRegistry::new(store, config.validator()),
            management: ManagementForm {
                total_forms: 0,
                initial_forms: 0,
                max_num_forms: config.max_attachments,
            },
            entries: Vec::new(),
            next_serial: 0,
        }
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    pub fn registry(&self) -> &ReferenceRegistry<S> {
        &self.registry
    }

    pub fn management(&self) -> ManagementForm {
        self.management
    }

    /// The editor's "insert image" list, one entry per slot
    pub fn entries(&self) -> &[AttachmentEntry] {
        &self.entries
    }

    /// Serial of the slot currently at `index`
    pub fn slot_serial(&self, index: usize) -> Option<u64> {
        self.entries.get(index).map(|entry| entry.serial)
    }

    /// Slots holding a file that failed validation
    pub fn invalid_slots(&self) -> Vec<usize> {
        self.slots
            .slots()
            .iter()
            .filter(|slot| slot.file.is_some() && !self.registry.contains(slot.index))
            .map(|slot| slot.index)
            .collect()
    }

    pub fn can_add(&self) -> bool {
        self.slots.can_add()
    }

    pub fn can_remove(&self) -> bool {
        self.slots.can_remove()
    }

    /// Add a slot, returning its index, or `None` at the limit
    pub fn add_slot(&mut self) -> Option<usize> {
        let index = self.slots.add_slot()?;
        let entry = AttachmentEntry::new(index, self.take_serial());
        self.entries.push(entry);
        self.update_counter();
        Some(index)
    }

    /// Remove the last slot and release its reference
    pub fn remove_slot(&mut self, surface: &mut dyn PreviewSurface) -> Result<Option<usize>, FormError> {
        let Some(slot) = self.slots.remove_slot() else {
            return Ok(None);
        };
        self.entries.pop();
        self.update_counter();
        self.registry.remove_slot_reference(slot.index, surface)?;
        Ok(Some(slot.index))
    }

    /// React to the file input of slot `index` changing
    pub fn select_file(
        &mut self,
        index: usize,
        file: Option<LocalFile>,
        surface: &mut dyn PreviewSurface,
    ) -> Result<FileStatus, FormError> {
        if self.slots.slot(index).is_none() {
            return Err(FormError::NoSuchSlot(index));
        }
        let bound = self.registry.set_reference(index, file.as_ref(), surface)?;

        let status = match (&file, bound) {
            (None, _) => FileStatus::Cleared,
            (Some(_), true) => FileStatus::Valid,
            (Some(_), false) => FileStatus::Invalid,
        };

        if let Some(entry) = self.entries.get_mut(index) {
            entry.relabel(file.as_ref().map(|f| f.name.as_str()));
            entry.enabled = status == FileStatus::Valid;
        }

        if status == FileStatus::Invalid {
            info!(index, name = ?file.as_ref().map(|f| &f.name), "rejected attachment selection");
        }
        if let Some(slot) = self.slots.slot_mut(index) {
            slot.file = file;
        }
        Ok(status)
    }

    /// Seed a slot for an attachment that was saved earlier.
    ///
    /// `url` is the location of the stored file, if the form could show it.
    pub fn seed_existing(
        &mut self,
        identifier: Option<String>,
        url: Option<String>,
    ) -> Result<Option<usize>, FormError> {
        let Some(index) = self.slots.seed_slot(identifier) else {
            return Ok(None);
        };

        let mut entry = AttachmentEntry::new(index, self.take_serial());
        if let Some(url) = url {
            let name = url.rsplit(|c: char| c == '\\' || c == '/').next().unwrap_or_default().to_string();
            entry.relabel(Some(&name));
            self.registry.seed_persisted(index, url)?;
        }
        entry.enabled = true;
        self.entries.push(entry);

        self.management.initial_forms += 1;
        self.update_counter();
        Ok(Some(index))
    }

    /// Swap placeholders for live references after the preview re-rendered
    pub fn sync_preview(&self, surface: &mut dyn PreviewSurface) {
        self.registry.sync_preview(surface);
    }

    /// Markdown inserted by the "insert image" affordance of slot `index`
    pub fn placeholder_markdown(&self, index: usize) -> Option<String> {
        self.entries
            .get(index)
            .filter(|entry| entry.enabled)
            .map(|_| placeholder_markdown(index))
    }

    /// End the session, releasing every temporary reference.
    ///
    /// Refused while a slot holds a file that failed validation; the
    /// session is left untouched in that case.
    pub fn submit(&mut self) -> Result<Submission, FormError> {
        if let Some(&index) = self.invalid_slots().first() {
            let name = self
                .slots
                .slot(index)
                .and_then(|slot| slot.file.as_ref())
                .map(|file| file.name.clone())
                .unwrap_or_default();
            return Err(FormError::InvalidSelection { index, name });
        }

        if let Err(e) = self.registry.clear() {
            warn!(error = %e, "previews not fully released on submit");
        }
        self.entries.clear();
        let submission = Submission {
            management: self.management,
            slots: self.slots.drain(),
        };
        self.management.initial_forms = 0;
        self.update_counter();
        info!(total = submission.management.total_forms, "attachment form submitted");
        Ok(submission)
    }

    fn take_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    fn update_counter(&mut self) {
        self.management.total_forms = self.slots.count();
        debug!(total = self.management.total_forms, "{} updated", TOTAL_FORMS_FIELD);
    }
}
