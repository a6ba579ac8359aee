/// Blob URL registry
///
/// Maps slot indices to temporary references used for live previews.
/// Every index is either empty or bound to exactly one reference, and a
/// temporary reference is always released before its entry is replaced
/// or dropped.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use super::data::{LocalFile, ObjectUrl, Reference};
use super::validate::Validator;
use crate::preview::store::{ReferenceStore, StoreError};
use crate::preview::surface::PreviewSurface;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no reference is bound at index {0}")]
    NoReference(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sparse index -> reference mapping backed by a reference store
#[derive(Debug)]
pub struct ReferenceRegistry<S: ReferenceStore> {
    store: S,
    entries: BTreeMap<usize, Reference>,
    validator: Validator,
}

impl<S: ReferenceStore> ReferenceRegistry<S> {
    pub fn new(store: S, validator: Validator) -> Self {
        Self {
            store,
            entries: BTreeMap::new(),
            validator,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Reference> {
        self.entries.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bind a freshly selected file to `index`.
    ///
    /// Any reference already bound there is revoked first. When the file
    /// fails validation nothing new is bound and `Ok(false)` is returned.
    pub fn set_reference(
        &mut self,
        index: usize,
        file: Option<&LocalFile>,
        surface: &mut dyn PreviewSurface,
    ) -> Result<bool, RegistryError> {
        if self.contains(index) {
            self.revoke(index, surface)?;
        }

        let Some(file) = file.filter(|f| self.validator.is_valid(Some(*f))) else {
            debug!(index, "selection rejected, slot shows placeholder");
            return Ok(false);
        };

        let url = self.store.create(file)?;
        debug!(index, %url, "reference bound");
        self.entries.insert(index, Reference::Temporary(url));
        self.sync_preview(surface);
        Ok(true)
    }

    /// Record a reference to an already persisted attachment.
    ///
    /// Persisted references are not owned by the store and are never
    /// released through it.
    pub fn seed_persisted(&mut self, index: usize, url: impl Into<String>) -> Result<(), RegistryError> {
        if let Some(Reference::Temporary(old)) = self.entries.remove(&index) {
            if let Err(e) = self.store.revoke(&old) {
                warn!(index, url = %old, error = %e, "failed to release reference");
            }
        }
        self.entries.insert(index, Reference::Persisted(ObjectUrl(url.into())));
        Ok(())
    }

    /// Release the reference at `index` and put the placeholder back into
    /// the preview.
    ///
    /// Fails with `NoReference` when nothing is bound there. The entry is
    /// dropped and the preview reset even if the store cannot release the
    /// reference; that failure is only logged.
    pub fn revoke(&mut self, index: usize, surface: &mut dyn PreviewSurface) -> Result<(), RegistryError> {
        let reference = self
            .entries
            .remove(&index)
            .ok_or(RegistryError::NoReference(index))?;
        surface.clear(index, reference.url());

        if let Reference::Temporary(url) = &reference {
            if let Err(e) = self.store.revoke(url) {
                warn!(index, %url, error = %e, "failed to release reference");
                return Ok(());
            }
        }
        debug!(index, url = %reference.url(), "reference revoked");
        Ok(())
    }

    /// Revoke the reference of a removed slot, if it had one
    pub fn remove_slot_reference(
        &mut self,
        index: usize,
        surface: &mut dyn PreviewSurface,
    ) -> Result<(), RegistryError> {
        if !self.contains(index) {
            return Ok(());
        }
        self.revoke(index, surface)
    }

    /// Swap placeholders in the preview for the bound references.
    ///
    /// Safe to call after every preview re-render.
    pub fn sync_preview(&self, surface: &mut dyn PreviewSurface) {
        for (&index, reference) in &self.entries {
            if surface.shows_placeholder(index) {
                surface.render(index, reference.url());
            }
        }
    }

    /// Release every temporary reference and forget all entries
    pub fn clear(&mut self) -> Result<(), RegistryError> {
        let mut result: Result<(), RegistryError> = Ok(());
        for (index, reference) in std::mem::take(&mut self.entries) {
            if let Reference::Temporary(url) = reference {
                if let Err(e) = self.store.revoke(&url) {
                    warn!(index, %url, error = %e, "failed to release reference");
                    if result.is_ok() {
                        result = Err(e.into());
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::store::{CacheDirStore, MemoryStore};
    use crate::preview::surface::MarkdownPreview;
    use crate::state::validate::ValidationMode;
    use std::fs;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn validator() -> Validator {
        Validator::new(
            ValidationMode::ContentTypeAndExtension,
            vec!["png".into(), "jpeg".into(), "jpg".into()],
        )
    }

    fn registry() -> ReferenceRegistry<MemoryStore> {
        ReferenceRegistry::new(MemoryStore::default(), validator())
    }

    fn png(name: &str) -> LocalFile {
        LocalFile::from_bytes(name, PNG_MAGIC.to_vec())
    }

    #[test]
    fn test_bind_valid_image() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::default();

        assert!(registry.set_reference(0, Some(&png("a.png")), &mut preview).unwrap());
        assert!(matches!(registry.get(0), Some(Reference::Temporary(_))));
        assert_eq!(registry.store().created(), 1);
        assert_eq!(registry.store().live(), 1);
    }

    #[test]
    fn test_rebinding_revokes_previous_reference() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::default();

        registry.set_reference(0, Some(&png("a.png")), &mut preview).unwrap();
        let first = registry.get(0).unwrap().url().clone();
        registry.set_reference(0, Some(&png("b.png")), &mut preview).unwrap();

        assert_ne!(registry.get(0).unwrap().url(), &first);
        assert_eq!(registry.store().created(), 2);
        assert_eq!(registry.store().revoked(), 1);
        assert_eq!(registry.store().live(), 1);
        assert!(!registry.store().is_live(&first));
    }

    #[test]
    fn test_invalid_file_revokes_and_leaves_index_empty() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::default();

        registry.set_reference(0, Some(&png("a.png")), &mut preview).unwrap();
        let text = LocalFile::from_bytes("notes.txt", b"plain".to_vec());
        assert!(!registry.set_reference(0, Some(&text), &mut preview).unwrap());

        assert!(!registry.contains(0));
        assert_eq!(registry.store().revoked(), 1);
        assert_eq!(registry.store().live(), 0);
    }

    #[test]
    fn test_revoke_missing_reference() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::default();
        registry.set_reference(1, Some(&png("b.png")), &mut preview).unwrap();

        assert!(matches!(
            registry.revoke(0, &mut preview),
            Err(RegistryError::NoReference(0))
        ));
        registry.remove_slot_reference(0, &mut preview).unwrap();
        assert!(registry.contains(1));
        assert_eq!(registry.store().revoked(), 0);
    }

    #[test]
    fn test_sync_and_revoke_update_preview() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::parse("Look: ![](Image-0) and ![](Image-1)");

        registry.set_reference(0, Some(&png("a.png")), &mut preview).unwrap();
        let url = registry.get(0).unwrap().url().clone();
        assert_eq!(preview.image_sources(), vec![url.as_str(), "Image-1"]);

        // Idempotent
        registry.sync_preview(&mut preview);
        assert_eq!(preview.image_sources(), vec![url.as_str(), "Image-1"]);

        registry.revoke(0, &mut preview).unwrap();
        assert_eq!(preview.image_sources(), vec!["Image-0", "Image-1"]);
    }

    #[test]
    fn test_persisted_reference_is_not_released() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::parse("![](Image-0)");

        registry.seed_persisted(0, "/media/uploads/old.png").unwrap();
        registry.sync_preview(&mut preview);
        assert_eq!(preview.image_sources(), vec!["/media/uploads/old.png"]);

        registry.set_reference(0, Some(&png("new.png")), &mut preview).unwrap();
        assert_eq!(registry.store().revoked(), 0);
        assert_eq!(registry.store().live(), 1);
    }

    #[test]
    fn test_release_failure_still_unbinds() {
        let root = tempfile::tempdir().unwrap();
        let store = CacheDirStore::new(root.path()).unwrap();
        let mut registry = ReferenceRegistry::new(store, validator());
        let mut preview = MarkdownPreview::parse("![](Image-0)");

        registry.set_reference(0, Some(&png("a.png")), &mut preview).unwrap();
        let first = registry.get(0).unwrap().url().clone();
        fs::remove_file(first.as_str()).unwrap();

        assert!(registry.set_reference(0, Some(&png("b.png")), &mut preview).unwrap());
        let second = registry.get(0).unwrap().url().clone();
        assert_ne!(second, first);
        assert_eq!(preview.image_sources(), vec![second.as_str()]);

        fs::remove_file(second.as_str()).unwrap();
        registry.revoke(0, &mut preview).unwrap();
        assert!(!registry.contains(0));
        assert_eq!(preview.image_sources(), vec!["Image-0"]);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut registry = registry();
        let mut preview = MarkdownPreview::default();
        registry.set_reference(0, Some(&png("a.png")), &mut preview).unwrap();
        registry.set_reference(3, Some(&png("d.png")), &mut preview).unwrap();
        registry.seed_persisted(1, "/media/b.png").unwrap();

        registry.clear().unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.store().live(), 0);
        assert_eq!(registry.store().revoked(), 2);
    }
}
