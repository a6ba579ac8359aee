/// Attachment slot bookkeeping
///
/// The `SlotManager` owns the ordered list of live slots. Slots are only
/// ever appended or removed at the tail, so the live indices are always
/// the contiguous range `[0, count)`. Identifiers of removed slots are
/// kept on a LIFO restore stack and handed back out when slots are
/// re-added.

use tracing::debug;

use super::data::Slot;

/// Token in the slot template that is replaced by the slot index
pub const PREFIX_TOKEN: &str = "__prefix__";

/// Template for the fields of a new slot
#[derive(Debug, Clone, PartialEq)]
pub struct FormTemplate {
    markup: String,
}

impl FormTemplate {
    pub fn new(markup: impl Into<String>) -> Self {
        Self { markup: markup.into() }
    }

    /// Substitute every prefix token with the slot index
    pub fn render(&self, index: usize) -> String {
        self.markup.replace(PREFIX_TOKEN, &index.to_string())
    }
}

impl Default for FormTemplate {
    fn default() -> Self {
        Self::new(format!("form-{}", PREFIX_TOKEN))
    }
}

/// Tracks the live slots and the restore stack
#[derive(Debug, Clone)]
pub struct SlotManager {
    slots: Vec<Slot>,
    max_count: usize,
    restore_stack: Vec<String>,
    template: FormTemplate,
    /// Also hand a second restored identifier to the previous slot when
    /// that slot has none
    redistribute: bool,
}

impl SlotManager {
    pub fn new(max_count: usize, template: FormTemplate) -> Self {
        Self {
            slots: Vec::new(),
            max_count,
            restore_stack: Vec::new(),
            template,
            redistribute: true,
        }
    }

    pub fn with_redistribution(mut self, redistribute: bool) -> Self {
        self.redistribute = redistribute;
        self
    }

    /// Number of live slots
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Whether another slot can be added
    pub fn can_add(&self) -> bool {
        self.count() < self.max_count
    }

    /// Whether there is a slot to remove
    pub fn can_remove(&self) -> bool {
        self.count() > 0
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Identifiers waiting to be restored, last-removed at the end
    pub fn restore_stack(&self) -> &[String] {
        &self.restore_stack
    }

    /// Append a slot at the tail.
    ///
    /// Returns the new index, or `None` when the form is already full.
    pub fn add_slot(&mut self) -> Option<usize> {
        if !self.can_add() {
            debug!(count = self.count(), "slot limit reached, add ignored");
            return None;
        }

        let index = self.count();
        let identifier = self.restore_stack.pop();
        self.slots.push(Slot {
            index,
            prefix: self.template.render(index),
            identifier,
            file: None,
        });

        if self.redistribute && index > 0 && !self.restore_stack.is_empty() {
            let previous = &mut self.slots[index - 1];
            if previous.identifier.is_none() {
                previous.identifier = self.restore_stack.pop();
            }
        }

        debug!(index, restored = ?self.slots[index].identifier, "slot added");
        Some(index)
    }

    /// Remove the last slot.
    ///
    /// Its identifier, if any, is pushed onto the restore stack. Returns the
    /// removed slot, or `None` when there are no slots.
    pub fn remove_slot(&mut self) -> Option<Slot> {
        let slot = self.slots.pop()?;
        if let Some(identifier) = &slot.identifier {
            self.restore_stack.push(identifier.clone());
        }
        debug!(index = slot.index, stacked = self.restore_stack.len(), "slot removed");
        Some(slot)
    }

    /// Create a slot for an attachment that already exists (edit flow)
    pub fn seed_slot(&mut self, identifier: Option<String>) -> Option<usize> {
        if !self.can_add() {
            return None;
        }
        let index = self.count();
        self.slots.push(Slot {
            index,
            prefix: self.template.render(index),
            identifier,
            file: None,
        });
        Some(index)
    }

    /// Drop every slot and the restore stack, handing back the slots
    pub fn drain(&mut self) -> Vec<Slot> {
        self.restore_stack.clear();
        std::mem::take(&mut self.slots)
    }
}

/// The counter fields the form processor reads back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagementForm {
    pub total_forms: usize,
    pub initial_forms: usize,
    pub max_num_forms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manager(max: usize) -> SlotManager {
        SlotManager::new(max, FormTemplate::default())
    }

    fn identifiers(manager: &SlotManager) -> Vec<Option<String>> {
        manager.slots().iter().map(|s| s.identifier.clone()).collect()
    }

    #[test]
    fn test_template_substitutes_every_token() {
        let template = FormTemplate::new("id_form-__prefix__-image / form-__prefix__-id");
        assert_eq!(template.render(7), "id_form-7-image / form-7-id");
        assert_eq!(manager(3).template.render(2), "form-2");
    }

    #[test]
    fn test_count_stays_within_bounds() {
        let mut slots = manager(2);

        assert_eq!(slots.add_slot(), Some(0));
        assert_eq!(slots.count(), 1);
        assert_eq!(slots.add_slot(), Some(1));
        assert_eq!(slots.count(), 2);
        assert!(!slots.can_add());
        assert_eq!(slots.add_slot(), None);
        assert_eq!(slots.count(), 2);

        assert!(slots.remove_slot().is_some());
        assert_eq!(slots.count(), 1);
        assert_eq!(slots.add_slot(), Some(1));
        assert_eq!(slots.count(), 2);
    }

    #[test]
    fn test_remove_at_zero_is_noop() {
        let mut slots = manager(2);
        assert!(!slots.can_remove());
        assert!(slots.remove_slot().is_none());
        assert_eq!(slots.count(), 0);
        assert!(slots.restore_stack().is_empty());
    }

    #[test]
    fn test_single_remove_add_restores_identifier() {
        let mut slots = manager(20);
        slots.seed_slot(Some("A123".into()));

        let removed = slots.remove_slot().unwrap();
        assert_eq!(removed.identifier.as_deref(), Some("A123"));
        assert_eq!(slots.count(), 0);
        assert_eq!(slots.restore_stack(), ["A123".to_string()]);

        assert_eq!(slots.add_slot(), Some(0));
        assert_eq!(slots.slot(0).unwrap().identifier.as_deref(), Some("A123"));
        assert!(slots.restore_stack().is_empty());
    }

    #[test]
    fn test_batch_remove_then_add_is_lifo() {
        let mut slots = manager(20);
        for id in ["A", "B", "C", "D"] {
            slots.seed_slot(Some(id.into()));
        }
        let before = identifiers(&slots);

        for _ in 0..3 {
            slots.remove_slot();
        }
        assert_eq!(slots.restore_stack(), ["D".to_string(), "C".into(), "B".into()]);

        for _ in 0..3 {
            slots.add_slot();
        }
        assert_eq!(identifiers(&slots), before);
        assert!(slots.restore_stack().is_empty());
    }

    #[test]
    fn test_new_slot_without_stack_has_no_identifier() {
        let mut slots = manager(5);
        slots.add_slot();
        assert_eq!(slots.slot(0).unwrap().identifier, None);
    }

    #[test]
    fn test_second_restore_fills_unset_previous_slot() {
        let mut slots = manager(5);
        slots.seed_slot(Some("A".into()));
        slots.seed_slot(Some("B".into()));
        slots.seed_slot(Some("C".into()));
        slots.remove_slot();
        slots.remove_slot();
        // Slot 0 loses its identifier outside the manager, e.g. a fresh form
        slots.slot_mut(0).unwrap().identifier = None;

        slots.add_slot();
        assert_eq!(identifiers(&slots), vec![Some("C".into()), Some("B".into())]);
        assert!(slots.restore_stack().is_empty());
    }

    #[test]
    fn test_redistribution_can_be_disabled() {
        let mut slots = manager(5).with_redistribution(false);
        slots.seed_slot(None);
        slots.seed_slot(Some("B".into()));
        slots.seed_slot(Some("C".into()));
        slots.remove_slot();
        slots.remove_slot();

        slots.add_slot();
        assert_eq!(identifiers(&slots), vec![None, Some("B".into())]);
        assert_eq!(slots.restore_stack(), ["C".to_string()]);
    }

    #[test]
    fn test_seed_respects_limit() {
        let mut slots = manager(1);
        assert_eq!(slots.seed_slot(Some("1".into())), Some(0));
        assert_eq!(slots.seed_slot(Some("2".into())), None);
    }

    #[test]
    fn test_random_sequences_never_exceed_bounds() {
        let mut slots = manager(3);
        // Deterministic pseudo-random walk of adds and removes
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            if seed % 3 == 0 {
                slots.remove_slot();
            } else {
                slots.add_slot();
            }
            assert!(slots.count() <= slots.max_count());
            for (i, slot) in slots.slots().iter().enumerate() {
                assert_eq!(slot.index, i);
            }
        }
    }
}
