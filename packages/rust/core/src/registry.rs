//! Ordered converter registry.
//!
//! Entries are kept sorted by (priority, registration sequence). Lower
//! priorities are tried first; among equals the earlier registration wins.

use std::sync::Arc;

use tracing::debug;

use markitup_shared::{DocumentConverter, MarkItUpError, Priority, Result};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A registered converter with its effective priority.
#[derive(Clone)]
pub struct RegistryEntry {
    converter: Arc<dyn DocumentConverter>,
    priority: Priority,
    sequence: u64,
}

impl RegistryEntry {
    pub fn converter(&self) -> &Arc<dyn DocumentConverter> {
        &self.converter
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Registration order, unique within one registry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn name(&self) -> &str {
        self.converter.name()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("converter", &self.converter.name())
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registrar
// ---------------------------------------------------------------------------

/// The registration surface handed to plugins.
pub trait ConverterRegistrar {
    /// Register `converter` at `priority`, or at its declared tier when `None`.
    fn register(
        &mut self,
        converter: Arc<dyn DocumentConverter>,
        priority: Option<Priority>,
    ) -> Result<()>;
}

/// `true` if both handles point at the same converter instance.
pub(crate) fn same_instance(a: &Arc<dyn DocumentConverter>, b: &Arc<dyn DocumentConverter>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered converters in trial order.
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    entries: Vec<RegistryEntry>,
    next_sequence: u64,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in trial order.
    pub fn ordered(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converter names in trial order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(RegistryEntry::name).collect()
    }

    /// `true` if this exact instance is already registered.
    pub fn contains(&self, converter: &Arc<dyn DocumentConverter>) -> bool {
        self.entries
            .iter()
            .any(|e| same_instance(&e.converter, converter))
    }
}

impl ConverterRegistrar for ConverterRegistry {
    fn register(
        &mut self,
        converter: Arc<dyn DocumentConverter>,
        priority: Option<Priority>,
    ) -> Result<()> {
        if self.contains(&converter) {
            return Err(MarkItUpError::DuplicateRegistration {
                converter: converter.name().to_string(),
            });
        }

        let priority = priority.unwrap_or_else(|| converter.priority());
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        // Upper bound of the priority run keeps equal priorities in
        // registration order.
        let index = self.entries.partition_point(|e| e.priority <= priority);
        debug!(
            converter = converter.name(),
            %priority,
            sequence,
            position = index,
            "converter registered"
        );
        self.entries.insert(
            index,
            RegistryEntry {
                converter,
                priority,
                sequence,
            },
        );
        Ok(())
    }
}
