//! Operator registry
//!
//! Maps `(operator type, device kind)` to a schema and a constructor. The
//! registry is an ordinary value populated by an initialization routine;
//! registering the same pair twice is an error rather than an overwrite.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::hip_backend::HipContext;
use crate::error::{OpsError, OpsResult};
use crate::ops::def::{DeviceKind, OperatorDef};
use crate::ops::operator::{Operator, OperatorSchema};
use crate::ops::workspace::Workspace;

/// Constructor stored in the registry
pub type OperatorCreator =
    fn(&OperatorDef, &mut Workspace, Arc<HipContext>) -> OpsResult<Box<dyn Operator>>;

#[derive(Clone, Copy)]
struct RegistryEntry {
    schema: OperatorSchema,
    creator: OperatorCreator,
}

#[derive(Default)]
pub struct OperatorRegistry {
    entries: BTreeMap<(String, DeviceKind), RegistryEntry>,
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every operator of this crate
    pub fn with_hip_operators() -> OpsResult<Self> {
        let mut registry = Self::new();
        crate::operators::register_hip_operators(&mut registry)?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        op_type: &str,
        device: DeviceKind,
        schema: OperatorSchema,
        creator: OperatorCreator,
    ) -> OpsResult<()> {
        let key = (op_type.to_string(), device);
        if self.entries.contains_key(&key) {
            return Err(OpsError::DuplicateRegistration {
                op_type: op_type.to_string(),
                device: device.to_string(),
            });
        }
        tracing::trace!(op_type, %device, "registering operator");
        self.entries.insert(key, RegistryEntry { schema, creator });
        Ok(())
    }

    pub fn contains(&self, op_type: &str, device: DeviceKind) -> bool {
        self.entries.contains_key(&(op_type.to_string(), device))
    }

    pub fn schema(&self, op_type: &str, device: DeviceKind) -> Option<OperatorSchema> {
        self.entries
            .get(&(op_type.to_string(), device))
            .map(|e| e.schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered `(operator type, device kind)` pairs in sorted order
    pub fn registered_operators(&self) -> Vec<(String, DeviceKind)> {
        self.entries.keys().cloned().collect()
    }

    /// Build the operator described by `def` for its device kind
    pub fn create_operator(
        &self,
        def: &OperatorDef,
        ws: &mut Workspace,
        context: Arc<HipContext>,
    ) -> OpsResult<Box<dyn Operator>> {
        let entry = self
            .entries
            .get(&(def.op_type.clone(), def.device))
            .ok_or_else(|| OpsError::OperatorNotFound {
                op_type: def.op_type.clone(),
                device: def.device.to_string(),
            })?;
        entry.schema.verify(def)?;
        (entry.creator)(def, ws, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::operator::OperatorBase;

    struct Noop {
        base: OperatorBase,
    }

    impl Operator for Noop {
        fn base(&self) -> &OperatorBase {
            &self.base
        }

        fn run_on_device(&mut self) -> OpsResult<()> {
            Ok(())
        }
    }

    fn create_noop(
        def: &OperatorDef,
        ws: &mut Workspace,
        context: Arc<HipContext>,
    ) -> OpsResult<Box<dyn Operator>> {
        Ok(Box::new(Noop {
            base: OperatorBase::new(def, ws, context)?,
        }))
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let mut registry = OperatorRegistry::new();
        registry
            .register("Noop", DeviceKind::Hip, OperatorSchema::exact(0, 0), create_noop)
            .unwrap();
        let err = registry
            .register("Noop", DeviceKind::Hip, OperatorSchema::exact(0, 0), create_noop)
            .unwrap_err();
        assert!(matches!(err, OpsError::DuplicateRegistration { .. }));

        // Same name on another device kind is a different key
        registry
            .register("Noop", DeviceKind::Miopen, OperatorSchema::exact(0, 0), create_noop)
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registered_operators_sorted() {
        let mut registry = OperatorRegistry::new();
        for name in ["Zeta", "Alpha", "Mid"] {
            registry
                .register(name, DeviceKind::Hip, OperatorSchema::exact(0, 0), create_noop)
                .unwrap();
        }
        let names: Vec<String> = registry
            .registered_operators()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn test_create_unknown_operator() {
        let registry = OperatorRegistry::new();
        let ctx = Arc::new(HipContext::new(crate::config::DeviceConfig::default()).unwrap());
        let mut ws = Workspace::new();
        let err = registry
            .create_operator(&OperatorDef::new("Missing", &[], &[]), &mut ws, ctx)
            .err()
            .unwrap();
        assert!(matches!(err, OpsError::OperatorNotFound { .. }));
    }
}
