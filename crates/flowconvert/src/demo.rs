use crate::import::import_str;
use flowcore::{ImportError, Workflow};

/// Legacy source of the bundled outpatient registration flow (门诊登记).
pub const DEMO_LEGACY_JSON: &str = include_str!("../fixtures/outpatient_registration.json");

/// Converts the bundled demo document.
pub fn demo_workflow() -> Result<Workflow, ImportError> {
    import_str(DEMO_LEGACY_JSON)
}
