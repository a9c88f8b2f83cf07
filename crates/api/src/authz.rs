//! API-side authorization guard for intent submission.
//!
//! Generalizes the teacher's `authorize_command` (a fixed `Permission` list
//! per route) into a single capability lookup keyed by `intent_type` (§6
//! "Actor identity"), enforced before the intent reaches the pipeline.

use ledgerflow_auth::{authorize, AuthzError, CapabilityMap};

use crate::context::PrincipalContext;

/// Check the current principal holds the capability required for
/// `intent_type`. Intended to be called before `IntentPipeline::execute`.
pub fn authorize_intent(
    capabilities: &CapabilityMap,
    principal: &PrincipalContext,
    intent_type: &str,
) -> Result<(), AuthzError> {
    authorize(principal.identity(), capabilities, intent_type)
}

/// The default capability map: one capability per registered AP intent
/// type, named identically to the intent type it gates. A deployment that
/// wants coarser roles (e.g. a single "ap_clerk" capability covering several
/// intent types) builds its own map instead of calling this.
pub fn default_capability_map() -> CapabilityMap {
    const INTENT_TYPES: &[&str] = &[
        "ap.vendor.create",
        "ap.vendor.update",
        "ap.vendor.add_contact",
        "ap.item.create",
        "ap.purchase_order.create",
        "ap.invoice.submit",
        "ap.invoice.approve",
        "ap.invoice.reject",
        "ap.invoice.post",
        "ap.invoice.pay",
    ];

    INTENT_TYPES
        .iter()
        .fold(CapabilityMap::new(), |map, intent_type| map.require(*intent_type, *intent_type))
}
