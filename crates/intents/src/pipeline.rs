//! Intent Pipeline (C9): a thin per-`intent_type` registry router.
//!
//! Generalizes the teacher's `CommandDispatcher<S, B>::dispatch::<A>()` free
//! function (load → validate → rehydrate → decide → persist → publish) into
//! a registry-dispatched router, because here the "aggregate type" varies
//! per intent type instead of being a compile-time generic chosen by the
//! caller.

use std::collections::HashMap;
use std::sync::Arc;

use ledgerflow_core::IntentId;

use crate::handler::{IntentHandler, IntentResult};
use crate::intent::Intent;

#[derive(Debug, Clone)]
pub struct NoHandlerRegistered {
    pub intent_type: String,
}

pub struct IntentPipeline {
    handlers: HashMap<&'static str, Arc<dyn IntentHandler>>,
}

impl Default for IntentPipeline {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl IntentPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        self.handlers.insert(handler.intent_type(), handler);
    }

    /// Assign a fresh intent id and dispatch to the registered handler.
    /// Returns `Err` if no handler is registered for `intent.intent_type`.
    pub fn execute(&self, intent: &Intent) -> Result<IntentResult, NoHandlerRegistered> {
        let handler = self
            .handlers
            .get(intent.intent_type.as_str())
            .ok_or_else(|| NoHandlerRegistered {
                intent_type: intent.intent_type.clone(),
            })?;

        let intent_id = IntentId::new();
        Ok(handler.execute(intent, intent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerflow_core::{Actor, ActorType, ActorId, EventId, LegalEntityId, TenantId};
    use serde_json::json;

    struct EchoHandler;

    impl IntentHandler for EchoHandler {
        fn intent_type(&self) -> &'static str {
            "ap.vendor.create"
        }

        fn execute(&self, _intent: &Intent, _intent_id: IntentId) -> IntentResult {
            IntentResult::Success {
                event_id: EventId::new(),
                event: None,
            }
        }
    }

    fn sample_intent() -> Intent {
        Intent::new_pending_approval(
            "ap.vendor.create",
            Actor::new(ActorType::Human, ActorId::new(), "alice"),
            TenantId::new(),
            LegalEntityId::new(),
            json!({"name": "Acme"}),
            "mdm_manager",
        )
    }

    #[test]
    fn dispatches_to_registered_handler() {
        let mut pipeline = IntentPipeline::new();
        pipeline.register(Arc::new(EchoHandler));

        let result = pipeline.execute(&sample_intent()).unwrap();
        assert!(result.is_success());
    }

    #[test]
    fn unregistered_intent_type_errors() {
        let pipeline = IntentPipeline::new();
        let mut intent = sample_intent();
        intent.intent_type = "ap.widget.create".to_string();

        let err = pipeline.execute(&intent).unwrap_err();
        assert_eq!(err.intent_type, "ap.widget.create");
    }
}
