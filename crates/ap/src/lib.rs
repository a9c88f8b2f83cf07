//! Accounts-payable intent handlers: vendor, item, purchase order, and
//! invoice lifecycles, built on the Event Store, Entity Graph, Rules Engine,
//! and Projection Engine abstractions.

pub mod invoice;
pub mod item;
pub mod money;
pub mod projections;
pub mod purchase_order;
pub mod runtime;
pub mod support;
pub mod vendor;

pub use invoice::{InvoiceApproveHandler, InvoicePayHandler, InvoicePostHandler, InvoiceRejectHandler, InvoiceSubmitHandler};
pub use item::ItemCreateHandler;
pub use projections::{build_ap_projections, ApProjections};
pub use purchase_order::PurchaseOrderCreateHandler;
pub use runtime::ApRuntime;
pub use vendor::{VendorAddContactHandler, VendorCreateHandler, VendorUpdateHandler};

/// Register every AP intent handler into `pipeline`, one per `intent_type`.
pub fn register_handlers(pipeline: &mut ledgerflow_intents::IntentPipeline, runtime: ApRuntime) {
    use std::sync::Arc;

    pipeline.register(Arc::new(VendorCreateHandler::new(runtime.clone())));
    pipeline.register(Arc::new(VendorUpdateHandler::new(runtime.clone())));
    pipeline.register(Arc::new(VendorAddContactHandler::new(runtime.clone())));
    pipeline.register(Arc::new(ItemCreateHandler::new(runtime.clone())));
    pipeline.register(Arc::new(PurchaseOrderCreateHandler::new(runtime.clone())));
    pipeline.register(Arc::new(InvoiceSubmitHandler::new(runtime.clone())));
    pipeline.register(Arc::new(InvoiceApproveHandler::new(runtime.clone())));
    pipeline.register(Arc::new(InvoiceRejectHandler::new(runtime.clone())));
    pipeline.register(Arc::new(InvoicePostHandler::new(runtime.clone())));
    pipeline.register(Arc::new(InvoicePayHandler::new(runtime)));
}
