//! Synchronous projection handlers (C5 registrants) for the
//! accounts-payable read models: vendor and item directories, the AP
//! invoice list, aging buckets, vendor balances, and the G/L postings feed
//! used to check that every posting balances (debit == credit).
//!
//! Grounded on the teacher's `InventoryStockProjection`/`AccountBalancesProjection`
//! shape (a lock-guarded `HashMap` behind a projection-apply method),
//! generalized from a per-aggregate envelope apply to this engine's
//! event-type-keyed `ProjectionHandler` dispatch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use ledgerflow_core::EntityId;
use ledgerflow_events::StoredEvent;
use ledgerflow_projections::{ProjectionEngine, ProjectionError, ProjectionHandler};

fn str_field(data: &JsonValue, field: &str) -> Option<String> {
    data.get(field).and_then(JsonValue::as_str).map(str::to_string)
}

fn subject_id(event: &StoredEvent) -> Option<EntityId> {
    event.subject().map(|s| s.entity_id)
}

fn missing_subject(what: &str) -> ProjectionError {
    ProjectionError::HandlerFailed(format!("{what} event missing subject entity"))
}

// ---------------------------------------------------------------------
// Vendor list
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct VendorListEntry {
    pub vendor_id: EntityId,
    pub name: String,
    pub credit_limit: i64,
    pub tax_id: Option<String>,
}

#[derive(Default)]
pub struct VendorListProjection {
    store: RwLock<HashMap<EntityId, VendorListEntry>>,
}

impl VendorListProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<VendorListEntry> {
        self.store.read().expect("vendor list lock poisoned").values().cloned().collect()
    }

    pub fn get(&self, vendor_id: EntityId) -> Option<VendorListEntry> {
        self.store.read().expect("vendor list lock poisoned").get(&vendor_id).cloned()
    }
}

impl ProjectionHandler<()> for VendorListProjection {
    fn projection_type(&self) -> &'static str {
        "ap_vendor_list"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["ap.vendor.created", "ap.vendor.updated"]
    }

    fn handle(&self, event: &StoredEvent, _tx: &mut ()) -> Result<(), ProjectionError> {
        let vendor_id = subject_id(event).ok_or_else(|| missing_subject("vendor"))?;
        let name = str_field(&event.data, "name")
            .ok_or_else(|| ProjectionError::HandlerFailed("vendor event missing name".to_string()))?;
        let credit_limit = event.data.get("credit_limit").and_then(JsonValue::as_i64).unwrap_or(0);
        let tax_id = str_field(&event.data, "tax_id");

        self.store
            .write()
            .expect("vendor list lock poisoned")
            .insert(vendor_id, VendorListEntry { vendor_id, name, credit_limit, tax_id });
        Ok(())
    }

    fn reset(&self, _tx: &mut ()) -> Result<(), ProjectionError> {
        self.store.write().expect("vendor list lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Item list
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ItemListEntry {
    pub item_id: EntityId,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: i64,
}

#[derive(Default)]
pub struct ItemListProjection {
    store: RwLock<HashMap<EntityId, ItemListEntry>>,
}

impl ItemListProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<ItemListEntry> {
        self.store.read().expect("item list lock poisoned").values().cloned().collect()
    }

    pub fn get(&self, item_id: EntityId) -> Option<ItemListEntry> {
        self.store.read().expect("item list lock poisoned").get(&item_id).cloned()
    }
}

impl ProjectionHandler<()> for ItemListProjection {
    fn projection_type(&self) -> &'static str {
        "ap_item_list"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["ap.item.created"]
    }

    fn handle(&self, event: &StoredEvent, _tx: &mut ()) -> Result<(), ProjectionError> {
        let item_id = subject_id(event).ok_or_else(|| missing_subject("item"))?;
        let name = str_field(&event.data, "name")
            .ok_or_else(|| ProjectionError::HandlerFailed("item event missing name".to_string()))?;
        let sku = str_field(&event.data, "sku");
        let unit_price = event.data.get("unit_price").and_then(JsonValue::as_i64).unwrap_or(0);

        self.store
            .write()
            .expect("item list lock poisoned")
            .insert(item_id, ItemListEntry { item_id, name, sku, unit_price });
        Ok(())
    }

    fn reset(&self, _tx: &mut ()) -> Result<(), ProjectionError> {
        self.store.write().expect("item list lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// AP invoice list
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ApInvoiceListEntry {
    pub invoice_id: EntityId,
    pub vendor_id: Option<EntityId>,
    pub invoice_number: Option<String>,
    pub amount: i64,
    pub status: String,
    pub payment_reference: Option<String>,
}

#[derive(Default)]
pub struct ApInvoiceListProjection {
    store: RwLock<HashMap<EntityId, ApInvoiceListEntry>>,
}

impl ApInvoiceListProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<ApInvoiceListEntry> {
        self.store.read().expect("invoice list lock poisoned").values().cloned().collect()
    }

    pub fn get(&self, invoice_id: EntityId) -> Option<ApInvoiceListEntry> {
        self.store.read().expect("invoice list lock poisoned").get(&invoice_id).cloned()
    }

    fn set_status(store: &mut HashMap<EntityId, ApInvoiceListEntry>, invoice_id: EntityId, status: &str) {
        if let Some(entry) = store.get_mut(&invoice_id) {
            entry.status = status.to_string();
        }
    }
}

impl ProjectionHandler<()> for ApInvoiceListProjection {
    fn projection_type(&self) -> &'static str {
        "ap_invoice_list"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[
            "ap.invoice.submitted",
            "ap.invoice.matched",
            "ap.invoice.match_exception",
            "ap.invoice.approved",
            "ap.invoice.rejected",
            "ap.invoice.posted",
            "ap.invoice.paid",
        ]
    }

    fn handle(&self, event: &StoredEvent, _tx: &mut ()) -> Result<(), ProjectionError> {
        let invoice_id = subject_id(event).ok_or_else(|| missing_subject("invoice"))?;
        let mut store = self.store.write().expect("invoice list lock poisoned");

        match event.event_type.as_str() {
            "ap.invoice.submitted" => {
                let vendor_id = str_field(&event.data, "vendor_id").and_then(|s| s.parse().ok());
                let invoice_number = str_field(&event.data, "invoice_number");
                let amount = event.data.get("amount").and_then(JsonValue::as_i64).unwrap_or(0);
                store.insert(
                    invoice_id,
                    ApInvoiceListEntry {
                        invoice_id,
                        vendor_id,
                        invoice_number,
                        amount,
                        status: "submitted".to_string(),
                        payment_reference: None,
                    },
                );
            }
            "ap.invoice.matched" => Self::set_status(&mut store, invoice_id, "matched"),
            "ap.invoice.match_exception" => Self::set_status(&mut store, invoice_id, "match_exception"),
            "ap.invoice.approved" => Self::set_status(&mut store, invoice_id, "approved"),
            "ap.invoice.rejected" => Self::set_status(&mut store, invoice_id, "rejected"),
            "ap.invoice.posted" => Self::set_status(&mut store, invoice_id, "posted"),
            "ap.invoice.paid" => {
                if let Some(entry) = store.get_mut(&invoice_id) {
                    entry.status = "paid".to_string();
                    entry.payment_reference = str_field(&event.data, "payment_reference");
                }
            }
            other => return Err(ProjectionError::HandlerFailed(format!("unexpected event type {other}"))),
        }
        Ok(())
    }

    fn reset(&self, _tx: &mut ()) -> Result<(), ProjectionError> {
        self.store.write().expect("invoice list lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// AP aging
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
struct AgingEntry {
    amount: i64,
    posted_at: DateTime<Utc>,
    paid: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AgingBuckets {
    pub current: i64,
    pub days_1_30: i64,
    pub days_31_60: i64,
    pub days_61_90: i64,
    pub days_over_90: i64,
}

#[derive(Default)]
pub struct ApAgingProjection {
    invoices: RwLock<HashMap<EntityId, AgingEntry>>,
}

impl ApAgingProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket every posted-but-unpaid invoice by days outstanding as of now.
    pub fn buckets(&self) -> AgingBuckets {
        let now = Utc::now();
        let invoices = self.invoices.read().expect("aging lock poisoned");
        let mut buckets = AgingBuckets::default();
        for entry in invoices.values() {
            if entry.paid {
                continue;
            }
            match (now - entry.posted_at).num_days() {
                d if d <= 0 => buckets.current += entry.amount,
                1..=30 => buckets.days_1_30 += entry.amount,
                31..=60 => buckets.days_31_60 += entry.amount,
                61..=90 => buckets.days_61_90 += entry.amount,
                _ => buckets.days_over_90 += entry.amount,
            }
        }
        buckets
    }
}

fn debit_amount(data: &JsonValue) -> Option<i64> {
    data.get("gl_entries")
        .and_then(JsonValue::as_array)
        .and_then(|entries| entries.iter().find(|e| e.get("side").and_then(JsonValue::as_str) == Some("debit")))
        .and_then(|e| e.get("amount"))
        .and_then(JsonValue::as_i64)
}

impl ProjectionHandler<()> for ApAgingProjection {
    fn projection_type(&self) -> &'static str {
        "ap_aging"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["ap.invoice.posted", "ap.invoice.paid"]
    }

    fn handle(&self, event: &StoredEvent, _tx: &mut ()) -> Result<(), ProjectionError> {
        let invoice_id = subject_id(event).ok_or_else(|| missing_subject("invoice"))?;
        let mut invoices = self.invoices.write().expect("aging lock poisoned");

        match event.event_type.as_str() {
            "ap.invoice.posted" => {
                let amount = debit_amount(&event.data).unwrap_or(0);
                invoices.insert(invoice_id, AgingEntry { amount, posted_at: event.recorded_at, paid: false });
            }
            "ap.invoice.paid" => {
                if let Some(entry) = invoices.get_mut(&invoice_id) {
                    entry.paid = true;
                }
            }
            other => return Err(ProjectionError::HandlerFailed(format!("unexpected event type {other}"))),
        }
        Ok(())
    }

    fn reset(&self, _tx: &mut ()) -> Result<(), ProjectionError> {
        self.invoices.write().expect("aging lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Vendor balance
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct VendorBalanceState {
    vendor_id: Option<EntityId>,
    posted_amount: Option<i64>,
    paid: bool,
}

#[derive(Default)]
pub struct ApVendorBalanceProjection {
    invoices: RwLock<HashMap<EntityId, VendorBalanceState>>,
}

impl ApVendorBalanceProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding (posted, unpaid) balance for one vendor.
    pub fn balance(&self, vendor_id: EntityId) -> i64 {
        self.invoices
            .read()
            .expect("vendor balance lock poisoned")
            .values()
            .filter(|s| !s.paid && s.vendor_id == Some(vendor_id))
            .filter_map(|s| s.posted_amount)
            .sum()
    }

    pub fn all_balances(&self) -> HashMap<EntityId, i64> {
        let invoices = self.invoices.read().expect("vendor balance lock poisoned");
        let mut totals: HashMap<EntityId, i64> = HashMap::new();
        for state in invoices.values() {
            if state.paid {
                continue;
            }
            if let (Some(vendor_id), Some(amount)) = (state.vendor_id, state.posted_amount) {
                *totals.entry(vendor_id).or_insert(0) += amount;
            }
        }
        totals
    }
}

impl ProjectionHandler<()> for ApVendorBalanceProjection {
    fn projection_type(&self) -> &'static str {
        "ap_vendor_balance"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["ap.invoice.submitted", "ap.invoice.posted", "ap.invoice.paid"]
    }

    fn handle(&self, event: &StoredEvent, _tx: &mut ()) -> Result<(), ProjectionError> {
        let invoice_id = subject_id(event).ok_or_else(|| missing_subject("invoice"))?;
        let mut invoices = self.invoices.write().expect("vendor balance lock poisoned");

        match event.event_type.as_str() {
            "ap.invoice.submitted" => {
                let vendor_id = str_field(&event.data, "vendor_id").and_then(|s| s.parse().ok());
                invoices.entry(invoice_id).or_default().vendor_id = vendor_id;
            }
            "ap.invoice.posted" => {
                invoices.entry(invoice_id).or_default().posted_amount = debit_amount(&event.data);
            }
            "ap.invoice.paid" => {
                invoices.entry(invoice_id).or_default().paid = true;
            }
            other => return Err(ProjectionError::HandlerFailed(format!("unexpected event type {other}"))),
        }
        Ok(())
    }

    fn reset(&self, _tx: &mut ()) -> Result<(), ProjectionError> {
        self.invoices.write().expect("vendor balance lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// G/L postings
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GlPosting {
    pub invoice_id: EntityId,
    pub sequence: u64,
    pub account: String,
    pub side: String,
    pub amount: i64,
}

#[derive(Default)]
pub struct GlPostingsProjection {
    rows: RwLock<Vec<GlPosting>>,
}

impl GlPostingsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<GlPosting> {
        self.rows.read().expect("gl postings lock poisoned").clone()
    }

    /// Sum of debits minus credits across every recorded posting. Should
    /// stay at zero as long as every posting handler emits balanced entries.
    pub fn net_balance(&self) -> i64 {
        self.rows.read().expect("gl postings lock poisoned").iter().fold(0i64, |acc, row| match row.side.as_str() {
            "debit" => acc + row.amount,
            "credit" => acc - row.amount,
            _ => acc,
        })
    }
}

impl ProjectionHandler<()> for GlPostingsProjection {
    fn projection_type(&self) -> &'static str {
        "ap_gl_postings"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &["ap.invoice.posted"]
    }

    fn handle(&self, event: &StoredEvent, _tx: &mut ()) -> Result<(), ProjectionError> {
        let invoice_id = subject_id(event).ok_or_else(|| missing_subject("invoice"))?;
        let entries = event
            .data
            .get("gl_entries")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| ProjectionError::HandlerFailed("posted event missing gl_entries".to_string()))?;

        let mut rows = self.rows.write().expect("gl postings lock poisoned");
        for entry in entries {
            let account = entry.get("account").and_then(JsonValue::as_str).unwrap_or_default().to_string();
            let side = entry.get("side").and_then(JsonValue::as_str).unwrap_or_default().to_string();
            let amount = entry.get("amount").and_then(JsonValue::as_i64).unwrap_or(0);
            rows.push(GlPosting { invoice_id, sequence: event.sequence, account, side, amount });
        }
        Ok(())
    }

    fn reset(&self, _tx: &mut ()) -> Result<(), ProjectionError> {
        self.rows.write().expect("gl postings lock poisoned").clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------

/// Handles to every AP read model, kept alongside the engine they're
/// registered with so callers (the API layer, tests) can query them
/// directly without going back through the event stream.
#[derive(Clone)]
pub struct ApProjections {
    pub vendor_list: Arc<VendorListProjection>,
    pub item_list: Arc<ItemListProjection>,
    pub invoice_list: Arc<ApInvoiceListProjection>,
    pub aging: Arc<ApAgingProjection>,
    pub vendor_balance: Arc<ApVendorBalanceProjection>,
    pub gl_postings: Arc<GlPostingsProjection>,
}

/// Build a fresh `ProjectionEngine` with every AP read model registered.
/// Callers pass the returned engine into `ApRuntime::new` and keep
/// `ApProjections` for querying.
pub fn build_ap_projections() -> (ProjectionEngine<()>, ApProjections) {
    let vendor_list = Arc::new(VendorListProjection::new());
    let item_list = Arc::new(ItemListProjection::new());
    let invoice_list = Arc::new(ApInvoiceListProjection::new());
    let aging = Arc::new(ApAgingProjection::new());
    let vendor_balance = Arc::new(ApVendorBalanceProjection::new());
    let gl_postings = Arc::new(GlPostingsProjection::new());

    let mut engine = ProjectionEngine::new();
    engine.register(vendor_list.clone());
    engine.register(item_list.clone());
    engine.register(invoice_list.clone());
    engine.register(aging.clone());
    engine.register(vendor_balance.clone());
    engine.register(gl_postings.clone());

    (
        engine,
        ApProjections { vendor_list, item_list, invoice_list, aging, vendor_balance, gl_postings },
    )
}

#[cfg(test)]
mod tests {
    use ledgerflow_core::{Actor, ActorId, ActorType, LegalEntityId, TenantId};
    use ledgerflow_intents::{Intent, IntentHandler, IntentResult};
    use serde_json::json;

    use crate::invoice::{InvoiceApproveHandler, InvoicePostHandler, InvoiceSubmitHandler};
    use crate::runtime::ApRuntime;
    use crate::vendor::VendorCreateHandler;

    use super::*;

    fn actor() -> Actor {
        Actor::new(ActorType::Human, ActorId::new(), "ap-clerk")
    }

    fn runtime_with_projections() -> (ApRuntime, ApProjections) {
        use ledgerflow_entities::{EntityGraph, InMemoryEntityGraph};
        use ledgerflow_events::{EventStore, InMemoryEventStore};
        use ledgerflow_projections::InMemoryDeadLetterStore;

        let entities: Arc<dyn EntityGraph> = Arc::new(InMemoryEntityGraph::new());
        let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new().with_entity_graph(entities.clone()));
        let (engine, projections) = build_ap_projections();

        let runtime = ApRuntime::new(
            event_store,
            entities,
            Arc::new(Vec::new()),
            Arc::new(engine),
            Arc::new(InMemoryDeadLetterStore::new()),
        );
        (runtime, projections)
    }

    #[test]
    fn full_invoice_lifecycle_populates_every_read_model() {
        let (runtime, projections) = runtime_with_projections();
        let tenant = TenantId::new();
        let legal_entity = LegalEntityId::new();

        let vendor_intent =
            Intent::new_request("ap.vendor.create", actor(), tenant, legal_entity, json!({"name": "Acme", "credit_limit": 5000}));
        let vendor_handler = VendorCreateHandler::new(runtime.clone());
        let IntentResult::Success { event, .. } = vendor_handler.execute(&vendor_intent, vendor_intent.id) else {
            panic!("expected vendor create to succeed");
        };
        let vendor_id = event.expect("event").entities[0].entity_id;
        assert_eq!(projections.vendor_list.list().len(), 1);

        let submit_intent = Intent::new_request(
            "ap.invoice.submit",
            actor(),
            tenant,
            legal_entity,
            json!({"vendor_id": vendor_id.to_string(), "invoice_number": "INV-1", "amount": 10_000}),
        );
        let submit_handler = InvoiceSubmitHandler::new(runtime.clone());
        let IntentResult::Success { event, .. } = submit_handler.execute(&submit_intent, submit_intent.id) else {
            panic!("expected invoice submit to succeed");
        };
        let invoice_id = event.expect("event").entities[0].entity_id;
        assert_eq!(projections.invoice_list.get(invoice_id).unwrap().status, "submitted");

        let approve_intent = Intent::new_request(
            "ap.invoice.approve",
            Actor::new(ActorType::Human, ActorId::new(), "ap-manager"),
            tenant,
            legal_entity,
            json!({"invoice_id": invoice_id.to_string()}),
        );
        let approve_handler = InvoiceApproveHandler::new(runtime.clone());
        assert!(matches!(approve_handler.execute(&approve_intent, approve_intent.id), IntentResult::Success { .. }));

        let post_intent = Intent::new_request(
            "ap.invoice.post",
            actor(),
            tenant,
            legal_entity,
            json!({"invoice_id": invoice_id.to_string(), "expense_account": "6000-00"}),
        );
        let post_handler = InvoicePostHandler::new(runtime.clone());
        assert!(matches!(post_handler.execute(&post_intent, post_intent.id), IntentResult::Success { .. }));

        assert_eq!(projections.invoice_list.get(invoice_id).unwrap().status, "posted");
        assert_eq!(projections.gl_postings.net_balance(), 0);
        assert_eq!(projections.vendor_balance.balance(vendor_id), 10_000);
        assert_eq!(projections.gl_postings.list()[0].account, "6000-00");
    }
}
