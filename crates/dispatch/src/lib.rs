//! Notification Dispatch - fire-and-forget delivery boundary
//!
//! This crate carries fully formed (recipient-selector, message) pairs away
//! from the decision path:
//! - **Messages** (`message`) - recipient selectors and message builders
//! - **Queue** (`queue`) - the dispatcher trait, a queue-backed
//!   implementation over a pluggable delivery transport, and test fakes
//!
//! # Architecture
//!
//! ```text
//! Services → enqueue() → mpsc queue → worker task → DeliveryTransport
//!                                         ↓ on error
//!                                    tracing::warn (never escalates)
//! ```
//!
//! Enqueueing never blocks and never fails the caller; a delivery failure
//! is logged and cannot undo an already-applied transition.

pub mod message;
pub mod queue;

pub use message::{
    invoice_created, invoice_status_changed, report_created, report_status_changed,
    request_created, request_status_changed, sla_breach, subcontractor_invoice_alert,
    Notification, RecipientSelector,
};
pub use queue::{
    DeliveryError, DeliveryTransport, NoopDeliveryTransport, NoopDispatcher,
    NotificationDispatcher, QueueDispatcher, RecordingDispatcher,
};
