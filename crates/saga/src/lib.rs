//! Saga orchestration for order fulfillment.
//!
//! An order runs through an optional human approval gate and then three
//! forward steps:
//! 1. Reserve inventory
//! 2. Process payment
//! 3. Arrange delivery
//!
//! Each step is retried with bounded exponential backoff. If a step fails
//! for good, the steps that already committed are compensated in reverse
//! order. The [`SagaCoordinator`] runs every saga on its own task and
//! exposes decisions and queries.

pub mod approval;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod ledger;
pub mod orchestrator;
pub mod order_fulfillment;
pub mod outcome;
pub mod services;
pub mod state;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalStatus};
pub use config::SagaConfig;
pub use coordinator::{DecisionAck, SagaCoordinator};
pub use error::SagaError;
pub use events::{JournalEntry, SagaEvent, SagaJournal};
pub use ledger::{CompensationLedger, CompensationOutcome, CompensationRecord, Compensator};
pub use orchestrator::SagaOrchestrator;
pub use order_fulfillment::StepKind;
pub use outcome::{Receipts, SagaOutcome};
pub use services::{
    DeliveryResult, DeliveryService, InMemoryDeliveryService, InMemoryInventoryService,
    InMemoryNotificationService, InMemoryPaymentService, InMemoryServices, InventoryResult,
    InventoryService, NotificationService, PaymentResult, PaymentService, SagaServices,
    SentConfirmation, StepReport,
};
pub use state::SagaState;
