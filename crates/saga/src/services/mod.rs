//! External service traits and in-memory implementations for saga steps.

pub mod delivery;
mod fault;
pub mod inventory;
pub mod notification;
pub mod payment;

pub use delivery::{DeliveryResult, DeliveryService, InMemoryDeliveryService};
pub use inventory::{InMemoryInventoryService, InventoryResult, InventoryService};
pub use notification::{InMemoryNotificationService, NotificationService, SentConfirmation};
pub use payment::{InMemoryPaymentService, PaymentResult, PaymentService};

/// Common view of a step's typed result.
///
/// A result that reports `succeeded() == false` was refused by the service
/// and is treated as a non-retryable failure.
pub trait StepReport {
    fn succeeded(&self) -> bool;

    fn message(&self) -> &str;
}

/// The set of services one saga talks to.
#[derive(Debug, Clone, Default)]
pub struct SagaServices<I, P, D, N> {
    pub inventory: I,
    pub payment: P,
    pub delivery: D,
    pub notification: N,
}

impl<I, P, D, N> SagaServices<I, P, D, N> {
    /// Bundles the four services.
    pub fn new(inventory: I, payment: P, delivery: D, notification: N) -> Self {
        Self {
            inventory,
            payment,
            delivery,
            notification,
        }
    }
}

/// Services backed entirely by in-memory fakes.
pub type InMemoryServices = SagaServices<
    InMemoryInventoryService,
    InMemoryPaymentService,
    InMemoryDeliveryService,
    InMemoryNotificationService,
>;
