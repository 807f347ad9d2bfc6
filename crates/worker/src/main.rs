//! Demo worker: runs order sagas and a batch job against in-memory services.

use std::time::Duration;

use batch::{BatchConfig, BatchError, FanOutScheduler, SquareNumber};
use domain::{Money, Order, OrderError, OrderId, OrderItem, PaymentDetails};
use saga::{InMemoryServices, SagaConfig, SagaCoordinator, SagaError, SagaOutcome};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How many numbers the demo batch squares.
const BATCH_TOTAL_NUMBERS: u64 = 100;

/// Delay before the simulated approver signs off on the large order.
const APPROVER_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
enum WorkerError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}

fn order(items: Vec<OrderItem>, email: &str) -> Result<Order, OrderError> {
    Order::new(
        OrderId::generate(),
        email,
        items,
        PaymentDetails::new("4242424242424242", 12, 2099, "Demo Customer")?,
    )
}

fn log_outcome(outcome: &SagaOutcome) {
    if outcome.is_fulfilled() {
        tracing::info!(
            saga_id = %outcome.saga_id,
            order_id = %outcome.order_id,
            message = %outcome.message,
            "order fulfilled"
        );
    } else {
        tracing::warn!(
            saga_id = %outcome.saga_id,
            order_id = %outcome.order_id,
            status = %outcome.status,
            error = outcome.error.as_deref().unwrap_or("none"),
            reconciliation = outcome.requires_reconciliation(),
            "order not fulfilled"
        );
    }
}

async fn run_sagas(
    coordinator: SagaCoordinator<
        saga::InMemoryInventoryService,
        saga::InMemoryPaymentService,
        saga::InMemoryDeliveryService,
        saga::InMemoryNotificationService,
    >,
) -> Result<(), WorkerError> {
    // 1. A small order goes straight through
    let small = order(
        vec![
            OrderItem::new("SKU-MUG", 2, Money::from_cents(1250)),
            OrderItem::new("SKU-TEA", 1, Money::from_cents(2000)),
        ],
        "small@example.com",
    )?;
    let small_id = coordinator.start(small).await;

    // 2. A large order waits for an approver
    let large = order(
        vec![OrderItem::new("SKU-LAPTOP", 1, Money::from_dollars(2499))],
        "large@example.com",
    )?;
    let large_id = coordinator.start(large).await;

    let approver = coordinator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(APPROVER_DELAY).await;
        match approver
            .decide(large_id, true, Some("Approved by finance".to_string()))
            .await
        {
            Ok(ack) => tracing::info!(saga_id = %large_id, ?ack, "approval sent"),
            Err(error) => tracing::error!(saga_id = %large_id, %error, "approval failed"),
        }
    });

    log_outcome(&coordinator.await_result(small_id).await?);
    log_outcome(&coordinator.await_result(large_id).await?);
    Ok(())
}

async fn run_batch() -> Result<(), WorkerError> {
    let scheduler = FanOutScheduler::new(BatchConfig::from_env(), SquareNumber)?;
    let summary = scheduler.run(BATCH_TOTAL_NUMBERS).await?;

    tracing::info!(
        total_processed = summary.total_processed,
        leaf_batches = summary.leaf_batches,
        depth = summary.depth,
        sum_of_squares = %summary.sum,
        "batch finished"
    );
    Ok(())
}

async fn run() -> Result<(), WorkerError> {
    let config = SagaConfig::from_env();
    tracing::info!(
        approval_threshold = %config.approval_threshold.amount(),
        approval_timeout_secs = config.approval_timeout.as_secs(),
        "starting saga worker"
    );

    let coordinator = SagaCoordinator::new(config, InMemoryServices::default());
    run_sagas(coordinator).await?;
    run_batch().await
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Run the demo until it finishes or we are told to stop
    tokio::select! {
        result = run() => match result {
            Ok(()) => tracing::info!("worker finished"),
            Err(error) => {
                tracing::error!(%error, "worker failed");
                std::process::exit(1);
            }
        },
        () = shutdown_signal() => {}
    }
}
