use std::sync::Arc;

use chrono::Datelike;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate::config::Config;
use paygate::db::{AppState, create_pool, init_db, queries};
use paygate::handlers;
use paygate::id;
use paygate::models::CreatePaymentMethod;
use paygate::processor::SimulatedProcessor;
use paygate::webhooks::{recover_pending, start_workers};

#[derive(Parser, Debug)]
#[command(name = "paygate")]
#[command(about = "Payment gateway core: intents, ledger, idempotency and signed webhooks")]
struct Cli {
    /// Seed the database with a demo merchant and customer (dev mode only)
    #[arg(long)]
    seed: bool,
}

/// Seeds a demo merchant, customer and card. Skipped when any merchant exists.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_merchants(&conn).expect("Failed to count merchants");
    if count > 0 {
        tracing::info!("Database already has merchants, skipping seed");
        return;
    }

    let api_key = id::api_key();
    let merchant = queries::create_merchant(
        &conn,
        "Demo Merchant",
        &api_key,
        Some("demo@paygate.local"),
        None,
    )
    .expect("Failed to create demo merchant");

    let customer =
        queries::create_customer(&conn, &merchant.id, "buyer@example.com", Some("Demo Buyer"))
            .expect("Failed to create demo customer");

    let card = CreatePaymentMethod {
        method_type: "card".to_string(),
        last4: Some("4242".to_string()),
        brand: Some("visa".to_string()),
        exp_month: Some(12),
        exp_year: Some(i64::from(chrono::Utc::now().year()) + 3),
    };
    let payment_method =
        queries::create_payment_method(&conn, &customer.id, &card, &id::payment_method_token())
            .expect("Failed to create demo payment method");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED");
    tracing::info!("Merchant: {} ({})", merchant.name, merchant.id);
    tracing::info!("Customer: {} ({})", customer.email, customer.id);
    tracing::info!("============================================");

    println!();
    println!("--- COPY FROM HERE ---");
    println!("  api_key: {}", api_key);
    println!("  merchant_id: {}", merchant.id);
    println!("  customer_id: {}", customer.id);
    println!("  payment_method_id: {}", payment_method.id);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paygate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let queue = start_workers(db_pool.clone(), config.webhook.clone())
        .expect("Failed to start webhook workers");

    if config.webhook.endpoint_url.is_none() {
        tracing::info!("MERCHANT_WEBHOOK_URL not set, webhook events will be stored only");
    }

    let state = AppState {
        db: db_pool,
        processor: Arc::new(SimulatedProcessor::new(config.success_rates)),
        processor_timeout: config.processor_timeout,
        webhook: config.webhook.clone(),
        queue: queue.clone(),
    };

    if let Err(e) = recover_pending(&state.db, queue.as_ref()) {
        tracing::warn!("Failed to recover pending webhook events: {}", e);
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set PAYGATE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = handlers::app(state).layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Paygate server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
