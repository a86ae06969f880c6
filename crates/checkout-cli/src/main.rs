//! storefront-checkout CLI
//!
//! Drives a checkout end to end from a JSON order file, resumes a session
//! left behind by an interrupted run, and inspects or clears the saved
//! session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::text::to_title_case;
use checkout_core::{
    CheckoutError, CheckoutForm, CheckoutItem, CheckoutState, CheckoutStep, CheckoutStore, FeeSchedule,
    FileCheckoutStore, PaymentStatus,
};
use checkout_flow::{AdaptivePoller, CheckoutFlow, Recovery};
use checkout_gateway::{
    CardTokenizer, HttpPaymentBackend, MockPaymentBackend, MockTokenizer, PaymentBackend, WompiTokenizer,
};

#[derive(Debug, Parser)]
#[command(name = "checkout-cli", version, about = "Storefront checkout driver")]
struct Cli {
    /// Directory holding the saved session
    #[arg(long, env = "CHECKOUT_STATE_DIR", default_value = ".checkout", global = true)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a checkout from an order file
    Run(RunArgs),
    /// Resume the saved session
    Resume(BackendArgs),
    /// Print the saved session
    Show,
    /// Forget the saved session
    Reset,
}

#[derive(Debug, Args)]
struct BackendArgs {
    /// Use the in-memory backend and tokenizer instead of the real services
    #[arg(long)]
    mock: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// JSON file with `items` and `form`
    order: PathBuf,

    #[command(flatten)]
    backend: BackendArgs,
}

/// Order file layout
#[derive(Debug, Deserialize)]
struct OrderFile {
    items: Vec<CheckoutItem>,
    form: CheckoutForm,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let store = Arc::new(FileCheckoutStore::new(&cli.state_dir));

    match cli.command {
        Command::Run(args) => run(args, store).await,
        Command::Resume(args) => resume(&args, store).await,
        Command::Show => show(store.as_ref()),
        Command::Reset => {
            store.clear()?;
            println!("Checkout session cleared");
            Ok(())
        }
    }
}

fn services(args: &BackendArgs) -> anyhow::Result<(Arc<dyn PaymentBackend>, Arc<dyn CardTokenizer>)> {
    if args.mock {
        tracing::info!("Using mock payment services");
        return Ok((Arc::new(MockPaymentBackend::new()), Arc::new(MockTokenizer::default())));
    }

    let backend = HttpPaymentBackend::from_env().context("payment backend")?;
    let tokenizer = WompiTokenizer::from_env().context("card tokenizer")?;
    Ok((Arc::new(backend), Arc::new(tokenizer)))
}

fn build_flow(args: &BackendArgs, store: Arc<FileCheckoutStore>) -> anyhow::Result<(CheckoutFlow, Arc<dyn PaymentBackend>)> {
    let (backend, tokenizer) = services(args)?;
    let flow = CheckoutFlow::with_fees(backend.clone(), tokenizer, store, FeeSchedule::from_env());
    Ok((flow, backend))
}

async fn run(args: RunArgs, store: Arc<FileCheckoutStore>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.order)
        .with_context(|| format!("reading {}", args.order.display()))?;
    let order: OrderFile = serde_json::from_str(&raw).context("parsing order file")?;

    let (mut flow, backend) = build_flow(&args.backend, store)?;

    flow.start_checkout(order.items)?;
    if let Err(e) = flow.submit_card_and_delivery(&order.form).await {
        anyhow::bail!(e.user_message());
    }
    print_summary(flow.state());

    if flow.process_payment().await? == PaymentStatus::Pending {
        settle(&mut flow, backend).await?;
    }

    print_result(flow.state());
    Ok(())
}

async fn resume(args: &BackendArgs, store: Arc<FileCheckoutStore>) -> anyhow::Result<()> {
    let (mut flow, backend) = build_flow(args, store)?;

    match flow.recover_payment_state()? {
        Recovery::Fresh => println!("No saved checkout"),
        Recovery::Expired => println!("{}", CheckoutError::Expired.user_message()),
        Recovery::ResumePolling { transaction_id } => {
            println!("Checking payment {transaction_id}");
            settle(&mut flow, backend).await?;
            print_result(flow.state());
        }
        Recovery::ReturnToSummary => {
            println!("The payment was interrupted before it was submitted");
            print_summary(flow.state());
        }
        Recovery::ShowResult(_) => print_result(flow.state()),
        Recovery::Resume(step) => println!("Checkout saved at step {step}"),
    }
    Ok(())
}

/// Poll until the pending payment settles, echoing phase messages
async fn settle(flow: &mut CheckoutFlow, backend: Arc<dyn PaymentBackend>) -> anyhow::Result<()> {
    let mut poller = AdaptivePoller::new(backend);
    let mut progress = poller.subscribe();
    let echo = tokio::spawn(async move {
        let mut last = "";
        while progress.changed().await.is_ok() {
            let update = progress.borrow_and_update().clone();
            if update.is_polling && update.message != last {
                println!("{}", update.message);
                last = update.message;
            }
        }
    });

    let settled = flow.await_settlement(&mut poller).await;
    drop(poller);
    echo.await.ok();

    match settled {
        Ok(_) => Ok(()),
        Err(e @ CheckoutError::TimeoutExhausted) => {
            println!("{}", e.user_message());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn show(store: &dyn CheckoutStore) -> anyhow::Result<()> {
    match store.load()? {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("No saved checkout"),
    }
    Ok(())
}

fn print_summary(state: &CheckoutState) {
    println!("Order summary");
    for item in &state.items {
        println!("  {} x{}  {}", item.name, item.quantity, item.line_total());
    }
    println!("  Products  {}", state.product_amount);
    println!("  Base fee  {}", state.base_fee);
    println!("  Delivery  {}", state.delivery_fee);
    println!("  Total     {}", state.total_amount);
    println!(
        "  Card      {} **** **** **** {}",
        state.card_type.map_or("CARD", |t| t.as_str()),
        state.card_last_four.as_deref().unwrap_or("????")
    );
    println!("  Customer  {} <{}>", to_title_case(&state.customer_name), state.customer_email);
    println!(
        "  Deliver   {}, {}",
        to_title_case(&state.delivery_address),
        to_title_case(&state.delivery_city)
    );
}

fn print_result(state: &CheckoutState) {
    if state.current_step != CheckoutStep::Result {
        println!("Payment not settled yet (step {})", state.current_step);
        return;
    }

    let status = state.payment_status.map_or("UNKNOWN", PaymentStatus::as_str);
    println!("Payment {status}");
    if let Some(message) = &state.payment_message {
        println!("  {message}");
    }
    if let Some(id) = &state.transaction_id {
        println!("  Transaction {id}");
    }
    if let Some(reference) = &state.payment_reference {
        println!("  Reference {reference}");
    }
}
