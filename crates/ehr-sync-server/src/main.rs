
use clap::Parser;
use ehr_sync_server::config::{Cli, Command, MintTokenArgs, ServeArgs};
use ehr_sync_server::{create_router, Aggregator, AppState, CentralStore, TokenAuthority};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ehr_sync_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::MintToken(args) => mint_token(args),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let store = CentralStore::open(&args.database)?;
    tracing::info!(database = %args.database, "central store ready");

    let aggregator = Aggregator::new(store)
        .with_policy(args.ownership_policy)
        .with_max_batch_rows(args.max_batch_rows);
    tracing::info!(policy = ?args.ownership_policy, max_batch_rows = args.max_batch_rows, "aggregator configured");

    let app = create_router(AppState::new(aggregator, TokenAuthority::from_env()));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn mint_token(args: MintTokenArgs) -> anyhow::Result<()> {
    let authority = TokenAuthority::from_env();
    let token = authority.issue(
        &args.worker,
        &args.role,
        args.ttl(),
    )?;
    println!("{}", token);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
