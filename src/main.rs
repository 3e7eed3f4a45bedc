use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "mailsink", about = "Fetch Gmail messages into a local store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web front end that drives the authorization handshake.
    Serve,
    /// One-shot ingestion using a saved or interactively granted credential.
    Fetch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &mailsink::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    let storage = mailsink::db::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database connected");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = mailsink::router::SinkState::new(storage);
            let app = mailsink::router::sink_router(state);

            let listener = TcpListener::bind(&cfg.listen_addr).await?;
            info!("HTTP server listening on {}", cfg.listen_addr);
            axum::serve(listener, app).await?;
        }
        Command::Fetch => {
            let http_client = mailsink::router::build_http_client();
            let oauth = mailsink::GoogleOauthService::new(http_client.clone());
            let gmail = mailsink::api::GmailApi::new(http_client);

            let mut credential = oauth.obtain_credential().await?;
            let access_token = oauth.access_token(&mut credential).await?;
            let report =
                mailsink::service::run_ingestion(&gmail, &access_token, &storage, cfg.page_size)
                    .await?;
            info!(
                listed = report.listed,
                inserted = report.inserted,
                skipped = report.skipped,
                "fetch complete"
            );
        }
    }
    Ok(())
}
