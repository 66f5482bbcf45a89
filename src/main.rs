use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use candle_tags::config::AppConfig;
use candle_tags::db;
use candle_tags::db::table::fetch_table;
use candle_tags::models::{Cell, PriceFrame};
use candle_tags::services::chart_service::{self, ChartRequest, OutputTarget};
use candle_tags::services::indicator_service;
use candle_tags::utils::extract_clean_error;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    let mut filter = EnvFilter::from_default_env();
    for directive in ["candle_tags=debug", "sqlx=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("🕯️ Starting candle-tags chart job...");

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    match run(&config).await {
        Ok(Some(path)) => info!("Done: {}", path.display()),
        Ok(None) => warn!("No chart written for {}", config.symbol),
        Err(e) => {
            error!("Chart job failed: {}", extract_clean_error(&e.to_string()));
            std::process::exit(1);
        }
    }
}

async fn run(config: &AppConfig) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let chart_config = config.load_chart_config()?;

    info!("Connecting to database...");
    let pool = db::init_db(&config.database_url).await?;
    info!("Database connected");

    let table = fetch_table(
        &pool,
        &config.source_table,
        &[("ticker", Cell::Text(config.symbol.clone()))],
        None,
    )
    .await?;
    debug!("Fetched {} rows for {}:\n{}", table.len(), config.symbol, table.head(5).render());

    let frame = indicator_service::with_standard_indicators(PriceFrame::from_table(&table)?);

    let mut request = ChartRequest::new(&config.symbol, &config.time_frame);
    request.width = config.width;
    request.height = config.height;
    request.scale = config.scale;
    request.line_columns = frame
        .columns
        .iter()
        .map(|c| c.name.clone())
        .filter(|name| *name != chart_config.rsi_column)
        .collect();
    request.line_names.insert("SMA_20".to_string(), "MA20".to_string());
    request.line_names.insert("SMA_60".to_string(), "MA60".to_string());

    let target = OutputTarget {
        dir: config.output_dir.clone(),
        file_name: format!("{}_{}.png", config.symbol, config.time_frame),
    };
    request.output = Some(target.clone());

    let output = chart_service::create_financial_chart(&frame, &request, &chart_config)?;
    if output.is_placeholder() {
        return Ok(None);
    }

    info!("Rendered {} bytes of PNG", output.png.len());
    Ok(Some(target.path()))
}
