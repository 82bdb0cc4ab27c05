use anyhow::Result;

use meteodash_core::{AppError, Config};
use meteodash_weather::{
    dashboard_charts, LoadOutcome, SharedStore, SqliteSnapshotStore, WeatherLoader,
    WeatherProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    meteodash_core::init()?;

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        eprintln!("{}", e.user_message());
        return Err(e.into());
    }

    Ok(())
}

async fn run() -> Result<(), AppError> {
    let (config, _warnings) = Config::load_validated()?;
    tracing::info!(
        "Loading forecast for {}, {} ({} .. {})",
        config.weather.latitude,
        config.weather.longitude,
        config.weather.start_date,
        config.weather.end_date
    );

    let db_path = &config.storage.database_path;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SharedStore::new(SqliteSnapshotStore::open(db_path)?);

    let provider = WeatherProvider::from_config(&config.weather)?;
    let (loader, reports) = WeatherLoader::new(provider, store.clone());
    let report_logger = reports.spawn_logger();

    let outcome = loader.load_outcome().await;
    print_dashboard(&outcome);

    // Let the background write finish before the store goes away.
    drop(loader);
    if let Err(e) = report_logger.await {
        tracing::error!("Persist report logger stopped unexpectedly: {}", e);
    }
    store.close().await?;

    Ok(())
}

fn print_dashboard(outcome: &LoadOutcome) {
    if let Some(notice) = outcome.notice() {
        println!("{notice}");
    }
    let Some(data) = outcome.data() else {
        return;
    };

    println!(
        "Forecast for {:.2}, {:.2} (source: {})",
        data.latitude,
        data.longitude,
        outcome.source()
    );
    for chart in dashboard_charts(data) {
        println!("\n[{}]", chart.id);
        println!("{}", chart.summary());
    }
}
