use clap::Parser;
use std::path::Path;
use traffic_etl::adapters::duckdb_store::query_table;
use traffic_etl::config::cli::{Cli, Command, DepsArgs, OutputFormat, QueryArgs, RunArgs, TrafficArgs, WeatherArgs};
use traffic_etl::config::file::ConfigFile;
use traffic_etl::core::Storage;
use traffic_etl::utils::{logger, validation::Validate};
use traffic_etl::{
    EtlEngine, EtlError, LocalStorage, Manifest, Result, Settings, TrafficPipeline,
    WeatherExtractor,
};

#[tokio::main]
async fn main() {
    // .env 不存在時忽略
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("Could not read .env file: {}", e),
    }

    tracing::info!("Starting traffic-etl CLI");
    if cli.verbose {
        tracing::debug!("CLI arguments: {:?}", cli);
    }

    if let Err(e) = dispatch(cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    let file = config_path.map(ConfigFile::from_file).transpose()?;
    Settings::from_env(file)
}

async fn dispatch(cli: Cli) -> Result<()> {
    if let Command::Deps(args) = &cli.command {
        return list_dependencies(args);
    }

    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Command::Run(args) => run_pipeline(settings, &args, cli.monitor).await,
        Command::Extract(args) => extract_only(settings, &args).await,
        Command::Weather(args) => extract_weather(settings, &args).await,
        Command::Query(args) => query(settings, &args),
        Command::Deps(_) => Ok(()),
    }
}

async fn run_pipeline(mut settings: Settings, args: &RunArgs, monitor: bool) -> Result<()> {
    args.traffic.apply(&mut settings.traffic);
    args.load.apply(&mut settings.load);
    if let Some(distance) = args.route_distance {
        settings.traffic.route_distance_meters = distance;
    }

    settings.traffic.validate()?;
    settings.load.validate()?;
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(settings.traffic.output_folder.clone());
    storage.ensure_root().await?;
    let pipeline = TrafficPipeline::new(storage, settings.traffic, settings.load)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor);

    let report = engine.run().await?;

    println!("✅ ETL process completed successfully!");
    println!("📥 Staged files: {}", report.extracted_files.len());
    println!("📊 Averages over {} row(s):", report.rows_transformed);
    for (key, value) in report.averages.entries() {
        match value {
            Some(v) => println!("   {}: {:.4}", key, v),
            None => println!("   {}: n/a", key),
        }
    }
    match report.estimated_travel_time_seconds {
        Some(seconds) => println!(
            "⏱️  Estimated travel time: {:.2} seconds ({:.2} minutes)",
            seconds,
            seconds / 60.0
        ),
        None => println!("⏱️  Estimated travel time: n/a"),
    }
    println!(
        "💾 Loaded {} row(s) into table '{}' in {}",
        report.load.rows_loaded, report.load.table_name, report.load.database_path
    );
    Ok(())
}

async fn extract_only(mut settings: Settings, args: &TrafficArgs) -> Result<()> {
    args.apply(&mut settings.traffic);
    settings.traffic.validate()?;

    let points = settings.traffic.points.clone();
    let storage = LocalStorage::new(settings.traffic.output_folder.clone());
    storage.ensure_root().await?;
    let pipeline = TrafficPipeline::new(storage, settings.traffic, settings.load)?;

    let files = pipeline.extract_traffic_data_for_areas(&points).await;
    if files.is_empty() {
        return Err(EtlError::NoData {
            stage: "extract".to_string(),
        });
    }

    println!("✅ Extracted {} of {} point(s):", files.len(), points.len());
    for file in &files {
        println!("   {}", pipeline.storage().locate(file));
    }
    Ok(())
}

async fn extract_weather(mut settings: Settings, args: &WeatherArgs) -> Result<()> {
    args.apply(&mut settings.weather);
    settings.weather.validate()?;

    let storage = LocalStorage::new(settings.weather.output_folder.clone());
    let extractor = WeatherExtractor::new(storage, settings.weather)?;

    let files = extractor.extract_all().await?;
    if files.is_empty() {
        println!("⚠️  No weather data extracted.");
        return Ok(());
    }

    println!("✅ Extracted weather for {} location(s):", files.len());
    for file in &files {
        println!("   {}", extractor.storage().locate(file));
    }
    Ok(())
}

fn query(mut settings: Settings, args: &QueryArgs) -> Result<()> {
    args.load.apply(&mut settings.load);
    settings.load.validate()?;

    let contents = query_table(Path::new(&settings.load.database_path), &settings.load.table_name)?;
    match args.format {
        OutputFormat::Table => {
            println!("{}", contents.to_pretty_table()?);
            println!("({} row(s))", contents.len());
        }
        OutputFormat::Csv => contents.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

fn list_dependencies(args: &DepsArgs) -> Result<()> {
    let manifest = Manifest::from_file(&args.manifest)?;
    tracing::info!(
        "Parsed {} requirement(s) from {}",
        manifest.len(),
        args.manifest.display()
    );

    for requirement in &manifest {
        println!("{}", requirement);
    }
    Ok(())
}
