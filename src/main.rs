use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::Path;
use training_analytics::analyzer::{
    compute_kpis, format_number, participation_totals, KpiSelection, TrainingAnalyzer,
};
use training_analytics::dashboard::Dashboard;
use training_analytics::loader::TableLoader;
use training_analytics::models::{Config, DataSourceMode, Table};
use training_analytics::{logging, server};

fn cli() -> Command {
    Command::new("training-analytics")
        .version("0.1.0")
        .about("Attendance analytics dashboard for training programs")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("data")
                .short('d')
                .long("data")
                .value_name("FILE")
                .help("CSV data file, overrides the configured source"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .value_parser(value_parser!(u16)),
        )
        .subcommand(Command::new("serve").about("Start the HTTP dashboard (default)"))
        .subcommand(Command::new("summary").about("Print headline figures and exit"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to read configuration {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default()
            .save_to_file(config_file)
            .with_context(|| format!("Failed to write configuration {}", config_file))?;
        println!(
            "⚠️  Please review {} and point data_file at your export, then run again.",
            config_file
        );
        return Ok(());
    };
    apply_overrides(&mut config, &matches);
    config.validate().context("Invalid configuration")?;

    if let Err(e) = logging::init(&config.log_filter) {
        eprintln!("⚠️  Logging disabled: {}", e);
    }

    let table = load_table(&config).await?;

    match matches.subcommand_name() {
        Some("summary") => {
            print_summary(&table, &config);
            Ok(())
        }
        _ => {
            println!("🌐 Dashboard at http://{}:{}", config.bind_address, config.port);
            let bind_address = config.bind_address.clone();
            let port = config.port;
            server::serve(Dashboard::new(table, &config), &bind_address, port).await
        }
    }
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(data) = matches.get_one::<String>("data") {
        config.data_source_mode = DataSourceMode::Local;
        config.data_file = data.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
}

async fn load_table(config: &Config) -> Result<Table> {
    let source = match config.data_source_mode {
        DataSourceMode::Local => config.data_file.clone(),
        DataSourceMode::Internet => config.data_url.clone().unwrap_or_default(),
    };
    println!("📂 Reading training data from: {}", source);

    let table = TableLoader::new()
        .with_sheet_name(config.sheet_name.clone())
        .load(config)
        .await
        .with_context(|| format!("Failed to load training data from {}", source))?;
    println!("   ✅ Loaded {} rows", table.len());
    Ok(table)
}

fn print_summary(table: &Table, config: &Config) {
    let rows: Vec<_> = table.records().iter().collect();
    let kpis = compute_kpis(&rows, &KpiSelection::default());
    let analyzer = TrainingAnalyzer::new(table, config.eligibility_hours);
    let participants = analyzer.hours_by_name().len();
    let eligible = analyzer.eligible_names().len();

    println!("\n📊 SUMMARY");
    println!("==========\n");
    println!("📋 Sessions: {}", kpis.sessions);
    println!("⏱️  Hours: {}", kpis.hours);
    println!("👥 Participant rows: {}", kpis.participants);
    println!("👩 Female: {}   👨 Male: {}", kpis.female, kpis.male);
    println!(
        "🎓 Eligible for certificate (≥ {} hours): {} of {} participants",
        config.eligibility_hours, eligible, participants
    );

    println!("\n🏷️  By participation type:");
    for total in participation_totals(&rows) {
        println!(
            "   - {}: {} rows, {} hours",
            total.participation_type,
            total.rows,
            format_number(total.hours)
        );
    }
}
