//! Fantasy football points prediction CLI
//!
//! Loads FPL data dumps, builds point-in-time features, trains a points
//! regressor and ranks players for a gameweek.

use clap::{Parser, Subcommand};
use fpl::{Config, Result};

#[derive(Parser)]
#[command(name = "fpl")]
#[command(about = "Fantasy Premier League points prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build the training feature table
    Features {
        /// Compute and summarise without writing to the feature store
        #[arg(long)]
        no_store: bool,
    },
    /// Train the points regressor
    Train {
        /// Override the held-out fraction
        #[arg(long)]
        test_size: Option<f64>,
        /// Override the ridge penalty
        #[arg(long)]
        l2: Option<f64>,
    },
    /// Predict player points for a gameweek
    Predict {
        /// Target gameweek (defaults to the next unplayed one)
        #[arg(short, long)]
        gameweek: Option<u32>,
        /// Number of players to show
        #[arg(long)]
        top: Option<usize>,
        /// Score injured and unavailable players too
        #[arg(long)]
        include_injured: bool,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Load downloaded JSON dumps into the database
    Load {
        /// Directory holding the dumps (defaults to data.raw_dir)
        #[arg(long)]
        dir: Option<String>,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Load { dir } => commands::data_load(&config, dir),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Features { no_store } => commands::features(&config, no_store),
        Commands::Train { test_size, l2 } => commands::train(&config, test_size, l2),
        Commands::Predict {
            gameweek,
            top,
            include_injured,
            format,
        } => commands::predict(&config, gameweek, top, include_injured, format),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use fpl::data::{Database, DumpLoader, Snapshot, TrainingDataset};
    use fpl::predict::{format_csv, format_table, next_gameweek, Predictor};
    use fpl::training::Trainer;
    use fpl::FplError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all(&config.data.raw_dir)?;
        std::fs::create_dir_all(&config.data.model_dir)?;
        println!(
            "Created {} and {} directories",
            config.data.raw_dir, config.data.model_dir
        );

        println!("\nNext steps:");
        println!("  1. Put bootstrap_static.json, fixtures.json and player_<id>.json in {}", config.data.raw_dir);
        println!("  2. Run 'fpl data load' to import them");
        println!("  3. Run 'fpl train' to train the model");
        println!("  4. Run 'fpl predict' to rank players for the next gameweek");

        Ok(())
    }

    pub fn data_load(config: &Config, dir: Option<String>) -> Result<()> {
        let dir = dir.unwrap_or_else(|| config.data.raw_dir.clone());
        let db = Database::open(&config.data.database_path)?;

        println!("Loading dumps from {}...", dir);
        let summary = DumpLoader::new(&dir).load_into(&db)?;
        println!("{}", summary);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:          {}", config.data.database_path);
        println!("  Teams:         {}", stats.team_count);
        println!("  Players:       {}", stats.player_count);
        println!("  Fixtures:      {}", stats.fixture_count);
        println!("  Match records: {}", stats.stat_count);
        println!("  Flagged:       {}", stats.injured_count);
        println!("  Feature rows:  {}", stats.feature_count);
        if let Some(gw) = stats.latest_gameweek {
            println!("  Latest GW:     {}", gw);
        }

        Ok(())
    }

    fn load_snapshot(config: &Config) -> Result<(Database, Snapshot)> {
        let db = Database::open(&config.data.database_path)?;
        if db.get_stats()?.stat_count == 0 {
            return Err(FplError::InsufficientData(
                "No match records in database. Run 'fpl data load' first.".to_string(),
            ));
        }
        let snapshot = Snapshot::load(&db)?;
        Ok((db, snapshot))
    }

    pub fn features(config: &Config, no_store: bool) -> Result<()> {
        let (mut db, snapshot) = load_snapshot(config)?;
        let dataset = TrainingDataset::generate(&snapshot, config.features.window);
        println!("{}", dataset.summary());

        let set = config.features.feature_set()?;
        let (x, _) = dataset.matrix(&set);
        println!(
            "{} of {} rows complete for the {} feature set",
            x.len(),
            dataset.len(),
            set.len()
        );

        if !no_store {
            let replaced = db.clear_feature_records()?;
            let stored = dataset.persist(&mut db)?;
            println!("Stored {} feature rows (replaced {})", stored, replaced);
        }

        Ok(())
    }

    pub fn train(config: &Config, test_size: Option<f64>, l2: Option<f64>) -> Result<()> {
        let mut training = config.training.clone();
        if let Some(t) = test_size {
            training.test_size = t;
        }
        if let Some(l) = l2 {
            training.l2 = l;
        }

        println!("Initializing training...");
        let (_db, snapshot) = load_snapshot(config)?;
        let dataset = TrainingDataset::generate(&snapshot, config.features.window);
        println!("{}", dataset.summary());

        let set = config.features.feature_set()?;
        println!("Features ({}): {}", set.len(), set.names().join(", "));

        let report = Trainer::new(training, set).train(&dataset)?;

        println!("\nSaving model to {}...", config.data.model_dir);
        report.model.save(&config.data.model_dir)?;

        println!("\nTraining complete!");
        println!("{}", report);

        Ok(())
    }

    pub fn predict(
        config: &Config,
        gameweek: Option<u32>,
        top: Option<usize>,
        include_injured: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let predictor = Predictor::load(&config.data.model_dir)?;
        if predictor.window() != config.features.window {
            log::warn!(
                "Model was trained with window {}; ignoring configured window {}",
                predictor.window(),
                config.features.window
            );
        }

        let db = Database::open(&config.data.database_path)?;
        let snapshot = Snapshot::load(&db)?;
        drop(db);

        let gameweek = gameweek.unwrap_or_else(|| next_gameweek(&snapshot));
        let top_n = top.unwrap_or(config.prediction.top_n);
        let include = include_injured || config.prediction.include_unavailable;

        let result = predictor.predict_gameweek(&snapshot, gameweek, top_n, include)?;

        match format {
            OutputFormat::Table => print!("{}", format_table(&result)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            OutputFormat::Csv => print!("{}", format_csv(&result)),
        }

        Ok(())
    }
}
