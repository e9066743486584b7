use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use voc_normalizer::config::Config;
use voc_normalizer::logging::init_logging;
use voc_normalizer::pipeline::ingestion::{IngestOptions, IngestionPipeline};
use voc_normalizer::pipeline::processing::normalize::detect::fingerprint;
use voc_normalizer::pipeline::processing::normalize::IngestContext;
use voc_normalizer::storage::{DataSource, DataSourceStore, InMemoryDataSourceStore};

#[derive(Parser)]
#[command(name = "voc-normalizer")]
#[command(about = "Voice of Customer feedback data normalization pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize an uploaded JSON file into canonical rows
    Ingest {
        /// Path to the JSON payload
        file: PathBuf,
        /// Explicit format tag; skips detection
        #[arg(long)]
        format: Option<String>,
        /// Data-source identity used for dimension-name enrichment
        #[arg(long)]
        data_source: Option<String>,
        /// Write the stored record to this path instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Serve the untouched original under `raw_data` in the output
        #[arg(long)]
        use_raw: bool,
        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// List the registered source formats
    Formats,
    /// Print the shape fingerprint of a JSON payload
    Inspect {
        /// Path to the JSON payload
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    let pipeline = IngestionPipeline::new().with_sample_limit(config.ingest.sample_limit);

    match cli.command {
        Commands::Ingest {
            file,
            format,
            data_source,
            output,
            use_raw,
            pretty,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file)?)?;

            let options = IngestOptions {
                format_hint: format,
                context: IngestContext {
                    data_source_id: data_source.clone(),
                    dimension_names: Some(Arc::new(config.dimension_table())),
                },
            };

            let result = match pipeline.ingest(&payload, &options) {
                Ok(result) => result,
                Err(e) => {
                    error!("Ingestion failed: {}", e);
                    println!("❌ Ingestion failed: {}", e);
                    std::process::exit(1);
                }
            };

            info!(
                "Normalized {} records into {} rows",
                result.diagnostics.input_record_count, result.diagnostics.output_row_count
            );

            let source_type = result
                .format_tag
                .as_deref()
                .and_then(|tag| pipeline.source_type_of(tag).ok())
                .map(|s| s.to_string());
            let name = data_source.unwrap_or_else(|| file.display().to_string());
            let source = DataSource::from_ingestion(name, payload, &result, source_type);

            let store: Arc<dyn DataSourceStore> = Arc::new(InMemoryDataSourceStore::new());
            store.put(&source).await?;

            let view = source.client_view(use_raw)?;
            let rendered = if pretty {
                serde_json::to_string_pretty(&view)?
            } else {
                serde_json::to_string(&view)?
            };
            match output {
                Some(path) => {
                    fs::write(&path, rendered)?;
                    println!("✅ Wrote normalized data source to {}", path.display());
                }
                None => println!("{}", rendered),
            }
            if result.rows.is_empty() {
                println!(
                    "⚠️  No rows produced; drop reasons: {:?}",
                    result.diagnostics.reasons
                );
            }
        }
        Commands::Formats => {
            println!("Registered source formats:");
            for tag in pipeline.known_formats() {
                let source_type = pipeline.source_type_of(tag).unwrap_or("?");
                println!("  {} (source_type: {})", tag, source_type);
            }
        }
        Commands::Inspect { file } => {
            let payload: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file)?)?;
            println!("{}", fingerprint(&payload));
        }
    }

    Ok(())
}
