#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use syllagen::gateway::{ChatModel, ProviderGateway, StderrUsageSink};
use syllagen::pipeline::{GuidePipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "syllagen", version, about = "Syllabus study-guide generator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a study guide from a syllabus text file
    Generate {
        /// Path to a plain-text syllabus
        #[arg(long)]
        input: PathBuf,
        /// Where to write the study guide JSON
        #[arg(long)]
        out: PathBuf,
        /// Override the primary model
        #[arg(long)]
        primary: Option<String>,
        /// Override the fallback model
        #[arg(long)]
        fallback: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syllagen=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            out,
            primary,
            fallback,
        } => {
            let syllabus = match fs::read_to_string(&input) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("failed to read {}: {e}", input.display());
                    return ExitCode::FAILURE;
                }
            };

            let gateway = match ProviderGateway::from_env(Arc::new(StderrUsageSink)) {
                Ok(g) => Arc::new(g),
                Err(e) => {
                    eprintln!("gateway setup failed: {e}");
                    return ExitCode::FAILURE;
                }
            };

            let mut config = PipelineConfig::from_env();
            if let Some(m) = primary {
                config.primary_model = ChatModel::openrouter(m);
            }
            if let Some(m) = fallback {
                config.fallback_model = ChatModel::openrouter(m);
            }

            let pipeline = GuidePipeline::new(gateway, config);

            match pipeline.generate(&syllabus).await {
                Ok(guide) => {
                    let json = match serde_json::to_string_pretty(&guide) {
                        Ok(j) => j,
                        Err(e) => {
                            eprintln!("failed to serialize guide: {e}");
                            return ExitCode::FAILURE;
                        }
                    };
                    if let Err(e) = fs::write(&out, json) {
                        eprintln!("failed to write {}: {e}", out.display());
                        return ExitCode::FAILURE;
                    }
                    eprintln!("study guide written to {}", out.display());
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    // Full detail to logs, generic category to the user.
                    tracing::error!(category = err.category(), error = %err, "generation failed");
                    eprintln!("{}", err.public_message());
                    ExitCode::FAILURE
                }
            }
        }
    }
}
