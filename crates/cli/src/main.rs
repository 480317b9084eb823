use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ferry_core::config::core_config_from_env_values;
use ferry_core::constants::{EXTENSION_BASE_URL_ENV, SESSION_TIMEOUT_MS_ENV};
use ferry_core::{registry, select, transcode_with, ReverseAdapter};
use fhir::BundleFormat;
use openehr::{flat_file, SearchTerm};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "openEHR flat-file to FHIR transcoder")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcode a flat file and print the FHIR bundle
    Convert {
        /// Flat file to read
        file: PathBuf,
        /// Output format: json or yaml
        #[arg(long, default_value = "json")]
        format: BundleFormat,
        /// Use this adapter instead of picking the best match
        #[arg(long)]
        adapter: Option<String>,
    },
    /// Print the tree parsed from a flat file
    Tree {
        /// Flat file to read
        file: PathBuf,
        /// Regenerate the flat file instead of the indented view
        #[arg(long)]
        flat: bool,
        /// Only list the paths of nodes with this name (list suffix ignored)
        #[arg(long, conflicts_with = "flat")]
        find: Option<String>,
    },
    /// List registered adapters
    Adapters,
    /// Convert a FHIR bundle back into a flat file
    Reverse {
        /// Bundle (or single resource) JSON to read
        file: PathBuf,
    },
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ferry_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = core_config_from_env_values(
        std::env::var(EXTENSION_BASE_URL_ENV).ok(),
        std::env::var(SESSION_TIMEOUT_MS_ENV).ok(),
    )?;

    match cli.command {
        Some(Commands::Convert {
            file,
            format,
            adapter,
        }) => {
            let message = read(&file)?;
            let adapters = registry(&config)?;
            let session = match adapter {
                Some(name) => transcode_with(&adapters, &name, &message)?,
                None => match select(&adapters, &message) {
                    Some(session) if session.successes() > 0 => session,
                    _ => bail!("no adapter matched {}", file.display()),
                },
            };
            tracing::info!(
                adapter = session.adapter(),
                confidence = session.successes(),
                "transcoded {}",
                file.display()
            );
            println!("{}", fhir::bundle::render(&session.bundle(), format)?);
        }
        Some(Commands::Tree { file, flat, find }) => {
            let tree = flat_file::parse("root", &read(&file)?);
            match find {
                Some(name) => {
                    for id in tree.find_many(tree.root(), SearchTerm::Text(&name)) {
                        println!("{}", tree.path_to_root(id));
                    }
                }
                None if flat => println!("{}", flat_file::serialise(&tree)),
                None => print!("{}", tree.display()),
            }
        }
        Some(Commands::Adapters) => {
            for adapter in registry(&config)? {
                println!("{} ({} rules)", adapter.name(), adapter.rules().len());
            }
        }
        Some(Commands::Reverse { file }) => {
            let adapter = ReverseAdapter::allergy_intolerance();
            let tree = adapter.convert(&read(&file)?)?;
            tracing::info!(
                composition = adapter.composition(),
                "reverse converted {}",
                file.display()
            );
            println!("{}", flat_file::serialise(&tree));
        }
        None => {
            println!("Use 'ferry --help' for commands");
        }
    }

    Ok(())
}
