use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use remex_core::workspace::language_for_extension;
use remex_core::{ClientConfig, Flavor, HostMessage, IdeSession, NullSink};

#[derive(Parser, Debug)]
#[clap(
    name = "Remex",
    author,
    version = "0.1.0",
    about = "Headless client for Judge0-style remote code execution services"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "remex.yaml", help = "Path to the YAML configuration")]
    config: String,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a source file and print the normalized result
    Run {
        /// Source file; the language is inferred from its extension unless
        /// --language-id is given
        file: PathBuf,

        #[clap(long, help = "Provider language id, overriding extension inference")]
        language_id: Option<i64>,

        #[clap(long, help = "Provider flavor (CE or EXTRA_CE), overriding extension inference")]
        flavor: Option<String>,

        #[clap(long, help = "File whose contents are passed to the program on stdin")]
        stdin_file: Option<PathBuf>,

        #[clap(long, default_value = "")]
        compiler_options: String,

        #[clap(long, default_value = "")]
        arguments: String,
    },
    /// List the merged language catalog across all provider flavors
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new().filter_level(level).init();

    let config = load_config(&cli.config).await?;
    let session = IdeSession::new(config, Arc::new(NullSink));

    match cli.command {
        Commands::Run { file, language_id, flavor, stdin_file, compiler_options, arguments } => {
            run_file(&session, file, language_id, flavor, stdin_file, compiler_options, arguments)
                .await
        }
        Commands::Languages => list_languages(&session).await,
    }
}

async fn load_config(path: &str) -> Result<Arc<ClientConfig>> {
    if Path::new(path).exists() {
        let config = ClientConfig::load(path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path))?;
        Ok(Arc::new(config))
    } else {
        log::debug!("no configuration at {}, using built-in defaults", path);
        Ok(Arc::new(ClientConfig::default()))
    }
}

async fn run_file(
    session: &IdeSession,
    file: PathBuf,
    language_id: Option<i64>,
    flavor: Option<String>,
    stdin_file: Option<PathBuf>,
    compiler_options: String,
    arguments: String,
) -> Result<()> {
    let source = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let binding = language_for_extension(extension);

    let selected_flavor = match flavor {
        Some(raw) => raw.parse::<Flavor>().map_err(|e| anyhow::anyhow!("{}", e))?,
        None => binding.flavor,
    };
    let selected_language = language_id.unwrap_or(binding.language_id);

    let stdin = match stdin_file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => String::new(),
    };

    session
        .handle_message(HostMessage::Set {
            source_code: Some(source),
            language_id: Some(selected_language),
            flavor: Some(selected_flavor),
            stdin: Some(stdin),
            stdout: None,
            compiler_options: Some(compiler_options),
            command_line_arguments: Some(arguments),
            api_key: None,
        })
        .await?;

    let output = session
        .run()
        .await?
        .context("submission was superseded before completing")?;

    eprintln!("{}", output.status_line);
    if !output.output.is_empty() {
        println!("{}", output.output);
    }

    // terminal provider failures are data, but the shell still wants a
    // non-zero exit for anything other than Accepted
    if output.status.id != 3 {
        std::process::exit(1);
    }
    Ok(())
}

async fn list_languages(session: &IdeSession) -> Result<()> {
    let languages = session.registry().list_languages().await?;
    for language in languages {
        let flavor = language
            .flavor
            .map(|f| f.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{:>6}  {:8}  {}", language.id, flavor, language.name);
    }
    Ok(())
}
