//! Legenda - batch subtitle translation
//!
//! Entry point for the command line: translates SRT files in resumable
//! batches and offers the editing, cleanup and checking commands around it.

use anyhow::Result;
use clap::Parser;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use legenda::cli::{Args, Commands};
use legenda::config::Config;
use legenda::context::ContextKind;
use legenda::orchestrator::CancellationToken;
use legenda::quality::LayoutReport;
use legenda::subtitle::SubtitleEncoding;
use legenda::workflow::{ContextOverrides, TranslateRequest, TranslationSummary, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current batch...");
                cancel.cancel();
            }
        });
    }

    match args.command {
        Commands::Translate {
            input,
            output,
            kind,
            title,
            year,
            director,
            genre,
            description,
            artist,
            album,
            meaning,
            search,
            source_lang,
            batch_size,
            limit,
            encoding,
        } => {
            if let Some(batch_size) = batch_size {
                config.batch.batch_size = batch_size;
            }
            set_encoding(&mut config, encoding)?;
            let workflow = Workflow::new(config)?;

            let request = TranslateRequest {
                input,
                output,
                kind: kind.parse::<ContextKind>()?,
                overrides: ContextOverrides {
                    title,
                    year,
                    director,
                    genre,
                    description,
                    artist,
                    album,
                    meaning,
                },
                search,
                source_language: source_lang,
                limit,
            };

            let summary = workflow.translate(request, &cancel).await?;
            print_summary(&summary);
        }
        Commands::Resume { output, limit } => {
            let workflow = Workflow::new(config)?;
            let summary = workflow.resume(output, limit, &cancel).await?;
            print_summary(&summary);
        }
        Commands::Status => {
            let workflow = Workflow::new(config)?;
            let status = workflow.status().await?;
            let session = &status.session;

            if session.blocks().is_empty() {
                println!("No saved session.");
            } else {
                println!("\nFile:     {}", session.file_name());
                println!("State:    {}", session.state());
                if let Some(context) = session.context() {
                    println!("Context:  {} ({})", context, context.kind());
                }
                println!("Language: {}", session.source_language());
                println!(
                    "Progress: {}/{} blocks translated",
                    session.translated_count(),
                    session.blocks().len()
                );
                if let Some(error) = session.last_error() {
                    println!("Error:    {}", error);
                }
                print_layout_issues(&status.layout_issues);
            }
        }
        Commands::Edit { index, text } => {
            let workflow = Workflow::new(config)?;
            workflow.edit(index, &text).await?;
            println!("Block {} updated", index);
        }
        Commands::Retranslate { index } => {
            let workflow = Workflow::new(config)?;
            let text = workflow.retranslate(index).await?;
            println!("#{}\n{}", index, text);
        }
        Commands::Reformat { index } => {
            let workflow = Workflow::new(config)?;
            let text = workflow.reformat(index).await?;
            println!("#{}\n{}", index, text);
        }
        Commands::Export { output } => {
            let workflow = Workflow::new(config)?;
            let count = workflow.export(&output).await?;
            println!("Exported {} blocks to {}", count, output.display());
        }
        Commands::Reset => {
            let workflow = Workflow::new(config)?;
            workflow.reset().await?;
            println!("Session cleared");
        }
        Commands::Clean { input, output, encoding } => {
            set_encoding(&mut config, encoding)?;
            let workflow = Workflow::new(config)?;
            let written = workflow.clean(&input, output).await?;
            for path in &written {
                println!("{}", path.display());
            }
            println!("Cleaned {} files", written.len());
        }
        Commands::Check { input, encoding } => {
            set_encoding(&mut config, encoding)?;
            let workflow = Workflow::new(config)?;
            let issues = workflow.check(&input).await?;
            if issues.is_empty() {
                println!("No layout problems found.");
            } else {
                print_layout_issues(&issues);
            }
        }
        Commands::Search { query, kind } => {
            let workflow = Workflow::new(config)?;
            let found = workflow.search(&query, kind.parse::<ContextKind>()?).await?;

            if found.results.is_empty() {
                println!("Nothing found for '{}'", query);
            }
            for (i, context) in found.results.iter().enumerate() {
                println!("{}. {}", i + 1, context);
            }
            if !found.sources.is_empty() {
                println!("\nSources:");
                for source in &found.sources {
                    println!("  {} - {}", source.title, source.uri);
                }
            }
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".legenda").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "legenda.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("legenda.log").display()
    );

    Ok(())
}

fn set_encoding(config: &mut Config, encoding: Option<String>) -> Result<()> {
    if let Some(encoding) = encoding {
        config.input.encoding = encoding.parse::<SubtitleEncoding>()?;
    }
    Ok(())
}

fn print_summary(summary: &TranslationSummary) {
    println!(
        "\nTranslated {}/{} blocks in {} batches",
        summary.translated, summary.total, summary.report.batches_sent
    );
    if summary.report.cancelled {
        println!("Stopped early; run `legenda resume` to continue.");
    } else if !summary.is_complete() {
        println!("{} blocks left; run `legenda resume` to continue.", summary.total - summary.translated);
    }
    if let Some(output) = &summary.output {
        println!("Output: {}", output.display());
    }
    print_layout_issues(&summary.layout_issues);
}

fn print_layout_issues(issues: &[LayoutReport]) {
    if issues.is_empty() {
        return;
    }
    println!("\nLayout warnings:");
    for issue in issues {
        println!("  {:?}: {}", issue.severity(), issue.describe());
    }
}
