//! rangesync - block-level delta download over HTTP range requests

use anyhow::Context;
use clap::Parser;
use rangesync::cli::{Cli, Commands, ConfigArgs, PatchArgs, ServeArgs, SignArgs};
use rangesync::config::Config;
use rangesync::format::{format_size, PatchReport};
use rangesync::serve::{serve, ServeState};
use rangesync::signature::{generate_index, write_index_file};
use rangesync::sync::SyncEngine;
use rangesync::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Commands::Serve(args) => run_serve(args).await?,
        Commands::Patch(args) => run_patch(args, cli.json).await?,
        Commands::Sign(args) => run_sign(args)?,
        Commands::Config(args) => handle_config_command(args)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("rangesync=info"),
        1 => EnvFilter::new("rangesync=debug"),
        2 => EnvFilter::new("rangesync=trace"),
        _ => EnvFilter::new("trace"),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Received Ctrl+C, shutting down...");
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    if !args.file.is_file() {
        anyhow::bail!("{} is not a regular file", args.file.display());
    }

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;

    let state = ServeState::new(args.file, config.block_size);
    serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

async fn run_patch(args: PatchArgs, json: bool) -> anyhow::Result<()> {
    let config = args.to_config()?;
    let destination = args.destination();
    let engine = SyncEngine::new(config, &args.url)?;

    let stats = tokio::select! {
        result = engine.pull(&args.local, &destination) => result?,
        _ = shutdown_signal() => return Err(Error::Cancelled.into()),
    };

    if !json {
        PatchReport {
            target: &destination.display().to_string(),
            stats: &stats,
        }
        .print();
    }
    Ok(())
}

fn run_sign(args: SignArgs) -> anyhow::Result<()> {
    let block_size = match args.block_size {
        Some(block_size) => block_size,
        None => Config::load()?.block_size,
    };
    let output = args.output_path();

    tracing::info!(file = %args.file.display(), block_size, "Generating checksum index");
    let index = generate_index(&args.file, block_size)?;
    write_index_file(&index, &output)?;

    println!(
        "Wrote {} ({} blocks of {}) for {}",
        output.display(),
        index.len(),
        format_size(block_size as u64),
        format_size(index.file_size)
    );
    Ok(())
}

fn handle_config_command(args: ConfigArgs) -> anyhow::Result<()> {
    if args.path {
        match Config::default_config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => eprintln!("Error: {}", e),
        }
    } else if args.init {
        let config = Config::default();
        config.save()?;
        println!(
            "Created default configuration at {}",
            Config::default_config_path()?.display()
        );
    } else {
        // Show current config
        let config = Config::load().unwrap_or_default();
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
