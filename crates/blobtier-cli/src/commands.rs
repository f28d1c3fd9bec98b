use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use blobtier_driver::{BlobStore, DriverConfig, TieredBlobDriver};
use blobtier_remote::{FsRemote, HadoopCli, RemoteStore};
use blobtier_types::ObjectPath;
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    // `config` never needs a remote, so the driver is only opened on demand.
    let open = || open_driver(&cli.remote, config.clone());

    match cli.command {
        Command::Config => cmd_config(&config, &cli.format),
        Command::Get(args) => cmd_get(&open()?, args),
        Command::Put(args) => cmd_put(&open()?, args, &cli.format),
        Command::Cat(args) => cmd_cat(&open()?, args),
        Command::Ls(args) => cmd_ls(&open()?, args, &cli.format),
        Command::Exists(args) => cmd_exists(&open()?, args, &cli.format),
        Command::Rm(args) => cmd_rm(&open()?, args),
        Command::Size(args) => cmd_size(&open()?, args, &cli.format),
    }
}

fn open_driver(target: &RemoteTarget, config: DriverConfig) -> anyhow::Result<TieredBlobDriver> {
    let remote = build_remote(target, &config)?;
    TieredBlobDriver::new(config, remote).context("failed to start driver")
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DriverConfig> {
    let mut config = match path {
        Some(path) => DriverConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => DriverConfig::default(),
    };
    config.apply_env();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_remote(target: &RemoteTarget, config: &DriverConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    let remote: Arc<dyn RemoteStore> = match target {
        RemoteTarget::Hadoop => Arc::new(with_timeout(HadoopCli::new(), config)),
        RemoteTarget::Hdfs => Arc::new(with_timeout(HadoopCli::hdfs(), config)),
        RemoteTarget::Fs(dir) => Arc::new(
            FsRemote::open(dir).with_context(|| format!("cannot open {}", dir.display()))?,
        ),
    };
    Ok(remote)
}

fn with_timeout(cli: HadoopCli, config: &DriverConfig) -> HadoopCli {
    match config.remote_timeout() {
        Some(limit) => cli.with_timeout(limit),
        None => cli,
    }
}

fn cmd_config(config: &DriverConfig, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

fn cmd_get(store: &dyn BlobStore, args: GetArgs) -> anyhow::Result<()> {
    let content = store.get_content(&args.path)?;
    match args.output {
        Some(output) => {
            std::fs::write(&output, &content)
                .with_context(|| format!("cannot write {}", output.display()))?;
            eprintln!("{} {} bytes -> {}", "✓".green(), content.len(), output.display());
        }
        None => io::stdout().lock().write_all(&content)?,
    }
    Ok(())
}

fn cmd_put(store: &dyn BlobStore, args: PutArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mut input: Box<dyn Read> = match &args.file {
        Some(file) => Box::new(
            File::open(file).with_context(|| format!("cannot open {}", file.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };
    let receipt = store.stream_write(&args.path, &mut input)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&receipt)?),
        OutputFormat::Text => {
            println!(
                "{} Stored {} bytes at {}",
                "✓".green().bold(),
                receipt.bytes_written,
                receipt.remote_path.cyan()
            );
            if receipt.input_truncated {
                println!("  {} input ended early; only a prefix was stored", "warning:".yellow());
            }
        }
    }
    Ok(())
}

fn cmd_cat(store: &dyn BlobStore, args: CatArgs) -> anyhow::Result<()> {
    let stream = store.stream_read(&args.path, args.range)?;
    let mut out = io::stdout().lock();
    for chunk in stream {
        out.write_all(&chunk?)?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_ls(store: &dyn BlobStore, args: LsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let path = args.path.unwrap_or_else(ObjectPath::root);
    let listing = store.list_directory(&path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Text => {
            for entry in &listing {
                if entry.is_dir {
                    println!("{}/", entry.path.to_string().blue().bold());
                } else {
                    println!("{}  {}", entry.path, entry.size.to_string().dimmed());
                }
            }
        }
    }
    Ok(())
}

fn cmd_exists(store: &dyn BlobStore, args: PathArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let exists = store.exists(&args.path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "path": args.path, "exists": exists })),
        OutputFormat::Text if exists => println!("{} {}", "✓".green(), args.path),
        OutputFormat::Text => println!("{} {}", "✗".red(), args.path),
    }
    Ok(())
}

fn cmd_rm(store: &dyn BlobStore, args: PathArgs) -> anyhow::Result<()> {
    store.remove(&args.path)?;
    println!("{} Removed {}", "✓".green(), args.path.to_string().yellow());
    Ok(())
}

fn cmd_size(store: &dyn BlobStore, args: PathArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let size = store.get_size(&args.path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "path": args.path, "size": size })),
        OutputFormat::Text => println!("{size}"),
    }
    Ok(())
}
