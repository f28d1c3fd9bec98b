use std::path::PathBuf;
use std::str::FromStr;

use blobtier_types::{ByteRange, ObjectPath};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blobtier",
    about = "Tiered blob store over a memory cache, local staging and a remote filesystem",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with a [driver] table
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote backend: `hadoop`, `hdfs` or `fs:DIR`
    #[arg(long, global = true, default_value = "hadoop")]
    pub remote: RemoteTarget,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Which remote store to drive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteTarget {
    /// `hadoop fs`
    Hadoop,
    /// `hdfs dfs`
    Hdfs,
    /// A local directory standing in for the remote.
    Fs(PathBuf),
}

impl FromStr for RemoteTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hadoop" => Ok(RemoteTarget::Hadoop),
            "hdfs" => Ok(RemoteTarget::Hdfs),
            other => match other.strip_prefix("fs:") {
                Some(dir) if !dir.is_empty() => Ok(RemoteTarget::Fs(PathBuf::from(dir))),
                _ => Err(format!("unknown remote {other:?}; expected hadoop, hdfs or fs:DIR")),
            },
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Print an object's content
    Get(GetArgs),
    /// Store an object from a file or stdin
    Put(PutArgs),
    /// Stream an object, optionally a byte range of it
    Cat(CatArgs),
    /// List a directory
    Ls(LsArgs),
    /// Check whether an object exists
    Exists(PathArgs),
    /// Remove an object from every tier
    Rm(PathArgs),
    /// Print an object's size in bytes
    Size(PathArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: ObjectPath,
    /// Write to FILE instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: ObjectPath,
    /// Read from FILE instead of stdin
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: ObjectPath,
    /// Inclusive range, `START-END` or `bytes=START-END`
    #[arg(long)]
    pub range: Option<ByteRange>,
}

#[derive(Args)]
pub struct LsArgs {
    pub path: Option<ObjectPath>,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: ObjectPath,
}
