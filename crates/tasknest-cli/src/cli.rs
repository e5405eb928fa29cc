//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tasknest - local-first task and kanban store.
#[derive(Parser, Debug)]
#[command(name = "tasknest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (TOML).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory; overrides `data_dir` from the config file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task operations.
    Task(TaskArgs),
    /// Bucket operations.
    Bucket(BucketArgs),
    /// Mesh sharing settings. Stored for hosts that embed a mesh network; this
    /// binary has none, so its own sessions stay local.
    Share(ShareArgs),
    /// Sync two in-process replicas through a host relay and print the result.
    SyncDemo,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List the tasks of a project by position.
    List {
        #[arg(short, long, default_value_t = 1)]
        project: i64,
        /// Only tasks of this bucket, by kanban position.
        #[arg(short, long)]
        bucket: Option<i64>,
        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create a task.
    Add {
        title: String,
        #[arg(short, long, default_value_t = 1)]
        project: i64,
        /// Defaults to the project's default bucket.
        #[arg(short, long)]
        bucket: Option<i64>,
        #[arg(long, default_value_t = 0.0)]
        position: f64,
    },
    /// Mark a task as done.
    Done { id: i64 },
    /// Delete a task.
    Rm { id: i64 },
}

#[derive(Args, Debug)]
pub struct BucketArgs {
    #[command(subcommand)]
    pub command: BucketCommand,
}

#[derive(Subcommand, Debug)]
pub enum BucketCommand {
    /// List the buckets of a project with their tasks.
    List {
        #[arg(short, long, default_value_t = 1)]
        project: i64,
        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create a bucket.
    Add {
        title: String,
        #[arg(short, long, default_value_t = 1)]
        project: i64,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
    /// Delete a bucket; its tasks move to the project's default bucket.
    Rm { id: i64 },
}

#[derive(Args, Debug)]
pub struct ShareArgs {
    #[command(subcommand)]
    pub command: ShareCommand,
}

#[derive(Subcommand, Debug)]
pub enum ShareCommand {
    /// Enable mesh sharing in a password-protected room.
    Enable {
        #[arg(long)]
        room: String,
        #[arg(long)]
        password: String,
    },
    /// Disable mesh sharing; room settings are kept.
    Disable,
    /// Print the sharing settings.
    Show,
}
