//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Generate short-form video scripts from a topic, then refine them by chat
///
/// Connection and storage settings come from `STUDIO_*` environment
/// variables (or a `.env` file); the flags below override them.
#[derive(Parser, Debug, Clone)]
#[command(name = "script-studio")]
#[command(version)]
pub struct Cli {
    /// Generation service root URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Directory for the local session store
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Never use the service's session store
    #[arg(long, global = true)]
    pub local_sessions: bool,

    /// Keep sessions in memory only for this run
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a generation job and print its scripts
    Generate(GenerateArgs),

    /// List saved sessions, primary store first
    History,

    /// Print a saved session
    Show {
        /// Session id as printed by `history`
        id: String,
    },

    /// Delete a saved session
    Delete { id: String },

    /// Ask for an edit to one script of a saved session
    Chat {
        id: String,

        /// Script number, starting at 1
        #[arg(long, default_value_t = 1)]
        variant: usize,

        #[arg(short, long)]
        message: String,
    },

    /// Add a finished script to the service's reference library
    Train(TrainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[arg(short, long)]
    pub title: String,

    /// Read the script from this file
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Script text given inline
    #[arg(short, long, conflicts_with = "file")]
    pub script: Option<String>,

    /// informational or listical
    #[arg(short, long, default_value = "informational")]
    pub mode: String,

    /// shock, question, negative or story
    #[arg(long = "hook", default_value = "shock")]
    pub hook_type: String,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(short, long)]
    pub topic: String,

    /// Extra guidance for the writers
    #[arg(short, long, default_value = "")]
    pub notes: String,

    /// informational or listical
    #[arg(short, long, default_value = "informational")]
    pub mode: String,

    /// Write from the notes and attachments only
    #[arg(long)]
    pub skip_research: bool,

    /// Source document to attach (pdf, md or txt); repeatable
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Answer a clarification with this option number instead of prompting
    #[arg(long, value_name = "N")]
    pub choose: Option<usize>,
}
