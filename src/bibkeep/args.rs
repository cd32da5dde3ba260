use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bibkeep")]
#[command(about = "Collect, validate and tidy BibTeX entries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Bibliography file to operate on
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty bibliography file
    New {
        /// Path of the file to create
        path: PathBuf,
    },

    /// List bibliography files below a directory
    Scan {
        /// Directory to search
        dir: PathBuf,
    },

    /// List the entries of the file
    #[command(alias = "ls")]
    List,

    /// Print one entry
    Show {
        /// Keyword of the entry
        keyword: String,

        /// Also copy the entry to the clipboard
        #[arg(short, long)]
        copy: bool,
    },

    /// Add entries, replacing those with the same keyword
    Add {
        /// Text containing entries (read from stdin if omitted)
        text: Option<String>,

        /// Take the text from the clipboard
        #[arg(short, long, conflicts_with = "text")]
        clipboard: bool,
    },

    /// Delete entries by keyword
    #[command(alias = "rm")]
    Delete {
        /// Keywords of the entries
        #[arg(required = true, num_args = 1..)]
        keywords: Vec<String>,
    },

    /// Rewrite every entry with one closure style
    #[command(group(ArgGroup::new("style").required(true).args(["quotes", "braces"])))]
    Reformat {
        /// Wrap values in "quotes"
        #[arg(long)]
        quotes: bool,

        /// Wrap values in {braces}
        #[arg(long)]
        braces: bool,
    },

    /// Report entries appearing on the clipboard until interrupted
    Watch,

    /// Interactive session with undo/redo
    Session,
}
