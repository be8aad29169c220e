//! Command-line argument parsing for Cadenza.

use std::path::PathBuf;

use clap::{ Parser, Subcommand };


/// Cadenza - inspect and maintain the local media item cache.
#[derive( Parser, Debug )]
#[command( name = "cadenza" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Item cache directory (defaults to the platform cache directory).
    #[arg( long, global = true )]
    pub cache_dir: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory).
    #[arg( long, global = true )]
    pub settings: Option<PathBuf>,

    #[command( subcommand )]
    pub command: Command,
}


#[derive( Subcommand, Debug )]
pub enum Command {
    /// Print a cached artist as JSON.
    Show {
        id: String,
    },

    /// Merge values into a cached artist and write it back.
    Supply {
        id: String,

        #[arg( long )]
        title: Option<String>,

        #[arg( long )]
        channel: Option<String>,

        #[arg( long )]
        subscribers: Option<u64>,

        /// Treat the values as authoritative.
        #[arg( short, long )]
        certain: bool,
    },

    /// Remove a cached artist.
    Forget {
        id: String,
    },

    /// Read or change settings.
    #[command( subcommand )]
    Settings( SettingsCommand ),
}


#[derive( Subcommand, Debug )]
pub enum SettingsCommand {
    /// List every known key with its current value.
    List,

    /// Print one value.
    Get { key: String },

    /// Set a value (JSON; bare words are taken as strings).
    Set { key: String, value: String },

    /// Restore a key to its default.
    Reset { key: String },
}
