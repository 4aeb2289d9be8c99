use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("collision").args(["overwrite", "skip_existing", "prompt"])))]
pub struct Args {
    /// PDF files or directories containing PDFs
    #[arg(value_name = "FILES", required_unless_present = "check")]
    pub files: Vec<PathBuf>,

    /// Connection profile (TOML)
    #[arg(short = 'c', long, value_name = "PATH", default_value = "po-upload.toml")]
    pub profile: PathBuf,

    /// Overwrite files that already exist on the server
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Leave files that already exist on the server alone
    #[arg(long, default_value_t = false)]
    pub skip_existing: bool,

    /// Ask before overwriting (default when attached to a terminal)
    #[arg(long, default_value_t = false)]
    pub prompt: bool,

    /// Only test the connection: list, write and remove a probe file
    #[arg(long, default_value_t = false)]
    pub check: bool,

    /// Print the result ledger as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show progress during transfer
    #[arg(short = 'P', long, default_value_t = false)]
    pub progress: bool,

    /// Suppress non-error messages
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Increase verbosity
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// How collisions are settled for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    Overwrite,
    Skip,
    Prompt,
    /// No resolver: existing remote files fail.
    Refuse,
}

impl Args {
    pub fn collision_policy(&self, interactive: bool) -> CollisionPolicy {
        if self.overwrite {
            CollisionPolicy::Overwrite
        } else if self.skip_existing {
            CollisionPolicy::Skip
        } else if self.prompt || interactive {
            CollisionPolicy::Prompt
        } else {
            CollisionPolicy::Refuse
        }
    }
}
