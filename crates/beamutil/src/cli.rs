use std::path::PathBuf;

#[derive(Debug, clap::Parser, Clone)]
#[clap(next_display_order(2000), next_help_heading("Common options"))]
pub struct UniversalFlags {
    /// Directory of the project to build (defaults to the current directory)
    #[arg(long = "directory", short = 'C', global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Suppress output
    #[clap(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Increase verbosity
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Print the planned compiler invocations without running them
    #[clap(long, global = true)]
    pub dry_run: bool,
}
