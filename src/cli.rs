use clap::Parser;

/// regmirror — mirror container images into a private registry
#[derive(Parser, Debug)]
#[command(name = "regmirror", version, about)]
pub struct Cli {
    /// Path to the mirror configuration file
    #[arg(long, default_value = "config.yaml")]
    pub config: String,

    /// Only mirror repositories whose name starts with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Exit zero even when individual repositories fail
    #[arg(long, default_value_t = false)]
    pub ignore_errors: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
