use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "hostscript")]
#[command(about = "Load and run host scripts through the host bridge")]
pub(crate) struct Cli {
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: String,
    /// Script to load and run; repeatable. Defaults to every top-level `.rhai` file.
    #[arg(long = "entry")]
    pub(crate) entries: Vec<String>,
    /// JSON array passed to every entry's default export.
    #[arg(long = "args")]
    pub(crate) args: Option<String>,
    /// Channel capacity; 0 is unbounded.
    #[arg(long = "queue-size", default_value_t = 0)]
    pub(crate) queue_size: usize,
    #[arg(long = "log-level", default_value = "warn")]
    pub(crate) log_level: String,
}
