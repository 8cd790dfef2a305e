use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use typescope::{classify_file, format_size, Report};

#[derive(Parser)]
#[command(name = "typescope", version, about = "Identify file types by signature and extension")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Classify local files and print a JSON report.
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print a byte count in human-readable units.
    Size { bytes: u64 },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Classify { paths, pretty } => {
            let files = paths
                .iter()
                .map(|path| {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    classify_file(path, &name)
                })
                .collect();
            let report = Report::new(files);
            let out = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{out}");
        }
        Cmd::Size { bytes } => println!("{}", format_size(bytes)),
    }
    Ok(())
}
