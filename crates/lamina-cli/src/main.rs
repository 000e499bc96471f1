//! Lamina command-line interface.
//!
//! Run frequency/scan sweeps from TOML job files:
//! ```sh
//! lamina run job.toml
//! lamina validate job.toml
//! lamina outputs
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lamina")]
#[command(about = "Lamina: Periodic Multilayer FSS Solver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the sweep.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the named output quantities.
    Outputs,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Lamina FSS Solver");
            println!("=================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_results_csv(&result, &out_dir.join("results.csv"), &job)?;
            if job.output.save_json {
                runner::write_results_json(&result.archive, &out_dir.join("results.json"))?;
            }

            println!("Sweep complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let prepared = runner::prepare(&job)?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  {} points, {} blocks, modes per layer: {:?}",
                prepared.plan.len(),
                prepared.analysis.blocks().len(),
                prepared.analysis.mode_counts()
            );
            Ok(())
        }
        Commands::Outputs => {
            println!("Available outputs:");
            println!();
            for (name, description) in lamina_core::outputs::catalog() {
                println!("  {:<22} {}", name, description);
            }
            println!();
            println!("  Ports: 1 = region 1, 2 = region N.");
            println!("  Modes: te, tm, h, v, r, l or a 1-based mode index.");
            Ok(())
        }
    }
}
