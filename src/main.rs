use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use job_aggregator::{CanonicalPosting, Pipeline, Settings};

#[derive(Parser)]
#[command(
    name = "job_aggregator",
    about = "Merge, deduplicate and classify job postings from crawler output"
)]
struct Cli {
    /// TOML config file (default: ./jobs.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read every source, classify, and write category/region partitions
    Run {
        /// Source files or directories, in priority order (overrides config)
        sources: Vec<PathBuf>,
        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the summary without writing any files
        #[arg(long)]
        dry_run: bool,
    },
    /// List the source files a run would read, in processing order
    Sources,
    /// Classify one posting given on the command line
    Classify {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        location: String,
        /// Producer type hint, e.g. "Contract"
        #[arg(long = "type", default_value = "")]
        job_type: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        source: String,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            sources,
            output,
            dry_run,
        } => {
            if !sources.is_empty() {
                settings.sources = sources;
            }
            if let Some(dir) = output {
                settings.output_dir = dir;
            }
            info!(
                sources = ?settings.sources,
                output = %settings.output_dir.display(),
                "Starting job aggregation"
            );

            let pipeline = Pipeline::new(&settings)?;
            let units = pipeline.discover();
            let run = pipeline.run(&units);

            if run.summary.unique == 0 {
                println!("No jobs found. Run the crawlers first.\n");
            }
            if dry_run {
                println!("Dry run: nothing written.\n");
            } else {
                let files = pipeline.layout().write(&run.partitions)?;
                println!(
                    "Wrote {} files to {}\n",
                    files,
                    pipeline.layout().root().display()
                );
            }
            run.summary.log();
            println!("{}", run.summary.render_markdown());
        }
        Commands::Sources => {
            let pipeline = Pipeline::new(&settings)?;
            let units = pipeline.discover();
            if units.is_empty() {
                println!("No sources found.");
            }
            for (i, unit) in units.iter().enumerate() {
                let marker = if unit.path.exists() { "" } else { " (missing)" };
                println!("{:>3}. {}{}", i + 1, unit.path.display(), marker);
            }
        }
        Commands::Classify {
            title,
            location,
            job_type,
            description,
            source,
        } => {
            let pipeline = Pipeline::new(&settings)?;
            let mut posting = CanonicalPosting::with_url("adhoc");
            posting.title = title.trim().to_string();
            posting.location = location.trim().to_string();
            posting.raw_type = job_type.trim().to_string();
            posting.description = description.trim().to_string();
            posting.source = source.trim().to_string();

            let tags = pipeline.classifier().classify(&posting);
            println!("{}", posting.title);
            println!("  {} Type:   {}", tags.category.icon(), tags.category);
            println!("  {} Region: {}", tags.region.icon(), tags.region);
            println!("  Remote: {}", tags.is_remote);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("Done in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}
