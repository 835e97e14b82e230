use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use picture_organizer::config::{default_workers, parse_size};
use picture_organizer::pool::WorkerStats;
use picture_organizer::{
    organize, BarReporter, Config, ExtensionAllowList, MoveFallback, NamingPolicy, PlacementMode,
    Representative, Summary, TimestampSource,
};

/// Copy every distinct photo/video under a source tree into a
/// year/month destination layout, skipping what the destination already has.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the original files
    source: PathBuf,

    /// Directory to sort the files into
    destination: PathBuf,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Move files instead of copying them
    #[arg(short = 'm', long = "move")]
    move_files: bool,

    /// Keep original file names instead of `date-hash.ext`
    #[arg(short = 'n', long)]
    no_rename: bool,

    /// When a move falls back to copying, keep the source file
    #[arg(long)]
    keep_source_on_fallback: bool,

    /// Newline-delimited list of extensions to include; written with
    /// defaults if missing
    #[arg(short = 'e', long, default_value = "extensions.txt")]
    extensions: PathBuf,

    /// Minimum file size in bytes (supports suffixes KB, MB, GB)
    #[arg(long, default_value = "0")]
    min_size: String,

    /// Which copy of a duplicated content is placed
    #[arg(long, value_enum, default_value_t = Representative::First)]
    representative: Representative,

    /// Where the date used for the folder and file name comes from
    #[arg(long, value_enum, default_value_t = TimestampSource::Filesystem)]
    timestamps: TimestampSource,

    /// Plan and report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print every group of identical files found in the source
    #[arg(long)]
    list_duplicates: bool,

    /// Show thread usage statistics
    #[arg(short = 's', long)]
    show_thread_stats: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let extensions = ExtensionAllowList::load_or_create(&self.extensions)
            .context("Failed to load extension list")?;
        let min_size = parse_size(&self.min_size)?;

        let mode = if self.move_files {
            PlacementMode::Move
        } else {
            PlacementMode::Copy
        };
        let naming = if self.no_rename {
            NamingPolicy::KeepName
        } else {
            NamingPolicy::Rename
        };
        let move_fallback = if self.keep_source_on_fallback {
            MoveFallback::KeepSource
        } else {
            MoveFallback::RemoveSource
        };

        let config = Config::new(self.source, self.destination)
            .with_workers(self.threads.unwrap_or_else(default_workers))
            .with_mode(mode)
            .with_naming(naming)
            .with_extensions(extensions)
            .with_min_size(min_size)
            .with_representative(self.representative)
            .with_timestamps(self.timestamps)
            .with_move_fallback(move_fallback)
            .with_dry_run(self.dry_run);
        Ok(config)
    }
}

fn print_thread_stats(label: &str, stats: &WorkerStats) {
    let total: usize = stats.values().sum();
    if total == 0 {
        return;
    }
    println!("\n{label} thread statistics:");
    for (thread_id, files) in stats {
        let percentage = (*files as f64 / total as f64 * 100.0) as u32;
        println!("  Thread {}: {} files ({}%)", thread_id, files, percentage);
    }
}

fn print_summary(summary: &Summary, list_duplicates: bool, show_thread_stats: bool) {
    if list_duplicates && !summary.duplicate_groups.is_empty() {
        println!("\nDuplicate files found:");
        for (hash, paths) in &summary.duplicate_groups {
            println!("  {}", hash);
            for path in paths {
                println!("    {}", path.display());
            }
        }
    }

    println!("\nStatistics:");
    println!("Files scanned: {}", summary.source.files);
    println!("Directories scanned: {}", summary.source.directories);
    println!("Files filtered out: {}", summary.source.filtered);
    println!("Files unreadable: {}", summary.source.unreadable);
    println!("Unique contents found: {}", summary.unique_contents);
    println!("Redundant copies in source: {}", summary.redundant_copies);
    println!("Already at destination: {}", summary.already_at_destination);
    if summary.would_place > 0 {
        println!("Would place (dry run): {}", summary.would_place);
    }
    println!("Files placed: {}", summary.placed);
    println!("Files skipped (target exists): {}", summary.skipped);
    println!("Placement errors: {}", summary.failed);
    println!(
        "Walk errors: {}",
        summary.source.walk_errors + summary.destination.walk_errors
    );
    println!("Time elapsed: {:.2?}", summary.elapsed);

    if show_thread_stats {
        print_thread_stats("Hashing", &summary.hashing_workers);
        print_thread_stats("Placement", &summary.placement_workers);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let list_duplicates = args.list_duplicates;
    let show_thread_stats = args.show_thread_stats;
    let config = args.into_config()?;

    info!(
        "Sorting {} into {} with {} workers",
        config.source.display(),
        config.destination.display(),
        config.workers
    );

    let reporter = BarReporter::new();
    let summary = organize(&config, &reporter).context("Organizing failed")?;
    reporter.clear();

    print_summary(&summary, list_duplicates, show_thread_stats);
    Ok(())
}
