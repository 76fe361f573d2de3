use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikidelta::delta::DiffAlgorithm;
use wikidelta::desired::DesiredPages;
use wikidelta::input::{open_dump, DumpFileName};
use wikidelta::processor::{process_dump, PageFilter, ProcessorConfig, TextCarry};
use wikidelta::site_info::SiteInfo;

#[derive(Debug, clap::Parser)]
#[command(name = "wikidelta")]
#[command(about = "Extract the text added by each revision of selected pages of a MediaWiki dump")]
struct CommandLine {
    /// Full-history dump (.xml, .xml.bz2 or .xml.zst), named like <lang>wiki-<YYYYMMDD>...
    input_file: PathBuf,

    /// File with one page title per line (first CSV field); lines starting with '#' are ignored
    desired_list: PathBuf,

    /// TAB-delimited output file
    output_file: PathBuf,

    /// Kind of pages to extract
    #[arg(short = 't', long = "type", value_enum, default_value_t = PageFilter::All)]
    page_type: PageFilter,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language code written to every row, instead of the one in the dump file name
    #[arg(long)]
    lang: Option<String>,

    /// Alignment used to find the inserted text
    #[arg(long = "diff", value_enum, default_value_t = DiffAlgorithm::SequenceMatcher)]
    diff_algorithm: DiffAlgorithm,

    /// Diff the first revision of a page against the last text of the previous page
    #[arg(long)]
    carry_text_across_pages: bool,
}

fn run(args: CommandLine) -> Result<()> {
    let started = Instant::now();

    let lang = match args.lang {
        Some(lang) => lang,
        None => {
            DumpFileName::from_path(&args.input_file)
                .context("Cannot derive the language from the dump file name, pass --lang")?
                .lang
        }
    };

    let desired = DesiredPages::from_path(&args.desired_list).with_context(|| {
        format!(
            "Failed to load desired pages: {}",
            args.desired_list.display()
        )
    })?;
    info!(desired_pages = desired.len(), "Loaded desired page list");

    let site_info = SiteInfo::read(open_dump(&args.input_file)?)
        .with_context(|| format!("Failed to read site info: {}", args.input_file.display()))?;
    info!(site_info = ?site_info, "Read site info");
    let translations = site_info
        .translations()
        .context("Failed to resolve namespace names")?;

    let mut config = ProcessorConfig::new(lang.as_str(), translations.talk);
    config.page_filter = args.page_type;
    config.diff_algorithm = args.diff_algorithm;
    if args.carry_text_across_pages {
        config.text_carry = TextCarry::AcrossPages;
    }

    let output = File::create(&args.output_file).with_context(|| {
        format!(
            "Failed to create output file: {}",
            args.output_file.display()
        )
    })?;

    let (mut output, stats) = process_dump(
        open_dump(&args.input_file)?,
        site_info.element_names(),
        config,
        &desired,
        BufWriter::new(output),
    )
    .with_context(|| format!("Failed to process dump: {}", args.input_file.display()))?;
    output.flush().context("Failed to flush output file")?;

    println!();
    println!("=== Summary ===");
    println!("Language:           {}", lang);
    println!("Pages seen:         {}", stats.pages_seen);
    println!("Pages processed:    {}", stats.pages_processed);
    println!("Records written:    {}", stats.records_written);
    println!(
        "Total time:         {:.2}s",
        started.elapsed().as_secs_f64()
    );

    Ok(())
}

fn main() -> ExitCode {
    let args = CommandLine::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    match run(args) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
