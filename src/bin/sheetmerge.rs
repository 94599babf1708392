use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheetmerge::{
    classify::Classifier,
    lookup::{Dhis2Config, Dhis2Lookup},
    mapping::{map_labels_to_ids, CancelToken, MappingConfig, NOT_FOUND},
    merge::MergeJob,
    read,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "sheetmerge", version, about = "Merge Excel workbooks and map header labels to DHIS2 ids")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge workbooks sheet by sheet; the first file is the base
    Merge {
        /// at least two .xlsx files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// output file, `.xlsx` is appended when missing
        #[arg(short, long, default_value = "merged_excel.xlsx")]
        output: String,
        /// JSON file name pattern table replacing the built-in one
        #[arg(long)]
        patterns: Option<PathBuf>,
    },
    /// Look every header label up in DHIS2 and write the ids below it
    Map {
        input: PathBuf,
        #[arg(short, long, default_value = "updated-data.xlsx")]
        output: PathBuf,
        #[arg(long, env = "DHIS2_URL")]
        url: String,
        #[arg(long, env = "DHIS2_USERNAME")]
        username: String,
        #[arg(long, env = "DHIS2_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value_t = 8)]
        header_row: u32,
        #[arg(long, default_value_t = 9)]
        output_row: u32,
        #[arg(long, default_value_t = 6)]
        start_column: u32,
        #[arg(long, default_value_t = 200)]
        max_columns: u32,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Print the merge start row of file names
    Classify {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long)]
        patterns: Option<PathBuf>,
    },
}

fn load_classifier(patterns: Option<&PathBuf>) -> Result<Classifier> {
    match patterns {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            Ok(Classifier::from_json(&text)?)
        },
        None => Ok(Classifier::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Merge { files, output, patterns } => {
            let classifier = load_classifier(patterns.as_ref())?;
            let mut job = MergeJob::new(output);
            for path in &files {
                job.push(read::decode_file(path).with_context(|| format!("Error reading file {}", path.display()))?);
            }
            job.validate()?;
            let merged = job.run(&classifier).context("Error merging files")?;
            fs::write(&merged.file_name, &merged.bytes)
                .with_context(|| format!("Error saving file {}", merged.file_name))?;
            println!("Files merged successfully, saved as {}", merged.file_name);
        },
        Commands::Map {
            input,
            output,
            url,
            username,
            password,
            header_row,
            output_row,
            start_column,
            max_columns,
            timeout_secs,
        } => {
            let dhis2 = Dhis2Config::new(url, username, password)
                .with_timeout(Duration::from_secs(timeout_secs));
            let lookup = Dhis2Lookup::new(&dhis2)?;
            let config = MappingConfig {
                header_row,
                output_row,
                start_column,
                max_columns,
                not_found: NOT_FOUND.to_owned(),
            };
            let workbook = read::decode_file(&input)
                .with_context(|| format!("Error reading file {}", input.display()))?;
            let mut last = None;
            let mapped = map_labels_to_ids(workbook, &lookup, &config, &CancelToken::new(), |p| {
                if last != Some(p.percent()) {
                    last = Some(p.percent());
                    info!("{}% complete ({}/{})", p.percent(), p.processed, p.total);
                }
            })
            .context("Processing error")?;
            fs::write(&output, &mapped.bytes)
                .with_context(|| format!("Error saving file {}", output.display()))?;
            println!(
                "Processing complete, {} labels mapped, saved as {}",
                mapped.progress.processed,
                output.display()
            );
        },
        Commands::Classify { names, patterns } => {
            let classifier = load_classifier(patterns.as_ref())?;
            for name in names {
                println!("{}\t{}", name, classifier.classify(&name));
            }
        },
    }
    Ok(())
}
