//
// cli.rs
// Perphix-Deid
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::case_id::CaseId;
use crate::deidentify::{self, DeidentifyOptions, NamingScheme};
use crate::logging::{self, Verbosity};
use crate::models::DeidentifySummary;
use crate::{annotations, discovery, metadata, validate};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Debug, Parser)]
#[command(name = "perphix-deid", version)]
#[command(about = "De-identify surgical X-ray/CT DICOM exports", long_about = None)]
pub struct Cli {
    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// De-identify every DICOM file below a directory
    Deidentify {
        input_dir: PathBuf,
        output_dir: PathBuf,
        /// Case number written to PatientID; a random six digit one is generated when omitted
        #[arg(short, long)]
        case: Option<CaseId>,
        #[arg(long, value_enum, default_value_t = Naming::Preserve)]
        naming: Naming,
        #[arg(long)]
        json: bool,
    },
    /// De-identify a single DICOM file
    DeidentifyFile {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        case: CaseId,
    },
    /// List the DICOM files found below a directory
    List { directory: PathBuf },
    /// Show the de-identified fields and pixel fingerprint of a file
    Info {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Check de-identified output against the policy
    Verify {
        directory: PathBuf,
        #[arg(short, long)]
        case: CaseId,
        /// Original tree to compare untouched elements and pixel data against
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write an empty annotation document with the dataset categories
    BaseAnnotation {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Transform a COCO-style annotation document
    Annotations {
        #[arg(value_enum)]
        action: AnnotationAction,
        input: PathBuf,
        /// Destination file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum AnnotationAction {
    /// Rebuild sequences from the phase labels in image file names
    FixSequences,
    /// Keep only pelvis instances and the pelvis category
    PelvisOnly,
    /// Drop keypoints from every instance
    StripKeypoints,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Naming {
    /// Keep source file names
    Preserve,
    /// Name files <case>_<NNNN>.dcm
    Case,
}

impl From<Naming> for NamingScheme {
    fn from(value: Naming) -> Self {
        match value {
            Naming::Preserve => NamingScheme::Preserve,
            Naming::Case => NamingScheme::Case,
        }
    }
}

pub fn run() -> Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    logging::init_logging(Verbosity::from_flags(cli.quiet, cli.verbose));
    execute(cli.command)
}

pub fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Deidentify {
            input_dir,
            output_dir,
            case,
            naming,
            json,
        } => {
            let case_id = case.unwrap_or_else(|| {
                let generated = CaseId::generate();
                info!(case = %generated, "no case number given, generated one");
                generated
            });
            let options = DeidentifyOptions::new(case_id).with_naming(naming.into());
            let summary = deidentify::deidentify_dir(&input_dir, &output_dir, &options)
                .with_context(|| format!("De-identification of {} failed", input_dir.display()))?;
            print_summary(&summary, json)?;
        }
        Commands::DeidentifyFile {
            input,
            output,
            case,
        } => {
            deidentify::deidentify_file(&input, &output, &case)
                .with_context(|| format!("De-identification of {} failed", input.display()))?;
            println!("De-identified file saved to {}", output.display());
        }
        Commands::List { directory } => {
            let found = discovery::find_dicom_files(&directory)?;
            for source in &found.sources {
                println!("{}", source.path.display());
            }
            info!(
                files = found.sources.len(),
                skipped = found.skipped,
                "listing finished"
            );
        }
        Commands::Info { file, json } => metadata::print_info(&file, json)?,
        Commands::Verify {
            directory,
            case,
            source,
            json,
        } => validate::check_dir(&directory, &case, source.as_deref(), json)?,
        Commands::BaseAnnotation { output } => {
            annotations::write_annotation(&annotations::base_annotation(), output.as_deref())?
        }
        Commands::Annotations {
            action,
            input,
            output,
        } => {
            let doc = annotations::read_annotation(&input)?;
            let transformed = match action {
                AnnotationAction::FixSequences => annotations::fix_sequences(&doc),
                AnnotationAction::PelvisOnly => annotations::pelvis_only(&doc),
                AnnotationAction::StripKeypoints => annotations::remove_keypoints(&doc),
            }
            .with_context(|| format!("Failed to transform {}", input.display()))?;
            annotations::write_annotation(&transformed, output.as_deref())?;
        }
    }

    Ok(())
}

fn print_summary(summary: &DeidentifySummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Case number: {}", summary.case_id);
    for record in &summary.outputs {
        println!(
            "  {} -> {}",
            record.source.display(),
            record.destination.display()
        );
    }
    println!(
        "{} file(s) written, {} non-DICOM file(s) skipped",
        summary.files_written, summary.files_skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_deidentify_with_case() {
        let cli = Cli::try_parse_from([
            "perphix-deid",
            "-v",
            "deidentify",
            "raw",
            "out",
            "--case",
            "004217",
            "--naming",
            "case",
        ])
        .expect("parse");

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Deidentify {
                input_dir,
                output_dir,
                case,
                naming,
                json,
            } => {
                assert_eq!(input_dir, PathBuf::from("raw"));
                assert_eq!(output_dir, PathBuf::from("out"));
                assert_eq!(case.as_ref().map(CaseId::as_str), Some("004217"));
                assert_eq!(naming, Naming::Case);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn case_is_optional_for_directories() {
        let cli = Cli::try_parse_from(["perphix-deid", "deidentify", "raw", "out"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Deidentify {
                case: None,
                naming: Naming::Preserve,
                ..
            }
        ));
    }

    #[test]
    fn invalid_case_number_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from([
            "perphix-deid",
            "deidentify-file",
            "in.dcm",
            "out.dcm",
            "--case",
            "Doe^John",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_annotation_actions() {
        let cli = Cli::try_parse_from([
            "perphix-deid",
            "annotations",
            "fix-sequences",
            "train.json",
            "-o",
            "fixed.json",
        ])
        .expect("parse");
        match cli.command {
            Commands::Annotations {
                action,
                input,
                output,
            } => {
                assert_eq!(action, AnnotationAction::FixSequences);
                assert_eq!(input, PathBuf::from("train.json"));
                assert_eq!(output, Some(PathBuf::from("fixed.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let result = Cli::try_parse_from(["perphix-deid", "annotations", "shuffle", "train.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn annotations_verb_writes_transformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("train.json");
        let output = dir.path().join("pelvis.json");
        execute(Commands::BaseAnnotation {
            output: Some(input.clone()),
        })
        .unwrap();

        execute(Commands::Annotations {
            action: AnnotationAction::PelvisOnly,
            input,
            output: Some(output.clone()),
        })
        .unwrap();

        let doc = annotations::read_annotation(&output).unwrap();
        assert_eq!(doc["categories"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["perphix-deid", "-q", "-v", "list", "raw"]);
        assert!(result.is_err());
    }
}
