//! Command-line interface for the metadata scrubber
//!
//! Two subcommands: `scrub` applies the sanitizers, `verify` reports what a
//! scrubber would have removed without touching anything.

use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use mdscrub::{
    OutputMode, Pipeline, RunOptions, RunReport, ScrubOptions, ScrubStatus, VerifyOptions,
    VerifyStatus,
};
use tracing::error;

fn main() {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("scrub", sub)) => {
            init_logging(sub.get_one::<String>("verbose").map(String::as_str));
            run_scrub(sub);
        }
        Some(("verify", sub)) => {
            init_logging(sub.get_one::<String>("verbose").map(String::as_str));
            run_verify(sub);
        }
        _ => unreachable!("subcommand required"),
    }
}

fn build_cli() -> Command {
    Command::new("mdscrub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Strips identity-revealing metadata from documents, images and media files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("scrub")
                .about("Write sanitized copies of files, or sanitize them in place")
                .arg(
                    Arg::new("paths")
                        .value_name("PATH")
                        .num_args(1..)
                        .required(true)
                        .help("Files or directories to scrub"),
                )
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .value_name("DIR")
                        .help("Output directory (copy mode; default: ./scrubbed)")
                        .conflicts_with("in-place"),
                )
                .arg(
                    Arg::new("in-place")
                        .long("in-place")
                        .action(ArgAction::SetTrue)
                        .help("Modify files in place"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Show what would happen without writing anything"),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite existing output and backup files"),
                )
                .arg(
                    Arg::new("copy-unknown")
                        .long("copy-unknown")
                        .action(ArgAction::SetTrue)
                        .help("Copy unsupported file types as-is (no scrubbing)"),
                )
                .arg(
                    Arg::new("no-recursive")
                        .long("no-recursive")
                        .action(ArgAction::SetTrue)
                        .help("Do not traverse directories"),
                )
                .arg(
                    Arg::new("no-preserve-times")
                        .long("no-preserve-times")
                        .action(ArgAction::SetTrue)
                        .help("Do not copy source timestamps onto outputs"),
                )
                .arg(
                    Arg::new("no-preserve-perms")
                        .long("no-preserve-perms")
                        .action(ArgAction::SetTrue)
                        .help("Do not copy source permission bits onto outputs"),
                )
                .arg(
                    Arg::new("no-strip-xattrs")
                        .long("no-strip-xattrs")
                        .action(ArgAction::SetTrue)
                        .help("Leave extended attributes on outputs"),
                )
                .arg(
                    Arg::new("no-normalize-zip-timestamps")
                        .long("no-normalize-zip-timestamps")
                        .action(ArgAction::SetTrue)
                        .help("Keep original entry timestamps inside Office packages"),
                )
                .arg(
                    Arg::new("pdf-aggressive")
                        .long("pdf-aggressive")
                        .action(ArgAction::SetTrue)
                        .help("Also remove PDF forms, outlines, annotations and actions"),
                )
                .arg(
                    Arg::new("backup-suffix")
                        .long("backup-suffix")
                        .value_name("SUFFIX")
                        .default_value(".bak")
                        .help("Backup suffix for in-place mode (empty disables backups)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run report as JSON"),
                )
                .arg(verbose_arg()),
        )
        .subcommand(
            Command::new("verify")
                .about("Report metadata still present, without modifying anything")
                .arg(
                    Arg::new("paths")
                        .value_name("PATH")
                        .num_args(1..)
                        .required(true)
                        .help("Files or directories to verify"),
                )
                .arg(
                    Arg::new("no-recursive")
                        .long("no-recursive")
                        .action(ArgAction::SetTrue)
                        .help("Do not traverse directories"),
                )
                .arg(
                    Arg::new("fail-on-metadata")
                        .long("fail-on-metadata")
                        .action(ArgAction::SetTrue)
                        .help("Exit non-zero if any metadata is found"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print results as JSON"),
                )
                .arg(verbose_arg()),
        )
}

fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .value_name("LEVEL")
        .value_parser(["error", "warn", "info", "debug", "trace"])
        .default_value("warn")
        .help("Set logging verbosity")
}

fn init_logging(level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = level.unwrap_or("warn");
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!("mdscrub={level}")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_scrub(matches: &ArgMatches) {
    let paths: Vec<PathBuf> = matches
        .get_many::<String>("paths")
        .unwrap()
        .map(PathBuf::from)
        .collect();

    let in_place = matches.get_flag("in-place");
    let output = if in_place {
        OutputMode::InPlace
    } else {
        OutputMode::Copy {
            out_dir: matches
                .get_one::<String>("out")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("scrubbed")),
        }
    };

    let options = RunOptions {
        output,
        dry_run: matches.get_flag("dry-run"),
        overwrite: matches.get_flag("overwrite"),
        copy_unknown: matches.get_flag("copy-unknown"),
        recursive: !matches.get_flag("no-recursive"),
        preserve_times: !matches.get_flag("no-preserve-times"),
        preserve_perms: !matches.get_flag("no-preserve-perms"),
        strip_xattrs: !matches.get_flag("no-strip-xattrs"),
        backup_suffix: matches
            .get_one::<String>("backup-suffix")
            .cloned()
            .unwrap_or_default(),
        scrub: ScrubOptions {
            normalize_zip_timestamps: !matches.get_flag("no-normalize-zip-timestamps"),
            pdf_aggressive: matches.get_flag("pdf-aggressive"),
        },
    };

    let pipeline = Pipeline::new(options);
    let outcomes = match pipeline.run(&paths) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            error!("discovery failed: {err}");
            process::exit(2);
        }
    };

    let report = RunReport::from_outcomes(&outcomes);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
    } else {
        print_scrub_report(&report);
    }

    if report.has_errors() {
        process::exit(1);
    }
}

fn print_scrub_report(report: &RunReport) {
    println!("{:<22} {:>7}", "status", "count");
    println!("{:-<22} {:->7}", "", "");
    for status in ScrubStatus::ALL {
        let count = report.count(status);
        if count > 0 {
            println!("{:<22} {:>7}", status.as_str(), count);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!(
            "errors (first {} of {}):",
            report.errors.len(),
            report.total_errors
        );
        for record in &report.errors {
            println!(
                "  {}  [{}]  {}",
                record.src.display(),
                record.scrubber.as_deref().unwrap_or("-"),
                record.message
            );
        }
    }
}

fn run_verify(matches: &ArgMatches) {
    let paths: Vec<PathBuf> = matches
        .get_many::<String>("paths")
        .unwrap()
        .map(PathBuf::from)
        .collect();

    let options = VerifyOptions {
        recursive: !matches.get_flag("no-recursive"),
    };

    let results = match mdscrub::verify_paths(&paths, options) {
        Ok(results) => results,
        Err(err) => {
            error!("discovery failed: {err}");
            process::exit(2);
        }
    };

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&results).expect("results serialize"));
    } else {
        print_verify_results(&results);
    }

    let has_errors = results.iter().any(|r| r.status == VerifyStatus::Error);
    let has_metadata = results
        .iter()
        .any(|r| r.status == VerifyStatus::MetadataFound);

    if has_errors {
        process::exit(2);
    }
    if matches.get_flag("fail-on-metadata") && has_metadata {
        process::exit(1);
    }
}

fn print_verify_results(results: &[mdscrub::VerifyResult]) {
    let statuses = [
        VerifyStatus::Clean,
        VerifyStatus::MetadataFound,
        VerifyStatus::Unsupported,
        VerifyStatus::Error,
    ];

    println!("{:<18} {:>7}", "status", "count");
    println!("{:-<18} {:->7}", "", "");
    for status in statuses {
        let count = results.iter().filter(|r| r.status == status).count();
        if count > 0 {
            println!("{:<18} {:>7}", status.as_str(), count);
        }
    }

    let findings: Vec<_> = results
        .iter()
        .filter(|r| matches!(r.status, VerifyStatus::MetadataFound | VerifyStatus::Error))
        .collect();
    if !findings.is_empty() {
        println!();
        println!("findings (first {}):", findings.len().min(200));
        for result in findings.iter().take(200) {
            println!(
                "  {}  [{}]  {}",
                result.path.display(),
                result.kind.unwrap_or("-"),
                summarize(result)
            );
        }
    }
}

fn summarize(result: &mdscrub::VerifyResult) -> String {
    if result.status == VerifyStatus::Error {
        return result.message.clone().unwrap_or_default();
    }

    let count = |key: &str| {
        result
            .details
            .get(key)
            .and_then(|v| v.as_array().map(|a| a.len() as u64).or_else(|| v.as_u64()))
            .unwrap_or(0)
    };

    match result.kind {
        Some("pdf") => format!(
            "docinfo_keys={} root_md={} pieceinfo_pages={} annots_pages={}",
            count("docinfo_keys"),
            result
                .details
                .get("has_root_metadata")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            count("page_pieceinfo_count"),
            count("page_annots_count"),
        ),
        Some("openxml") => format!(
            "docprops={} non_normalized_zip_timestamps={}",
            count("docprops_present"),
            count("non_normalized_zip_timestamps"),
        ),
        _ => String::new(),
    }
}
