use anyhow::{Context, Result};
use chrono::Local;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use mentor_importer::export::{self, ExportFilter, ExportFormat};
use mentor_importer::locator::LocateMethod;
use mentor_importer::{
    find_duplicates, open_store, Category, Classification, Config, DuplicateReport, ImportClassifier, ImportReport,
    MentorStore,
};

const REPORT_FILE: &str = "import_report.json";
const CANDIDATES_FILE: &str = "import_candidates.csv";

fn cli() -> Command {
    Command::new("mentor-importer")
        .version("1.0")
        .about("Imports survey exports into the alumni mentor directory")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log locator decisions and store calls")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("import")
                .about("Classify a survey CSV against the directory and submit the new mentors")
                .arg(Arg::new("file").value_name("FILE").help("Survey export (CSV)").required(true))
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Classify and write reports without submitting")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("duplicates")
                .about("List mentors whose names look duplicated")
                .arg(
                    Arg::new("delete-redundant")
                        .long("delete-redundant")
                        .help("Delete every exact duplicate except the first of each group")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("delete")
                        .long("delete")
                        .value_name("ID")
                        .help("Delete the given mentor ids")
                        .num_args(1..)
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export the directory")
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_parser(["csv", "json", "whatsapp"])
                        .default_value("csv"),
                )
                .arg(Arg::new("category").long("category").value_name("PTN|PTS|PTLN"))
                .arg(
                    Arg::new("angkatan")
                        .long("angkatan")
                        .value_name("YEAR")
                        .value_parser(clap::value_parser!(i32)),
                )
                .arg(Arg::new("university").long("university").value_name("NAME"))
                .arg(Arg::new("output").short('o').long("output").value_name("FILE")),
        )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mentor_importer=debug" } else { "mentor_importer=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file).with_context(|| format!("Failed to load {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please review {} (store mode, snapshot path), then run the program again.", config_file);
        return Ok(());
    };

    match matches.subcommand() {
        Some(("import", sub)) => run_import(&config, sub).await,
        Some(("duplicates", sub)) => run_duplicates(&config, sub).await,
        Some(("export", sub)) => run_export(&config, sub).await,
        _ => Ok(()),
    }
}

async fn run_import(config: &Config, args: &ArgMatches) -> Result<()> {
    let file = args.get_one::<String>("file").context("No input file given")?;
    let dry_run = args.get_flag("dry-run");

    let text = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;

    let store = open_store(config)?;
    println!("📂 Loading existing mentors...");
    let existing = store.fetch_all().await.context("Failed to load existing mentors")?;
    println!("   ✅ {} mentors in the directory", existing.len());

    println!("🔍 Classifying: {}", file);
    let classifier = ImportClassifier::new(&existing, &config.import);
    let report = classifier.classify_text(&text);

    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    fs::create_dir_all(output_dir)?;
    clean_output_directory(output_dir)?;

    generate_report_json(&report, output_dir)?;
    generate_candidates_csv(&report, output_dir)?;
    print_import_summary(&report);

    if dry_run {
        println!("\n🔎 Dry run: nothing was submitted");
        println!("📄 Reports written to: {}", output_dir);
        return Ok(());
    }

    let inputs = report.inputs();
    if inputs.is_empty() {
        println!("\nℹ️  No new mentors to import");
        return Ok(());
    }

    println!("\n⬆️  Submitting {} new mentors...", inputs.len());
    let inserted = store
        .insert_batch(&inputs)
        .await
        .context("Batch insert failed; no mentors were imported")?;
    println!("✅ Imported {} mentors", inserted.len());
    println!("📄 Reports written to: {}", output_dir);
    Ok(())
}

async fn run_duplicates(config: &Config, args: &ArgMatches) -> Result<()> {
    let store = open_store(config)?;
    let mentors = store.fetch_all().await.context("Failed to load mentors")?;
    println!("🔍 Checking {} mentors for duplicate names...", mentors.len());

    let report = find_duplicates(&mentors);
    print_duplicates(&report);

    let mut ids: Vec<i64> = args
        .get_many::<i64>("delete")
        .map(|values| values.copied().collect())
        .unwrap_or_default();
    if args.get_flag("delete-redundant") {
        ids.extend(report.redundant_ids());
    }
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Ok(());
    }

    println!("\n🗑️  Deleting {} mentors: {:?}", ids.len(), ids);
    let removed = store
        .delete_ids(&ids)
        .await
        .context("Delete failed; no mentors were removed")?;
    println!("✅ Deleted {} mentors", removed);
    Ok(())
}

async fn run_export(config: &Config, args: &ArgMatches) -> Result<()> {
    let format: ExportFormat = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("csv")
        .parse()?;

    let category = match args.get_one::<String>("category") {
        Some(raw) => Some(raw.parse::<Category>()?),
        None => None,
    };

    let filter = ExportFilter {
        category,
        angkatan: args.get_one::<i32>("angkatan").copied(),
        university: args.get_one::<String>("university").cloned(),
    };

    let output = match args.get_one::<String>("output") {
        Some(path) => PathBuf::from(path),
        None => {
            let output_dir = config.output_directory.as_deref().unwrap_or("output");
            fs::create_dir_all(output_dir)?;
            Path::new(output_dir).join(format.default_file_name(Local::now().date_naive()))
        }
    };

    let store = open_store(config)?;
    let mentors = store.fetch_all().await.context("Failed to load mentors")?;
    let selected = filter.apply(&mentors);
    println!("📦 Exporting {} of {} mentors...", selected.len(), mentors.len());

    let written = export::write_export(&selected, format, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("✅ Wrote {} entries to {}", written, output.display());
    Ok(())
}

fn generate_report_json(report: &ImportReport, output_dir: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    fs::write(Path::new(output_dir).join(REPORT_FILE), content)?;
    Ok(())
}

fn generate_candidates_csv(report: &ImportReport, output_dir: &str) -> Result<()> {
    use csv::Writer;

    let csv_path = Path::new(output_dir).join(CANDIDATES_FILE);
    let mut writer = Writer::from_path(csv_path)?;

    writer.write_record([
        "Row",
        "Classification",
        "Name",
        "University",
        "Major",
        "Path",
        "Category",
        "Angkatan",
        "WhatsApp",
        "Instagram",
        "Email",
        "Achievements",
        "Existing_ID",
        "Warnings",
        "Reasons",
    ])?;

    for candidate in &report.candidates {
        writer.write_record([
            candidate.row_number.to_string(),
            candidate.classification.to_string(),
            candidate.name.clone(),
            candidate.university.clone(),
            candidate.major.clone(),
            candidate.path.map(|p| p.to_string()).unwrap_or_default(),
            candidate.category.map(|c| c.to_string()).unwrap_or_default(),
            candidate.angkatan.to_string(),
            candidate.whatsapp.clone(),
            candidate.instagram.clone(),
            candidate.email.clone(),
            candidate.achievements.join("; "),
            candidate.existing.as_ref().map(|r| r.id.to_string()).unwrap_or_default(),
            candidate.warnings.join("; "),
            candidate.reasons.join("; "),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn print_import_summary(report: &ImportReport) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    println!("🧭 Column layout:");
    for decision in &report.layout {
        let marker = if decision.method == LocateMethod::NotFound { "❓" } else { "  " };
        println!("   {} {}", marker, decision);
    }

    println!("\n📄 Rows: {} total, {} skipped", report.total_rows, report.skipped_rows);
    println!("   🆕 New: {}", report.new_count());
    println!("   🔁 Already in directory: {}", report.existing_count());
    println!("   🚫 Invalid: {}", report.invalid_count());

    let needs_review: Vec<_> = report
        .with_classification(Classification::New)
        .filter(|c| !c.is_importable())
        .collect();
    if !needs_review.is_empty() {
        println!("\n⚠️  New but missing a university (not submitted):");
        for candidate in needs_review {
            println!("   - row {}: {}", candidate.row_number, candidate.name);
        }
    }

    let invalid: Vec<_> = report.with_classification(Classification::Invalid).collect();
    if !invalid.is_empty() {
        println!("\n🚫 Invalid rows:");
        for candidate in invalid {
            println!("   - row {}: {} ({})", candidate.row_number, candidate.name, candidate.reasons.join("; "));
        }
    }

    let warned = report
        .importable()
        .filter(|c| !c.warnings.is_empty())
        .count();
    if warned > 0 {
        println!("\n⚠️  {} importable rows have warnings, see {}", warned, CANDIDATES_FILE);
    }
}

fn print_duplicates(report: &DuplicateReport) {
    if report.is_empty() {
        println!("✅ No duplicate names found");
        return;
    }

    if !report.exact.is_empty() {
        println!("\n🔴 Exact duplicates ({} redundant records):", report.redundant_count());
        for group in &report.exact {
            println!("   {} ({} records)", group.key, group.mentors.len());
            for mentor in &group.mentors {
                println!("      #{} {} - {} ({})", mentor.id, mentor.name, mentor.university, mentor.angkatan);
            }
        }
    }

    if !report.similar.is_empty() {
        println!("\n🟡 Similar names:");
        for group in &report.similar {
            println!("   {} ({} records)", group.key, group.mentors.len());
            for mentor in &group.mentors {
                println!("      #{} {} - {} ({})", mentor.id, mentor.name, mentor.university, mentor.angkatan);
            }
        }
    }

    println!("\nℹ️  Review the groups, then re-run with --delete-redundant or --delete <ID>...");
}

// Clean up previous import reports from output directory
fn clean_output_directory(output_dir: &str) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !output_path.exists() {
        return Ok(());
    }

    for item in [REPORT_FILE, CANDIDATES_FILE] {
        let item_path = output_path.join(item);
        if item_path.is_file() {
            fs::remove_file(&item_path)?;
            println!("   🗑️  Removed previous: {}", item);
        }
    }

    Ok(())
}
