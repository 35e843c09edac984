// Entry point and CLI flow.
//
// - `views` lists the view catalog.
// - `summary` loads the source and prints what the cleaning pass did.
// - `show <view>` computes one view, optionally exporting it.
// - With no subcommand, an interactive menu loads the file once and lets
//   the user generate views until they choose to exit.
use clap::{Args, Parser, Subcommand};
use estate_report::config::Config;
use estate_report::dataset::{self, Dataset};
use estate_report::output;
use estate_report::types::{AssetType, WarningCountRow, YearQuarter};
use estate_report::util::format_int;
use estate_report::views::{self, ViewFilters};
use estate_report::{QuarterRange, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "estate_report", version, about = "Real-estate project views from a spreadsheet")]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Source spreadsheet (.xlsx, .xls, .ods, .csv)
    #[arg(long, short, global = true)]
    input: Option<PathBuf>,

    /// Workbook sheet name
    #[arg(long, global = true)]
    sheet: Option<String>,

    /// Lines above the header line
    #[arg(long, global = true)]
    header_row: Option<usize>,

    /// Keep projects launched before the configured cutoff
    #[arg(long, global = true)]
    all_launches: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available views
    Views,
    /// Load the source and report on the cleaning pass
    Summary,
    /// Compute one view
    Show(ShowArgs),
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// View id (see `views`)
    view: String,

    #[arg(long = "area")]
    areas: Vec<String>,

    #[arg(long = "developer")]
    developers: Vec<String>,

    #[arg(long = "asset-type")]
    asset_types: Vec<String>,

    /// First launch quarter, e.g. "2023 Q1"
    #[arg(long)]
    from: Option<String>,

    /// Last launch quarter, e.g. "2024 Q2"
    #[arg(long)]
    to: Option<String>,

    #[arg(long)]
    csv: Option<PathBuf>,

    #[arg(long)]
    json: Option<PathBuf>,

    /// Rows shown in the terminal preview
    #[arg(long, default_value_t = 20)]
    rows: usize,
}

impl ShowArgs {
    fn filters(&self) -> Result<ViewFilters> {
        let asset_types = self
            .asset_types
            .iter()
            .map(|s| s.parse::<AssetType>())
            .collect::<Result<Vec<_>>>()?;
        let from = self.from.as_deref().map(str::parse::<YearQuarter>).transpose()?;
        let to = self.to.as_deref().map(str::parse::<YearQuarter>).transpose()?;
        Ok(ViewFilters {
            areas: self.areas.clone(),
            developers: self.developers.clone(),
            asset_types,
            quarters: QuarterRange { from, to },
        })
    }
}

fn build_config(args: &SourceArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(input) = &args.input {
        config.source.path = Some(input.clone());
    }
    if let Some(sheet) = &args.sheet {
        config.source.sheet = Some(sheet.clone());
    }
    if let Some(header_row) = args.header_row {
        config.source.header_row = header_row;
    }
    if args.all_launches {
        config.pipeline.launch_after = None;
    }
    Ok(config)
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the view selection menu.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to View Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn print_load_summary(data: &Dataset) {
    let report = data.report();
    println!(
        "Processing dataset... ({} rows loaded, {} kept, {} dropped)",
        format_int(report.total_rows),
        format_int(report.kept_rows),
        format_int(report.dropped_rows)
    );
    match data.settings().launch_after {
        Some(cutoff) => println!(
            "{} projects launched after {}.",
            format_int(data.in_scope().len()),
            cutoff
        ),
        None => println!("No launch cutoff applied."),
    }
    let counts: Vec<WarningCountRow> = report
        .counts_by_kind()
        .into_iter()
        .map(|(kind, count)| WarningCountRow {
            kind: format!("{:?}", kind),
            count: format_int(count),
        })
        .collect();
    if !counts.is_empty() {
        println!("Note: some values could not be parsed and were left empty.");
        output::preview_table_rows(&counts, counts.len());
    }
    println!();
}

/// Handle option [1]: load and clean the source file once.
fn handle_load(config: &Config) {
    if dataset::is_loaded() {
        println!("Dataset already loaded.\n");
        return;
    }
    match Dataset::load(config).and_then(dataset::init) {
        Ok(data) => print_load_summary(data),
        Err(e) => eprintln!("Failed to load file: {}\n", e),
    }
}

/// Handle option [2]: pick a view from the catalog and preview it.
fn handle_generate_view() {
    let Ok(data) = dataset::get() else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return;
    };
    let catalog = views::catalog_rows();
    output::preview_table_rows(&catalog, catalog.len());
    let choice = read_choice();
    let id = match choice.parse::<usize>() {
        Ok(n) if (1..=catalog.len()).contains(&n) => catalog[n - 1].id.clone(),
        _ => choice,
    };
    println!();
    match data.query(&id, &ViewFilters::default()) {
        Ok(out) => output::preview_view(&out, 20),
        Err(e) => eprintln!("{}\n", e),
    }
}

fn interactive(config: &Config) {
    loop {
        println!("Select an option:");
        println!("[1] Load the file");
        println!("[2] Generate Views\n");
        match read_choice().as_str() {
            "1" => {
                handle_load(config);
            }
            "2" => {
                println!();
                handle_generate_view();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}

fn show(config: &Config, args: &ShowArgs) -> Result<()> {
    let filters = args.filters()?;
    let data = dataset::init(Dataset::load(config)?)?;
    let out = data.query(&args.view, &filters)?;
    output::preview_view(&out, args.rows);
    let (csv, json) = (args.csv.as_deref(), args.json.as_deref());
    if csv.is_none() && json.is_none() {
        return Ok(());
    }
    if !output::export_view(&out, csv, json)? {
        println!("(Nothing exported: the view has no data.)");
        return Ok(());
    }
    if let Some(path) = csv {
        println!("(Full table exported to {})", path.display());
    }
    if let Some(path) = json {
        println!("(JSON exported to {})", path.display());
    }
    Ok(())
}

fn summary(config: &Config) -> Result<()> {
    let data = dataset::init(Dataset::load(config)?)?;
    print_load_summary(data);
    let quarters: Vec<String> = data.quarters().iter().map(|q| q.to_string()).collect();
    println!("Quarters: {}", quarters.join(", "));
    println!("Areas: {}", data.areas().join(", "));
    println!("Developers: {}", format_int(data.developers().len()));
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli.source)?;
    match cli.command {
        None => {
            interactive(&config);
            Ok(())
        }
        Some(Command::Views) => {
            let rows = views::catalog_rows();
            output::preview_table_rows(&rows, rows.len());
            Ok(())
        }
        Some(Command::Summary) => summary(&config),
        Some(Command::Show(args)) => show(&config, &args),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("estate_report=info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
