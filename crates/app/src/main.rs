mod play;

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use quiz_core::model::{CategoryPolicy, QuestionOrder, SelectionCriteria};
use services::{Clock, QuestionBankService, SessionError, SessionLoopService};
use storage::repository::{QuestionRecord, Storage};
use tracing_subscriber::EnvFilter;

use play::PlayEnd;

/// Relative to the working directory; resolved to an absolute URL at startup.
const DEFAULT_DB_URL: &str = "sqlite:quiz.sqlite3";
const DEFAULT_LIMIT: u32 = 10;
const DEFAULT_LOG_FILTER: &str = "warn,services=info,app=info";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidOrder { raw: String },
    ConflictingCategories,
    MissingSheet,
    MissingFile,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidOrder { raw } => {
                write!(f, "invalid --order value: {raw} (use sequential or random)")
            }
            ArgsError::ConflictingCategories => {
                write!(f, "--all-categories cannot be combined with --category")
            }
            ArgsError::MissingSheet => write!(f, "--sheet (or QUIZ_SHEET) is required"),
            ArgsError::MissingFile => write!(f, "import requires a JSON file path"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play       [--sheet <name>] [--category <name>]... [--all-categories]");
    eprintln!("                                 [--limit <n>] [--order sequential|random] [--seed <u64>]");
    eprintln!("                                 [--require-categories] [--json] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- sheets     [--json] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- categories --sheet <name> [--json] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- import     <file.json> [--sheet <name>] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- progress   --sheet <name> [--json] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- reset      [--sheet <name>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --limit {DEFAULT_LIMIT}");
    eprintln!("  --order sequential");
    eprintln!();
    eprintln!("import fills rows without a sheet from --sheet.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_SHEET, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Sheets,
    Categories,
    Import,
    Progress,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "sheets" => Some(Self::Sheets),
            "categories" => Some(Self::Categories),
            "import" => Some(Self::Import),
            "progress" => Some(Self::Progress),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Values read from the environment before flags are applied.
#[derive(Debug, Default)]
struct EnvDefaults {
    db_url: Option<String>,
    sheet: Option<String>,
}

impl EnvDefaults {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("QUIZ_DB_URL").ok(),
            sheet: std::env::var("QUIZ_SHEET").ok(),
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    sheet: Option<String>,
    categories: Vec<String>,
    all_categories: bool,
    limit: u32,
    order: QuestionOrder,
    seed: Option<u64>,
    require_categories: bool,
    json: bool,
    file: Option<PathBuf>,
}

impl Args {
    fn parse(
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
        env: EnvDefaults,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: env
                .db_url
                .filter(|value| !value.trim().is_empty())
                .map_or_else(|| normalize_sqlite_url(DEFAULT_DB_URL.into()), normalize_sqlite_url),
            sheet: env.sheet.filter(|value| !value.trim().is_empty()),
            categories: Vec::new(),
            all_categories: false,
            limit: DEFAULT_LIMIT,
            order: QuestionOrder::default(),
            seed: None,
            require_categories: false,
            json: false,
            file: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--sheet" => {
                    let value = require_value(args, "--sheet")?;
                    parsed.sheet = Some(value.trim().to_owned()).filter(|s| !s.is_empty());
                }
                "--category" => {
                    let value = require_value(args, "--category")?;
                    parsed.categories.push(value);
                }
                "--all-categories" => parsed.all_categories = true,
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value.trim().parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--limit",
                        raw: value.clone(),
                    })?;
                }
                "--order" => {
                    let value = require_value(args, "--order")?;
                    parsed.order = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidOrder { raw: value.clone() })?;
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    let seed = value.trim().parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--seed",
                        raw: value.clone(),
                    })?;
                    parsed.seed = Some(seed);
                }
                "--require-categories" => parsed.require_categories = true,
                "--json" => parsed.json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if cmd == Command::Import && parsed.file.is_none() && !arg.starts_with("--") => {
                    parsed.file = Some(PathBuf::from(arg));
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if parsed.all_categories && !parsed.categories.is_empty() {
            return Err(ArgsError::ConflictingCategories);
        }
        if cmd == Command::Import && parsed.file.is_none() {
            return Err(ArgsError::MissingFile);
        }
        Ok(parsed)
    }

    fn require_sheet(&self) -> Result<&str, ArgsError> {
        self.sheet.as_deref().ok_or(ArgsError::MissingSheet)
    }

    fn category_policy(&self) -> CategoryPolicy {
        if self.require_categories {
            CategoryPolicy::RequireExplicit
        } else {
            CategoryPolicy::EmptyMeansAll
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means play.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(cmd, &mut iter, EnvDefaults::from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup; core and services never see the URL.
    ensure_db_parent_dir(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    tracing::debug!(db = %parsed.db_url, ?cmd, "storage ready");
    let bank = QuestionBankService::new(
        Arc::clone(&storage.questions),
        Arc::clone(&storage.attempts),
    );

    match cmd {
        Command::Play => play_quiz(&parsed, &storage, &bank).await,
        Command::Sheets => {
            let sheets = bank.sheets().await?;
            print_list(&sheets, parsed.json)
        }
        Command::Categories => {
            let categories = bank.categories(parsed.require_sheet()?).await?;
            print_list(&categories, parsed.json)
        }
        Command::Import => import(&parsed, &bank).await,
        Command::Progress => {
            let sheet = parsed.require_sheet()?;
            let rows = bank.progress(sheet).await?;
            let mut out = io::stdout().lock();
            if parsed.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
            } else if rows.is_empty() {
                writeln!(out, "no attempts recorded for {sheet}")?;
            } else {
                for row in &rows {
                    writeln!(
                        out,
                        "{:<16} {}/{} ({:.0}%)",
                        row.category,
                        row.correct,
                        row.attempts,
                        row.accuracy() * 100.0
                    )?;
                }
            }
            Ok(())
        }
        Command::Reset => {
            let removed = bank.reset_progress(parsed.sheet.as_deref()).await?;
            println!("removed {removed} recorded attempts");
            Ok(())
        }
    }
}

async fn play_quiz(
    parsed: &Args,
    storage: &Storage,
    bank: &QuestionBankService,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();

    let sheet = match &parsed.sheet {
        Some(sheet) => sheet.clone(),
        None => {
            let sheets = bank.sheets().await?;
            play::choose_sheet(&sheets, &mut input, &mut out)?.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "no sheet selected; import questions first",
                )
            })?
        }
    };

    let categories = if parsed.all_categories {
        bank.categories(&sheet).await?
    } else {
        parsed.categories.clone()
    };
    let criteria =
        SelectionCriteria::new(sheet, parsed.limit, parsed.order).with_categories(categories);

    let service = SessionLoopService::new(Clock::system(), Arc::clone(&storage.questions))
        .with_reporter(Arc::clone(&storage.attempts))
        .with_category_policy(parsed.category_policy())
        .with_selection_seed(parsed.seed);

    let (mut session, report) = service.start_session(&criteria).await?;
    if !report.skipped_rows.is_empty() {
        eprintln!(
            "note: {} malformed question rows were skipped",
            report.skipped_rows.len()
        );
    }
    writeln!(
        out,
        "{}: {} of {} matching questions, {} order",
        criteria.sheet, report.selected, report.matching, criteria.order
    )?;

    loop {
        let end = play::play_session(&service, &mut session, &mut input, &mut out).await?;
        let summary = session.summary();
        if parsed.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        } else {
            play::render_summary(&mut out, &summary)?;
        }

        if end == PlayEnd::Quit || summary.missed().is_empty() {
            return Ok(());
        }
        let Some(selected) = play::prompt_retry(&mut input, &mut out, summary.missed())? else {
            return Ok(());
        };
        match service.start_retry(&session, &selected) {
            Ok(retry) => session = retry,
            Err(SessionError::EmptySelection | SessionError::EmptyRetrySelection) => {
                writeln!(out, "none of those questions were missed")?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn import(parsed: &Args, bank: &QuestionBankService) -> Result<(), Box<dyn std::error::Error>> {
    let path = parsed.file.as_ref().ok_or(ArgsError::MissingFile)?;
    let raw = std::fs::read_to_string(path)?;
    let mut records: Vec<QuestionRecord> = serde_json::from_str(&raw)?;
    if let Some(sheet) = &parsed.sheet {
        for record in records.iter_mut().filter(|r| r.sheet.trim().is_empty()) {
            record.sheet.clone_from(sheet);
        }
    }

    let report = bank.import(records).await?;
    println!(
        "imported {} questions, rejected {}",
        report.stored,
        report.rejected.len()
    );
    for row in &report.rejected {
        eprintln!("  row {}: {}", row.id, row.reason);
    }
    Ok(())
}

fn print_list(items: &[String], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(items)?)?;
    } else {
        for item in items {
            writeln!(out, "{item}")?;
        }
    }
    Ok(())
}

/// Create the database's parent directory; `SQLite` creates the file itself.
fn ensure_db_parent_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
