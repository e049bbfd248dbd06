//! CLI entry point for `readshelf`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Local};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use readshelf::config::Config;
use readshelf::search::{self, sql, CompileOptions};
use readshelf::service::{
    BulkAction, BulkRequest, LibraryService, SearchRequest, SearchResponse, SearchSettings,
    SortBy, SortOrder, SortParams,
};
use readshelf::store::memory::MemoryStore;
use readshelf::store::{Filter, ItemStore, SelectQuery};

#[derive(Parser)]
#[command(name = "readshelf", version, about = "Search and bulk-edit a read-it-later library")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print the SQL it becomes
    Compile {
        query: String,
        /// Scope `in:<folder>` to the folder
        #[arg(long)]
        use_folders: bool,
        #[arg(long)]
        json: bool,
    },
    /// Search a library snapshot
    Search {
        /// Library snapshot (JSON)
        library: PathBuf,
        query: String,
        /// Owner whose items are searched
        #[arg(short, long)]
        user: String,
        /// Page size
        #[arg(long)]
        first: Option<usize>,
        /// Cursor from a previous page
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        include_deleted: bool,
        #[arg(long)]
        include_pending: bool,
        #[arg(long)]
        use_folders: bool,
        /// Also count every match
        #[arg(long)]
        total: bool,
        /// Default sort column
        #[arg(long, value_enum)]
        sort_by: Option<SortKey>,
        /// Default sort direction
        #[arg(long, value_enum)]
        order: Option<Direction>,
        #[arg(long)]
        json: bool,
    },
    /// Apply an action to every matching item and save the snapshot
    Bulk {
        /// Library snapshot (JSON)
        library: PathBuf,
        query: String,
        #[arg(short, long)]
        user: String,
        #[arg(short, long, value_enum)]
        action: ActionKind,
        /// Target folder for `move`
        #[arg(long, required_if_eq("action", "move"))]
        folder: Option<String>,
        /// Label id for `add-labels` (repeatable)
        #[arg(long = "label", value_name = "ID", required_if_eq("action", "add-labels"))]
        labels: Vec<String>,
        #[arg(long)]
        use_folders: bool,
        /// Print the statements instead of applying them
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Updated,
    Saved,
    Published,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActionKind {
    Archive,
    Delete,
    MarkRead,
    Move,
    AddLabels,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = readshelf::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Compile {
            query,
            use_folders,
            json,
        } => cmd_compile(&config, &query, use_folders, json),
        Commands::Search {
            library,
            query,
            user,
            first,
            after,
            include_deleted,
            include_pending,
            use_folders,
            total,
            sort_by,
            order,
            json,
        } => {
            let sort = sort_params(&config, sort_by, order);
            let request = SearchRequest {
                user_id: user,
                query,
                first,
                after,
                use_folders,
                include_deleted,
                include_pending,
                include_total: total,
                sort,
            };
            cmd_search(&config, &library, &request, json)
        }
        Commands::Bulk {
            library,
            query,
            user,
            action,
            folder,
            labels,
            use_folders,
            dry_run,
            json,
        } => {
            let action = match action {
                ActionKind::Archive => BulkAction::Archive,
                ActionKind::Delete => BulkAction::Delete,
                ActionKind::MarkRead => BulkAction::MarkAsRead,
                ActionKind::Move => BulkAction::MoveToFolder {
                    folder: folder.context("--folder is required for move")?,
                },
                ActionKind::AddLabels => BulkAction::AddLabels { label_ids: labels },
            };
            let request = BulkRequest {
                user_id: user,
                query,
                action,
                use_folders,
            };
            cmd_bulk(&config, &library, &request, dry_run, json)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = readshelf::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "readshelf.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

fn service(config: &Config, library: &Path) -> anyhow::Result<LibraryService<MemoryStore>> {
    let store = MemoryStore::open(library)
        .with_context(|| format!("could not open library {}", library.display()))?;
    Ok(LibraryService::with_settings(
        store,
        SearchSettings::from(&config.search),
    ))
}

fn sort_params(
    config: &Config,
    by: Option<SortKey>,
    order: Option<Direction>,
) -> Option<SortParams> {
    if by.is_none() && order.is_none() {
        return None;
    }
    let defaults = config.search.sort_params();
    Some(SortParams {
        by: match by {
            Some(SortKey::Updated) => SortBy::UpdatedTime,
            Some(SortKey::Saved) => SortBy::SavedAt,
            Some(SortKey::Published) => SortBy::PublishedAt,
            None => defaults.by,
        },
        order: match order {
            Some(Direction::Asc) => SortOrder::Ascending,
            Some(Direction::Desc) => SortOrder::Descending,
            None => defaults.order,
        },
    })
}

/// Compile a query and print the resulting SQL pieces.
fn cmd_compile(config: &Config, query: &str, use_folders: bool, json: bool) -> anyhow::Result<()> {
    let options = CompileOptions::new(local_now())
        .with_folders(use_folders)
        .with_week_start(config.search.week_start());
    let compiled = search::compile(query, &options)?;

    let filter = Filter {
        predicate: compiled.predicate,
        parameters: compiled.parameters,
    };
    let projections: Vec<String> = compiled.extra_columns.iter().map(sql::projection).collect();
    let where_clause = sql::where_clause(&filter);
    let order_by = sql::order_by(&compiled.sort);

    if json {
        let mut params = serde_json::Map::new();
        for param in filter.parameters.iter() {
            params.insert(param.name.clone(), serde_json::to_value(&param.value)?);
        }
        let output = serde_json::json!({
            "where": where_clause,
            "parameters": params,
            "extra_columns": projections,
            "order_by": order_by,
            "sort": compiled.sort,
            "trash": compiled.trash,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    if where_clause.is_empty() {
        println!("  (no filter)");
    } else {
        println!("  {where_clause}");
    }
    for projection in &projections {
        println!("  SELECT {projection}");
    }
    if !order_by.is_empty() {
        println!("  {order_by}");
    }
    if !filter.parameters.is_empty() {
        println!();
        for param in filter.parameters.iter() {
            println!(
                "    :{:<24} {}",
                param.name,
                serde_json::to_string(&param.value)?
            );
        }
    }
    println!();
    Ok(())
}

/// Run one search page against a snapshot.
fn cmd_search(
    config: &Config,
    library: &Path,
    request: &SearchRequest,
    json: bool,
) -> anyhow::Result<()> {
    let service = service(config, library)?;
    let response = service.search(request, local_now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_search_results_table(&response);
    }
    Ok(())
}

/// Apply a bulk action and save the snapshot back.
fn cmd_bulk(
    config: &Config,
    library: &Path,
    request: &BulkRequest,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let service = service(config, library)?;
    let now = local_now();

    if dry_run {
        let filter = service.bulk_filter(request, now)?;
        let statement = match request.action.changes(now.with_timezone(&chrono::Utc)) {
            Some(changes) => sql::update(&filter, &changes),
            None => sql::select(&SelectQuery {
                filter: filter.clone(),
                extra_columns: Vec::new(),
                sort: Vec::new(),
                offset: 0,
                limit: readshelf::service::MAX_PAGE_SIZE,
            }),
        };
        let matched = service.store().count(&filter)?;
        println!("{statement}");
        println!("-- {matched} item(s) would be affected");
        return Ok(());
    }

    let response = service.bulk(request, now)?;
    service.store().save(library)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!(
            "  {}: {} matched, {} changed",
            request.action.name(),
            response.matched,
            response.affected
        );
    }
    Ok(())
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "readshelf", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

const TITLE_WIDTH: usize = 48;
const FOLDER_WIDTH: usize = 12;

fn print_search_results_table(response: &SearchResponse) {
    println!();
    match response.total_count {
        Some(total) => println!("  {} of {} result(s)", response.items.len(), total),
        None => println!("  {} result(s)", response.items.len()),
    }
    println!();

    if response.items.is_empty() {
        return;
    }

    println!(
        "  {:<4} {:<16} {} {} {:>6}",
        "#",
        "Saved",
        pad("Title", TITLE_WIDTH),
        pad("Folder", FOLDER_WIDTH),
        "Read"
    );
    println!("  {}", "-".repeat(4 + 16 + TITLE_WIDTH + FOLDER_WIDTH + 6 + 4));

    for (i, row) in response.items.iter().enumerate() {
        let item = &row.item;
        println!(
            "  {:<4} {:<16} {} {} {:>5.0}%",
            i + 1,
            item.saved_at.format("%Y-%m-%d %H:%M"),
            pad(&truncate(&item.title, TITLE_WIDTH), TITLE_WIDTH),
            pad(&truncate(&item.folder, FOLDER_WIDTH), FOLDER_WIDTH),
            item.reading_progress_bottom_percent
        );
    }

    if let Some(cursor) = &response.next_cursor {
        println!();
        println!("  more: --after {cursor}");
    }
    println!();
}

/// Cut `s` to at most `width` terminal columns, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Left-align `s` in `width` terminal columns.
fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(s.width());
    format!("{s}{}", " ".repeat(fill))
}
