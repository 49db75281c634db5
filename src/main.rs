use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use vade::export::{export_to_path, ExportFormat};
use vade::query::parse_filter_arg;
use vade::report::{page_json, render_page, render_summary, TableOptions};
use vade::statistics::{causes_of_death, demographics};
use vade::{read_path, AppConfig, Args, ConfigManager, RecordId, Session, SortKey, APP_NAME};

fn init_tracing(level: &str, force: bool) {
    let filter = if force {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        let path = manager.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(Some(()));
    }
    Ok(None)
}

/// Load data and codebook, then apply the query given on the command line.
fn build_session(args: &Args, config: &AppConfig) -> Result<Session> {
    let path = args
        .path
        .as_ref()
        .ok_or_else(|| eyre!("No data file given"))?;
    let mut session = Session::new(config.session_config(args.delimiter));
    let compression = match args.compression {
        Some(c) => Some(c),
        None => config.file_loading.compression_format()?,
    };

    match args.format {
        Some(format) => {
            let source = read_path(path, compression)
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            session
                .load(&source.bytes, format)
                .wrap_err_with(|| format!("Failed to load {}", path.display()))?;
        }
        None => session.load_path(path, compression)?,
    }
    if let Some(codebook) = &args.codebook {
        session.load_codebook_path(codebook)?;
    }

    if let Some(term) = &args.search {
        session.set_search(term.as_str());
    }
    for arg in &args.filters {
        let (column, filter) = parse_filter_arg(arg).map_err(|e| eyre!(e))?;
        let known = session
            .records()
            .is_some_and(|set| set.column_position(&column).is_some());
        if !known {
            warn!(%column, "filter column not found; no records will match");
        }
        session.set_filter(column, filter.operator, filter.value);
    }
    if let Some(column) = &args.sort {
        let key = if args.descending {
            SortKey::descending(column.as_str())
        } else {
            SortKey::ascending(column.as_str())
        };
        session.set_sort(Some(key));
    }
    session.set_page(args.page);

    for &id in &args.select {
        let id = RecordId(id);
        if session.selection().contains(id) {
            continue;
        }
        if !session.toggle_selection(id) {
            warn!(%id, "no record with this id");
        }
    }
    Ok(session)
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let session = build_session(args, config)?;
    let set = session
        .records()
        .ok_or_else(|| eyre!("No records loaded"))?;
    let view = session.view();
    debug!(records = set.len(), matched = view.total(), "view ready");

    if let Some(path) = &args.export {
        let (format, compression) = ExportFormat::from_path(path).ok_or_else(|| {
            eyre!(
                "Cannot export to {}: use a .csv, .json or .jsonl file name",
                path.display()
            )
        })?;
        export_to_path(set, &view.rows, path, format, compression)?;
        eprintln!(
            "Exported {} records as {} to {}",
            view.total(),
            format.as_str(),
            path.display()
        );
    }

    let mut printed = false;
    if let Some(id) = args.detail {
        let detail = session
            .detail(RecordId(id))
            .ok_or_else(|| eyre!("No record with id {}", id))?;
        println!("{}", serde_json::to_string_pretty(&detail)?);
        printed = true;
    }
    if let Some(question) = &args.question {
        let request = session.batch_request(question.as_str());
        if request.entries.is_empty() {
            warn!("no records selected; use --select ID");
        }
        println!("{}", serde_json::to_string_pretty(&request)?);
        printed = true;
    }
    if args.summary {
        let filtered = set.subset(&view.rows);
        print!(
            "{}",
            render_summary(&demographics(&filtered), &causes_of_death(&filtered))
        );
        printed = true;
    }
    if !printed {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&page_json(set, &view))?);
        } else {
            print!(
                "{}",
                render_page(set, &view, &TableOptions::from(&config.display))
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::install()?;

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let config = AppConfig::load(APP_NAME)?;
    let debug_logging = args.debug || config.debug.enabled;
    if debug_logging {
        init_tracing("debug", true);
    } else {
        init_tracing(&config.debug.log_level, false);
    }

    run(&args, &config)
}
