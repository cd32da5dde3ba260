use bibkeep::api::BibApi;
use bibkeep::clipboard::{copy_to_clipboard, read_from_clipboard, SystemClipboard};
use bibkeep::config::BibConfig;
use bibkeep::error::{BibError, Result};
use bibkeep::model::ClosureStyle;
use clap::Parser;
use directories::ProjectDirs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod args;
mod print;
mod session;
use args::{Cli, Commands};
use print::*;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "bibkeep=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config() -> BibConfig {
    let Some(dirs) = ProjectDirs::from("org", "bibkeep", "bibkeep") else {
        return BibConfig::default();
    };
    BibConfig::load(dirs.config_dir()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config");
        BibConfig::default()
    })
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let api = BibApi::new(load_config());
    if let Some(file) = &cli.file {
        api.select_file(file);
    }

    match cli.command {
        Commands::New { path } => handle_new(&api, path).await,
        Commands::Scan { dir } => handle_scan(&api, dir).await,
        Commands::List => handle_list(&api).await,
        Commands::Show { keyword, copy } => handle_show(&api, &keyword, copy).await,
        Commands::Add { text, clipboard } => handle_add(&api, text, clipboard).await,
        Commands::Delete { keywords } => handle_delete(&api, keywords).await,
        Commands::Reformat { quotes, .. } => {
            handle_reformat(&api, ClosureStyle::from_brace_flag(!quotes)).await
        }
        Commands::Watch => handle_watch(&api).await,
        Commands::Session => session::run(&api).await,
    }
}

async fn handle_new(api: &BibApi, path: PathBuf) -> Result<()> {
    api.create_file(&path).await?;
    print_info(&format!("Created {}", path.display()));
    Ok(())
}

async fn handle_scan(api: &BibApi, dir: PathBuf) -> Result<()> {
    let scan = api.open_directory(dir);
    // Ctrl-C cancels the walk; whatever was found so far is still listed.
    let token = scan.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let report = scan.finish().await;
    interrupt.abort();
    let report = report?;

    if report.files.is_empty() {
        println!("No bibliography files found.");
    }
    for name in report.display_names() {
        println!("{}", name);
    }
    if report.cancelled {
        print_warning(&BibError::DirectoryScanCancelled.to_string());
    }
    Ok(())
}

async fn handle_list(api: &BibApi) -> Result<()> {
    match api.read_into_index().await.into_result(api.selected_file()) {
        Ok(rows) => print_rows(&rows),
        Err(BibError::NoEntriesFound(_)) => print_rows(&[]),
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn handle_show(api: &BibApi, keyword: &str, copy: bool) -> Result<()> {
    load_index(api).await?;
    let text = api.lookup(keyword)?;
    print_record(&text);
    if copy {
        if let Err(e) = copy_to_clipboard(&text) {
            eprintln!("Warning: Failed to copy to clipboard: {}", e);
        }
    }
    Ok(())
}

async fn handle_add(api: &BibApi, text: Option<String>, clipboard: bool) -> Result<()> {
    let text = match (text, clipboard) {
        (Some(text), _) => text,
        (None, true) => tokio::task::spawn_blocking(read_from_clipboard)
            .await
            .map_err(|e| BibError::Worker(e.to_string()))??
            .unwrap_or_default(),
        (None, false) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let report = api.insert(text).await?;
    print_insert(&report);
    Ok(())
}

async fn handle_delete(api: &BibApi, keywords: Vec<String>) -> Result<()> {
    let report = api.delete(keywords).await?;
    print_delete(&report);
    Ok(())
}

async fn handle_reformat(api: &BibApi, style: ClosureStyle) -> Result<()> {
    let report = api.reformat(style).await?;
    print_reformat(&report);
    Ok(())
}

async fn handle_watch(api: &BibApi) -> Result<()> {
    let (mut detector, mut detections) = api.watch(Arc::new(SystemClipboard));
    print_info("Watching the clipboard, Ctrl-C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            detection = detections.recv() => match detection {
                Some(detection) => print_detection(&detection),
                None => break,
            },
        }
    }
    detector.stop().await;
    Ok(())
}

/// Reads the selected file so lookups see its entries. An empty file is fine.
pub(crate) async fn load_index(api: &BibApi) -> Result<()> {
    match api.read_into_index().await.into_result(api.selected_file()) {
        Ok(_) | Err(BibError::NoEntriesFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
