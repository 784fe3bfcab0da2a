//! API inspection commands
//!
//! Usage:
//!   apim api show <ID>
//!   apim api list [--env ENV] [--page N --size M]

use super::{CliResult, StoreArgs};
use apim_core::search::{ApiCriteria, Pageable};
use apim_store::repo::ApiRepository;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct ApiArgs {
    #[command(subcommand)]
    pub command: ApiCommand,
}

#[derive(Debug, Subcommand)]
pub enum ApiCommand {
    /// Print one API as JSON
    Show(ShowArgs),
    /// List API ids and names, sorted by name
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only APIs of this environment
    #[arg(long)]
    pub env: Option<String>,

    /// Zero-based page number
    #[arg(long, requires = "size")]
    pub page: Option<usize>,

    #[arg(long)]
    pub size: Option<usize>,
}

pub fn execute(store: &StoreArgs, args: ApiArgs) -> CliResult {
    match args.command {
        ApiCommand::Show(show) => execute_show(store, show),
        ApiCommand::List(list) => execute_list(store, list),
    }
}

fn execute_show(store: &StoreArgs, args: ShowArgs) -> CliResult {
    let (config, conn) = store.open()?;
    let _request = super::request_span();
    let repo = ApiRepository::new(config.dialect)?;

    let api = repo
        .find_by_id(&conn, &args.id)?
        .ok_or_else(|| format!("No API found with id [{}]", args.id))?;
    println!("{}", serde_json::to_string_pretty(&api)?);
    Ok(())
}

fn execute_list(store: &StoreArgs, args: ListArgs) -> CliResult {
    let (config, conn) = store.open()?;
    let _request = super::request_span();
    let repo = ApiRepository::new(config.dialect)?;

    let criteria = ApiCriteria {
        environment_id: args.env,
        ..Default::default()
    };
    let pageable = args
        .size
        .map(|size| Pageable::new(args.page.unwrap_or(0), size));
    let page = repo.search(&conn, &criteria, None, pageable.as_ref(), None)?;

    for api in &page.content {
        println!("{}\t{}", api.id, api.name);
    }
    println!(
        "page {}: {} of {} apis",
        page.page_number, page.page_elements, page.total_elements
    );
    Ok(())
}
