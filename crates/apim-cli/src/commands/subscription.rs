//! Subscription inspection commands
//!
//! Usage: apim subscription rank [--api ID]... | [--application ID]... [--asc]

use super::{CliResult, StoreArgs};
use apim_core::search::{Order, SubscriptionCriteria};
use apim_store::repo::SubscriptionRepository;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct SubscriptionArgs {
    #[command(subcommand)]
    pub command: SubscriptionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubscriptionCommand {
    /// Rank APIs or applications by number of subscriptions
    Rank(RankArgs),
}

#[derive(Debug, Args)]
pub struct RankArgs {
    /// APIs to rank
    #[arg(long = "api", conflicts_with = "applications")]
    pub apis: Vec<String>,

    /// Applications to rank, instead of APIs
    #[arg(long = "application")]
    pub applications: Vec<String>,

    /// Least subscribed first
    #[arg(long)]
    pub asc: bool,
}

pub fn execute(store: &StoreArgs, args: SubscriptionArgs) -> CliResult {
    match args.command {
        SubscriptionCommand::Rank(rank) => execute_rank(store, rank),
    }
}

fn execute_rank(store: &StoreArgs, args: RankArgs) -> CliResult {
    let (config, conn) = store.open()?;
    let _request = super::request_span();
    let repo = SubscriptionRepository::new(config.dialect)?;

    let criteria = SubscriptionCriteria {
        apis: args.apis,
        applications: args.applications,
        ..Default::default()
    };
    let order = if args.asc { Order::Asc } else { Order::Desc };
    let ranked = repo.find_reference_ids_order_by_number_of_subscriptions(&conn, &criteria, order)?;

    for (position, id) in ranked.iter().enumerate() {
        println!("{}\t{}", position + 1, id);
    }
    Ok(())
}
