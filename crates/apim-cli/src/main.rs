//! APIM CLI
//!
//! Command-line front end for the management store

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "apim")]
#[command(about = "APIM - management store maintenance and inspection", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: commands::StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Inspect stored APIs
    Api(commands::api::ApiArgs),
    /// Inspect subscriptions
    Subscription(commands::subscription::SubscriptionArgs),
}

fn main() {
    // A missing .env file is normal
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate => commands::migrate::execute(&cli.store),
        Commands::Api(args) => commands::api::execute(&cli.store, args),
        Commands::Subscription(args) => commands::subscription::execute(&cli.store, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
