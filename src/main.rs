use billsplit::cli::{
    handle_clear, handle_custom_split_clear, handle_custom_split_set, handle_extract,
    handle_history_discard, handle_history_list, handle_history_restore, handle_item_add,
    handle_item_delete, handle_item_edit, handle_item_list, handle_person_add,
    handle_person_delete, handle_person_list, handle_serve, handle_show, handle_split,
    handle_split_tax, handle_tax_set, handle_toggle, Cli, Commands, CustomSplitAction,
    HistoryAction, ItemAction, PersonAction, TaxAction,
};
use billsplit::config::Config;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("billsplit=info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.data_dir {
        Some(dir) => {
            // Still pick up .env for the API key.
            let _ = dotenvy::dotenv();
            Config::load_from(dir, |key| std::env::var(key).ok())
        }
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { bind } => handle_serve(&config, bind),
        Commands::Extract {
            file,
            media_type,
            apply,
            json,
        } => handle_extract(&config, file, media_type, apply, json),
        Commands::Item(item) => match item.action {
            ItemAction::Add { name, price, json } => handle_item_add(&config, name, price, json),
            ItemAction::Edit {
                index,
                name,
                price,
                json,
            } => handle_item_edit(&config, index, name, price, json),
            ItemAction::Delete { index, json } => handle_item_delete(&config, index, json),
            ItemAction::List { json } => handle_item_list(&config, json),
        },
        Commands::Person(person) => match person.action {
            PersonAction::Add { name, json } => handle_person_add(&config, name, json),
            PersonAction::Delete { name, json } => handle_person_delete(&config, name, json),
            PersonAction::List { json } => handle_person_list(&config, json),
        },
        Commands::Toggle {
            index,
            person,
            json,
        } => handle_toggle(&config, index, person, json),
        Commands::CustomSplit(split) => match split.action {
            CustomSplitAction::Set {
                index,
                shares,
                json,
            } => handle_custom_split_set(&config, index, shares, json),
            CustomSplitAction::Clear { index, json } => {
                handle_custom_split_clear(&config, index, json)
            }
        },
        Commands::Tax(tax) => match tax.action {
            TaxAction::Set { value, json } => handle_tax_set(&config, value, json),
        },
        Commands::SplitTax { state, json } => handle_split_tax(&config, state.enabled(), json),
        Commands::Show { markdown, json } => handle_show(&config, markdown, json),
        Commands::Split { json } => handle_split(&config, json),
        Commands::Clear { json } => handle_clear(&config, json),
        Commands::History(history) => match history.action {
            HistoryAction::List { json } => handle_history_list(&config, json),
            HistoryAction::Restore { index, json } => handle_history_restore(&config, index, json),
            HistoryAction::Discard { index, json } => handle_history_discard(&config, index, json),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
