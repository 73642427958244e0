use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "billsplit")]
#[command(version, about = "Split a receipt between friends")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the session database and config.yaml
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Extract items from a receipt PDF or image
    Extract {
        /// Receipt file
        file: PathBuf,

        /// Media type, if it cannot be guessed from the extension
        #[arg(long)]
        media_type: Option<String>,

        /// Replace the current bill with the extracted items
        #[arg(long)]
        apply: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage line items
    Item(ItemCommand),

    /// Manage the people splitting the bill
    Person(PersonCommand),

    /// Toggle whether a person pays for an item
    Toggle {
        /// Item index
        index: usize,

        /// Person name
        person: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split an item by percentages instead of evenly
    CustomSplit(CustomSplitCommand),

    /// Manage the bill's tax
    Tax(TaxCommand),

    /// Share the tax evenly between everyone
    SplitTax {
        #[arg(value_enum)]
        state: Switch,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current bill
    Show {
        /// Render as markdown
        #[arg(long, conflicts_with = "json")]
        markdown: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what everyone owes
    Split {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Archive the current bill and start an empty one
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Previously archived bills
    History(HistoryCommand),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn enabled(self) -> bool {
        self == Switch::On
    }
}

#[derive(Args, Debug)]
pub struct ItemCommand {
    #[command(subcommand)]
    pub action: ItemAction,
}

#[derive(Subcommand, Debug)]
pub enum ItemAction {
    /// Add an item
    Add {
        name: String,

        /// Price, e.g. 4.50 or $4.50
        price: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change an item's name or price
    Edit {
        index: usize,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        price: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove an item
    Delete {
        index: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List items
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PersonCommand {
    #[command(subcommand)]
    pub action: PersonAction,
}

#[derive(Subcommand, Debug)]
pub enum PersonAction {
    /// Add a person
    Add {
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a person and their assignments
    Delete {
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List people
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CustomSplitCommand {
    #[command(subcommand)]
    pub action: CustomSplitAction,
}

#[derive(Subcommand, Debug)]
pub enum CustomSplitAction {
    /// Set percentages for an item, e.g. `set 0 Alice=60 Bob=40`
    Set {
        index: usize,

        /// NAME=PERCENT pairs
        #[arg(required = true, value_parser = parse_share)]
        shares: Vec<(String, f64)>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Go back to an even split
    Clear {
        index: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct TaxCommand {
    #[command(subcommand)]
    pub action: TaxAction,
}

#[derive(Subcommand, Debug)]
pub enum TaxAction {
    /// Set the tax amount (invalid values become 0)
    Set {
        value: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List archived bills, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make an archived bill current again (removes it from history)
    Restore {
        index: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an archived bill
    Discard {
        index: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_share(raw: &str) -> Result<(String, f64), String> {
    let (name, pct) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=PERCENT, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in '{raw}'"));
    }
    let pct = pct
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| format!("invalid percentage in '{raw}'"))?;
    Ok((name.to_string(), pct))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_share() {
        assert_eq!(parse_share("Alice=60").unwrap(), ("Alice".to_string(), 60.0));
        assert_eq!(
            parse_share("Mary Jane = 33.5%").unwrap(),
            ("Mary Jane".to_string(), 33.5)
        );
        assert!(parse_share("Alice").is_err());
        assert!(parse_share("=50").is_err());
        assert!(parse_share("Alice=lots").is_err());
    }

    #[test]
    fn test_cli_parses_custom_split() {
        let cli = Cli::try_parse_from(["billsplit", "custom-split", "set", "0", "A=60", "B=40"])
            .unwrap();
        match cli.command {
            Commands::CustomSplit(CustomSplitCommand {
                action: CustomSplitAction::Set { index, shares, .. },
            }) => {
                assert_eq!(index, 0);
                assert_eq!(shares.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_data_dir() {
        let cli =
            Cli::try_parse_from(["billsplit", "show", "--data-dir", "/tmp/bills", "--json"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/bills")));
        assert!(matches!(cli.command, Commands::Show { json: true, .. }));
    }

    #[test]
    fn test_split_tax_switch() {
        let cli = Cli::try_parse_from(["billsplit", "split-tax", "on"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::SplitTax {
                state: Switch::On,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["billsplit", "split-tax", "maybe"]).is_err());
    }
}
