use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::handlers::BillView;
use crate::api::{self, AppState};
use crate::bill::input::parse_price;
use crate::bill::parse_tax;
use crate::config::Config;
use crate::entity::CustomSplit;
use crate::error::{ExtractionError, Result};
use crate::extraction::{media_type_for_path, Document, ExtractionGateway, OpenAiGateway};
use crate::report::{format_amount, render_history, render_markdown, render_text};
use crate::storage::wire::{history_entry_to_wire, BillDocument};
use crate::storage::{Session, SqliteStore};
use crate::warnings::{check_split, format_warning};

fn open_session(config: &Config) -> Result<Session<SqliteStore>> {
    Session::open(SqliteStore::open(&config.data_dir)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_bill_json(session: &Session<SqliteStore>) -> Result<()> {
    print_json(&BillView::of(session))
}

pub fn handle_serve(config: &Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let session = open_session(config)?;
    if config.extraction.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; receipt uploads will fail");
    }
    let gateway = OpenAiGateway::new(config.extraction.clone())?;

    let state = AppState::new(session, Arc::new(gateway));
    let router = api::build_router(state, config.extraction.max_image_bytes);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(api::serve(router, &bind, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    }))
}

pub fn handle_extract(
    config: &Config,
    file: PathBuf,
    media_type: Option<String>,
    apply: bool,
    json: bool,
) -> Result<()> {
    let media_type = match media_type {
        Some(m) => m,
        None => media_type_for_path(&file)
            .map(str::to_string)
            .ok_or_else(|| ExtractionError::UnsupportedMediaType(file.display().to_string()))?,
    };
    let bytes = fs::read(&file)?;

    let gateway = OpenAiGateway::new(config.extraction.clone())?;
    let runtime = tokio::runtime::Runtime::new()?;
    let extracted = runtime.block_on(gateway.extract(Document::new(bytes, media_type)))?;

    if apply {
        let mut session = open_session(config)?;
        session.replace_all(extracted.new_items(), extracted.tax, extracted.total)?;
        if json {
            return print_bill_json(&session);
        }
    } else if json {
        return print_json(&extracted);
    }

    for (idx, item) in extracted.items.iter().enumerate() {
        println!("[{}] {:<24} {:>10}", idx, item.name, format_amount(item.price));
    }
    println!("Tax:   {}", format_amount(extracted.tax));
    println!("Total: {}", format_amount(extracted.total));
    if apply {
        println!("Replaced the current bill ({} items)", extracted.items.len());
    }
    Ok(())
}

pub fn handle_item_add(config: &Config, name: String, price: String, json: bool) -> Result<()> {
    let price = parse_price(&price)?;
    let mut session = open_session(config)?;
    let index = session.add_item(&name, price)?;

    if json {
        return print_bill_json(&session);
    }
    let item = session.bill().item(index)?;
    println!("Added item [{}] {} {}", index, item.name, format_amount(item.price));
    Ok(())
}

pub fn handle_item_edit(
    config: &Config,
    index: usize,
    name: Option<String>,
    price: Option<String>,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config)?;
    let current = session.bill().item(index)?.clone();

    let name = name.unwrap_or(current.name);
    // An unparsable price is passed through as NaN so the bill keeps the old one.
    let price = match price {
        Some(raw) => parse_price(&raw).unwrap_or(f64::NAN),
        None => current.price,
    };
    let item = session.edit_item(index, &name, price)?;

    if json {
        return print_bill_json(&session);
    }
    println!("Updated item [{}] {} {}", index, item.name, format_amount(item.price));
    Ok(())
}

pub fn handle_item_delete(config: &Config, index: usize, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let removed = session.delete_item(index)?;

    if json {
        return print_bill_json(&session);
    }
    println!("Deleted item {}", removed.name);
    Ok(())
}

pub fn handle_item_list(config: &Config, json: bool) -> Result<()> {
    let session = open_session(config)?;
    let bill = session.bill();

    if json {
        return print_json(&BillDocument::from_bill(bill).items);
    }
    if bill.items().is_empty() {
        println!("No items.");
        return Ok(());
    }
    for (idx, item) in bill.items().iter().enumerate() {
        let payers: Vec<&str> = bill.payers_of(&item.id).map(|p| p.name.as_str()).collect();
        println!(
            "[{}] {:<24} {:>10}  {}",
            idx,
            item.name,
            format_amount(item.price),
            payers.join(", ")
        );
    }
    Ok(())
}

pub fn handle_person_add(config: &Config, name: String, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let person = session.add_person(&name)?;

    if json {
        return print_bill_json(&session);
    }
    println!("Added {}", person.name);
    Ok(())
}

pub fn handle_person_delete(config: &Config, name: String, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let person = session.delete_person(&name)?;

    if json {
        return print_bill_json(&session);
    }
    println!("Removed {}", person.name);
    Ok(())
}

pub fn handle_person_list(config: &Config, json: bool) -> Result<()> {
    let session = open_session(config)?;

    if json {
        return print_json(&BillDocument::from_bill(session.bill()).people);
    }
    if session.bill().people().is_empty() {
        println!("No people.");
        return Ok(());
    }
    for share in session.split() {
        println!("{:<28} {:>10}", share.name, format_amount(share.amount));
    }
    Ok(())
}

pub fn handle_toggle(config: &Config, index: usize, person: String, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let paying = session.toggle_payment(index, &person)?;

    if json {
        return print_bill_json(&session);
    }
    match paying {
        Some(true) => println!("{} now pays for item {}", person, index),
        Some(false) => println!("{} no longer pays for item {}", person, index),
        None => println!("Nothing to toggle: no item {} or person {}", index, person),
    }
    Ok(())
}

pub fn handle_custom_split_set(
    config: &Config,
    index: usize,
    shares: Vec<(String, f64)>,
    json: bool,
) -> Result<()> {
    let mapping: CustomSplit = shares.into_iter().collect();
    let mut session = open_session(config)?;
    session.set_custom_split(index, &mapping)?;

    if json {
        return print_bill_json(&session);
    }
    let stored = session.bill().custom_split(index).cloned().unwrap_or_default();
    let parts: Vec<String> = stored
        .iter()
        .map(|(name, pct)| format!("{name} {pct}%"))
        .collect();
    println!("Item {} split: {}", index, parts.join(", "));
    Ok(())
}

pub fn handle_custom_split_clear(config: &Config, index: usize, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let had_split = session.clear_custom_split(index)?;

    if json {
        return print_bill_json(&session);
    }
    if had_split {
        println!("Item {} is split evenly again", index);
    } else {
        println!("Item {} had no custom split", index);
    }
    Ok(())
}

pub fn handle_tax_set(config: &Config, value: String, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let applied = session.set_tax(parse_tax(&value))?;

    if json {
        return print_bill_json(&session);
    }
    println!("Tax set to {}", format_amount(applied));
    Ok(())
}

pub fn handle_split_tax(config: &Config, enabled: bool, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    session.set_split_tax(enabled)?;

    if json {
        return print_bill_json(&session);
    }
    if enabled {
        println!("Tax is split evenly between everyone");
    } else {
        println!("Tax is no longer split");
    }
    Ok(())
}

pub fn handle_show(config: &Config, markdown: bool, json: bool) -> Result<()> {
    let session = open_session(config)?;

    if json {
        return print_bill_json(&session);
    }
    let summary = session.summary();
    let warnings = check_split(session.bill(), &summary);
    if markdown {
        print!("{}", render_markdown(session.bill(), &summary, &warnings));
    } else {
        print!("{}", render_text(session.bill(), &summary, &warnings));
    }
    Ok(())
}

pub fn handle_split(config: &Config, json: bool) -> Result<()> {
    let session = open_session(config)?;
    let summary = session.summary();

    if json {
        return print_json(&summary);
    }
    if summary.shares.is_empty() {
        println!("No people on this bill.");
    }
    for share in &summary.shares {
        println!("{:<28} {:>10}", share.name, format_amount(share.amount));
    }
    println!("Total: {}", format_amount(summary.final_total));
    for warning in check_split(session.bill(), &summary) {
        println!("{}", format_warning(&warning));
    }
    Ok(())
}

pub fn handle_clear(config: &Config, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let had_items = !session.bill().items().is_empty();
    session.clear_to_empty()?;

    if json {
        return print_bill_json(&session);
    }
    if had_items {
        println!("Bill archived and cleared");
    } else {
        println!("Bill cleared");
    }
    Ok(())
}

pub fn handle_history_list(config: &Config, json: bool) -> Result<()> {
    let session = open_session(config)?;

    if json {
        let entries: Vec<_> = session
            .history()
            .entries()
            .iter()
            .map(history_entry_to_wire)
            .collect();
        return print_json(&entries);
    }
    print!("{}", render_history(session.history()));
    Ok(())
}

pub fn handle_history_restore(config: &Config, index: usize, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    session.restore_from_history(index)?;

    if json {
        return print_bill_json(&session);
    }
    println!(
        "Restored bill with {} items ({})",
        session.bill().items().len(),
        format_amount(session.bill().final_total())
    );
    Ok(())
}

pub fn handle_history_discard(config: &Config, index: usize, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let entry = session.discard_history_entry(index)?;

    if json {
        let entries: Vec<_> = session
            .history()
            .entries()
            .iter()
            .map(history_entry_to_wire)
            .collect();
        return print_json(&entries);
    }
    println!(
        "Discarded bill from {} ({} items)",
        crate::report::format_timestamp(&entry.created_at),
        entry.items.len()
    );
    Ok(())
}
