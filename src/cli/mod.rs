mod commands;
mod handlers;

pub use commands::{
    Cli, Commands, CustomSplitAction, CustomSplitCommand, HistoryAction, HistoryCommand,
    ItemAction, ItemCommand, PersonAction, PersonCommand, Switch, TaxAction, TaxCommand,
};
pub use handlers::{
    handle_clear, handle_custom_split_clear, handle_custom_split_set, handle_extract,
    handle_history_discard, handle_history_list, handle_history_restore, handle_item_add,
    handle_item_delete, handle_item_edit, handle_item_list, handle_person_add,
    handle_person_delete, handle_person_list, handle_serve, handle_show, handle_split,
    handle_split_tax, handle_tax_set, handle_toggle,
};
