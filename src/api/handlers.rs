//! Route handlers.
//!
//! Every mutation goes through the shared [`Session`](crate::storage::Session),
//! so a successful response means the change is already on disk.

use std::path::Path;

use axum::extract::{FromRequest, FromRequestParts, Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ApiError;
use super::AppState;
use crate::bill::input::parse_price;
use crate::bill::{parse_tax, SplitSummary};
use crate::entity::{CustomSplit, NewItem};
use crate::extraction::{media_type_for_path, Document, ExtractedBill};
use crate::storage::wire::{self, BillDocument, StoredHistoryEntry};
use crate::storage::{KeyValueStore, Session};
use crate::warnings::{check_split, format_warning, Warning};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// `Json` whose rejection is reported as an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `Path` whose rejection is reported as an [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// A warning with its rendered message.
#[derive(Debug, Serialize)]
pub struct WarningView {
    #[serde(flatten)]
    pub warning: Warning,
    pub message: String,
}

/// The current bill with its split and warnings.
#[derive(Debug, Serialize)]
pub struct BillView {
    #[serde(flatten)]
    pub bill: BillDocument,
    pub split: SplitSummary,
    pub warnings: Vec<WarningView>,
}

impl BillView {
    pub fn of<S: KeyValueStore>(session: &Session<S>) -> Self {
        let summary = session.summary();
        let warnings = check_split(session.bill(), &summary)
            .into_iter()
            .map(|warning| WarningView {
                message: format_warning(&warning),
                warning,
            })
            .collect();
        Self {
            bill: BillDocument::from_bill(session.bill()),
            split: summary,
            warnings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryView {
    pub index: usize,
    #[serde(flatten)]
    pub entry: StoredHistoryEntry,
    #[serde(rename = "finalTotal")]
    pub final_total: f64,
}

fn history_views<S: KeyValueStore>(session: &Session<S>) -> Vec<HistoryEntryView> {
    session
        .history()
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| HistoryEntryView {
            index,
            entry: wire::history_entry_to_wire(entry),
            final_total: entry.final_total(),
        })
        .collect()
}

/// An amount sent either as a JSON number or as typed text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    fn price(&self) -> crate::error::Result<f64> {
        match self {
            Amount::Number(n) => Ok(*n),
            Amount::Text(s) => parse_price(s),
        }
    }

    fn tax(&self) -> f64 {
        match self {
            Amount::Number(n) => *n,
            Amount::Text(s) => parse_tax(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemBody {
    pub name: String,
    pub price: Amount,
}

#[derive(Debug, Deserialize)]
pub struct PersonBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleBody {
    pub person: String,
}

#[derive(Debug, Deserialize)]
pub struct TaxBody {
    pub value: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitTaxBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceBody {
    pub items: Vec<NewItem>,
    #[serde(default)]
    pub tax: Option<Amount>,
    #[serde(default)]
    pub total: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub success: bool,
    pub extracted_data: ExtractedBill,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractAndReplaceResponse {
    pub success: bool,
    pub extracted_data: ExtractedBill,
    pub bill: BillView,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    /// New assignment state, `null` if the item or person was unknown.
    pub paying: Option<bool>,
    pub bill: BillView,
}

/// Read the multipart part named `field` into a [`Document`].
///
/// The declared content type wins when it names a PDF or an image;
/// otherwise the file name's extension is used.
async fn read_upload(mut multipart: Multipart, field: &str) -> Result<Document, ApiError> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if part.name() != Some(field) {
            continue;
        }

        let declared = part.content_type().map(str::to_string);
        let guessed = part
            .file_name()
            .and_then(|name| media_type_for_path(Path::new(name)));
        let media_type = match (declared, guessed) {
            (Some(d), _) if d == "application/pdf" || d.starts_with("image/") => d,
            (_, Some(g)) => g.to_string(),
            (Some(d), None) => d,
            (None, None) => "application/octet-stream".to_string(),
        };

        let bytes = part
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ApiError::NoFileUploaded);
        }
        debug!("Received {} upload of {} bytes", media_type, bytes.len());
        return Ok(Document::new(bytes.to_vec(), media_type));
    }
    Err(ApiError::NoFileUploaded)
}

async fn extract_only(app: &AppState, document: Document) -> ApiResult<ExtractResponse> {
    let extracted = app.gateway.extract(document).await?;
    Ok(Json(ExtractResponse {
        success: true,
        extracted_data: extracted,
    }))
}

/// POST /upload-pdf
pub async fn upload_pdf(
    State(app): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ExtractResponse> {
    let mut document = read_upload(multipart, "pdf").await?;
    document.media_type = "application/pdf".to_string();
    extract_only(&app, document).await
}

/// POST /upload-image
pub async fn upload_image(
    State(app): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ExtractResponse> {
    let document = read_upload(multipart, "image").await?;
    extract_only(&app, document).await
}

/// POST /api/bill/extract
///
/// The bill is only replaced once the gateway has returned a valid answer.
pub async fn extract_bill(
    State(app): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ExtractAndReplaceResponse> {
    let document = read_upload(multipart, "file").await?;
    let extracted = app.gateway.extract(document).await?;

    let mut session = app.session();
    session.replace_all(extracted.new_items(), extracted.tax, extracted.total)?;
    info!("Bill replaced from upload ({} items)", extracted.items.len());

    Ok(Json(ExtractAndReplaceResponse {
        success: true,
        bill: BillView::of(&session),
        extracted_data: extracted,
    }))
}

/// GET /api/bill
pub async fn get_bill(State(app): State<AppState>) -> Json<BillView> {
    Json(BillView::of(&app.session()))
}

/// GET /api/bill/split
pub async fn get_split(State(app): State<AppState>) -> Json<SplitSummary> {
    Json(app.session().summary())
}

/// POST /api/bill/replace
pub async fn replace_bill(
    State(app): State<AppState>,
    JsonBody(body): JsonBody<ReplaceBody>,
) -> ApiResult<BillView> {
    let tax = body.tax.as_ref().map(Amount::tax).unwrap_or(0.0);
    let total = body
        .total
        .unwrap_or_else(|| body.items.iter().map(|i| i.price).sum::<f64>() + tax);

    let mut session = app.session();
    session.replace_all(body.items, tax, total)?;
    Ok(Json(BillView::of(&session)))
}

/// POST /api/bill/clear
pub async fn clear_bill(State(app): State<AppState>) -> ApiResult<BillView> {
    let mut session = app.session();
    session.clear_to_empty()?;
    Ok(Json(BillView::of(&session)))
}

/// POST /api/bill/items
pub async fn add_item(
    State(app): State<AppState>,
    JsonBody(body): JsonBody<ItemBody>,
) -> ApiResult<BillView> {
    let price = body.price.price()?;
    let mut session = app.session();
    session.add_item(&body.name, price)?;
    Ok(Json(BillView::of(&session)))
}

/// PUT /api/bill/items/{index}
///
/// An unparsable price keeps the item's current price.
pub async fn edit_item(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
    JsonBody(body): JsonBody<ItemBody>,
) -> ApiResult<BillView> {
    let price = body.price.price().unwrap_or(f64::NAN);
    let mut session = app.session();
    session.edit_item(index, &body.name, price)?;
    Ok(Json(BillView::of(&session)))
}

/// DELETE /api/bill/items/{index}
pub async fn delete_item(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.delete_item(index)?;
    Ok(Json(BillView::of(&session)))
}

/// POST /api/bill/people
pub async fn add_person(
    State(app): State<AppState>,
    JsonBody(body): JsonBody<PersonBody>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.add_person(&body.name)?;
    Ok(Json(BillView::of(&session)))
}

/// DELETE /api/bill/people/{name}
pub async fn delete_person(
    State(app): State<AppState>,
    PathParam(name): PathParam<String>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.delete_person(&name)?;
    Ok(Json(BillView::of(&session)))
}

/// POST /api/bill/items/{index}/toggle
pub async fn toggle_payment(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
    JsonBody(body): JsonBody<ToggleBody>,
) -> ApiResult<ToggleResponse> {
    let mut session = app.session();
    let paying = session.toggle_payment(index, &body.person)?;
    Ok(Json(ToggleResponse {
        paying,
        bill: BillView::of(&session),
    }))
}

/// PUT /api/bill/items/{index}/split
///
/// Body is a map of person name to percentage.
pub async fn set_custom_split(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
    JsonBody(body): JsonBody<CustomSplit>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.set_custom_split(index, &body)?;
    Ok(Json(BillView::of(&session)))
}

/// DELETE /api/bill/items/{index}/split
pub async fn clear_custom_split(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.clear_custom_split(index)?;
    Ok(Json(BillView::of(&session)))
}

/// PUT /api/bill/tax
pub async fn set_tax(
    State(app): State<AppState>,
    JsonBody(body): JsonBody<TaxBody>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.set_tax(body.value.tax())?;
    Ok(Json(BillView::of(&session)))
}

/// PUT /api/bill/split-tax
pub async fn set_split_tax(
    State(app): State<AppState>,
    JsonBody(body): JsonBody<SplitTaxBody>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.set_split_tax(body.enabled)?;
    Ok(Json(BillView::of(&session)))
}

/// GET /api/history
pub async fn list_history(State(app): State<AppState>) -> Json<Vec<HistoryEntryView>> {
    Json(history_views(&app.session()))
}

/// POST /api/history/{index}/restore
pub async fn restore_history(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
) -> ApiResult<BillView> {
    let mut session = app.session();
    session.restore_from_history(index)?;
    Ok(Json(BillView::of(&session)))
}

/// DELETE /api/history/{index}
pub async fn discard_history(
    State(app): State<AppState>,
    PathParam(index): PathParam<usize>,
) -> ApiResult<Vec<HistoryEntryView>> {
    let mut session = app.session();
    session.discard_history_entry(index)?;
    Ok(Json(history_views(&session)))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
