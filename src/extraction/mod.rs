//! Receipt extraction.
//!
//! A document goes out to a language model and a bill comes back as
//! `{ items: [{ name, price }], tax, total }`. Nothing here touches the
//! session: callers validate the answer with [`parse_extracted_bill`] and
//! only then hand it to `replace_all`.

mod openai;

pub use openai::{extract_pdf_text, prepare_image, OpenAiGateway, PreparedImage};

use std::path::Path;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::NewItem;
use crate::error::ExtractionError;

/// An uploaded receipt and its declared media type.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    /// Photos, scans and hand-drawn sketches alike.
    Image,
}

impl Document {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn kind(&self) -> Result<DocumentKind, ExtractionError> {
        let essence = self
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "application/pdf" {
            Ok(DocumentKind::Pdf)
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            Ok(DocumentKind::Image)
        } else {
            Err(ExtractionError::UnsupportedMediaType(self.media_type.clone()))
        }
    }
}

/// Guess a media type from a file extension.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// One line item as read off the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedItem {
    /// Item name as printed on the receipt.
    pub name: String,
    /// Price after any discounts, as a number.
    pub price: f64,
}

/// The structured bill returned by the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedBill {
    pub items: Vec<ExtractedItem>,
    /// Tax amount, as a number.
    pub tax: f64,
    /// Final total including tax, as a number.
    pub total: f64,
}

impl ExtractedBill {
    pub fn new_items(&self) -> Vec<NewItem> {
        self.items
            .iter()
            .map(|item| NewItem::new(item.name.clone(), item.price))
            .collect()
    }

    /// Pretty JSON Schema of the response, embedded in the prompts.
    pub fn json_schema() -> String {
        let schema = schemars::schema_for!(ExtractedBill);
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    }
}

/// Parse the model's answer, rejecting anything but a bare JSON object of
/// the expected shape.
pub fn parse_extracted_bill(content: &str) -> Result<ExtractedBill, ExtractionError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    if trimmed.starts_with("```") {
        return Err(ExtractionError::NotJson(
            "response is wrapped in a code fence".to_string(),
        ));
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| ExtractionError::NotJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ExtractionError::InvalidShape(
            "expected a JSON object".to_string(),
        ));
    }

    let mut bill: ExtractedBill =
        serde_json::from_value(value).map_err(|e| ExtractionError::InvalidShape(e.to_string()))?;

    for (idx, item) in bill.items.iter_mut().enumerate() {
        item.name = item.name.trim().to_string();
        if item.name.is_empty() {
            return Err(ExtractionError::InvalidShape(format!(
                "item {idx} has an empty name"
            )));
        }
        check_amount(&format!("price of item {idx}"), item.price)?;
    }
    check_amount("tax", bill.tax)?;
    check_amount("total", bill.total)?;

    Ok(bill)
}

fn check_amount(what: &str, value: f64) -> Result<(), ExtractionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ExtractionError::InvalidShape(format!(
            "{what} must be a non-negative number, got {value}"
        )))
    }
}

/// The external service that turns a receipt into an [`ExtractedBill`].
///
/// A call either returns a fully validated bill or an error; there is no
/// partial result.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    async fn extract(&self, document: Document) -> Result<ExtractedBill, ExtractionError>;
}

/// Gateway that answers every request with the same raw model response.
#[cfg(test)]
pub(crate) struct CannedGateway {
    pub response: String,
}

#[cfg(test)]
#[async_trait]
impl ExtractionGateway for CannedGateway {
    async fn extract(&self, document: Document) -> Result<ExtractedBill, ExtractionError> {
        document.kind()?;
        parse_extracted_bill(&self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_kind() {
        assert_eq!(
            Document::new(vec![], "application/pdf").kind().unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            Document::new(vec![], "image/jpeg").kind().unwrap(),
            DocumentKind::Image
        );
        assert_eq!(
            Document::new(vec![], "Image/PNG; charset=binary")
                .kind()
                .unwrap(),
            DocumentKind::Image
        );
        assert!(matches!(
            Document::new(vec![], "text/plain").kind(),
            Err(ExtractionError::UnsupportedMediaType(_))
        ));
        assert!(Document::new(vec![], "image/").kind().is_err());
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(
            media_type_for_path(Path::new("receipt.PDF")),
            Some("application/pdf")
        );
        assert_eq!(media_type_for_path(Path::new("a/b.jpeg")), Some("image/jpeg"));
        assert_eq!(media_type_for_path(Path::new("notes.txt")), None);
        assert_eq!(media_type_for_path(Path::new("noext")), None);
    }

    #[test]
    fn test_parse_valid_bill() {
        let bill = parse_extracted_bill(
            r#"{"items":[{"name":" Milk ","price":3.5},{"name":"Bread","price":2}],
                "tax":0.44,"total":5.94}"#,
        )
        .unwrap();
        assert_eq!(bill.items.len(), 2);
        assert_eq!(bill.items[0].name, "Milk");
        assert_eq!(bill.items[1].price, 2.0);
        assert_eq!(bill.tax, 0.44);

        let items = bill.new_items();
        assert_eq!(items[0], NewItem::new("Milk", 3.5));
    }

    #[test]
    fn test_parse_rejects_code_fence() {
        let result = parse_extracted_bill("```json\n{\"items\":[],\"tax\":0,\"total\":0}\n```");
        assert!(matches!(result, Err(ExtractionError::NotJson(_))));
    }

    #[test]
    fn test_parse_rejects_prose() {
        let result = parse_extracted_bill("Here is your bill: {\"items\":[]}");
        assert!(matches!(result, Err(ExtractionError::NotJson(_))));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            parse_extracted_bill("  \n"),
            Err(ExtractionError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let result = parse_extracted_bill(r#"{"items":[{"name":"Milk","price":3.5}],"tax":0.2}"#);
        assert!(matches!(result, Err(ExtractionError::InvalidShape(_))));

        let result = parse_extracted_bill(r#"[1, 2, 3]"#);
        assert!(matches!(result, Err(ExtractionError::InvalidShape(_))));
    }

    #[test]
    fn test_parse_rejects_string_prices() {
        let result = parse_extracted_bill(
            r#"{"items":[{"name":"Milk","price":"3.50"}],"tax":0,"total":3.5}"#,
        );
        assert!(matches!(result, Err(ExtractionError::InvalidShape(_))));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let result =
            parse_extracted_bill(r#"{"items":[{"name":"  ","price":1}],"tax":0,"total":1}"#);
        assert!(matches!(result, Err(ExtractionError::InvalidShape(_))));

        let result =
            parse_extracted_bill(r#"{"items":[{"name":"Milk","price":-1}],"tax":0,"total":1}"#);
        assert!(matches!(result, Err(ExtractionError::InvalidShape(_))));

        let result = parse_extracted_bill(r#"{"items":[],"tax":-0.5,"total":1}"#);
        assert!(matches!(result, Err(ExtractionError::InvalidShape(_))));
    }

    #[test]
    fn test_schema_names_fields() {
        let schema = ExtractedBill::json_schema();
        assert!(schema.contains("\"items\""));
        assert!(schema.contains("\"price\""));
        assert!(schema.contains("\"total\""));
    }

    #[tokio::test]
    async fn test_canned_gateway() {
        let gateway = CannedGateway {
            response: r#"{"items":[{"name":"Eggs","price":4}],"tax":0.3,"total":4.3}"#.to_string(),
        };
        let bill = gateway
            .extract(Document::new(vec![1, 2, 3], "image/png"))
            .await
            .unwrap();
        assert_eq!(bill.items[0].name, "Eggs");

        let err = gateway
            .extract(Document::new(vec![], "text/csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedMediaType(_)));
    }
}
