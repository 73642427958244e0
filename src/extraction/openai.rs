use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{parse_extracted_bill, Document, DocumentKind, ExtractedBill, ExtractionGateway};
use crate::config::ExtractionConfig;
use crate::error::ExtractionError;

const PDF_PROMPT: &str = "Extract a structured list of items, their costs, tax, and total \
from this text, parsed from a store receipt PDF. If items are discounted, include only the \
price of each item after the discount. Each item must have a \"name\" and a \"price\". \
The tax and the final price are separate attributes called \"tax\" and \"total\". \
Return pure JSON without code fences or additional text.";

const IMAGE_PROMPT: &str = "Extract a structured list of items, their costs, tax, and total \
from this bill image. The image may be a photo, a scan, or a hand-drawn sketch. Each item \
must have a \"name\" and a numeric \"price\"; \"tax\" and \"total\" are numbers. \
Return pure JSON without code fences or additional text.";

const IMAGE_INSTRUCTION: &str = "Extract the bill information from this image.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiGateway {
    client: Client,
    config: ExtractionConfig,
}

impl OpenAiGateway {
    /// Build a gateway. A missing API key is only reported when a document
    /// is actually submitted, so the rest of the application keeps working.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        }
    }

    async fn messages_for(&self, document: Document) -> Result<Vec<Message>, ExtractionError> {
        match document.kind()? {
            DocumentKind::Pdf => {
                let bytes = document.bytes;
                let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                    .await
                    .map_err(|e| ExtractionError::Document(e.to_string()))??;
                debug!("Extracted {} characters of PDF text", text.len());
                Ok(pdf_messages(text))
            }
            DocumentKind::Image => {
                let max_bytes = self.config.max_image_bytes;
                let quality = self.config.jpeg_quality;
                let Document { bytes, media_type } = document;
                let prepared = tokio::task::spawn_blocking(move || {
                    prepare_image(bytes, &media_type, max_bytes, quality)
                })
                .await
                .map_err(|e| ExtractionError::Document(e.to_string()))??;
                Ok(image_messages(&prepared))
            }
        }
    }
}

fn system_prompt(base: &str) -> String {
    format!(
        "{base}\n\nThe response must match this JSON Schema:\n{}",
        ExtractedBill::json_schema()
    )
}

fn pdf_messages(text: String) -> Vec<Message> {
    vec![
        Message {
            role: "system",
            content: MessageContent::Text(system_prompt(PDF_PROMPT)),
        },
        Message {
            role: "user",
            content: MessageContent::Text(text),
        },
    ]
}

fn image_messages(image: &PreparedImage) -> Vec<Message> {
    vec![
        Message {
            role: "system",
            content: MessageContent::Text(system_prompt(IMAGE_PROMPT)),
        },
        Message {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: IMAGE_INSTRUCTION.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                },
            ]),
        },
    ]
}

#[async_trait]
impl ExtractionGateway for OpenAiGateway {
    async fn extract(&self, document: Document) -> Result<ExtractedBill, ExtractionError> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or(ExtractionError::MissingApiKey)?;

        info!(
            "Extracting bill from {} ({} bytes) with {}",
            document.media_type,
            document.bytes.len(),
            self.config.model
        );
        let messages = self.messages_for(document).await?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&self.request(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::NotJson(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ExtractionError::EmptyResponse)?;

        let bill = parse_extracted_bill(&content)?;
        info!(
            "Extracted {} items (tax {}, total {})",
            bill.items.len(),
            bill.tax,
            bill.total
        );
        Ok(bill)
    }
}

/// Pull the text layer out of a PDF.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::Document(format!("could not read PDF: {e}")))?;
    if text.trim().is_empty() {
        return Err(ExtractionError::Document(
            "PDF has no extractable text".to_string(),
        ));
    }
    Ok(text)
}

/// An image ready to be inlined into a request.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl PreparedImage {
    pub fn data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{encoded}", self.media_type)
    }
}

/// Shrink an image that exceeds `max_bytes`.
///
/// Both sides are scaled by `sqrt(max_bytes / (len * 1.5))` and the result
/// is re-encoded as JPEG. Images within the limit pass through untouched.
pub fn prepare_image(
    bytes: Vec<u8>,
    media_type: &str,
    max_bytes: usize,
    quality: u8,
) -> Result<PreparedImage, ExtractionError> {
    if bytes.len() <= max_bytes {
        return Ok(PreparedImage {
            bytes,
            media_type: media_type.to_string(),
        });
    }

    let image = image::load_from_memory(&bytes)
        .map_err(|e| ExtractionError::Document(format!("could not decode image: {e}")))?;
    let scale = (max_bytes as f64 / (bytes.len() as f64 * 1.5)).sqrt();
    let width = scaled(image.width(), scale);
    let height = scaled(image.height(), scale);
    debug!(
        "Resizing {}x{} image ({} bytes) to {}x{}",
        image.width(),
        image.height(),
        bytes.len(),
        width,
        height
    );

    let resized = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&resized)
        .map_err(|e| ExtractionError::Document(format!("could not encode image: {e}")))?;
    debug!("Resized image is {} bytes", out.len());

    Ok(PreparedImage {
        bytes: out,
        media_type: "image/jpeg".to_string(),
    })
}

fn scaled(side: u32, scale: f64) -> u32 {
    ((side as f64 * scale).floor() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    async fn mock_endpoint(status: u16, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let body = body.clone();
                async move {
                    (
                        axum::http::StatusCode::from_u16(status).unwrap(),
                        Json(body),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    fn gateway(endpoint: String) -> OpenAiGateway {
        OpenAiGateway::new(ExtractionConfig {
            endpoint,
            api_key: Some("sk-test".to_string()),
            ..ExtractionConfig::default()
        })
        .unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn test_small_image_passes_through() {
        let bytes = vec![1, 2, 3, 4];
        let prepared = prepare_image(bytes.clone(), "image/png", 1024, 85).unwrap();
        assert_eq!(prepared.bytes, bytes);
        assert_eq!(prepared.media_type, "image/png");
        assert_eq!(prepared.data_url(), "data:image/png;base64,AQIDBA==");
    }

    #[test]
    fn test_large_image_is_downscaled_to_jpeg() {
        let png = noisy_png(200, 100);
        let max = png.len() / 4;
        let prepared = prepare_image(png, "image/png", max, 85).unwrap();

        assert_eq!(prepared.media_type, "image/jpeg");
        assert_eq!(&prepared.bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert!(decoded.width() < 200);
        assert!(decoded.height() < 100);
    }

    #[test]
    fn test_undecodable_large_image() {
        let result = prepare_image(vec![0; 64], "image/png", 16, 85);
        assert!(matches!(result, Err(ExtractionError::Document(_))));
    }

    #[test]
    fn test_invalid_pdf() {
        let result = extract_pdf_text(b"not a pdf");
        assert!(matches!(result, Err(ExtractionError::Document(_))));
    }

    #[test]
    fn test_image_request_shape() {
        let gateway = gateway("http://unused".to_string());
        let prepared = PreparedImage {
            bytes: vec![9, 9],
            media_type: "image/jpeg".to_string(),
        };
        let json = serde_json::to_value(gateway.request(image_messages(&prepared))).unwrap();

        assert_eq!(json["model"], "gpt-4-turbo");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("JSON Schema"));
        let parts = &json["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,CQk=");
    }

    #[test]
    fn test_pdf_request_sends_text() {
        let json = serde_json::to_value(pdf_messages("MILK 3.50".to_string())).unwrap();
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"], "MILK 3.50");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let gateway = OpenAiGateway::new(ExtractionConfig::default()).unwrap();
        let err = gateway
            .extract(Document::new(vec![1], "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_extract_image_from_endpoint() {
        let endpoint = mock_endpoint(
            200,
            completion(r#"{"items":[{"name":"Milk","price":3.5}],"tax":0.28,"total":3.78}"#),
        )
        .await;
        let bill = gateway(endpoint)
            .extract(Document::new(vec![1, 2, 3], "image/png"))
            .await
            .unwrap();
        assert_eq!(bill.items[0].name, "Milk");
        assert_eq!(bill.total, 3.78);
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let endpoint = mock_endpoint(429, serde_json::json!({"error": "rate limited"})).await;
        let err = gateway(endpoint)
            .extract(Document::new(vec![1], "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Upstream { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_fenced_content_is_rejected() {
        let endpoint = mock_endpoint(200, completion("```json\n{}\n```")).await;
        let err = gateway(endpoint)
            .extract(Document::new(vec![1], "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NotJson(_)));
    }

    #[tokio::test]
    async fn test_no_choices() {
        let endpoint = mock_endpoint(200, serde_json::json!({"choices": []})).await;
        let err = gateway(endpoint)
            .extract(Document::new(vec![1], "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let err = gateway("http://127.0.0.1:9/v1/chat/completions".to_string())
            .extract(Document::new(vec![1], "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Transport(_)));
    }
}
