//! HTTP client for the VisualEyes vision backend.
//!
//! The backend exposes small multipart/form endpoints returning one-field
//! JSON envelopes (`{"description": …}`, `{"text": …}`, `{"translation":
//! …}`, `{"answer": …}`). All calls are bounded by the client timeout and
//! every failure collapses to a `ServiceError`; vision failures also retain
//! their error text for diagnostic display.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{AnswerService, GeoFix, ServiceError, TranslationService, VisionService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the vision backend, implementing the vision, answering and
/// translation contracts
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    last_error: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct DescriptionResponse {
    description: String,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Deserialize)]
struct TranslationResponse {
    translation: String,
}

#[derive(Deserialize)]
struct AnswerResponse {
    answer: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_error: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn record_error(&self, message: &str) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(message.to_string());
        }
    }

    async fn image_part(path: &Path) -> Result<Part, ServiceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ServiceError::Transient(format!("frame read failed: {e}")))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame.jpg".to_string());
        Part::bytes(bytes)
            .file_name(name)
            .mime_str("image/jpeg")
            .map_err(|e| ServiceError::Transient(e.to_string()))
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = response.error_for_status().map_err(map_reqwest_error)?;
        response.json::<T>().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else if e.is_connect() {
        ServiceError::Unavailable(e.to_string())
    } else {
        ServiceError::Transient(e.to_string())
    }
}

#[async_trait]
impl VisionService for BackendClient {
    async fn describe(&self, image: &Path, language: &str) -> Result<String, ServiceError> {
        let result: Result<DescriptionResponse, _> = async {
            let form = Form::new()
                .text("language", language.to_string())
                .part("image", Self::image_part(image).await?);
            self.post_form("/vision/analyze", form).await
        }
        .await;

        match result {
            Ok(body) => Ok(body.description),
            Err(e) => {
                self.record_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn read_text(&self, image: &Path, language: &str) -> Result<String, ServiceError> {
        let result: Result<TextResponse, _> = async {
            let form = Form::new()
                .text("language", language.to_string())
                .part("image", Self::image_part(image).await?);
            self.post_form("/vision/ocr", form).await
        }
        .await;

        match result {
            Ok(body) => Ok(body.text),
            Err(e) => {
                self.record_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn object_usage(&self, language: &str) -> Result<String, ServiceError> {
        let form = Form::new().text("language", language.to_string());
        let body: TextResponse = self.post_form("/vision/object_usage", form).await?;
        Ok(body.text)
    }

    async fn object_size(&self, language: &str) -> Result<String, ServiceError> {
        let form = Form::new().text("language", language.to_string());
        let body: TextResponse = self.post_form("/vision/object_size", form).await?;
        Ok(body.text)
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl AnswerService for BackendClient {
    async fn answer(
        &self,
        question: &str,
        language: &str,
        images: &[PathBuf],
        location: Option<GeoFix>,
    ) -> Result<String, ServiceError> {
        let mut form = Form::new()
            .text("question", question.to_string())
            .text("language", language.to_string());

        for image in images {
            match Self::image_part(image).await {
                Ok(part) => form = form.part("images", part),
                // An evicted or unreadable frame is not worth failing the
                // whole question over.
                Err(e) => debug!(?image, %e, "skipping context image"),
            }
        }

        if let Some((lat, lon)) = location {
            form = form.text("lat", lat.to_string()).text("lon", lon.to_string());
        }

        let body: AnswerResponse = self.post_form("/assistant/answer", form).await?;
        Ok(body.answer)
    }
}

#[async_trait]
impl TranslationService for BackendClient {
    async fn translate(&self, text: &str, language: &str) -> Result<String, ServiceError> {
        let form = Form::new()
            .text("text", text.to_string())
            .text("target_language", language.to_string());
        let body: TranslationResponse = self.post_form("/translate/text", form).await?;
        Ok(body.translation)
    }
}
