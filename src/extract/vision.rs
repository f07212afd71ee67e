//! Vision-model document analysis.
//!
//! Sends the raw document bytes to a chat-completions endpoint as a base64
//! data URL and asks for an exhaustive plain-text rendering plus a short
//! `## SUMMARY` section. The analysis text is treated as page 1 content by
//! the extraction composer; text-layer pages refine the attribution when
//! available.

use std::sync::LazyLock;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::types::GroundError;

const ANALYSIS_PROMPT: &str = "Read the attached disclosure document completely. \
Transcribe every figure, date, name, table, and resolution you can see, in plain text, \
preserving table structure with pipe-delimited rows. \
Do not omit or summarize numeric detail. \
End with a section titled '## SUMMARY' containing two or three sentences.";

static SUMMARY_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)##\s*SUMMARY\s*\n(.*?)(?:\n##|\z)").expect("summary section"));

/// Result of one vision pass: the full transcription and the parsed summary.
#[derive(Clone, Debug, PartialEq)]
pub struct VisionAnalysis {
    pub text: String,
    pub summary: String,
}

pub struct VisionExtractor {
    client: reqwest::Client,
    completions_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl VisionExtractor {
    pub fn new(
        completions_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            completions_url: completions_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Runs one analysis pass over the document bytes.
    pub async fn analyze(&self, document: &[u8]) -> Result<VisionAnalysis, GroundError> {
        let data_url = format!(
            "data:application/pdf;base64,{}",
            BASE64.encode(document)
        );

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": ANALYSIS_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_url } },
                    ],
                }],
            }))
            .send()
            .await
            .map_err(|err| GroundError::Extraction(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GroundError::Extraction(format!(
                "vision endpoint returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct CompletionResponse {
            #[serde(default)]
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }

        #[derive(Deserialize)]
        struct Message {
            #[serde(default)]
            content: String,
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|err| GroundError::Extraction(err.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GroundError::Extraction(
                "vision endpoint returned empty analysis".to_string(),
            ));
        }

        let summary = parse_summary(&text);
        Ok(VisionAnalysis { text, summary })
    }
}

/// Pulls the `## SUMMARY` section out of an analysis, empty when absent.
pub fn parse_summary(analysis: &str) -> String {
    SUMMARY_SECTION
        .captures(analysis)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
