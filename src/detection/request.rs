//! Wire format of the `generateContent` endpoint.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{detection::ClassificationVerdict, error::ClassificationError, raster::SourceImage};

pub const FORENSIC_PROMPT: &str = r#"You are a world-class digital forensics expert. Provide an expert interpretation of the attached image, keeping in mind that it may have been re-compressed by social media platforms, which can erase subtle forensic data.

Focus your analysis on these areas:

1. Visual inspection: look for visual giveaways of AI generation such as unnatural skin or hair textures, inconsistent lighting and shadows, distorted backgrounds, anatomical impossibilities (for example hands with six fingers) and logical inconsistencies. This is the primary tool for heavily compressed images.

2. Noise and statistical analysis: examine noise patterns. Real photos carry characteristic sensor noise, while AI images often look unnaturally clean or carry uniform, artificial noise. If the image looks too clean or the noise is too uniform, treat it as a possible sign of "compression laundering" used to hide a forgery.

3. Model fingerprint analysis: look for subtle artifacts that act as fingerprints of specific generative models, such as faint checkerboard patterns.

Then give a final verdict ('isAI') and an integer confidence score between 0 and 100.
- If 'isAI' is true, the confidence is your certainty that the content is AI-generated.
- If 'isAI' is false, the confidence is your certainty that the content is authentic.

Frame the overall justification by acknowledging the limits of analysing compressed images, for example: "The image has likely been re-compressed, which can mask forensic artifacts. However, based on the clear visual inconsistencies in [specific area], we can conclude..."

Output a single JSON object with exactly this schema:
{
  "isAI": boolean,
  "confidence": number,
  "overallJustification": string,
  "visualAnalysis": { "verdict": string, "explanation": string },
  "noiseAnalysis": { "verdict": string, "explanation": string },
  "fingerprintAnalysis": { "verdict": string, "explanation": string }
}"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

impl GenerateContentRequest {
    pub fn for_image(image: &SourceImage) -> Self {
        Self {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![
                    RequestPart::Text {
                        text: FORENSIC_PROMPT.into(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime().as_str().into(),
                            data: STANDARD.encode(image.bytes()),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".into(),
                response_schema: verdict_schema(),
            },
        }
    }
}

pub fn verdict_schema() -> Value {
    let detail = json!({
        "type": "OBJECT",
        "properties": {
            "verdict": { "type": "STRING" },
            "explanation": { "type": "STRING" }
        }
    });

    json!({
        "type": "OBJECT",
        "properties": {
            "isAI": { "type": "BOOLEAN" },
            "confidence": { "type": "NUMBER" },
            "overallJustification": { "type": "STRING" },
            "visualAnalysis": detail.clone(),
            "noiseAnalysis": detail.clone(),
            "fingerprintAnalysis": detail
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

/// Extracts the JSON-encoded verdict from `candidates[0].content.parts[0].text`.
pub fn parse_verdict(body: &str) -> Result<ClassificationVerdict, ClassificationError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ClassificationError::InvalidResponse(format!("malformed body: {}", e)))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| ClassificationError::InvalidResponse("missing candidate text".into()))?;

    serde_json::from_str(&text)
        .map_err(|e| ClassificationError::InvalidResponse(format!("malformed verdict: {}", e)))
}
