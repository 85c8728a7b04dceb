//! 답변 생성 모듈 - Gemini generateContent 호출
//!
//! 질문과 검색된 컨텍스트로 프롬프트를 만들고 단일 텍스트 응답을 받습니다.
//! 생성 호출은 재시도하지 않으며, 실패는 파이프라인에서 질문 단위로 처리됩니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::embedding::{GeminiError, GEMINI_API_BASE};

// ============================================================================
// AnswerGenerator Trait
// ============================================================================

/// 답변 생성기 트레이트
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// (질문, 컨텍스트)로 답변 텍스트 생성
    ///
    /// 빈 응답이나 텍스트가 아닌 응답은 에러입니다.
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// 생성기 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Options
// ============================================================================

/// 생성 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 500,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

/// 컨텍스트에 답이 없을 때 모델이 사용하는 고정 문장
pub const NO_ANSWER_SENTENCE: &str =
    "The document does not provide a specific answer to this question.";

/// 답변 생성 프롬프트
const ANSWER_PROMPT: &str = r#"You are an expert analyst of insurance, legal, HR and compliance documents.
Answer the question using ONLY the document context below.

Instructions:
1. Quote exact amounts, percentages, time periods and limits when they appear
2. Reference the section, clause or paragraph that supports the answer
3. Keep the answer concise and factual
4. If the context does not contain the answer, reply exactly: "{no_answer}"

Document context:
{context}

Question: {question}

Answer:"#;

/// 프롬프트 구성
pub fn build_prompt(question: &str, context: &str) -> String {
    ANSWER_PROMPT
        .replace("{no_answer}", NO_ANSWER_SENTENCE)
        .replace("{context}", context)
        .replace("{question}", question)
}

// ============================================================================
// Gemini Generator
// ============================================================================

/// Gemini 답변 생성기
#[derive(Debug)]
pub struct GeminiGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
    options: GenerationOptions,
}

impl GeminiGenerator {
    pub fn new(
        api_key: String,
        model: impl Into<String>,
        options: GenerationOptions,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            client,
            options,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model)
    }

    fn build_request(&self, question: &str, context: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![TextPart {
                    text: build_prompt(question, context),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_output_tokens,
                top_p: self.options.top_p,
                top_k: self.options.top_k,
            },
        }
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let request = self.build_request(question, context);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                anyhow::bail!(
                    "Gemini API error ({}): {}",
                    error.error.status,
                    error.error.message
                );
            }
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;
        extract_text(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 첫 번째 후보의 텍스트 파트 결합
fn extract_text(response: GenerateResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("Generation response has no candidates")?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Generation returned an empty completion");
    }
    Ok(text.to_string())
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에서 생성기 생성
pub fn create_generator(settings: &Settings) -> Result<GeminiGenerator> {
    let Some(api_key) = settings.api_key.clone() else {
        anyhow::bail!(
            "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
             Answer generation requires a Gemini API key."
        );
    };

    let options = GenerationOptions {
        temperature: settings.temperature,
        max_output_tokens: settings.max_tokens,
        ..GenerationOptions::default()
    };
    GeminiGenerator::new(api_key, settings.generation_model.clone(), options)
}

// ============================================================================
// Tests
// ============================================================================
