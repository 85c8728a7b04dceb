//! 설정 모듈 - 환경변수 기반 런타임 설정
//!
//! 모든 값은 환경변수에서 읽으며, 없으면 기본값을 사용합니다.
//! CLI는 시작 시 `.env` 파일을 프로세스 환경에 먼저 적재합니다.
//! 테스트에서는 `Settings::from_lookup`으로 환경을 건드리지 않고 주입합니다.

use std::str::FromStr;

use crate::error::{Result, RetrievalError};
use crate::retrieval::{ChunkConfig, IndexKind, RequestLimits};

/// 기본 생성 모델
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// 지원하는 임베딩 차원 (gemini-embedding-001 MRL)
pub const VALID_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

// ============================================================================
// Settings
// ============================================================================

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gemini API 키 (없으면 임베딩 인덱스와 답변 생성 불가)
    pub api_key: Option<String>,
    /// 답변 생성 모델
    pub generation_model: String,
    /// 임베딩 모델
    pub embedding_model: String,
    /// 임베딩 차원
    pub embedding_dimension: usize,
    /// 생성 최대 출력 토큰
    pub max_tokens: u32,
    /// 생성 temperature
    pub temperature: f32,
    /// 청킹 윈도우 크기 (문자 수)
    pub chunk_size: usize,
    /// 청킹 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 질문당 검색 패시지 수
    pub top_k: usize,
    /// 인덱스 후보 순서
    pub index_backends: Vec<IndexKind>,
    /// 동시에 처리할 질문 수
    pub question_concurrency: usize,
    /// 요청 크기 제한
    pub limits: RequestLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: 768,
            max_tokens: 500,
            temperature: 0.1,
            chunk_size: 800,
            chunk_overlap: 150,
            top_k: 5,
            index_backends: vec![IndexKind::Embedding, IndexKind::Tfidf, IndexKind::Lexical],
            question_concurrency: 4,
            limits: RequestLimits::default(),
        }
    }
}

impl Settings {
    /// 프로세스 환경변수에서 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let index_backends = match non_empty(&lookup, "INDEX_BACKENDS") {
            Some(raw) => parse_backends(&raw)?,
            None => defaults.index_backends,
        };

        let settings = Self {
            api_key: resolve_api_key(&lookup),
            generation_model: non_empty(&lookup, "GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            embedding_model: non_empty(&lookup, "EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_var(
                &lookup,
                "EMBEDDING_DIMENSION",
                defaults.embedding_dimension,
            )?,
            max_tokens: parse_var(&lookup, "MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse_var(&lookup, "TEMPERATURE", defaults.temperature)?,
            chunk_size: parse_var(&lookup, "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_var(&lookup, "TOP_K_RESULTS", defaults.top_k)?,
            index_backends,
            question_concurrency: parse_var(
                &lookup,
                "QUESTION_CONCURRENCY",
                defaults.question_concurrency,
            )?,
            limits: RequestLimits {
                max_documents: parse_var(
                    &lookup,
                    "MAX_DOCUMENTS",
                    defaults.limits.max_documents,
                )?,
                max_questions: parse_var(
                    &lookup,
                    "MAX_QUESTIONS",
                    defaults.limits.max_questions,
                )?,
                max_content_size: parse_var(
                    &lookup,
                    "MAX_CONTENT_SIZE",
                    defaults.limits.max_content_size,
                )?,
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// 설정값 일관성 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RetrievalError::Config("CHUNK_SIZE must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RetrievalError::Config(format!(
                "CHUNK_OVERLAP ({}) must be less than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RetrievalError::Config("TOP_K_RESULTS must be greater than zero".into()));
        }
        if self.question_concurrency == 0 {
            return Err(RetrievalError::Config(
                "QUESTION_CONCURRENCY must be greater than zero".into(),
            ));
        }
        if !VALID_DIMENSIONS.contains(&self.embedding_dimension) {
            return Err(RetrievalError::Config(format!(
                "EMBEDDING_DIMENSION must be one of {:?}, got {}",
                VALID_DIMENSIONS, self.embedding_dimension
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RetrievalError::Config(format!(
                "TEMPERATURE must be within [0.0, 2.0], got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    /// API 키 존재 여부
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// 청커 설정
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            window_size: self.chunk_size,
            overlap: self.chunk_overlap,
            ..ChunkConfig::default()
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// API 키 조회
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
fn resolve_api_key<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = non_empty(lookup, "GEMINI_API_KEY") {
        tracing::debug!("Using API key from GEMINI_API_KEY");
        return Some(key);
    }

    if let Some(key) = non_empty(lookup, "GOOGLE_AI_API_KEY") {
        tracing::debug!("Using API key from GOOGLE_AI_API_KEY");
        return Some(key);
    }

    None
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| RetrievalError::Config(format!("{key}='{raw}': {e}"))),
        None => Ok(default),
    }
}

/// 쉼표로 구분된 인덱스 후보 목록 파싱 (예: "tfidf,lexical")
fn parse_backends(raw: &str) -> Result<Vec<IndexKind>> {
    let mut backends = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = name.parse::<IndexKind>()?;
        if !backends.contains(&kind) {
            backends.push(kind);
        }
    }
    if backends.is_empty() {
        return Err(RetrievalError::Config("INDEX_BACKENDS is empty".into()));
    }
    Ok(backends)
}

// ============================================================================
// Tests
// ============================================================================
