//! 검색 코어 데이터 모델
//!
//! 패시지, 검색 결과, 요청/응답, 답변 레코드 타입입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RetrievalError};

// ============================================================================
// Passage / Query Result
// ============================================================================

/// 청커가 만든 검색 단위
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// 문서 내 순번 (0-based)
    pub position: usize,
    /// 패시지 텍스트
    pub text: String,
}

/// 유사도 검색 결과 한 건
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    /// 패시지 텍스트
    pub text: String,
    /// 관련도 점수 (0 이상, 높을수록 관련)
    pub score: f32,
    /// 인덱스에 입력된 패시지 순번
    pub index: usize,
}

// ============================================================================
// Request
// ============================================================================

/// 문서 종류 태그
///
/// 텍스트 추출은 외부 협력자가 수행하며, 코어는 이미 디코딩된 텍스트만 받습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Url,
    Text,
    Docx,
    Html,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Url => "url",
            DocumentType::Text => "text",
            DocumentType::Docx => "docx",
            DocumentType::Html => "html",
        }
    }
}

/// (문서 종류, 추출된 텍스트) 쌍
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    /// 추출된 원문 텍스트
    pub content: String,
}

impl SourceDocument {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            doc_type: DocumentType::Text,
            content: content.into(),
        }
    }
}

/// 요청 크기 제한
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_documents: usize,
    pub max_questions: usize,
    /// 문서당 최대 바이트 수
    pub max_content_size: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_documents: 10,
            max_questions: 20,
            max_content_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// 질의응답 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRequest {
    pub documents: Vec<SourceDocument>,
    pub questions: Vec<String>,
}

impl QaRequest {
    /// 요청 검증 및 질문 정규화 (앞뒤 공백 제거)
    pub fn validate(mut self, limits: &RequestLimits) -> Result<Self> {
        if self.documents.is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "At least one document is required".into(),
            ));
        }
        if self.documents.len() > limits.max_documents {
            return Err(RetrievalError::InvalidRequest(format!(
                "Too many documents: {} (max {})",
                self.documents.len(),
                limits.max_documents
            )));
        }
        if let Some((i, doc)) = self
            .documents
            .iter()
            .enumerate()
            .find(|(_, d)| d.content.len() > limits.max_content_size)
        {
            return Err(RetrievalError::InvalidRequest(format!(
                "Document {} exceeds {} bytes ({} bytes)",
                i,
                limits.max_content_size,
                doc.content.len()
            )));
        }

        if self.questions.is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "At least one question is required".into(),
            ));
        }
        if self.questions.len() > limits.max_questions {
            return Err(RetrievalError::InvalidRequest(format!(
                "Too many questions: {} (max {})",
                self.questions.len(),
                limits.max_questions
            )));
        }

        let mut questions = Vec::with_capacity(self.questions.len());
        for question in &self.questions {
            let trimmed = question.trim();
            if trimmed.is_empty() {
                return Err(RetrievalError::InvalidRequest("Questions cannot be empty".into()));
            }
            questions.push(trimmed.to_string());
        }
        self.questions = questions;

        Ok(self)
    }
}

// ============================================================================
// Answer / Response
// ============================================================================

/// 질문 하나에 대한 답변 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f32,
    /// 근거 패시지 (최대 3개)
    pub source_chunks: Vec<String>,
    pub rationale: String,
}

/// 응답 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// 사용된 인덱스 종류
    pub index_backend: String,
    /// 인덱싱된 패시지 수
    pub passage_count: usize,
}

/// 질의응답 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub request_id: Uuid,
    pub answers: Vec<AnswerRecord>,
    /// 처리 시간 (초)
    pub processing_time: f64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: ResponseMetadata,
}

// ============================================================================
// Tests
// ============================================================================
