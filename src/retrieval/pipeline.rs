//! Retrieval Pipeline - 청킹 → 인덱싱 → 질문별 검색 → 생성 → 채점
//!
//! 요청마다 인덱스를 새로 구축하고, 질문은 서로 독립적으로 처리합니다.
//! 질문 하나의 실패는 폴백 레코드로 대체되며 다른 질문에 영향을 주지 않습니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{Result, RetrievalError};
use crate::generation::AnswerGenerator;

use super::chunker::{clause_chunker, default_chunker, Chunker};
use super::index::SimilarityIndex;
use super::scorer::{extract_source_chunks, score_answer};
use super::selector::IndexBackend;
use super::types::{
    AnswerRecord, QaRequest, QaResponse, QueryHit, RequestLimits, ResponseMetadata,
    SourceDocument,
};

/// 생성 실패 시 답변
pub const FALLBACK_ANSWER: &str =
    "An error occurred while processing this question. Please try again.";
/// 생성 실패 시 근거 레이블
pub const FALLBACK_RATIONALE: &str = "Answer generation failed";

/// 컨텍스트 패시지 구분자
const CONTEXT_SEPARATOR: &str = "\n\n";

// ============================================================================
// RetrievalPipeline
// ============================================================================

/// 질의응답 파이프라인
pub struct RetrievalPipeline {
    backend: IndexBackend,
    generator: Arc<dyn AnswerGenerator>,
    chunker: Box<dyn Chunker>,
    top_k: usize,
    concurrency: usize,
    limits: RequestLimits,
}

impl RetrievalPipeline {
    /// 기본 설정으로 생성 (top_k 5, 동시 질문 4개)
    pub fn new(backend: IndexBackend, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            backend,
            generator,
            chunker: default_chunker(),
            top_k: 5,
            concurrency: 4,
            limits: RequestLimits::default(),
        }
    }

    /// 설정값 반영
    pub fn from_settings(
        settings: &Settings,
        backend: IndexBackend,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            backend,
            generator,
            chunker: clause_chunker(settings.chunk_config()),
            top_k: settings.top_k,
            concurrency: settings.question_concurrency,
            limits: settings.limits,
        }
    }

    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 선택된 인덱스 종류
    pub fn backend(&self) -> &IndexBackend {
        &self.backend
    }

    /// 모든 문서를 청킹해 하나의 패시지 목록으로 결합
    pub fn chunk_documents(&self, documents: &[SourceDocument]) -> Vec<String> {
        chunk_documents(self.chunker.as_ref(), documents)
    }

    /// 문서로 인덱스 구축
    ///
    /// 패시지가 하나도 없으면 `NoContent` 에러입니다.
    pub async fn build_index(
        &self,
        documents: &[SourceDocument],
    ) -> Result<Box<dyn SimilarityIndex>> {
        build_index(&self.backend, self.chunker.as_ref(), documents).await
    }

    /// 생성 없이 검색만 수행
    pub async fn search(
        &self,
        documents: &[SourceDocument],
        query: &str,
        top_k: usize,
    ) -> Result<Vec<QueryHit>> {
        let index = self.build_index(documents).await?;
        index.query(query, top_k).await
    }

    /// 질문 목록에 답변 (입력 순서 유지)
    pub async fn answer_questions(
        &self,
        documents: &[SourceDocument],
        questions: &[String],
    ) -> Result<Vec<AnswerRecord>> {
        let index = self.build_index(documents).await?;
        Ok(self.answer_with_index(index.as_ref(), questions).await)
    }

    /// 검증 → 답변 → 응답 생성
    pub async fn run(&self, request: QaRequest) -> Result<QaResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("qa_request", %request_id);

        self.process(request_id, request).instrument(span).await
    }

    async fn process(&self, request_id: Uuid, request: QaRequest) -> Result<QaResponse> {
        let started = Instant::now();
        let request = request.validate(&self.limits)?;
        tracing::info!(
            "Processing {} documents, {} questions",
            request.documents.len(),
            request.questions.len()
        );

        let index = self.build_index(&request.documents).await?;
        let answers = self
            .answer_with_index(index.as_ref(), &request.questions)
            .await;
        let stats = index.stats();

        let processing_time = started.elapsed().as_secs_f64();
        tracing::info!(
            "Answered {} questions in {:.2}s",
            answers.len(),
            processing_time
        );

        Ok(QaResponse {
            request_id,
            answers,
            processing_time,
            status: "success".to_string(),
            timestamp: Utc::now(),
            metadata: ResponseMetadata {
                index_backend: stats.kind.to_string(),
                passage_count: stats.passage_count,
            },
        })
    }

    async fn answer_with_index(
        &self,
        index: &dyn SimilarityIndex,
        questions: &[String],
    ) -> Vec<AnswerRecord> {
        stream::iter(questions)
            .map(|question| self.answer_one(index, question))
            .buffered(self.concurrency.max(1))
            .collect()
            .await
    }

    /// 질문 하나 처리 (실패 시 폴백 레코드)
    async fn answer_one(&self, index: &dyn SimilarityIndex, question: &str) -> AnswerRecord {
        match self.try_answer(index, question).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    "Failed to answer question '{}' ({}): {}",
                    question,
                    self.generator.name(),
                    e
                );
                fallback_record(question)
            }
        }
    }

    async fn try_answer(&self, index: &dyn SimilarityIndex, question: &str) -> Result<AnswerRecord> {
        let hits = index.query(question, self.top_k).await?;
        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let answer = self
            .generator
            .generate(question, &context)
            .await
            .map_err(|e| RetrievalError::Generation(format!("{:#}", e)))?;

        let (confidence, rationale) = score_answer(&answer, &context, question);
        tracing::debug!(
            "Answered with confidence {:.2} from {} passages",
            confidence,
            hits.len()
        );

        Ok(AnswerRecord {
            question: question.to_string(),
            answer: answer.trim().to_string(),
            confidence,
            source_chunks: extract_source_chunks(&context),
            rationale: rationale.to_string(),
        })
    }
}

/// 생성 실패 레코드
pub fn fallback_record(question: &str) -> AnswerRecord {
    AnswerRecord {
        question: question.to_string(),
        answer: FALLBACK_ANSWER.to_string(),
        confidence: 0.0,
        source_chunks: Vec::new(),
        rationale: FALLBACK_RATIONALE.to_string(),
    }
}

// ============================================================================
// Chunk & Build
// ============================================================================

/// 모든 문서를 청킹해 하나의 패시지 목록으로 결합
///
/// 결합 이후에는 문서 경계를 추적하지 않습니다.
pub fn chunk_documents(chunker: &dyn Chunker, documents: &[SourceDocument]) -> Vec<String> {
    tracing::debug!(
        "Chunking {} documents with {}",
        documents.len(),
        chunker.name()
    );

    let mut passages = Vec::new();
    for (i, doc) in documents.iter().enumerate() {
        let chunks = chunker.chunk(&doc.content);
        tracing::debug!(
            "Document {} ({}) produced {} passages",
            i,
            doc.doc_type.as_str(),
            chunks.len()
        );
        passages.extend(chunks.into_iter().map(|p| p.text));
    }
    passages
}

/// 청킹 후 선택된 인덱스 종류로 새 인덱스 구축
///
/// 패시지가 하나도 없으면 `NoContent` 에러입니다.
pub async fn build_index(
    backend: &IndexBackend,
    chunker: &dyn Chunker,
    documents: &[SourceDocument],
) -> Result<Box<dyn SimilarityIndex>> {
    let passages = chunk_documents(chunker, documents);
    if passages.is_empty() {
        tracing::warn!(
            "No passages extracted from {} documents",
            documents.len()
        );
        return Err(RetrievalError::NoContent);
    }

    let mut index = backend.create_index();
    index.build(passages).await?;
    Ok(index)
}

// ============================================================================
// Tests
// ============================================================================
