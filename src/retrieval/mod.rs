//! 검색 코어 모듈
//!
//! 청킹, 세 가지 유사도 인덱스, 인덱스 선택, 파이프라인, 답변 채점을 제공합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! use docqa_rag::retrieval::{IndexSelector, RetrievalPipeline};
//!
//! let backend = IndexSelector::from_settings(&settings).select().await;
//! let pipeline = RetrievalPipeline::from_settings(&settings, backend, generator);
//! let records = pipeline.answer_questions(&documents, &questions).await?;
//! ```

pub mod chunker;
pub mod dense;
pub mod index;
pub mod lexical;
pub mod pipeline;
pub mod scorer;
pub mod selector;
pub mod tfidf;
pub mod types;

pub use chunker::{
    clause_chunker, default_chunker, normalize_whitespace, ChunkConfig, Chunker, ClauseChunker,
};
pub use dense::EmbeddingIndex;
pub use index::{IndexKind, IndexStats, SimilarityIndex};
pub use lexical::LexicalIndex;
pub use pipeline::{
    build_index, chunk_documents, fallback_record, RetrievalPipeline, FALLBACK_ANSWER,
    FALLBACK_RATIONALE,
};
pub use scorer::{extract_source_chunks, score_answer, Rationale};
pub use selector::{IndexBackend, IndexCandidate, IndexSelector};
pub use tfidf::{TfidfConfig, TfidfIndex};
pub use types::{
    AnswerRecord, DocumentType, Passage, QaRequest, QaResponse, QueryHit, RequestLimits,
    ResponseMetadata, SourceDocument,
};
