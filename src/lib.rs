//! docqa-rag - 문서 질의응답 RAG 엔진
//!
//! 약관/법률 문서를 조항 단위로 청킹하고, 사용 가능한 유사도 인덱스
//! (임베딩 → TF-IDF → 어휘 중첩)로 검색한 뒤 Gemini로 답변을 생성합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod retrieval;

// Re-exports
pub use config::Settings;
pub use embedding::{create_embedder, EmbeddingProvider, GeminiEmbedding};
pub use error::{Result, RetrievalError};
pub use generation::{create_generator, AnswerGenerator, GeminiGenerator, GenerationOptions};
pub use retrieval::{
    AnswerRecord, Chunker, IndexBackend, IndexKind, IndexSelector, QaRequest, QaResponse,
    QueryHit, RetrievalPipeline, SimilarityIndex, SourceDocument,
};
