//! Index Selector - 기능 탐색 기반 인덱스 선택
//!
//! 후보를 순서대로 시험해 처음 사용 가능한 인덱스 종류 하나를 고릅니다.
//! 어휘 중첩 인덱스는 외부 의존성이 없어 항상 마지막 후보로 성공합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let backend = IndexSelector::from_settings(&settings).select().await;
//! let mut index = backend.create_index();
//! index.build(passages).await?;
//! ```

use std::sync::Arc;

use crate::config::Settings;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::{Result, RetrievalError};

use super::dense::EmbeddingIndex;
use super::index::{IndexKind, SimilarityIndex};
use super::lexical::LexicalIndex;
use super::tfidf::{TfidfConfig, TfidfIndex};

/// 임베딩 기능 탐색용 텍스트
const PROBE_TEXT: &str = "capability probe";

// ============================================================================
// IndexBackend
// ============================================================================

/// 선택된 인덱스 종류 핸들
///
/// 프로세스 수명 동안 고정되며, 요청마다 `create_index`로 새 인덱스를 만듭니다.
#[derive(Clone)]
pub struct IndexBackend {
    source: BackendSource,
}

#[derive(Clone)]
enum BackendSource {
    Embedding(Arc<dyn EmbeddingProvider>),
    Tfidf(TfidfConfig),
    Lexical,
}

impl IndexBackend {
    pub fn embedding(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            source: BackendSource::Embedding(provider),
        }
    }

    pub fn tfidf(config: TfidfConfig) -> Self {
        Self {
            source: BackendSource::Tfidf(config),
        }
    }

    pub fn lexical() -> Self {
        Self {
            source: BackendSource::Lexical,
        }
    }

    /// 선택된 인덱스 종류
    pub fn kind(&self) -> IndexKind {
        match self.source {
            BackendSource::Embedding(_) => IndexKind::Embedding,
            BackendSource::Tfidf(_) => IndexKind::Tfidf,
            BackendSource::Lexical => IndexKind::Lexical,
        }
    }

    /// 비어 있는(구축 전) 인덱스 인스턴스 생성
    pub fn create_index(&self) -> Box<dyn SimilarityIndex> {
        match &self.source {
            BackendSource::Embedding(provider) => Box::new(EmbeddingIndex::new(provider.clone())),
            BackendSource::Tfidf(config) => Box::new(TfidfIndex::new(config.clone())),
            BackendSource::Lexical => Box::new(LexicalIndex::new()),
        }
    }
}

impl std::fmt::Debug for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBackend")
            .field("kind", &self.kind())
            .finish()
    }
}

// ============================================================================
// IndexSelector
// ============================================================================

/// 선택 후보
pub enum IndexCandidate {
    /// 임베딩 프로바이더 (생성 실패 시 그 에러)
    Embedding(anyhow::Result<Arc<dyn EmbeddingProvider>>),
    Tfidf(TfidfConfig),
    Lexical,
}

impl IndexCandidate {
    fn kind(&self) -> IndexKind {
        match self {
            IndexCandidate::Embedding(_) => IndexKind::Embedding,
            IndexCandidate::Tfidf(_) => IndexKind::Tfidf,
            IndexCandidate::Lexical => IndexKind::Lexical,
        }
    }

    /// 후보의 의존 기능 확인
    async fn probe(self) -> Result<IndexBackend> {
        match self {
            IndexCandidate::Embedding(provider) => {
                let provider = provider.map_err(|e| unavailable(IndexKind::Embedding, e))?;
                let vector = provider
                    .embed_query(PROBE_TEXT)
                    .await
                    .map_err(|e| unavailable(IndexKind::Embedding, e))?;
                if vector.len() != provider.dimension() {
                    return Err(unavailable(
                        IndexKind::Embedding,
                        format!(
                            "probe returned dimension {}, expected {}",
                            vector.len(),
                            provider.dimension()
                        ),
                    ));
                }
                Ok(IndexBackend::embedding(provider))
            }
            IndexCandidate::Tfidf(config) => {
                config.validate()?;
                Ok(IndexBackend::tfidf(config))
            }
            IndexCandidate::Lexical => Ok(IndexBackend::lexical()),
        }
    }
}

fn unavailable(kind: IndexKind, reason: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::CapabilityUnavailable {
        backend: kind.as_str().to_string(),
        reason: format!("{:#}", reason),
    }
}

/// 순서 있는 후보 목록으로 인덱스 종류를 선택
pub struct IndexSelector {
    candidates: Vec<IndexCandidate>,
}

impl IndexSelector {
    /// 후보 목록으로 생성 (어휘 중첩 후보가 없으면 마지막에 추가)
    pub fn new(mut candidates: Vec<IndexCandidate>) -> Self {
        if !candidates
            .iter()
            .any(|c| matches!(c, IndexCandidate::Lexical))
        {
            candidates.push(IndexCandidate::Lexical);
        }
        Self { candidates }
    }

    /// 설정의 `index_backends` 순서로 후보 구성
    pub fn from_settings(settings: &Settings) -> Self {
        let candidates = settings
            .index_backends
            .iter()
            .map(|kind| match kind {
                IndexKind::Embedding => IndexCandidate::Embedding(
                    create_embedder(settings)
                        .map(|e| Arc::new(e) as Arc<dyn EmbeddingProvider>),
                ),
                IndexKind::Tfidf => IndexCandidate::Tfidf(TfidfConfig::default()),
                IndexKind::Lexical => IndexCandidate::Lexical,
            })
            .collect();
        Self::new(candidates)
    }

    /// 후보 종류 목록 (시험 순서)
    pub fn candidates(&self) -> Vec<IndexKind> {
        self.candidates.iter().map(IndexCandidate::kind).collect()
    }

    /// 첫 번째로 사용 가능한 후보 선택
    pub async fn select(self) -> IndexBackend {
        for candidate in self.candidates {
            let kind = candidate.kind();
            match candidate.probe().await {
                Ok(backend) => {
                    tracing::info!("Similarity index selected: {}", kind);
                    return backend;
                }
                Err(e) => {
                    tracing::warn!("Index candidate '{}' rejected: {}", kind, e);
                }
            }
        }

        tracing::info!("Similarity index selected: {}", IndexKind::Lexical);
        IndexBackend::lexical()
    }
}

// ============================================================================
// Tests
// ============================================================================
