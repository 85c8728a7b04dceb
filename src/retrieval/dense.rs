//! 임베딩 인덱스 - 정규화된 밀집 벡터의 내적 검색
//!
//! 모든 패시지를 한 번의 배치 호출로 임베딩하고, L2 정규화 후 평탄한 행렬로 보관합니다.
//! 행이 정규화되어 있으므로 내적이 곧 코사인 유사도입니다.

use std::sync::Arc;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RetrievalError};

use super::index::{rank_hits, require_query, IndexKind, IndexStats, SimilarityIndex};
use super::types::QueryHit;

/// 행 우선 평탄 행렬 (`rows * dimension`)
struct DenseMatrix {
    dimension: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.max(1))
    }
}

/// 임베딩 인덱스
pub struct EmbeddingIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    passages: Vec<String>,
    matrix: Option<DenseMatrix>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            passages: Vec::new(),
            matrix: None,
        }
    }

    fn build_error(&self, message: impl Into<String>) -> RetrievalError {
        RetrievalError::IndexBuild {
            backend: IndexKind::Embedding.as_str().to_string(),
            message: message.into(),
        }
    }

    fn embedding_error(&self, message: impl Into<String>) -> RetrievalError {
        RetrievalError::Embedding {
            provider: self.embedder.name().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl SimilarityIndex for EmbeddingIndex {
    async fn build(&mut self, passages: Vec<String>) -> Result<()> {
        self.matrix = None;
        self.passages.clear();

        let dimension = self.embedder.dimension();
        if passages.is_empty() {
            tracing::info!("Embedding index built with 0 passages");
            self.matrix = Some(DenseMatrix {
                dimension,
                data: Vec::new(),
            });
            return Ok(());
        }

        let vectors = self
            .embedder
            .embed_batch(&passages)
            .await
            .map_err(|e| self.build_error(format!("{:#}", e)))?;

        if vectors.len() != passages.len() {
            return Err(self.build_error(format!(
                "provider returned {} vectors for {} passages",
                vectors.len(),
                passages.len()
            )));
        }

        let mut data = Vec::with_capacity(passages.len() * dimension);
        for (i, mut vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(self.build_error(format!(
                    "passage {} has dimension {}, expected {}",
                    i,
                    vector.len(),
                    dimension
                )));
            }
            l2_normalize(&mut vector);
            data.extend_from_slice(&vector);
        }

        tracing::info!(
            "Embedding index built with {} passages (dimension: {})",
            passages.len(),
            dimension
        );

        self.passages = passages;
        self.matrix = Some(DenseMatrix { dimension, data });
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let matrix = self.matrix.as_ref().ok_or(RetrievalError::IndexNotReady)?;
        let text = require_query(text)?;

        if self.passages.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut query = self
            .embedder
            .embed_query(text)
            .await
            .map_err(|e| self.embedding_error(format!("{:#}", e)))?;

        if query.len() != matrix.dimension {
            return Err(self.embedding_error(format!(
                "query vector has dimension {}, expected {}",
                query.len(),
                matrix.dimension
            )));
        }
        l2_normalize(&mut query);

        let scores: Vec<f32> = matrix.rows().map(|row| dot(row, &query)).collect();
        let hits = rank_hits(&self.passages, &scores, top_k, false);
        tracing::debug!("Embedding query returned {} passages", hits.len());
        Ok(hits)
    }

    fn stats(&self) -> IndexStats {
        match &self.matrix {
            Some(matrix) => IndexStats {
                kind: IndexKind::Embedding,
                ready: true,
                passage_count: self.passages.len(),
                feature_count: None,
                dimension: Some(matrix.dimension),
            },
            None => IndexStats::not_ready(IndexKind::Embedding),
        }
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Embedding
    }
}

// ============================================================================
// Vector Math
// ============================================================================

/// 벡터를 단위 길이로 정규화 (영벡터는 그대로)
fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Tests
// ============================================================================
