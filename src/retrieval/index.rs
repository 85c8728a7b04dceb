//! Similarity Index - 검색 인덱스 공통 트레이트
//!
//! 임베딩 / TF-IDF / 어휘 중첩 세 가지 구현이 같은 계약을 따릅니다.
//! 인스턴스는 요청마다 새로 만들고 `build` → `query`* 순서로 사용한 뒤 버립니다.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, RetrievalError};

use super::types::QueryHit;

// ============================================================================
// Index Kind
// ============================================================================

/// 인덱스 구현 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// 시맨틱 임베딩 (내적 = 코사인)
    Embedding,
    /// TF-IDF 코사인 유사도
    Tfidf,
    /// 외부 의존성 없는 어휘 중첩 점수
    Lexical,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Embedding => "embedding",
            IndexKind::Tfidf => "tfidf",
            IndexKind::Lexical => "lexical",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" | "semantic" => Ok(IndexKind::Embedding),
            "tfidf" | "tf-idf" => Ok(IndexKind::Tfidf),
            "lexical" | "basic" => Ok(IndexKind::Lexical),
            other => Err(RetrievalError::Config(format!(
                "Unknown index backend: '{other}' (expected embedding, tfidf, lexical)"
            ))),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

/// 인덱스 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub kind: IndexKind,
    /// build 성공 여부
    pub ready: bool,
    pub passage_count: usize,
    /// TF-IDF 어휘 크기
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    /// 임베딩 차원
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

impl IndexStats {
    pub(crate) fn not_ready(kind: IndexKind) -> Self {
        Self {
            kind,
            ready: false,
            passage_count: 0,
            feature_count: None,
            dimension: None,
        }
    }
}

// ============================================================================
// SimilarityIndex Trait
// ============================================================================

/// 유사도 검색 인덱스 트레이트 (async)
///
/// `build`는 `&mut self`, `query`는 `&self`이므로 구축이 끝나기 전에는 질의할 수 없습니다.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// 패시지 목록으로 인덱스 구축 (기존 상태는 대체됨)
    async fn build(&mut self, passages: Vec<String>) -> Result<()>;

    /// 상위 `top_k`개 패시지 검색
    ///
    /// `top_k`는 상한일 뿐이며 조건을 만족하는 패시지가 적으면 더 적게 반환합니다.
    /// 빈 질의는 `EmptyQuery`, 구축 전 호출은 `IndexNotReady` 에러입니다.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>>;

    /// 인덱스 상태
    fn stats(&self) -> IndexStats;

    /// 구현 종류
    fn kind(&self) -> IndexKind;
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 빈 질의 검사
pub(crate) fn require_query(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RetrievalError::EmptyQuery);
    }
    Ok(trimmed)
}

/// 점수 배열에서 상위 `top_k` 결과 생성
///
/// 유한하지 않은 점수는 제외하고, 0 미만 점수는 0으로 올린 뒤 정렬합니다.
/// 점수 내림차순, 동점은 패시지 순번 오름차순입니다.
pub(crate) fn rank_hits(
    passages: &[String],
    scores: &[f32],
    top_k: usize,
    positive_only: bool,
) -> Vec<QueryHit> {
    let mut ranked: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .take(passages.len())
        .filter(|(_, s)| s.is_finite() && (!positive_only || *s > 0.0))
        .map(|(index, score)| (index, if score > 0.0 { score } else { 0.0 }))
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top_k);

    ranked
        .into_iter()
        .map(|(index, score)| QueryHit {
            text: passages[index].clone(),
            score,
            index,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("passage {i}")).collect()
    }

    #[test]
    fn test_index_kind_parse() {
        assert_eq!("embedding".parse::<IndexKind>().unwrap(), IndexKind::Embedding);
        assert_eq!("TF-IDF".parse::<IndexKind>().unwrap(), IndexKind::Tfidf);
        assert_eq!(" lexical ".parse::<IndexKind>().unwrap(), IndexKind::Lexical);
        assert!("faiss".parse::<IndexKind>().is_err());
        assert_eq!(IndexKind::Tfidf.to_string(), "tfidf");
    }

    #[test]
    fn test_rank_hits_ties_keep_passage_order() {
        let hits = rank_hits(&passages(4), &[0.5, 0.9, 0.5, 0.9], 4, false);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_rank_hits_positive_only() {
        let hits = rank_hits(&passages(3), &[0.0, 0.2, -0.1], 5, true);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 1);
    }

    #[test]
    fn test_rank_hits_clamps_negative_and_drops_nan() {
        let hits = rank_hits(&passages(3), &[-0.4, f32::NAN, -0.2], 3, false);
        // 0으로 올린 뒤에는 동점이므로 순번 순서
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 2);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_rank_hits_truncates() {
        let hits = rank_hits(&passages(10), &[1.0; 10], 3, true);
        assert_eq!(hits.len(), 3);
        assert!(rank_hits(&passages(10), &[1.0; 10], 0, true).is_empty());
    }

    #[test]
    fn test_require_query() {
        assert!(matches!(require_query("  "), Err(RetrievalError::EmptyQuery)));
        assert_eq!(require_query(" hi ").unwrap(), "hi");
    }
}
