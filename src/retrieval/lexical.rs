//! 어휘 중첩 인덱스 - 외부 의존성 없는 최종 폴백
//!
//! 학습된 모델 없이 질의 토큰과 패시지 토큰의 일치/부분 일치로 점수를 계산합니다.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Result, RetrievalError};

use super::index::{rank_hits, require_query, IndexKind, IndexStats, SimilarityIndex};
use super::types::QueryHit;

/// 정확 일치 가중치 (패시지 내 출현 횟수만큼 곱함)
const EXACT_WEIGHT: f32 = 2.0;
/// 패시지 토큰이 질의 토큰을 포함
const PARTIAL_WEIGHT: f32 = 0.5;
/// 질의 토큰이 패시지 토큰을 포함
const FUZZY_WEIGHT: f32 = 0.3;

/// 토큰화된 패시지
struct TokenizedPassage {
    tokens: Vec<String>,
    counts: HashMap<String, usize>,
}

/// 어휘 중첩 인덱스
#[derive(Default)]
pub struct LexicalIndex {
    passages: Vec<String>,
    tokenized: Option<Vec<TokenizedPassage>>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 패시지 하나의 점수
    fn score(query_tokens: &[String], passage: &TokenizedPassage) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }

        let mut score = 0.0;
        for token in query_tokens {
            if let Some(&count) = passage.counts.get(token) {
                score += count as f32 * EXACT_WEIGHT;
            } else if passage.tokens.iter().any(|t| t.contains(token.as_str())) {
                score += PARTIAL_WEIGHT;
            } else if passage.tokens.iter().any(|t| token.contains(t.as_str())) {
                score += FUZZY_WEIGHT;
            }
        }

        score /= query_tokens.len() as f32;

        // 짧고 집중된 패시지 가산
        if !passage.tokens.is_empty() {
            score *= 1.0 + 1.0 / passage.tokens.len() as f32;
        }

        score
    }
}

#[async_trait]
impl SimilarityIndex for LexicalIndex {
    async fn build(&mut self, passages: Vec<String>) -> Result<()> {
        let tokenized = passages
            .iter()
            .map(|p| {
                let tokens = tokenize(p);
                let mut counts = HashMap::new();
                for token in &tokens {
                    *counts.entry(token.clone()).or_insert(0) += 1;
                }
                TokenizedPassage { tokens, counts }
            })
            .collect();

        tracing::info!("Lexical index built with {} passages", passages.len());

        self.passages = passages;
        self.tokenized = Some(tokenized);
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let tokenized = self.tokenized.as_ref().ok_or(RetrievalError::IndexNotReady)?;
        let text = require_query(text)?;

        let query_tokens = tokenize(text);
        let scores: Vec<f32> = tokenized
            .iter()
            .map(|p| Self::score(&query_tokens, p))
            .collect();

        let hits = rank_hits(&self.passages, &scores, top_k, true);
        tracing::debug!("Lexical query matched {} passages", hits.len());
        Ok(hits)
    }

    fn stats(&self) -> IndexStats {
        match self.tokenized {
            Some(_) => IndexStats {
                kind: IndexKind::Lexical,
                ready: true,
                passage_count: self.passages.len(),
                feature_count: None,
                dimension: None,
            },
            None => IndexStats::not_ready(IndexKind::Lexical),
        }
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Lexical
    }
}

/// 소문자화 후 문장부호를 공백으로 바꾸고, 3자 이상 토큰만 남김
fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_passages() -> Vec<String> {
        vec![
            "Section 1: The deductible is $500.".to_string(),
            "Section 2: Exclusions include cosmetic surgery.".to_string(),
        ]
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Section 1: The deductible is $500."),
            vec!["section", "the", "deductible", "500"]
        );
        assert!(tokenize("a an is").is_empty());
    }

    #[tokio::test]
    async fn test_deductible_ranks_first() {
        let mut index = LexicalIndex::new();
        index.build(policy_passages()).await.unwrap();

        let hits = index.query("What is the deductible?", 5).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].index, 0);
        assert!(hits.iter().all(|h| h.index != 1 || h.score < hits[0].score));
    }

    #[tokio::test]
    async fn test_score_formula() {
        let mut index = LexicalIndex::new();
        index.build(policy_passages()).await.unwrap();

        // the(2.0) + deductible(2.0) + what(0) = 4.0 / 3 토큰, 4 토큰 패시지 가산
        let hits = index.query("What is the deductible?", 5).await.unwrap();
        let expected = 4.0 / 3.0 * (1.0 + 1.0 / 4.0);
        assert!((hits[0].score - expected).abs() < 1e-5);
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_and_fuzzy_matches() {
        let mut index = LexicalIndex::new();
        index
            .build(vec![
                "hospitalisation costs".to_string(),
                "hospital".to_string(),
            ])
            .await
            .unwrap();

        // "hospital"은 0번 패시지 토큰의 부분 문자열 (0.5), 1번과는 정확 일치 (2.0)
        let hits = index.query("hospital", 5).await.unwrap();
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[1].index, 0);
        assert!((hits[1].score - 0.5 * 1.5).abs() < 1e-5);

        // "hospitals"는 1번 토큰을 포함 (0.3)
        let hits = index.query("hospitals", 5).await.unwrap();
        let fuzzy = hits.iter().find(|h| h.index == 1).unwrap();
        assert!((fuzzy.score - 0.3 * 2.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_query_before_build_fails() {
        let index = LexicalIndex::new();
        let result = index.query("deductible", 5).await;
        assert!(matches!(result, Err(RetrievalError::IndexNotReady)));
        assert!(!index.stats().ready);
    }

    #[tokio::test]
    async fn test_empty_query_fails() {
        let mut index = LexicalIndex::new();
        index.build(policy_passages()).await.unwrap();
        assert!(matches!(index.query("  ", 5).await, Err(RetrievalError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let mut index = LexicalIndex::new();
        index.build(vec![]).await.unwrap();
        assert!(index.query("deductible", 5).await.unwrap().is_empty());
        assert_eq!(index.stats().passage_count, 0);
        assert!(index.stats().ready);
    }

    #[tokio::test]
    async fn test_short_query_tokens_yield_no_results() {
        let mut index = LexicalIndex::new();
        index.build(policy_passages()).await.unwrap();
        assert!(index.query("is it", 5).await.unwrap().is_empty());
    }
}
