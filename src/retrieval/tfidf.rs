//! TF-IDF 인덱스 - 통계적 어휘 검색
//!
//! 유니그램 + 바이그램, 불용어 제거, 문서 빈도 필터링 후
//! smooth IDF 가중치와 L2 정규화로 코사인 유사도를 계산합니다.
//!
//! idf(t) = ln((1 + n) / (1 + df(t))) + 1

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Result, RetrievalError};

use super::index::{rank_hits, require_query, IndexKind, IndexStats, SimilarityIndex};
use super::types::QueryHit;

// ============================================================================
// Configuration
// ============================================================================

/// TF-IDF 벡터라이저 설정
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfConfig {
    /// 어휘 상한 (코퍼스 빈도 상위)
    pub max_features: usize,
    /// n-gram 범위 (최소, 최대)
    pub ngram_range: (usize, usize),
    /// 최소 문서 빈도 (이 값 미만이면 제외)
    pub min_df: usize,
    /// 최대 문서 비율 (이 비율 초과면 제외)
    pub max_df: f32,
    /// 영어 불용어 제거 여부
    pub remove_stop_words: bool,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_range: (1, 2),
            min_df: 2,
            max_df: 0.8,
            remove_stop_words: true,
        }
    }
}

impl TfidfConfig {
    /// 설정 검증 (인덱스 선택 단계의 가용성 검사에 사용)
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.ngram_range;
        let problem = if self.max_features == 0 {
            Some("max_features must be greater than zero".to_string())
        } else if lo == 0 || lo > hi {
            Some(format!("invalid ngram_range ({lo}, {hi})"))
        } else if self.min_df == 0 {
            Some("min_df must be at least 1".to_string())
        } else if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            Some(format!("max_df must be within (0, 1], got {}", self.max_df))
        } else {
            None
        };

        match problem {
            Some(reason) => Err(RetrievalError::CapabilityUnavailable {
                backend: IndexKind::Tfidf.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// TfidfIndex
// ============================================================================

/// 희소 벡터 (term id, weight), term id 오름차순
type SparseVector = Vec<(usize, f32)>;

/// 학습된 벡터라이저 + 패시지 행렬
struct TfidfModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<SparseVector>,
}

/// TF-IDF 코사인 유사도 인덱스
pub struct TfidfIndex {
    config: TfidfConfig,
    passages: Vec<String>,
    model: Option<TfidfModel>,
}

impl TfidfIndex {
    pub fn new(config: TfidfConfig) -> Self {
        Self {
            config,
            passages: Vec::new(),
            model: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(TfidfConfig::default())
    }

    /// 토큰화 → 불용어 제거 → n-gram 생성
    fn analyze(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = WORD
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| !self.config.remove_stop_words || !STOP_WORDS.contains(t))
            .collect();

        let (lo, hi) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in lo..=hi {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    fn fit(&self, passages: &[String]) -> TfidfModel {
        let n_docs = passages.len();

        let doc_counts: Vec<HashMap<String, usize>> = passages
            .iter()
            .map(|p| {
                let mut counts = HashMap::new();
                for term in self.analyze(p) {
                    *counts.entry(term).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        // 문서 빈도 / 코퍼스 빈도
        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut total: HashMap<&str, usize> = HashMap::new();
        for counts in &doc_counts {
            for (term, &count) in counts {
                *df.entry(term.as_str()).or_insert(0) += 1;
                *total.entry(term.as_str()).or_insert(0) += count;
            }
        }

        let max_doc_count = self.config.max_df * n_docs as f32;
        let mut kept: Vec<(&str, usize)> = df
            .iter()
            .filter(|(_, &d)| d >= self.config.min_df && (d as f32) <= max_doc_count)
            .map(|(&term, _)| (term, total.get(term).copied().unwrap_or(0)))
            .collect();

        // 코퍼스 빈도 상위 max_features개 (동점은 사전순)
        kept.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        kept.truncate(self.config.max_features);

        // term id는 사전순으로 부여
        let mut terms: Vec<&str> = kept.into_iter().map(|(t, _)| t).collect();
        terms.sort_unstable();

        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(id, t)| (t.to_string(), id))
            .collect();

        let idf: Vec<f32> = terms
            .iter()
            .map(|t| {
                let d = df.get(t).copied().unwrap_or(0) as f32;
                ((1.0 + n_docs as f32) / (1.0 + d)).ln() + 1.0
            })
            .collect();

        let vectors = doc_counts
            .iter()
            .map(|counts| weigh(counts, &vocabulary, &idf))
            .collect();

        TfidfModel {
            vocabulary,
            idf,
            vectors,
        }
    }
}

#[async_trait]
impl SimilarityIndex for TfidfIndex {
    async fn build(&mut self, passages: Vec<String>) -> Result<()> {
        self.model = None;
        self.config.validate().map_err(|e| RetrievalError::IndexBuild {
            backend: IndexKind::Tfidf.to_string(),
            message: e.to_string(),
        })?;

        let model = self.fit(&passages);
        if model.vocabulary.is_empty() && !passages.is_empty() {
            tracing::warn!(
                "TF-IDF vocabulary is empty after pruning ({} passages); queries will return no results",
                passages.len()
            );
        }

        tracing::info!(
            "TF-IDF index built with {} passages, {} features",
            passages.len(),
            model.vocabulary.len()
        );

        self.passages = passages;
        self.model = Some(model);
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let model = self.model.as_ref().ok_or(RetrievalError::IndexNotReady)?;
        let text = require_query(text)?;

        let mut counts = HashMap::new();
        for term in self.analyze(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        let query_vec: HashMap<usize, f32> = weigh(&counts, &model.vocabulary, &model.idf)
            .into_iter()
            .collect();

        let scores: Vec<f32> = model
            .vectors
            .iter()
            .map(|doc| {
                doc.iter()
                    .filter_map(|(id, w)| query_vec.get(id).map(|q| q * w))
                    .sum()
            })
            .collect();

        let hits = rank_hits(&self.passages, &scores, top_k, true);
        tracing::debug!("TF-IDF query matched {} passages", hits.len());
        Ok(hits)
    }

    fn stats(&self) -> IndexStats {
        match &self.model {
            Some(model) => IndexStats {
                kind: IndexKind::Tfidf,
                ready: true,
                passage_count: self.passages.len(),
                feature_count: Some(model.vocabulary.len()),
                dimension: None,
            },
            None => IndexStats::not_ready(IndexKind::Tfidf),
        }
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Tfidf
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 2자 이상 단어 토큰
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid word regex"));

/// 영어 불용어
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
        "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
        "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below",
        "beside", "besides", "between", "beyond", "both", "but", "by", "can", "cannot", "could",
        "did", "do", "does", "done", "down", "due", "during", "each", "either", "else",
        "elsewhere", "enough", "etc", "even", "ever", "every", "everyone", "everything",
        "everywhere", "except", "few", "for", "former", "formerly", "from", "further", "had",
        "has", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon",
        "hers", "herself", "him", "himself", "his", "how", "however", "i", "ie", "if", "in",
        "indeed", "into", "is", "it", "its", "itself", "last", "latter", "latterly", "least",
        "less", "many", "may", "me", "meanwhile", "might", "more", "moreover", "most", "mostly",
        "much", "must", "my", "myself", "neither", "never", "nevertheless", "next", "no",
        "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off",
        "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise",
        "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps", "please", "rather",
        "re", "same", "seem", "seemed", "seeming", "seems", "several", "she", "should", "since",
        "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
        "still", "such", "than", "that", "the", "their", "them", "themselves", "then", "thence",
        "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they",
        "this", "those", "though", "through", "throughout", "thru", "thus", "to", "together",
        "too", "toward", "towards", "under", "until", "up", "upon", "us", "very", "via", "was",
        "we", "well", "were", "what", "whatever", "when", "whence", "whenever", "where",
        "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever", "whether",
        "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why", "will",
        "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
        "yourselves",
    ]
    .into_iter()
    .collect()
});

/// 빈도 맵을 L2 정규화된 TF-IDF 희소 벡터로 변환
fn weigh(
    counts: &HashMap<String, usize>,
    vocabulary: &HashMap<String, usize>,
    idf: &[f32],
) -> SparseVector {
    let mut vector: SparseVector = counts
        .iter()
        .filter_map(|(term, &count)| {
            vocabulary
                .get(term)
                .map(|&id| (id, count as f32 * idf[id]))
        })
        .collect();

    let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in &mut vector {
            *w /= norm;
        }
    }

    vector.sort_unstable_by_key(|(id, _)| *id);
    vector
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_passages() -> Vec<String> {
        [
            "The annual deductible applies to hospital claims.",
            "The deductible is waived for preventive care visits.",
            "Cosmetic surgery is excluded from hospital coverage.",
            "Dental treatment is excluded unless caused by an accident.",
            "Claims must be submitted within ninety days.",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_analyze_removes_stop_words_and_adds_bigrams() {
        let index = TfidfIndex::with_defaults();
        let terms = index.analyze("What is the annual deductible?");
        assert_eq!(terms, vec!["annual", "deductible", "annual deductible"]);
    }

    #[test]
    fn test_config_validation() {
        assert!(TfidfConfig::default().validate().is_ok());

        let bad = TfidfConfig {
            max_df: 0.0,
            ..TfidfConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(RetrievalError::CapabilityUnavailable { .. })
        ));

        let bad = TfidfConfig {
            ngram_range: (2, 1),
            ..TfidfConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_document_frequency_pruning() {
        let mut index = TfidfIndex::with_defaults();
        index.build(policy_passages()).await.unwrap();

        let model = index.model.as_ref().unwrap();
        // df >= 2 인 용어만 남음
        assert!(model.vocabulary.contains_key("deductible"));
        assert!(model.vocabulary.contains_key("hospital"));
        assert!(model.vocabulary.contains_key("excluded"));
        assert!(model.vocabulary.contains_key("claims"));
        assert!(!model.vocabulary.contains_key("cosmetic"));
        assert_eq!(index.stats().feature_count, Some(4));
    }

    #[tokio::test]
    async fn test_max_df_excludes_ubiquitous_terms() {
        let mut index = TfidfIndex::with_defaults();
        let passages: Vec<String> = (0..5)
            .map(|i| format!("policy clause number{} refers to benefit{}", i, i % 2))
            .collect();
        index.build(passages).await.unwrap();

        let model = index.model.as_ref().unwrap();
        assert!(!model.vocabulary.contains_key("policy"));
        assert!(model.vocabulary.contains_key("benefit0"));
    }

    #[tokio::test]
    async fn test_query_ranks_by_cosine() {
        let mut index = TfidfIndex::with_defaults();
        index.build(policy_passages()).await.unwrap();

        let hits = index.query("What is the deductible?", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        // 1번 패시지는 어휘 내 용어가 deductible 하나뿐이라 코사인 1.0
        assert_eq!(hits[0].index, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].index, 0);
        assert!(hits[1].score < hits[0].score);
    }

    #[tokio::test]
    async fn test_max_features_cap() {
        let config = TfidfConfig {
            max_features: 1,
            ..TfidfConfig::default()
        };
        let mut index = TfidfIndex::new(config);
        index.build(policy_passages()).await.unwrap();
        assert_eq!(index.stats().feature_count, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_terms_yield_no_results() {
        let mut index = TfidfIndex::with_defaults();
        index.build(policy_passages()).await.unwrap();
        assert!(index.query("maternity", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_vocabulary_is_queryable() {
        let mut index = TfidfIndex::with_defaults();
        index.build(vec!["Only one passage here.".to_string()]).await.unwrap();
        assert!(index.stats().ready);
        assert_eq!(index.stats().feature_count, Some(0));
        assert!(index.query("passage", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_before_build_fails() {
        let index = TfidfIndex::with_defaults();
        assert!(matches!(
            index.query("deductible", 5).await,
            Err(RetrievalError::IndexNotReady)
        ));
    }
}
