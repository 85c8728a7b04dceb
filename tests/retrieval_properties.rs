//! 청커 / 인덱스 / 채점기 속성 테스트

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::retrieval::{
    normalize_whitespace, score_answer, ChunkConfig, Chunker, ClauseChunker, EmbeddingIndex,
    LexicalIndex, QueryHit, SimilarityIndex, TfidfIndex,
};
use docqa_rag::EmbeddingProvider;
use proptest::prelude::*;

const DIM: usize = 64;

/// 문자 빈도 기반 임베더 (결정적)
struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0; DIM];
        for b in text.to_lowercase().bytes() {
            v[b as usize % DIM] += 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "letters"
    }
}

fn arb_document() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        "(Section [0-9]: |[0-9]\\.[0-9] |\\([a-d]\\) )?[A-Z][a-z]{1,9}( [a-z]{1,10}){0,15}\\.?",
        0..30,
    )
    .prop_map(|lines| lines.join("\n"))
}

fn arb_passages() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{3,8}( [a-z]{3,8}){2,12}", 1..15)
}

fn arb_query() -> impl Strategy<Value = String> {
    "[a-z]{3,8}( [a-z]{3,8}){0,4}"
}

/// 인덱스 구축 후 같은 질의를 두 번 실행
fn build_and_query(
    mut index: Box<dyn SimilarityIndex>,
    passages: &[String],
    query: &str,
    top_k: usize,
) -> (Vec<QueryHit>, Vec<QueryHit>) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        index.build(passages.to_vec()).await.unwrap();
        let first = index.query(query, top_k).await.unwrap();
        let second = index.query(query, top_k).await.unwrap();
        (first, second)
    })
}

fn check_hits(hits: &[QueryHit], passages: &[String], top_k: usize) -> Result<(), TestCaseError> {
    prop_assert!(hits.len() <= top_k);
    for hit in hits {
        prop_assert!(hit.index < passages.len());
        prop_assert_eq!(&hit.text, &passages[hit.index]);
        prop_assert!(hit.score >= 0.0);
    }
    for pair in hits.windows(2) {
        prop_assert!(pair[0].score >= pair[1].score);
        if pair[0].score == pair[1].score {
            prop_assert!(pair[0].index < pair[1].index);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chunker_output_has_no_duplicates_or_empties(
        text in arb_document(),
        window_size in 60usize..400,
        overlap in 0usize..60,
    ) {
        let chunker = ClauseChunker::new(ChunkConfig {
            window_size,
            overlap,
            ..ChunkConfig::default()
        });
        let passages = chunker.chunk(&text);

        let mut seen = HashSet::new();
        for (i, passage) in passages.iter().enumerate() {
            prop_assert_eq!(passage.position, i);
            prop_assert!(!passage.text.trim().is_empty());
            prop_assert_eq!(passage.text.trim(), passage.text.as_str());
            prop_assert!(seen.insert(passage.text.clone()));
        }
    }

    #[test]
    fn short_text_without_markers_is_one_window(
        text in prop_oneof![
            "[a-z]{1,8}( [a-z]{1,8}){0,60}",
            "[가-힣]{1,8}( [가-힣]{1,8}){0,60}",
        ],
    ) {
        let passages = ClauseChunker::with_defaults().chunk(&text);
        let normalized = normalize_whitespace(&text);

        if normalized.chars().count() >= 50 {
            prop_assert_eq!(passages.len(), 1);
            prop_assert_eq!(&passages[0].text, &normalized);
        } else {
            prop_assert!(passages.is_empty());
        }
    }

    #[test]
    fn lexical_results_are_bounded_sorted_and_deterministic(
        passages in arb_passages(),
        query in arb_query(),
        top_k in 0usize..10,
    ) {
        let (first, second) =
            build_and_query(Box::new(LexicalIndex::new()), &passages, &query, top_k);
        check_hits(&first, &passages, top_k)?;
        prop_assert_eq!(first, second);
    }

    #[test]
    fn tfidf_results_are_bounded_sorted_and_deterministic(
        passages in arb_passages(),
        query in arb_query(),
        top_k in 0usize..10,
    ) {
        let (first, second) =
            build_and_query(Box::new(TfidfIndex::with_defaults()), &passages, &query, top_k);
        check_hits(&first, &passages, top_k)?;
        prop_assert!(first.iter().all(|h| h.score > 0.0));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn embedding_results_are_bounded_sorted_and_deterministic(
        passages in arb_passages(),
        query in arb_query(),
        top_k in 0usize..10,
    ) {
        let index = EmbeddingIndex::new(Arc::new(LetterEmbedder));
        let (first, second) = build_and_query(Box::new(index), &passages, &query, top_k);
        check_hits(&first, &passages, top_k)?;
        prop_assert_eq!(first.len(), top_k.min(passages.len()));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn confidence_is_always_within_unit_interval(
        answer in ".{0,300}",
        context in ".{0,300}",
        question in ".{0,100}",
    ) {
        let (confidence, _) = score_answer(&answer, &context, &question);
        prop_assert!((0.0..=1.0).contains(&confidence));
    }
}
