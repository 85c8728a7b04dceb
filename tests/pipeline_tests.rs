//! 파이프라인 통합 테스트 (프로세스 내 임베딩/생성 목 사용)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::generation::NO_ANSWER_SENTENCE;
use docqa_rag::retrieval::{
    IndexBackend, IndexCandidate, IndexKind, IndexSelector, QaRequest, RetrievalPipeline,
    SourceDocument, TfidfConfig, FALLBACK_ANSWER,
};
use docqa_rag::{AnswerGenerator, EmbeddingProvider, RetrievalError};

const DIM: usize = 256;

const POLICY: &str = "\
Section 1: Coverage. The policy covers hospital expenses up to $10,000 per year.
Section 2: Deductible. The annual deductible for hospital expenses is $500.
Section 3: Exclusions. Cosmetic surgery is excluded from coverage.
Section 4: Claims. Claims must be submitted within 90 days of treatment.
Section 5: Dental. Dental treatment is covered only after an accident.";

// ============================================================================
// Mocks
// ============================================================================

/// 단어 해시 버킷 기반의 결정적 임베더
struct HashEmbedder {
    batch_calls: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self {
            batch_calls: AtomicUsize::new(0),
        }
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let bucket = word
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            v[bucket % DIM] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// 컨텍스트 첫 패시지를 답으로 돌려주는 생성기
///
/// 지정한 질문에서는 실패하고, 질문별 지연으로 완료 순서를 섞을 수 있습니다.
struct ScriptedGenerator {
    calls: AtomicUsize,
    fail_on: Option<String>,
    delays_ms: HashMap<String, u64>,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
            delays_ms: HashMap::new(),
        }
    }

    fn failing_on(question: &str) -> Self {
        Self {
            fail_on: Some(question.to_string()),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(&self, question: &str, context: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(ms) = self.delays_ms.get(question) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.fail_on.as_deref() == Some(question) {
            anyhow::bail!("upstream returned 500");
        }

        match context.split("\n\n").next() {
            Some(first) if !first.trim().is_empty() => Ok(first.to_string()),
            _ => Ok(NO_ANSWER_SENTENCE.to_string()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 항상 "답 없음" 문장을 반환
struct NoAnswerGenerator;

#[async_trait]
impl AnswerGenerator for NoAnswerGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> anyhow::Result<String> {
        Ok(NO_ANSWER_SENTENCE.to_string())
    }

    fn name(&self) -> &str {
        "no-answer"
    }
}

fn policy_docs() -> Vec<SourceDocument> {
    vec![SourceDocument::text(POLICY)]
}

fn questions(items: &[&str]) -> Vec<String> {
    items.iter().map(|q| q.to_string()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn generation_failure_degrades_only_that_question() {
    let failing = "Is cosmetic surgery covered?";
    let generator = Arc::new(ScriptedGenerator::failing_on(failing));
    let pipeline = RetrievalPipeline::new(IndexBackend::lexical(), generator.clone());

    let records = pipeline
        .answer_questions(
            &policy_docs(),
            &questions(&[
                "What is the annual deductible?",
                failing,
                "When must claims be submitted?",
            ]),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(generator.calls(), 3);

    assert_eq!(records[1].confidence, 0.0);
    assert_eq!(records[1].answer, FALLBACK_ANSWER);
    assert!(records[1].source_chunks.is_empty());

    for i in [0, 2] {
        assert!(records[i].confidence > 0.0);
        assert_ne!(records[i].answer, FALLBACK_ANSWER);
    }
    assert!(records[0].answer.contains("deductible"));
    assert!(records[2].answer.contains("Claims"));
}

#[tokio::test]
async fn empty_documents_abort_before_generation() {
    let generator = Arc::new(ScriptedGenerator::new());
    let pipeline = RetrievalPipeline::new(IndexBackend::lexical(), generator.clone());

    let docs = vec![SourceDocument::text(""), SourceDocument::text(" \n\t ")];
    let result = pipeline
        .answer_questions(&docs, &questions(&["What is covered?"]))
        .await;

    assert!(matches!(result, Err(RetrievalError::NoContent)));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn output_order_matches_input_order_under_concurrency() {
    let qs = questions(&[
        "What is the annual deductible?",
        "Is cosmetic surgery covered?",
        "When must claims be submitted?",
        "Is dental treatment covered?",
    ]);

    // 앞쪽 질문일수록 늦게 끝남
    let mut generator = ScriptedGenerator::new();
    for (i, q) in qs.iter().enumerate() {
        generator
            .delays_ms
            .insert(q.clone(), 10 * (qs.len() - i) as u64);
    }

    let pipeline = RetrievalPipeline::new(IndexBackend::lexical(), Arc::new(generator))
        .with_concurrency(4);
    let records = pipeline
        .answer_questions(&policy_docs(), &qs)
        .await
        .unwrap();

    let answered: Vec<&str> = records.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(answered, qs.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn uncertain_answer_scores_point_three() {
    let pipeline = RetrievalPipeline::new(IndexBackend::lexical(), Arc::new(NoAnswerGenerator));
    let records = pipeline
        .answer_questions(&policy_docs(), &questions(&["What is the maternity benefit?"]))
        .await
        .unwrap();

    assert!((records[0].confidence - 0.3).abs() < 1e-6);
    assert_eq!(
        records[0].rationale,
        "No specific information found in the document context"
    );
}

#[tokio::test]
async fn embedding_backend_selected_and_used_end_to_end() {
    let embedder = Arc::new(HashEmbedder::new());
    let backend = IndexSelector::new(vec![
        IndexCandidate::Embedding(Ok(embedder.clone() as Arc<dyn EmbeddingProvider>)),
        IndexCandidate::Tfidf(TfidfConfig::default()),
    ])
    .select()
    .await;
    assert_eq!(backend.kind(), IndexKind::Embedding);

    let pipeline = RetrievalPipeline::new(backend, Arc::new(ScriptedGenerator::new()));
    let response = pipeline
        .run(QaRequest {
            documents: policy_docs(),
            questions: questions(&["annual deductible hospital expenses"]),
        })
        .await
        .unwrap();

    assert_eq!(response.metadata.index_backend, "embedding");
    assert_eq!(response.answers.len(), 1);
    // 패시지 배치 임베딩은 요청당 한 번
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tfidf_backend_answers_from_ranked_context() {
    let pipeline = RetrievalPipeline::new(
        IndexBackend::tfidf(TfidfConfig::default()),
        Arc::new(ScriptedGenerator::new()),
    );

    let hits = pipeline
        .search(&policy_docs(), "What is the annual deductible?", 5)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.text.contains("deductible")));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let records = pipeline
        .answer_questions(&policy_docs(), &questions(&["What is the annual deductible?"]))
        .await
        .unwrap();
    assert!(records[0].answer.contains("$500"));
}

#[tokio::test]
async fn run_rejects_oversized_requests() {
    let pipeline = RetrievalPipeline::new(
        IndexBackend::lexical(),
        Arc::new(ScriptedGenerator::new()),
    );
    let request = QaRequest {
        documents: policy_docs(),
        questions: (0..21).map(|i| format!("Question {i}?")).collect(),
    };

    assert!(matches!(
        pipeline.run(request).await,
        Err(RetrievalError::InvalidRequest(_))
    ));
}
