//! Answer Scorer - 생성된 답변의 신뢰도와 근거 레이블
//!
//! 어떤 인덱스가 컨텍스트를 만들었는지와 무관하게 답변 문자열만으로 점수를 매깁니다.

use std::fmt;

use serde::Serialize;

/// 기본 신뢰도
const BASE_CONFIDENCE: f32 = 0.5;
/// 불확실성 표현이 있을 때의 신뢰도
const UNCERTAIN_CONFIDENCE: f32 = 0.3;
/// 근거 패시지 최대 개수
const MAX_SOURCE_CHUNKS: usize = 3;
/// 문장 경계가 없을 때 잘라낼 문자 수
const SNIPPET_CHARS: usize = 200;

/// 답변이 정보를 찾지 못했음을 나타내는 표현
const UNCERTAINTY_MARKERS: [&str; 5] = [
    "does not provide",
    "not specified",
    "unclear",
    "not mentioned",
    "cannot determine",
];

/// 구조/수치 참조 표현 (신뢰도 가산)
const REFERENCE_MARKERS: [&str; 5] = ["section", "clause", "paragraph", "$", "%"];

const STRUCTURAL_MARKERS: [&str; 3] = ["section", "clause", "paragraph"];
const NUMERIC_MARKERS: [&str; 4] = ["$", "%", "limit", "coverage"];

// ============================================================================
// Rationale
// ============================================================================

/// 신뢰도 근거 레이블
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rationale {
    /// 컨텍스트에서 정보를 찾지 못함
    NoInformation,
    /// 조항/섹션 참조 발견
    StructuralReference,
    /// 금액/비율/보장 한도 참조 발견
    NumericReference,
    /// 일반 추출
    ExtractedFromContext,
}

impl Rationale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rationale::NoInformation => "No specific information found in the document context",
            Rationale::StructuralReference => "Found explicit reference in document structure",
            Rationale::NumericReference => "Found specific numerical or coverage information",
            Rationale::ExtractedFromContext => "Answer extracted from document context",
        }
    }
}

impl fmt::Display for Rationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// 답변 신뢰도 계산
///
/// 반환값의 신뢰도는 항상 [0, 1] 범위입니다.
pub fn score_answer(answer: &str, context: &str, question: &str) -> (f32, Rationale) {
    let answer_lower = answer.to_lowercase();

    if UNCERTAINTY_MARKERS.iter().any(|m| answer_lower.contains(m)) {
        return (UNCERTAIN_CONFIDENCE, Rationale::NoInformation);
    }

    let mut confidence = BASE_CONFIDENCE;

    if REFERENCE_MARKERS.iter().any(|m| answer_lower.contains(m)) {
        confidence += 0.3;
    }

    let length = answer.chars().count();
    if (20..=200).contains(&length) {
        confidence += 0.1;
    }

    if question_overlap(context, question) > 0.3 {
        confidence += 0.1;
    }

    (confidence.clamp(0.0, 1.0), rationale_for(&answer_lower))
}

/// 컨텍스트에 등장하는 질문 단어의 비율
fn question_overlap(context: &str, question: &str) -> f32 {
    let words: Vec<String> = question
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let context_lower = context.to_lowercase();
    let present = words
        .iter()
        .filter(|w| context_lower.contains(w.as_str()))
        .count();
    present as f32 / words.len() as f32
}

/// 우선순위: 구조 참조 > 수치 참조 > 일반
fn rationale_for(answer_lower: &str) -> Rationale {
    if STRUCTURAL_MARKERS.iter().any(|m| answer_lower.contains(m)) {
        Rationale::StructuralReference
    } else if NUMERIC_MARKERS.iter().any(|m| answer_lower.contains(m)) {
        Rationale::NumericReference
    } else {
        Rationale::ExtractedFromContext
    }
}

/// 컨텍스트에서 근거 패시지 추출
///
/// 마침표로 끝나는 앞쪽 세 문장, 문장 경계가 없으면 앞 200자 + "...".
pub fn extract_source_chunks(context: &str) -> Vec<String> {
    let context = context.trim();
    if context.is_empty() {
        return Vec::new();
    }

    if !context.contains('.') {
        let snippet: String = context.chars().take(SNIPPET_CHARS).collect();
        return vec![format!("{}...", snippet)];
    }

    context
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_SOURCE_CHUNKS)
        .map(|s| format!("{}.", s))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
