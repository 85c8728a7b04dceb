//! Text Chunking Module
//!
//! 약관/법률 문서를 검색 단위(패시지)로 분할합니다.
//! 조항 표식("Section 3", "2.1 Coverage", "(a)")을 먼저 추출하고,
//! 이어서 문장 경계를 존중하는 고정 윈도우 청크를 덧붙입니다.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::Passage;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 윈도우 크기 (문자 수)
    pub window_size: usize,
    /// 윈도우 간 오버랩 (문자 수)
    pub overlap: usize,
    /// 윈도우 청크 최소 길이 (문자 수, 미만이면 버림)
    pub min_window_chars: usize,
    /// 조항 추출 최소 길이 (문자 수, 이하면 버림)
    pub min_clause_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_size: 800,
            overlap: 150,
            min_window_chars: 50,
            min_clause_chars: 20,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 패시지로 분할
    fn chunk(&self, text: &str) -> Vec<Passage>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// ClauseChunker
// ============================================================================

/// 조항 표식: Section / Article / Clause / Paragraph + 번호
static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]*((?:section|article|clause|paragraph)[ \t]+\d+(?:\.\d+)*\.?[ \t]*:?[^\n]*)$")
        .expect("Invalid section regex")
});

/// 번호 조항: "3.2 Coverage limits ..."
static NUMBERED_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(\d+(?:\.\d+)*\.?[ \t]+[A-Z][^\n]*)$").expect("Invalid numbered regex")
});

/// 알파벳 하위 조항: "A. ..." 또는 "(b) ..."
static LETTERED_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*((?:[A-Z]\.|\([a-z]\))[ \t]+[^\n]+)$").expect("Invalid lettered regex")
});

/// 조항 인식 청커
///
/// 출력 순서: 조항 매치(문서 순) → 윈도우 청크(문서 순), 중복 제거 후 최초 등장 순서 유지.
pub struct ClauseChunker {
    config: ChunkConfig,
}

impl ClauseChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 줄 시작의 조항 표식 추출
    ///
    /// 줄 구조가 필요하므로 정규화 전 원문에서 찾고, 매치마다 공백을 정규화합니다.
    fn extract_clauses(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();

        for pattern in [&*SECTION_MARKER, &*NUMBERED_CLAUSE, &*LETTERED_CLAUSE] {
            for caps in pattern.captures_iter(text) {
                let Some(m) = caps.get(1) else { continue };
                let clause = normalize_whitespace(m.as_str());
                if clause.chars().count() > self.config.min_clause_chars {
                    found.push((m.start(), clause));
                }
            }
        }

        // 문서 순서 (같은 위치는 패턴 순서 유지)
        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, clause)| clause).collect()
    }

    /// 고정 윈도우 청킹 (정규화된 텍스트 대상, 문자 단위)
    fn window_chunks(&self, text: &str) -> Vec<String> {
        let chars = CharOffsets::new(text);
        let len = chars.len();
        let size = self.config.window_size.max(1);
        let overlap = self.config.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = (start + size).min(len);
            if end < len {
                end = self.find_break(&chars, start, end);
            }

            let chunk = chars.slice(start, end).trim();
            if chunk.chars().count() >= self.config.min_window_chars {
                chunks.push(chunk.to_string());
            }

            if end >= len {
                break;
            }

            // 진행 보장
            let mut next = end.saturating_sub(overlap);
            if next <= start {
                next = end;
            }
            start = next;
        }

        chunks
    }

    /// 윈도우 끝 보정: 마지막 `overlap` 문자 구간의 마지막 마침표 다음
    fn find_break(&self, chars: &CharOffsets<'_>, start: usize, end: usize) -> usize {
        let lo = end.saturating_sub(self.config.overlap).max(start);
        match chars.rfind('.', lo, end) {
            Some(pos) if pos > start => pos + 1,
            _ => end,
        }
    }
}

impl Chunker for ClauseChunker {
    fn chunk(&self, text: &str) -> Vec<Passage> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return vec![];
        }

        // 1. 조항 추출
        let clauses = self.extract_clauses(text);

        // 2. 윈도우 청크
        let windows = self.window_chunks(&normalized);

        tracing::debug!(
            "Chunked {} chars: {} clauses, {} windows",
            normalized.len(),
            clauses.len(),
            windows.len()
        );

        // 3. 중복 제거 (최초 등장 순서 유지)
        let mut seen = HashSet::new();
        clauses
            .into_iter()
            .chain(windows)
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .enumerate()
            .map(|(position, text)| Passage { position, text })
            .collect()
    }

    fn name(&self) -> &'static str {
        "ClauseChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 공백 연속을 단일 공백으로 치환하고 앞뒤 공백 제거
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 문자 인덱스 → 바이트 오프셋 매핑
struct CharOffsets<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
}

impl<'a> CharOffsets<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
        }
    }

    /// 문자 수
    fn len(&self) -> usize {
        self.chars.len()
    }

    fn byte_offset(&self, index: usize) -> usize {
        self.chars
            .get(index)
            .map_or(self.text.len(), |&(offset, _)| offset)
    }

    /// 문자 범위 `[start, end)`의 부분 문자열
    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.byte_offset(start)..self.byte_offset(end)]
    }

    /// `[lo, end)` 구간에서 마지막 `target`의 문자 인덱스
    fn rfind(&self, target: char, lo: usize, end: usize) -> Option<usize> {
        (lo..end.min(self.len()))
            .rev()
            .find(|&i| self.chars[i].1 == target)
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(ClauseChunker::with_defaults())
}

/// 조항 청커 생성 (설정 지정)
pub fn clause_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(ClauseChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================
