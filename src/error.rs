//! 검색 코어 에러 타입
//!
//! 요청 단위로 치명적인 에러와 질문 단위로 복구되는 에러를 구분합니다.

use thiserror::Error;

/// 검색 서브시스템 에러
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 모든 문서에서 추출된 패시지가 없음 (요청 전체 중단)
    #[error("No content could be extracted from the provided documents")]
    NoContent,

    /// build 이전에 query 호출, 또는 build 실패 후 query 호출
    #[error("Similarity index is not ready; build() must succeed before query()")]
    IndexNotReady,

    /// 빈 질의 텍스트
    #[error("Query text cannot be empty")]
    EmptyQuery,

    /// 인덱스 구축 실패
    #[error("Index build failed ({backend}): {message}")]
    IndexBuild {
        /// 실패한 인덱스 종류
        backend: String,
        /// 실패 원인
        message: String,
    },

    /// 임베딩 호출 실패
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// 임베딩 프로바이더 이름
        provider: String,
        /// 실패 원인
        message: String,
    },

    /// 답변 생성 호출 실패
    #[error("Generation error: {0}")]
    Generation(String),

    /// 인덱스 후보의 의존 기능을 사용할 수 없음 (선택 단계에서만 발생)
    #[error("Index backend '{backend}' unavailable: {reason}")]
    CapabilityUnavailable {
        /// 후보 인덱스 종류
        backend: String,
        /// 사용 불가 사유
        reason: String,
    },

    /// 요청 검증 실패
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 설정 검증 실패
    #[error("Configuration error: {0}")]
    Config(String),
}

/// 검색 코어 Result 타입
pub type Result<T> = std::result::Result<T, RetrievalError>;
