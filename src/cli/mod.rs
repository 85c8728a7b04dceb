//! CLI 모듈
//!
//! docqa-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::collector::{CollectorConfig, FileCollector};
use crate::config::Settings;
use crate::error::RetrievalError;
use crate::generation::create_generator;
use crate::retrieval::{
    build_index, chunk_documents, clause_chunker, IndexSelector, QaRequest, QaResponse,
    RetrievalPipeline, SourceDocument,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docqa-rag")]
#[command(version, about = "문서 기반 질의응답 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 문서 입력 (셋 중 하나)
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// 직접 입력할 텍스트
    #[arg(short, long)]
    text: Option<String>,

    /// 문서 파일 경로
    #[arg(long)]
    file: Option<PathBuf>,

    /// 문서 폴더 경로 (재귀)
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서에 대해 질문하고 답변 받기
    Ask {
        /// 요청 JSON 파일 ({"documents": [...], "questions": [...]})
        #[arg(short, long, conflicts_with_all = ["text", "file", "dir"])]
        request: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,

        /// 질문 (여러 번 지정 가능)
        #[arg(short, long = "question")]
        questions: Vec<String>,

        /// 전체 응답을 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 문서에서 관련 패시지 검색 (답변 생성 없음)
    Search {
        /// 검색 쿼리
        query: String,

        #[command(flatten)]
        source: SourceArgs,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// 청킹 결과 확인
    Chunk {
        #[command(flatten)]
        source: SourceArgs,

        /// 출력할 패시지 수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Ask {
            request,
            source,
            questions,
            json,
        } => cmd_ask(&settings, request, &source, questions, json).await,
        Commands::Search {
            query,
            source,
            limit,
        } => cmd_search(&settings, &query, &source, limit).await,
        Commands::Chunk { source, limit } => cmd_chunk(&settings, &source, limit),
        Commands::Status => cmd_status(&settings).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질의응답 명령어 (ask)
///
/// 문서를 청킹/인덱싱하고 질문별로 답변을 생성합니다.
async fn cmd_ask(
    settings: &Settings,
    request: Option<PathBuf>,
    source: &SourceArgs,
    questions: Vec<String>,
    json: bool,
) -> Result<()> {
    if !settings.has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let request = match request {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("요청 파일 읽기 실패: {:?}", path))?;
            serde_json::from_str::<QaRequest>(&raw).context("요청 JSON 파싱 실패")?
        }
        None => {
            if questions.is_empty() {
                bail!("-q/--question 으로 질문을 하나 이상 지정해야 합니다");
            }
            QaRequest {
                documents: load_documents(settings, source)?,
                questions,
            }
        }
    };

    let generator = create_generator(settings).context("답변 생성기 초기화 실패")?;
    let backend = IndexSelector::from_settings(settings).select().await;
    let pipeline = RetrievalPipeline::from_settings(settings, backend, Arc::new(generator));

    if !json {
        println!(
            "[*] 문서 {} 건, 질문 {} 건 처리 중 (인덱스: {})...",
            request.documents.len(),
            request.questions.len(),
            pipeline.backend().kind()
        );
    }

    let response = match pipeline.run(request).await {
        Ok(response) => response,
        Err(RetrievalError::NoContent) => {
            bail!("문서에서 추출된 내용이 없습니다");
        }
        Err(e) => return Err(e).context("질의응답 실패"),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("응답 직렬화 실패")?
        );
    } else {
        print_response(&response);
    }

    Ok(())
}

fn print_response(response: &QaResponse) {
    println!(
        "\n[OK] 답변 ({} 건, {:.2}초, 패시지 {} 개):\n",
        response.answers.len(),
        response.processing_time,
        response.metadata.passage_count
    );

    for (i, record) in response.answers.iter().enumerate() {
        println!("{}. Q: {}", i + 1, record.question);
        println!("   A: {}", record.answer);
        println!(
            "   [신뢰도: {:.2}] {}",
            record.confidence, record.rationale
        );
        for chunk in &record.source_chunks {
            println!("   - {}", truncate_text(chunk, 120));
        }
        println!();
    }
}

/// 검색 명령어 (search)
///
/// 선택된 인덱스로 패시지를 검색합니다.
async fn cmd_search(
    settings: &Settings,
    query: &str,
    source: &SourceArgs,
    limit: usize,
) -> Result<()> {
    let documents = load_documents(settings, source)?;
    let chunker = clause_chunker(settings.chunk_config());

    let backend = IndexSelector::from_settings(settings).select().await;
    println!("[*] 검색 중: \"{}\" (인덱스: {})", query, backend.kind());

    let index = match build_index(&backend, chunker.as_ref(), &documents).await {
        Ok(index) => index,
        Err(RetrievalError::NoContent) => {
            println!("[!] 문서에서 추출된 내용이 없습니다.");
            return Ok(());
        }
        Err(e) => return Err(e).context("인덱스 구축 실패"),
    };
    let hits = index.query(query, limit).await.context("검색 실패")?;

    if hits.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [점수: {:.4}] 패시지 #{}", i + 1, hit.score, hit.index);
        println!("   내용: {}", truncate_text(&hit.text, 200));
        println!();
    }

    Ok(())
}

/// 청킹 명령어 (chunk)
fn cmd_chunk(settings: &Settings, source: &SourceArgs, limit: usize) -> Result<()> {
    let documents = load_documents(settings, source)?;
    let chunker = clause_chunker(settings.chunk_config());
    let passages = chunk_documents(chunker.as_ref(), &documents);

    if passages.is_empty() {
        println!("[!] 생성된 패시지가 없습니다.");
        return Ok(());
    }

    println!(
        "[OK] 패시지 {} 개 (윈도우: {}, 오버랩: {}):\n",
        passages.len(),
        settings.chunk_size,
        settings.chunk_overlap
    );
    for (i, passage) in passages.iter().take(limit).enumerate() {
        println!(
            "#{:<4} {} chars | {}",
            i,
            passage.chars().count(),
            truncate_text(passage, 100)
        );
    }
    if passages.len() > limit {
        println!("\n... 외 {} 개", passages.len() - limit);
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 설정과 선택된 인덱스를 확인합니다.
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("docqa-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if settings.has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    println!("[*] 생성 모델: {}", settings.generation_model);
    println!(
        "[*] 임베딩 모델: {} ({}차원)",
        settings.embedding_model, settings.embedding_dimension
    );
    println!(
        "[*] 청킹: 윈도우 {}, 오버랩 {}, top_k {}",
        settings.chunk_size, settings.chunk_overlap, settings.top_k
    );
    println!(
        "[*] 요청 제한: 문서 {} 건, 질문 {} 건, 문서당 {}",
        settings.limits.max_documents,
        settings.limits.max_questions,
        format_bytes(settings.limits.max_content_size)
    );

    let selector = IndexSelector::from_settings(settings);
    let candidates: Vec<String> = selector
        .candidates()
        .iter()
        .map(|k| k.to_string())
        .collect();
    println!("[*] 인덱스 후보: {}", candidates.join(" → "));

    let backend = selector.select().await;
    println!("[OK] 선택된 인덱스: {}", backend.kind());

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// --text / --file / --dir 에서 문서 로드
fn load_documents(settings: &Settings, source: &SourceArgs) -> Result<Vec<SourceDocument>> {
    if let Some(ref text) = source.text {
        return Ok(vec![SourceDocument::text(text.clone())]);
    }

    let path = match (&source.file, &source.dir) {
        (Some(file), _) => file,
        (None, Some(dir)) => dir,
        (None, None) => bail!("--text, --file, --dir 중 하나를 지정해야 합니다"),
    };

    let collector = FileCollector::new(CollectorConfig {
        max_file_size: settings.limits.max_content_size as u64,
        ..CollectorConfig::default()
    });
    let documents = collector
        .load_documents(path)
        .with_context(|| format!("문서 로드 실패: {:?}", path))?;

    if documents.is_empty() {
        bail!("읽을 수 있는 텍스트 문서가 없습니다: {:?}", path);
    }
    Ok(documents)
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
