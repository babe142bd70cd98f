//! CLI 모듈
//!
//! course-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::api;
use crate::catalog::CatalogStore;
use crate::config::RagConfig;
use crate::embedding::has_gemini_api_key;
use crate::generator::has_anthropic_api_key;
use crate::rag::RagSystem;
use crate::vector::{LanceVectorStore, VectorIndex};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "course-rag")]
#[command(version, about = "코스 자료 RAG 챗봇 백엔드", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행 (시작 시 문서 폴더 자동 수집)
    Serve {
        /// 서버 포트
        #[arg(short, long)]
        port: Option<u16>,

        /// 코스 문서 폴더
        #[arg(short, long)]
        docs: Option<PathBuf>,
    },

    /// 코스 문서를 인덱스에 추가
    Ingest {
        /// 수집할 파일 경로
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 수집 전 기존 인덱스 삭제
        #[arg(long)]
        clear: bool,
    },

    /// 단발성 RAG 질문
    Ask {
        /// 질문
        question: String,
    },

    /// 인덱싱된 코스 목록
    List,

    /// 코스 삭제 (카탈로그 + 벡터 인덱스)
    Delete {
        /// 삭제할 코스 제목 (정확히 일치해야 함)
        #[arg(short, long)]
        title: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { port, docs } => cmd_serve(port, docs).await,
        Commands::Ingest { file, dir, clear } => cmd_ingest(file, dir, clear).await,
        Commands::Ask { question } => cmd_ask(&question).await,
        Commands::List => cmd_list(),
        Commands::Delete { title } => cmd_delete(&title).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 명령어 (serve)
///
/// 문서 폴더를 수집한 뒤 HTTP 서버를 실행합니다.
async fn cmd_serve(port: Option<u16>, docs: Option<PathBuf>) -> Result<()> {
    require_gemini_key()?;
    require_anthropic_key()?;

    let mut config = RagConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(docs) = docs {
        config.docs_dir = docs;
    }

    let host = config.host.clone();
    let port = config.port;
    let docs_dir = config.docs_dir.clone();

    let rag = Arc::new(
        RagSystem::new(config)
            .await
            .context("RAG 시스템 초기화 실패")?,
    );

    // 시작 시 문서 폴더 수집
    if docs_dir.is_dir() {
        println!("[*] 코스 문서 수집 중: {}", docs_dir.display());

        let report = rag
            .add_course_folder(&docs_dir)
            .await
            .context("문서 폴더 수집 실패")?;

        println!(
            "[OK] 수집 완료: 신규 {} 코스, {} 청크 (건너뜀 {}, 실패 {})",
            report.new_courses, report.new_chunks, report.skipped, report.failed
        );
    } else {
        println!("[!] 문서 폴더가 없습니다: {}", docs_dir.display());
        println!("    기존 인덱스만으로 서버를 시작합니다.");
    }

    println!("[*] 서버 시작: http://{}:{}", host, port);

    api::serve(rag, &host, port).await
}

/// 수집 명령어 (ingest)
async fn cmd_ingest(file: Option<PathBuf>, dir: Option<PathBuf>, clear: bool) -> Result<()> {
    require_gemini_key()?;

    if file.is_none() && dir.is_none() {
        bail!("--file 또는 --dir 중 하나를 지정해야 합니다");
    }

    let rag = RagSystem::new(RagConfig::from_env())
        .await
        .context("RAG 시스템 초기화 실패")?;

    if clear {
        println!("[*] 기존 인덱스 삭제 중...");
        rag.clear_index().await.context("인덱스 삭제 실패")?;
    }

    if let Some(ref path) = file {
        println!("[*] 문서 수집 중: {}", path.display());

        let (course, chunk_count) = rag
            .add_course_document(path)
            .await
            .context("문서 수집 실패")?;

        println!("[OK] 코스가 추가되었습니다: {}", course.title);
        println!(
            "     레슨 {} 개, 청크 {} 개",
            course.lessons.len(),
            chunk_count
        );
    }

    if let Some(ref dir_path) = dir {
        println!("[*] 폴더 수집 중: {}", dir_path.display());

        let report = rag
            .add_course_folder(dir_path)
            .await
            .context("폴더 수집 실패")?;

        println!(
            "[OK] 수집 완료: 신규 {} 코스, {} 청크",
            report.new_courses, report.new_chunks
        );
        if report.skipped > 0 {
            println!("     이미 인덱싱된 코스 {} 개 건너뜀", report.skipped);
        }
        if report.failed > 0 {
            println!("[!] 실패 {} 건 (로그 확인)", report.failed);
        }
    }

    Ok(())
}

/// 질문 명령어 (ask)
///
/// 세션 없이 단발성으로 RAG 쿼리를 실행합니다.
async fn cmd_ask(question: &str) -> Result<()> {
    require_gemini_key()?;
    require_anthropic_key()?;

    let rag = RagSystem::new(RagConfig::from_env())
        .await
        .context("RAG 시스템 초기화 실패")?;

    println!("[*] 질문: \"{}\"", question);

    let result = rag.query(question, None).await.context("쿼리 실패")?;

    println!("\n{}\n", result.answer);

    if !result.sources.is_empty() {
        println!("[*] 출처:");
        for source in &result.sources {
            match &source.link {
                Some(link) => println!("  - {} ({})", source.label, link),
                None => println!("  - {}", source.label),
            }
        }
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list() -> Result<()> {
    let config = RagConfig::from_env();
    let catalog = CatalogStore::open(&config.data_dir.join("catalog.db"))
        .context("카탈로그 열기 실패")?;

    let titles = catalog.list_titles().context("코스 목록 조회 실패")?;

    if titles.is_empty() {
        println!("[!] 인덱싱된 코스가 없습니다.");
        println!("    수집: course-rag ingest --dir ./docs");
        return Ok(());
    }

    println!("[OK] 인덱싱된 코스 ({} 건):\n", titles.len());

    for title in titles {
        match catalog.get_course(&title)? {
            Some(course) => {
                let instructor = course.instructor.as_deref().unwrap_or("-");
                println!("  {} ({} 레슨, 강사: {})", title, course.lessons.len(), instructor);
            }
            None => println!("  {}", title),
        }
    }

    Ok(())
}

/// 삭제 명령어 (delete)
///
/// 카탈로그와 벡터 인덱스 양쪽에서 코스를 제거합니다.
async fn cmd_delete(title: &str) -> Result<()> {
    let config = RagConfig::from_env();

    let catalog = CatalogStore::open(&config.data_dir.join("catalog.db"))
        .context("카탈로그 열기 실패")?;

    if !catalog.exists(title).context("코스 조회 실패")? {
        bail!("'{}' 제목의 코스를 찾을 수 없습니다", title);
    }

    let vectors = LanceVectorStore::open(&config.data_dir.join("vectors.lance"))
        .await
        .context("벡터 저장소 열기 실패")?;

    vectors
        .delete_course(title)
        .await
        .context("벡터 삭제 실패")?;
    catalog.delete_course(title).context("코스 삭제 실패")?;

    println!("[OK] 코스가 삭제되었습니다: {}", title);

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    let config = RagConfig::from_env();

    println!("course-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 문서 폴더: {}", config.docs_dir.display());
    println!("[*] 모델: {}", config.anthropic_model);

    // API 키 상태
    if has_gemini_api_key() {
        println!("[OK] Gemini API 키: 설정됨");
    } else {
        println!("[!] Gemini API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    if has_anthropic_api_key() {
        println!("[OK] Anthropic API 키: 설정됨");
    } else {
        println!("[!] Anthropic API 키: 미설정");
        println!("    설정: export ANTHROPIC_API_KEY=your-key");
    }

    // 카탈로그 통계
    match CatalogStore::open(&config.data_dir.join("catalog.db")) {
        Ok(catalog) => match catalog.stats() {
            Ok(stats) => {
                println!(
                    "[OK] 인덱싱된 코스: {} 건 ({} 레슨)",
                    stats.course_count, stats.lesson_count
                );
            }
            Err(e) => println!("[!] 카탈로그 통계 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 카탈로그 열기 실패: {}", e),
    }

    // 벡터 인덱스 통계 (API 키 불필요)
    match LanceVectorStore::open(&config.data_dir.join("vectors.lance")).await {
        Ok(vectors) => {
            let content = vectors.count_content().await.unwrap_or(0);
            let catalog = vectors.count_catalog().await.unwrap_or(0);
            println!(
                "[OK] 벡터 인덱스: 콘텐츠 {} 청크, 카탈로그 {} 건",
                content, catalog
            );
        }
        Err(e) => {
            tracing::debug!("벡터 저장소 열기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Gemini API 키 확인
fn require_gemini_key() -> Result<()> {
    if !has_gemini_api_key() {
        bail!(
            "Gemini API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

/// Anthropic API 키 확인
fn require_anthropic_key() -> Result<()> {
    if !has_anthropic_api_key() {
        bail!(
            "Anthropic API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export ANTHROPIC_API_KEY=your-api-key\n\n\
             API 키 발급: https://console.anthropic.com/"
        );
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::parse_from(["course-rag", "serve", "--port", "9000"]);
        match cli.command {
            Commands::Serve { port, .. } => assert_eq!(port, Some(9000)),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from(["course-rag", "ask", "What is chunking?"]);
        match cli.command {
            Commands::Ask { question } => assert_eq!(question, "What is chunking?"),
            _ => panic!("expected ask command"),
        }
    }
}
