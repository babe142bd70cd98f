//! RAG 모듈 - 시스템 오케스트레이터
//!
//! 파서/청커/카탈로그/벡터 인덱스/임베딩/생성기/세션/툴을
//! 하나로 묶는 최상위 컴포넌트입니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::catalog::CatalogStore;
use crate::collector::{load_text, FileCollector};
use crate::config::RagConfig;
use crate::course::{chunk_course, parse_course_text, Course, SentenceChunker};
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::generator::ClaudeGenerator;
use crate::session::SessionManager;
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, ToolRegistry};
use crate::vector::{ChunkEntry, LanceVectorStore, VectorIndex, NO_LESSON};

// ============================================================================
// Types
// ============================================================================

/// 쿼리 응답
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

/// 코스 분석 정보
#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// 폴더 수집 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub new_courses: usize,
    pub new_chunks: usize,
    pub skipped: usize,
    pub failed: usize,
}

// ============================================================================
// RagSystem
// ============================================================================

/// RAG 시스템 오케스트레이터
pub struct RagSystem {
    config: RagConfig,
    catalog: Arc<CatalogStore>,
    vectors: Arc<LanceVectorStore>,
    embedder: Arc<GeminiEmbedding>,
    chunker: SentenceChunker,
    generator: ClaudeGenerator,
    sessions: SessionManager,
    tools: ToolRegistry,
}

impl RagSystem {
    /// 시스템 초기화
    ///
    /// 데이터 디렉토리를 생성하고 저장소/프로바이더를 연결한 뒤
    /// 검색/개요 툴을 레지스트리에 등록합니다.
    pub async fn new(config: RagConfig) -> Result<Self> {
        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)
                .context("Failed to create data directory")?;
        }

        let catalog = Arc::new(
            CatalogStore::open(&config.data_dir.join("catalog.db"))
                .context("Failed to open catalog store")?,
        );

        let vectors = Arc::new(
            LanceVectorStore::open(&config.data_dir.join("vectors.lance"))
                .await
                .context("Failed to open vector store")?,
        );

        let embedder = Arc::new(
            GeminiEmbedding::from_env().context("Failed to create embedder")?,
        );

        let generator =
            ClaudeGenerator::from_env(config.anthropic_model.clone(), config.max_tokens)?;

        let chunker = SentenceChunker::new(config.chunk.clone());
        let sessions = SessionManager::new(config.max_history);

        // 툴 등록
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CourseSearchTool::new(
            Arc::clone(&embedder),
            Arc::clone(&vectors),
            Arc::clone(&catalog),
            config.max_results,
        )));
        tools.register(Arc::new(CourseOutlineTool::new(
            Arc::clone(&embedder),
            Arc::clone(&vectors),
            Arc::clone(&catalog),
        )));

        Ok(Self {
            config,
            catalog,
            vectors,
            embedder,
            chunker,
            generator,
            sessions,
            tools,
        })
    }

    /// 설정 접근
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// 카탈로그 접근
    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// 단일 코스 문서 수집
    ///
    /// 파싱 -> 카탈로그 저장 -> 제목 임베딩 -> 청크 임베딩 순서로 처리합니다.
    ///
    /// # Returns
    /// (코스 메타데이터, 생성된 청크 수)
    pub async fn add_course_document(&self, path: &Path) -> Result<(Course, usize)> {
        let file = FileCollector::collect_file(path)?
            .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {:?}", path))?;

        let text = load_text(&file)?;
        let parsed = parse_course_text(&text, &file.fallback_title());
        let chunks = chunk_course(&parsed, &self.chunker);

        // 1. 카탈로그 저장
        self.catalog
            .add_course(&parsed.course)
            .context("Failed to store course metadata")?;

        // 2. 제목 임베딩 -> 카탈로그 컬렉션
        let title_embedding = self
            .embedder
            .embed_document(&parsed.course.title)
            .await
            .context("Failed to embed course title")?;

        self.vectors
            .add_catalog_entry(&parsed.course.title, &title_embedding)
            .await
            .context("Failed to index course title")?;

        // 3. 청크 임베딩 -> 콘텐츠 컬렉션
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for document: {:?}", path);
            return Ok((parsed.course, 0));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;

        let entries: Vec<ChunkEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkEntry {
                course_title: chunk.course_title.clone(),
                lesson_number: chunk.lesson_number.unwrap_or(NO_LESSON),
                chunk_index: chunk.chunk_index,
                chunk_text: chunk.content.clone(),
                embedding,
            })
            .collect();

        let inserted = self
            .vectors
            .add_content_batch(&entries)
            .await
            .context("Failed to index chunks")?;

        tracing::info!(
            "Added course: {} ({} chunks)",
            parsed.course.title,
            inserted
        );

        Ok((parsed.course, inserted))
    }

    /// 폴더의 코스 문서 일괄 수집
    ///
    /// 이미 인덱싱된 제목의 코스는 건너뜁니다.
    pub async fn add_course_folder(&self, dir: &Path) -> Result<IngestReport> {
        let files = FileCollector::collect_directory(dir)?;
        let mut report = IngestReport::default();

        for file in files {
            // 제목만 먼저 파싱해서 중복 확인 (임베딩 비용 절약)
            let text = match load_text(&file) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("Failed to read {:?}: {}", file.path, e);
                    report.failed += 1;
                    continue;
                }
            };

            let parsed = parse_course_text(&text, &file.fallback_title());

            if self.catalog.exists(&parsed.course.title)? {
                tracing::debug!("Skipping existing course: {}", parsed.course.title);
                report.skipped += 1;
                continue;
            }

            match self.add_course_document(&file.path).await {
                Ok((_, chunk_count)) => {
                    report.new_courses += 1;
                    report.new_chunks += chunk_count;
                }
                Err(e) => {
                    tracing::warn!("Failed to ingest {:?}: {}", file.path, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// 인덱스 전체 삭제 (재수집용)
    pub async fn clear_index(&self) -> Result<()> {
        self.vectors.clear().await?;
        self.catalog.clear()?;
        tracing::info!("Cleared course index");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// RAG 쿼리 처리
    ///
    /// 세션 ID가 없으면 새 세션을 만듭니다.
    /// 모델이 툴 호출 여부를 자율 판단하고, 검색 출처는 응답에 포함됩니다.
    pub async fn query(&self, query: &str, session_id: Option<String>) -> Result<RagAnswer> {
        let session_id = session_id.unwrap_or_else(|| self.sessions.create_session());
        let history = self.sessions.format_history(&session_id);

        let prompt = format!("Answer this question about course materials: {}", query);

        let answer = self
            .generator
            .generate(&prompt, history.as_deref(), Some(&self.tools))
            .await?;

        // 이번 쿼리에서 검색된 출처 수집 후 초기화
        let sources = self.tools.last_sources();
        self.tools.reset_sources();

        self.sessions.add_exchange(&session_id, query, &answer);

        Ok(RagAnswer {
            answer,
            sources,
            session_id,
        })
    }

    /// 세션 히스토리 비우기
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear_session(session_id)
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    /// 코스 분석 정보
    pub fn analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.catalog.list_titles()?;

        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// 콘텐츠 청크 개수
    pub async fn chunk_count(&self) -> Result<usize> {
        self.vectors.count_content().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_report_default() {
        let report = IngestReport::default();
        assert_eq!(report.new_courses, 0);
        assert_eq!(report.new_chunks, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_analytics_serializes() {
        let analytics = CourseAnalytics {
            total_courses: 2,
            course_titles: vec!["A".to_string(), "B".to_string()],
        };

        let json = serde_json::to_value(&analytics).unwrap();
        assert_eq!(json["total_courses"], 2);
        assert_eq!(json["course_titles"][1], "B");
    }

    #[test]
    fn test_rag_answer_serializes_sources() {
        let answer = RagAnswer {
            answer: "text".to_string(),
            sources: vec![Source {
                label: "Course - Lesson 1".to_string(),
                link: None,
            }],
            session_id: "abc".to_string(),
        };

        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["sources"][0]["label"], "Course - Lesson 1");
        // link가 None이면 직렬화되지 않음
        assert!(json["sources"][0].get("link").is_none());
    }
}
