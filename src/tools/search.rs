//! 코스 콘텐츠 검색 툴
//!
//! LLM이 호출하는 시맨틱 검색 툴입니다.
//! 퍼지 코스명은 카탈로그 컬렉션에서 top-1 매칭으로 해석합니다.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::CatalogStore;
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::vector::{ContentHit, LanceVectorStore, VectorIndex};

use super::{Source, Tool};

// ============================================================================
// CourseSearchTool
// ============================================================================

/// 코스 콘텐츠 검색 툴
pub struct CourseSearchTool {
    embedder: Arc<GeminiEmbedding>,
    vectors: Arc<LanceVectorStore>,
    catalog: Arc<CatalogStore>,
    max_results: usize,
    sources: Mutex<Vec<Source>>,
}

impl CourseSearchTool {
    /// 새 검색 툴 생성
    pub fn new(
        embedder: Arc<GeminiEmbedding>,
        vectors: Arc<LanceVectorStore>,
        catalog: Arc<CatalogStore>,
        max_results: usize,
    ) -> Self {
        Self {
            embedder,
            vectors,
            catalog,
            max_results,
            sources: Mutex::new(Vec::new()),
        }
    }

    /// 퍼지 코스명 해석
    async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let embedding = self
            .embedder
            .embed_query(name)
            .await
            .context("Failed to embed course name")?;

        self.vectors.resolve_course(&embedding).await
    }

    /// 검색 결과 포맷 + 출처 기록
    fn format_hits(&self, hits: &[ContentHit]) -> String {
        let mut blocks = Vec::with_capacity(hits.len());
        let mut sources = self.sources.lock().expect("sources lock poisoned");

        for hit in hits {
            let header = match hit.lesson_number {
                Some(n) => format!("[{} - Lesson {}]", hit.course_title, n),
                None => format!("[{}]", hit.course_title),
            };
            blocks.push(format!("{}\n{}", header, hit.chunk_text));

            let label = match hit.lesson_number {
                Some(n) => format!("{} - Lesson {}", hit.course_title, n),
                None => hit.course_title.clone(),
            };

            // 같은 출처는 한 번만 기록
            if sources.iter().any(|s| s.label == label) {
                continue;
            }

            let link = match hit.lesson_number {
                Some(n) => self
                    .catalog
                    .get_lesson_link(&hit.course_title, n)
                    .unwrap_or(None),
                None => self
                    .catalog
                    .get_course(&hit.course_title)
                    .ok()
                    .flatten()
                    .and_then(|c| c.course_link),
            };

            sources.push(Source { label, link });
        }

        blocks.join("\n\n")
    }

    /// 결과 없음 메시지 (적용된 필터 설명 포함)
    fn empty_message(course_title: Option<&str>, lesson_number: Option<i32>) -> String {
        let mut filter_desc = String::new();
        if let Some(title) = course_title {
            filter_desc.push_str(&format!(" in course '{}'", title));
        }
        if let Some(lesson) = lesson_number {
            filter_desc.push_str(&format!(" in lesson {}", lesson));
        }
        format!("No relevant content found{}.", filter_desc)
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &'static str {
        "search_course_content"
    }

    fn description(&self) -> &'static str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing required argument: query"))?;
        let course_name = args["course_name"].as_str();
        let lesson_number = args["lesson_number"].as_i64().map(|n| n as i32);

        // 1. 퍼지 코스명 해석
        let resolved = match course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => return Ok(format!("No course found matching '{}'", name)),
            },
            None => None,
        };

        // 2. 콘텐츠 검색
        let query_embedding = self
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed search query")?;

        let hits = self
            .vectors
            .search(
                &query_embedding,
                self.max_results,
                resolved.as_deref(),
                lesson_number,
            )
            .await
            .context("Content search failed")?;

        if hits.is_empty() {
            return Ok(Self::empty_message(resolved.as_deref(), lesson_number));
        }

        Ok(self.format_hits(&hits))
    }

    fn last_sources(&self) -> Vec<Source> {
        self.sources.lock().expect("sources lock poisoned").clone()
    }

    fn reset_sources(&self) {
        self.sources.lock().expect("sources lock poisoned").clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_formats() {
        assert_eq!(
            CourseSearchTool::empty_message(None, None),
            "No relevant content found."
        );
        assert_eq!(
            CourseSearchTool::empty_message(Some("RAG"), None),
            "No relevant content found in course 'RAG'."
        );
        assert_eq!(
            CourseSearchTool::empty_message(Some("RAG"), Some(2)),
            "No relevant content found in course 'RAG' in lesson 2."
        );
    }
}
