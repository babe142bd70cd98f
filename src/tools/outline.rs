//! 코스 개요 툴
//!
//! 코스 제목/링크와 레슨 목록을 반환합니다.
//! 검색 툴과 같은 방식으로 퍼지 코스명을 해석합니다.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::CatalogStore;
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::vector::{LanceVectorStore, VectorIndex};

use super::{Source, Tool};

// ============================================================================
// CourseOutlineTool
// ============================================================================

/// 코스 개요 조회 툴
pub struct CourseOutlineTool {
    embedder: Arc<GeminiEmbedding>,
    vectors: Arc<LanceVectorStore>,
    catalog: Arc<CatalogStore>,
    sources: Mutex<Vec<Source>>,
}

impl CourseOutlineTool {
    /// 새 개요 툴 생성
    pub fn new(
        embedder: Arc<GeminiEmbedding>,
        vectors: Arc<LanceVectorStore>,
        catalog: Arc<CatalogStore>,
    ) -> Self {
        Self {
            embedder,
            vectors,
            catalog,
            sources: Mutex::new(Vec::new()),
        }
    }

    /// 개요 텍스트 포맷
    fn format_outline(course: &crate::course::Course) -> String {
        let mut out = format!("Course: {}", course.title);

        if let Some(link) = &course.course_link {
            out.push_str(&format!("\nCourse Link: {}", link));
        }
        if let Some(instructor) = &course.instructor {
            out.push_str(&format!("\nInstructor: {}", instructor));
        }

        if course.lessons.is_empty() {
            out.push_str("\n\nNo lessons recorded for this course.");
        } else {
            out.push_str(&format!("\n\nLessons ({}):", course.lessons.len()));
            for lesson in &course.lessons {
                out.push_str(&format!("\n{}. {}", lesson.number, lesson.title));
            }
        }

        out
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &'static str {
        "get_course_outline"
    }

    fn description(&self) -> &'static str {
        "Get the outline of a course: title, link, and the full lesson list"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work)"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<String> {
        let course_name = args["course_name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing required argument: course_name"))?;

        // 퍼지 코스명 해석
        let embedding = self
            .embedder
            .embed_query(course_name)
            .await
            .context("Failed to embed course name")?;

        let Some(title) = self.vectors.resolve_course(&embedding).await? else {
            return Ok(format!("No course found matching '{}'", course_name));
        };

        // 카탈로그에서 메타데이터 조회
        let Some(course) = self.catalog.get_course(&title)? else {
            return Ok(format!("No course found matching '{}'", course_name));
        };

        // 출처 기록
        {
            let mut sources = self.sources.lock().expect("sources lock poisoned");
            sources.push(Source {
                label: course.title.clone(),
                link: course.course_link.clone(),
            });
        }

        Ok(Self::format_outline(&course))
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
    use crate::course::{Course, Lesson};

    #[test]
    fn test_format_outline_full() {
        let course = Course {
            title: "Building RAG Systems".to_string(),
            course_link: Some("https://example.com/rag".to_string()),
            instructor: Some("Jane Doe".to_string()),
            lessons: vec![
                Lesson {
                    number: 0,
                    title: "Introduction".to_string(),
                    lesson_link: None,
                },
                Lesson {
                    number: 1,
                    title: "Chunking".to_string(),
                    lesson_link: None,
                },
            ],
        };

        let outline = CourseOutlineTool::format_outline(&course);
        assert!(outline.starts_with("Course: Building RAG Systems"));
        assert!(outline.contains("Course Link: https://example.com/rag"));
        assert!(outline.contains("Lessons (2):"));
        assert!(outline.contains("0. Introduction"));
        assert!(outline.contains("1. Chunking"));
    }

    #[test]
    fn test_format_outline_without_lessons() {
        let course = Course {
            title: "Empty".to_string(),
            course_link: None,
            instructor: None,
            lessons: vec![],
        };

        let outline = CourseOutlineTool::format_outline(&course);
        assert!(outline.contains("No lessons recorded"));
        assert!(!outline.contains("Course Link"));
    }
}
