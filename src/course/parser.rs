//! 코스 문서 파서
//!
//! 구조화된 코스 문서를 정규식으로 분해합니다.
//!
//! 문서 형식:
//! ```text
//! Course Title: <제목>
//! Course Link: <URL>
//! Course Instructor: <강사명>
//!
//! Lesson 0: Introduction
//! Lesson Link: <URL>
//! <레슨 본문...>
//! ```

use regex::Regex;

use super::chunker::Chunker;
use super::{Course, CourseChunk, Lesson};

// ============================================================================
// Types
// ============================================================================

/// 레슨 본문 텍스트
///
/// 레슨 마커가 없는 문서는 번호 없는 세그먼트 하나로 취급됩니다.
#[derive(Debug, Clone)]
pub struct LessonText {
    /// 레슨 번호 (마커 없는 문서는 None)
    pub number: Option<i32>,
    /// 레슨 본문
    pub text: String,
}

/// 파싱된 코스 문서
#[derive(Debug, Clone)]
pub struct ParsedCourse {
    /// 코스 메타데이터 (레슨 목록 포함)
    pub course: Course,
    /// 레슨별 본문 텍스트
    pub lessons: Vec<LessonText>,
}

/// 파싱 중간 상태의 레슨 블록
struct LessonBlock {
    number: Option<i32>,
    title: Option<String>,
    link: Option<String>,
    text: String,
}

impl LessonBlock {
    fn preamble() -> Self {
        Self {
            number: None,
            title: None,
            link: None,
            text: String::new(),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// 코스 문서 텍스트 파싱
///
/// 메타데이터 라인은 대소문자 구분 없이 매칭합니다.
/// 제목이 없으면 `fallback_title`(보통 파일명)을 사용합니다.
///
/// # Arguments
/// * `text` - 문서 전체 텍스트
/// * `fallback_title` - 제목 메타데이터가 없을 때 사용할 제목
pub fn parse_course_text(text: &str, fallback_title: &str) -> ParsedCourse {
    let title_re = Regex::new(r"(?i)^course title:\s*(.+)$").unwrap();
    let link_re = Regex::new(r"(?i)^course link:\s*(.+)$").unwrap();
    let instructor_re = Regex::new(r"(?i)^course instructor:\s*(.+)$").unwrap();
    let lesson_re = Regex::new(r"(?i)^lesson\s+(\d+):\s*(.*)$").unwrap();
    let lesson_link_re = Regex::new(r"(?i)^lesson link:\s*(.+)$").unwrap();

    let mut title: Option<String> = None;
    let mut course_link: Option<String> = None;
    let mut instructor: Option<String> = None;

    let mut blocks: Vec<LessonBlock> = Vec::new();
    let mut current = LessonBlock::preamble();
    let mut seen_lesson_marker = false;
    // 레슨 마커 직후 한 줄에서만 Lesson Link를 인식
    let mut expect_lesson_link = false;

    for line in text.lines() {
        let trimmed = line.trim();

        // 레슨 마커: 현재 블록을 닫고 새 블록 시작
        if let Some(caps) = lesson_re.captures(trimmed) {
            blocks.push(current);

            let number = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<i32>().ok());
            let lesson_title = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty());

            current = LessonBlock {
                number,
                title: lesson_title,
                link: None,
                text: String::new(),
            };
            seen_lesson_marker = true;
            expect_lesson_link = true;
            continue;
        }

        // 레슨 마커 바로 다음 줄의 Lesson Link는 본문에서 제외
        if expect_lesson_link {
            expect_lesson_link = false;
            if let Some(caps) = lesson_link_re.captures(trimmed) {
                current.link = caps.get(1).map(|m| m.as_str().trim().to_string());
                continue;
            }
        }

        // 헤더 영역의 메타데이터 라인
        if !seen_lesson_marker {
            if let Some(caps) = title_re.captures(trimmed) {
                title = caps.get(1).map(|m| m.as_str().trim().to_string());
                continue;
            }
            if let Some(caps) = link_re.captures(trimmed) {
                course_link = caps.get(1).map(|m| m.as_str().trim().to_string());
                continue;
            }
            if let Some(caps) = instructor_re.captures(trimmed) {
                instructor = caps.get(1).map(|m| m.as_str().trim().to_string());
                continue;
            }
        }

        current.text.push_str(line);
        current.text.push('\n');
    }
    blocks.push(current);

    // 블록 -> 레슨 메타데이터 + 본문 변환
    let mut lessons = Vec::new();
    let mut lesson_texts = Vec::new();

    for block in blocks {
        let body = block.text.trim().to_string();

        match block.number {
            Some(number) => {
                lessons.push(Lesson {
                    number,
                    title: block.title.unwrap_or_default(),
                    lesson_link: block.link,
                });

                if !body.is_empty() {
                    lesson_texts.push(LessonText {
                        number: Some(number),
                        text: body,
                    });
                }
            }
            None => {
                // 프리앰블은 레슨 마커가 전혀 없는 문서에서만 본문으로 취급
                if !seen_lesson_marker && !body.is_empty() {
                    lesson_texts.push(LessonText { number: None, text: body });
                }
            }
        }
    }

    let course = Course {
        title: title.unwrap_or_else(|| fallback_title.trim().to_string()),
        course_link,
        instructor,
        lessons,
    };

    ParsedCourse {
        course,
        lessons: lesson_texts,
    }
}

// ============================================================================
// Chunk Building
// ============================================================================

/// 파싱된 코스를 인덱싱용 청크로 변환
///
/// 컨텍스트 접두어 규칙:
/// - 레슨의 첫 청크: `"Course <제목> Lesson <번호> content: "`
/// - 레슨의 이후 청크: `"Lesson <번호> content: "`
/// - 레슨 번호가 없으면 첫 청크에만 `"Course <제목> content: "`
pub fn chunk_course(parsed: &ParsedCourse, chunker: &dyn Chunker) -> Vec<CourseChunk> {
    let mut result = Vec::new();
    let mut chunk_index: i32 = 0;

    for lesson in &parsed.lessons {
        let chunks = chunker.chunk(&lesson.text);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let content = match (lesson.number, i) {
                (Some(n), 0) => {
                    format!(
                        "Course {} Lesson {} content: {}",
                        parsed.course.title, n, chunk
                    )
                }
                (Some(n), _) => format!("Lesson {} content: {}", n, chunk),
                (None, 0) => format!("Course {} content: {}", parsed.course.title, chunk),
                (None, _) => chunk,
            };

            result.push(CourseChunk {
                content,
                course_title: parsed.course.title.clone(),
                lesson_number: lesson.number,
                chunk_index,
            });
            chunk_index += 1;
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::chunker::{ChunkConfig, SentenceChunker};
    use super::*;

    const SAMPLE_DOC: &str = "\
Course Title: Building RAG Systems
Course Link: https://example.com/rag
Course Instructor: Jane Doe

Lesson 0: Introduction
Lesson Link: https://example.com/rag/lesson-0
Welcome to the course. This lesson covers the basics of retrieval.

Lesson 1: Chunking Strategies
Lesson Link: https://example.com/rag/lesson-1
Chunking splits documents into windows. Overlap preserves context.
";

    #[test]
    fn test_parse_metadata() {
        let parsed = parse_course_text(SAMPLE_DOC, "fallback");

        assert_eq!(parsed.course.title, "Building RAG Systems");
        assert_eq!(
            parsed.course.course_link.as_deref(),
            Some("https://example.com/rag")
        );
        assert_eq!(parsed.course.instructor.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_parse_lessons() {
        let parsed = parse_course_text(SAMPLE_DOC, "fallback");

        assert_eq!(parsed.course.lessons.len(), 2);
        assert_eq!(parsed.course.lessons[0].number, 0);
        assert_eq!(parsed.course.lessons[0].title, "Introduction");
        assert_eq!(
            parsed.course.lessons[0].lesson_link.as_deref(),
            Some("https://example.com/rag/lesson-0")
        );
        assert_eq!(parsed.course.lessons[1].title, "Chunking Strategies");

        // 레슨 본문에 Lesson Link 라인이 포함되지 않아야 함
        assert_eq!(parsed.lessons.len(), 2);
        assert!(!parsed.lessons[0].text.contains("Lesson Link"));
        assert!(parsed.lessons[0].text.starts_with("Welcome to the course."));
    }

    #[test]
    fn test_parse_case_insensitive_metadata() {
        let doc = "course title: Lowercase Course\nCOURSE INSTRUCTOR: Bob\n\nSome text.";
        let parsed = parse_course_text(doc, "fallback");

        assert_eq!(parsed.course.title, "Lowercase Course");
        assert_eq!(parsed.course.instructor.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_parse_missing_title_uses_fallback() {
        let doc = "Just some plain text without any structure.";
        let parsed = parse_course_text(doc, "my_course_file");

        assert_eq!(parsed.course.title, "my_course_file");
        assert!(parsed.course.lessons.is_empty());
        assert_eq!(parsed.lessons.len(), 1);
        assert_eq!(parsed.lessons[0].number, None);
    }

    #[test]
    fn test_parse_empty_document() {
        let parsed = parse_course_text("", "empty");
        assert_eq!(parsed.course.title, "empty");
        assert!(parsed.lessons.is_empty());
    }

    #[test]
    fn test_parse_lesson_without_link() {
        let doc = "\
Course Title: No Links

Lesson 0: Only Content
The lesson body starts immediately.
";
        let parsed = parse_course_text(doc, "fallback");

        assert_eq!(parsed.course.lessons.len(), 1);
        assert!(parsed.course.lessons[0].lesson_link.is_none());
        assert_eq!(
            parsed.lessons[0].text,
            "The lesson body starts immediately."
        );
    }

    #[test]
    fn test_parse_blank_lesson_skipped() {
        let doc = "\
Course Title: Sparse

Lesson 0: Empty One

Lesson 1: Has Body
Actual content here.
";
        let parsed = parse_course_text(doc, "fallback");

        // 메타데이터에는 두 레슨 모두 기록
        assert_eq!(parsed.course.lessons.len(), 2);
        // 본문은 비어있지 않은 레슨만
        assert_eq!(parsed.lessons.len(), 1);
        assert_eq!(parsed.lessons[0].number, Some(1));
    }

    #[test]
    fn test_chunk_course_prefixes() {
        let parsed = parse_course_text(SAMPLE_DOC, "fallback");
        let chunker = SentenceChunker::new(ChunkConfig::default());
        let chunks = chunk_course(&parsed, &chunker);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0]
            .content
            .starts_with("Course Building RAG Systems Lesson 0 content:"));
        assert!(chunks[1]
            .content
            .starts_with("Course Building RAG Systems Lesson 1 content:"));

        // 청크 인덱스는 코스 전체에서 연속
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[0].lesson_number, Some(0));
        assert_eq!(chunks[1].lesson_number, Some(1));
    }

    #[test]
    fn test_chunk_course_later_chunks_use_short_prefix() {
        let doc = "\
Course Title: Long Lesson

Lesson 3: Depth
First sentence of the lesson body. Second sentence of the lesson body. \
Third sentence of the lesson body. Fourth sentence of the lesson body.
";
        let parsed = parse_course_text(doc, "fallback");
        let chunker = SentenceChunker::new(ChunkConfig {
            max_characters: 80,
            overlap_characters: 0,
        });
        let chunks = chunk_course(&parsed, &chunker);

        assert!(chunks.len() >= 2);
        assert!(chunks[0].content.starts_with("Course Long Lesson Lesson 3 content:"));
        assert!(chunks[1].content.starts_with("Lesson 3 content:"));
    }

    #[test]
    fn test_chunk_course_empty() {
        let parsed = parse_course_text("Course Title: Hollow\n", "fallback");
        let chunker = SentenceChunker::with_defaults();
        assert!(chunk_course(&parsed, &chunker).is_empty());
    }
}
