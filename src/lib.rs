//! course-rag - 코스 자료 RAG 챗봇 백엔드
//!
//! 코스 문서를 청킹하여 LanceDB 벡터 컬렉션에 임베딩하고,
//! Claude 툴 호출(tool use)로 시맨틱 검색을 수행하는 RAG 시스템입니다.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod course;
pub mod embedding;
pub mod generator;
pub mod rag;
pub mod session;
pub mod tools;
pub mod vector;

// Re-exports
pub use catalog::{CatalogStats, CatalogStore};
pub use config::{get_data_dir, RagConfig};
pub use course::{
    default_chunker, parse_course_text, ChunkConfig, Chunker, Course, CourseChunk, Lesson,
    ParsedCourse, SentenceChunker,
};
pub use embedding::{get_gemini_api_key, has_gemini_api_key, EmbeddingProvider, GeminiEmbedding};
pub use generator::{has_anthropic_api_key, ClaudeGenerator};
pub use rag::{CourseAnalytics, IngestReport, RagAnswer, RagSystem};
pub use session::SessionManager;
pub use tools::{Source, Tool, ToolDefinition, ToolRegistry};
pub use vector::{ChunkEntry, ContentHit, LanceVectorStore, VectorIndex, EMBEDDING_DIMENSION};
