//! Vector 모듈 - 벡터 인덱스 트레이트 및 타입
//!
//! 두 개의 벡터 컬렉션을 관리합니다:
//! - 코스 카탈로그: 코스 제목 임베딩 (퍼지 코스명 해석용)
//! - 코스 콘텐츠: 청크 임베딩 (시맨틱 검색용)

mod lance;

pub use lance::LanceVectorStore;

use anyhow::Result;
use async_trait::async_trait;

/// 벡터 임베딩 차원 (Gemini gemini-embedding-001 기본값)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const EMBEDDING_DIMENSION: i32 = 768;

/// 레슨 번호가 없는 청크의 저장용 표현
///
/// LanceDB 고정 스키마에는 NULL 대신 -1을 저장하고
/// 경계에서 None으로 되돌립니다.
pub const NO_LESSON: i32 = -1;

// ============================================================================
// Types
// ============================================================================

/// 콘텐츠 청크 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct ChunkEntry {
    /// 소속 코스 제목
    pub course_title: String,
    /// 레슨 번호 (없으면 NO_LESSON)
    pub lesson_number: i32,
    /// 코스 내 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 콘텐츠 검색 결과
#[derive(Debug, Clone)]
pub struct ContentHit {
    /// 소속 코스 제목
    pub course_title: String,
    /// 레슨 번호
    pub lesson_number: Option<i32>,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 유사도 스코어 (0.0 ~ 1.0)
    pub score: f32,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트 (async)
///
/// 카탈로그/콘텐츠 두 컬렉션의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 카탈로그에 코스 제목 임베딩 추가
    async fn add_catalog_entry(&self, course_title: &str, embedding: &[f32]) -> Result<()>;

    /// 콘텐츠 청크 배치 삽입
    async fn add_content_batch(&self, entries: &[ChunkEntry]) -> Result<usize>;

    /// 퍼지 코스명 해석 (카탈로그 top-1 매칭)
    async fn resolve_course(&self, query_embedding: &[f32]) -> Result<Option<String>>;

    /// 콘텐츠 시맨틱 검색 (선택적 코스/레슨 필터)
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        course_title: Option<&str>,
        lesson_number: Option<i32>,
    ) -> Result<Vec<ContentHit>>;

    /// 코스의 벡터 전체 삭제 (카탈로그 + 콘텐츠)
    async fn delete_course(&self, course_title: &str) -> Result<()>;

    /// 콘텐츠 청크 개수
    async fn count_content(&self) -> Result<usize>;

    /// 카탈로그 엔트리 개수
    async fn count_catalog(&self) -> Result<usize>;

    /// 두 컬렉션 모두 비우기
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_entry_lesson_sentinel() {
        let entry = ChunkEntry {
            course_title: "Test".to_string(),
            lesson_number: NO_LESSON,
            chunk_index: 0,
            chunk_text: "text".to_string(),
            embedding: vec![0.0; EMBEDDING_DIMENSION as usize],
        };
        assert_eq!(entry.lesson_number, -1);
    }
}
