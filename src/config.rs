//! 설정 모듈
//!
//! RAG 시스템 전역 설정입니다. 기본값 + 환경변수 오버라이드 방식으로 동작합니다.

use std::path::PathBuf;

use crate::course::ChunkConfig;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.course-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".course-rag")
}

// ============================================================================
// RagConfig
// ============================================================================

/// RAG 시스템 설정
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// 코스 문서 폴더 (서버 시작 시 자동 수집)
    pub docs_dir: PathBuf,
    /// 데이터 저장 디렉토리 (SQLite + LanceDB)
    pub data_dir: PathBuf,
    /// Anthropic 모델 ID
    pub anthropic_model: String,
    /// 응답 최대 토큰 수
    pub max_tokens: u32,
    /// 청킹 설정
    pub chunk: ChunkConfig,
    /// 검색 결과 최대 개수
    pub max_results: usize,
    /// 세션당 유지할 대화 교환 수
    pub max_history: usize,
    /// HTTP 서버 바인드 주소
    pub host: String,
    /// HTTP 서버 포트
    pub port: u16,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            data_dir: get_data_dir(),
            anthropic_model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 800,
            chunk: ChunkConfig::default(),
            max_results: 5,
            max_history: 2,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl RagConfig {
    /// 환경변수를 반영한 설정 생성
    ///
    /// 오버라이드 가능 변수:
    /// - `COURSE_RAG_DOCS_DIR`: 코스 문서 폴더
    /// - `COURSE_RAG_DATA_DIR`: 데이터 디렉토리
    /// - `COURSE_RAG_PORT`: 서버 포트
    /// - `COURSE_RAG_MODEL`: Anthropic 모델 ID
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("COURSE_RAG_DOCS_DIR") {
            if !dir.is_empty() {
                config.docs_dir = PathBuf::from(dir);
            }
        }

        if let Ok(dir) = std::env::var("COURSE_RAG_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(port) = std::env::var("COURSE_RAG_PORT") {
            match port.parse::<u16>() {
                Ok(p) => config.port = p,
                Err(_) => tracing::warn!("Invalid COURSE_RAG_PORT value: {}", port),
            }
        }

        if let Ok(model) = std::env::var("COURSE_RAG_MODEL") {
            if !model.is_empty() {
                config.anthropic_model = model;
            }
        }

        config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.max_history, 2);
        assert_eq!(config.chunk.max_characters, 800);
        assert_eq!(config.chunk.overlap_characters, 100);
    }

    #[test]
    fn test_data_dir_ends_with_app_name() {
        let dir = get_data_dir();
        assert!(dir.ends_with(".course-rag"));
    }
}
