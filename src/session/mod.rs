//! Session 모듈 - 인메모리 대화 세션 관리
//!
//! 세션별 질문/답변 교환을 고정 윈도우로 유지합니다.
//! 프로세스 수명 동안만 유지되며 디스크에 저장하지 않습니다.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

// ============================================================================
// Types
// ============================================================================

/// 질문/답변 교환 한 쌍
#[derive(Debug, Clone)]
struct Exchange {
    question: String,
    answer: String,
}

// ============================================================================
// SessionManager
// ============================================================================

/// 세션 관리자
///
/// 세션당 최대 `max_history`개의 교환만 유지하며,
/// 초과 시 가장 오래된 교환부터 제거합니다.
pub struct SessionManager {
    max_history: usize,
    sessions: Mutex<HashMap<String, Vec<Exchange>>>,
}

impl SessionManager {
    /// 새 세션 관리자 생성
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 새 세션 생성 (UUID v4)
    pub fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();

        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        sessions.insert(session_id.clone(), Vec::new());

        tracing::debug!("Created session: {}", session_id);
        session_id
    }

    /// 교환 기록 추가
    ///
    /// 모르는 세션 ID면 자동으로 생성합니다.
    pub fn add_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let history = sessions.entry(session_id.to_string()).or_default();

        history.push(Exchange {
            question: question.to_string(),
            answer: answer.to_string(),
        });

        // 고정 윈도우: 오래된 교환부터 제거
        while history.len() > self.max_history {
            history.remove(0);
        }
    }

    /// 세션 히스토리를 프롬프트용 문자열로 포맷
    ///
    /// 히스토리가 없으면 None을 반환합니다.
    pub fn format_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.lock().expect("session lock poisoned");
        let history = sessions.get(session_id)?;

        if history.is_empty() {
            return None;
        }

        let formatted = history
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n");

        Some(formatted)
    }

    /// 세션 히스토리 비우기
    ///
    /// 세션이 존재했으면 true를 반환합니다.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");

        match sessions.get_mut(session_id) {
            Some(history) => {
                history.clear();
                true
            }
            None => false,
        }
    }

    /// 활성 세션 개수
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_unique() {
        let manager = SessionManager::new(2);
        let a = manager.create_session();
        let b = manager.create_session();
        assert_ne!(a, b);
        assert_eq!(manager.session_count(), 2);
    }

    #[test]
    fn test_format_history_empty() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();

        assert!(manager.format_history(&id).is_none());
        assert!(manager.format_history("unknown").is_none());
    }

    #[test]
    fn test_add_and_format_history() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();

        manager.add_exchange(&id, "What is RAG?", "Retrieval-augmented generation.");

        let history = manager.format_history(&id).unwrap();
        assert!(history.contains("User: What is RAG?"));
        assert!(history.contains("Assistant: Retrieval-augmented generation."));
    }

    #[test]
    fn test_history_window_evicts_oldest() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();

        manager.add_exchange(&id, "first", "a1");
        manager.add_exchange(&id, "second", "a2");
        manager.add_exchange(&id, "third", "a3");

        let history = manager.format_history(&id).unwrap();
        assert!(!history.contains("first"));
        assert!(history.contains("second"));
        assert!(history.contains("third"));
    }

    #[test]
    fn test_add_exchange_auto_creates_session() {
        let manager = SessionManager::new(2);

        manager.add_exchange("custom-id", "question", "answer");

        assert!(manager.format_history("custom-id").is_some());
    }

    #[test]
    fn test_clear_session() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();
        manager.add_exchange(&id, "q", "a");

        assert!(manager.clear_session(&id));
        assert!(manager.format_history(&id).is_none());

        // 없는 세션은 false
        assert!(!manager.clear_session("unknown"));
    }
}
