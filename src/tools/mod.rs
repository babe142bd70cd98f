//! Tools 모듈 - LLM 툴 정의 및 실행
//!
//! LLM이 호출할 수 있는 툴 콜백을 등록하고 이름으로 디스패치합니다.
//! 검색 툴이 찾은 출처(source)는 레지스트리를 통해 수집되어
//! API 응답에 포함됩니다.

mod outline;
mod search;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 출처
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// 표시용 레이블 (예: "Building RAG Systems - Lesson 1")
    pub label: String,
    /// 출처 링크
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// LLM API에 전달되는 툴 정의
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

// ============================================================================
// Tool Trait
// ============================================================================

/// LLM 툴 트레이트
///
/// 툴 이름/설명/입력 스키마가 LLM에 전달되고,
/// 모델이 호출을 결정하면 execute가 실행됩니다.
#[async_trait]
pub trait Tool: Send + Sync {
    /// 툴 이름 (LLM 호출 시 식별자)
    fn name(&self) -> &'static str;

    /// 툴 설명 (모델이 호출 여부를 판단하는 근거)
    fn description(&self) -> &'static str;

    /// JSON Schema 형식의 입력 스키마
    fn input_schema(&self) -> Value;

    /// 툴 실행
    ///
    /// 결과 문자열이 tool_result로 모델에 전달됩니다.
    async fn execute(&self, args: &Value) -> Result<String>;

    /// 마지막 실행에서 수집한 출처
    fn last_sources(&self) -> Vec<Source> {
        Vec::new()
    }

    /// 수집된 출처 초기화
    fn reset_sources(&self) {}
}

// ============================================================================
// ToolRegistry
// ============================================================================

/// 툴 레지스트리
///
/// 이름 기반 디스패치와 출처 수집을 담당합니다.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// 빈 레지스트리 생성
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// 툴 등록 (같은 이름이면 교체)
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool '{}' replaced by new registration", name);
        }
    }

    /// LLM API용 툴 정의 목록
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();

        // HashMap 순회 순서 고정
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// 등록된 툴 개수
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// 레지스트리가 비어있는지 확인
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 이름으로 툴 실행
    ///
    /// 모르는 툴 이름은 에러 대신 안내 문자열을 반환합니다.
    /// (모델에게 tool_result로 전달되어 재시도를 유도)
    pub async fn execute(&self, name: &str, args: &Value) -> Result<String> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => Ok(format!("Tool '{}' not found", name)),
        }
    }

    /// 모든 툴의 마지막 출처 수집
    pub fn last_sources(&self) -> Vec<Source> {
        let mut sources = Vec::new();
        for tool in self.tools.values() {
            sources.extend(tool.last_sources());
        }
        sources
    }

    /// 모든 툴의 출처 초기화
    pub fn reset_sources(&self) {
        for tool in self.tools.values() {
            tool.reset_sources();
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoTool {
        sources: Mutex<Vec<Source>>,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                sources: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echoes the input back"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: &Value) -> Result<String> {
            let text = args["text"].as_str().unwrap_or_default();
            self.sources.lock().unwrap().push(Source {
                label: "echo".to_string(),
                link: None,
            });
            Ok(text.to_string())
        }

        fn last_sources(&self) -> Vec<Source> {
            self.sources.lock().unwrap().clone()
        }

        fn reset_sources(&self) {
            self.sources.lock().unwrap().clear();
        }
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new()));

        let result = registry
            .execute("echo", &serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn test_registry_unknown_tool() {
        let registry = ToolRegistry::new();

        let result = registry
            .execute("missing", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result, "Tool 'missing' not found");
    }

    #[tokio::test]
    async fn test_registry_sources_lifecycle() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new()));

        registry
            .execute("echo", &serde_json::json!({"text": "x"}))
            .await
            .unwrap();
        assert_eq!(registry.last_sources().len(), 1);

        registry.reset_sources();
        assert!(registry.last_sources().is_empty());
    }

    #[test]
    fn test_definitions_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new()));

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert!(defs[0].input_schema["required"][0] == "text");
    }
}
