//! Generator 모듈 - Anthropic Messages API 응답 생성
//!
//! Claude 툴 호출(tool use)을 사용한 2단계 호출 패턴:
//! 1. 툴 정의와 함께 호출 -> 모델이 검색 필요 여부를 자율 판단
//! 2. stop_reason이 tool_use면 툴 실행 후 결과를 붙여 재호출 (툴 없이)
//!
//! ref: https://docs.anthropic.com/en/api/messages

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::tools::{ToolDefinition, ToolRegistry};

/// Anthropic Messages API 엔드포인트
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
/// API 버전 헤더 값
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 시스템 프롬프트
///
/// 모델의 툴 사용 프로토콜: 코스 내용 질문에만 검색 툴을 쓰고,
/// 쿼리당 최대 한 번만 검색하며, 검색 과정은 답변에 드러내지 않습니다.
const SYSTEM_PROMPT: &str = "\
You are an AI assistant specialized in course materials and educational content.

Tool usage:
- Use the search tool only for questions about specific course content
- Use the outline tool for questions about a course's structure or lesson list
- At most one tool call per user question
- If a tool returns no results, say so clearly without guessing

Response protocol:
- Answer general knowledge questions directly without tools
- Do not mention the search process or the tools in your answer
- Keep answers brief, concrete, and educational";

// ============================================================================
// Wire Types
// ============================================================================

/// 메시지 콘텐츠 블록
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// 일반 텍스트
    Text { text: String },
    /// 모델의 툴 호출 요청
    ToolUse { id: String, name: String, input: Value },
    /// 툴 실행 결과 (유저 메시지로 전달)
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// API 메시지
#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: String,
    content: Vec<ContentBlock>,
}

impl ApiMessage {
    fn user_text(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }
}

/// Messages API 요청 본문
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [ApiMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

/// 파싱된 API 응답
#[derive(Debug, Clone)]
struct ParsedResponse {
    content: Vec<ContentBlock>,
    stop_reason: String,
}

// ============================================================================
// ClaudeGenerator
// ============================================================================

/// Anthropic 응답 생성기
pub struct ClaudeGenerator {
    api_key: String,
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
}

impl ClaudeGenerator {
    /// 새 생성기 생성
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            model,
            max_tokens,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    ///
    /// 키가 없어도 생성은 성공하며, 실제 호출 시점에 실패합니다.
    pub fn from_env(model: String, max_tokens: u32) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        Self::new(api_key, model, max_tokens)
    }

    /// 응답 생성
    ///
    /// # Arguments
    /// * `query` - 사용자 질문
    /// * `history` - 포맷된 대화 히스토리 (시스템 프롬프트에 포함)
    /// * `registry` - 툴 레지스트리 (None이면 툴 없이 호출)
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        registry: Option<&ToolRegistry>,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            anyhow::bail!(
                "ANTHROPIC_API_KEY not set. Set: export ANTHROPIC_API_KEY=your-api-key"
            );
        }

        // 히스토리는 시스템 프롬프트에 포함
        let system = match history {
            Some(h) => format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, h),
            None => SYSTEM_PROMPT.to_string(),
        };

        let mut messages = vec![ApiMessage::user_text(query)];

        let definitions = registry
            .filter(|r| !r.is_empty())
            .map(|r| r.definitions());

        // 1차 호출 (툴 정의 포함)
        let first = self
            .call(&system, &messages, definitions.as_deref())
            .await?;

        // 모델이 툴 호출을 요청한 경우
        if first.stop_reason == "tool_use" {
            if let Some(registry) = registry {
                let tool_results = self.run_tools(registry, &first.content).await;

                if !tool_results.is_empty() {
                    messages.push(ApiMessage {
                        role: "assistant".to_string(),
                        content: first.content.clone(),
                    });
                    messages.push(ApiMessage {
                        role: "user".to_string(),
                        content: tool_results,
                    });

                    // 2차 호출 (툴 없이 - 쿼리당 한 번의 검색 라운드)
                    let second = self.call(&system, &messages, None).await?;
                    return Ok(collect_text(&second.content));
                }
            }
        }

        Ok(collect_text(&first.content))
    }

    /// 응답에 포함된 모든 tool_use 블록 실행
    async fn run_tools(
        &self,
        registry: &ToolRegistry,
        content: &[ContentBlock],
    ) -> Vec<ContentBlock> {
        let mut results = Vec::new();

        for block in content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };

            tracing::info!("Executing tool: {}", name);

            let result = match registry.execute(name, input).await {
                Ok(output) => ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: output,
                    is_error: None,
                },
                Err(e) => {
                    tracing::warn!("Tool '{}' failed: {}", name, e);
                    ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: format!("Tool execution failed: {}", e),
                        is_error: Some(true),
                    }
                }
            };

            results.push(result);
        }

        results
    }

    /// Messages API 단일 호출
    async fn call(
        &self,
        system: &str,
        messages: &[ApiMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ParsedResponse> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system,
            messages,
            tools,
        };

        let response = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Failed to read Anthropic API response")?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            anyhow::bail!("Anthropic API error ({}): {}", status, message);
        }

        parse_response(&body)
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// API 응답 본문 파싱
///
/// text / tool_use 블록만 수집하고 나머지 타입은 무시합니다.
fn parse_response(body: &Value) -> Result<ParsedResponse> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Missing content in Anthropic response"))?;

    let mut blocks = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    blocks.push(ContentBlock::Text {
                        text: text.to_string(),
                    });
                }
            }
            Some("tool_use") => {
                blocks.push(ContentBlock::ToolUse {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    input: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    let stop_reason = body["stop_reason"]
        .as_str()
        .unwrap_or("end_turn")
        .to_string();

    Ok(ParsedResponse {
        content: blocks,
        stop_reason,
    })
}

/// 텍스트 블록만 이어붙이기
fn collect_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// API Key Management
// ============================================================================

/// Anthropic API 키 존재 여부 확인
pub fn has_anthropic_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_text_only() {
        let body = json!({
            "content": [{ "type": "text", "text": "Hello there" }],
            "stop_reason": "end_turn"
        });

        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.stop_reason, "end_turn");
        assert_eq!(collect_text(&parsed.content), "Hello there");
    }

    #[test]
    fn test_parse_response_tool_use() {
        let body = json!({
            "content": [
                { "type": "text", "text": "Let me look that up." },
                {
                    "type": "tool_use",
                    "id": "toolu_123",
                    "name": "search_course_content",
                    "input": { "query": "chunking" }
                }
            ],
            "stop_reason": "tool_use"
        });

        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.stop_reason, "tool_use");
        assert_eq!(parsed.content.len(), 2);

        let ContentBlock::ToolUse { id, name, input } = &parsed.content[1] else {
            panic!("expected tool_use block");
        };
        assert_eq!(id, "toolu_123");
        assert_eq!(name, "search_course_content");
        assert_eq!(input["query"], "chunking");
    }

    #[test]
    fn test_parse_response_ignores_unknown_blocks() {
        let body = json!({
            "content": [
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "Answer" }
            ],
            "stop_reason": "end_turn"
        });

        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.content.len(), 1);
    }

    #[test]
    fn test_parse_response_missing_content() {
        let body = json!({ "error": { "message": "bad" } });
        assert!(parse_response(&body).is_err());
    }

    #[test]
    fn test_content_block_serialization() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_123".to_string(),
            content: "results here".to_string(),
            is_error: None,
        };

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "toolu_123");
        // is_error는 None일 때 직렬화되지 않음
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn test_request_omits_tools_when_none() {
        let messages = vec![ApiMessage::user_text("hi")];
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 800,
            temperature: 0.0,
            system: "system",
            messages: &messages,
            tools: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn test_generate_without_key_fails() {
        let generator = ClaudeGenerator::new(
            String::new(),
            "claude-sonnet-4-20250514".to_string(),
            800,
        )
        .unwrap();

        let result = generator.generate("hello", None, None).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("ANTHROPIC_API_KEY"));
    }
}
