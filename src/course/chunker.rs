//! Text Chunking Module
//!
//! 문장 단위 고정 크기 청킹을 제공합니다.
//! 문장 경계를 존중하면서 청크 간 오버랩을 적용합니다.

use regex::Regex;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
    /// 오버랩 크기 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 800,
            overlap_characters: 100,
        }
    }
}

impl ChunkConfig {
    /// 오버랩 없는 설정 (빠른 인덱싱용)
    pub fn without_overlap(max_characters: usize) -> Self {
        Self {
            max_characters,
            overlap_characters: 0,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문장 인식 청커
///
/// 텍스트를 문장 단위로 나눈 뒤 최대 크기까지 채워서 청크를 만듭니다:
/// - 문장 중간에서 자르지 않음
/// - 다음 청크는 이전 청크 끝의 문장들을 오버랩 크기만큼 다시 포함
/// - 최대 크기를 넘는 단일 문장은 그 자체로 하나의 청크
pub struct SentenceChunker {
    config: ChunkConfig,
    sentence_end: Regex,
    whitespace: Regex,
}

impl SentenceChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        // 문장 종결 부호 + 공백. 약어로 보이는 한 글자 단어 뒤 마침표는 제외
        let sentence_end = Regex::new(r"[.!?]+\s+").unwrap();
        let whitespace = Regex::new(r"\s+").unwrap();

        Self {
            config,
            sentence_end,
            whitespace,
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 텍스트를 문장으로 분할
    ///
    /// 종결 부호는 앞 문장에 포함됩니다.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut last = 0;

        for m in self.sentence_end.find_iter(text) {
            // 종결 부호 직전이 한 글자 단어(약어)면 분할하지 않음
            if is_abbreviation_boundary(text, m.start()) {
                continue;
            }

            let sentence = text[last..m.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            last = m.end();
        }

        // 종결 부호 없이 끝나는 꼬리 텍스트
        if last < text.len() {
            let tail = text[last..].trim();
            if !tail.is_empty() {
                sentences.push(tail.to_string());
            }
        }

        sentences
    }

    /// 오버랩 시작 위치 계산
    ///
    /// 청크 끝에서 문장 단위로 거슬러 올라가며
    /// overlap_characters 이내에 들어가는 만큼 포함시킵니다.
    fn overlap_start(&self, sentences: &[String], chunk_start: usize, chunk_end: usize) -> usize {
        if self.config.overlap_characters == 0 {
            return chunk_end;
        }

        let mut start = chunk_end;
        let mut accumulated = 0;

        // 전진 보장: 시작 문장까지는 되돌아가지 않음
        while start > chunk_start + 1 {
            let candidate = sentences[start - 1].len() + 1;
            if accumulated + candidate > self.config.overlap_characters {
                break;
            }
            accumulated += candidate;
            start -= 1;
        }

        start
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        // 공백 정규화
        let normalized = self.whitespace.replace_all(text.trim(), " ");
        if normalized.is_empty() {
            return vec![];
        }

        let sentences = self.split_sentences(&normalized);
        if sentences.is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < sentences.len() {
            let mut current = String::new();
            let mut end = start;

            // 최대 크기까지 문장 채우기
            while end < sentences.len() {
                let sentence = &sentences[end];
                let added = if current.is_empty() {
                    sentence.len()
                } else {
                    sentence.len() + 1
                };

                if !current.is_empty() && current.len() + added > self.config.max_characters {
                    break;
                }

                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(sentence);
                end += 1;
            }

            chunks.push(current);

            if end >= sentences.len() {
                break;
            }

            start = self.overlap_start(&sentences, start, end);
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 종결 부호 직전 단어가 한 글자인지 확인 (약어 처리)
fn is_abbreviation_boundary(text: &str, punct_index: usize) -> bool {
    let before = &text[..punct_index];
    match before.rsplit(char::is_whitespace).next() {
        Some(word) => word.chars().count() == 1,
        None => false,
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(SentenceChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_empty() {
        let chunker = SentenceChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = SentenceChunker::with_defaults();
        let chunks = chunker.chunk("This is a short sentence.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "This is a short sentence.");
    }

    #[test]
    fn test_chunker_respects_max_size() {
        let config = ChunkConfig {
            max_characters: 50,
            overlap_characters: 0,
        };
        let chunker = SentenceChunker::new(config);

        let text = "First sentence here. Second sentence here. Third sentence here. \
                    Fourth sentence here.";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // 단일 문장 초과 케이스가 아니면 최대 크기 이하
            assert!(chunk.len() <= 50 || !chunk.contains(". "));
        }
    }

    #[test]
    fn test_chunker_overlap() {
        let config = ChunkConfig {
            max_characters: 60,
            overlap_characters: 30,
        };
        let chunker = SentenceChunker::new(config);

        let text = "Alpha sentence one. Bravo sentence two. Charlie sentence three. \
                    Delta sentence four.";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() >= 2);
        // 두 번째 청크는 첫 번째 청크의 마지막 문장을 다시 포함해야 함
        let last_of_first = chunks[0].rsplit(". ").next().unwrap();
        assert!(chunks[1].contains(last_of_first.trim_end_matches('.')));
    }

    #[test]
    fn test_chunker_oversized_sentence() {
        let config = ChunkConfig {
            max_characters: 20,
            overlap_characters: 0,
        };
        let chunker = SentenceChunker::new(config);

        let text = "This single sentence is much longer than the configured maximum size.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].len() > 20);
    }

    #[test]
    fn test_chunker_forward_progress() {
        // 오버랩이 커도 무한 루프 없이 종료되어야 함
        let config = ChunkConfig {
            max_characters: 40,
            overlap_characters: 1000,
        };
        let chunker = SentenceChunker::new(config);

        let text = "One short line. Two short line. Three short line. Four short line. \
                    Five short line. Six short line.";
        let chunks = chunker.chunk(text);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 100);
    }

    #[test]
    fn test_chunker_normalizes_whitespace() {
        let chunker = SentenceChunker::with_defaults();
        let chunks = chunker.chunk("Hello   world.\n\nNext    sentence.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Hello world. Next sentence.");
    }

    #[test]
    fn test_abbreviation_not_split() {
        let config = ChunkConfig {
            max_characters: 30,
            overlap_characters: 0,
        };
        let chunker = SentenceChunker::new(config);

        // "B." 는 약어로 취급되어 문장 경계가 아님
        let text = "The course by John B. Smith covers retrieval.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_split_sentences_question_and_exclamation() {
        let chunker = SentenceChunker::with_defaults();
        let sentences = chunker.split_sentences("What is RAG? It is retrieval! Done.");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "What is RAG?");
        assert_eq!(sentences[1], "It is retrieval!");
    }
}
