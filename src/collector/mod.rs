//! 파일 수집 모듈
//!
//! 코스 문서 폴더에서 지원하는 파일을 수집하고 텍스트를 추출합니다.
//! .gitignore 패턴을 존중하며, 폴더 바로 아래 파일만 수집합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 텍스트 파일 (.txt, .md)
    Text,
    /// PDF 파일 (pdf-extract로 텍스트 추출)
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" => Some(FileType::Text),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub file_type: FileType,
}

impl CollectedFile {
    /// 파일명에서 제목 폴백 생성 (확장자 제외)
    pub fn fallback_title(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string()
    }
}

// ============================================================================
// FileCollector
// ============================================================================

/// 파일 수집기
pub struct FileCollector;

impl FileCollector {
    /// 단일 파일 수집
    ///
    /// 지원하지 않는 형식이면 None을 반환합니다.
    pub fn collect_file(path: &Path) -> Result<Option<CollectedFile>> {
        if !path.is_file() {
            anyhow::bail!("Not a file: {:?}", path);
        }

        Ok(FileType::from_path(path).map(|file_type| CollectedFile {
            path: path.to_path_buf(),
            file_type,
        }))
    }

    /// 폴더 수집 (바로 아래 파일만, 파일명순 정렬)
    pub fn collect_directory(dir: &Path) -> Result<Vec<CollectedFile>> {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {:?}", dir);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(dir).max_depth(Some(1)).build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if let Some(file_type) = FileType::from_path(path) {
                files.push(CollectedFile {
                    path: path.to_path_buf(),
                    file_type,
                });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

// ============================================================================
// Text Extraction
// ============================================================================

/// 수집된 파일에서 텍스트 추출
///
/// 텍스트 파일은 UTF-8로 읽되 잘못된 바이트는 대체하고,
/// PDF는 pdf-extract로 텍스트를 추출합니다.
pub fn load_text(file: &CollectedFile) -> Result<String> {
    match file.file_type {
        FileType::Text => {
            let bytes = std::fs::read(&file.path)
                .with_context(|| format!("Failed to read file: {:?}", file.path))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        FileType::Pdf => {
            let bytes = std::fs::read(&file.path)
                .with_context(|| format!("Failed to read PDF: {:?}", file.path))?;

            let text = pdf_extract::extract_text_from_mem(&bytes)
                .with_context(|| format!("Failed to extract text from PDF: {:?}", file.path))?;

            if text.trim().is_empty() {
                tracing::warn!(
                    "No text extracted from PDF: {:?}. It might be a scanned document.",
                    file.path
                );
            }

            Ok(text)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("txt"), Some(FileType::Text));
        assert_eq!(FileType::from_extension("MD"), Some(FileType::Text));
        assert_eq!(FileType::from_extension("pdf"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("docx"), None);
        assert_eq!(FileType::from_extension("png"), None);
    }

    #[test]
    fn test_fallback_title() {
        let file = CollectedFile {
            path: PathBuf::from("/docs/intro_course.txt"),
            file_type: FileType::Text,
        };
        assert_eq!(file.fallback_title(), "intro_course");
    }

    #[test]
    fn test_collect_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("course_a.txt"), "A").unwrap();
        std::fs::write(dir.path().join("course_b.md"), "B").unwrap();
        std::fs::write(dir.path().join("notes.docx"), "skip").unwrap();

        // 하위 폴더의 파일은 수집하지 않음
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), "nested").unwrap();

        let files = FileCollector::collect_directory(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("course_a.txt"));
        assert!(files[1].path.ends_with("course_b.md"));
    }

    #[test]
    fn test_collect_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, "binary").unwrap();

        assert!(FileCollector::collect_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_collect_missing_directory() {
        assert!(FileCollector::collect_directory(Path::new("/nonexistent/dir")).is_err());
    }

    #[test]
    fn test_load_text_utf8_lossy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.txt");
        std::fs::write(&path, [b'o', b'k', 0xFF, b'!']).unwrap();

        let file = FileCollector::collect_file(&path).unwrap().unwrap();
        let text = load_text(&file).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }
}
