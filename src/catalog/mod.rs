//! Catalog Store - rusqlite 기반 코스 메타데이터 저장소
//!
//! 코스/레슨 메타데이터의 원본(authoritative) 저장소입니다.
//! 벡터 컬렉션이 검색을 담당하고, 이 저장소가 제목/링크/강사 정보를 담당합니다.
//! 저장 위치: ~/.course-rag/catalog.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::course::{Course, Lesson};

// ============================================================================
// Types
// ============================================================================

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub course_count: usize,
    pub lesson_count: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// CatalogStore
// ============================================================================

/// Catalog Store - 동기 코스 메타데이터 저장소
///
/// 코스 제목이 기본 키입니다. 같은 제목으로 다시 추가하면
/// 메타데이터와 레슨 목록이 교체됩니다.
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl CatalogStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS courses (
                title TEXT PRIMARY KEY,
                course_link TEXT,
                instructor TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create courses table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS lessons (
                course_title TEXT NOT NULL,
                number INTEGER NOT NULL,
                title TEXT NOT NULL,
                lesson_link TEXT,
                PRIMARY KEY (course_title, number)
            )",
            [],
        )
        .context("Failed to create lessons table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_lessons_course ON lessons(course_title)",
            [],
        )
        .context("Failed to create lessons index")?;

        tracing::debug!("Catalog store initialized at {:?}", self.db_path);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 코스 저장 (같은 제목이면 교체, 레슨 목록 재작성)
    pub fn add_course(&self, course: &Course) -> Result<()> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute(
            "INSERT OR REPLACE INTO courses (title, course_link, instructor, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![course.title, course.course_link, course.instructor, now],
        )
        .context("Failed to insert course")?;

        tx.execute(
            "DELETE FROM lessons WHERE course_title = ?1",
            params![course.title],
        )
        .context("Failed to clear lessons")?;

        for lesson in &course.lessons {
            tx.execute(
                "INSERT INTO lessons (course_title, number, title, lesson_link)
                 VALUES (?1, ?2, ?3, ?4)",
                params![course.title, lesson.number, lesson.title, lesson.lesson_link],
            )
            .context("Failed to insert lesson")?;
        }

        tx.commit().context("Failed to commit course")?;
        tracing::info!(
            "Added course: {} ({} lessons)",
            course.title,
            course.lessons.len()
        );

        Ok(())
    }

    /// 제목으로 코스 조회 (레슨 포함, 번호순 정렬)
    pub fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT title, course_link, instructor FROM courses WHERE title = ?1",
        )?;

        let course = stmt
            .query_row(params![title], |row| {
                Ok(Course {
                    title: row.get(0)?,
                    course_link: row.get(1)?,
                    instructor: row.get(2)?,
                    lessons: Vec::new(),
                })
            })
            .ok();

        let Some(mut course) = course else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT number, title, lesson_link FROM lessons
             WHERE course_title = ?1
             ORDER BY number ASC",
        )?;

        course.lessons = stmt
            .query_map(params![title], |row| {
                Ok(Lesson {
                    number: row.get(0)?,
                    title: row.get(1)?,
                    lesson_link: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(Some(course))
    }

    /// 코스 존재 여부
    pub fn exists(&self, title: &str) -> Result<bool> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM courses WHERE title = ?1",
            params![title],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// 저장된 코스 제목 목록 (최근 추가순)
    pub fn list_titles(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT title FROM courses ORDER BY created_at DESC")?;

        let titles = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(titles)
    }

    /// 레슨 링크 조회
    pub fn get_lesson_link(&self, course_title: &str, number: i32) -> Result<Option<String>> {
        let conn = self.lock()?;

        let link = conn
            .query_row(
                "SELECT lesson_link FROM lessons WHERE course_title = ?1 AND number = ?2",
                params![course_title, number],
                |row| row.get::<_, Option<String>>(0),
            )
            .ok()
            .flatten();

        Ok(link)
    }

    /// 코스 삭제 (레슨 포함)
    pub fn delete_course(&self, title: &str) -> Result<bool> {
        let mut conn = self.lock()?;

        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute("DELETE FROM lessons WHERE course_title = ?1", params![title])?;
        let rows = tx.execute("DELETE FROM courses WHERE title = ?1", params![title])?;
        tx.commit().context("Failed to commit delete")?;

        Ok(rows > 0)
    }

    /// 전체 비우기 (재수집용)
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM lessons", [])?;
        conn.execute("DELETE FROM courses", [])?;
        Ok(())
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.lock()?;

        let course_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
            .unwrap_or(0);

        let lesson_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM lessons", [], |row| row.get(0))
            .unwrap_or(0);

        Ok(CatalogStats {
            course_count: course_count as usize,
            lesson_count: lesson_count as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
