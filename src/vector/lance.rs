//! LanceDB Vector Store - 카탈로그/콘텐츠 컬렉션
//!
//! ANN (Approximate Nearest Neighbor) 검색으로 빠른 시맨틱 검색을 지원합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::{ChunkEntry, ContentHit, VectorIndex, EMBEDDING_DIMENSION, NO_LESSON};

/// 코스 카탈로그 테이블 (코스 제목 임베딩)
const CATALOG_TABLE: &str = "course_catalog";
/// 코스 콘텐츠 테이블 (청크 임베딩)
const CONTENT_TABLE: &str = "course_content";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 하나의 LanceDB 연결에 카탈로그/콘텐츠 두 테이블을 관리합니다.
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 임베딩 필드 생성
    fn embedding_field() -> Field {
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                EMBEDDING_DIMENSION,
            ),
            false,
        )
    }

    /// 카탈로그 테이블 스키마
    fn catalog_schema() -> Schema {
        Schema::new(vec![
            Field::new("course_title", DataType::Utf8, false),
            Self::embedding_field(),
        ])
    }

    /// 콘텐츠 테이블 스키마
    fn content_schema() -> Schema {
        Schema::new(vec![
            Field::new("course_title", DataType::Utf8, false),
            Field::new("lesson_number", DataType::Int32, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Self::embedding_field(),
        ])
    }

    /// 임베딩 벡터들을 FixedSizeList 배열로 변환
    fn embeddings_to_array(embeddings: &[&[f32]]) -> Result<FixedSizeListArray> {
        let flat: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let values = Float32Array::from(flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));

        FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")
    }

    /// 카탈로그 엔트리를 RecordBatch로 변환
    fn catalog_batch(course_title: &str, embedding: &[f32]) -> Result<RecordBatch> {
        let embeddings = Self::embeddings_to_array(&[embedding])?;

        RecordBatch::try_new(
            Arc::new(Self::catalog_schema()),
            vec![
                Arc::new(StringArray::from(vec![course_title])),
                Arc::new(embeddings),
            ],
        )
        .context("Failed to create catalog RecordBatch")
    }

    /// 콘텐츠 엔트리들을 RecordBatch로 변환
    fn content_batch(entries: &[ChunkEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        let titles: Vec<&str> = entries.iter().map(|e| e.course_title.as_str()).collect();
        let lesson_numbers: Vec<i32> = entries.iter().map(|e| e.lesson_number).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();
        let embedding_refs: Vec<&[f32]> =
            entries.iter().map(|e| e.embedding.as_slice()).collect();
        let embeddings = Self::embeddings_to_array(&embedding_refs)?;

        RecordBatch::try_new(
            Arc::new(Self::content_schema()),
            vec![
                Arc::new(StringArray::from(titles)),
                Arc::new(Int32Array::from(lesson_numbers)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings),
            ],
        )
        .context("Failed to create content RecordBatch")
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self, name: &str) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&name.to_string()))
            .unwrap_or(false)
    }

    /// 배치를 테이블에 추가 (테이블이 없으면 생성)
    async fn append_batch(&self, table_name: &str, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();

        if self.table_exists(table_name).await {
            let table = self
                .db
                .open_table(table_name)
                .execute()
                .await
                .context("Failed to open table")?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(table_name, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(())
    }

    /// 테이블 행 개수
    async fn count_rows(&self, table_name: &str) -> Result<usize> {
        if !self.table_exists(table_name).await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .context("Failed to open table for count")?;

        table.count_rows(None).await.context("Failed to count rows")
    }

    /// 필터로 테이블 행 삭제
    async fn delete_where(&self, table_name: &str, filter: &str) -> Result<()> {
        if !self.table_exists(table_name).await {
            return Ok(());
        }

        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .context("Failed to open table for delete")?;

        table.delete(filter).await.context("Failed to delete rows")?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for LanceVectorStore {
    async fn add_catalog_entry(&self, course_title: &str, embedding: &[f32]) -> Result<()> {
        // 같은 제목의 기존 엔트리 제거 (재수집 시 중복 방지)
        let filter = format!("course_title = '{}'", escape_literal(course_title));
        self.delete_where(CATALOG_TABLE, &filter).await?;

        let batch = Self::catalog_batch(course_title, embedding)?;
        self.append_batch(CATALOG_TABLE, batch).await
    }

    async fn add_content_batch(&self, entries: &[ChunkEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::content_batch(entries)?;
        self.append_batch(CONTENT_TABLE, batch).await?;
        Ok(entries.len())
    }

    async fn resolve_course(&self, query_embedding: &[f32]) -> Result<Option<String>> {
        if !self.table_exists(CATALOG_TABLE).await {
            return Ok(None);
        }

        let table = self
            .db
            .open_table(CATALOG_TABLE)
            .execute()
            .await
            .context("Failed to open catalog table")?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create catalog search")?
            .limit(1)
            .execute()
            .await
            .context("Failed to execute catalog search")?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        for batch in batches {
            let titles = batch
                .column_by_name("course_title")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing course_title column"))?;

            if batch.num_rows() > 0 {
                return Ok(Some(titles.value(0).to_string()));
            }
        }

        Ok(None)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        course_title: Option<&str>,
        lesson_number: Option<i32>,
    ) -> Result<Vec<ContentHit>> {
        if !self.table_exists(CONTENT_TABLE).await {
            return Ok(vec![]);
        }

        let table = self
            .db
            .open_table(CONTENT_TABLE)
            .execute()
            .await
            .context("Failed to open content table")?;

        let mut query = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create content search")?
            .limit(limit);

        // 필터를 SQL 조건으로 푸시다운
        let mut predicates = Vec::new();
        if let Some(title) = course_title {
            predicates.push(format!("course_title = '{}'", escape_literal(title)));
        }
        if let Some(lesson) = lesson_number {
            predicates.push(format!("lesson_number = {}", lesson));
        }
        if !predicates.is_empty() {
            query = query.only_if(predicates.join(" AND "));
        }

        let results = query
            .execute()
            .await
            .context("Failed to execute content search")?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut hits = Vec::new();

        for batch in batches {
            let titles = batch
                .column_by_name("course_title")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing course_title column"))?;

            let lessons = batch
                .column_by_name("lesson_number")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing lesson_number column"))?;

            let texts = batch
                .column_by_name("chunk_text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_text column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let distance = distances.value(i);
                // 거리를 유사도로 변환 (L2 거리 -> 코사인 유사도 근사)
                let score = 1.0 / (1.0 + distance);

                let lesson = lessons.value(i);
                hits.push(ContentHit {
                    course_title: titles.value(i).to_string(),
                    lesson_number: if lesson == NO_LESSON { None } else { Some(lesson) },
                    chunk_text: texts.value(i).to_string(),
                    score,
                });
            }
        }

        Ok(hits)
    }

    async fn delete_course(&self, course_title: &str) -> Result<()> {
        let filter = format!("course_title = '{}'", escape_literal(course_title));
        self.delete_where(CATALOG_TABLE, &filter).await?;
        self.delete_where(CONTENT_TABLE, &filter).await?;
        Ok(())
    }

    async fn count_content(&self) -> Result<usize> {
        self.count_rows(CONTENT_TABLE).await
    }

    async fn count_catalog(&self) -> Result<usize> {
        self.count_rows(CATALOG_TABLE).await
    }

    async fn clear(&self) -> Result<()> {
        for name in [CATALOG_TABLE, CONTENT_TABLE] {
            if self.table_exists(name).await {
                self.db
                    .drop_table(name)
                    .await
                    .context("Failed to drop table")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// SQL 문자열 리터럴 이스케이프 (작은따옴표)
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

// ============================================================================
// Tests
// ============================================================================
