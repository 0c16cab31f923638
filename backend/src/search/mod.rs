//! Tantivy-based story search.
//!
//! Only published stories are indexed. Drafts are removed from the index when they are written.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Story;

/// Field boost values.
const BOOST_TITLE: f32 = 10.0;
const BOOST_TAGS: f32 = 7.0;
const BOOST_EXCERPT: f32 = 5.5;
const BOOST_CATEGORY: f32 = 4.0;
const BOOST_CONTENT: f32 = 2.5;

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// One search hit.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub story_id: String,
    pub author_id: String,
    pub title: String,
    pub score: f32,
}

struct StoryFields {
    story_id: Field,
    author_id: Field,
    title: Field,
    excerpt: Field,
    content: Field,
    tags: Field,
    category: Field,
}

/// Full-text index over published stories.
pub struct StoryIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: StoryFields,
}

impl StoryIndex {
    fn schema() -> (Schema, StoryFields) {
        let mut builder = Schema::builder();
        let fields = StoryFields {
            story_id: builder.add_text_field("story_id", STRING | STORED),
            author_id: builder.add_text_field("author_id", STRING | STORED),
            title: builder.add_text_field("title", TEXT | STORED),
            excerpt: builder.add_text_field("excerpt", TEXT),
            content: builder.add_text_field("content", TEXT),
            tags: builder.add_text_field("tags", TEXT),
            category: builder.add_text_field("category", TEXT),
        };
        (builder.build(), fields)
    }

    /// Create or open an index in `index_path`.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let (schema, _) = Self::schema();
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;
        Self::from_index(index)
    }

    /// Index held in RAM only.
    pub fn in_memory() -> Result<Self, AppError> {
        let (schema, _) = Self::schema();
        Self::from_index(Index::create_in_ram(schema))
    }

    fn from_index(index: Index) -> Result<Self, AppError> {
        let schema = index.schema();
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|e| AppError::Search(format!("Index schema mismatch: {}", e)))
        };
        let fields = StoryFields {
            story_id: field("story_id")?,
            author_id: field("author_id")?,
            title: field("title")?,
            excerpt: field("excerpt")?,
            content: field("content")?,
            tags: field("tags")?,
            category: field("category")?,
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Replace the whole index with the published subset of `stories`.
    pub async fn rebuild(&self, stories: &[Story]) -> Result<usize, AppError> {
        let mut writer = self.writer.write().await;
        writer.delete_all_documents()?;

        let mut indexed = 0;
        for story in stories.iter().filter(|s| s.is_published()) {
            writer.add_document(self.create_document(story))?;
            indexed += 1;
        }

        writer.commit()?;
        self.reader.reload()?;

        tracing::info!(indexed, "Search index rebuilt");
        Ok(indexed)
    }

    /// Index or reindex one story. Drafts are dropped from the index.
    pub async fn index_story(&self, story: &Story) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.story_id, &story.id));
        if story.is_published() {
            writer.add_document(self.create_document(story))?;
        }
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    pub async fn remove_story(&self, story_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.story_id, story_id));
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    /// Search published stories. An empty query matches nothing.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchHit>, AppError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let boosted_fields = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.tags, BOOST_TAGS),
            (self.fields.excerpt, BOOST_EXCERPT),
            (self.fields.category, BOOST_CATEGORY),
            (self.fields.content, BOOST_CONTENT),
        ];

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();
        for (field, boost) in boosted_fields {
            let parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(query) = parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(query, boost))));
            }
        }

        let query: Box<dyn tantivy::query::Query> = if subqueries.is_empty() {
            let parser = QueryParser::for_index(
                &self.index,
                boosted_fields.iter().map(|(field, _)| *field).collect(),
            );
            parser
                .parse_query(query_str)
                .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let hits = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, address)| {
                let doc: TantivyDocument = searcher.doc(address).ok()?;
                let text = |field: Field| doc.get_first(field)?.as_str().map(str::to_string);
                Some(SearchHit {
                    story_id: text(self.fields.story_id)?,
                    author_id: text(self.fields.author_id)?,
                    title: text(self.fields.title)?,
                    score,
                })
            })
            .collect();

        Ok(hits)
    }

    fn create_document(&self, story: &Story) -> TantivyDocument {
        doc!(
            self.fields.story_id => story.id.clone(),
            self.fields.author_id => story.author_id.clone(),
            self.fields.title => story.title.clone(),
            self.fields.excerpt => story.excerpt.clone(),
            self.fields.content => story.content.clone(),
            self.fields.tags => story.tags.join(" "),
            self.fields.category => story.category.clone()
        )
    }
}
