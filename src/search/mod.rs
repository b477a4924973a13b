//! Tantivy-based search index module.
//!
//! Provides full-text search over travel courses with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::CourseDetail;

const BOOST_TITLE: f32 = 10.0;
const BOOST_CONTENT: f32 = 6.0;
const BOOST_TRAVEL_TYPE: f32 = 4.0;
const BOOST_TAG_NAMES: f32 = 3.0;
const BOOST_DESTINATION_NAMES: f32 = 2.0;

/// Search hit with course id and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub course_id: i64,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    course_id: Field,
    title: Field,
    content: Field,
    travel_type: Field,
    tag_names: Field,
    destination_names: Field,
}

/// Tantivy search index for travel courses.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // Indexed untokenized so documents can be replaced by id
        let course_id = schema_builder.add_text_field("course_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let content = schema_builder.add_text_field("content", TEXT);
        let travel_type = schema_builder.add_text_field("travel_type", TEXT);
        let tag_names = schema_builder.add_text_field("tag_names", TEXT);
        let destination_names = schema_builder.add_text_field("destination_names", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            course_id,
            title,
            content,
            travel_type,
            tag_names,
            destination_names,
        };

        // Try to open existing index or create new one
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from course details.
    pub async fn rebuild(&self, courses: &[CourseDetail]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for course in courses {
            writer.add_document(self.create_document(course))?;
        }
        self.commit(&mut writer)?;

        tracing::info!("Search index rebuilt with {} courses", courses.len());
        Ok(())
    }

    /// Index or re-index a single course.
    pub async fn index_course(&self, course: &CourseDetail) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;
        writer.delete_term(self.id_term(course.course.id));
        writer.add_document(self.create_document(course))?;
        self.commit(&mut writer)
    }

    /// Remove a course from the index.
    pub async fn remove_course(&self, course_id: i64) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;
        writer.delete_term(self.id_term(course_id));
        self.commit(&mut writer)
    }

    /// Search for courses matching the query.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        // The collector needs a non-zero bound; no page can reach past the last document
        let num_docs = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if offset >= num_docs {
            return Ok(Vec::new());
        }
        let fetch = limit.saturating_add(offset).min(num_docs);

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.title,
                self.fields.content,
                self.fields.travel_type,
                self.fields.tag_names,
                self.fields.destination_names,
            ],
        );

        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();

        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.content, BOOST_CONTENT),
            (self.fields.travel_type, BOOST_TRAVEL_TYPE),
            (self.fields.tag_names, BOOST_TAG_NAMES),
            (self.fields.destination_names, BOOST_DESTINATION_NAMES),
        ];

        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                let boosted = BoostQuery::new(field_query, boost);
                subqueries.push((Occur::Should, Box::new(boosted)));
            }
        }

        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(fetch))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results: Vec<SearchResult> = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let course_id = doc
                    .get_first(self.fields.course_id)?
                    .as_str()?
                    .parse()
                    .ok()?;
                Some(SearchResult { course_id, score })
            })
            .collect();

        Ok(results)
    }

    /// Make committed changes visible to the next search.
    fn commit(&self, writer: &mut IndexWriter) -> Result<(), AppError> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn id_term(&self, course_id: i64) -> Term {
        Term::from_field_text(self.fields.course_id, &course_id.to_string())
    }

    fn create_document(&self, detail: &CourseDetail) -> TantivyDocument {
        let tag_names: Vec<&str> = detail.tags.iter().map(|t| t.name.as_str()).collect();
        let destination_names: Vec<&str> = detail
            .course_destinations
            .iter()
            .map(|cd| cd.destination.name.as_str())
            .collect();

        doc!(
            self.fields.course_id => detail.course.id.to_string(),
            self.fields.title => detail.course.title.clone(),
            self.fields.content => detail.course.content.clone(),
            self.fields.travel_type => detail.course.travel_type.clone(),
            self.fields.tag_names => tag_names.join(" "),
            self.fields.destination_names => destination_names.join(" ")
        )
    }
}
