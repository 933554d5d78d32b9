//! Embedding providers and the segment table fused with its vectors.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Number;
use crate::error::EmbedError;
use crate::segments::{Segment, SegmentTable};

/// Maps texts to vectors, one per input slot, in order.
///
/// Absent texts still occupy a slot; whatever vector is returned for them is
/// never read downstream.
pub trait SentenceEmbedder {
    fn embed_sentences(
        &self,
        texts: &[Option<&str>],
        lang: &str,
    ) -> Result<Vec<Vec<Number>>, EmbedError>;
}

impl<F> SentenceEmbedder for F
where
    F: Fn(&[Option<&str>], &str) -> Result<Vec<Vec<Number>>, EmbedError>,
{
    fn embed_sentences(
        &self,
        texts: &[Option<&str>],
        lang: &str,
    ) -> Result<Vec<Vec<Number>>, EmbedError> {
        self(texts, lang)
    }
}

/// A segment together with the vector embedded from its text.
#[derive(Debug, Clone)]
pub struct EmbeddedSegment {
    pub segment: Segment,
    pub vector: Vec<Number>,
}

/// Segment table keyed by original row number, each row carrying its vector.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTable {
    entries: Vec<EmbeddedSegment>,
}

impl EmbeddedTable {
    /// Fuses a segment table with the provider output for it.
    pub fn from_parts(
        table: SegmentTable,
        vectors: Vec<Vec<Number>>,
        dimensions: usize,
    ) -> Result<Self, EmbedError> {
        if vectors.len() != table.len() {
            return Err(EmbedError::CountMismatch {
                expected: table.len(),
                actual: vectors.len(),
            });
        }
        let entries = table
            .segments
            .into_iter()
            .zip(vectors)
            .map(|(segment, vector)| {
                if vector.len() != dimensions {
                    return Err(EmbedError::DimensionMismatch {
                        row: segment.row,
                        expected: dimensions,
                        actual: vector.len(),
                    });
                }
                Ok(EmbeddedSegment { segment, vector })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn get(&self, row: usize) -> Option<&EmbeddedSegment> {
        self.entries.get(row).filter(|entry| entry.segment.row == row)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().map(|entry| &entry.segment)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Embeds a whole level in one blocking call and fuses the result.
pub fn embed_table<E: SentenceEmbedder + ?Sized>(
    embedder: &E,
    table: SegmentTable,
    lang: &str,
    dimensions: usize,
) -> Result<EmbeddedTable, EmbedError> {
    let start = Instant::now();
    let vectors = {
        let texts = table.texts();
        info!(segments = texts.len(), lang, "embedding segments");
        embedder.embed_sentences(&texts, lang)?
    };
    info!(elapsed = ?start.elapsed(), "embedding finished");
    EmbeddedTable::from_parts(table, vectors, dimensions)
}

#[derive(Deserialize)]
struct PrecomputedLine {
    row: usize,
    vector: Vec<Number>,
}

/// Vectors produced ahead of time by an external sentence encoder.
///
/// JSON lines, one `{"row": i, "vector": [...]}` object per table row, in row order.
pub struct PrecomputedEmbeddings {
    path: PathBuf,
}

impl PrecomputedEmbeddings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_vectors(&self) -> Result<Vec<Vec<Number>>, EmbedError> {
        let file = File::open(&self.path).map_err(|source| EmbedError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut vectors = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| EmbedError::Io {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: PrecomputedLine =
                serde_json::from_str(&line).map_err(|err| EmbedError::Decode {
                    path: self.path.clone(),
                    line: index + 1,
                    message: err.to_string(),
                })?;
            if parsed.row != vectors.len() {
                return Err(EmbedError::Decode {
                    path: self.path.clone(),
                    line: index + 1,
                    message: format!(
                        "row {} out of order, expected row {}",
                        parsed.row,
                        vectors.len()
                    ),
                });
            }
            vectors.push(parsed.vector);
        }
        Ok(vectors)
    }
}

impl SentenceEmbedder for PrecomputedEmbeddings {
    fn embed_sentences(
        &self,
        texts: &[Option<&str>],
        lang: &str,
    ) -> Result<Vec<Vec<Number>>, EmbedError> {
        debug!(path = %self.path.display(), lang, "reading precomputed embeddings");
        let vectors = self.read_vectors()?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

/// Blocking embeddings client for OpenAI-compatible endpoints.
///
/// Only present texts are sent; absent slots get a zero vector.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        dimensions: usize,
        timeout: Duration,
        max_retries: usize,
        batch_size: usize,
    ) -> Result<Self, EmbedError> {
        if model.trim().is_empty() {
            return Err(EmbedError::Request("missing embedding model name".to_string()));
        }
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::Request("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| EmbedError::Request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimensions,
            max_retries: max_retries.max(1),
            batch_size: batch_size.max(1),
        })
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<Number>>, EmbedError> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
                dimensions: Some(self.dimensions),
            };
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().map_err(|err| {
                            EmbedError::Request(format!("failed to parse embedding response: {err}"))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(EmbedError::CountMismatch {
                                expected: inputs.len(),
                                actual: parsed.data.len(),
                            });
                        }
                        return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(%status, attempt, "retrying embedding request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(EmbedError::Request(format!("({status}) {body}")));
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(error = %err, attempt, "retrying embedding request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(EmbedError::Request(err.to_string()));
                }
            }
        }
    }
}

impl SentenceEmbedder for OpenAiEmbedder {
    fn embed_sentences(
        &self,
        texts: &[Option<&str>],
        lang: &str,
    ) -> Result<Vec<Vec<Number>>, EmbedError> {
        debug!(model = %self.model, lang, "lang is not forwarded to the embeddings endpoint");
        let present: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter_map(|(slot, text)| text.map(|t| (slot, t)))
            .collect();

        let mut vectors = vec![vec![0.0; self.dimensions]; texts.len()];
        for (batch_index, batch) in present.chunks(self.batch_size).enumerate() {
            let inputs: Vec<&str> = batch.iter().map(|(_, text)| *text).collect();
            let embedded = self.embed_batch(&inputs)?;
            debug!(batch = batch_index, size = inputs.len(), "embedded batch");
            for ((slot, _), vector) in batch.iter().zip(embedded) {
                vectors[*slot] = vector;
            }
        }
        Ok(vectors)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() || err.is_decode()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<Number>,
    index: usize,
}
