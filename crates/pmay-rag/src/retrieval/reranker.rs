//! Cross-encoder reranking of retrieved passages
//!
//! Each (query, passage) pair is scored jointly by an ONNX export of
//! `cross-encoder/ms-marco-MiniLM-L-6-v2`; the sigmoid of the logit is the
//! relevance score. The model is loaded once per process on first use and
//! persisted under `{cache_dir}/{model with '/' replaced by '_'}`.

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};
use tokio::sync::OnceCell;

use crate::config::{RerankerConfig, MAX_RERANK_TOP_K};
use crate::error::{Error, Result};

/// Scores (query, passage) pairs; higher means more relevant
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, in input order
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// ONNX Runtime cross-encoder
///
/// The session sits behind a mutex, so concurrent requests score one batch
/// at a time.
pub struct OnnxCrossEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxCrossEncoder {
    /// Load the model, downloading it first if no local copy exists
    pub async fn load(config: &RerankerConfig) -> Result<Self> {
        let model_dir = config.model_dir();
        tracing::info!("Loading cross-encoder {} from {}", config.model, model_dir.display());

        tokio::fs::create_dir_all(&model_dir)
            .await
            .map_err(|e| Error::Config(format!("Failed to create model directory: {}", e)))?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            download_file(&config.model, "onnx/model.onnx", &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download_file(&config.model, "tokenizer.json", &tokenizer_path).await?;
        }

        let max_length = config.max_length;
        let threads = config
            .intra_threads
            .unwrap_or_else(|| num_cpus::get().min(4));

        tokio::task::spawn_blocking(move || {
            Self::from_files(&model_path, &tokenizer_path, max_length, threads)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Build from model and tokenizer files on disk
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        intra_threads: usize,
    ) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| Error::rerank(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::rerank(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(intra_threads)
            .map_err(|e| Error::rerank(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| Error::rerank(format!("Failed to load model: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::rerank(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::rerank(format!("Failed to configure truncation: {}", e)))?;

        tracing::info!("Cross-encoder ready ({} intra-op threads)", intra_threads);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl RelevanceScorer for OnnxCrossEncoder {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<(&str, &str)> = passages.iter().map(|p| (query, *p)).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| Error::rerank(format!("Tokenization failed: {}", e)))?;

        let batch = encodings.len();
        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        let mut token_type_ids = vec![0i64; batch * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            for (j, ((&id, &mask), &kind)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = mask as i64;
                token_type_ids[row + j] = kind as i64;
            }
        }

        let shape = vec![batch, seq_len];
        let tensor = |data: Vec<i64>, name: &str| {
            Tensor::from_array((shape.clone(), data.into_boxed_slice()))
                .map_err(|e| Error::rerank(format!("{} tensor creation failed: {}", name, e)))
        };

        let inputs = vec![
            ("input_ids", tensor(input_ids, "input_ids")?.into_dyn()),
            ("attention_mask", tensor(attention_mask, "attention_mask")?.into_dyn()),
            ("token_type_ids", tensor(token_type_ids, "token_type_ids")?.into_dyn()),
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::rerank(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let logits = output_iter
            .iter()
            .find(|(name, _)| *name == "logits")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::rerank("No output tensor"))?;

        let (shape, data) = logits
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::rerank(format!("Failed to extract logits: {}", e)))?;

        // [batch, 1] for a single-label head; take column 0 of each row
        let stride = shape.get(1).copied().unwrap_or(1).max(1) as usize;
        let scores = (0..batch)
            .map(|i| {
                data.get(i * stride)
                    .map(|&logit| sigmoid(logit))
                    .ok_or_else(|| Error::rerank("Logits shorter than batch"))
            })
            .collect::<Result<Vec<f32>>>()?;
        Ok(scores)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Fetch one file of a Hugging Face model repository
async fn download_file(model: &str, file: &str, path: &Path) -> Result<()> {
    let url = format!("https://huggingface.co/{}/resolve/main/{}", model, file);
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::rerank(format!("Failed to download {}: {}", file, e)))?;

    if !response.status().is_success() {
        return Err(Error::rerank(format!(
            "Download of {} failed: HTTP {}",
            file,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::rerank(format!("Failed to read {}: {}", file, e)))?;

    // Write to a temp name first so an interrupted download is not mistaken for a cached model
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Indices and scores of the `k` highest scores, best first
///
/// NaN scores sort after every number. Ties keep input order.
pub fn select_top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
    });
    ranked.truncate(k);
    ranked
}

/// Reranked passages
///
/// `ids` index into the document list given to [`Reranker::rerank`];
/// `ids` and `scores` are parallel and ordered best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerankOutcome {
    /// Selected passages joined by blank lines
    pub text: String,
    /// Positions of the selected passages in the input
    pub ids: Vec<usize>,
    /// Relevance score of each selected passage
    pub scores: Vec<f32>,
}

impl RerankOutcome {
    /// Whether no passage was selected
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Process-wide reranker with a lazily loaded scorer
pub struct Reranker {
    config: RerankerConfig,
    scorer: OnceCell<Arc<dyn RelevanceScorer>>,
}

impl Reranker {
    /// Reranker that loads the ONNX cross-encoder on first use
    pub fn new(config: RerankerConfig) -> Self {
        Self {
            config,
            scorer: OnceCell::new(),
        }
    }

    /// Reranker with an already constructed scorer
    pub fn with_scorer(config: RerankerConfig, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            config,
            scorer: OnceCell::new_with(Some(scorer)),
        }
    }

    /// Whether the scorer has been loaded
    pub fn is_loaded(&self) -> bool {
        self.scorer.initialized()
    }

    /// Load the scorer now instead of on the first query
    pub async fn warm_up(&self) -> Result<()> {
        self.scorer().await.map(|_| ())
    }

    async fn scorer(&self) -> Result<Arc<dyn RelevanceScorer>> {
        self.scorer
            .get_or_try_init(|| async {
                let encoder = OnnxCrossEncoder::load(&self.config).await?;
                Ok::<_, Error>(Arc::new(encoder) as Arc<dyn RelevanceScorer>)
            })
            .await
            .cloned()
    }

    /// Pick the passages most relevant to `query`
    ///
    /// Blank documents are never selected. If scoring fails for any reason
    /// the first non-blank document is returned alone with the configured
    /// fallback score.
    pub async fn rerank(&self, documents: &[String], query: &str) -> RerankOutcome {
        let candidates: Vec<(usize, String)> = documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| !doc.trim().is_empty())
            .map(|(i, doc)| (i, doc.clone()))
            .collect();

        let Some((first_id, first_text)) = candidates.first().cloned() else {
            return RerankOutcome::default();
        };

        match self.score_candidates(&candidates, query).await {
            Ok(scores) => {
                let k = self.config.top_k.min(MAX_RERANK_TOP_K).min(candidates.len());
                let top = select_top_k(&scores, k);

                let mut outcome = RerankOutcome::default();
                let mut texts = Vec::with_capacity(top.len());
                for (local, score) in top {
                    let (id, text) = &candidates[local];
                    texts.push(text.as_str());
                    outcome.ids.push(*id);
                    outcome.scores.push(score);
                }
                outcome.text = texts.join("\n\n");

                tracing::debug!(
                    "Reranked {} passages, kept ids {:?} scores {:?}",
                    candidates.len(),
                    outcome.ids,
                    outcome.scores
                );
                outcome
            }
            Err(e) => {
                tracing::warn!("Reranking failed, using first passage: {}", e);
                RerankOutcome {
                    text: first_text,
                    ids: vec![first_id],
                    scores: vec![self.config.fallback_score],
                }
            }
        }
    }

    async fn score_candidates(&self, candidates: &[(usize, String)], query: &str) -> Result<Vec<f32>> {
        let scorer = self.scorer().await?;
        let passages: Vec<String> = candidates.iter().map(|(_, text)| text.clone()).collect();
        let query = query.to_string();

        let scores = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = passages.iter().map(String::as_str).collect();
            scorer.score(&query, &refs)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        if scores.len() != candidates.len() {
            return Err(Error::rerank(format!(
                "Scorer returned {} scores for {} passages",
                scores.len(),
                candidates.len()
            )));
        }
        Ok(scores)
    }
}
