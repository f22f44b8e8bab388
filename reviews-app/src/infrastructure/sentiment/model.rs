use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{Model, TokenizerBuilder, TokenizerImpl};
use tokio::sync::OnceCell;

use super::{ClassifierError, SentimentClassifier};

const DEFAULT_MODEL_ID: &str = "nlptown/bert-base-multilingual-uncased-sentiment";
const HF_BASE_URL: &str = "https://huggingface.co";
const MAX_SEQUENCE_LEN: usize = 512;

static MODEL_INSTANCE: OnceCell<Arc<BertSentimentClassifier>> = OnceCell::const_new();

type BertTokenizer =
    TokenizerImpl<WordPiece, BertNormalizer, BertPreTokenizer, BertProcessing, WordPieceDecoder>;

#[derive(Deserialize)]
struct LabelConfig {
    id2label: HashMap<String, String>,
}

/// Multilingual BERT fine-tuned to predict a 1 to 5 star product rating.
pub struct BertSentimentClassifier {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: BertTokenizer,
    labels: Vec<String>,
    device: Device,
}

impl BertSentimentClassifier {
    pub async fn get_or_init() -> Result<Arc<Self>, ClassifierError> {
        MODEL_INSTANCE
            .get_or_try_init(|| async {
                let model_id = Self::model_id();
                tracing::info!("Initializing sentiment model: {}", model_id);
                let classifier = Self::new(&model_id).await?;
                Ok(Arc::new(classifier))
            })
            .await
            .cloned()
    }

    fn model_id() -> String {
        std::env::var("REVIEWS_SENTIMENT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string())
    }

    async fn new(model_id: &str) -> Result<Self, ClassifierError> {
        let device = Device::Cpu;

        let cache_dir = Self::cache_dir(model_id)?;
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| ClassifierError::Io(e.to_string()))?;

        let config_path = Self::download_file(model_id, &cache_dir, "config.json").await?;
        let vocab_path = Self::download_file(model_id, &cache_dir, "vocab.txt").await?;
        let weights_path = Self::download_file(model_id, &cache_dir, "model.safetensors").await?;

        tracing::info!("Loading model configuration...");
        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| ClassifierError::Io(e.to_string()))?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| ClassifierError::Config(e.to_string()))?;
        let labels = Self::labels_from_config(&config_str)?;

        tracing::info!("Loading tokenizer...");
        let tokenizer = Self::build_tokenizer(&vocab_path)?;

        tracing::info!("Loading model weights...");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| ClassifierError::Model(e.to_string()))?
        };

        let bert = BertModel::load(vb.pp("bert"), &config)
            .map_err(|e| ClassifierError::Model(e.to_string()))?;
        let pooler = candle_nn::linear(
            config.hidden_size,
            config.hidden_size,
            vb.pp("bert.pooler.dense"),
        )
        .map_err(|e| ClassifierError::Model(e.to_string()))?;
        let classifier = candle_nn::linear(config.hidden_size, labels.len(), vb.pp("classifier"))
            .map_err(|e| ClassifierError::Model(e.to_string()))?;

        tracing::info!("Sentiment model ready with labels {:?}", labels);

        Ok(Self {
            bert,
            pooler,
            classifier,
            tokenizer,
            labels,
            device,
        })
    }

    fn labels_from_config(config_str: &str) -> Result<Vec<String>, ClassifierError> {
        let label_config: LabelConfig = serde_json::from_str(config_str)
            .map_err(|e| ClassifierError::Config(e.to_string()))?;

        let mut indexed = label_config
            .id2label
            .into_iter()
            .map(|(id, label)| {
                id.parse::<usize>()
                    .map(|id| (id, label))
                    .map_err(|_| ClassifierError::Config(format!("bad label id {}", id)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        indexed.sort_by_key(|(id, _)| *id);

        if indexed.is_empty() {
            return Err(ClassifierError::Config("id2label is empty".to_string()));
        }
        Ok(indexed.into_iter().map(|(_, label)| label).collect())
    }

    fn build_tokenizer(vocab_path: &Path) -> Result<BertTokenizer, ClassifierError> {
        let wordpiece = WordPiece::from_file(&vocab_path.to_string_lossy())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

        let cls_id = wordpiece
            .token_to_id("[CLS]")
            .ok_or_else(|| ClassifierError::Tokenizer("vocab has no [CLS]".to_string()))?;
        let sep_id = wordpiece
            .token_to_id("[SEP]")
            .ok_or_else(|| ClassifierError::Tokenizer("vocab has no [SEP]".to_string()))?;

        TokenizerBuilder::new()
            .with_model(wordpiece)
            .with_normalizer(Some(BertNormalizer::new(true, true, None, true)))
            .with_pre_tokenizer(Some(BertPreTokenizer))
            .with_post_processor(Some(BertProcessing::new(
                ("[SEP]".to_string(), sep_id),
                ("[CLS]".to_string(), cls_id),
            )))
            .with_decoder(Some(WordPieceDecoder::default()))
            .build()
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))
    }

    fn cache_dir(model_id: &str) -> Result<PathBuf, ClassifierError> {
        let home =
            std::env::var("HOME").map_err(|_| ClassifierError::Io("HOME not set".to_string()))?;
        let model_name = model_id.replace('/', "--");
        Ok(PathBuf::from(home)
            .join(".cache")
            .join("product-reviews")
            .join("models")
            .join(model_name))
    }

    async fn download_file(
        model_id: &str,
        cache_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, ClassifierError> {
        let file_path = cache_dir.join(filename);

        if file_path.exists() {
            tracing::info!("Using cached {}", filename);
            return Ok(file_path);
        }

        let url = format!("{}/{}/resolve/main/{}", HF_BASE_URL, model_id, filename);
        tracing::info!("Downloading {}...", filename);

        let client = reqwest::Client::new();
        let mut request = client.get(&url).header("User-Agent", "product-reviews/0.1");
        if let Ok(token) = std::env::var("HUGGINGFACE_TOKEN") {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            ClassifierError::HfHub(format!("Failed to download {}: {}", filename, e))
        })?;

        if !response.status().is_success() {
            return Err(ClassifierError::HfHub(format!(
                "Failed to download {}: HTTP {}",
                filename,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClassifierError::HfHub(format!("Failed to read {}: {}", filename, e)))?;

        tokio::fs::write(&file_path, &bytes)
            .await
            .map_err(|e| ClassifierError::Io(format!("Failed to write {}: {}", filename, e)))?;

        tracing::info!("Downloaded {} ({} bytes)", filename, bytes.len());
        Ok(file_path)
    }

    fn token_ids(&self, text: &str) -> Result<Vec<u32>, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

        let mut ids = encoding.get_ids().to_vec();
        if ids.len() > MAX_SEQUENCE_LEN {
            // Keep [CLS] and the leading tokens, then close with [SEP].
            let sep = ids[ids.len() - 1];
            ids.truncate(MAX_SEQUENCE_LEN - 1);
            ids.push(sep);
        }
        Ok(ids)
    }

    fn logits(&self, ids: &[u32]) -> Result<Vec<f32>, candle_core::Error> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self.bert.forward(&input_ids, &token_type_ids, None)?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;

        self.classifier.forward(&pooled)?.squeeze(0)?.to_vec1::<f32>()
    }
}

impl SentimentClassifier for BertSentimentClassifier {
    fn classify(&self, text: &str) -> Result<String, ClassifierError> {
        let ids = self.token_ids(text)?;
        let logits = self
            .logits(&ids)
            .map_err(|e| ClassifierError::Model(e.to_string()))?;

        let best = logits
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| index)
            .ok_or_else(|| ClassifierError::Model("model returned no logits".to_string()))?;

        self.labels
            .get(best)
            .cloned()
            .ok_or_else(|| ClassifierError::Model(format!("no label for class {}", best)))
    }
}
