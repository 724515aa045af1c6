use super::types::WritingSample;
use crate::error::ProfileError;
use crate::llm::client::{CompletionBackend, collect_completion};
use crate::llm::partial::strip_code_fences;
use crate::llm::types::ChatMessage;
use crate::style::metrics::split_sentences;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Raw ingested material headed for voice training.
#[derive(Debug, Clone)]
pub enum SampleSource {
    PastedText { text: String, label: String },
    UrlContent { url: String, text: String },
}

impl SampleSource {
    fn into_parts(self) -> (String, String) {
        match self {
            SampleSource::PastedText { text, label } => (text, label),
            SampleSource::UrlContent { url, text } => (text, url),
        }
    }
}

/// A sample needs enough words to carry a measurable style.
const MIN_SAMPLE_WORDS: usize = 20;
/// Chunks longer than this get split at sentence boundaries.
const MAX_SAMPLE_WORDS: usize = 400;
/// Target size when re-chunking oversized text.
const TARGET_CHUNK_WORDS: usize = 150;
/// A single unbroken blob past this size is ambiguous enough to hand to the
/// model for splitting.
const LLM_SPLIT_THRESHOLD_WORDS: usize = 120;

/// Turns heterogeneous sources (pasted text, fetched page content) into
/// discrete [`WritingSample`]s.
///
/// Text with paragraph breaks is split locally. A single unbroken blob is
/// delegated to the completion backend, which returns a JSON array of
/// self-contained excerpts; if that fails, sentence-based chunking is the
/// fallback so ingestion never depends on the network being up.
pub struct SegmentationPipeline {
    backend: Arc<dyn CompletionBackend>,
}

impl SegmentationPipeline {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn ingest(&self, source: SampleSource) -> Result<Vec<WritingSample>, ProfileError> {
        let (text, label) = source.into_parts();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ProfileError::EmptySegmentation(label));
        }

        let paragraphs = split_paragraphs(trimmed);
        let samples = if paragraphs.len() > 1 {
            merge_into_samples(&paragraphs, &label)
        } else if word_count(trimmed) > LLM_SPLIT_THRESHOLD_WORDS {
            match self.model_split(trimmed).await {
                Ok(pieces) if !pieces.is_empty() => pieces
                    .iter()
                    .map(|piece| WritingSample::new(piece.trim(), label.clone()))
                    .filter(|sample| sample.word_count >= MIN_SAMPLE_WORDS)
                    .collect(),
                Ok(_) | Err(_) => {
                    tracing::debug!("Model segmentation unusable, falling back to sentence chunks");
                    chunk_by_sentences(trimmed, &label)
                }
            }
        } else {
            merge_into_samples(&[trimmed.to_string()], &label)
        };

        if samples.is_empty() {
            return Err(ProfileError::EmptySegmentation(label));
        }
        Ok(samples)
    }

    async fn model_split(&self, text: &str) -> anyhow::Result<Vec<String>> {
        let messages = vec![
            ChatMessage::system(
                "You split raw text into self-contained writing samples for style analysis. \
                 Each sample should be a complete thought of roughly 50-200 words in the \
                 author's own words. Respond with a JSON array of strings and nothing else.",
            ),
            ChatMessage::user(text),
        ];
        let stream = self
            .backend
            .stream_chat(&messages, None, CancellationToken::new())
            .await?;
        let response = collect_completion(stream).await?;
        let pieces: Vec<String> = serde_json::from_str(strip_code_fences(&response))?;
        Ok(pieces)
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .flat_map(|block| block.split("\r\n\r\n"))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Greedily accumulates paragraphs until a sample is big enough to measure;
/// an undersized tail folds into the last sample rather than being dropped.
fn merge_into_samples(paragraphs: &[String], label: &str) -> Vec<WritingSample> {
    let mut samples: Vec<WritingSample> = Vec::new();
    let mut buffer = String::new();

    for paragraph in paragraphs {
        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(paragraph);

        if word_count(&buffer) >= MIN_SAMPLE_WORDS {
            if word_count(&buffer) > MAX_SAMPLE_WORDS {
                samples.extend(chunk_by_sentences(&buffer, label));
            } else {
                samples.push(WritingSample::new(buffer.clone(), label));
            }
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        if let Some(last) = samples.last_mut() {
            let mut text = last.text.clone();
            text.push_str("\n\n");
            text.push_str(&buffer);
            *last = WritingSample::new(text, label);
        } else if word_count(&buffer) >= MIN_SAMPLE_WORDS {
            samples.push(WritingSample::new(buffer, label));
        }
    }

    samples
}

fn chunk_by_sentences(text: &str, label: &str) -> Vec<WritingSample> {
    let sentences = split_sentences(text);
    let mut samples = Vec::new();
    let mut buffer = String::new();

    for sentence in sentences {
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&sentence);
        buffer.push('.');

        if word_count(&buffer) >= TARGET_CHUNK_WORDS {
            samples.push(WritingSample::new(buffer.clone(), label));
            buffer.clear();
        }
    }

    if word_count(&buffer) >= MIN_SAMPLE_WORDS {
        samples.push(WritingSample::new(buffer, label));
    } else if !buffer.is_empty() {
        if let Some(last) = samples.last_mut() {
            let mut text = last.text.clone();
            text.push(' ');
            text.push_str(&buffer);
            *last = WritingSample::new(text, label);
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::client::{CompletionStream, StreamEvent};
    use futures_util::stream;
    use std::future::Future;
    use std::pin::Pin;

    /// Backend that answers every call with a fixed body.
    struct StaticBackend {
        response: String,
    }

    impl CompletionBackend for StaticBackend {
        fn stream_chat<'a>(
            &'a self,
            _messages: &'a [ChatMessage],
            _model_override: Option<&'a str>,
            _cancel: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<CompletionStream, LlmError>> + Send + 'a>>
        {
            let response = self.response.clone();
            Box::pin(async move {
                let events = vec![
                    Ok(StreamEvent::ResponseStart {
                        model: "mock".into(),
                    }),
                    Ok(StreamEvent::TextDelta {
                        text: response.clone(),
                    }),
                    Ok(StreamEvent::Done {
                        full_text: response,
                    }),
                ];
                Ok(Box::pin(stream::iter(events)) as CompletionStream)
            })
        }
    }

    fn pipeline(response: &str) -> SegmentationPipeline {
        SegmentationPipeline::new(Arc::new(StaticBackend {
            response: response.into(),
        }))
    }

    fn paragraph(words: usize, seed: &str) -> String {
        let mut out = String::new();
        for i in 0..words {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(seed);
            out.push_str(&i.to_string());
        }
        out.push('.');
        out
    }

    #[tokio::test]
    async fn paragraph_breaks_split_locally() {
        let text = format!("{}\n\n{}", paragraph(40, "alpha"), paragraph(35, "beta"));
        let samples = pipeline("unused")
            .ingest(SampleSource::PastedText {
                text,
                label: "pasted".into(),
            })
            .await
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.word_count >= 20));
        assert!(samples.iter().all(|s| s.source_label == "pasted"));
    }

    #[tokio::test]
    async fn tiny_paragraphs_merge_forward() {
        let text = format!("Short opener here.\n\n{}", paragraph(40, "body"));
        let samples = pipeline("unused")
            .ingest(SampleSource::PastedText {
                text,
                label: "pasted".into(),
            })
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].text.contains("Short opener"));
    }

    #[tokio::test]
    async fn unbroken_blob_delegates_to_model() {
        let response = r#"["First self-contained excerpt with more than enough words in it to measure the author style clearly and completely as one sample.",
            "Second self-contained excerpt that also carries well over the minimum number of words required to be a useful training sample for the profile."]"#;
        let blob = paragraph(200, "word");
        let samples = pipeline(response)
            .ingest(SampleSource::UrlContent {
                url: "https://example.com/essay".into(),
                text: blob,
            })
            .await
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].source_label, "https://example.com/essay");
    }

    #[tokio::test]
    async fn model_garbage_falls_back_to_sentence_chunks() {
        let blob: String = (0..30)
            .map(|i| paragraph(8, &format!("s{i}w")))
            .collect::<Vec<_>>()
            .join(" ");
        let samples = pipeline("not json at all")
            .ingest(SampleSource::PastedText {
                text: blob,
                label: "pasted".into(),
            })
            .await
            .unwrap();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.word_count >= 20));
    }

    #[tokio::test]
    async fn empty_source_is_an_error() {
        let result = pipeline("unused")
            .ingest(SampleSource::PastedText {
                text: "   ".into(),
                label: "pasted".into(),
            })
            .await;
        assert!(matches!(result, Err(ProfileError::EmptySegmentation(_))));
    }

    #[tokio::test]
    async fn short_single_paragraph_is_one_sample() {
        let samples = pipeline("unused")
            .ingest(SampleSource::PastedText {
                text: paragraph(30, "word"),
                label: "note".into(),
            })
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
    }
}
