use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::settings::Settings;
use crate::text::chunks::{self, Boundary};
use crate::text::extract::{Extractor, PollingStationRecord};
use crate::text::normalize::{clean_source, final_cleanup, Normalizer};
use crate::text::vocab::Vocabulary;
use crate::translate::{translate_with_retry, Pacer, RetryPolicy, Translate};

const PLACEHOLDER_PREVIEW_CHARS: usize = 50;

/// Stand-in text for a chunk the translation service could not handle.
pub fn failure_placeholder(chunk: &str) -> String {
    let preview: String = chunk.chars().take(PLACEHOLDER_PREVIEW_CHARS).collect();
    format!("[Translation failed for this section: {}...]", preview)
}

/// One input document: a display name and its OCR text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkStats {
    pub total: usize,
    pub translated: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source: String,
    pub translated_text: String,
    pub records: Vec<PollingStationRecord>,
    pub chunks: ChunkStats,
    pub processed_at: DateTime<Utc>,
}

/// The pure passes: normalization and extraction. Shared by the online
/// pipeline and offline extraction of already-translated text.
#[derive(Debug, Clone)]
pub struct Passes {
    pub normalizer: Normalizer,
    pub extractor: Extractor,
}

impl Passes {
    pub fn new(vocab: &Vocabulary) -> Result<Self, regex::Error> {
        Ok(Passes {
            normalizer: Normalizer::new(vocab)?,
            extractor: Extractor::new(vocab)?,
        })
    }

    /// Normalize already-translated text and extract its records.
    pub fn report_translated(&self, doc: &SourceDocument) -> DocumentReport {
        let normalized = self.normalizer.normalize(&doc.text);
        let records = self.extractor.extract(&normalized);
        if records.is_empty() {
            warn!(source = %doc.name, "no structured data recognized");
        }
        DocumentReport {
            source: doc.name.clone(),
            translated_text: normalized,
            records,
            chunks: ChunkStats::default(),
            processed_at: Utc::now(),
        }
    }
}

pub struct Pipeline {
    translator: Arc<dyn Translate>,
    pacer: Arc<dyn Pacer>,
    retry: RetryPolicy,
    passes: Passes,
    source_lang: String,
    target_lang: String,
    max_chunk_size: usize,
}

impl Pipeline {
    pub fn new(
        settings: &Settings,
        passes: Passes,
        translator: Arc<dyn Translate>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Pipeline {
            translator,
            pacer,
            retry: RetryPolicy::from_settings(settings),
            passes,
            source_lang: settings.source_lang.clone(),
            target_lang: settings.target_lang.clone(),
            max_chunk_size: settings.max_chunk_size,
        }
    }

    /// Translate a document chunk by chunk, in order. A failed chunk becomes a
    /// placeholder and the document carries on.
    pub async fn translate_document(&self, name: &str, raw: &str) -> (String, ChunkStats) {
        let cleaned = clean_source(raw);
        let chunks = chunks::split(&cleaned, self.max_chunk_size);
        let mut stats = ChunkStats {
            total: chunks.len(),
            ..ChunkStats::default()
        };
        info!(source = name, chunks = chunks.len(), chars = cleaned.chars().count(), "translating");
        debug!(
            source = name,
            sizes = ?chunks.iter().map(|c| c.char_len()).collect::<Vec<_>>(),
            "chunk plan"
        );

        let mut pieces: Vec<(String, Boundary)> = Vec::with_capacity(chunks.len());
        let mut sent = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.text.trim().is_empty() {
                stats.skipped += 1;
                continue;
            }
            self.pacer.before_request(sent).await;
            sent += 1;

            let result = translate_with_retry(
                self.translator.as_ref(),
                self.retry,
                &chunk.text,
                &self.source_lang,
                &self.target_lang,
            )
            .await;
            let piece = match result {
                Ok(translated) => {
                    stats.translated += 1;
                    self.passes.normalizer.normalize(&translated)
                }
                Err(e) => {
                    warn!(source = name, chunk = i + 1, error = %e, "chunk translation failed");
                    stats.failed += 1;
                    failure_placeholder(&chunk.text)
                }
            };
            pieces.push((piece, chunk.boundary));
        }

        (final_cleanup(&join_translated(&pieces)), stats)
    }

    pub async fn process(&self, doc: &SourceDocument) -> DocumentReport {
        let (translated_text, chunk_stats) = self.translate_document(&doc.name, &doc.text).await;
        let records = self.passes.extractor.extract(&translated_text);
        if records.is_empty() {
            warn!(source = %doc.name, "no structured data recognized");
        } else {
            info!(source = %doc.name, records = records.len(), "extracted");
        }
        DocumentReport {
            source: doc.name.clone(),
            translated_text,
            records,
            chunks: chunk_stats,
            processed_at: Utc::now(),
        }
    }

    /// Process documents concurrently, at most `concurrency` at a time. Each
    /// document stays strictly sequential inside. Reports come back in input
    /// order.
    pub async fn process_batch(
        self: Arc<Self>,
        docs: Vec<SourceDocument>,
        concurrency: usize,
        pb: ProgressBar,
    ) -> Result<Vec<DocumentReport>> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(docs.len());

        for doc in docs {
            let pipeline = Arc::clone(&self);
            let sem = Arc::clone(&semaphore);
            let pb = pb.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                let report = pipeline.process(&doc).await;
                pb.inc(1);
                report
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            reports.push(handle.await?);
        }
        Ok(reports)
    }
}

/// Line-boundary pieces rejoin with a newline, hard slices with a space.
fn join_translated(pieces: &[(String, Boundary)]) -> String {
    let mut out = String::new();
    for (i, (text, boundary)) in pieces.iter().enumerate() {
        out.push_str(text);
        if i + 1 < pieces.len() {
            out.push_str(match boundary {
                Boundary::MidLine => " ",
                Boundary::LineEnd | Boundary::End => "\n",
            });
        }
    }
    out
}

/// Records of every document, in document order, for the combined table.
pub fn combined_records(reports: &[DocumentReport]) -> Vec<&PollingStationRecord> {
    reports.iter().flat_map(|r| r.records.iter()).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::TranslateError;
    use crate::translate::mock::MockTranslator;

    #[derive(Default)]
    struct RecordingPacer {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn before_request(&self, index: usize) {
            self.calls.lock().unwrap().push(index);
        }
    }

    fn settings(max_chunk_size: usize) -> Settings {
        Settings {
            max_chunk_size,
            pace_ms: 0,
            max_retries: 0,
            base_backoff_ms: 0,
            ..Settings::default()
        }
    }

    fn pipeline(
        max_chunk_size: usize,
        translator: Arc<MockTranslator>,
        pacer: Arc<RecordingPacer>,
    ) -> Pipeline {
        let passes = Passes::new(&Vocabulary::builtin()).unwrap();
        Pipeline::new(&settings(max_chunk_size), passes, translator, pacer)
    }

    fn doc(name: &str, text: &str) -> SourceDocument {
        SourceDocument {
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn placeholder_keeps_fifty_chars() {
        let chunk = "ਸ".repeat(80);
        let placeholder = failure_placeholder(&chunk);
        assert_eq!(
            placeholder,
            format!("[Translation failed for this section: {}...]", "ਸ".repeat(50))
        );
        assert_eq!(failure_placeholder("ab"), "[Translation failed for this section: ab...]");
    }

    #[test]
    fn hard_slices_rejoin_with_space() {
        let pieces = vec![
            ("Village Majra".to_string(), Boundary::MidLine),
            ("Ward 1".to_string(), Boundary::LineEnd),
            ("Ward 2".to_string(), Boundary::End),
        ];
        assert_eq!(join_translated(&pieces), "Village Majra Ward 1\nWard 2");
    }

    #[tokio::test]
    async fn chunks_go_out_in_order_with_pacing() {
        let translator = Arc::new(MockTranslator::new());
        let pacer = Arc::new(RecordingPacer::default());
        let p = pipeline(12, translator.clone(), pacer.clone());

        let (_, stats) = p.translate_document("doc", "aaaa bbbb\ncccc dddd\neeee").await;

        assert_eq!(translator.requests(), vec!["aaaa bbbb", "cccc dddd", "eeee"]);
        assert_eq!(*pacer.calls.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(stats, ChunkStats { total: 3, translated: 3, failed: 0, skipped: 0 });
    }

    #[tokio::test]
    async fn failed_chunk_becomes_placeholder() {
        let translator = Arc::new(
            MockTranslator::new()
                .then_ok("1 govt primary school majra")
                .then_err(TranslateError::Status {
                    status: 403,
                    body: "quota".to_string(),
                })
                .then_ok("2: village majra ward 2"),
        );
        let pacer = Arc::new(RecordingPacer::default());
        let p = pipeline(30, translator, pacer);
        let raw = "੧ ਸਰਕਾਰੀ ਪ੍ਰਾਇਮਰੀ ਸਕੂਲ ਮਾਜਰਾ\n੧: ਪਿੰਡ ਮਾਜਰਾ ਵਾਰਡ ੧\n੨: ਪਿੰਡ ਮਾਜਰਾ ਵਾਰਡ ੨";

        let report = p.process(&doc("majra.pdf", raw)).await;

        assert_eq!(report.chunks.failed, 1);
        assert_eq!(report.chunks.translated, 2);
        let lines: Vec<&str> = report.translated_text.lines().collect();
        assert_eq!(lines[0], "1 Government Primary School majra");
        assert!(lines[1].starts_with("[Translation failed for this section: ੧: ਪਿੰਡ"));
        assert_eq!(lines[2], "2: village majra ward 2");

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].number, "1");
        assert_eq!(report.records[0].address, "Government Primary School majra");
        assert_eq!(report.records[0].sections.len(), 2);
    }

    #[tokio::test]
    async fn empty_document_has_no_chunks_or_records() {
        let translator = Arc::new(MockTranslator::new());
        let pacer = Arc::new(RecordingPacer::default());
        let p = pipeline(4500, translator.clone(), pacer);

        let report = p.process(&doc("blank.pdf", "  \n\n  ")).await;

        assert!(translator.requests().is_empty());
        assert_eq!(report.chunks.total, 0);
        assert!(report.translated_text.is_empty());
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let translator = Arc::new(MockTranslator::new());
        let pacer = Arc::new(RecordingPacer::default());
        let p = Arc::new(pipeline(4500, translator, pacer));
        let docs = vec![
            doc("a", "1 govt school alpha\n1: ward a"),
            doc("b", "no listing here"),
            doc("c", "3 govt school gamma\n1: ward c"),
        ];

        let reports = p.process_batch(docs, 2, ProgressBar::hidden()).await.unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // the mock echoes in uppercase
        let numbers: Vec<&str> = combined_records(&reports).iter().map(|r| r.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "3"]);
        assert!(reports[1].records.is_empty());
    }

    #[test]
    fn offline_fixture_matches_online_passes() {
        let text = std::fs::read_to_string("tests/fixtures/ac_majra.txt").unwrap();
        let passes = Passes::new(&Vocabulary::builtin()).unwrap();
        let report = passes.report_translated(&doc("ac_majra.txt", &text));
        assert_eq!(report.records.len(), 4);
        assert_eq!(report.records[3].address, "Community Hall Nangal");
    }

    #[tokio::test]
    async fn fixed_delay_skips_first_request() {
        use crate::translate::FixedDelay;
        let pacer = FixedDelay::new(Duration::from_millis(20));
        let started = std::time::Instant::now();
        pacer.before_request(0).await;
        assert!(started.elapsed() < Duration::from_millis(20));
        pacer.before_request(1).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
