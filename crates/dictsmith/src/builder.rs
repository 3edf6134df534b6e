use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use bidict_corpus::{CorpusError, LanguageClassifier, detect_format};
use bidict_index::TranslationDict;
use bidict_types::LanguagePair;

/// One fetched, decompressed corpus labeled by where it came from, so skip
/// and error reports can name the offender.
#[derive(Clone, Debug)]
pub struct SourceCorpus {
    pub origin: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    /// Fatal ingest failure; identifies the pair and corpus responsible.
    #[error("corpus {origin} for {pair}: {source}")]
    Corpus {
        pair: LanguagePair,
        origin: String,
        #[source]
        source: CorpusError,
    },
    /// The batch deadline elapsed before every pair finished.
    #[error("dictionary batch exceeded its {0:?} deadline")]
    Timeout(Duration),
    /// The build observed the batch cancellation flag and stopped early.
    #[error("build for {0} was cancelled")]
    Cancelled(LanguagePair),
    /// A worker stopped without reporting a result.
    #[error("a build worker stopped without reporting a result")]
    WorkerLost,
}

/// Build one pair's dictionary by aggregating its corpora in caller order.
///
/// Per corpus: detect the column format, then merge. Empty corpora and any
/// detection failure (ambiguous layout, nothing classified, malformed sample)
/// disqualify that corpus alone — logged and skipped, the build moves on.
/// An ingest failure is fatal for the pair: the index must never hold part
/// of a corpus.
///
/// The cancellation flag is polled between corpora; once raised, the build
/// returns [`BuildError::Cancelled`] instead of burning through the rest of
/// its sources.
pub fn build_dict<C>(
    pair: LanguagePair,
    corpora: &[SourceCorpus],
    classifier: &C,
    cancel: &AtomicBool,
) -> Result<TranslationDict, BuildError>
where
    C: LanguageClassifier + ?Sized,
{
    let languages = pair.languages();
    let mut dict = TranslationDict::new(pair);
    let mut merged = 0usize;

    for corpus in corpora {
        if cancel.load(Ordering::Relaxed) {
            return Err(BuildError::Cancelled(pair));
        }
        if corpus.bytes.is_empty() {
            warn!("{pair}: skipping empty corpus {}", corpus.origin);
            continue;
        }
        let format = match detect_format(&corpus.bytes, &languages, classifier) {
            Ok(format) => format,
            Err(reason) => {
                warn!("{pair}: skipping corpus {}: {reason}", corpus.origin);
                continue;
            }
        };
        dict.ingest(&corpus.bytes, &format)
            .map_err(|source| BuildError::Corpus {
                pair,
                origin: corpus.origin.clone(),
                source,
            })?;
        merged += 1;
    }

    info!(
        "{pair}: merged {merged} of {} corpora into {} words",
        corpora.len(),
        dict.len()
    );
    Ok(dict)
}

/// Build every pair's dictionary concurrently under one global deadline.
///
/// Each pair gets its own blocking worker owning a private
/// [`TranslationDict`]; results come back over a channel and only this
/// coordinating task touches the collection. The first of all-complete /
/// any-error / deadline decides the outcome: on success the dictionaries are
/// returned sorted by pair identifier, otherwise the first error (or
/// [`BuildError::Timeout`]) is returned and no partial batch ever escapes.
/// Late workers are not forcibly killed; they observe the cancellation flag
/// between corpora and bail out.
pub async fn build_all<C>(
    jobs: Vec<(LanguagePair, Vec<SourceCorpus>)>,
    classifier: Arc<C>,
    deadline: Duration,
) -> Result<Vec<TranslationDict>, BuildError>
where
    C: LanguageClassifier + Send + Sync + ?Sized + 'static,
{
    let expected = jobs.len();
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel(expected.max(1));

    for (pair, corpora) in jobs {
        let tx = tx.clone();
        let classifier = Arc::clone(&classifier);
        let cancel = Arc::clone(&cancel);
        tokio::task::spawn_blocking(move || {
            let result = build_dict(pair, &corpora, classifier.as_ref(), &cancel);
            // The receiver is gone once the batch already failed; fine.
            let _ = tx.blocking_send(result);
        });
    }
    drop(tx);

    let collect = async {
        let mut dictionaries = Vec::with_capacity(expected);
        for _ in 0..expected {
            match rx.recv().await {
                Some(Ok(dict)) => dictionaries.push(dict),
                Some(Err(err)) => return Err(err),
                None => return Err(BuildError::WorkerLost),
            }
        }
        dictionaries.sort_by_key(TranslationDict::pair);
        Ok(dictionaries)
    };

    match tokio::time::timeout(deadline, collect).await {
        Ok(Ok(dictionaries)) => Ok(dictionaries),
        Ok(Err(err)) => {
            cancel.store(true, Ordering::Relaxed);
            Err(err)
        }
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            Err(BuildError::Timeout(deadline))
        }
    }
}
