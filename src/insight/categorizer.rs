// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Category suggestions from transaction notes.
//!
//! Notes are NFKC-normalized, lower-cased and split into word tokens, then
//! weighted by TF-IDF. A suggestion is the similarity-weighted vote of the
//! `k` most similar labelled notes (cosine similarity). Training uses only
//! the user's own categorized transactions of the same sign as the input.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::model::{Estimator, Predictor};
use super::{Insight, InsightSnapshot};
use crate::config::InsightConfig;

pub const UNCATEGORIZED: &str = "Uncategorized";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "from", "in", "my", "of", "on", "or", "the", "to",
    "with",
];

/// Word tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct LabelledNote {
    pub note: String,
    pub category_id: Uuid,
}

type SparseVector = BTreeMap<String, f64>;

/// k-nearest-neighbour classifier over TF-IDF vectors.
#[derive(Debug, Clone)]
pub struct NearestNeighborText {
    pub k: usize,
    pub min_samples: usize,
}

#[derive(Debug, Clone)]
pub struct TextIndex {
    idf: HashMap<String, f64>,
    documents: Vec<(SparseVector, Uuid)>,
}

/// Unit-length TF-IDF vector; tokens outside the vocabulary are ignored.
fn vectorize(idf: &HashMap<String, f64>, tokens: &[String]) -> SparseVector {
    let mut tf: SparseVector = BTreeMap::new();
    for token in tokens {
        if let Some(weight) = idf.get(token) {
            *tf.entry(token.clone()).or_insert(0.0) += weight;
        }
    }
    let norm = tf.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        tf.values_mut().for_each(|w| *w /= norm);
    }
    tf
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    a.iter()
        .filter_map(|(token, wa)| b.get(token).map(|wb| wa * wb))
        .sum()
}

impl Estimator for NearestNeighborText {
    type Sample = LabelledNote;
    type Fitted = TextIndex;

    fn fit(&self, samples: &[LabelledNote]) -> Insight<TextIndex> {
        if samples.len() < self.min_samples {
            return Insight::insufficient(self.min_samples, samples.len());
        }
        let tokenized: Vec<(Vec<String>, Uuid)> = samples
            .iter()
            .map(|s| (tokenize(&s.note), s.category_id))
            .collect();

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for (tokens, _) in &tokenized {
            let mut seen: Vec<&String> = tokens.iter().collect();
            seen.sort();
            seen.dedup();
            for token in seen {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
            }
        }
        let n = tokenized.len() as f64;
        let idf: HashMap<String, f64> = document_frequency
            .into_iter()
            .map(|(token, df)| (token, ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0))
            .collect();

        let documents = tokenized
            .iter()
            .map(|(tokens, category_id)| (vectorize(&idf, tokens), *category_id))
            .collect();
        Insight::Ready(TextIndex { idf, documents })
    }
}

impl Predictor for NearestNeighborText {
    type Input = str;
    /// Winning category and its share of the neighbours' similarity.
    type Output = Option<(Uuid, f64)>;

    fn predict(&self, index: &TextIndex, note: &str) -> Option<(Uuid, f64)> {
        let query = vectorize(&index.idf, &tokenize(note));
        if query.is_empty() {
            return None;
        }
        let mut neighbours: Vec<(f64, Uuid)> = index
            .documents
            .iter()
            .map(|(doc, category_id)| (cosine(&query, doc), *category_id))
            .filter(|(similarity, _)| *similarity > 0.0)
            .collect();
        neighbours.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        neighbours.truncate(self.k.max(1));

        let total: f64 = neighbours.iter().map(|(s, _)| s).sum();
        let mut votes: BTreeMap<Uuid, f64> = BTreeMap::new();
        for (similarity, category_id) in &neighbours {
            *votes.entry(*category_id).or_insert(0.0) += similarity;
        }
        votes
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(category_id, weight)| (category_id, weight / total))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// `None` means uncategorized.
    pub category_id: Option<Uuid>,
    pub category_name: String,
    /// 0 for the uncategorized fallback.
    pub confidence: f64,
}

impl Suggestion {
    pub fn uncategorized() -> Self {
        Self {
            category_id: None,
            category_name: UNCATEGORIZED.to_string(),
            confidence: 0.0,
        }
    }
}

/// Suggest a category for a new transaction with `note` and `amount`.
pub fn suggest(
    snapshot: &InsightSnapshot,
    config: &InsightConfig,
    note: &str,
    amount: Decimal,
) -> Suggestion {
    let expense = amount.is_sign_negative();
    let samples: Vec<LabelledNote> = snapshot
        .transactions()
        .iter()
        .filter(|tx| tx.is_expense() == expense)
        .filter_map(|tx| {
            tx.note.as_ref().map(|note| LabelledNote {
                note: note.clone(),
                category_id: tx.category_id,
            })
        })
        .collect();

    let model = NearestNeighborText {
        k: config.categorizer_neighbors,
        min_samples: config.categorizer_min_samples,
    };
    let Insight::Ready(index) = model.fit(&samples) else {
        return Suggestion::uncategorized();
    };
    match model.predict(&index, note) {
        Some((category_id, confidence)) => Suggestion {
            category_id: Some(category_id),
            category_name: snapshot.category_name(category_id),
            confidence,
        },
        None => Suggestion::uncategorized(),
    }
}

/// Most frequent note words (longer than three characters) of a category.
pub fn keywords(snapshot: &InsightSnapshot, category_id: Uuid, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for tx in snapshot.transactions().iter().filter(|tx| tx.category_id == category_id) {
        for token in tx.note.as_deref().map(tokenize).unwrap_or_default() {
            if token.chars().count() > 3 {
                *counts.entry(token).or_insert(0) += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}
