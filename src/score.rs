use ndarray::Array2;
use serde_derive::Serialize;

use crate::error::Error;
use crate::text;

/// Unit cost Levenshtein distance between two token sequences.
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (m, n) = (a.len(), b.len());
    let mut dp = Array2::<usize>::zeros((m + 1, n + 1));

    for i in 0..=m {
        dp[[i, 0]] = i;
    }
    for j in 0..=n {
        dp[[0, j]] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };

            dp[[i, j]] = (dp[[i - 1, j]] + 1)
                .min(dp[[i, j - 1]] + 1)
                .min(dp[[i - 1, j - 1]] + cost);
        }
    }

    dp[[m, n]]
}

/// Edit distance over characters divided by the ground truth length.
pub fn character_error_rate(ground_truth: &str, predicted: &str) -> Result<f64, Error> {
    let gt: Vec<char> = ground_truth.chars().collect();
    let pred: Vec<char> = predicted.chars().collect();

    if gt.is_empty() {
        return Err(Error::EmptyGroundTruth);
    }

    Ok(levenshtein(&gt, &pred) as f64 / gt.len() as f64)
}

/// Edit distance over whitespace separated words divided by the ground truth word count.
pub fn word_error_rate(ground_truth: &str, predicted: &str) -> Result<f64, Error> {
    let gt: Vec<&str> = ground_truth.split_whitespace().collect();
    let pred: Vec<&str> = predicted.split_whitespace().collect();

    if gt.is_empty() {
        return Err(Error::EmptyGroundTruth);
    }

    Ok(levenshtein(&gt, &pred) as f64 / gt.len() as f64)
}

/// Best candidate for one ground truth plate.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScoringRecord {
    pub ground_truth: String,
    pub canonical_text: String,
    pub character_error_rate: f64,
    pub word_error_rate: f64,
}

impl ScoringRecord {
    pub fn new(ground_truth: &str, canonical_text: &str) -> Result<Self, Error> {
        Ok(Self {
            ground_truth: ground_truth.to_string(),
            canonical_text: canonical_text.to_string(),
            character_error_rate: character_error_rate(ground_truth, canonical_text)?,
            word_error_rate: word_error_rate(ground_truth, canonical_text)?,
        })
    }

    /// Scores every candidate and keeps the minimum CER and WER.
    /// `Ok(None)` when there is no candidate.
    pub fn best_of<S: AsRef<str>>(
        ground_truth: &str,
        candidates: &[S],
    ) -> Result<Option<Self>, Error> {
        let mut best: Option<Self> = None;

        for candidate in candidates {
            let record = Self::new(ground_truth, candidate.as_ref())?;

            best = Some(match best {
                None => record,
                Some(mut b) => {
                    if record.character_error_rate < b.character_error_rate {
                        b.character_error_rate = record.character_error_rate;
                        b.canonical_text = record.canonical_text;
                    }
                    b.word_error_rate = b.word_error_rate.min(record.word_error_rate);
                    b
                }
            });
        }

        Ok(best)
    }
}

/// Ground truth as it is compared: folded and stripped, runs left alone.
#[inline]
pub fn canonical_ground_truth(ground_truth: &str) -> String {
    text::strip(ground_truth)
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub cases: usize,
    pub average_cer: f64,
    pub average_wer: f64,
    /// Share of cases read without a word error.
    pub accuracy: f64,
    pub character_accuracy: f64,
}

/// Corpus level accumulation of scoring records.
#[derive(Debug, Default, Clone)]
pub struct Evaluation {
    records: Vec<ScoringRecord>,
}

impl Evaluation {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, record: ScoringRecord) {
        self.records.push(record);
    }

    #[inline]
    pub fn records(&self) -> &[ScoringRecord] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `None` until at least one record is in.
    pub fn summary(&self) -> Option<Summary> {
        if self.records.is_empty() {
            return None;
        }

        let n = self.records.len() as f64;
        let cer = self.records.iter().map(|r| r.character_error_rate).sum::<f64>() / n;
        let wer = self.records.iter().map(|r| r.word_error_rate).sum::<f64>() / n;
        let correct = self
            .records
            .iter()
            .filter(|r| r.word_error_rate == 0.0)
            .count();

        Some(Summary {
            cases: self.records.len(),
            average_cer: cer,
            average_wer: wer,
            accuracy: correct as f64 / n,
            character_accuracy: 1.0 - cer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn classic_distances() {
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("abc")), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [("AB1234", "AB12234"), ("", "X"), ("FLAW", "LAWN"), ("M AB 12", "MAB12")];
        for (a, b) in pairs {
            assert_eq!(
                levenshtein(&chars(a), &chars(b)),
                levenshtein(&chars(b), &chars(a))
            );
        }
    }

    #[test]
    fn identical_strings_score_zero() {
        for s in ["AB1234", "M AB 12", "x"] {
            assert_eq!(character_error_rate(s, s).unwrap(), 0.0);
            assert_eq!(word_error_rate(s, s).unwrap(), 0.0);
        }
    }

    #[test]
    fn one_insertion() {
        let cer = character_error_rate("AB1234", "AB12234").unwrap();
        assert!((cer - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn deleting_everything_is_full_error() {
        assert_eq!(character_error_rate("AB1234", "").unwrap(), 1.0);
        assert_eq!(word_error_rate("M AB 12", "").unwrap(), 1.0);
    }

    #[test]
    fn word_error_rate_counts_words() {
        let wer = word_error_rate("M AB 1234", "M AB 1284").unwrap();
        assert!((wer - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_ground_truth_is_undefined() {
        assert!(matches!(
            character_error_rate("", "AB"),
            Err(Error::EmptyGroundTruth)
        ));
        assert!(matches!(
            word_error_rate("   ", "AB"),
            Err(Error::EmptyGroundTruth)
        ));
    }

    #[test]
    fn best_candidate_wins() {
        let record = ScoringRecord::best_of("AB1234", &["XY99", "AB12234", "AB1234"])
            .unwrap()
            .unwrap();

        assert_eq!(record.canonical_text, "AB1234");
        assert_eq!(record.character_error_rate, 0.0);
        assert_eq!(record.word_error_rate, 0.0);

        let none = ScoringRecord::best_of::<&str>("AB1234", &[]).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn summary_averages_records() {
        let mut eval = Evaluation::new();
        assert!(eval.is_empty());
        assert!(eval.summary().is_none());

        eval.push(ScoringRecord::new("AB1234", "AB1234").unwrap());
        eval.push(ScoringRecord::new("AB1234", "AB12234").unwrap());

        assert_eq!(eval.len(), 2);
        let summary = eval.summary().unwrap();
        assert_eq!(summary.cases, 2);
        assert!((summary.average_cer - 1.0 / 12.0).abs() < 1e-12);
        assert_eq!(summary.average_wer, 0.5);
        assert_eq!(summary.accuracy, 0.5);
        assert!((summary.character_accuracy - 11.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn ground_truth_keeps_repeated_characters() {
        assert_eq!(canonical_ground_truth("aa-aaaaa 1"), "AAAAAAA1");
    }
}
