//! Balanced quiz sampling.
//!
//! The pool is partitioned by correct-answer index so a generated quiz keeps
//! the correct-answer positions spread evenly, then topped up from leftovers
//! when the pool is sparse. Texts are de-duplicated with a "(variant K)" suffix,
//! choices are shuffled per question with the answer index re-derived by value,
//! and the final order is shuffled.
//!
//! The random source is a parameter: handlers pass `thread_rng()`, tests pass a
//! seeded `StdRng`.

use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};

use crate::domain::{QuestionRecord, SampledQuiz, CHOICES_PER_QUESTION};

const BUCKETS: usize = CHOICES_PER_QUESTION;

/// Suffix labels recognised when normalizing text. The first one is used when
/// a new suffix has to be appended.
const VARIANT_LABELS: [&str; 2] = ["variant", "variasi"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SamplerError {
  #[error("question pool is empty; cannot sample {requested} questions")]
  EmptyPool { requested: usize },
}

/// Per-bucket quotas: `target / 4` each, with the remainder going to the lowest
/// bucket indices. Always sums to `target`.
pub fn bucket_quotas(target: usize) -> [usize; BUCKETS] {
  let base = target / BUCKETS;
  let rem = target % BUCKETS;
  std::array::from_fn(|i| base + usize::from(i < rem))
}

/// Strip a trailing "(variant N)" (or "(variasi N)") marker and surrounding whitespace.
pub fn normalize_text(text: &str) -> String {
  let trimmed = text.trim();
  if let Some(inner_end) = trimmed.strip_suffix(')') {
    if let Some(open) = inner_end.rfind('(') {
      let inner = &inner_end[open + 1..];
      for label in VARIANT_LABELS {
        if let Some(num) = inner.strip_prefix(label) {
          let num = num.trim();
          if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
            return inner_end[..open].trim_end().to_string();
          }
        }
      }
    }
  }
  trimmed.to_string()
}

/// Select `target` questions from `pool`. See the module docs for the steps.
pub fn sample<R: Rng + ?Sized>(
  pool: &[QuestionRecord],
  target: usize,
  time_minutes: u32,
  rng: &mut R,
) -> Result<SampledQuiz, SamplerError> {
  let usable: Vec<&QuestionRecord> = pool.iter().filter(|q| !q.choices.is_empty()).collect();
  if target > 0 && usable.is_empty() {
    return Err(SamplerError::EmptyPool { requested: target });
  }

  let mut selected = select_balanced(&usable, target, rng);
  dedupe_texts(&mut selected);
  for q in selected.iter_mut() {
    shuffle_choices(q, rng);
  }
  selected.shuffle(rng);

  Ok(SampledQuiz { total_questions: target, time_minutes, questions: selected })
}

fn select_balanced<R: Rng + ?Sized>(
  usable: &[&QuestionRecord],
  target: usize,
  rng: &mut R,
) -> Vec<QuestionRecord> {
  let mut buckets: [Vec<&QuestionRecord>; BUCKETS] = Default::default();
  for q in usable {
    let idx = if q.correct_index < BUCKETS { q.correct_index } else { 0 };
    buckets[idx].push(*q);
  }

  let mut selected: Vec<QuestionRecord> = Vec::with_capacity(target);
  let mut leftovers: Vec<&QuestionRecord> = Vec::new();

  for (bucket, quota) in buckets.iter_mut().zip(bucket_quotas(target)) {
    if bucket.len() <= quota {
      selected.extend(bucket.iter().map(|q| (*q).clone()));
    } else {
      let (chosen, rest) = bucket.partial_shuffle(rng, quota);
      selected.extend(chosen.iter().map(|q| (*q).clone()));
      leftovers.extend(rest.iter().copied());
    }
  }

  // Sparse pool: first without replacement from what is left in the buckets...
  while selected.len() < target && !leftovers.is_empty() {
    let i = rng.gen_range(0..leftovers.len());
    selected.push(leftovers.swap_remove(i).clone());
  }
  // ...then with replacement from the whole pool.
  while selected.len() < target {
    match usable.choose(rng) {
      Some(q) => selected.push((*q).clone()),
      None => break,
    }
  }

  selected.truncate(target);
  selected
}

fn dedupe_texts(questions: &mut [QuestionRecord]) {
  let mut used: HashSet<String> = HashSet::with_capacity(questions.len());
  for q in questions.iter_mut() {
    let base = normalize_text(&q.text);
    let text = if used.contains(&base) {
      let mut k = 2usize;
      let mut candidate = format!("{} ({} {})", base, VARIANT_LABELS[0], k);
      while used.contains(&candidate) {
        k += 1;
        candidate = format!("{} ({} {})", base, VARIANT_LABELS[0], k);
      }
      candidate
    } else {
      base
    };
    used.insert(text.clone());
    q.text = text;
  }
}

fn shuffle_choices<R: Rng + ?Sized>(q: &mut QuestionRecord, rng: &mut R) {
  let correct = q.correct_choice().map(str::to_owned);
  q.choices.shuffle(rng);
  match correct {
    Some(value) => match q.choices.iter().position(|c| *c == value) {
      Some(pos) => q.correct_index = pos,
      None => {
        let at = rng.gen_range(0..=q.choices.len());
        q.choices.insert(at, value);
        q.correct_index = at;
      }
    },
    None => q.correct_index = 0,
  }
}
