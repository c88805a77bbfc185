//! Column label resolution: exact match, fuzzy suggestion, manual override.
//!
//! [`SpecColumnResolveSession`] is an owned value advanced by pure
//! transitions ([`SpecColumnResolveSession::apply_event`]). A UI keeps the
//! session between user decisions and feeds one event at a time.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;

use crate::conf::N_FUZZY_AUTOJUNK_MIN_LEN;
use crate::schema;
use crate::spec::{OfdError, SpecColumnMapping, SpecColumnResolveOptions};

////////////////////////////////////////////////////////////////////////////////
// #region SequenceMatcher

/// Ratcliff/Obershelp similarity `2*M / (len(a) + len(b))` over characters.
///
/// `M` is the total size of the matching blocks found by recursively taking
/// the longest common run (earliest in `a`, then earliest in `b`).
pub fn calculate_similarity_ratio(a: &str, b: &str) -> f64 {
    let v_a: Vec<char> = a.chars().collect();
    let v_b: Vec<char> = b.chars().collect();
    let n_len_total = v_a.len() + v_b.len();
    if n_len_total == 0 {
        return 1.0;
    }
    let n_matched = SpecSequenceMatcher::new(&v_a, &v_b).count_matching_chars();
    2.0 * n_matched as f64 / n_len_total as f64
}

struct SpecSequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    dict_b2j: HashMap<char, Vec<usize>>,
}

impl<'a> SpecSequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut dict_b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (n_idx, chr) in b.iter().enumerate() {
            dict_b2j.entry(*chr).or_default().push(n_idx);
        }

        let n_len_b = b.len();
        if n_len_b >= N_FUZZY_AUTOJUNK_MIN_LEN {
            let n_popular = n_len_b / 100 + 1;
            dict_b2j.retain(|_, l_idx| l_idx.len() <= n_popular);
        }

        Self { a, b, dict_b2j }
    }

    fn find_longest_match(
        &self,
        a_lo: usize,
        a_hi: usize,
        b_lo: usize,
        b_hi: usize,
    ) -> (usize, usize, usize) {
        let (mut i_best, mut j_best, mut n_best) = (a_lo, b_lo, 0usize);
        let mut dict_j2len: HashMap<usize, usize> = HashMap::new();

        for i in a_lo..a_hi {
            let mut dict_j2len_next: HashMap<usize, usize> = HashMap::new();
            if let Some(l_idx_b) = self.dict_b2j.get(&self.a[i]) {
                for &j in l_idx_b {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|j_prev| dict_j2len.get(&j_prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    dict_j2len_next.insert(j, k);
                    if k > n_best {
                        i_best = i + 1 - k;
                        j_best = j + 1 - k;
                        n_best = k;
                    }
                }
            }
            dict_j2len = dict_j2len_next;
        }

        // Popular characters were dropped from `dict_b2j`; grow through them.
        while i_best > a_lo && j_best > b_lo && self.a[i_best - 1] == self.b[j_best - 1] {
            i_best -= 1;
            j_best -= 1;
            n_best += 1;
        }
        while i_best + n_best < a_hi
            && j_best + n_best < b_hi
            && self.a[i_best + n_best] == self.b[j_best + n_best]
        {
            n_best += 1;
        }

        (i_best, j_best, n_best)
    }

    fn count_matching_chars(&self) -> usize {
        let mut n_matched = 0usize;
        let mut l_queue = vec![(0usize, self.a.len(), 0usize, self.b.len())];
        while let Some((a_lo, a_hi, b_lo, b_hi)) = l_queue.pop() {
            let (i, j, k) = self.find_longest_match(a_lo, a_hi, b_lo, b_hi);
            if k == 0 {
                continue;
            }
            n_matched += k;
            if a_lo < i && b_lo < j {
                l_queue.push((a_lo, i, b_lo, j));
            }
            if i + k < a_hi && j + k < b_hi {
                l_queue.push((i + k, a_hi, j + k, b_hi));
            }
        }
        n_matched
    }
}

/// Best candidate with ratio `>= thr_cutoff`.
///
/// Ties on ratio go to the lexicographically greater candidate.
pub fn find_closest_match<'a, I>(label: &str, candidates: I, thr_cutoff: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(f64, &'a str)> = None;
    for candidate in candidates {
        let n_ratio = calculate_similarity_ratio(candidate, label);
        if n_ratio < thr_cutoff {
            continue;
        }
        let if_better = match best {
            None => true,
            Some((n_ratio_best, c_best)) => {
                n_ratio > n_ratio_best || (n_ratio == n_ratio_best && candidate > c_best)
            }
        };
        if if_better {
            best = Some((n_ratio, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ResolveSession

/// One user decision fed into a resolve session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumColumnResolveEvent {
    /// Commit the fuzzy suggestion for `label`.
    AcceptSuggestion {
        /// Source column label.
        label: String,
    },
    /// Open manual selection for `label`.
    BeginManual {
        /// Source column label.
        label: String,
    },
    /// Commit an explicit canonical field for `label`.
    ChooseManual {
        /// Source column label.
        label: String,
        /// Canonical field name.
        field_name: String,
    },
    /// Close manual selection without a choice.
    CancelManual,
}

/// Resolution progress over labels that needed confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecColumnResolveProgress {
    /// Labels that were not exact matches and are now mapped.
    pub cnt_confirmed: usize,
    /// Labels that were not exact matches.
    pub cnt_to_confirm: usize,
}

/// Interactive column resolution state.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnResolveSession {
    labels: Vec<String>,
    column_mapping: SpecColumnMapping,
    set_labels_exact: HashSet<String>,
    set_labels_manual: HashSet<String>,
    dict_suggestions: BTreeMap<String, String>,
    label_pending: Option<String>,
    options: SpecColumnResolveOptions,
}

impl SpecColumnResolveSession {
    /// Run the exact and fuzzy passes over `labels` (file order).
    pub fn resolve_columns<S: AsRef<str>>(labels: &[S], options: SpecColumnResolveOptions) -> Self {
        let session = Self {
            labels: Vec::new(),
            column_mapping: SpecColumnMapping::new(),
            set_labels_exact: HashSet::new(),
            set_labels_manual: HashSet::new(),
            dict_suggestions: BTreeMap::new(),
            label_pending: None,
            options,
        };
        session.resolve_again(labels)
    }

    /// Re-run both passes for `labels`, keeping every resolved entry.
    ///
    /// Manual choices win over the exact pass, so a label chosen by hand keeps
    /// its target even when it also names a schema field.
    pub fn resolve_again<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        for label in labels {
            let label = label.as_ref();
            if !self.labels.iter().any(|c_label| c_label == label) {
                self.labels.push(label.to_string());
            }
        }

        let l_field_names = schema::field_names();
        for label in &self.labels {
            if self.set_labels_manual.contains(label) {
                continue;
            }
            if schema::contains(label) {
                self.column_mapping.insert(label.as_str(), label.as_str());
                self.set_labels_exact.insert(label.clone());
                self.dict_suggestions.remove(label);
                continue;
            }
            if self.dict_suggestions.contains_key(label) {
                continue;
            }
            if let Some(field_name) = find_closest_match(
                label,
                l_field_names.iter().copied(),
                self.options.thr_fuzzy_cutoff,
            ) {
                debug!("column {label:?}: fuzzy suggestion {field_name:?}");
                self.dict_suggestions
                    .insert(label.clone(), field_name.to_string());
            } else {
                debug!("column {label:?}: no suggestion");
            }
        }

        self.refresh_pending();
        self
    }

    /// Advance the session by one event.
    pub fn apply_event(mut self, event: EnumColumnResolveEvent) -> Result<Self, OfdError> {
        match event {
            EnumColumnResolveEvent::AcceptSuggestion { label } => {
                self.validate_label(&label)?;
                let field_name = self
                    .dict_suggestions
                    .get(&label)
                    .cloned()
                    .ok_or_else(|| OfdError::NoSuggestion(label.clone()))?;
                self.column_mapping.insert(label.as_str(), field_name);
                if self.label_pending.as_deref() == Some(label.as_str()) {
                    self.label_pending = None;
                }
            }
            EnumColumnResolveEvent::BeginManual { label } => {
                self.validate_label(&label)?;
                self.label_pending = Some(label);
                return Ok(self);
            }
            EnumColumnResolveEvent::ChooseManual { label, field_name } => {
                self.validate_label(&label)?;
                schema::lookup(&field_name)?;
                debug!("column {label:?}: manual choice {field_name:?}");
                self.column_mapping.insert(label.as_str(), field_name);
                self.set_labels_manual.insert(label.clone());
                if self.label_pending.as_deref() == Some(label.as_str()) {
                    self.label_pending = None;
                }
            }
            EnumColumnResolveEvent::CancelManual => {
                self.label_pending = None;
                return Ok(self);
            }
        }
        self.refresh_pending();
        Ok(self)
    }

    /// Shorthand for a [`EnumColumnResolveEvent::ChooseManual`] event.
    pub fn apply_manual_choice(self, label: &str, field_name: &str) -> Result<Self, OfdError> {
        self.apply_event(EnumColumnResolveEvent::ChooseManual {
            label: label.to_string(),
            field_name: field_name.to_string(),
        })
    }

    /// Whether the mapping has an entry for each of `n_labels_source` columns.
    pub fn is_mapping_complete(&self, n_labels_source: usize) -> bool {
        self.column_mapping.len() >= n_labels_source
            && self
                .labels
                .iter()
                .all(|label| self.column_mapping.contains_label(label))
    }

    /// Current mapping.
    pub fn column_mapping(&self) -> &SpecColumnMapping {
        &self.column_mapping
    }

    /// Finalize the session into its mapping.
    pub fn into_column_mapping(self) -> SpecColumnMapping {
        self.column_mapping
    }

    /// All labels in first-seen order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Fuzzy suggestion for an unresolved label.
    pub fn suggestion(&self, label: &str) -> Option<&str> {
        self.dict_suggestions.get(label).map(String::as_str)
    }

    /// Fuzzy suggestions keyed by label.
    pub fn suggestions(&self) -> &BTreeMap<String, String> {
        &self.dict_suggestions
    }

    /// Labels without a mapping entry, in file order.
    pub fn labels_unresolved(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|label| !self.column_mapping.contains_label(label))
            .map(String::as_str)
            .collect()
    }

    /// Label waiting for a manual choice.
    pub fn label_pending(&self) -> Option<&str> {
        self.label_pending.as_deref()
    }

    pub fn is_exact_match(&self, label: &str) -> bool {
        self.set_labels_exact.contains(label)
    }

    pub fn progress(&self) -> SpecColumnResolveProgress {
        let l_to_confirm: Vec<&String> = self
            .labels
            .iter()
            .filter(|label| !self.set_labels_exact.contains(*label))
            .collect();
        SpecColumnResolveProgress {
            cnt_confirmed: l_to_confirm
                .iter()
                .filter(|label| self.column_mapping.contains_label(label))
                .count(),
            cnt_to_confirm: l_to_confirm.len(),
        }
    }

    fn validate_label(&self, label: &str) -> Result<(), OfdError> {
        if self.labels.iter().any(|c_label| c_label == label) {
            return Ok(());
        }
        Err(OfdError::UnknownColumnLabel(label.to_string()))
    }

    fn refresh_pending(&mut self) {
        if self.label_pending.is_some() {
            return;
        }
        self.label_pending = self
            .labels
            .iter()
            .find(|label| {
                !self.column_mapping.contains_label(label)
                    && !self.dict_suggestions.contains_key(*label)
            })
            .cloned();
    }
}

/// Start a session with default options.
pub fn resolve_columns<S: AsRef<str>>(labels: &[S]) -> SpecColumnResolveSession {
    SpecColumnResolveSession::resolve_columns(labels, SpecColumnResolveOptions::default())
}

/// Commit a manual choice.
pub fn apply_manual_choice(
    session: SpecColumnResolveSession,
    label: &str,
    field_name: &str,
) -> Result<SpecColumnResolveSession, OfdError> {
    session.apply_manual_choice(label, field_name)
}

/// See [`SpecColumnResolveSession::is_mapping_complete`].
pub fn is_mapping_complete(session: &SpecColumnResolveSession, n_labels_source: usize) -> bool {
    session.is_mapping_complete(n_labels_source)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
