use std::collections::HashMap;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::Result;
use crate::language::Language;
use crate::terminology::TermTable;

pub const PLACEHOLDER_OPEN: char = '{';
pub const PLACEHOLDER_CLOSE: char = '}';

/// Remove every placeholder delimiter character.
/// Idempotent and tolerant of unbalanced or nested delimiters.
pub fn strip_placeholders(text: &str) -> String {
    text.chars()
        .filter(|c| *c != PLACEHOLDER_OPEN && *c != PLACEHOLDER_CLOSE)
        .collect()
}

/// One variant pattern in the combined alternation
struct Alternative {
    /// Index into `targets`
    target: usize,
    /// Same pattern anchored at the start, for same-position retries
    anchored: Regex,
    /// ASCII single-token variants carry the adjacent-character boundary check
    ascii_token: bool,
}

/// Per-entry data carried into matches and the detection log
struct EntryTarget {
    replacement: String,
    variants: Vec<String>,
    category: Option<String>,
    description: Option<String>,
}

/// Detection log entry for one terminology concept
#[derive(Debug, Clone, PartialEq)]
pub struct TermDetection {
    /// Canonical target-language replacement text
    pub replacement: String,
    /// Surface-form variants that could have matched, longest first
    pub variants: Vec<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub count: u32,
}

/// Result of one matching pass over a text
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Rewritten text with matches wrapped in placeholder delimiters
    pub text: String,
    /// Canonical replacement per occurrence, in text order
    pub occurrences: Vec<String>,
    /// Per-entry detections, ordered by first occurrence
    pub detections: Vec<TermDetection>,
    pub elapsed: Duration,
}

/// Scans text for terminology surface forms and rewrites them to the
/// placeholder-wrapped canonical form for one target language.
///
/// All variants of all participating entries are compiled into a single
/// case-insensitive alternation, each variant tagged by its position so the
/// matched entry is recovered from which alternative fired. Alternation
/// order is table row order; within an entry, variants are ordered longest
/// first. Overlaps between different entries therefore resolve to the
/// earlier row, which is a property of the input table, not of this scanner.
pub struct TermMatcher {
    combined: Option<Regex>,
    alternatives: Vec<Alternative>,
    targets: Vec<EntryTarget>,
}

impl TermMatcher {
    pub fn new(table: &TermTable, language: Language) -> Result<Self> {
        let mut targets = Vec::new();
        let mut alternatives = Vec::new();
        let mut pieces: Vec<String> = Vec::new();

        for entry in table.entries() {
            // An entry participates only when it can produce replacement text
            let Some(replacement) = entry.replacement(language) else {
                continue;
            };

            let variants: Vec<&str> = entry
                .variants_longest_first()
                .into_iter()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();
            if variants.is_empty() {
                continue;
            }

            let target = targets.len();
            for variant in &variants {
                let (pattern, ascii_token) = variant_pattern(variant);
                let anchored = Regex::new(&format!("(?i)^(?:{})", pattern))?;
                pieces.push(format!("({})", pattern));
                alternatives.push(Alternative {
                    target,
                    anchored,
                    ascii_token,
                });
            }
            targets.push(EntryTarget {
                replacement: replacement.to_string(),
                variants: variants.iter().map(|v| v.to_string()).collect(),
                category: entry.category.clone(),
                description: entry.description(language).map(String::from),
            });
        }

        let combined = if pieces.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i){}", pieces.join("|")))?)
        };

        Ok(Self {
            combined,
            alternatives,
            targets,
        })
    }

    /// Scan line by line, left to right, non-overlapping; every match is
    /// replaced by the placeholder-wrapped canonical form and recorded in
    /// text order.
    pub fn apply(&self, text: &str) -> MatchOutcome {
        let started = Instant::now();

        if self.combined.is_none() {
            return MatchOutcome {
                text: text.to_string(),
                occurrences: Vec::new(),
                detections: Vec::new(),
                elapsed: started.elapsed(),
            };
        }

        let mut occurrences = Vec::new();
        let mut detections: Vec<TermDetection> = Vec::new();
        let mut order: HashMap<usize, usize> = HashMap::new();

        // split('\n') keeps empty trailing pieces, so unmatched text and
        // line endings survive the rejoin byte for byte
        let lines: Vec<String> = text
            .split('\n')
            .map(|line| self.scan_line(line, &mut occurrences, &mut detections, &mut order))
            .collect();

        MatchOutcome {
            text: lines.join("\n"),
            occurrences,
            detections,
            elapsed: started.elapsed(),
        }
    }

    fn scan_line(
        &self,
        line: &str,
        occurrences: &mut Vec<String>,
        detections: &mut Vec<TermDetection>,
        order: &mut HashMap<usize, usize>,
    ) -> String {
        let Some(combined) = &self.combined else {
            return line.to_string();
        };

        let mut out = String::with_capacity(line.len());
        let mut pos = 0;
        while pos < line.len() {
            let Some(caps) = combined.captures_at(line, pos) else {
                break;
            };
            let Some(overall) = caps.get(0) else { break };
            let start = overall.start();
            let Some((first, first_end)) = self.firing_alternative(&caps) else {
                break;
            };

            match self.resolve_at(line, start, first_end, first) {
                Some((alt, end)) => {
                    let target_idx = self.alternatives[alt].target;
                    let target = &self.targets[target_idx];

                    out.push_str(&line[pos..start]);
                    out.push(PLACEHOLDER_OPEN);
                    out.push_str(&target.replacement);
                    out.push(PLACEHOLDER_CLOSE);

                    occurrences.push(target.replacement.clone());
                    let slot = *order.entry(target_idx).or_insert_with(|| {
                        detections.push(TermDetection {
                            replacement: target.replacement.clone(),
                            variants: target.variants.clone(),
                            category: target.category.clone(),
                            description: target.description.clone(),
                            count: 0,
                        });
                        detections.len() - 1
                    });
                    detections[slot].count += 1;

                    pos = end;
                }
                None => {
                    // No alternative valid here; emit one character and rescan
                    let skip = line[start..].chars().next().map_or(1, char::len_utf8);
                    out.push_str(&line[pos..start + skip]);
                    pos = start + skip;
                }
            }
        }
        out.push_str(&line[pos..]);
        out
    }

    /// Identify which alternation branch produced the match
    fn firing_alternative(&self, caps: &regex::Captures) -> Option<(usize, usize)> {
        (0..self.alternatives.len())
            .find_map(|idx| caps.get(idx + 1).map(|m| (idx, m.end())))
    }

    /// Validate the candidate's boundary; on failure, retry every alternative
    /// at the same position in alternation order before giving up, so a
    /// boundary-rejected short variant still yields to a longer one starting
    /// at the same offset.
    fn resolve_at(
        &self,
        line: &str,
        start: usize,
        first_end: usize,
        first: usize,
    ) -> Option<(usize, usize)> {
        if self.boundary_ok(line, start, first_end, first) {
            return Some((first, first_end));
        }
        for (idx, alternative) in self.alternatives.iter().enumerate() {
            if idx == first {
                continue;
            }
            if let Some(m) = alternative.anchored.find(&line[start..]) {
                let end = start + m.end();
                if self.boundary_ok(line, start, end, idx) {
                    return Some((idx, end));
                }
            }
        }
        None
    }

    /// ASCII single-token variants must not sit inside a larger ASCII word;
    /// anything else (string edges, punctuation, CJK neighbors) is a valid
    /// boundary.
    fn boundary_ok(&self, line: &str, start: usize, end: usize, alt: usize) -> bool {
        if !self.alternatives[alt].ascii_token {
            return true;
        }
        let before = line[..start].chars().next_back();
        let after = line[end..].chars().next();
        before.is_none_or(|c| !c.is_ascii_alphanumeric())
            && after.is_none_or(|c| !c.is_ascii_alphanumeric())
    }
}

/// Core pattern for one variant and whether it needs the ASCII token
/// boundary check. Multi-token and non-ASCII variants match literally, with
/// whitespace runs in the source collapsing onto a single `\s+`.
fn variant_pattern(variant: &str) -> (String, bool) {
    let single_token = !variant.chars().any(char::is_whitespace);
    if variant.is_ascii() && single_token {
        (regex::escape(variant), true)
    } else {
        let tokens: Vec<String> = variant.split_whitespace().map(regex::escape).collect();
        (tokens.join(r"\s+"), false)
    }
}
