// SPDX-License-Identifier: MPL-2.0
//! Extraction of the text a revision inserted relative to its predecessor.
//!
//! Both texts are aligned character by character. The alignment is expressed as a list of
//! [`Opcode`]s and the delta is the new-side content of every [`ChangeTag::Insert`] and
//! [`ChangeTag::Replace`] opcode, concatenated in order.

use std::ops::Range;

use imara_diff::{
    intern::{Interner, Token},
    Algorithm,
};
use rustc_hash::FxHashMap;

/// Sequences at least this long have their most frequent elements excluded from match seeding.
const AUTOJUNK_MIN_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DiffAlgorithm {
    /// Longest-matching-block recursion (Ratcliff/Obershelp) with the auto-junk heuristic.
    #[default]
    SequenceMatcher,
    /// imara-diff histogram diff over interned characters.
    Histogram,
    /// imara-diff Myers diff over interned characters.
    Myers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub tag: ChangeTag,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

impl Opcode {
    fn new(tag: ChangeTag, old: Range<usize>, new: Range<usize>) -> Self {
        Self { tag, old, new }
    }
}

/// Returns the text `new` adds on top of `old`.
///
/// `inserted_text(o, o, _)` is always empty and `inserted_text("", n, _)` is always `n`.
pub fn inserted_text(old: &str, new: &str, algorithm: DiffAlgorithm) -> String {
    if old == new {
        return String::new();
    }
    if old.is_empty() {
        return new.to_string();
    }

    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();

    let mut result = String::new();
    for opcode in opcodes(&old, &new, algorithm) {
        if matches!(opcode.tag, ChangeTag::Insert | ChangeTag::Replace) {
            result.extend(&new[opcode.new]);
        }
    }
    result
}

/// Aligns `old` against `new`. The opcodes cover both sequences completely and in order.
pub fn opcodes(old: &[char], new: &[char], algorithm: DiffAlgorithm) -> Vec<Opcode> {
    match algorithm {
        DiffAlgorithm::SequenceMatcher => SequenceMatcher::new(old, new).opcodes(),
        DiffAlgorithm::Histogram => imara_opcodes(old, new, Algorithm::Histogram),
        DiffAlgorithm::Myers => imara_opcodes(old, new, Algorithm::Myers),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    pub old_start: usize,
    pub new_start: usize,
    pub size: usize,
}

pub struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    // positions of every element of `b`, minus the popular ones
    b2j: FxHashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    pub fn new(a: &'a [char], b: &'a [char]) -> Self {
        Self::with_autojunk(a, b, true)
    }

    pub fn with_autojunk(a: &'a [char], b: &'a [char], autojunk: bool) -> Self {
        let mut b2j: FxHashMap<char, Vec<usize>> = FxHashMap::default();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }

        if autojunk && b.len() >= AUTOJUNK_MIN_LEN {
            let ntest = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= ntest);
        }

        Self { a, b, b2j }
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` inside the given ranges.
    ///
    /// Ties are broken by the smallest `i`, then the smallest `j`. The block is seeded from
    /// non-popular elements only, then extended over any equal neighbours.
    pub fn find_longest_match(
        &self,
        old_range: Range<usize>,
        new_range: Range<usize>,
    ) -> Match {
        let (alo, ahi) = (old_range.start, old_range.end);
        let (blo, bhi) = (new_range.start, new_range.end);

        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);

        // j2len[j] = length of the longest match ending with a[i-1] and b[j]
        let mut j2len: FxHashMap<usize, usize> = FxHashMap::default();
        let mut new_j2len: FxHashMap<usize, usize> = FxHashMap::default();

        for i in alo..ahi {
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    new_j2len.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            std::mem::swap(&mut j2len, &mut new_j2len);
            new_j2len.clear();
        }

        while besti > alo && bestj > blo && self.a[besti - 1] == self.b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && self.a[besti + bestsize] == self.b[bestj + bestsize]
        {
            bestsize += 1;
        }

        Match {
            old_start: besti,
            new_start: bestj,
            size: bestsize,
        }
    }

    /// Non-adjacent matching blocks in ascending order, terminated by a zero-sized sentinel
    /// at `(a.len(), b.len())`.
    pub fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());

        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo..ahi, blo..bhi);
            if m.size == 0 {
                continue;
            }
            blocks.push(m);
            if alo < m.old_start && blo < m.new_start {
                queue.push((alo, m.old_start, blo, m.new_start));
            }
            if m.old_start + m.size < ahi && m.new_start + m.size < bhi {
                queue.push((m.old_start + m.size, ahi, m.new_start + m.size, bhi));
            }
        }
        blocks.sort_unstable();

        let mut merged: Vec<Match> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            match merged.last_mut() {
                Some(last)
                    if last.old_start + last.size == block.old_start
                        && last.new_start + last.size == block.new_start =>
                {
                    last.size += block.size;
                }
                _ => merged.push(block),
            }
        }
        merged.push(Match {
            old_start: la,
            new_start: lb,
            size: 0,
        });
        merged
    }

    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut result = Vec::new();

        for block in self.matching_blocks() {
            let tag = match (i < block.old_start, j < block.new_start) {
                (true, true) => Some(ChangeTag::Replace),
                (true, false) => Some(ChangeTag::Delete),
                (false, true) => Some(ChangeTag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                result.push(Opcode::new(tag, i..block.old_start, j..block.new_start));
            }

            i = block.old_start + block.size;
            j = block.new_start + block.size;
            if block.size > 0 {
                result.push(Opcode::new(
                    ChangeTag::Equal,
                    block.old_start..i,
                    block.new_start..j,
                ));
            }
        }

        result
    }
}

fn imara_opcodes(old: &[char], new: &[char], algorithm: Algorithm) -> Vec<Opcode> {
    let mut interner = Interner::new(old.len() + new.len());
    let before: Vec<Token> = old.iter().map(|&c| interner.intern(c)).collect();
    let after: Vec<Token> = new.iter().map(|&c| interner.intern(c)).collect();

    let mut result = Vec::new();
    let (mut last_old, mut last_new) = (0usize, 0usize);
    imara_diff::diff_with_tokens(
        algorithm,
        &before,
        &after,
        interner.num_tokens(),
        |before: Range<u32>, after: Range<u32>| {
            let before = before.start as usize..before.end as usize;
            let after = after.start as usize..after.end as usize;

            if before.start > last_old {
                result.push(Opcode::new(
                    ChangeTag::Equal,
                    last_old..before.start,
                    last_new..after.start,
                ));
            }

            let tag = match (before.is_empty(), after.is_empty()) {
                (false, false) => ChangeTag::Replace,
                (true, false) => ChangeTag::Insert,
                (false, true) => ChangeTag::Delete,
                (true, true) => return,
            };
            last_old = before.end;
            last_new = after.end;
            result.push(Opcode::new(tag, before, after));
        },
    );

    if last_old < old.len() {
        result.push(Opcode::new(
            ChangeTag::Equal,
            last_old..old.len(),
            last_new..new.len(),
        ));
    }

    result
}
