use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::alignment::{canonical_cmp, Alignment, Range};
use super::diagonal::DiagonalIndex;
use crate::db::Database;
use crate::error::{PlastError, Result};
use crate::report::AlignmentVisitor;

/// 按查询、主体分组保存比对，并用对角线索引记录其无空位区段
#[derive(Debug, Clone, Default)]
pub struct AlignmentContainer {
    groups: BTreeMap<usize, BTreeMap<usize, Vec<Alignment>>>,
    known: DiagonalIndex,
    count: usize,
}

impl AlignmentContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 坐标完全相同的比对视为重复，返回 false
    pub fn insert(&mut self, alignment: Alignment) -> bool {
        let list = self
            .groups
            .entry(alignment.query_idx)
            .or_default()
            .entry(alignment.subject_idx)
            .or_default();
        if list
            .iter()
            .any(|a| a.query_range == alignment.query_range && a.subject_range == alignment.subject_range)
        {
            return false;
        }
        record_runs(&mut self.known, &alignment);
        list.push(alignment);
        self.count += 1;
        true
    }

    /// 偏移对是否落在某条已知比对的无空位区段内
    pub fn does_exist(&self, query: usize, subject: usize, q_off: u32, s_off: u32, band: u32) -> bool {
        self.known.does_exist(query as u32, subject as u32, q_off, s_off, band)
    }

    /// 追加其他容器的全部比对；去冗余交给随后的 `shrink`
    pub fn merge<I: IntoIterator<Item = AlignmentContainer>>(&mut self, others: I) {
        for other in others {
            for (q, subjects) in other.groups {
                let dst = self.groups.entry(q).or_default();
                for (s, list) in subjects {
                    dst.entry(s).or_default().extend(list);
                }
            }
            self.known.absorb(other.known);
            self.count += other.count;
        }
    }

    /// 去除近似重复与被包含的比对（保留 bit 分高者），再按 `order` 截取每条查询的前 N 条。
    /// 对角线索引随后按保留的比对重建。返回移除的数量。
    pub fn shrink(&mut self, max_per_query: Option<usize>, order: fn(&Alignment, &Alignment) -> Ordering) -> usize {
        let before = self.count;
        let mut count = 0;
        for subjects in self.groups.values_mut() {
            for list in subjects.values_mut() {
                list.sort_by(|a, b| b.bitscore.total_cmp(&a.bitscore).then_with(|| canonical_cmp(a, b)));
                let mut kept: Vec<Alignment> = Vec::with_capacity(list.len());
                for cand in list.drain(..) {
                    if !kept.iter().any(|k| is_redundant(k, &cand)) {
                        kept.push(cand);
                    }
                }
                *list = kept;
            }

            if let Some(limit) = max_per_query {
                let mut all: Vec<&Alignment> = subjects.values().flatten().collect();
                if all.len() > limit {
                    all.sort_by(|a, b| order(a, b));
                    let keep: Vec<(usize, Range, Range)> =
                        all[..limit].iter().map(|a| (a.subject_idx, a.query_range, a.subject_range)).collect();
                    for (s, list) in subjects.iter_mut() {
                        list.retain(|a| keep.contains(&(*s, a.query_range, a.subject_range)));
                    }
                }
            }
            subjects.retain(|_, list| !list.is_empty());
            for list in subjects.values_mut() {
                list.sort_by(order);
                count += list.len();
            }
        }
        self.groups.retain(|_, subjects| !subjects.is_empty());
        self.count = count;
        let mut known = DiagonalIndex::new();
        for al in self.groups.values().flat_map(|s| s.values().flatten()) {
            record_runs(&mut known, al);
        }
        self.known = known;
        before - count
    }

    pub fn alignments_number(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get_container(&self, query: usize, subject: usize) -> Option<&[Alignment]> {
        self.groups.get(&query)?.get(&subject).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alignment> + '_ {
        self.groups.values().flat_map(|s| s.values().flatten())
    }

    /// 全部比对按报告顺序排列
    pub fn sorted(&self) -> Vec<&Alignment> {
        let mut v: Vec<&Alignment> = self.iter().collect();
        v.sort_by(|a, b| canonical_cmp(a, b));
        v
    }

    /// 查询按编号升序，主体按其最佳 E 值升序
    pub fn accept<V: AlignmentVisitor + ?Sized>(&self, visitor: &mut V, queries: &Database, subjects: &Database) -> Result<()> {
        for (&q, by_subject) in &self.groups {
            let query = queries
                .get_sequence_ref_by_index(q)
                .ok_or(PlastError::SequenceNotFound { database: "query", index: q })?;
            visitor.visit_query_sequence(&query)?;

            let mut order: Vec<(&usize, &Vec<Alignment>)> = by_subject.iter().collect();
            order.sort_by(|a, b| best_evalue(a.1).total_cmp(&best_evalue(b.1)).then_with(|| a.0.cmp(b.0)));
            for (&s, list) in order {
                let subject = subjects
                    .get_sequence_ref_by_index(s)
                    .ok_or(PlastError::SequenceNotFound { database: "subject", index: s })?;
                visitor.visit_subject_sequence(&subject)?;
                visitor.visit_alignments_list(list)?;
                for al in list {
                    visitor.visit_alignment(al, &query, &subject)?;
                }
            }
            visitor.post_visit(&query)?;
        }
        visitor.finalize()
    }
}

/// 把比对的无空位区段登记到对角线索引
pub(crate) fn record_runs(known: &mut DiagonalIndex, al: &Alignment) {
    for run in &al.runs {
        known.insert(al.query_idx as u32, al.subject_idx as u32, run.query_start, run.subject_start, run.query_end());
    }
}

fn best_evalue(list: &[Alignment]) -> f64 {
    list.iter().map(|a| a.evalue).fold(f64::INFINITY, f64::min)
}

/// `kept` 的 bit 分不低于 `cand`：起止点都在容差内，或两侧都包含 `cand`
fn is_redundant(kept: &Alignment, cand: &Alignment) -> bool {
    let tol = kept.length.min(cand.length) / 20;
    let near = |a: u32, b: u32| a.abs_diff(b) <= tol;
    let same = near(kept.query_range.begin, cand.query_range.begin)
        && near(kept.query_range.end, cand.query_range.end)
        && near(kept.subject_range.begin, cand.subject_range.begin)
        && near(kept.subject_range.end, cand.subject_range.end);
    let contained = kept.query_range.includes(&cand.query_range) && kept.subject_range.includes(&cand.subject_range);
    same || contained
}
