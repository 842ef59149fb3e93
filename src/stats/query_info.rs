use std::sync::OnceLock;

use super::global::GlobalParameters;
use crate::db::Database;

/// Per-query statistics derived from the global parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceInfo {
    pub sequence_length: usize,
    pub length_adjust: usize,
    pub cut_offs: i32,
    pub eff_searchsp: f64,
}

/// 每条查询序列的统计量，首次访问时计算并缓存；此后读取无需加锁
pub struct QueryInformation<'a> {
    params: &'a GlobalParameters,
    queries: &'a Database,
    evalue: f64,
    infos: Vec<OnceLock<SequenceInfo>>,
}

impl<'a> QueryInformation<'a> {
    pub fn new(params: &'a GlobalParameters, queries: &'a Database, evalue: f64) -> Self {
        let infos = (0..queries.sequences_number()).map(|_| OnceLock::new()).collect();
        Self { params, queries, evalue, infos }
    }

    pub fn params(&self) -> &'a GlobalParameters {
        self.params
    }

    pub fn evalue(&self) -> f64 {
        self.evalue
    }

    /// 查询序列不存在时返回 None
    pub fn seq_info(&self, query_idx: usize) -> Option<&SequenceInfo> {
        let slot = self.infos.get(query_idx)?;
        if let Some(info) = slot.get() {
            return Some(info);
        }
        let len = self.queries.get_sequence_by_index(query_idx)?.len();
        Some(slot.get_or_init(|| self.compute(len)))
    }

    fn compute(&self, sequence_length: usize) -> SequenceInfo {
        let p = self.params;
        let length_adjust = p.length_adjustment(sequence_length);
        let eff_query = sequence_length.saturating_sub(length_adjust).max(1) as f64;
        let adjusted_db = p.db_length as f64 - (p.db_sequences * length_adjust as u64) as f64;
        let eff_db = adjusted_db.max(1.0);
        let eff_searchsp = eff_query * eff_db;
        SequenceInfo {
            sequence_length,
            length_adjust,
            cut_offs: p.evalue_to_cutoff(eff_searchsp, self.evalue),
            eff_searchsp,
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::matrix::ScoreMatrix;
    use crate::util::Alphabet;

    #[test]
    fn info_is_built_once_and_shared() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let params = GlobalParameters::build(&m, 11, 1, 10_000, 20).unwrap();
        let mut db = Database::new(Alphabet::Protein);
        db.push("q", None, &vec![0u8; 120]).unwrap();
        let qi = QueryInformation::new(&params, &db, 10.0);

        let a = qi.seq_info(0).copied().unwrap();
        let b = qi.seq_info(0).unwrap();
        assert_eq!(&a, b);
        assert!(std::ptr::eq(qi.seq_info(0).unwrap(), b));
        assert_eq!(a.sequence_length, 120);
        assert!(a.cut_offs >= 1);
        assert!(a.eff_searchsp > 0.0 && a.eff_searchsp <= 120.0 * 10_000.0);
        assert!(qi.seq_info(1).is_none());
    }

    #[test]
    fn concurrent_readers_agree() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let params = GlobalParameters::build(&m, 11, 1, 10_000, 20).unwrap();
        let mut db = Database::new(Alphabet::Protein);
        db.push("q", None, &vec![3u8; 80]).unwrap();
        let qi = QueryInformation::new(&params, &db, 1e-3);
        let cutoffs: Vec<i32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| qi.seq_info(0).unwrap().cut_offs)).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(cutoffs.windows(2).all(|w| w[0] == w[1]));
    }
}
