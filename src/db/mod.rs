//! 序列数据库：所有序列编码后拼接存放在同一缓冲区中，按索引或绝对偏移访问。

use serde::{Deserialize, Serialize};

use crate::error::{PlastError, Result};
use crate::io::fasta::FastaRecord;
use crate::util::{dna, Alphabet};

/// 序列所在链方向（蛋白序列恒为 Plus）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub id: String,
    pub comment: Option<String>,
    /// 在拼接缓冲区中的起始偏移；缓冲区可超过 4 GiB
    pub offset: u64,
    pub len: u64,
    pub strand: Strand,
    /// 反向互补条目指向其正链条目的索引
    pub origin: u64,
}

/// 数据库中一条序列的只读视图
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    pub index: usize,
    pub offset_in_db: usize,
    pub id: &'a str,
    pub comment: Option<&'a str>,
    pub data: &'a [u8],
    pub strand: Strand,
    pub origin: usize,
}

impl<'a> Sequence<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Database {
    pub alphabet: Alphabet,
    residues: Vec<u8>,
    entries: Vec<SequenceEntry>,
}

impl Database {
    pub fn new(alphabet: Alphabet) -> Self {
        Self { alphabet, residues: Vec::new(), entries: Vec::new() }
    }

    /// 由 FASTA 记录构建数据库，残基在此处完成编码
    pub fn from_records(alphabet: Alphabet, records: &[FastaRecord]) -> Result<Self> {
        let mut db = Self::new(alphabet);
        for rec in records {
            db.push(&rec.id, rec.comment.clone(), &alphabet.encode_seq(&rec.seq))?;
        }
        Ok(db)
    }

    /// 追加一条已编码序列，返回其索引。
    /// 种子出现位置与比对坐标以 u32 记录，单条序列长度与序列条数都不能超过 u32 范围。
    pub fn push(&mut self, id: &str, comment: Option<String>, codes: &[u8]) -> Result<usize> {
        let index = self.entries.len();
        fits_u32("sequence count", index + 1)?;
        fits_u32(id, codes.len())?;
        self.entries.push(SequenceEntry {
            id: id.to_string(),
            comment,
            offset: self.residues.len() as u64,
            len: codes.len() as u64,
            strand: Strand::Plus,
            origin: index as u64,
        });
        self.residues.extend_from_slice(codes);
        Ok(index)
    }

    /// 为核酸数据库的每条正链序列追加反向互补条目
    pub fn with_reverse_strands(mut self) -> Result<Self> {
        if self.alphabet != Alphabet::Nucleotide {
            return Ok(self);
        }
        let forward = self.entries.len();
        fits_u32("sequence count with reverse strands", forward * 2)?;
        for i in 0..forward {
            let e = self.entries[i].clone();
            let start = e.offset as usize;
            let rc = dna::revcomp_codes(&self.residues[start..start + e.len as usize]);
            self.entries.push(SequenceEntry {
                id: e.id,
                comment: e.comment,
                offset: self.residues.len() as u64,
                len: e.len,
                strand: Strand::Minus,
                origin: i as u64,
            });
            self.residues.extend_from_slice(&rc);
        }
        Ok(self)
    }

    pub fn get_sequence_by_index(&self, idx: usize) -> Option<Sequence<'_>> {
        let e = self.entries.get(idx)?;
        let start = e.offset as usize;
        Some(Sequence {
            index: idx,
            offset_in_db: start,
            id: &e.id,
            comment: e.comment.as_deref(),
            data: &self.residues[start..start + e.len as usize],
            strand: e.strand,
            origin: e.origin as usize,
        })
    }

    /// 与 `get_sequence_by_index` 相同；视图本身即为借用，不复制残基
    pub fn get_sequence_ref_by_index(&self, idx: usize) -> Option<Sequence<'_>> {
        self.get_sequence_by_index(idx)
    }

    /// 数据库总残基数
    pub fn size(&self) -> usize {
        self.residues.len()
    }

    pub fn sequences_number(&self) -> usize {
        self.entries.len()
    }

    /// 仅正链条目的数量与总长度，用于统计量中的数据库规模
    pub fn forward_stats(&self) -> (usize, usize) {
        self.entries
            .iter()
            .filter(|e| e.strand == Strand::Plus)
            .fold((0, 0), |(n, len), e| (n + 1, len + e.len as usize))
    }

    pub fn sequences(&self) -> impl Iterator<Item = Sequence<'_>> + '_ {
        (0..self.entries.len()).filter_map(move |i| self.get_sequence_by_index(i))
    }

    /// 将绝对偏移映射为 (序列索引, 序列内偏移)
    pub fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        let pos = pos as u64;
        let mut lo = 0usize;
        let mut hi = self.entries.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let e = &self.entries[mid];
            if pos < e.offset {
                hi = mid;
            } else if pos >= e.offset + e.len {
                lo = mid + 1;
            } else {
                return Some((mid, (pos - e.offset) as usize));
            }
        }
        None
    }
}

fn fits_u32(what: &str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| PlastError::Config(format!("{}: {} exceeds the supported maximum of {}", what, value, u32::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<FastaRecord> {
        vec![
            FastaRecord { id: "s1".into(), comment: Some("first".into()), seq: b"ACGTAC".to_vec() },
            FastaRecord { id: "s2".into(), comment: None, seq: b"GGA".to_vec() },
        ]
    }

    #[test]
    fn lookup_by_index_and_offset() {
        let db = Database::from_records(Alphabet::Nucleotide, &records()).unwrap();
        assert_eq!(db.sequences_number(), 2);
        assert_eq!(db.size(), 9);
        let s2 = db.get_sequence_by_index(1).expect("s2");
        assert_eq!(s2.id, "s2");
        assert_eq!(s2.offset_in_db, 6);
        assert_eq!(s2.data, &[2, 2, 0]);
        assert_eq!(db.locate(7), Some((1, 1)));
        assert_eq!(db.locate(0), Some((0, 0)));
        assert_eq!(db.locate(9), None);
        assert!(db.get_sequence_by_index(2).is_none());
    }

    #[test]
    fn reverse_strands_are_appended() {
        let db = Database::from_records(Alphabet::Nucleotide, &records()).unwrap().with_reverse_strands().unwrap();
        assert_eq!(db.sequences_number(), 4);
        let rc = db.get_sequence_by_index(2).expect("rc of s1");
        assert_eq!(rc.strand, Strand::Minus);
        assert_eq!(rc.origin, 0);
        // ACGTAC -> GTACGT
        assert_eq!(rc.data, &[2, 3, 0, 1, 2, 3]);
        assert_eq!(db.forward_stats(), (2, 9));
    }

    #[test]
    fn protein_database_ignores_strands() {
        let recs = vec![FastaRecord { id: "p".into(), comment: None, seq: b"MKV".to_vec() }];
        let db = Database::from_records(Alphabet::Protein, &recs).unwrap().with_reverse_strands().unwrap();
        assert_eq!(db.sequences_number(), 1);
    }

    #[test]
    fn sizes_beyond_u32_are_rejected() {
        assert_eq!(fits_u32("len", u32::MAX as usize).unwrap(), u32::MAX);
        let err = fits_u32("chr1", u32::MAX as usize + 1).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("chr1"));
    }
}
