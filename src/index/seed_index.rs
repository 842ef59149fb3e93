use std::io::{BufReader, BufWriter};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::seed::SeedModel;
use crate::db::Database;
use crate::error::Result;

/// A seed occurrence: sequence index plus offset inside that sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub sequence: u32,
    pub offset: u32,
}

/// 种子码 → 出现位置的压缩行存储：`starts[c]..starts[c+1]` 即编码 c 的出现列表
#[derive(Debug, Serialize, Deserialize)]
pub struct SeedIndex {
    pub model: SeedModel,
    starts: Vec<u64>,
    occurrences: Vec<Occurrence>,
}

impl SeedIndex {
    /// 各序列并行抽取种子，再并行排序
    pub fn build(db: &Database, model: SeedModel) -> Self {
        let mut entries: Vec<(u32, Occurrence)> = (0..db.sequences_number())
            .into_par_iter()
            .flat_map_iter(|i| {
                let mut local = Vec::new();
                // Database::push 保证序列条数与单条长度都在 u32 内
                if let Some(seq) = db.get_sequence_by_index(i) {
                    model.for_each_code(seq.data, |offset, code| {
                        local.push((code, Occurrence { sequence: i as u32, offset: offset as u32 }));
                    });
                }
                local
            })
            .collect();
        entries.par_sort_unstable();

        let mut starts = vec![0u64; model.code_count() + 1];
        for &(code, _) in &entries {
            starts[code as usize + 1] += 1;
        }
        for c in 0..model.code_count() {
            starts[c + 1] += starts[c];
        }
        let occurrences: Vec<Occurrence> = entries.into_iter().map(|(_, o)| o).collect();
        debug!(span = model.span, occurrences = occurrences.len(), "seed index built");
        Self { model, starts, occurrences }
    }

    #[inline]
    pub fn occurrences(&self, code: u32) -> &[Occurrence] {
        let c = code as usize;
        if c + 1 >= self.starts.len() {
            return &[];
        }
        &self.occurrences[self.starts[c] as usize..self.starts[c + 1] as usize]
    }

    /// 至少出现一次的种子码
    pub fn present_codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.starts.windows(2).enumerate().filter(|(_, w)| w[1] > w[0]).map(|(c, _)| c as u32)
    }

    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    pub source_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 数据库连同其种子索引一起持久化
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexedDatabase {
    pub meta: IndexMeta,
    pub database: Database,
    pub index: SeedIndex,
}

impl IndexedDatabase {
    pub fn build(database: Database, model: SeedModel, meta: IndexMeta) -> Self {
        let index = SeedIndex::build(&database, model);
        info!(
            sequences = database.sequences_number(),
            residues = database.size(),
            occurrences = index.occurrence_count(),
            "database indexed"
        );
        Self { meta, database, index }
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let mut f = BufWriter::new(std::fs::File::create(path)?);
        bincode::serialize_into(&mut f, self)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = BufReader::new(std::fs::File::open(path)?);
        let idx: Self = bincode::deserialize_from(f)?;
        Ok(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Alphabet;

    fn small_db() -> Database {
        let mut db = Database::new(Alphabet::Nucleotide);
        db.push("a", None, &[0, 1, 2, 3, 0, 1, 2]).unwrap();
        db.push("b", None, &[3, 0, 1, 2]).unwrap();
        db
    }

    #[test]
    fn occurrences_are_grouped_by_code() {
        let model = SeedModel::new(Alphabet::Nucleotide, 3).unwrap();
        let idx = SeedIndex::build(&small_db(), model);
        let acg = model.encode(&[0, 1, 2]).unwrap();
        assert_eq!(
            idx.occurrences(acg),
            &[
                Occurrence { sequence: 0, offset: 0 },
                Occurrence { sequence: 0, offset: 4 },
                Occurrence { sequence: 1, offset: 1 },
            ]
        );
        assert!(idx.occurrences(model.encode(&[3, 3, 3]).unwrap()).is_empty());
        assert_eq!(idx.occurrence_count(), 5 + 2);
        assert!(idx.present_codes().any(|c| c == acg));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let model = SeedModel::new(Alphabet::Nucleotide, 3).unwrap();
        let meta = IndexMeta { source_file: Some("mem".into()), ..Default::default() };
        let idx = IndexedDatabase::build(small_db(), model, meta);
        let path = std::env::temp_dir().join(format!("plast_rust_idx_{}.pidx", std::process::id()));
        let path = path.to_string_lossy().to_string();
        idx.save_to_file(&path).unwrap();
        let loaded = IndexedDatabase::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.meta.source_file.as_deref(), Some("mem"));
        assert_eq!(loaded.database.sequences_number(), 2);
        assert_eq!(loaded.index.model, model);
        assert_eq!(loaded.index.occurrence_count(), idx.index.occurrence_count());
    }
}
