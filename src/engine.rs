//! 一次完整的搜索：参数推导、索引、流水线拆分与并行分发、结果合并。

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::align::{canonical_cmp, AlignmentContainer, ScoreMatrix};
use crate::config::{SearchOptions, StrandOption};
use crate::db::Database;
use crate::dispatch::{Command, CommandDispatcher};
use crate::error::{PlastError, Result};
use crate::index::{IndexedDatabase, SeedIndex, SeedModel};
use crate::pipeline::{CancellationToken, HitSource, PipelineDescriptor, SearchContext, SeedHitSource, StageStats};
use crate::report::Properties;
use crate::stats::{GlobalParameters, QueryInformation};
use crate::util::Alphabet;

/// 主体库：原始序列（搜索时建索引）或已持久化的带索引数据库
#[derive(Clone, Copy)]
pub enum SubjectInput<'s> {
    Plain(&'s Database),
    Indexed(&'s IndexedDatabase),
}

impl<'s> SubjectInput<'s> {
    pub fn database(&self) -> &'s Database {
        match *self {
            SubjectInput::Plain(db) => db,
            SubjectInput::Indexed(idx) => &idx.database,
        }
    }
}

pub struct SearchOutcome {
    /// 实际参与搜索的查询库（核酸双链搜索时包含反向互补条目）
    pub query: Database,
    pub alignments: AlignmentContainer,
    pub params: GlobalParameters,
    pub properties: Properties,
    pub cancelled: bool,
}

type WorkerResult = (AlignmentContainer, Vec<(&'static str, StageStats)>);

/// 在一个工作线程上跑完一条流水线，并把结果交回
struct HspCommand<'a> {
    pipeline: Box<dyn HitSource + 'a>,
    cancel: &'a CancellationToken,
    results: &'a Mutex<Vec<WorkerResult>>,
}

impl<'a> Command for HspCommand<'a> {
    fn execute(&mut self) {
        self.pipeline.for_each(self.cancel, &mut |_| {});
        let container = self.pipeline.take_alignments().unwrap_or_default();
        let mut stats = Vec::new();
        self.pipeline.collect_stats(&mut stats);
        debug!(alignments = container.alignments_number(), "hsp command finished");
        self.results.lock().push((container, stats));
    }
}

pub fn build_matrix(options: &SearchOptions) -> Result<ScoreMatrix> {
    match options.alphabet() {
        Alphabet::Protein => ScoreMatrix::protein(&options.matrix),
        Alphabet::Nucleotide => Ok(ScoreMatrix::nucleotide(options.reward, options.penalty)),
    }
}

fn accumulate(totals: &mut Vec<(&'static str, StageStats)>, stats: Vec<(&'static str, StageStats)>) {
    for (i, (name, st)) in stats.into_iter().enumerate() {
        match totals.get_mut(i) {
            Some(slot) => slot.1.add(&st),
            None => totals.push((name, st)),
        }
    }
}

fn parameter_properties(params: &GlobalParameters) -> Properties {
    Properties::new("parameters", "")
        .with("matrix", &params.matrix)
        .with("gap_open", params.open)
        .with("gap_extend", params.extend)
        .with("lambda", format!("{:.4}", params.lambda))
        .with("k", format!("{:.4}", params.k))
        .with("h", format!("{:.4}", params.h))
        .with("db_length", params.db_length)
        .with("db_sequences", params.db_sequences)
}

/// 对 `query` 中的每条序列在主体库中搜索局部相似区段
pub fn search(
    options: &SearchOptions,
    subject: SubjectInput<'_>,
    query: Database,
    cancel: &CancellationToken,
) -> Result<SearchOutcome> {
    options.validate()?;
    let alphabet = options.alphabet();
    let subject_db = subject.database();
    if subject_db.alphabet != alphabet || query.alphabet != alphabet {
        return Err(PlastError::Config(format!(
            "{:?} search needs {:?} databases (subject {:?}, query {:?})",
            options.program, alphabet, subject_db.alphabet, query.alphabet
        )));
    }
    if subject_db.sequences_number() == 0 {
        return Err(PlastError::Config("subject database is empty".into()));
    }

    let matrix = build_matrix(options)?;
    let (db_sequences, db_length) = subject_db.forward_stats();
    let params = GlobalParameters::build(
        &matrix,
        options.gap_open,
        options.gap_extend,
        db_length as u64,
        db_sequences as u64,
    )?;
    info!(
        matrix = %params.matrix,
        lambda = params.lambda,
        k = params.k,
        db_length,
        db_sequences,
        "statistical parameters ready"
    );
    let descriptor = PipelineDescriptor::from_options(options, &matrix, &params)?;
    let model = SeedModel::new(alphabet, options.seed_span)?;

    let owned_index;
    let subject_index: &SeedIndex = match subject {
        SubjectInput::Indexed(idx) => {
            if idx.index.model != model {
                return Err(PlastError::Config(format!(
                    "persisted index uses seed span {}, search requested {}",
                    idx.index.model.span, options.seed_span
                )));
            }
            &idx.index
        }
        SubjectInput::Plain(db) => {
            owned_index = SeedIndex::build(db, model);
            &owned_index
        }
    };

    let query = if alphabet == Alphabet::Nucleotide && options.strand == StrandOption::Both {
        query.with_reverse_strands()?
    } else {
        query
    };

    let (alignments, properties) = {
        let query_index = SeedIndex::build(&query, model);
        let query_info = QueryInformation::new(&params, &query, options.evalue);
        let ctx = SearchContext {
            subject: subject_db,
            query: &query,
            matrix: &matrix,
            query_info: &query_info,
            span: options.seed_span,
        };

        let root = SeedHitSource::new(subject_index, &query_index);
        let seed_codes = root.codes_number();
        let sources = root.split(options.split_count(), options.partition);
        let results: Mutex<Vec<WorkerResult>> = Mutex::new(Vec::with_capacity(sources.len()));
        let commands: Vec<Box<dyn Command + '_>> = sources
            .into_iter()
            .map(|src| {
                let cmd = HspCommand { pipeline: descriptor.instantiate(Box::new(src), &ctx), cancel, results: &results };
                Box::new(cmd) as Box<dyn Command + '_>
            })
            .collect();
        let n_commands = commands.len();

        let dispatcher = CommandDispatcher::parallel(options.threads)?;
        info!(threads = dispatcher.threads(), splits = n_commands, seed_codes, "dispatching search");

        let mut merged = AlignmentContainer::new();
        let mut totals: Vec<(&'static str, StageStats)> = Vec::new();
        dispatcher.dispatch_commands(commands, || {
            for (container, stats) in results.lock().drain(..) {
                merged.merge([container]);
                accumulate(&mut totals, stats);
            }
        });

        let before = merged.alignments_number();
        let removed = merged.shrink(options.max_hits_per_query, canonical_cmp);

        let mut props = Properties::new("search", "");
        props.push(parameter_properties(&params));
        let pipeline = props.add("pipeline", n_commands);
        for (name, st) in &totals {
            pipeline.push(
                Properties::new(*name, "")
                    .with("input", st.input)
                    .with("output", st.output)
                    .with("ratio", format!("{:.4}", st.ratio())),
            );
        }
        props.push(
            Properties::new("alignments", merged.alignments_number())
                .with("before_shrink", before)
                .with("removed", removed),
        );
        (merged, props)
    };

    let cancelled = cancel.is_cancelled();
    if cancelled {
        warn!(alignments = alignments.alignments_number(), "search cancelled, partial results kept");
    } else {
        info!(alignments = alignments.alignments_number(), "search finished");
    }
    let mut properties = properties;
    properties.add("cancelled", cancelled);
    Ok(SearchOutcome { query, alignments, params, properties, cancelled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::protein;

    fn protein_db(seqs: &[(&str, &[u8])]) -> Database {
        let mut db = Database::new(Alphabet::Protein);
        for (id, s) in seqs {
            let codes: Vec<u8> = s.iter().map(|&b| protein::to_code(b)).collect();
            db.push(id, None, &codes).unwrap();
        }
        db
    }

    #[test]
    fn alphabet_mismatch_is_a_configuration_error() {
        let subject = protein_db(&[("s", b"MKWVTFISLLFLFSSAYSRG")]);
        let query = protein_db(&[("q", b"MKWVTFISLLFLFSSAYSRG")]);
        let err = search(&SearchOptions::nucleotide(), SubjectInput::Plain(&subject), query, &CancellationToken::new())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_matrix_fails_before_any_work() {
        let subject = protein_db(&[("s", b"MKWVTFISLLFLFSSAYSRG")]);
        let query = protein_db(&[("q", b"MKWVTFISLLFLFSSAYSRG")]);
        let mut o = SearchOptions::protein();
        o.matrix = "PAM1000".into();
        let err = search(&o, SubjectInput::Plain(&subject), query, &CancellationToken::new()).err().unwrap();
        assert!(matches!(err, PlastError::UnknownMatrix(_)));
    }

    #[test]
    fn properties_report_every_stage() {
        let seq: &[u8] = b"MKWVTFISLLFLFSSAYSRGVFRRDTHKSEIAHRFKDLGEENFKALVLIAFAQYLQQ";
        let subject = protein_db(&[("s", seq)]);
        let query = protein_db(&[("q", seq)]);
        let out = search(&SearchOptions::protein(), SubjectInput::Plain(&subject), query, &CancellationToken::new()).unwrap();
        assert_eq!(out.alignments.alignments_number(), 1);
        for stage in ["seed", "ungap", "small_gap", "full_gap", "composition_null"] {
            assert!(out.properties.get(&format!("pipeline/{}/input", stage)).is_some(), "{}", stage);
        }
        assert_eq!(out.properties.get("alignments").map(|p| p.value.as_str()), Some("1"));
        assert_eq!(out.properties.get("cancelled").map(|p| p.value.as_str()), Some("false"));
    }

    #[test]
    fn persisted_index_with_other_span_is_rejected() {
        let seq: &[u8] = b"MKWVTFISLLFLFSSAYSRG";
        let subject = protein_db(&[("s", seq)]);
        let idx = IndexedDatabase::build(subject, SeedModel::new(Alphabet::Protein, 3).unwrap(), Default::default());
        let query = protein_db(&[("q", seq)]);
        let err = search(&SearchOptions::protein(), SubjectInput::Indexed(&idx), query, &CancellationToken::new())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }
}
