use std::io::Write;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use plast_rust::config::{SearchOptions, SeedPartition, StrandOption};
use plast_rust::engine::{self, SubjectInput};
use plast_rust::error::PlastError;
use plast_rust::index::{IndexMeta, IndexedDatabase, SeedModel};
use plast_rust::io::fasta::read_database;
use plast_rust::pipeline::CancellationToken;
use plast_rust::report::TabularVisitor;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// 持久化索引文件的扩展名
const INDEX_EXT: &str = "pidx";

#[derive(Parser, Debug)]
#[command(name = "plast-rust", author, version, about = "Parallel local alignment search (PLAST-style seed and extend)", arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgramArg {
    Plastp,
    Plastn,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PartitionArg {
    Static,
    Dynamic,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrandArg {
    Plus,
    Both,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a seed index of a subject database
    Index {
        /// Subject FASTA file
        subject: String,
        /// Output prefix; the index is written to <prefix>.pidx
        #[arg(short, long, default_value = "subject")]
        output: String,
        #[arg(short = 'p', long, value_enum, default_value_t = ProgramArg::Plastp)]
        program: ProgramArg,
        /// Seed length (defaults to the program's default)
        #[arg(long = "seed-span")]
        seed_span: Option<usize>,
    },
    /// Search query sequences against a subject database
    Search {
        #[arg(short = 'p', long, value_enum, default_value_t = ProgramArg::Plastp)]
        program: ProgramArg,
        /// Subject FASTA file or a .pidx index
        #[arg(short = 'd', long = "db")]
        subject: String,
        /// Query FASTA file
        #[arg(short = 'i', long = "query")]
        query: String,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        #[arg(short = 'e', long)]
        evalue: Option<f64>,
        #[arg(short = 'M', long)]
        matrix: Option<String>,
        #[arg(long)]
        reward: Option<i32>,
        #[arg(long)]
        penalty: Option<i32>,
        #[arg(long = "gap-open")]
        gap_open: Option<i32>,
        #[arg(long = "gap-ext")]
        gap_extend: Option<i32>,
        #[arg(long = "seed-span")]
        seed_span: Option<usize>,
        /// Gapped X-drop in bits
        #[arg(long = "xdrop-gap")]
        xdrop_gap: Option<f64>,
        #[arg(long = "no-small-gap")]
        no_small_gap: bool,
        /// Use the scalar small-gap kernel
        #[arg(long = "no-vectorize")]
        no_vectorize: bool,
        /// Composition-based statistics (protein only)
        #[arg(long)]
        composition: bool,
        #[arg(long = "max-hits")]
        max_hits: Option<usize>,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        /// Number of sub-pipelines (0 = one per thread)
        #[arg(long, default_value_t = 0)]
        splits: usize,
        #[arg(long, value_enum, default_value_t = PartitionArg::Static)]
        partition: PartitionArg,
        #[arg(long, value_enum)]
        strand: Option<StrandArg>,
        /// Append a CIGAR column
        #[arg(long)]
        cigar: bool,
        /// Print the per-stage report to stderr
        #[arg(long)]
        stats: bool,
    },
}

fn main() {
    // RUST_LOG 优先，其次 PLAST_LOG，默认 info
    let level = std::env::var("PLAST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let code = match e.downcast_ref::<PlastError>() {
            Some(err) if err.is_configuration() => 2,
            Some(PlastError::Io(_)) => 3,
            _ => 1,
        };
        process::exit(code);
    }
}

fn base_options(program: ProgramArg) -> SearchOptions {
    match program {
        ProgramArg::Plastp => SearchOptions::protein(),
        ProgramArg::Plastn => SearchOptions::nucleotide(),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Index { subject, output, program, seed_span } => {
            let mut opt = base_options(program);
            if let Some(span) = seed_span {
                opt.seed_span = span;
            }
            run_index(&subject, &output, &opt)
        }
        Commands::Search {
            program,
            subject,
            query,
            out,
            evalue,
            matrix,
            reward,
            penalty,
            gap_open,
            gap_extend,
            seed_span,
            xdrop_gap,
            no_small_gap,
            no_vectorize,
            composition,
            max_hits,
            threads,
            splits,
            partition,
            strand,
            cigar,
            stats,
        } => {
            let mut opt = base_options(program);
            if let Some(v) = evalue {
                opt.evalue = v;
            }
            if let Some(v) = matrix {
                opt.matrix = v;
            }
            if let Some(v) = reward {
                opt.reward = v;
            }
            if let Some(v) = penalty {
                opt.penalty = v;
            }
            if let Some(v) = gap_open {
                opt.gap_open = v;
            }
            if let Some(v) = gap_extend {
                opt.gap_extend = v;
            }
            if let Some(v) = seed_span {
                opt.seed_span = v;
            }
            if let Some(v) = xdrop_gap {
                opt.gapped_xdrop_bits = v;
            }
            opt.small_gap = !no_small_gap;
            opt.vectorized = !no_vectorize;
            opt.composition = composition;
            opt.max_hits_per_query = max_hits;
            opt.threads = threads;
            opt.splits = splits;
            opt.partition = match partition {
                PartitionArg::Static => SeedPartition::Static,
                PartitionArg::Dynamic => SeedPartition::Dynamic,
            };
            if let Some(s) = strand {
                opt.strand = match s {
                    StrandArg::Plus => StrandOption::Plus,
                    StrandArg::Both => StrandOption::Both,
                };
            }
            run_search(&subject, &query, out.as_deref(), &opt, cigar, stats)
        }
    }
}

fn run_index(subject: &str, output: &str, opt: &SearchOptions) -> Result<()> {
    let db = read_database(subject, opt.alphabet())?;
    let model = SeedModel::new(opt.alphabet(), opt.seed_span)?;
    let meta = IndexMeta {
        source_file: Some(subject.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    };
    let idx = IndexedDatabase::build(db, model, meta);

    let out_path = format!("{}.{}", output, INDEX_EXT);
    idx.save_to_file(&out_path)
        .with_context(|| format!("cannot write index to '{}'", out_path))?;
    println!("subject: {}", subject);
    println!("sequences: {}", idx.database.sequences_number());
    println!("residues: {}", idx.database.size());
    println!("seed index saved: {}", out_path);
    Ok(())
}

fn run_search(subject_path: &str, query_path: &str, out_path: Option<&str>, opt: &SearchOptions, cigar: bool, stats: bool) -> Result<()> {
    let alphabet = opt.alphabet();
    let indexed;
    let plain;
    let subject = if subject_path.ends_with(&format!(".{}", INDEX_EXT)) {
        indexed = IndexedDatabase::load_from_file(subject_path)?;
        info!(path = subject_path, built = ?indexed.meta.build_timestamp, "seed index loaded");
        SubjectInput::Indexed(&indexed)
    } else {
        plain = read_database(subject_path, alphabet)?;
        SubjectInput::Plain(&plain)
    };
    let query = read_database(query_path, alphabet)?;

    let outcome = engine::search(opt, subject, query, &CancellationToken::new())?;
    if stats {
        eprint!("{}", outcome.properties);
    }

    let out: Box<dyn Write> = if let Some(p) = out_path {
        let fh = std::fs::File::create(p).map_err(PlastError::Io)?;
        Box::new(std::io::BufWriter::new(fh))
    } else {
        Box::new(std::io::BufWriter::new(std::io::stdout()))
    };
    let mut visitor = TabularVisitor::new(out).with_cigar(cigar);
    outcome.alignments.accept(&mut visitor, &outcome.query, subject.database())?;
    info!(written = visitor.written(), "alignments reported");
    Ok(())
}
