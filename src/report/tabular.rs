use std::io::Write;

use super::AlignmentVisitor;
use crate::align::Alignment;
use crate::db::{Sequence, Strand};
use crate::error::Result;

/// 12 列制表符分隔输出，坐标从 1 开始；负链查询的坐标换算回正链，qstart > qend
pub struct TabularVisitor<W: Write> {
    out: W,
    with_cigar: bool,
    written: usize,
}

impl<W: Write> TabularVisitor<W> {
    pub fn new(out: W) -> Self {
        Self { out, with_cigar: false, written: 0 }
    }

    /// 末尾追加 CIGAR 列
    pub fn with_cigar(mut self, yes: bool) -> Self {
        self.with_cigar = yes;
        self
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_evalue(evalue: f64) -> String {
    if evalue < 1.0e-180 {
        "0.0".to_string()
    } else if evalue < 1.0e-99 {
        format!("{:.0e}", evalue)
    } else if evalue < 0.0009 {
        format!("{:.2e}", evalue)
    } else if evalue < 0.1 {
        format!("{:.3}", evalue)
    } else if evalue < 1.0 {
        format!("{:.2}", evalue)
    } else if evalue < 10.0 {
        format!("{:.1}", evalue)
    } else {
        format!("{:.0}", evalue)
    }
}

pub fn format_bitscore(bits: f64) -> String {
    if bits > 9999.0 {
        format!("{:.3e}", bits)
    } else if bits > 99.9 {
        format!("{:.0}", bits)
    } else {
        format!("{:.1}", bits)
    }
}

impl<W: Write> AlignmentVisitor for TabularVisitor<W> {
    fn visit_alignment(&mut self, al: &Alignment, query: &Sequence<'_>, subject: &Sequence<'_>) -> Result<()> {
        let (qstart, qend) = match query.strand {
            Strand::Plus => (al.query_range.begin + 1, al.query_range.end + 1),
            Strand::Minus => {
                let len = query.len() as u32;
                (len - al.query_range.begin, len - al.query_range.end)
            }
        };
        write!(
            self.out,
            "{}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            query.id,
            subject.id,
            al.percent_identity(),
            al.length,
            al.misses,
            al.gap_opens,
            qstart,
            qend,
            al.subject_range.begin + 1,
            al.subject_range.end + 1,
            format_evalue(al.evalue),
            format_bitscore(al.bitscore),
        )?;
        if self.with_cigar {
            write!(self.out, "\t{}", al.cigar)?;
        }
        writeln!(self.out)?;
        self.written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
