use std::io::BufRead;

use crate::db::Database;
use crate::error::{PlastError, Result};
use crate::util::Alphabet;

/// 一条 FASTA 记录；`seq` 为去除空白后的大写字母，尚未编码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub comment: Option<String>,
    pub seq: Vec<u8>,
}

impl FastaRecord {
    /// 由去掉 '>' 的标题行构建空记录
    fn from_header(header: &[u8]) -> Self {
        let header = String::from_utf8_lossy(header);
        let header = header.trim();
        let (id, comment) = match header.split_once(char::is_whitespace) {
            Some((id, rest)) => (id, Some(rest.trim()).filter(|c| !c.is_empty())),
            None => (header, None),
        };
        Self { id: id.to_string(), comment: comment.map(str::to_string), seq: Vec::new() }
    }
}

/// 按行流式读取 FASTA，逐条产出记录
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    pending: Option<FastaRecord>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: Vec::new(), pending: None }
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(self.pending.take());
            }
            if let Some(header) = self.line.strip_prefix(b">") {
                let next = FastaRecord::from_header(header);
                if let Some(done) = self.pending.replace(next) {
                    return Ok(Some(done));
                }
            } else if let Some(rec) = self.pending.as_mut() {
                rec.seq.extend(self.line.iter().filter(|b| !b.is_ascii_whitespace()).map(u8::to_ascii_uppercase));
            }
            // 首个标题之前的内容忽略
        }
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// 读取整个 FASTA 文件并构建数据库；空序列被跳过
pub fn read_database(path: &str, alphabet: Alphabet) -> Result<Database> {
    let fh = std::fs::File::open(path)
        .map_err(|e| std::io::Error::new(e.kind(), format!("cannot open FASTA '{}': {}", path, e)))?;
    let records = FastaReader::new(std::io::BufReader::new(fh))
        .filter(|r| r.as_ref().map_or(true, |rec| !rec.seq.is_empty()))
        .collect::<Result<Vec<_>>>()?;
    if records.is_empty() {
        return Err(PlastError::Config(format!("FASTA file '{}' contains no sequences", path)));
    }
    tracing::debug!(path, sequences = records.len(), ?alphabet, "FASTA loaded");
    Database::from_records(alphabet, &records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(data: &[u8]) -> Vec<FastaRecord> {
        FastaReader::new(Cursor::new(data)).collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn records_with_and_without_comment() {
        let recs = parse(b">sp|P1 first protein\nMKw\nVL\n>p2\nAAA\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "sp|P1");
        assert_eq!(recs[0].comment.as_deref(), Some("first protein"));
        assert_eq!(recs[0].seq, b"MKWVL");
        assert_eq!(recs[1], FastaRecord { id: "p2".into(), comment: None, seq: b"AAA".to_vec() });
    }

    #[test]
    fn crlf_inner_spaces_and_missing_final_newline() {
        let recs = parse(b">chr1 desc\r\nAC g t n\r\n acgt\r\n>chr2 \r\n N N N");
        assert_eq!(recs[0].seq, b"ACGTNACGT");
        assert_eq!(recs[0].comment.as_deref(), Some("desc"));
        assert_eq!(recs[1].id, "chr2");
        assert_eq!(recs[1].comment, None);
        assert_eq!(recs[1].seq, b"NNN");
    }

    #[test]
    fn text_before_first_header_is_ignored() {
        let recs = parse(b"\n; old style comment\n>chr1\nACGT\n");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].seq, b"ACGT");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_database("/nonexistent/plast-test.fa", Alphabet::Protein).unwrap_err();
        assert!(matches!(err, PlastError::Io(_)));
        assert!(!err.is_configuration());
    }

    #[test]
    fn file_without_sequences_is_rejected() {
        let path = std::env::temp_dir().join(format!("plast_fasta_empty_{}.fa", std::process::id()));
        std::fs::write(&path, ">empty\n\n").unwrap();
        let err = read_database(&path.to_string_lossy(), Alphabet::Nucleotide).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.is_configuration());
    }
}
