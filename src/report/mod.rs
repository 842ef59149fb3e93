//! 结果输出：容器按查询、主体顺序回调访问者，格式完全由访问者决定。

use crate::align::Alignment;
use crate::db::Sequence;
use crate::error::Result;

pub mod properties;
pub mod tabular;

pub use properties::Properties;
pub use tabular::TabularVisitor;

/// Receives finalized alignments from [`crate::align::AlignmentContainer::accept`].
pub trait AlignmentVisitor {
    fn visit_query_sequence(&mut self, _query: &Sequence<'_>) -> Result<()> {
        Ok(())
    }

    fn visit_subject_sequence(&mut self, _subject: &Sequence<'_>) -> Result<()> {
        Ok(())
    }

    fn visit_alignments_list(&mut self, _alignments: &[Alignment]) -> Result<()> {
        Ok(())
    }

    fn visit_alignment(&mut self, alignment: &Alignment, query: &Sequence<'_>, subject: &Sequence<'_>) -> Result<()>;

    fn post_visit(&mut self, _query: &Sequence<'_>) -> Result<()> {
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
