use std::fmt;

use serde::Serialize;

/// 名称/取值树，用于汇报各阶段的计数与参数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Properties {
    pub name: String,
    pub value: String,
    pub children: Vec<Properties>,
}

impl Properties {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self { name: name.into(), value: value.to_string(), children: Vec::new() }
    }

    /// 追加子节点并返回它
    pub fn add(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Properties {
        self.children.push(Properties::new(name, value));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.children.push(Properties::new(name, value));
        self
    }

    pub fn push(&mut self, child: Properties) {
        self.children.push(child);
    }

    /// 按 `a/b/c` 路径查找
    pub fn get(&self, path: &str) -> Option<&Properties> {
        path.split('/').try_fold(self, |node, part| node.children.iter().find(|c| c.name == part))
    }

    fn fmt_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if self.value.is_empty() {
            writeln!(f, "{:indent$}{}", "", self.name, indent = depth * 2)?;
        } else {
            writeln!(f, "{:indent$}{} : {}", "", self.name, self.value, indent = depth * 2)?;
        }
        for child in &self.children {
            child.fmt_depth(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_depth(f, 0)
    }
}
