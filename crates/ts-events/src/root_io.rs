//! ROOT TTree event source (via `oxyroot`).
//!
//! Only flat scalar branches are supported: `float`, `double` and `int`
//! leaves. Vector branches are ignored when building the branch lookup.

use std::collections::HashMap;
use std::path::PathBuf;

use oxyroot::{Branch, Named, ReaderTree, RootFile};

use ts_core::{Error, Result};

use crate::sample::EventSample;
use crate::source::{EventSource, ReadRequest};

/// Event source backed by a TTree in a ROOT file.
#[derive(Debug, Clone)]
pub struct RootSource {
    path: PathBuf,
    tree: Option<String>,
}

impl RootSource {
    /// Source reading `tree` from `path`. With `tree = None` the file must
    /// contain exactly one TTree.
    pub fn new(path: impl Into<PathBuf>, tree: Option<String>) -> Self {
        Self { path: path.into(), tree }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScalarKind {
    F32,
    F64,
    I32,
}

fn scalar_kind(branch: &Branch) -> Option<ScalarKind> {
    let lower = branch.item_type_name().to_ascii_lowercase();
    if lower.contains("vector") {
        return None;
    }
    match lower.as_str() {
        "float" | "float_t" | "float32_t" => Some(ScalarKind::F32),
        "double" | "double_t" | "double32_t" => Some(ScalarKind::F64),
        "int" | "int_t" | "int32_t" => Some(ScalarKind::I32),
        _ => None,
    }
}

fn root_err<E: std::fmt::Display>(context: &str, err: E) -> Error {
    Error::EventSource(format!("{context}: {err}"))
}

fn read_branch(lookup: &HashMap<&str, (ScalarKind, &Branch)>, name: &str) -> Result<Vec<f64>> {
    let (kind, branch) = lookup.get(name).copied().ok_or_else(|| {
        let mut available: Vec<&str> = lookup.keys().copied().collect();
        available.sort_unstable();
        Error::EventSource(format!(
            "missing branch '{name}' in tree (scalar branches: {})",
            available.join(", ")
        ))
    })?;
    let context = format!("failed to read branch '{name}'");
    let values = match kind {
        ScalarKind::F32 => branch
            .as_iter::<f32>()
            .map_err(|e| root_err(&context, e))?
            .map(f64::from)
            .collect(),
        ScalarKind::F64 => branch.as_iter::<f64>().map_err(|e| root_err(&context, e))?.collect(),
        ScalarKind::I32 => branch
            .as_iter::<i32>()
            .map_err(|e| root_err(&context, e))?
            .map(f64::from)
            .collect(),
    };
    Ok(values)
}

fn resolve_tree(file: &mut RootFile, requested: Option<&str>) -> Result<(ReaderTree, String)> {
    if let Some(name) = requested {
        let tree = file
            .get_tree(name)
            .map_err(|e| root_err(&format!("failed to open tree '{name}'"), e))?;
        return Ok((tree, name.to_string()));
    }

    let names: Vec<String> = file
        .keys()
        .into_iter()
        .filter(|k| k.class_name() == "TTree")
        .map(|k| k.name().to_string())
        .collect();

    match names.as_slice() {
        [] => Err(Error::EventSource("ROOT file does not contain any TTree".into())),
        [only] => {
            let tree = file
                .get_tree(only)
                .map_err(|e| root_err(&format!("failed to open tree '{only}'"), e))?;
            Ok((tree, only.clone()))
        }
        many => Err(Error::EventSource(format!(
            "multiple TTrees found ({}); pass a tree name",
            many.join(", ")
        ))),
    }
}

impl EventSource for RootSource {
    fn read(&self, request: &ReadRequest) -> Result<EventSample> {
        request.validate()?;
        let mut file = RootFile::open(&self.path)
            .map_err(|e| root_err(&format!("failed to open {}", self.path.display()), e))?;
        let (tree, tree_name) = resolve_tree(&mut file, self.tree.as_deref())?;

        let mut lookup: HashMap<&str, (ScalarKind, &Branch)> = HashMap::new();
        for branch in tree.branches() {
            if let Some(kind) = scalar_kind(branch) {
                lookup.insert(branch.name(), (kind, branch));
            }
        }
        if lookup.is_empty() {
            return Err(Error::EventSource(format!(
                "no scalar numeric branches in tree '{tree_name}'"
            )));
        }

        let mut columns = Vec::with_capacity(request.branches.len());
        for name in request.unique_branches() {
            let values = read_branch(&lookup, &name)?;
            columns.push((name, values));
        }
        let weights = match &request.weight {
            Some(w) => Some(read_branch(&lookup, w)?),
            None => None,
        };

        log::debug!("read {} branches from tree '{tree_name}'", columns.len());
        let sample = EventSample::from_columns(columns, weights)?;
        Ok(request.finish(sample))
    }

    fn describe(&self) -> String {
        match &self.tree {
            Some(t) => format!("root:{}:{t}", self.path.display()),
            None => format!("root:{}", self.path.display()),
        }
    }
}
