//! Include resolution.
//!
//! Resolution is a pure walk over the include tree: every fragment is loaded
//! and parsed, every `include` is expanded in place, and the result is a
//! [`CompositionPlan`] listing the assignment statements in the exact order
//! they must run (a pre-order traversal of the tree). Nothing touches the
//! profile record here; folding the plan into a builder is a separate step.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use playbill_ast::ast::{Program, Stmt};
use playbill_ast::span::{LineIndex, Span};
use tracing::{debug, trace};

use crate::config::BootstrapOptions;
use crate::error::{BootstrapError, Location, Result};

/// The fixed directory every include path is resolved against.
#[derive(Debug, Clone)]
pub struct ProfileRoot {
    dir: PathBuf,
    canonical: PathBuf,
}

impl ProfileRoot {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let canonical = dir.canonicalize().map_err(|source| BootstrapError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(BootstrapError::Io {
                path: dir.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        Ok(Self { dir, canonical })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lexically normalize an include path: `a/./b/../c.js` -> `a/c.js`.
    /// Absolute paths and `..` that climbs above the root are rejected.
    pub fn normalize(rel: &str) -> std::result::Result<String, String> {
        if rel.trim().is_empty() {
            return Err("include path is empty".into());
        }
        let mut parts: Vec<&str> = Vec::new();
        for comp in Path::new(rel).components() {
            match comp {
                Component::Normal(seg) => match seg.to_str() {
                    Some(s) => parts.push(s),
                    None => return Err("include path is not valid UTF-8".into()),
                },
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err("path escapes the profile root".into());
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err("include paths must be relative to the profile root".into())
                }
            }
        }
        if parts.is_empty() {
            return Err("include path names no file".into());
        }
        Ok(parts.join("/"))
    }

    /// Map a normalized relative path to a file on disk inside the root.
    fn locate(&self, normalized: &str) -> std::result::Result<PathBuf, String> {
        let candidate = self.canonical.join(normalized);
        let canonical = match candidate.canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err("fragment not found".into())
            }
            Err(e) => return Err(e.to_string()),
        };
        if !canonical.starts_with(&self.canonical) {
            return Err("path escapes the profile root".into());
        }
        if !canonical.is_file() {
            return Err("not a file".into());
        }
        Ok(canonical)
    }
}

/// One loaded and parsed fragment.
#[derive(Debug, Clone)]
pub struct LoadedFragment {
    /// Normalized path relative to the profile root.
    pub path: String,
    pub source: String,
    pub program: Program,
    lines: LineIndex,
}

impl LoadedFragment {
    pub fn new(path: impl Into<String>, source: String, program: Program) -> Self {
        let lines = LineIndex::new(&source);
        Self {
            path: path.into(),
            source,
            program,
            lines,
        }
    }

    pub fn location(&self, span: Span) -> Location {
        let lc = self.lines.line_col(span.start);
        Location {
            fragment: self.path.clone(),
            line: lc.line,
            column: lc.column,
        }
    }
}

/// A node of the include tree, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IncludeNode {
    pub path: String,
    pub children: Vec<IncludeNode>,
}

impl IncludeNode {
    /// Paths in pre-order: this node, then each child subtree in turn.
    pub fn preorder(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut out);
        out
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.path);
        for child in &self.children {
            child.walk(out);
        }
    }

    /// Number of fragment executions, counting repeated includes.
    pub fn execution_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(IncludeNode::execution_count)
            .sum::<usize>()
    }
}

/// A single assignment to run: statement `stmt` of fragment `fragment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub fragment: usize,
    pub stmt: usize,
}

/// The flattened, ordered result of resolving an include tree.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    pub fragments: Vec<LoadedFragment>,
    pub steps: Vec<Step>,
    pub tree: IncludeNode,
}

impl CompositionPlan {
    /// Statements in execution order, paired with the fragment they came from.
    pub fn statements(&self) -> impl Iterator<Item = (&LoadedFragment, &Stmt)> {
        self.steps.iter().map(move |step| {
            let frag = &self.fragments[step.fragment];
            (frag, &frag.program.stmts[step.stmt])
        })
    }
}

/// Resolve `entry` and everything it includes into a plan.
pub fn resolve(root: &ProfileRoot, entry: &str, options: &BootstrapOptions) -> Result<CompositionPlan> {
    let mut resolver = Resolver {
        root,
        options,
        cache: HashMap::new(),
        fragments: Vec::new(),
        steps: Vec::new(),
        stack: Vec::new(),
    };
    let tree = resolver.visit(entry, None)?;
    Ok(CompositionPlan {
        fragments: resolver.fragments,
        steps: resolver.steps,
        tree,
    })
}

struct Resolver<'r> {
    root: &'r ProfileRoot,
    options: &'r BootstrapOptions,
    /// Normalized path -> index into `fragments`. Parsing is cached, execution is not.
    cache: HashMap<String, usize>,
    fragments: Vec<LoadedFragment>,
    steps: Vec<Step>,
    /// Ancestors of the fragment being visited.
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn visit(&mut self, rel: &str, origin: Option<Location>) -> Result<IncludeNode> {
        let path = ProfileRoot::normalize(rel).map_err(|reason| BootstrapError::UnresolvedInclude {
            path: rel.to_string(),
            reason,
            included_from: origin.clone(),
        })?;

        if self.stack.contains(&path) {
            let mut chain = self.stack.clone();
            chain.push(path);
            return Err(BootstrapError::CyclicInclude {
                chain,
                location: origin.unwrap_or_else(|| Location {
                    fragment: rel.to_string(),
                    line: 1,
                    column: 1,
                }),
            });
        }

        // The entry fragment is nesting level 0; each include adds one.
        if let Some(location) = &origin {
            if self.stack.len() > self.options.max_include_depth {
                return Err(BootstrapError::IncludeDepthExceeded {
                    path,
                    limit: self.options.max_include_depth,
                    location: location.clone(),
                });
            }
        }

        debug!(fragment = %path, depth = self.stack.len(), "including fragment");
        let id = self.load(&path, origin)?;

        // Snapshot the statement kinds so `self` can be borrowed mutably below.
        let stmts: Vec<Option<(String, Span)>> = self.fragments[id]
            .program
            .stmts
            .iter()
            .map(|stmt| match stmt {
                Stmt::Include { path, span } => Some((path.clone(), *span)),
                Stmt::Assign { .. } => None,
            })
            .collect();

        self.stack.push(path.clone());
        let mut node = IncludeNode {
            path,
            children: Vec::new(),
        };
        for (index, stmt) in stmts.into_iter().enumerate() {
            match stmt {
                None => self.steps.push(Step {
                    fragment: id,
                    stmt: index,
                }),
                Some((target, span)) => {
                    let location = self.fragments[id].location(span);
                    node.children.push(self.visit(&target, Some(location))?);
                }
            }
        }
        self.stack.pop();
        Ok(node)
    }

    fn load(&mut self, path: &str, origin: Option<Location>) -> Result<usize> {
        if let Some(&id) = self.cache.get(path) {
            trace!(fragment = %path, "fragment already parsed");
            return Ok(id);
        }

        let unresolved = |reason: String| BootstrapError::UnresolvedInclude {
            path: path.to_string(),
            reason,
            included_from: origin.clone(),
        };

        let file = self.root.locate(path).map_err(&unresolved)?;
        let size = std::fs::metadata(&file)
            .map_err(|e| unresolved(e.to_string()))?
            .len();
        if size > self.options.max_fragment_bytes {
            return Err(BootstrapError::FragmentTooLarge {
                path: path.to_string(),
                size,
                limit: self.options.max_fragment_bytes,
                included_from: origin.clone(),
            });
        }
        let source = std::fs::read_to_string(&file).map_err(|e| unresolved(e.to_string()))?;

        let program = playbill_parse::parse_str(path, &source).map_err(|e| {
            let lines = LineIndex::new(&source);
            let lc = lines.line_col(e.span.start);
            BootstrapError::MalformedStatement {
                location: Location {
                    fragment: path.to_string(),
                    line: lc.line,
                    column: lc.column,
                },
                message: e.message,
            }
        })?;

        let id = self.fragments.len();
        self.fragments.push(LoadedFragment::new(path, source, program));
        self.cache.insert(path.to_string(), id);
        Ok(id)
    }
}
