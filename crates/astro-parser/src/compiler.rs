//! Cached compile entry point.
//!
//! A [`Compiler`] owns its options and a cache holding the latest parse of
//! each filename. Caches are per instance, never process-wide, so
//! independent compilers can run side by side on different threads.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ast::Ast;
use crate::transform::{InjectDoctype, InjectHeadScript, Transform};
use crate::{ParseError, Parser};

/// Options applied to every file a [`Compiler`] compiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Insert `<!doctype html>` before `<html>` when missing.
    pub inject_doctype: bool,
    /// Module script appended to the first `<head>` (dev-time HMR client).
    pub hmr_script: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inject_doctype: true,
            hmr_script: None,
        }
    }
}

/// The source a cached AST was parsed from.
#[derive(Debug)]
struct CacheEntry {
    source: String,
    ast: Arc<Ast>,
}

/// Scans, parses and transforms `.astro` files, caching the results.
#[derive(Debug, Default)]
pub struct Compiler {
    options: CompileOptions,
    cache: RwLock<FxHashMap<String, CacheEntry>>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            cache: RwLock::default(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one file. A file with the same name and identical source is
    /// served from the cache; a changed source replaces the cached entry.
    pub fn compile(&self, filename: &str, source: &str) -> Result<Arc<Ast>, ParseError> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(filename)
            .filter(|entry| entry.source == source)
            .map(|entry| Arc::clone(&entry.ast));
        if let Some(ast) = cached {
            log::debug!("cache hit for {filename}");
            return Ok(ast);
        }

        log::debug!("compiling {filename}");
        let mut ast = Parser::parse_source(source)?;
        for pass in self.passes() {
            log::trace!("running {} on {filename}", pass.name());
            pass.apply(&mut ast);
        }

        let ast = Arc::new(ast);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                filename.to_string(),
                CacheEntry {
                    source: source.to_string(),
                    ast: Arc::clone(&ast),
                },
            );
        Ok(ast)
    }

    /// Number of cached files.
    pub fn cached(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn passes(&self) -> Vec<Box<dyn Transform>> {
        let mut passes: Vec<Box<dyn Transform>> = Vec::new();
        if self.options.inject_doctype {
            passes.push(Box::new(InjectDoctype));
        }
        if let Some(src) = &self.options.hmr_script {
            passes.push(Box::new(InjectHeadScript::new(src.clone())));
        }
        passes
    }
}
