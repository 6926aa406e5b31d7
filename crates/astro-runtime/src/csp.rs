//! Content-Security-Policy accumulation.
//!
//! Inline scripts and styles printed during a render are hashed into
//! per-render sets; the header is assembled once, after the whole page has
//! been rendered.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CspAlgorithm {
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl CspAlgorithm {
    fn prefix(self) -> &'static str {
        match self {
            CspAlgorithm::Sha256 => "sha256",
            CspAlgorithm::Sha384 => "sha384",
            CspAlgorithm::Sha512 => "sha512",
        }
    }

    /// `sha256-<base64 digest>` of `content`.
    pub fn hash(self, content: &str) -> String {
        let digest = match self {
            CspAlgorithm::Sha256 => STANDARD.encode(Sha256::digest(content.as_bytes())),
            CspAlgorithm::Sha384 => STANDARD.encode(Sha384::digest(content.as_bytes())),
            CspAlgorithm::Sha512 => STANDARD.encode(Sha512::digest(content.as_bytes())),
        };
        format!("{}-{digest}", self.prefix())
    }
}

/// CSP configuration for a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CspOptions {
    pub algorithm: CspAlgorithm,
    /// Append `'strict-dynamic'` to `script-src`.
    pub strict_dynamic: bool,
    /// Extra directives printed verbatim, e.g. `img-src 'self'`.
    pub directives: Vec<String>,
    /// Allowed script sources; defaults to `'self'`.
    pub script_resources: Vec<String>,
    /// Allowed style sources; defaults to `'self'`.
    pub style_resources: Vec<String>,
    /// Hashes of scripts known ahead of time.
    pub script_hashes: Vec<String>,
    /// Hashes of styles known ahead of time.
    pub style_hashes: Vec<String>,
}

/// Hashes collected during one render.
#[derive(Debug, Clone, Default)]
pub(crate) struct CspState {
    script_hashes: Vec<String>,
    style_hashes: Vec<String>,
}

impl CspState {
    pub(crate) fn add_script(&mut self, options: &CspOptions, content: &str) {
        push_unique(&mut self.script_hashes, options.algorithm.hash(content));
    }

    pub(crate) fn add_style(&mut self, options: &CspOptions, content: &str) {
        push_unique(&mut self.style_hashes, options.algorithm.hash(content));
    }

    /// Build the header value from the configured and collected hashes.
    pub(crate) fn header(&self, options: &CspOptions) -> String {
        let quoted = |configured: &[String], collected: &[String]| {
            let mut all: Vec<String> = Vec::new();
            for hash in configured.iter().chain(collected) {
                push_unique(&mut all, format!("'{hash}'"));
            }
            all
        };
        let resources = |list: &[String]| {
            if list.is_empty() {
                vec!["'self'".to_string()]
            } else {
                list.to_vec()
            }
        };

        let mut script_src = vec!["script-src".to_string()];
        script_src.extend(resources(&options.script_resources));
        script_src.extend(quoted(&options.script_hashes, &self.script_hashes));
        if options.strict_dynamic {
            script_src.push("'strict-dynamic'".to_string());
        }

        let mut style_src = vec!["style-src".to_string()];
        style_src.extend(resources(&options.style_resources));
        style_src.extend(quoted(&options.style_hashes, &self.style_hashes));

        let mut directives = options.directives.clone();
        directives.push(script_src.join(" "));
        directives.push(style_src.join(" "));
        directives.join("; ")
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}
