//! Routing extraction - document から sender / receiver を取り出す
//!
//! # 設計原則
//! - strategies are tried in a fixed order; each one says whether it accepts
//!   the parsed root element
//! - the first acceptor decides, there is no fallback to the next strategy
//! - nothing here touches the disk: malformed documents are rejected before
//!   any scratch resource exists

mod party;
mod sbdh;

use std::fmt;
use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::domain::{MalformedReason, PipelineError, RoutingIdentifiers};

pub use self::party::PartyExtractor;
pub use self::sbdh::SbdhExtractor;

/// One way of locating routing identifiers in a parsed document.
pub trait RoutingExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy is responsible for documents with this root.
    fn accepts(&self, root: Node<'_, '_>) -> bool;

    /// `None` when sender or receiver is absent or empty.
    fn extract(&self, doc: &Document<'_>) -> Option<RoutingIdentifiers>;
}

/// Which strategies are in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingScheme {
    /// Sniff the root element: `[Sbdh, Party]`.
    #[default]
    Auto,
    Sbdh,
    Party,
}

impl RoutingScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingScheme::Auto => "auto",
            RoutingScheme::Sbdh => "sbdh",
            RoutingScheme::Party => "party",
        }
    }
}

impl fmt::Display for RoutingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(RoutingScheme::Auto),
            "sbdh" => Ok(RoutingScheme::Sbdh),
            "party" => Ok(RoutingScheme::Party),
            other => Err(format!(
                "unknown routing scheme '{other}' (expected auto, sbdh or party)"
            )),
        }
    }
}

/// Ordered list of strategies.
pub struct ExtractorChain {
    extractors: Vec<Box<dyn RoutingExtractor>>,
}

impl ExtractorChain {
    pub fn new(extractors: Vec<Box<dyn RoutingExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn for_scheme(scheme: RoutingScheme) -> Self {
        match scheme {
            RoutingScheme::Auto => {
                Self::new(vec![Box::new(SbdhExtractor), Box::new(PartyExtractor)])
            }
            RoutingScheme::Sbdh => Self::new(vec![Box::new(SbdhExtractor)]),
            RoutingScheme::Party => Self::new(vec![Box::new(PartyExtractor)]),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Parse `bytes` and pull out the routing identifiers.
    ///
    /// Failures are logged together with the offending document text.
    pub fn extract(&self, bytes: &[u8]) -> Result<RoutingIdentifiers, PipelineError> {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                let xml = String::from_utf8_lossy(bytes);
                return Err(malformed(MalformedReason::NotWellFormed, e.to_string(), &xml));
            }
        };

        let doc = Document::parse(text)
            .map_err(|e| malformed(MalformedReason::NotWellFormed, e.to_string(), text))?;
        let root = doc.root_element();

        let Some(extractor) = self.extractors.iter().find(|e| e.accepts(root)) else {
            let detail = format!(
                "no strategy among [{}] accepts root element <{}>",
                self.names().join(", "),
                root.tag_name().name()
            );
            return Err(malformed(MalformedReason::MissingParties, detail, text));
        };

        match extractor.extract(&doc) {
            Some(routing) => {
                tracing::debug!(
                    strategy = extractor.name(),
                    %routing,
                    "routing identifiers extracted"
                );
                Ok(routing)
            }
            None => {
                let detail = format!("{} strategy found no sender/receiver", extractor.name());
                Err(malformed(MalformedReason::MissingParties, detail, text))
            }
        }
    }
}

impl Default for ExtractorChain {
    fn default() -> Self {
        Self::for_scheme(RoutingScheme::Auto)
    }
}

fn malformed(reason: MalformedReason, detail: String, xml: &str) -> PipelineError {
    tracing::error!(reason = reason.as_str(), error = %detail, xml, "unable to parse document");
    PipelineError::MalformedDocument { reason, detail }
}

/// Trimmed text content of `node`, `None` when empty.
pub(crate) fn non_empty_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// First element child of `node` with local name `name`.
pub(crate) fn child_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}
