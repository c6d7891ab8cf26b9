//! Standard Business Document Header: identifiers at a fixed path.
//!
//! ```text
//! StandardBusinessDocument
//! └─ StandardBusinessDocumentHeader
//!    ├─ Sender/Identifier
//!    └─ Receiver/Identifier
//! ```
//!
//! Matching is on local names only; the header namespace is not checked.

use roxmltree::{Document, Node};

use super::{RoutingExtractor, child_named, non_empty_text};
use crate::domain::RoutingIdentifiers;

const ROOT: &str = "StandardBusinessDocument";
const HEADER: &str = "StandardBusinessDocumentHeader";

#[derive(Debug, Clone, Copy, Default)]
pub struct SbdhExtractor;

impl SbdhExtractor {
    fn identifier(header: Node<'_, '_>, party: &str) -> Option<String> {
        let party = child_named(header, party)?;
        non_empty_text(child_named(party, "Identifier")?)
    }
}

impl RoutingExtractor for SbdhExtractor {
    fn name(&self) -> &'static str {
        "sbdh"
    }

    fn accepts(&self, root: Node<'_, '_>) -> bool {
        root.tag_name().name() == ROOT
    }

    fn extract(&self, doc: &Document<'_>) -> Option<RoutingIdentifiers> {
        let header = child_named(doc.root_element(), HEADER)?;
        let sender = Self::identifier(header, "Sender")?;
        let receiver = Self::identifier(header, "Receiver")?;
        Some(RoutingIdentifiers::new(sender, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(xml: &str) -> Option<RoutingIdentifiers> {
        let doc = Document::parse(xml).unwrap();
        SbdhExtractor.extract(&doc)
    }

    #[test]
    fn reads_sender_and_receiver_in_order() {
        let xml = r#"<sh:StandardBusinessDocument xmlns:sh="urn:sbdh">
            <sh:StandardBusinessDocumentHeader>
              <sh:Receiver><sh:Identifier>0192:rcv</sh:Identifier></sh:Receiver>
              <sh:Sender><sh:Identifier> 0192:snd </sh:Identifier></sh:Sender>
            </sh:StandardBusinessDocumentHeader>
          </sh:StandardBusinessDocument>"#;
        assert_eq!(extract(xml), Some(RoutingIdentifiers::new("0192:snd", "0192:rcv")));
    }

    #[test]
    fn empty_identifier_counts_as_missing() {
        let xml = r#"<StandardBusinessDocument><StandardBusinessDocumentHeader>
              <Sender><Identifier>  </Identifier></Sender>
              <Receiver><Identifier>0192:rcv</Identifier></Receiver>
            </StandardBusinessDocumentHeader></StandardBusinessDocument>"#;
        assert_eq!(extract(xml), None);
    }

    #[test]
    fn identifiers_outside_the_header_are_ignored() {
        let xml = r#"<StandardBusinessDocument>
              <Sender><Identifier>0192:snd</Identifier></Sender>
              <Receiver><Identifier>0192:rcv</Identifier></Receiver>
            </StandardBusinessDocument>"#;
        assert_eq!(extract(xml), None);
    }

    #[test]
    fn accepts_only_its_root() {
        let doc = Document::parse("<Invoice/>").unwrap();
        assert!(!SbdhExtractor.accepts(doc.root_element()));
    }
}
