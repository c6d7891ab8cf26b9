//! Party identifiers in a namespaced business response.
//!
//! - receiver: first `cac:ContractingParty[1]/cac:Party/cac:PartyIdentification/cbc:ID`
//! - sender: first `resp:PartyIdentification[1]/resp:ID`
//!
//! Prefixes are resolved against the declarations on the root element (then
//! against the element's own scope), the same way an XPath evaluated on the
//! document would see them. An identifier is rendered `schemeID:value`.

use roxmltree::{Document, Node};

use super::{RoutingExtractor, non_empty_text};
use crate::domain::RoutingIdentifiers;

const SCHEME_ATTR: &str = "schemeID";

#[derive(Debug, Clone, Copy, Default)]
pub struct PartyExtractor;

/// `prefix:local` as written in the document.
#[derive(Debug, Clone, Copy)]
struct QName(&'static str, &'static str);

const CONTRACTING_PARTY: QName = QName("cac", "ContractingParty");
const PARTY: QName = QName("cac", "Party");
const PARTY_IDENTIFICATION: QName = QName("cac", "PartyIdentification");
const CBC_ID: QName = QName("cbc", "ID");
const RESP_PARTY_IDENTIFICATION: QName = QName("resp", "PartyIdentification");
const RESP_ID: QName = QName("resp", "ID");

impl QName {
    fn matches(self, node: Node<'_, '_>, root: Node<'_, '_>) -> bool {
        let QName(prefix, local) = self;
        if !node.is_element() || node.tag_name().name() != local {
            return false;
        }
        let uri = root
            .lookup_namespace_uri(Some(prefix))
            .or_else(|| node.lookup_namespace_uri(Some(prefix)));
        uri.is_some() && node.tag_name().namespace() == uri
    }
}

impl PartyExtractor {
    fn children<'a, 'input: 'a>(
        node: Node<'a, 'input>,
        name: QName,
        root: Node<'a, 'input>,
    ) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
        node.children().filter(move |n| name.matches(*n, root))
    }

    /// `[1]` predicate: first sibling with the same name.
    fn is_first_of_kind(node: Node<'_, '_>, name: QName, root: Node<'_, '_>) -> bool {
        node.parent().is_none_or(|parent| {
            parent.children().find(|n| name.matches(*n, root)) == Some(node)
        })
    }

    fn render(id: Node<'_, '_>) -> Option<String> {
        let value = non_empty_text(id)?;
        match id.attribute(SCHEME_ATTR).map(str::trim) {
            Some(scheme) if !scheme.is_empty() => Some(format!("{scheme}:{value}")),
            _ => Some(value),
        }
    }

    fn receiver(doc: &Document<'_>) -> Option<String> {
        let root = doc.root_element();
        doc.descendants()
            .filter(|n| CONTRACTING_PARTY.matches(*n, root))
            .filter(|n| Self::is_first_of_kind(*n, CONTRACTING_PARTY, root))
            .flat_map(|cp| Self::children(cp, PARTY, root))
            .flat_map(|party| Self::children(party, PARTY_IDENTIFICATION, root))
            .flat_map(|pid| Self::children(pid, CBC_ID, root))
            .next()
            .and_then(Self::render)
    }

    fn sender(doc: &Document<'_>) -> Option<String> {
        let root = doc.root_element();
        doc.descendants()
            .filter(|n| RESP_PARTY_IDENTIFICATION.matches(*n, root))
            .filter(|n| Self::is_first_of_kind(*n, RESP_PARTY_IDENTIFICATION, root))
            .flat_map(|pid| Self::children(pid, RESP_ID, root))
            .next()
            .and_then(Self::render)
    }
}

impl RoutingExtractor for PartyExtractor {
    fn name(&self) -> &'static str {
        "party"
    }

    fn accepts(&self, root: Node<'_, '_>) -> bool {
        root.tag_name().name() != "StandardBusinessDocument"
    }

    fn extract(&self, doc: &Document<'_>) -> Option<RoutingIdentifiers> {
        let receiver = Self::receiver(doc)?;
        let sender = Self::sender(doc)?;
        Some(RoutingIdentifiers::new(sender, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:resp="urn:example:response" xmlns:cac="urn:cac" xmlns:cbc="urn:cbc""#;

    fn extract(body: &str) -> Option<RoutingIdentifiers> {
        let xml = format!("<resp:Response {NS}>{body}</resp:Response>");
        let doc = Document::parse(&xml).unwrap();
        PartyExtractor.extract(&doc)
    }

    #[test]
    fn sender_and_receiver_are_not_swapped() {
        let routing = extract(
            r#"<resp:PartyIdentification><resp:ID schemeID="0192">sender</resp:ID></resp:PartyIdentification>
               <cac:ContractingParty><cac:Party><cac:PartyIdentification>
                 <cbc:ID schemeID="9908">receiver</cbc:ID>
               </cac:PartyIdentification></cac:Party></cac:ContractingParty>"#,
        );
        assert_eq!(routing, Some(RoutingIdentifiers::new("0192:sender", "9908:receiver")));
    }

    #[test]
    fn only_the_first_contracting_party_counts() {
        let routing = extract(
            r#"<resp:PartyIdentification><resp:ID schemeID="0192">s</resp:ID></resp:PartyIdentification>
               <cac:ContractingParty><cac:Party/></cac:ContractingParty>
               <cac:ContractingParty><cac:Party><cac:PartyIdentification>
                 <cbc:ID schemeID="0192">second</cbc:ID>
               </cac:PartyIdentification></cac:Party></cac:ContractingParty>"#,
        );
        assert_eq!(routing, None);
    }

    #[test]
    fn missing_scheme_keeps_bare_value() {
        let routing = extract(
            r#"<resp:PartyIdentification><resp:ID>s</resp:ID></resp:PartyIdentification>
               <cac:ContractingParty><cac:Party><cac:PartyIdentification>
                 <cbc:ID schemeID="0192">r</cbc:ID>
               </cac:PartyIdentification></cac:Party></cac:ContractingParty>"#,
        );
        assert_eq!(routing, Some(RoutingIdentifiers::new("s", "0192:r")));
    }

    #[test]
    fn prefixes_resolve_through_the_root_declarations() {
        // same local names in another namespace do not match
        let routing = extract(
            r#"<resp:PartyIdentification><resp:ID schemeID="0192">s</resp:ID></resp:PartyIdentification>
               <x:ContractingParty xmlns:x="urn:other"><x:Party><x:PartyIdentification>
                 <x:ID schemeID="0192">r</x:ID>
               </x:PartyIdentification></x:Party></x:ContractingParty>"#,
        );
        assert_eq!(routing, None);
    }

    #[test]
    fn empty_sender_is_missing() {
        let routing = extract(
            r#"<resp:PartyIdentification><resp:ID schemeID="0192"> </resp:ID></resp:PartyIdentification>
               <cac:ContractingParty><cac:Party><cac:PartyIdentification>
                 <cbc:ID schemeID="0192">r</cbc:ID>
               </cac:PartyIdentification></cac:Party></cac:ContractingParty>"#,
        );
        assert_eq!(routing, None);
    }
}
