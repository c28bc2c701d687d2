#[cfg(test)]
mod tests {
    use crate::compendium::address::{
        Address, NodeRef, build_address, normalize_name, parse_address, resolve, slugify,
    };
    use crate::compendium::error::KnowledgeError;
    use crate::compendium::model::{Domain, Topic, TopicBody};

    fn sample_tree() -> Domain {
        let mut root = Domain::new("Flutes");
        root.add_topic(
            Topic::finalized(
                "History of Flutes",
                TopicBody {
                    content: "Bone flutes date back over 40,000 years.".to_string(),
                    ..Default::default()
                },
            )
            .unwrap(),
        )
        .unwrap();

        let mut construction = Domain::new("Construction");
        construction.add_topic(Topic::placeholder("Bore Shapes")).unwrap();
        root.add_subdomain(construction).unwrap();
        root
    }

    #[test]
    fn test_build_address() {
        let address = build_address(&["Flutes", "Construction", "BoreShapes"]);
        assert_eq!(address.as_str(), "compendium://Flutes/Construction/BoreShapes");
    }

    #[test]
    fn test_address_round_trip() {
        let cases: Vec<Vec<&str>> = vec![
            vec!["Root"],
            vec!["Root", "Child"],
            vec!["CellBiology", "Mitochondria", "ElectronTransportChain"],
            vec!["Été", "Überblick", "数据"],
        ];
        for segments in cases {
            let address = build_address(&segments);
            assert_eq!(parse_address(address.as_str()).unwrap(), segments);
        }
    }

    #[test]
    fn test_parse_address_missing_prefix() {
        let err = parse_address("Flutes/History").unwrap_err();
        assert!(matches!(err, KnowledgeError::MalformedAddress { .. }));

        let err = parse_address("http://Flutes/History").unwrap_err();
        assert!(matches!(err, KnowledgeError::MalformedAddress { .. }));
    }

    #[test]
    fn test_parse_address_empty_segment() {
        for raw in [
            "compendium://",
            "compendium://Flutes//History",
            "compendium://Flutes/",
            "compendium:///Flutes",
        ] {
            let err = parse_address(raw).unwrap_err();
            assert!(
                matches!(err, KnowledgeError::MalformedAddress { .. }),
                "{} should be malformed",
                raw
            );
        }
    }

    #[test]
    fn test_address_from_str_validates() {
        assert!("compendium://Flutes".parse::<Address>().is_ok());
        assert!("compendium://".parse::<Address>().is_err());
    }

    #[test]
    fn test_resolve_root_topic_and_subdomain() {
        let root = sample_tree();

        let node = resolve(&build_address(&["Flutes"]), &root).unwrap();
        assert!(matches!(node, NodeRef::Domain(d) if d.id() == "Flutes"));

        let node = resolve(&build_address(&["Flutes", "HistoryOfFlutes"]), &root).unwrap();
        assert_eq!(node.as_topic().unwrap().name(), "History of Flutes");

        let node = resolve(&build_address(&["Flutes", "Construction"]), &root).unwrap();
        assert_eq!(node.as_domain().unwrap().name(), "Construction");

        let node = resolve(
            &build_address(&["Flutes", "Construction", "BoreShapes"]),
            &root,
        )
        .unwrap();
        assert_eq!(node.id(), "BoreShapes");
    }

    #[test]
    fn test_resolve_prefers_subdomain_at_final_segment() {
        let mut root = Domain::new("Root");
        root.add_subdomain(Domain::new("Shared")).unwrap();
        let node = resolve(&build_address(&["Root", "Shared"]), &root).unwrap();
        assert!(node.as_domain().is_some());
    }

    #[test]
    fn test_resolve_unresolved() {
        let root = sample_tree();

        // 根节点不匹配
        let err = resolve(&build_address(&["Piccolo", "HistoryOfFlutes"]), &root).unwrap_err();
        assert!(matches!(err, KnowledgeError::UnresolvedAddress { .. }));

        // 中间段是主题而不是领域
        let err = resolve(
            &build_address(&["Flutes", "HistoryOfFlutes", "Anything"]),
            &root,
        )
        .unwrap_err();
        assert!(matches!(err, KnowledgeError::UnresolvedAddress { .. }));

        let err = resolve(&build_address(&["Flutes", "Missing"]), &root).unwrap_err();
        assert!(matches!(err, KnowledgeError::UnresolvedAddress { .. }));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("History of Flutes"), "HistoryOfFlutes");
        assert_eq!(slugify("cell-biology: an overview"), "CellBiologyAnOverview");
        assert_eq!(slugify("  Mitochondria "), "Mitochondria");
        assert_eq!(slugify("Ökologie der Wälder"), "ÖkologieDerWälder");
        assert_eq!(slugify("!!!"), "Untitled");
        assert_eq!(slugify(""), "Untitled");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Cell   Membranes "), "cell membranes");
        assert_eq!(normalize_name("ATP"), normalize_name("atp"));
    }
}
