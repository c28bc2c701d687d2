#[cfg(test)]
mod tests {
    use crate::generator::parsing::{
        ResearchBlueprint, StructuredResponseParseError, decode_json_value, parse_blueprint,
        parse_compendium_payload, parse_string_list, parse_text, parse_topic_payload,
        strip_code_fences,
    };

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  [1] "), "[1]");
    }

    #[test]
    fn test_decode_json_with_surrounding_text() {
        let value = decode_json_value("Here you go:\n{\"a\": 1}\nThanks!").unwrap();
        assert_eq!(value["a"], 1);
        assert!(matches!(
            decode_json_value("no json here"),
            Err(StructuredResponseParseError::NotJson(_))
        ));
        assert!(matches!(
            decode_json_value("   "),
            Err(StructuredResponseParseError::Empty)
        ));
    }

    #[test]
    fn test_parse_string_list() {
        let names = parse_string_list("```json\n[\"History\", \" Construction \", \"\"]\n```").unwrap();
        assert_eq!(names, vec!["History", "Construction"]);
    }

    #[test]
    fn test_parse_question_objects() {
        let names = parse_string_list(
            r#"[{"number": 1, "question": "Who?"}, {"number": 2, "question": "When?"}]"#,
        )
        .unwrap();
        assert_eq!(names, vec!["Who?", "When?"]);
    }

    #[test]
    fn test_parse_string_list_rejects_wrong_shape() {
        assert!(matches!(
            parse_string_list(r#"{"areas": ["History"]}"#),
            Err(StructuredResponseParseError::WrongShape(_))
        ));
        assert!(matches!(
            parse_string_list("[1, 2]"),
            Err(StructuredResponseParseError::WrongShape(_))
        ));
    }

    #[test]
    fn test_parse_topic_payload() {
        let payload = parse_topic_payload(
            r#"{"content": "Flutes are old.", "keywords": ["bone"], "prerequisites": ["Acoustics"]}"#,
        )
        .unwrap();
        assert_eq!(payload.content, "Flutes are old.");
        assert_eq!(payload.keywords, vec!["bone"]);
        assert!(payload.questions.is_empty());
        assert_eq!(payload.prerequisites, vec!["Acoustics"]);
    }

    #[test]
    fn test_topic_payload_requires_content() {
        assert_eq!(
            parse_topic_payload(r#"{"keywords": ["bone"]}"#),
            Err(StructuredResponseParseError::MissingField("content"))
        );
        assert_eq!(
            parse_topic_payload(r#"{"content": "  "}"#),
            Err(StructuredResponseParseError::MissingField("content"))
        );
        assert!(matches!(
            parse_topic_payload(r#"{"content": "x", "keywords": "bone"}"#),
            Err(StructuredResponseParseError::WrongShape(_))
        ));
    }

    #[test]
    fn test_parse_blueprint() {
        let blueprint = parse_blueprint(
            r#"{"primary_objective": "Map the field", "key_sections": [{"title": "Basics"}]}"#,
        )
        .unwrap();
        assert_eq!(blueprint.key_sections[0].title, "Basics");
        assert!(blueprint.key_sections[0].focus.is_empty());
        assert!(parse_blueprint(r#"{"audience": "x"}"#).is_err());
    }

    #[test]
    fn test_default_blueprint() {
        let blueprint = ResearchBlueprint::default_for("Flutes");
        assert!(blueprint.primary_objective.ends_with("Flutes"));
        assert_eq!(blueprint.key_sections.len(), 3);
    }

    #[test]
    fn test_parse_compendium_payload() {
        let payload = parse_compendium_payload(r#"{"topic_overview": "o", "sections": []}"#).unwrap();
        assert_eq!(payload.topic_overview.as_deref(), Some("o"));
        assert!(parse_compendium_payload("[1]").is_err());
        assert!(parse_compendium_payload(r#"{"sections": {}}"#).is_err());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(parse_text("  hi \n").unwrap(), "hi");
        assert_eq!(parse_text(" "), Err(StructuredResponseParseError::Empty));
    }
}
