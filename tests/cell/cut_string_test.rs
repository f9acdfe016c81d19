#[path = "../common/mod.rs"]
mod common;

#[cfg(test)]
mod tests {
    use super::common::sales_cube;
    use dicer::cell::{
        cut_from_dict, cut_from_string, cuts_from_string, cuts_to_string, string_from_cuts, Cell,
        CellError, Cut, CutKind, CutParser, MemberConverters,
    };
    use dicer::diagnostics::{CollectingSink, DiagnosticCode};
    use dicer::model::ModelError;
    use serde_json::json;

    fn path(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_point_set_and_range() {
        let cuts = cuts_from_string("date:2010,5|product:1;2,3|!store:10-20").unwrap();
        assert_eq!(cuts.len(), 3);

        assert_eq!(
            cuts[0].kind,
            CutKind::Point {
                path: path(&["2010", "5"])
            }
        );
        assert_eq!(
            cuts[1].kind,
            CutKind::Set {
                paths: vec![path(&["1"]), path(&["2", "3"])]
            }
        );
        assert_eq!(
            cuts[2].kind,
            CutKind::Range {
                from: Some(path(&["10"])),
                to: Some(path(&["20"]))
            }
        );
        assert!(cuts[2].invert);
    }

    #[test]
    fn test_open_ranges() {
        let cut = cut_from_string("date:2010-").unwrap();
        assert_eq!(
            cut.kind,
            CutKind::Range {
                from: Some(path(&["2010"])),
                to: None
            }
        );

        let cut = cut_from_string("date:-2012,6").unwrap();
        assert_eq!(
            cut.kind,
            CutKind::Range {
                from: None,
                to: Some(path(&["2012", "6"]))
            }
        );
    }

    #[test]
    fn test_string_round_trip_preserves_escapes() {
        let cuts = vec![
            Cut::point("product", &["a-b", "c,d"]),
            Cut::set("date", vec![path(&["2010"]), path(&["2011", "1"])]).unwrap(),
            Cut::range("store", Some(path(&["x|y"])), None).inverted(true),
            Cut::point("date", &["2010"]).with_hierarchy(Some("ymd")),
        ];
        let encoded = cuts_to_string(&cuts);
        assert_eq!(
            encoded,
            "product:a\\-b,c\\,d|date:2010;2011,1|!store:x\\|y-|date@ymd:2010"
        );
        assert_eq!(cuts_from_string(&encoded).unwrap(), cuts);
    }

    #[test]
    fn test_reserved_characters_round_trip_through_cut_list() {
        let reserved = r"a\b!c|d:e;f,g-h";
        let cuts = vec![
            Cut::point("product", &[reserved, "", "tail"]),
            Cut::set("product", vec![path(&["x;y", "-"]), path(&["", "z"])]).unwrap(),
            Cut::range("date", Some(path(&["2010", "a:b"])), Some(path(&["2011|"]))).inverted(true),
        ];

        let sink = CollectingSink::new();
        let encoded = string_from_cuts(&cuts, &sink);
        assert!(encoded.starts_with(r"product:a\\b\!c\|d\:e\;f\,g\-h,__null__,tail|"));
        assert!(!sink.has(DiagnosticCode::SentinelCollision));

        let decoded = cuts_from_string(&encoded).unwrap();
        assert_eq!(decoded, cuts);
        assert_eq!(
            decoded[0].kind,
            CutKind::Point {
                path: path(&[reserved, "", "tail"])
            }
        );
    }

    #[test]
    fn test_single_member_set_decodes_as_point() {
        let set = Cut::set("date", vec![path(&["2010", "1"])]).unwrap();
        let encoded = cuts_to_string(std::slice::from_ref(&set));
        assert_eq!(encoded, "date:2010,1");
        assert_eq!(
            cut_from_string(&encoded).unwrap().kind,
            CutKind::Point {
                path: path(&["2010", "1"])
            }
        );
    }

    #[test]
    fn test_empty_element_uses_sentinel() {
        let cut = Cut::point("product", &["", "tea"]);
        let encoded = cuts_to_string(std::slice::from_ref(&cut));
        assert_eq!(encoded, "product:__null__,tea");
        assert_eq!(cut_from_string(&encoded).unwrap(), cut);

        let sink = CollectingSink::new();
        string_from_cuts(&[Cut::point("product", &["__null__"])], &sink);
        assert!(sink.has(DiagnosticCode::SentinelCollision));
    }

    #[test]
    fn test_malformed_strings() {
        assert!(matches!(
            cut_from_string("date"),
            Err(CellError::WrongDimensionCut(_))
        ));
        assert!(matches!(
            cut_from_string("date:2010:5"),
            Err(CellError::WrongDimensionCut(_))
        ));
        assert!(matches!(
            cut_from_string("da te:2010"),
            Err(CellError::InvalidDimensionSpec(_))
        ));
        assert!(matches!(
            cut_from_string("date:1-2-3"),
            Err(CellError::UnknownCutFormat(s)) if s == "1-2-3"
        ));
        assert!(matches!(
            cut_from_string("date:1;;2"),
            Err(CellError::EmptySetMember(_))
        ));
    }

    #[test]
    fn test_parser_with_cube() {
        let cube = sales_cube();
        let parser = CutParser::new().with_cube(&cube);

        let cut = parser.parse_cut("date:2010").unwrap();
        assert_eq!(cut.hierarchy.as_deref(), Some("default"));

        assert!(matches!(
            parser.parse_cut("weather:sunny"),
            Err(CellError::Model(ModelError::NoSuchDimension { .. }))
        ));
        assert!(matches!(
            parser.parse_cut("date@fiscal:2010"),
            Err(CellError::Model(ModelError::NoSuchHierarchy { .. }))
        ));
    }

    #[test]
    fn test_member_converters() {
        let cube = sales_cube();
        let converters = MemberConverters::new().with_dimension("date", |_, _, path| {
            path.into_iter().map(|p| p.trim_start_matches('y').to_string()).collect()
        });
        let parser = CutParser::new().with_cube(&cube).with_converters(&converters);

        let cut = parser.parse_cut("date:y2010").unwrap();
        assert_eq!(cut.path(), Some(&path(&["2010"])));
    }

    #[test]
    fn test_dict_round_trip() {
        let cut = Cut::range("date", Some(path(&["2010"])), Some(path(&["2012", "6"])))
            .inverted(true);
        let dict = cut.to_dict();
        assert_eq!(dict["type"], json!("range"));
        assert_eq!(dict["level_depth"], json!(2));
        assert_eq!(cut_from_dict(&dict, None).unwrap(), cut);

        let cell = Cell::from_cuts(vec![cut, Cut::point("store", &["7"])]);
        let value = serde_json::to_value(cell.cuts()).unwrap();
        let back: Vec<Cut> = serde_json::from_value(value).unwrap();
        assert_eq!(Cell::from_cuts(back), cell);
    }

    #[test]
    fn test_dict_unknown_type() {
        let err = cut_from_dict(&json!({"type": "fuzzy", "dimension": "date"}), None).unwrap_err();
        assert_eq!(err, CellError::UnknownCutType("fuzzy".into()));
    }
}
