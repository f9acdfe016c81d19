#[path = "../common/mod.rs"]
mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::common::{sales_cube, ReplayExecutor};
    use dicer::browser::{CompileError, SqlBrowser};
    use dicer::cell::{Cell, Cut};
    use dicer::config::Settings;
    use dicer::model::ModelError;
    use dicer::sql::{Dialect, Expr};

    fn browser() -> SqlBrowser {
        SqlBrowser::new(sales_cube(), Arc::new(ReplayExecutor::new()), Settings::default()).unwrap()
    }

    fn render(expr: Option<Expr>) -> String {
        expr.map(|e| e.to_sql(Dialect::DuckDb)).unwrap_or_default()
    }

    fn condition(browser: &SqlBrowser, cell: &str) -> String {
        let cell = browser.parse_cell(cell).unwrap();
        render(browser.compiler().condition_for_cell(&cell).unwrap())
    }

    #[test]
    fn test_empty_cell_has_no_condition() {
        let browser = browser();
        assert!(browser
            .compiler()
            .condition_for_cell(&Cell::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_point_condition_uses_key_columns() {
        let browser = browser();
        assert_eq!(
            condition(&browser, "date:2010,5"),
            r#""date"."year" = '2010' AND "date"."month" = '5'"#
        );
    }

    #[test]
    fn test_inverted_point_condition() {
        let browser = browser();
        assert_eq!(
            condition(&browser, "!date:2010"),
            r#"NOT ("date"."year" = '2010')"#
        );
    }

    #[test]
    fn test_flat_dimension_lives_on_fact() {
        let browser = browser();
        assert_eq!(condition(&browser, "store:7"), r#""sales"."store" = '7'"#);
    }

    #[test]
    fn test_set_condition_is_disjunction() {
        let browser = browser();
        insta::assert_snapshot!(
            condition(&browser, "product:tea;coffee,arabica"),
            @r#""product"."category" = 'tea' OR ("product"."category" = 'coffee' AND "product"."name" = 'arabica')"#
        );
    }

    #[test]
    fn test_set_inside_cell_is_parenthesized() {
        let browser = browser();
        insta::assert_snapshot!(
            condition(&browser, "store:7|date:2010;2011"),
            @r#""sales"."store" = '7' AND ("date"."year" = '2010' OR "date"."year" = '2011')"#
        );
    }

    #[test]
    fn test_range_condition() {
        let browser = browser();
        insta::assert_snapshot!(
            condition(&browser, "date:2010,5-2011"),
            @r#"(("date"."year" = '2010' AND "date"."month" >= '5') OR ("date"."year" > '2010')) AND ("date"."year" <= '2011')"#
        );
    }

    #[test]
    fn test_open_range_condition() {
        let browser = browser();
        assert_eq!(
            condition(&browser, "date:-2011"),
            r#""date"."year" <= '2011'"#
        );
        assert_eq!(
            condition(&browser, "!date:2010-"),
            r#"NOT ("date"."year" >= '2010')"#
        );
    }

    #[test]
    fn test_member_values_are_string_literals() {
        let browser = browser();
        assert_eq!(
            condition(&browser, "store:O'Brien"),
            r#""sales"."store" = 'O''Brien'"#
        );
    }

    #[test]
    fn test_split_column() {
        let browser = browser();
        let split = browser.parse_cell("store:7").unwrap();
        let column = browser.compiler().split_column(&split).unwrap();
        assert_eq!(
            column.to_sql(Dialect::DuckDb),
            r#"CASE WHEN "sales"."store" = '7' THEN true ELSE false END"#
        );
    }

    #[test]
    fn test_path_deeper_than_hierarchy() {
        let browser = browser();
        let cell = Cell::from_cuts(vec![Cut::point("store", &["1", "2"])]);
        let err = browser.compiler().condition_for_cell(&cell).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Model(ModelError::DepthOutOfRange { .. })
        ));
    }
}
