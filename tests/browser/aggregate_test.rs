#[path = "../common/mod.rs"]
mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::common::{sales_cube, ReplayExecutor};
    use dicer::browser::{AggregateQuery, CompileError, OrderItem, SqlBrowser};
    use dicer::cell::Cell;
    use dicer::config::Settings;
    use dicer::diagnostics::{CollectingSink, DiagnosticCode};
    use dicer::drilldown::{DrilldownRequest, SPLIT_DIMENSION_NAME};
    use dicer::model::{Attribute, Cube, MeasureAggregate, ModelError};
    use dicer::sql::{lit_str, SortDir};
    use serde_json::{json, Value};

    fn browser_with(executor: Arc<ReplayExecutor>, settings: Settings) -> SqlBrowser {
        SqlBrowser::new(sales_cube(), executor, settings).unwrap()
    }

    fn labels(executor: &ReplayExecutor) -> Vec<String> {
        executor.executed().into_iter().map(|e| e.label).collect()
    }

    #[test]
    fn test_summary_drilldown_and_count() {
        let executor = Arc::new(
            ReplayExecutor::new()
                .respond("aggregate_summary", vec![vec![json!(30), json!(3)]])
                .respond(
                    "aggregate",
                    vec![
                        vec![json!("2010"), json!("1"), json!(10), json!(1)],
                        vec![json!("2010"), json!("2"), json!(20), json!(2)],
                    ],
                )
                .respond("aggregate_count", vec![vec![json!(2)]]),
        );
        let browser = browser_with(executor.clone(), Settings::default());
        let cell = browser.parse_cell("date:2010").unwrap();

        let query = AggregateQuery::new(cell)
            .with_aggregates(&["amount_sum", "record_count"])
            .with_drilldown(DrilldownRequest::new("date"));
        let mut result = browser.aggregate(&query).unwrap();

        assert_eq!(
            labels(&executor),
            vec!["aggregate_summary", "aggregate", "aggregate_count"]
        );

        insta::assert_snapshot!(executor.statement("aggregate").unwrap().sql, @r#"
        SELECT
          "date"."year" AS "date.year",
          "date"."month" AS "date.month",
          SUM("sales"."amount") AS "amount_sum",
          COUNT(*) AS "record_count"
        FROM "sales"
        INNER JOIN "date" ON "sales"."date_id" = "date"."id"
        WHERE "date"."year" = '2010'
        GROUP BY "date"."year", "date"."month"
        ORDER BY "date"."year" ASC, "date"."month" ASC
        "#);

        let summary = result.summary.clone().unwrap();
        assert_eq!(summary["amount_sum"], json!(30));
        assert_eq!(result.total_cell_count, Some(2));
        assert_eq!(result.levels["date"], vec!["year", "month"]);
        assert_eq!(
            result.labels,
            vec!["date.year", "date.month", "amount_sum", "record_count"]
        );

        let cells = result.collect_cells().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1]["date.month"], json!("2"));
        assert_eq!(cells[1]["amount_sum"], json!(20));
    }

    #[test]
    fn test_summary_can_be_skipped() {
        let executor = Arc::new(ReplayExecutor::new());
        let settings = Settings {
            include_summary: false,
            include_cell_count: false,
            ..Settings::default()
        };
        let browser = browser_with(executor.clone(), settings);

        let query = AggregateQuery::new(Cell::new()).with_drilldown(DrilldownRequest::new("store"));
        let result = browser.aggregate(&query).unwrap();

        assert!(result.summary.is_none());
        assert!(result.total_cell_count.is_none());
        assert_eq!(labels(&executor), vec!["aggregate"]);
    }

    #[test]
    fn test_unbounded_drilldown_is_rejected_before_execution() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());

        let query =
            AggregateQuery::new(Cell::new()).with_drilldown(DrilldownRequest::new("customer"));
        let err = browser.aggregate(&query).unwrap_err();

        assert_eq!(
            err,
            CompileError::UnboundedDrilldown {
                levels: vec!["customer_id".into()]
            }
        );
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_paginated_drilldown_is_allowed() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());

        let query = AggregateQuery::new(Cell::new())
            .with_aggregates(&["amount_sum"])
            .with_drilldown(DrilldownRequest::new("customer"))
            .with_page(2, 10);
        browser.aggregate(&query).unwrap();

        let drilldown = executor.statement("aggregate").unwrap().sql;
        assert!(drilldown.ends_with("LIMIT 10 OFFSET 20"));

        let count = executor.statement("aggregate_count").unwrap().sql;
        assert!(count.starts_with("SELECT\n  COUNT(*) AS \"count\"\nFROM (\nSELECT"));
        assert!(count.ends_with(") AS \"__cells__\""));
        assert!(!count.contains("LIMIT"));
        assert!(!count.contains("ORDER BY"));
    }

    #[test]
    fn test_zero_page_size_does_not_bypass_cardinality_guard() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());

        let query = AggregateQuery::new(Cell::new())
            .with_drilldown(DrilldownRequest::new("customer"))
            .with_page(0, 0);
        assert!(matches!(
            browser.aggregate(&query).unwrap_err(),
            CompileError::UnboundedDrilldown { .. }
        ));
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_page_offset_overflow_is_rejected() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());

        let query = AggregateQuery::new(Cell::new())
            .with_aggregates(&["amount_sum"])
            .with_drilldown(DrilldownRequest::new("date").with_level("year"))
            .with_page(u64::MAX, 2);
        assert_eq!(
            browser.aggregate(&query).unwrap_err(),
            CompileError::PageOutOfRange {
                page: u64::MAX,
                page_size: 2
            }
        );
        assert!(!labels(&executor).contains(&"aggregate".to_string()));
    }

    #[test]
    fn test_cell_pinning_bounds_drilldown() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor, Settings::default());

        let cell = browser.parse_cell("customer:42").unwrap();
        let query = AggregateQuery::new(cell)
            .with_drilldown(DrilldownRequest::new("customer").with_level("customer_id"));
        assert!(browser.aggregate(&query).is_ok());
    }

    #[test]
    fn test_null_aggregates_are_excluded() {
        let rows = vec![
            vec![json!("1"), Value::Null, json!(5)],
            vec![json!("2"), json!(3), json!(4)],
        ];
        let query = AggregateQuery::new(Cell::new())
            .with_aggregates(&["amount_sum", "quantity_sum"])
            .with_drilldown(DrilldownRequest::new("store"));

        let executor = Arc::new(ReplayExecutor::new().respond("aggregate", rows.clone()));
        let mut result = browser_with(executor, Settings::default())
            .aggregate(&query)
            .unwrap();
        assert_eq!(result.exclude_if_null, vec!["amount_sum", "quantity_sum"]);
        let cells = result.collect_cells().unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0]["store"], json!("2"));

        let settings = Settings {
            exclude_null_aggregates: false,
            ..Settings::default()
        };
        let executor = Arc::new(ReplayExecutor::new().respond("aggregate", rows));
        let mut result = browser_with(executor, settings).aggregate(&query).unwrap();
        assert_eq!(result.collect_cells().unwrap().len(), 2);
    }

    #[test]
    fn test_moving_sum_over_series() {
        let rows = vec![
            vec![json!("2010"), json!("1"), json!("tea"), json!(1)],
            vec![json!("2010"), json!("2"), json!("tea"), json!(2)],
            vec![json!("2010"), json!("1"), json!("coffee"), json!(10)],
            vec![json!("2010"), json!("3"), json!("tea"), json!(3)],
            vec![json!("2010"), json!("4"), json!("tea"), json!(4)],
        ];
        let executor = Arc::new(ReplayExecutor::new().respond("aggregate", rows));
        let browser = browser_with(executor.clone(), Settings::default());

        let query = AggregateQuery::new(Cell::new())
            .with_aggregates(&["amount_sms"])
            .with_drilldown(DrilldownRequest::new("date").with_level("month"))
            .with_drilldown(DrilldownRequest::new("product").with_level("category"));
        let mut result = browser.aggregate(&query).unwrap();

        assert_eq!(result.calculators, vec!["amount_sms"]);
        // The source aggregate is selected even though only the calculator
        // was requested.
        assert_eq!(
            executor.statement("aggregate").unwrap().labels,
            vec!["date.year", "date.month", "product.category", "amount_sum"]
        );

        let sums: Vec<Value> = result
            .collect_cells()
            .unwrap()
            .into_iter()
            .map(|r| r["amount_sms"].clone())
            .collect();
        // Month is the series (window of 3); each category has its own window.
        assert_eq!(sums, vec![json!(1), json!(3), json!(10), json!(6), json!(9)]);
    }

    #[test]
    fn test_split_adds_flag_column() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());

        let split = browser.parse_cell("store:7").unwrap();
        let query = AggregateQuery::new(Cell::new())
            .with_aggregates(&["amount_sum"])
            .with_split(split);
        let result = browser.aggregate(&query).unwrap();

        assert_eq!(result.labels, vec![SPLIT_DIMENSION_NAME, "amount_sum"]);
        assert_eq!(
            result.levels[SPLIT_DIMENSION_NAME],
            vec![SPLIT_DIMENSION_NAME]
        );
        let sql = executor.statement("aggregate").unwrap().sql;
        assert!(sql.contains(r#"GROUP BY CASE WHEN "sales"."store" = '7' THEN true ELSE false END"#));
    }

    #[test]
    fn test_explicit_order_and_unknown_attribute() {
        let executor = Arc::new(ReplayExecutor::new());
        let sink = CollectingSink::new();
        let browser =
            browser_with(executor.clone(), Settings::default()).with_diagnostics(Arc::new(sink.clone()));

        let query = AggregateQuery::new(Cell::new())
            .with_aggregates(&["amount_sum"])
            .with_drilldown(DrilldownRequest::new("date").with_level("year"))
            .with_order(OrderItem::new("amount_sum").with_dir(SortDir::Desc))
            .with_order("nope:asc".parse().unwrap());
        browser.aggregate(&query).unwrap();

        let sql = executor.statement("aggregate").unwrap().sql;
        assert!(sql.contains(r#"ORDER BY SUM("sales"."amount") DESC, "date"."year" ASC"#));
        assert!(sink.has(DiagnosticCode::UnknownOrderAttribute));
    }

    #[test]
    fn test_aggregate_definition_errors() {
        let cube = Cube::new("sales")
            .with_measure(Attribute::new("amount"))
            .with_aggregate(MeasureAggregate::of("amount", "median"))
            .with_aggregate(MeasureAggregate::new("ratio").with_expression("amount / 2"))
            .with_aggregate(MeasureAggregate::new("bare"));
        let browser =
            SqlBrowser::new(cube, Arc::new(ReplayExecutor::new()), Settings::default()).unwrap();
        let aggregate = |name: &str| {
            browser.aggregate(&AggregateQuery::new(Cell::new()).with_aggregates(&[name]))
        };

        assert_eq!(
            aggregate("amount_median").unwrap_err(),
            CompileError::UnknownFunction {
                function: "median".into(),
                aggregate: "amount_median".into()
            }
        );
        assert_eq!(
            aggregate("ratio").unwrap_err(),
            CompileError::ExpressionNotSupported("ratio".into())
        );
        assert_eq!(
            aggregate("bare").unwrap_err(),
            CompileError::Model(ModelError::MissingAggregateDefinition("bare".into()))
        );
        assert!(matches!(
            aggregate("missing").unwrap_err(),
            CompileError::Model(ModelError::NoSuchAggregate { .. })
        ));
    }

    #[test]
    fn test_calculated_aggregate_with_unknown_source() {
        let cube = sales_cube().with_aggregate(MeasureAggregate::of("ghost", "sms"));
        let executor = Arc::new(ReplayExecutor::new());
        let browser = SqlBrowser::new(cube, executor.clone(), Settings::default()).unwrap();

        let err = browser
            .aggregate(
                &AggregateQuery::new(Cell::new()).with_aggregates(&["amount_sum", "ghost_sms"]),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Model(ModelError::NoSuchAggregate { ref aggregate, .. }) if aggregate == "ghost"
        ));
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_calculated_aggregate_of_calculated_source() {
        let cube = sales_cube().with_aggregate(
            MeasureAggregate::new("amount_sms_sms")
                .with_function("sms")
                .with_measure("amount_sms"),
        );
        let executor = Arc::new(ReplayExecutor::new());
        let browser = SqlBrowser::new(cube, executor.clone(), Settings::default()).unwrap();

        let err = browser
            .aggregate(&AggregateQuery::new(Cell::new()).with_aggregates(&["amount_sms_sms"]))
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::CalculatedSource {
                aggregate: "amount_sms_sms".into(),
                measure: "amount_sms".into()
            }
        );
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_drill_across_is_not_supported() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());
        let err = browser
            .aggregate(&AggregateQuery::new(Cell::new()).with_across("returns"))
            .unwrap_err();
        assert_eq!(err, CompileError::DrillAcrossNotSupported);
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_facts_stream() {
        let executor = Arc::new(ReplayExecutor::new().respond(
            "facts",
            vec![vec![json!(1), json!("2010"), json!(9.5)]],
        ));
        let browser = browser_with(executor.clone(), Settings::default());
        let cell = browser.parse_cell("store:7").unwrap();

        let fields = vec!["date.year".to_string(), "amount".to_string()];
        let records: Vec<_> = browser
            .facts(
                &cell,
                Some(fields.as_slice()),
                &[OrderItem::new("date.month")],
                Some(0),
                Some(2),
            )
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records[0]["__fact_key__"], json!(1));

        insta::assert_snapshot!(executor.statement("facts").unwrap().sql, @r#"
        SELECT
          "sales"."id" AS "__fact_key__",
          "date"."year" AS "date.year",
          "sales"."amount" AS "amount"
        FROM "sales"
        INNER JOIN "date" ON "sales"."date_id" = "date"."id"
        WHERE "sales"."store" = '7'
        ORDER BY "date"."month"
        LIMIT 2
        "#);
    }

    #[test]
    fn test_single_fact() {
        let executor = Arc::new(ReplayExecutor::new());
        let browser = browser_with(executor.clone(), Settings::default());
        assert!(browser.fact(lit_str("42")).unwrap().is_none());

        let statement = executor.statement("fact").unwrap();
        assert!(statement.sql.contains(r#"WHERE "sales"."id" = '42'"#));
        assert_eq!(statement.labels[0], "__fact_key__");

        let row: Vec<Value> = (0..statement.labels.len()).map(|i| json!(i)).collect();
        let executor = Arc::new(ReplayExecutor::new().respond("fact", vec![row]));
        let record = browser_with(executor, Settings::default())
            .fact(lit_str("0"))
            .unwrap()
            .unwrap();
        assert_eq!(record["__fact_key__"], json!(0));
        assert_eq!(record.len(), statement.labels.len());
    }
}
