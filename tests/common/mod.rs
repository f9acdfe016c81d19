//! Shared fixtures: a small sales cube and a replaying executor.

#![allow(dead_code)]

use std::sync::Mutex;

use dicer::browser::{Cursor, ExecutionResult, Executor, MemoryCursor};
use dicer::model::{Attribute, Cardinality, Cube, CubeJoin, Dimension, Level, MeasureAggregate};
use dicer::sql::{Dialect, Query};
use serde_json::Value;

/// `sales` fact with date (year/month/day), product (category/name),
/// a flat `store` on the fact table and a high-cardinality customer.
pub fn sales_cube() -> Cube {
    Cube::new("sales")
        .with_dimension(Dimension::new(
            "date",
            vec![
                Level::new("year"),
                Level::new("month").with_aggregation_units(3),
                Level::new("day"),
            ],
        ))
        .with_dimension(Dimension::new(
            "product",
            vec![
                Level::new("category"),
                Level::new("name").with_attributes(&["name", "label"]),
            ],
        ))
        .with_dimension(Dimension::flat("store"))
        .with_dimension(
            Dimension::new("customer", vec![Level::new("customer_id")])
                .with_cardinality(Cardinality::High),
        )
        .with_measure(Attribute::new("amount"))
        .with_measure(Attribute::new("quantity"))
        .with_aggregate(MeasureAggregate::of("amount", "sum"))
        .with_aggregate(MeasureAggregate::of("quantity", "sum"))
        .with_aggregate(MeasureAggregate::new("record_count").with_function("count"))
        .with_aggregate(
            MeasureAggregate::new("amount_sms")
                .with_function("sms")
                .with_measure("amount_sum"),
        )
        .with_join(CubeJoin::new("date_id", "date.id").unwrap())
        .with_join(CubeJoin::new("product_id", "product.id").unwrap())
        .with_join(CubeJoin::new("customer_id", "customer.id").unwrap())
}

/// A statement the executor received.
#[derive(Debug, Clone)]
pub struct Executed {
    pub label: String,
    pub sql: String,
    pub labels: Vec<String>,
}

/// Answers each label with canned rows and records every statement.
#[derive(Default)]
pub struct ReplayExecutor {
    responses: Vec<(String, Vec<Vec<Value>>)>,
    executed: Mutex<Vec<Executed>>,
}

impl ReplayExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, label: &str, rows: Vec<Vec<Value>>) -> Self {
        self.responses.push((label.to_string(), rows));
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().unwrap().clone()
    }

    pub fn statement(&self, label: &str) -> Option<Executed> {
        self.executed().into_iter().find(|e| e.label == label)
    }
}

impl Executor for ReplayExecutor {
    fn execute(&self, query: &Query, label: &str) -> ExecutionResult<Box<dyn Cursor>> {
        self.executed.lock().unwrap().push(Executed {
            label: label.to_string(),
            sql: query.to_sql(Dialect::DuckDb),
            labels: query.labels(),
        });
        let rows = self
            .responses
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(Box::new(MemoryCursor::new(rows)))
    }
}
