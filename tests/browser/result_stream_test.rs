#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use dicer::browser::{
        Cursor, ExecutionError, ExecutionResult, MemoryCursor, Record, ResultStream,
        WindowCalculator, WindowFunction,
    };
    use serde_json::{json, Value};

    /// Counts fetches and fails on the fetch numbered `fail_at`.
    struct FlakyCursor {
        rows: Vec<Vec<Value>>,
        fetches: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
        fail_at: Option<usize>,
    }

    impl Cursor for FlakyCursor {
        fn fetch_many(&mut self, n: usize) -> ExecutionResult<Vec<Vec<Value>>> {
            let fetch = self.fetches.fetch_add(1, Ordering::SeqCst);
            if Some(fetch) == self.fail_at {
                return Err(ExecutionError::Cursor("connection reset".into()));
            }
            let n = n.min(self.rows.len());
            Ok(self.rows.drain(..n).collect())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn rows(n: i64) -> Vec<Vec<Value>> {
        (0..n).map(|i| vec![json!(i), json!(i * 2)]).collect()
    }

    fn labels() -> Vec<String> {
        vec!["month".into(), "amount_sum".into()]
    }

    #[test]
    fn test_rows_are_fetched_lazily_in_batches() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let cursor = FlakyCursor {
            rows: rows(7),
            fetches: fetches.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            fail_at: None,
        };
        let mut stream = ResultStream::new(Box::new(cursor), labels(), 3);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        stream.next().unwrap().unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let rest: Vec<Record> = stream.by_ref().collect::<ExecutionResult<_>>().unwrap();
        assert_eq!(rest.len(), 6);
        // Three full batches plus the empty fetch that ends the stream.
        assert_eq!(fetches.load(Ordering::SeqCst), 4);
        assert!(stream.is_closed());
    }

    #[test]
    fn test_records_are_keyed_by_label() {
        let stream = ResultStream::new(Box::new(MemoryCursor::new(rows(2))), labels(), 100);
        assert_eq!(stream.labels(), labels().as_slice());

        let records: Vec<Record> = stream.collect::<ExecutionResult<_>>().unwrap();
        assert_eq!(Value::Object(records[1].clone()), json!({"month": 1, "amount_sum": 2}));
    }

    #[test]
    fn test_drop_closes_cursor() {
        let cursor = MemoryCursor::new(rows(10));
        let closed = cursor.close_flag();
        {
            let mut stream = ResultStream::new(Box::new(cursor), labels(), 2);
            stream.next();
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cursor_error_is_passed_through_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let cursor = FlakyCursor {
            rows: rows(4),
            fetches: Arc::new(AtomicUsize::new(0)),
            closed: closed.clone(),
            fail_at: Some(1),
        };
        let mut stream = ResultStream::new(Box::new(cursor), labels(), 2);

        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_ok());
        assert_eq!(
            stream.next().unwrap().unwrap_err(),
            ExecutionError::Cursor("connection reset".into())
        );
        assert!(closed.load(Ordering::SeqCst));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_exclusion_happens_before_calculators() {
        let cursor = MemoryCursor::new(vec![
            vec![json!(1), json!(5)],
            vec![json!(2), Value::Null],
            vec![json!(3), json!(7)],
        ]);
        let calculator = WindowCalculator::new(
            WindowFunction::SimpleMovingAverage,
            vec![],
            "amount_sum",
            "amount_sma",
            2,
        );
        let records: Vec<Record> = ResultStream::new(Box::new(cursor), labels(), 10)
            .with_exclude_if_null(vec!["amount_sum".into()])
            .with_calculators(vec![calculator])
            .collect::<ExecutionResult<_>>()
            .unwrap();

        let averages: Vec<&Value> = records.iter().map(|r| &r["amount_sma"]).collect();
        assert_eq!(averages, vec![&json!(5.0), &json!(6.0)]);
    }
}
