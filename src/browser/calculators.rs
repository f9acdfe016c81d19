//! Post-aggregation calculators: record-level functions applied to result
//! rows after the database has aggregated them.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use super::result::Record;

/// Names of the calculators the compiler knows, lowercase.
pub const CALCULATOR_NAMES: &[&str] = &["sma", "wma", "sms"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunction {
    /// Simple moving average, rounded to 2 places.
    SimpleMovingAverage,
    /// Linearly weighted moving average, rounded to 4 places.
    WeightedMovingAverage,
    /// Moving sum.
    SimpleMovingSum,
}

impl WindowFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sma" => Some(Self::SimpleMovingAverage),
            "wma" => Some(Self::WeightedMovingAverage),
            "sms" => Some(Self::SimpleMovingSum),
            _ => None,
        }
    }

    fn apply(&self, values: &VecDeque<Value>) -> Value {
        let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        if numbers.is_empty() {
            return Value::Null;
        }

        match self {
            Self::SimpleMovingAverage => {
                let avg = numbers.iter().sum::<f64>() / numbers.len() as f64;
                float(round(avg, 2))
            }
            Self::WeightedMovingAverage => {
                let n = numbers.len() as f64;
                let denominator = n * (n + 1.0) / 2.0;
                let total: f64 = numbers
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i + 1) as f64 * v)
                    .sum();
                float(round(total / denominator, 4))
            }
            Self::SimpleMovingSum => {
                let ints: Option<Vec<i64>> = values.iter().map(Value::as_i64).collect();
                match ints {
                    Some(ints) => Value::from(ints.iter().sum::<i64>()),
                    None => float(numbers.iter().sum()),
                }
            }
        }
    }
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn float(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// A moving window over `source`, one window per distinct `key`, writing
/// into `target`.
///
/// Records without a source value are left untouched and do not enter the
/// window.
#[derive(Debug, Clone)]
pub struct WindowCalculator {
    function: WindowFunction,
    key: Vec<String>,
    source: String,
    target: String,
    window_size: usize,
    windows: HashMap<Vec<String>, VecDeque<Value>>,
}

impl WindowCalculator {
    pub fn new(
        function: WindowFunction,
        key: Vec<String>,
        source: &str,
        target: &str,
        window_size: usize,
    ) -> Self {
        Self {
            function,
            key,
            source: source.into(),
            target: target.into(),
            window_size: window_size.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn apply(&mut self, record: &mut Record) {
        let value = match record.get(&self.source) {
            Some(v) if !v.is_null() => v.clone(),
            _ => return,
        };

        let key: Vec<String> = self
            .key
            .iter()
            .map(|k| record.get(k).map(Value::to_string).unwrap_or_default())
            .collect();

        let window = self.windows.entry(key).or_default();
        window.push_back(value);
        if window.len() > self.window_size {
            window.pop_front();
        }

        let result = self.function.apply(window);
        record.insert(self.target.clone(), result);
    }
}
