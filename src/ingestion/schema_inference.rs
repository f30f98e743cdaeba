//! Schema Inference - Deterministic column typing for schema-on-read JSON records

use crate::error::Result;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Inferred type of one column across all records
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferredType {
    /// Only nulls seen so far
    Null,
    Boolean,
    Int,
    Float,
    Text,
}

impl InferredType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => InferredType::Null,
            Value::Bool(_) => InferredType::Boolean,
            Value::Number(n) => {
                if n.is_i64() {
                    InferredType::Int
                } else {
                    InferredType::Float
                }
            }
            Value::String(_) | Value::Array(_) | Value::Object(_) => InferredType::Text,
        }
    }

    fn merge(self, other: InferredType) -> InferredType {
        match (self, other) {
            (a, b) if a == b => a,
            (InferredType::Null, b) => b,
            (a, InferredType::Null) => a,
            (InferredType::Int, InferredType::Float) | (InferredType::Float, InferredType::Int) => {
                InferredType::Float
            }
            _ => InferredType::Text,
        }
    }
}

#[derive(Clone, Debug)]
pub struct InferredColumn {
    pub name: String,
    pub data_type: InferredType,
}

/// Union of all keys seen across a batch of records, in first-seen order
#[derive(Clone, Debug, Default)]
pub struct InferredSchema {
    pub columns: Vec<InferredColumn>,
}

pub struct SchemaInference;

impl SchemaInference {
    pub fn infer_schema(records: &[Map<String, Value>]) -> InferredSchema {
        let mut columns: Vec<InferredColumn> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            for (key, value) in record {
                let observed = InferredType::of(value);
                match index.get(key) {
                    Some(&i) => {
                        columns[i].data_type = columns[i].data_type.merge(observed);
                    }
                    None => {
                        index.insert(key.clone(), columns.len());
                        columns.push(InferredColumn {
                            name: key.clone(),
                            data_type: observed,
                        });
                    }
                }
            }
        }

        InferredSchema { columns }
    }

    /// Build a table from records; keys a record lacks become nulls.
    pub fn to_dataframe(records: &[Map<String, Value>]) -> Result<DataFrame> {
        let schema = Self::infer_schema(records);

        let series: Vec<Series> = schema.columns.iter()
            .map(|column| Self::build_series(column, records))
            .collect();

        Ok(DataFrame::new(series)?)
    }

    fn build_series(column: &InferredColumn, records: &[Map<String, Value>]) -> Series {
        let name = column.name.as_str();
        let values = records.iter().map(|r| r.get(name).filter(|v| !v.is_null()));

        match column.data_type {
            InferredType::Null => Series::new_null(name, records.len()),
            InferredType::Boolean => {
                let data: Vec<Option<bool>> = values.map(|v| v.and_then(Value::as_bool)).collect();
                Series::new(name, data)
            }
            InferredType::Int => {
                let data: Vec<Option<i64>> = values.map(|v| v.and_then(Value::as_i64)).collect();
                Series::new(name, data)
            }
            InferredType::Float => {
                let data: Vec<Option<f64>> = values.map(|v| v.and_then(Value::as_f64)).collect();
                Series::new(name, data)
            }
            InferredType::Text => {
                let data: Vec<Option<String>> = values.map(|v| v.map(value_to_text)).collect();
                Series::new(name, data)
            }
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
