use std::sync::Arc;

use arrow::{
    array::{RecordBatch, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
};
use datafusion::{
    common::{plan_err, DFSchema},
    error::Result,
    execution::context::ExecutionProps,
    optimizer::simplify_expressions::{ExprSimplifier, SimplifyContext},
    prelude::Expr,
    scalar::ScalarValue,
};

pub const RESULT_COLUMN: &str = "result";

/// Folds `expr` to a constant and casts it to `data_type`.
pub fn evaluate_constant(
    props: &ExecutionProps,
    parameter: &str,
    expr: Expr,
    data_type: &DataType,
) -> Result<ScalarValue> {
    let context = SimplifyContext::new(props).with_schema(Arc::new(DFSchema::empty()));
    let simplified = ExprSimplifier::new(context).simplify(expr)?;
    match simplified {
        Expr::Literal(value) => value.cast_to(data_type),
        other => plan_err!(
            "Argument {parameter} must be a constant expression, got {other}"
        ),
    }
}

pub fn result_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new(
        RESULT_COLUMN,
        DataType::Utf8,
        false,
    )]))
}

/// One row per procedure message.
pub fn result_batch(rows: Vec<String>) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        result_schema(),
        vec![Arc::new(StringArray::from(rows))],
    )?)
}

#[cfg(test)]
mod tests {
    use datafusion::prelude::{col, lit};

    use super::*;

    #[test]
    fn test_evaluate_constant() {
        let props = ExecutionProps::new();
        let value = evaluate_constant(&props, "n", lit(1i64) + lit(2i64), &DataType::Int64).unwrap();
        assert_eq!(value, ScalarValue::Int64(Some(3)));

        let value = evaluate_constant(&props, "v", lit(10i64), &DataType::Utf8).unwrap();
        assert_eq!(value, ScalarValue::Utf8(Some("10".to_string())));

        let value =
            evaluate_constant(&props, "p", lit(ScalarValue::Utf8(None)), &DataType::Utf8).unwrap();
        assert!(value.is_null());

        assert!(evaluate_constant(&props, "c", col("a"), &DataType::Utf8).is_err());
    }

    #[test]
    fn test_result_batch() {
        let batch = result_batch(vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), RESULT_COLUMN);
        assert!(!batch.schema().field(0).is_nullable());
    }
}
