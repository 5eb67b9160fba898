use std::sync::Arc;

use arrow::{
    array::{Int32Array, RecordBatch},
    datatypes::DataType,
};
use lakeport_catalog::{Catalog, Identifier, MemoryCatalog, Options, TableSchema};

/// A catalog holding `db.t(a INT, dt STRING)` partitioned by `dt`, with one
/// append snapshot per entry of `values`.
pub fn catalog_with_table(warehouse: &str, values: &[i32]) -> (Arc<MemoryCatalog>, Identifier) {
    let catalog = Arc::new(MemoryCatalog::new(warehouse, Options::new()));
    let identifier = Identifier::new("db", "t");
    catalog.create_database("db", false).unwrap();
    let schema = TableSchema::builder()
        .column("a", DataType::Int32, true, None)
        .column("dt", DataType::Utf8, true, None)
        .partition_keys(vec!["dt".to_string()])
        .build()
        .unwrap();
    catalog.create_table(&identifier, schema, false).unwrap();
    for value in values {
        let batch = RecordBatch::try_new(
            catalog.get_table(&identifier).unwrap().schema().arrow_schema(),
            vec![
                Arc::new(Int32Array::from(vec![*value])),
                Arc::new(arrow::array::StringArray::from(vec!["2024-01-01"])),
            ],
        )
        .unwrap();
        catalog.write(&identifier, vec![batch]).unwrap();
    }
    (catalog, identifier)
}
