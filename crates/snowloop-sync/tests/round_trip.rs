//! Export a table, annotate the uploaded item, write the response back.

use std::sync::Arc;

use serde_json::json;

use snowloop::models::{Annotation, Row};
use snowloop::platform::{DocumentPlatform, InMemoryPlatform};
use snowloop::warehouse::{
    ConnectionProvider, InMemoryWarehouse, SqlValue, WarehouseCoordinates, CLIENT_APPLICATION,
};
use snowloop_sync::{ResponseWriteback, TableExporter};

fn coords() -> WarehouseCoordinates {
    WarehouseCoordinates {
        account: "xy12345".into(),
        user: "LOADER".into(),
        warehouse: "COMPUTE_WH".into(),
        database: "ANALYTICS".into(),
        schema: "PUBLIC".into(),
    }
}

#[tokio::test]
async fn test_export_then_writeback() {
    let warehouse = InMemoryWarehouse::new();
    warehouse
        .create_prompt_table("QA", &[Row::new(42, "hi")])
        .await;
    let platform = InMemoryPlatform::new();
    platform.add_dataset("ds-qa", "qa").await;

    let provider = ConnectionProvider::new(Arc::new(warehouse.clone()));
    let exporter = TableExporter::new(provider.clone(), Arc::new(platform.clone()));
    let writeback = ResponseWriteback::new(provider, Arc::new(platform.clone()));

    let items = exporter
        .table_to_dataset(&coords(), "QA", "ds-qa")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.name, "42.json");

    let document = platform.load_prompt_document(item).await.unwrap();
    let key = document.first_prompt_key().unwrap().clone();
    assert_eq!(document.prompts()[0].content[0].value.as_deref(), Some("hi"));

    platform
        .add_annotation(
            &item.id,
            Annotation::new("ann-1", json!("hello")).best(true).for_prompt(key),
        )
        .await
        .unwrap();

    let updated = writeback
        .update_table(item, &coords(), "QA")
        .await
        .unwrap();
    assert_eq!(updated.as_ref(), Some(item));

    let statements = warehouse.statements().await;
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].sql, "UPDATE QA SET RESPONSE = ? WHERE ID = ?");
    assert_eq!(
        statements[0].params,
        vec![SqlValue::Text("hello".into()), SqlValue::Integer(42)]
    );
    assert!(statements[0].committed);

    let rows = warehouse.table("QA").await.unwrap().to_rows().unwrap();
    assert_eq!(rows[0].response.as_deref(), Some("hello"));

    let requests = warehouse.connect_requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.application == CLIENT_APPLICATION));
    assert_eq!(warehouse.sessions_closed().await, 2);
}

#[tokio::test]
async fn test_re_export_replaces_items() {
    let warehouse = InMemoryWarehouse::new();
    warehouse
        .create_prompt_table("QA", &[Row::new(1, "a"), Row::new(2, "b")])
        .await;
    let platform = InMemoryPlatform::new();
    platform.add_dataset("ds-qa", "qa").await;
    let exporter = TableExporter::new(
        ConnectionProvider::new(Arc::new(warehouse.clone())),
        Arc::new(platform.clone()),
    );

    let first = exporter
        .table_to_dataset(&coords(), "QA", "ds-qa")
        .await
        .unwrap()
        .unwrap();
    let second = exporter
        .table_to_dataset(&coords(), "QA", "ds-qa")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(platform.items("ds-qa").await.len(), 2);
    assert_eq!(platform.upload_calls().await, 2);
}
