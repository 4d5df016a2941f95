//! Storage Integration Tests.
//!
//! These tests drive the in-memory backend through the `RegistryStore` trait
//! object, the same way the loaders and query handlers consume storage.

use std::sync::Arc;

use prospecta_storage::{
    ActivityCode, Company, Establishment, MemoryRegistryStore, Pagination, Partner,
    ProspectFilter, RegistryStore,
};

fn create_memory_store() -> Arc<MemoryRegistryStore> {
    let store = MemoryRegistryStore::new_shared();

    for i in 0..5_i64 {
        let base_id = format!("1000000{i}");
        let mut company = Company::new(base_id.clone(), format!("Empresa {i}"));
        company.share_capital = (i as f64) * 1_000.0;
        store.insert_company(company);

        let mut est = Establishment::new(i + 1, format!("{base_id}000100"), base_id.clone());
        est.head_office_flag = "1".to_string();
        est.state = if i % 2 == 0 { "SP" } else { "MG" }.to_string();
        store.insert_establishment(est);

        store.insert_partner(Partner::new(base_id, format!("Socio {i}")));
    }
    store.insert_activity_code(ActivityCode::new("6201501", "Desenvolvimento de software"));

    store
}

/// Helper function to run the bulk-fetch contract against any RegistryStore.
async fn run_bulk_fetch_test(store: &dyn RegistryStore) {
    let keys: Vec<String> = vec!["10000000", "10000003", "19999999"]
        .into_iter()
        .map(String::from)
        .collect();

    let companies = store.fetch_companies(&keys).await.unwrap();
    assert_eq!(companies.len(), 2);
    assert_eq!(companies["10000003"].legal_name, "Empresa 3");

    let partners = store.fetch_partners(&keys).await.unwrap();
    assert_eq!(partners.len(), 2);
    assert!(!partners.contains_key("19999999"));

    let codes = store
        .fetch_activity_codes(&["6201501".to_string(), "0000000".to_string()])
        .await
        .unwrap();
    assert_eq!(codes.len(), 1);
}

#[tokio::test]
async fn test_memory_store_bulk_fetch_contract() {
    let store = create_memory_store();
    run_bulk_fetch_test(store.as_ref()).await;
}

#[tokio::test]
async fn test_memory_store_is_usable_as_trait_object() {
    let store: Arc<dyn RegistryStore> = create_memory_store();

    let company = store.get_company("10000001").await.unwrap();
    assert_eq!(company.map(|c| c.legal_name), Some("Empresa 1".to_string()));
    assert!(store.get_company("19999999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_store_filtered_search_with_pagination() {
    let store = create_memory_store();
    let filter = ProspectFilter {
        state: Some("SP".to_string()),
        ..Default::default()
    };

    let all = store
        .find_establishments(&filter, &Pagination::default())
        .await
        .unwrap();
    let cnpjs: Vec<&str> = all.iter().map(|e| e.cnpj.as_str()).collect();
    assert_eq!(
        cnpjs,
        vec!["10000000000100", "10000002000100", "10000004000100"]
    );

    let page = store
        .find_establishments(&filter, &Pagination::new(Some(1), Some(1)))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].cnpj, "10000002000100");
}

#[tokio::test]
async fn test_memory_store_concurrent_reads() {
    let store = create_memory_store();

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let key = format!("1000000{i}");
            store.fetch_companies(&[key]).await.unwrap().len()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 1);
    }
}
