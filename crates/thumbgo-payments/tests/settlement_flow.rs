//! End-to-end settlement behaviour against the mock processor.

use std::sync::Arc;

use thumbgo_payments::{
    CheckoutInitiator, CheckoutUrls, CreditStore, MemoryCreditStore, MockProcessor,
    PackageCatalog, PaymentError, SettlementHandler, SettlementOutcome, UserAccount, signature,
};

const SECRET: &str = "whsec_flow_secret";

fn catalog() -> Arc<PackageCatalog> {
    Arc::new(PackageCatalog::parse("price_10:10,price_25:25,price_100:100").unwrap())
}

fn accounts() -> Arc<MemoryCreditStore> {
    Arc::new(
        MemoryCreditStore::from_accounts([
            UserAccount::new("user_1").with_customer("cus_1").with_credits(5),
            UserAccount::new("user_2").with_customer("cus_2").with_credits(40),
        ])
        .unwrap(),
    )
}

fn event(event_type: &str, object_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "id": format!("evt_{object_id}"),
        "object": "event",
        "type": event_type,
        "data": { "object": { "id": object_id } }
    }))
    .unwrap()
}

fn sign(payload: &[u8]) -> String {
    signature::sign(payload, SECRET, chrono::Utc::now().timestamp())
}

async fn balances(store: &MemoryCreditStore) -> (u64, u64) {
    let a = store.find_user_by_id(&"user_1".into()).await.unwrap().unwrap();
    let b = store.find_user_by_id(&"user_2".into()).await.unwrap().unwrap();
    (a.credits, b.credits)
}

#[tokio::test]
async fn unknown_customer_changes_no_balance() {
    let processor =
        Arc::new(MockProcessor::new().with_paid_session("cs_1", "price_25", "cus_unknown"));
    let store = accounts();
    let handler = SettlementHandler::new(processor, store.clone(), catalog(), Some(SECRET.into()));
    let payload = event("checkout.session.completed", "cs_1");

    let err = handler.handle(&payload, Some(&sign(&payload))).await.unwrap_err();

    assert!(matches!(err, PaymentError::UnknownCustomer(ref c) if c == "cus_unknown"));
    assert_eq!(balances(&store).await, (5, 40));
    assert_eq!(store.user_count().await, 2);
}

#[tokio::test]
async fn unrelated_event_is_acknowledged_without_side_effects() {
    let processor = Arc::new(MockProcessor::new());
    let store = accounts();
    let handler =
        SettlementHandler::new(processor.clone(), store.clone(), catalog(), Some(SECRET.into()));
    let payload = event("payment_method.updated", "pm_1");

    let outcome = handler.handle(&payload, Some(&sign(&payload))).await.unwrap();

    assert_eq!(
        outcome,
        SettlementOutcome::Ignored {
            event_type: "payment_method.updated".into()
        }
    );
    assert_eq!(processor.retrieve_calls(), 0);
    assert_eq!(balances(&store).await, (5, 40));
}

#[tokio::test]
async fn wrong_secret_never_reaches_enrichment() {
    let processor = Arc::new(MockProcessor::new().with_paid_session("cs_1", "price_10", "cus_1"));
    let store = accounts();
    let handler =
        SettlementHandler::new(processor.clone(), store.clone(), catalog(), Some(SECRET.into()));
    let payload = event("checkout.session.completed", "cs_1");
    let forged = signature::sign(&payload, "whsec_attacker", chrono::Utc::now().timestamp());

    let err = handler.handle(&payload, Some(&forged)).await.unwrap_err();

    assert!(matches!(err, PaymentError::AuthenticationFailed(_)));
    assert_eq!(processor.retrieve_calls(), 0);
    assert_eq!(balances(&store).await, (5, 40));
}

#[tokio::test]
async fn tampered_body_with_original_signature_is_rejected() {
    let processor = Arc::new(
        MockProcessor::new()
            .with_paid_session("cs_small", "price_10", "cus_1")
            .with_paid_session("cs_big", "price_100", "cus_1"),
    );
    let store = accounts();
    let handler =
        SettlementHandler::new(processor.clone(), store.clone(), catalog(), Some(SECRET.into()));

    let original = event("checkout.session.completed", "cs_small");
    let header = sign(&original);
    let tampered = event("checkout.session.completed", "cs_big");

    let err = handler.handle(&tampered, Some(&header)).await.unwrap_err();

    assert!(matches!(err, PaymentError::AuthenticationFailed(_)));
    assert_eq!(processor.retrieve_calls(), 0);
    assert_eq!(balances(&store).await, (5, 40));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_for_one_customer_all_land() {
    const N: usize = 40;

    let mut processor = MockProcessor::new();
    for i in 0..N {
        processor = processor.with_paid_session(&format!("cs_{i}"), "price_25", "cus_1");
    }
    let processor = Arc::new(processor);
    let store = accounts();
    let handler = Arc::new(SettlementHandler::new(
        processor,
        store.clone(),
        catalog(),
        Some(SECRET.into()),
    ));

    let tasks = (0..N).map(|i| {
        let handler = handler.clone();
        tokio::spawn(async move {
            let payload = event("checkout.session.completed", &format!("cs_{i}"));
            handler.handle(&payload, Some(&sign(&payload))).await
        })
    });

    for result in futures::future::join_all(tasks).await {
        let outcome = result.unwrap().unwrap();
        assert!(matches!(outcome, SettlementOutcome::Credited { credits_added: 25, .. }));
    }

    assert_eq!(balances(&store).await, (5 + 25 * N as u64, 40));
    assert_eq!(store.settled_sessions().await.len(), N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redelivery_credits_once() {
    let processor =
        Arc::new(MockProcessor::new().with_paid_session("cs_once", "price_100", "cus_2"));
    let store = accounts();
    let handler = Arc::new(SettlementHandler::new(
        processor,
        store.clone(),
        catalog(),
        Some(SECRET.into()),
    ));

    let tasks = (0..8).map(|_| {
        let handler = handler.clone();
        tokio::spawn(async move {
            let payload = event("checkout.session.completed", "cs_once");
            handler.handle(&payload, Some(&sign(&payload))).await
        })
    });

    let outcomes: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let credited = outcomes
        .iter()
        .filter(|o| matches!(o, SettlementOutcome::Credited { .. }))
        .count();
    assert_eq!(credited, 1);
    assert_eq!(balances(&store).await, (5, 140));
}

#[tokio::test]
async fn every_purchasable_pack_settles() {
    let catalog = catalog();
    let store = accounts();
    let checkout_processor = Arc::new(MockProcessor::new());
    let checkout = CheckoutInitiator::new(
        checkout_processor,
        store.clone(),
        catalog.clone(),
        CheckoutUrls::new("https://www.thumbgo.co/dashboard").unwrap(),
    );

    let mut expected = 5;
    for (i, package) in catalog.packages().into_iter().enumerate() {
        checkout
            .initiate(&package.price_id, Some(&"user_1".into()))
            .await
            .unwrap();

        let session_id = format!("cs_pack_{i}");
        let processor = Arc::new(
            MockProcessor::new().with_paid_session(&session_id, &package.price_id, "cus_1"),
        );
        let handler =
            SettlementHandler::new(processor, store.clone(), catalog.clone(), Some(SECRET.into()));
        let payload = event("checkout.session.completed", &session_id);

        let outcome = handler.handle(&payload, Some(&sign(&payload))).await.unwrap();
        expected += package.credits;
        assert!(package.credits > 0);
        assert!(matches!(
            outcome,
            SettlementOutcome::Credited { new_total, .. } if new_total == expected
        ));
    }
}
