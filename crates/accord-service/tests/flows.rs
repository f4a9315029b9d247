use accord_canonical::{ConsensusId, EndpointId, MessageHash, NegotiationId};
use accord_core::{
    compute_messages_hash, CoreError, CycleStatus, Ed25519Signer, Ed25519Verifier, ErrorKind,
    FixedClock, MessageBox, NegotiationStatus, Peer, PeerStatus, SignatureVerifier, Store,
    Transaction,
};
use accord_service::{Caller, Service, ServiceConfig};
use accord_store::{AndFilter, LatestFilter, MemoryStore, SignerFilter};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

fn make_service() -> Service<MemoryStore> {
    Service::new(MemoryStore::new(), ServiceConfig::default())
        .unwrap()
        .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()))
}

fn make_signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed([seed; 32])
}

fn caller(signer: &Ed25519Signer) -> Caller {
    Caller::with_key(signer.key_id(), signer.key_data())
}

fn request(operation: &str, resource: &str, data: Value) -> Value {
    json!({"data": data, "info": {"operation": operation, "resource": resource}})
}

fn body_of(request: &Value) -> Value {
    json!({"data": request["data"], "info": request["info"]})
}

fn authorized(mut request: Value, consensus: &ConsensusId) -> Value {
    request["by_consensus"] = json!({"consensus_id": consensus, "consensus_type": "structural"});
    request
}

fn contribution_request(negotiation: &NegotiationId, signer: &Ed25519Signer, text: &str) -> Value {
    request(
        "create",
        "contribution",
        json!({
            "negotiation": format!("/negotiations/{negotiation}/"),
            "text": text,
            "signature": signer.sign(text.as_bytes()),
            "signer_key_id": signer.key_id(),
        }),
    )
}

/// Runs a negotiation in which every signer first posts a draft, then the
/// accepted text, so the seal carries all their signings.
fn seal(service: &Service<MemoryStore>, signers: &[&Ed25519Signer], body: Value, meta: Value) -> ConsensusId {
    let negotiation = service
        .create_negotiation(&caller(signers[0]), request("create", "negotiation", json!({})))
        .unwrap();
    let canonicalizer = service.canonicalizer();
    let draft = canonicalizer
        .canonical_text(&json!({"body": body, "meta": {"accept": false}}))
        .unwrap();
    let accepted = canonicalizer
        .canonical_text(&json!({"body": body, "meta": meta}))
        .unwrap();
    for text in [&draft, &accepted] {
        for signer in signers {
            service
                .create_contribution(&caller(signer), contribution_request(&negotiation.id, signer, text))
                .unwrap();
        }
    }
    let sealed = service.retrieve_negotiation(&negotiation.id).unwrap();
    assert_eq!(sealed.status, NegotiationStatus::Done);
    sealed.consensus.unwrap()
}

fn approve(service: &Service<MemoryStore>, signers: &[&Ed25519Signer], request: Value) -> Value {
    let consensus = seal(service, signers, body_of(&request), json!({"accept": true}));
    authorized(request, &consensus)
}

fn peer_request(peer: &Ed25519Signer, owners: &[&Ed25519Signer]) -> Value {
    let owners: Vec<Value> = owners
        .iter()
        .map(|o| json!({"owner_key_id": o.key_id()}))
        .collect();
    request(
        "create",
        "peer",
        json!({
            "peer_id": peer.key_id(),
            "key_data": peer.key_data(),
            "status": "READY",
            "owners": owners,
        }),
    )
}

fn endpoint_request(endpoint: &str, peer: &Ed25519Signer, size_min: u32, size_max: u32) -> Value {
    request(
        "create",
        "endpoint",
        json!({
            "endpoint_id": endpoint,
            "peer_id": peer.key_id(),
            "status": "OPEN",
            "size_min": size_min,
            "size_max": size_max,
        }),
    )
}

fn update_request(endpoint: &str, on_last: &ConsensusId, status: &str, hashes: &[MessageHash]) -> Value {
    let hashes: Vec<Value> = hashes.iter().map(|h| json!({"hash": h})).collect();
    json!({
        "data": {"status": status, "message_hashes": hashes},
        "info": {
            "operation": "partial_update",
            "resource": "endpoint",
            "id": endpoint,
            "on_last_consensus_id": on_last,
        },
    })
}

fn message_request(endpoint: &str, message_box: &str, text: &str) -> Value {
    request(
        "create",
        "message",
        json!({
            "endpoint_id": endpoint,
            "box": message_box,
            "sender": "alice",
            "recipient": "mixnet",
            "text": text,
        }),
    )
}

/// Registers a self-governed peer and an endpoint for it.
fn make_endpoint(service: &Service<MemoryStore>, peer: &Ed25519Signer, endpoint: &str, size_min: u32, size_max: u32) -> ConsensusId {
    let peer_req = approve(service, &[peer], peer_request(peer, &[]));
    service.create_peer(&caller(peer), peer_req).unwrap();
    let endpoint_req = approve(service, &[peer], endpoint_request(endpoint, peer, size_min, size_max));
    service
        .create_endpoint(&caller(peer), endpoint_req)
        .unwrap()
        .last_consensus_id
        .unwrap()
}

#[test]
fn test_self_governed_peer_creation() {
    let service = make_service();
    let alice = make_signer(1);
    let req = approve(&service, &[&alice], peer_request(&alice, &[]));

    let peer = service.create_peer(&caller(&alice), req.clone()).unwrap();
    assert_eq!(peer.peer_id, alice.key_id());
    assert_eq!(peer.status, PeerStatus::Ready);
    assert!(peer.last_consensus_id.is_some());
    assert_eq!(service.retrieve_peer(&alice.key_id()).unwrap(), peer);

    // Key now registered: signer recovered without presented key material.
    let verification = service
        .verifier()
        .verify(b"payload", &alice.sign(b"payload"), None)
        .unwrap();
    assert_eq!(verification.signer, Some(alice.key_id()));

    let err = service.create_peer(&caller(&alice), req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_peer_creation_by_someone_else_is_unauthorized() {
    let service = make_service();
    let (alice, mallory) = (make_signer(1), make_signer(2));
    let req = approve(&service, &[&mallory], peer_request(&alice, &[]));
    let err = service.create_peer(&caller(&mallory), req).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
}

#[test]
fn test_owned_peer_requires_every_owner_signature() {
    let service = make_service();
    let (peer, x, y) = (make_signer(3), make_signer(4), make_signer(5));

    let only_x = approve(&service, &[&x], peer_request(&peer, &[&x, &y]));
    let err = service.create_peer(&caller(&x), only_x).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let both = approve(&service, &[&x, &y], peer_request(&peer, &[&x, &y]));
    let err = service.create_peer(&caller(&peer), both.clone()).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)), "non-owner requester");

    let created = service.create_peer(&caller(&y), both).unwrap();
    assert_eq!(created.owners, vec![x.key_id(), y.key_id()]);
}

#[test]
fn test_consensus_for_a_different_body_conflicts() {
    let service = make_service();
    let alice = make_signer(6);
    let approved = approve(&service, &[&alice], peer_request(&alice, &[]));

    let mut tampered = peer_request(&alice, &[]);
    tampered["data"]["key_data"] = json!(make_signer(7).key_data());
    tampered["by_consensus"] = approved["by_consensus"].clone();
    let err = service.create_peer(&caller(&alice), tampered).unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
fn test_envelope_rules() {
    let service = make_service();
    let alice = make_signer(8);

    let err = service
        .create_peer(&caller(&alice), peer_request(&alice, &[]))
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)), "missing by_consensus");

    let mut wrong_tag = approve(&service, &[&alice], peer_request(&alice, &[]));
    wrong_tag["info"]["resource"] = json!("endpoint");
    let err = service.create_peer(&caller(&alice), wrong_tag).unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let mut bad_status = peer_request(&alice, &[]);
    bad_status["data"]["status"] = json!("DELETED");
    let err = service.create_peer(&caller(&alice), bad_status).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_endpoint_creation_checks() {
    let service = make_service();
    let alice = make_signer(9);

    let unknown_peer = approve(&service, &[&alice], endpoint_request("mixnet-0", &alice, 1, 2));
    let err = service.create_endpoint(&caller(&alice), unknown_peer).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let inverted = endpoint_request("mixnet-0", &alice, 3, 2);
    let err = service.create_endpoint(&caller(&alice), inverted).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    make_endpoint(&service, &alice, "mixnet-0", 1, 2);
    let duplicate = approve(&service, &[&alice], endpoint_request("mixnet-0", &alice, 1, 2));
    let err = service.create_endpoint(&caller(&alice), duplicate).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_retired_peer_cannot_open_endpoints() {
    let registry = Arc::new(Ed25519Verifier::new());
    let shared: Arc<dyn SignatureVerifier> = registry.clone();
    let service = make_service().with_verifier(shared);
    let alice = make_signer(10);
    let req = approve(&service, &[&alice], endpoint_request("mixnet-r", &alice, 1, 2));

    let mut tx = service.store().begin().unwrap();
    tx.insert_peer(Peer {
        peer_id: alice.key_id(),
        key_data: alice.key_data(),
        status: PeerStatus::Deleted,
        owners: vec![],
        last_consensus_id: None,
    })
    .unwrap();
    tx.commit().unwrap();

    let err = service.create_endpoint(&caller(&alice), req).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
    assert!(service.retrieve_endpoint(&EndpointId::new("mixnet-r")).is_err());
    // Keys only reach the injected registry through peer creation.
    assert!(registry.is_empty());
}

#[test]
fn test_endpoint_cycle_end_to_end() {
    let service = make_service();
    let alice = make_signer(10);
    let endpoint = EndpointId::new("mixnet-1");
    let created = make_endpoint(&service, &alice, "mixnet-1", 2, 3);
    let client = Caller::new("client");

    let m1 = service
        .create_message(&client, message_request("mixnet-1", "INBOX", "one"))
        .unwrap()
        .message_hash;

    let early = approve(&service, &[&alice], update_request("mixnet-1", &created, "CLOSED", &[m1.clone()]));
    let err = service.update_endpoint(&caller(&alice), &endpoint, early).unwrap_err();
    assert!(matches!(err, CoreError::OutOfBounds { count: 1, min: 2, max: 3 }));
    assert_eq!(service.retrieve_endpoint(&endpoint).unwrap().status, CycleStatus::Open);

    let m2 = service
        .create_message(&client, message_request("mixnet-1", "INBOX", "two"))
        .unwrap()
        .message_hash;
    let close = approve(
        &service,
        &[&alice],
        update_request("mixnet-1", &created, "CLOSED", &[m1.clone(), m2.clone()]),
    );
    let closed = service.update_endpoint(&caller(&alice), &endpoint, close).unwrap();
    assert_eq!(closed.status, CycleStatus::Closed);
    assert_eq!(closed.inbox_hash, Some(compute_messages_hash(&[m2, m1])));
    assert_eq!(service.store().message_count(MessageBox::Accepted).unwrap(), 2);
    let closing_consensus = closed.last_consensus_id.clone().unwrap();
    assert_ne!(closing_consensus, created);

    let err = service
        .create_message(&client, message_request("mixnet-1", "INBOX", "late"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let err = service
        .create_message(&client, message_request("mixnet-1", "PROCESSBOX", "forged"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
    let p1 = service
        .create_message(&caller(&alice), message_request("mixnet-1", "PROCESSBOX", "result"))
        .unwrap()
        .message_hash;

    let stale = approve(&service, &[&alice], update_request("mixnet-1", &created, "PROCESSED", &[p1.clone()]));
    let err = service.update_endpoint(&caller(&alice), &endpoint, stale).unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let mut process = update_request("mixnet-1", &closing_consensus, "PROCESSED", &[p1.clone()]);
    process["data"]["process_proof"] = json!({"mix": "proof"});
    let process = approve(&service, &[&alice], process);
    let processed = service.update_endpoint(&caller(&alice), &endpoint, process).unwrap();
    assert_eq!(processed.status, CycleStatus::Processed);
    assert_eq!(processed.outbox_hash, Some(compute_messages_hash(&[p1])));
    assert_eq!(processed.process_proof, Some(json!({"mix": "proof"})));
    assert_eq!(service.store().message_count(MessageBox::Outbox).unwrap(), 1);
}

#[test]
fn test_endpoint_update_preconditions() {
    let service = make_service();
    let alice = make_signer(11);
    let endpoint = EndpointId::new("mixnet-2");
    let created = make_endpoint(&service, &alice, "mixnet-2", 1, 1);

    let mut without_last = update_request("mixnet-2", &created, "CLOSED", &[]);
    without_last["info"]
        .as_object_mut()
        .unwrap()
        .remove("on_last_consensus_id");
    let without_last = approve(&service, &[&alice], without_last);
    let err = service.update_endpoint(&caller(&alice), &endpoint, without_last).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let other_id = approve(&service, &[&alice], update_request("mixnet-9", &created, "CLOSED", &[]));
    let err = service.update_endpoint(&caller(&alice), &endpoint, other_id).unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let reopen = approve(&service, &[&alice], update_request("mixnet-2", &created, "OPEN", &[]));
    let err = service.update_endpoint(&caller(&alice), &endpoint, reopen).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let bob = make_signer(12);
    let h = service
        .create_message(&Caller::new("client"), message_request("mixnet-2", "INBOX", "x"))
        .unwrap()
        .message_hash;
    let by_bob = approve(&service, &[&bob], update_request("mixnet-2", &created, "CLOSED", &[h]));
    let err = service.update_endpoint(&caller(&bob), &endpoint, by_bob).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
}

#[test]
fn test_full_endpoint_closes() {
    let service = make_service();
    let alice = make_signer(13);
    let endpoint = EndpointId::new("mixnet-3");
    let created = make_endpoint(&service, &alice, "mixnet-3", 1, 1);
    let client = Caller::new("client");

    let h = service
        .create_message(&client, message_request("mixnet-3", "INBOX", "only"))
        .unwrap()
        .message_hash;
    assert_eq!(service.retrieve_endpoint(&endpoint).unwrap().status, CycleStatus::Full);
    assert!(service
        .create_message(&client, message_request("mixnet-3", "INBOX", "overflow"))
        .is_err());

    let close = approve(&service, &[&alice], update_request("mixnet-3", &created, "CLOSED", &[h]));
    let closed = service.update_endpoint(&caller(&alice), &endpoint, close).unwrap();
    assert_eq!(closed.status, CycleStatus::Closed);
}

#[test]
fn test_message_with_wrong_precommitted_hash_conflicts() {
    let service = make_service();
    let alice = make_signer(14);
    make_endpoint(&service, &alice, "mixnet-4", 1, 5);
    let mut req = message_request("mixnet-4", "INBOX", "body");
    req["data"]["message_hash"] = json!("0".repeat(64));
    let err = service.create_message(&Caller::new("client"), req).unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
fn test_listing_requires_filters() {
    let service = make_service();
    let alice = make_signer(15);
    let body = json!({"anything": 1});
    let consensus = seal(&service, &[&alice], body, json!({"accept": true}));

    let err = service.list_negotiations(None).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
    let found = service.list_negotiations(Some(&consensus)).unwrap();
    assert_eq!(found.len(), 1);
    let negotiation = &found[0];

    let err = service.list_contributions(None, &AndFilter::default()).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let href = format!("https://accord.example/negotiations/{}/", negotiation.id);
    let all = service
        .list_contributions(Some(href.as_str()), &AndFilter::default())
        .unwrap();
    assert_eq!(all.len(), 2);
    let latest = AndFilter::default()
        .with(LatestFilter { latest: true })
        .with(SignerFilter { signer_key_id: alice.key_id() });
    let current = service
        .list_contributions(Some(negotiation.id.as_str()), &latest)
        .unwrap();
    assert_eq!(current.len(), 1);

    let id = current[0].id;
    assert_eq!(
        service.retrieve_contribution(id, Some(negotiation.id.as_str())).unwrap(),
        current[0]
    );
    let err = service.retrieve_contribution(id, None).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let other = service
        .create_negotiation(&caller(&alice), request("create", "negotiation", json!({})))
        .unwrap();
    let err = service
        .retrieve_contribution(id, Some(other.id.as_str()))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn test_consensus_record_is_reproducible() {
    let service = make_service();
    let (a, b) = (make_signer(16), make_signer(17));
    let consensus = seal(&service, &[&a, &b], json!({"k": "v"}), json!({"accept": true}));

    let record = service.retrieve_consensus(&consensus).unwrap();
    assert_eq!(record.consensus, consensus);
    assert_eq!(record.signings.len(), 2);
    assert_eq!(record.timestamp, "2024-01-01T12:00:00.000000Z");
    assert_eq!(record.recompute_hash(service.canonicalizer()).unwrap(), consensus);
}

#[test]
fn test_contribution_checks() {
    let service = make_service();
    let alice = make_signer(18);
    let negotiation = service
        .create_negotiation(&caller(&alice), request("create", "negotiation", json!({})))
        .unwrap();

    let err = service
        .create_contribution(&caller(&alice), contribution_request(&negotiation.id, &alice, "[1,2]"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // No presented key and no registered key: nobody recovers as signer.
    let text = r#"{"body":{},"meta":{"accept":false}}"#;
    let err = service
        .create_contribution(&Caller::new("anon"), contribution_request(&negotiation.id, &alice, text))
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));

    let missing = NegotiationId::new("missing-negotiation");
    let err = service
        .create_contribution(&caller(&alice), contribution_request(&missing, &alice, text))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .create_negotiation(&caller(&alice), request("create", "contribution", json!({})))
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}
