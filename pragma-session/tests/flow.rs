mod common;

use std::{fs, sync::Arc};

use alloy_primitives::{address, Address, U256};
use common::{Call, FakeApi};
use pragma_delegation_encoder::decoder::{decode_logical_or_terms, decode_timestamp_terms};
use pragma_delegation_types::{
    constants::{DEX_AGGREGATOR, LEVERUP_DIAMOND, ROOT_AUTHORITY},
    Protocol, UnsignedDelegation,
};
use pragma_session::{
    api::{DelegationRequestRecord, RequestStatus},
    flow::{RequestDelegationParams, RequestIdParams, Selection, SetupSessionParams},
    DelegationError, DelegationFlow, FixedClock, SessionKeyStore,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const SA: Address = address!("1111111111111111111111111111111111111111");
const NOW: i64 = 1_700_000_000;

fn flow(dir: &TempDir, api: Arc<FakeApi>) -> DelegationFlow {
    DelegationFlow::new(api, dir.path().join("session-key.json"), dir.path().join("config.json"))
        .with_clock(Arc::new(FixedClock::from_unix_seconds(NOW)))
}

fn request_params(sa: Option<&str>) -> RequestDelegationParams {
    RequestDelegationParams { sa: sa.map(str::to_string), ..Default::default() }
}

fn approved_record(unsigned: &UnsignedDelegation, signature: Option<&str>) -> DelegationRequestRecord {
    DelegationRequestRecord {
        status: RequestStatus::Approved,
        signature: signature.map(str::to_string),
        unsigned_delegation: Value::String(serde_json::to_string(unsigned).unwrap()),
        sa: Some(unsigned.delegator),
        session_key: Some(unsigned.delegate),
        duration: json!(604800),
        protocols: json!(["dex"]),
    }
}

#[tokio::test]
async fn setup_without_sa_only_ensures_the_key() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());

    let outcome = flow.setup_session(SetupSessionParams::default()).await.unwrap();

    assert!(!outcome.registered);
    assert!(outcome.message.is_some());
    assert!(api.calls().is_empty());
    let stored = SessionKeyStore::new(dir.path().join("session-key.json")).load().unwrap();
    assert_eq!(stored.address, outcome.address);
}

#[tokio::test]
async fn setup_with_sa_registers_and_records_wallet() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());

    let outcome = flow
        .setup_session(SetupSessionParams { sa: Some(SA.to_string()), ..Default::default() })
        .await
        .unwrap();

    assert!(outcome.registered);
    assert_eq!(outcome.sa, Some(SA));
    match api.calls().as_slice() {
        [Call::Register(req)] => {
            assert_eq!(req.sa, SA);
            assert_eq!(req.session_key, outcome.address);
            assert_eq!(req.label, "openclaw-agent");
            assert_eq!(req.agent_type, "pragma");
        }
        other => panic!("unexpected calls: {other:?}"),
    }

    let config: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap()).unwrap();
    assert_eq!(config["wallet"]["smartAccountAddress"], json!(SA));
    assert_eq!(config["wallet"]["sessionKeyAddress"], json!(outcome.address));
    assert_eq!(config["network"]["chainId"], 143);
}

#[tokio::test]
async fn setup_passes_remote_errors_through() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    api.fail(409, "Session key already registered");
    let flow = flow(&dir, api.clone());

    let err = flow
        .setup_session(SetupSessionParams { sa: Some(SA.to_string()), ..Default::default() })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "API_ERROR");
    assert_eq!(err.to_string(), "Session key already registered");
    assert!(!dir.path().join("config.json").exists());
}

#[tokio::test]
async fn setup_survives_unwritable_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("blocker"), b"not a directory").unwrap();
    let api = FakeApi::new();
    let flow = DelegationFlow::new(
        api.clone(),
        dir.path().join("session-key.json"),
        dir.path().join("blocker").join("config.json"),
    );

    let outcome = flow
        .setup_session(SetupSessionParams { sa: Some(SA.to_string()), ..Default::default() })
        .await
        .unwrap();

    assert!(outcome.registered);
    assert_eq!(api.calls().len(), 1);
}

#[tokio::test]
async fn request_without_key_is_signer_not_found() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());

    let err = flow.request_delegation(request_params(Some(&SA.to_string()))).await.unwrap_err();

    assert!(matches!(err, DelegationError::SignerNotFound(_)));
    assert_eq!(err.code(), "SIGNER_NOT_FOUND");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn request_without_sa_is_missing_param() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    flow.setup_session(SetupSessionParams::default()).await.unwrap();

    let err = flow.request_delegation(request_params(None)).await.unwrap_err();

    assert_eq!(err.code(), "MISSING_PARAM");
    assert_eq!(err.to_string(), "sa (Smart Account address) is required");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn dex_only_request() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let key = flow.setup_session(SetupSessionParams::default()).await.unwrap().address;

    let ticket = flow
        .request_delegation(RequestDelegationParams {
            sa: Some(SA.to_string()),
            protocols: Some(Selection::List(vec!["dex".into(), "bogus".into()])),
            expiry_days: Some(3),
            allowed_tokens: Some(Selection::Keyword("all".into())),
            budget_mon: Some(2.5),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(ticket.request_id, "req-1");
    assert_eq!(ticket.session_key_address, key);
    assert_eq!(ticket.protocols, vec![Protocol::Dex]);

    let calls = api.calls();
    let Call::Create(req) = &calls[0] else { panic!("expected create call, got {calls:?}") };
    assert_eq!(req.sa, SA);
    assert_eq!(req.session_key, key);
    assert_eq!(req.duration, 3 * 86_400);
    assert_eq!(req.budget, 100.0);
    assert_eq!(req.gas_budget, "2.5");
    assert_eq!(req.tokens, None);
    assert_eq!(req.protocols, vec![Protocol::Dex]);

    let unsigned: UnsignedDelegation = serde_json::from_str(&req.unsigned_delegation).unwrap();
    assert_eq!(unsigned.delegator, SA);
    assert_eq!(unsigned.delegate, key);
    assert_eq!(unsigned.authority, ROOT_AUTHORITY);
    assert_eq!(unsigned.caveats.len(), 4);

    let groups = decode_logical_or_terms(&unsigned.caveats[0].terms).unwrap();
    // approve, trading, erc20 transfer + native transfer to the session key
    assert_eq!(groups.len(), 4);
    let trading_targets = &groups[1].caveats[0].terms;
    assert!(trading_targets.windows(20).any(|w| w == DEX_AGGREGATOR.as_slice()));
    assert!(!trading_targets.windows(20).any(|w| w == LEVERUP_DIAMOND.as_slice()));

    let (after, before) = decode_timestamp_terms(&unsigned.caveats[1].terms).unwrap();
    assert_eq!(after, 0);
    assert_eq!(before, (NOW as u128) + 3 * 86_400);

    let value_lte = U256::from_be_slice(&unsigned.caveats[3].terms);
    assert_eq!(value_lte, U256::from(1_000_000_000_000_000_000u128));

    let typed: Value = serde_json::from_str(&req.typed_data).unwrap();
    assert_eq!(typed["primaryType"], "Delegation");
    assert_eq!(typed["domain"]["chainId"], 143);
}

#[tokio::test]
async fn explicit_tokens_are_forwarded() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    flow.setup_session(SetupSessionParams::default()).await.unwrap();

    flow.request_delegation(RequestDelegationParams {
        sa: Some(SA.to_string()),
        allowed_tokens: Some(Selection::List(vec!["USDC".into()])),
        enable_transfers: Some(false),
        ..Default::default()
    })
    .await
    .unwrap();

    let calls = api.calls();
    let Call::Create(req) = &calls[0] else { panic!("expected create call") };
    assert_eq!(req.tokens, Some(json!(["USDC"])));
    assert_eq!(req.protocols, Protocol::ALL.to_vec());
    let unsigned: UnsignedDelegation = serde_json::from_str(&req.unsigned_delegation).unwrap();
    assert_eq!(decode_logical_or_terms(&unsigned.caveats[0].terms).unwrap().len(), 2);
}

#[tokio::test]
async fn poll_returns_status_verbatim() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let unsigned = UnsignedDelegation::root(Address::ZERO, SA, vec![]);
    let mut record = approved_record(&unsigned, None);
    record.status = RequestStatus::Other("revoked".into());
    api.put_record("req-9", record);

    let status = flow.poll_delegation(RequestIdParams { request_id: Some("req-9".into()) }).await.unwrap();
    assert_eq!(status.status, RequestStatus::Other("revoked".into()));

    let err = flow.poll_delegation(RequestIdParams { request_id: None }).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_PARAM");
}

#[tokio::test]
async fn retrieve_pending_is_not_approved() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let unsigned = UnsignedDelegation::root(Address::ZERO, SA, vec![]);
    let mut record = approved_record(&unsigned, Some("0xabcd"));
    record.status = RequestStatus::Pending;
    api.put_record("req-1", record);

    let err = flow.retrieve_delegation(RequestIdParams { request_id: Some("req-1".into()) }).await.unwrap_err();

    assert_eq!(err.code(), "NOT_APPROVED");
    assert_eq!(err.to_string(), "Delegation not yet approved (status: pending)");
    assert!(!flow.session_keys().delegation_path().exists());
}

#[tokio::test]
async fn retrieve_pending_without_addresses_is_not_approved() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    api.put_record(
        "req-1",
        DelegationRequestRecord {
            status: RequestStatus::Pending,
            signature: None,
            unsigned_delegation: Value::Null,
            sa: None,
            session_key: None,
            duration: Value::Null,
            protocols: Value::Null,
        },
    );

    let err = flow.retrieve_delegation(RequestIdParams { request_id: Some("req-1".into()) }).await.unwrap_err();

    assert_eq!(err.code(), "NOT_APPROVED");
}

#[tokio::test]
async fn retrieve_approved_without_sa_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let unsigned = UnsignedDelegation::root(Address::ZERO, SA, vec![]);
    let mut record = approved_record(&unsigned, Some("0x01"));
    record.sa = None;
    api.put_record("req-1", record);

    let err = flow.retrieve_delegation(RequestIdParams { request_id: Some("req-1".into()) }).await.unwrap_err();

    assert_eq!(err.code(), "PARSE_ERROR");
    assert!(!flow.session_keys().delegation_path().exists());
}

#[tokio::test]
async fn retrieve_later_keeps_first_retrieval_time() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let unsigned = UnsignedDelegation::root(Address::ZERO, SA, vec![]);
    api.put_record("req-1", approved_record(&unsigned, Some("0xdeadbeef")));
    let params = RequestIdParams { request_id: Some("req-1".into()) };

    let first = flow(&dir, api.clone()).retrieve_delegation(params.clone()).await.unwrap();
    let first_bytes = fs::read(&first.storage_path).unwrap();

    let later = DelegationFlow::new(api.clone(), dir.path().join("session-key.json"), dir.path().join("config.json"))
        .with_clock(Arc::new(FixedClock::from_unix_seconds(NOW + 3_600)));
    let second = later.retrieve_delegation(params).await.unwrap();

    assert_eq!(fs::read(&second.storage_path).unwrap(), first_bytes);
    let stored: Value = serde_json::from_slice(&first_bytes).unwrap();
    assert_eq!(stored["retrievedAt"], (NOW as u64) * 1000);
}

#[tokio::test]
async fn retrieve_twice_writes_identical_files() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let key = flow.setup_session(SetupSessionParams::default()).await.unwrap().address;
    let unsigned = UnsignedDelegation::root(key, SA, vec![]);
    api.put_record("req-1", approved_record(&unsigned, Some("0xdeadbeef")));

    let params = RequestIdParams { request_id: Some("req-1".into()) };
    let first = flow.retrieve_delegation(params.clone()).await.unwrap();
    let first_bytes = fs::read(&first.storage_path).unwrap();
    let second = flow.retrieve_delegation(params).await.unwrap();
    let second_bytes = fs::read(&second.storage_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first.storage_path, dir.path().join("delegations").join("root").join("delegation.json"));

    let stored: Value = serde_json::from_slice(&first_bytes).unwrap();
    assert_eq!(stored["requestId"], "req-1");
    assert_eq!(stored["signedDelegation"]["signature"], "0xdeadbeef");
    assert_eq!(stored["signedDelegation"]["delegator"], json!(SA));
    assert_eq!(stored["delegate"], json!(key));
    assert_eq!(stored["retrievedAt"], (NOW as u64) * 1000);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&first.storage_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn retrieve_without_signature() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let unsigned = UnsignedDelegation::root(Address::ZERO, SA, vec![]);
    api.put_record("req-1", approved_record(&unsigned, None));
    api.put_record("req-2", approved_record(&unsigned, Some("")));

    for id in ["req-1", "req-2"] {
        let err = flow.retrieve_delegation(RequestIdParams { request_id: Some(id.into()) }).await.unwrap_err();
        assert_eq!(err.code(), "NO_SIGNATURE");
    }
}

#[tokio::test]
async fn retrieve_with_corrupt_delegation() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new();
    let flow = flow(&dir, api.clone());
    let unsigned = UnsignedDelegation::root(Address::ZERO, SA, vec![]);
    let mut record = approved_record(&unsigned, Some("0x01"));
    record.unsigned_delegation = Value::String("{not json".into());
    api.put_record("req-1", record);

    let err = flow.retrieve_delegation(RequestIdParams { request_id: Some("req-1".into()) }).await.unwrap_err();

    assert_eq!(err.code(), "PARSE_ERROR");
    assert!(!flow.session_keys().delegation_path().exists());
}
