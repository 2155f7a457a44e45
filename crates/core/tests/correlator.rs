//! Request correlation against a scripted transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{GET_KEY, MockTransport, Reply, SIGN, key_record};
use serde_json::json;
use vault_connect::{ChainId, CorrelationError, RequestCorrelator, WalletMethods};
use vc_protocol::RpcError;
use vc_runtime::SessionTransport;

async fn connected_correlator(first_id: u64) -> (Arc<MockTransport>, RequestCorrelator<MockTransport>) {
	let transport = MockTransport::new();
	transport.create_session().await.unwrap();
	transport.connect();
	let correlator = RequestCorrelator::with_first_id(Arc::clone(&transport), WalletMethods::default(), first_id);
	(transport, correlator)
}

#[tokio::test]
async fn test_ids_increase_monotonically() {
	let (transport, correlator) = connected_correlator(1_000).await;
	transport.script_address("a");
	transport.script_address("b");
	transport.script(SIGN, Reply::Result(json!([{ "signature": "s" }])));

	correlator.fetch_address(&ChainId::release()).await.unwrap();
	correlator.fetch_address(&ChainId::release()).await.unwrap();
	correlator.sign_message(&ChainId::release(), "a", "m").await.unwrap();

	let ids: Vec<u64> = transport.requests().iter().map(|r| r.id).collect();
	assert_eq!(ids, vec![1_000, 1_001, 1_002]);
	assert!(transport.requests().iter().all(|r| r.jsonrpc == "2.0"));
}

#[tokio::test]
async fn test_clock_seeded_ids_are_distinct() {
	let transport = MockTransport::new();
	transport.create_session().await.unwrap();
	transport.connect();
	let correlator = RequestCorrelator::new(Arc::clone(&transport), WalletMethods::default());
	transport.script_address("a");
	transport.script_address("a");

	correlator.fetch_address(&ChainId::release()).await.unwrap();
	correlator.fetch_address(&ChainId::release()).await.unwrap();

	let requests = transport.requests();
	assert!(requests[1].id > requests[0].id);
}

#[tokio::test]
async fn test_concurrent_calls_resolve_independently() {
	let (transport, correlator) = connected_correlator(1).await;
	transport.script(GET_KEY, Reply::Delayed(Duration::from_millis(30), key_record("slow")));
	transport.script(GET_KEY, Reply::Result(key_record("fast")));

	let release = ChainId::release();
	let beta = ChainId::beta();
	let (slow, fast) = tokio::join!(
		correlator.fetch_address(&release),
		correlator.fetch_address(&beta),
	);

	assert_eq!(slow.unwrap(), "slow");
	assert_eq!(fast.unwrap(), "fast");
}

#[tokio::test]
async fn test_fetch_address_sends_chain_param() {
	let (transport, correlator) = connected_correlator(7).await;
	transport.script_address("tlink1xyz");

	let address = correlator.fetch_address(&ChainId::beta()).await.unwrap();

	assert_eq!(address, "tlink1xyz");
	let request = transport.requests().pop().unwrap();
	assert_eq!(request.method, "keplr_get_key_wallet_connect_v1");
	assert_eq!(request.params, vec![json!("finschia-beta-1")]);
}

#[tokio::test]
async fn test_fetch_keys_decodes_all_records() {
	let (transport, correlator) = connected_correlator(7).await;
	transport.script(
		GET_KEY,
		Reply::Result(json!([
			{ "bech32Address": "link1a", "name": "main", "isNanoLedger": true },
			{ "bech32Address": "link1b" }
		])),
	);

	let keys = correlator.fetch_keys(&ChainId::release()).await.unwrap();

	assert_eq!(keys.len(), 2);
	assert_eq!(keys[0].name.as_deref(), Some("main"));
	assert_eq!(keys[0].is_nano_ledger, Some(true));
	assert_eq!(keys[1].bech32_address, "link1b");
}

#[tokio::test]
async fn test_sign_message_sends_chain_address_message() {
	let (transport, correlator) = connected_correlator(7).await;
	transport.script(
		SIGN,
		Reply::Result(json!([{ "signature": "c2ln", "pub_key": { "type": "tendermint/PubKeySecp256k1" } }])),
	);

	let signature = correlator
		.sign_message(&ChainId::release(), "link1abc", "Sign in to dApp")
		.await
		.unwrap();

	assert_eq!(signature.to_string(), "c2ln");
	let request = transport.requests().pop().unwrap();
	assert_eq!(request.method, "keplr_sign_free_message_wallet_connect_v1");
	assert_eq!(
		request.params,
		vec![json!("finschia-1"), json!("link1abc"), json!("Sign in to dApp")]
	);
}

#[tokio::test]
async fn test_empty_responses_are_errors() {
	let (transport, correlator) = connected_correlator(1).await;
	transport.script(GET_KEY, Reply::Result(json!([])));
	transport.script(SIGN, Reply::Result(json!([])));

	let err = correlator.fetch_address(&ChainId::release()).await.unwrap_err();
	assert!(matches!(err, CorrelationError::EmptyResponse { ref method } if method == GET_KEY));

	let err = correlator.sign_message(&ChainId::release(), "a", "m").await.unwrap_err();
	assert!(matches!(err, CorrelationError::EmptyResponse { ref method } if method == SIGN));
}

#[tokio::test]
async fn test_malformed_response_is_decode_error() {
	let (transport, correlator) = connected_correlator(1).await;
	transport.script(GET_KEY, Reply::Result(json!([{ "name": "no address" }])));
	transport.script(GET_KEY, Reply::Result(json!("not a list")));

	for _ in 0..2 {
		let err = correlator.fetch_address(&ChainId::release()).await.unwrap_err();
		assert!(matches!(err, CorrelationError::Decode { .. }), "got {err:?}");
	}
}

#[tokio::test]
async fn test_remote_error_is_surfaced() {
	let (transport, correlator) = connected_correlator(1).await;
	transport.script(GET_KEY, Reply::Error(RpcError::new(4001, "User rejected the request")));

	let err = correlator.fetch_address(&ChainId::release()).await.unwrap_err();

	match err {
		CorrelationError::Remote { code, message } => {
			assert_eq!(code, 4001);
			assert_eq!(message, "User rejected the request");
		}
		other => panic!("expected remote error, got {other:?}"),
	}
}

#[tokio::test]
async fn test_unknown_method_maps_to_remote_error() {
	let (_transport, correlator) = connected_correlator(1).await;

	let err = correlator.call("cosmos_unknown", vec![]).await.unwrap_err();

	assert!(matches!(err, CorrelationError::Remote { code: RpcError::METHOD_NOT_FOUND, .. }));
}

#[tokio::test]
async fn test_mismatched_response_id_is_rejected() {
	let (transport, correlator) = connected_correlator(50).await;
	transport.script(GET_KEY, Reply::WrongId(key_record("x")));

	let err = correlator.fetch_address(&ChainId::release()).await.unwrap_err();

	assert!(matches!(err, CorrelationError::IdMismatch { expected: 50, actual: 51 }));
}

#[tokio::test]
async fn test_transport_timeout_is_not_retried() {
	let (transport, correlator) = connected_correlator(1).await;
	transport.script(GET_KEY, Reply::Timeout);

	let err = correlator.fetch_address(&ChainId::release()).await.unwrap_err();

	assert!(matches!(err, CorrelationError::Transport(ref e) if e.is_timeout()));
	assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_call_without_session_fails_fast() {
	let transport = MockTransport::new();
	let correlator = RequestCorrelator::new(Arc::clone(&transport), WalletMethods::default());

	let err = correlator.fetch_address(&ChainId::release()).await.unwrap_err();

	assert!(matches!(err, CorrelationError::NotConnected));
	assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_vendor_prefix_selects_methods() {
	let transport = MockTransport::new();
	transport.create_session().await.unwrap();
	transport.connect();
	let correlator = RequestCorrelator::new(Arc::clone(&transport), WalletMethods::for_vendor("cosmostation"));
	transport.script("cosmostation_get_key_wallet_connect_v1", Reply::Result(key_record("link1c")));

	assert_eq!(correlator.fetch_address(&ChainId::release()).await.unwrap(), "link1c");
	assert_eq!(correlator.methods().get_key, "cosmostation_get_key_wallet_connect_v1");
}
