//! Storage codec behavior against an in-process HSM.

use std::sync::Arc;

use civic_fields::classification::{encrypted_key, FieldClass};
use civic_fields::{CodecError, EncryptionService, EntityKind, FieldCodec, Record, ServiceError};
use civic_hsm::stub::StubTransport;
use civic_hsm::{parse_envelope, HsmClient, HsmConfig};
use proptest::prelude::*;
use serde_json::{json, Value};

fn hsm(api_key: &str) -> Arc<HsmClient<StubTransport>> {
    let config = HsmConfig::api_key("https://hsm.test".parse().unwrap(), api_key, "kid-fields");
    Arc::new(HsmClient::with_transport(config, StubTransport::new()))
}

fn real_codec() -> FieldCodec<StubTransport> {
    FieldCodec::new(hsm("NjE0ZTQ2YjMtY2U1Zi00ZDBhLTg0YjE"))
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn citizen_write_encrypts_names_and_keeps_city() {
    let codec = real_codec();
    let stored = codec
        .to_storage(
            EntityKind::Citizen,
            &record(json!({"firstName": "John", "lastName": "Smith", "city": "Springfield"})),
        )
        .await
        .unwrap();

    let mut keys: Vec<_> = stored.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["city", "firstName_encrypted", "lastName_encrypted"]);
    assert_eq!(stored["city"], "Springfield");
}

#[tokio::test]
async fn legacy_plaintext_reads_back_unchanged() {
    let codec = real_codec();
    let view = codec
        .from_storage(
            EntityKind::Citizen,
            &record(json!({"firstName_encrypted": "not-json", "city": "Springfield"})),
        )
        .await;
    assert_eq!(view, record(json!({"firstName": "not-json", "city": "Springfield"})));
    assert_eq!(codec.hsm().transport().decrypt_calls(), 0);
}

#[tokio::test]
async fn rejected_envelope_reads_as_placeholder() {
    let codec = real_codec();
    let stored = codec
        .to_storage(EntityKind::Citizen, &record(json!({"firstName": "John"})))
        .await
        .unwrap();
    let envelope = stored["firstName_encrypted"].clone();

    codec.hsm().transport().fail_decrypt(true);
    let view = codec
        .from_storage(
            EntityKind::Citizen,
            &record(json!({"firstName_encrypted": envelope, "city": "Springfield"})),
        )
        .await;
    assert_eq!(view, record(json!({"firstName": "[Encrypted]", "city": "Springfield"})));
}

#[tokio::test]
async fn one_bad_field_does_not_hide_the_others() {
    let codec = real_codec();
    let stored = codec
        .to_storage(
            EntityKind::ServiceRequest,
            &record(json!({
                "requesterName": "Ada",
                "contactEmail": "ada@example.org",
                "serviceType": "streetlight"
            })),
        )
        .await
        .unwrap();

    let mut tampered = stored.clone();
    tampered.insert(
        "contactEmail_encrypted".into(),
        json!("{\"cipher\":\"%%%\",\"iv\":\"AAAA\"}"),
    );
    let view = codec.from_storage(EntityKind::ServiceRequest, &tampered).await;
    assert_eq!(view["requesterName"], "Ada");
    assert_eq!(view["contactEmail"], "[Encrypted Email]");
    assert_eq!(view["serviceType"], "streetlight");
}

#[tokio::test]
async fn auth_outage_on_read_degrades_to_placeholders() {
    let codec = real_codec();
    let stored = codec
        .to_storage(EntityKind::Citizen, &record(json!({"phone": "555-0100", "city": "Ogdenville"})))
        .await
        .unwrap();

    let outage = FieldCodec::new(hsm("NjE0ZTQ2YjMtY2U1Zi00ZDBhLTg0YjE"));
    outage.hsm().transport().fail_auth(true);
    let view = outage.from_storage(EntityKind::Citizen, &stored).await;
    assert_eq!(view["phone"], "[Encrypted Phone]");
    assert_eq!(view["city"], "Ogdenville");
}

#[tokio::test]
async fn write_fails_when_hsm_is_unavailable() {
    let codec = real_codec();
    codec.hsm().transport().fail_auth(true);
    let err = codec
        .to_storage(EntityKind::Citizen, &record(json!({"email": "j@example.org"})))
        .await
        .unwrap_err();
    match err {
        CodecError::EncryptionFailed { field, source } => {
            assert_eq!(field, "email");
            assert!(matches!(source, civic_hsm::HsmError::AuthenticationFailed { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn demo_mode_codec_never_calls_the_hsm() {
    let codec = FieldCodec::new(hsm("changeme"));
    let stored = codec
        .to_storage(EntityKind::Citizen, &record(json!({"address": "742 Evergreen Terrace"})))
        .await
        .unwrap();
    let envelope = parse_envelope(stored["address_encrypted"].as_str().unwrap()).unwrap();
    assert!(envelope.cipher.starts_with("DEMO:"));

    let view = codec.from_storage(EntityKind::Citizen, &stored).await;
    assert_eq!(view["address"], "742 Evergreen Terrace");
    assert_eq!(codec.hsm().transport().total_calls(), 0);
}

#[tokio::test]
async fn service_self_test_succeeds_against_working_hsm() {
    let service = EncryptionService::enabled(hsm("NjE0ZTQ2YjMtY2U1Zi00ZDBhLTg0YjE"));
    service.initialize().await.unwrap();
    assert!(service.health_check().await.is_healthy());
}

#[tokio::test]
async fn service_self_test_surfaces_auth_failure() {
    let client = hsm("NjE0ZTQ2YjMtY2U1Zi00ZDBhLTg0YjE");
    client.transport().fail_auth(true);
    let service = EncryptionService::enabled(client);
    let err = service.initialize().await.unwrap_err();
    assert!(matches!(err, ServiceError::Hsm(civic_hsm::HsmError::AuthenticationFailed { .. })));
    assert!(!service.health_check().await.is_serving());
}

fn citizen_entity() -> impl Strategy<Value = Record> {
    let fields: Vec<&'static str> = EntityKind::Citizen
        .sensitive_fields()
        .iter()
        .chain(EntityKind::Citizen.public_fields())
        .copied()
        .collect();
    proptest::collection::btree_map(proptest::sample::select(fields), "[a-zA-Z0-9 ]{0,16}", 0..10)
        .prop_map(|map| {
            map.into_iter()
                .map(|(k, v)| (k.to_string(), Value::String(v)))
                .collect()
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn storage_never_holds_sensitive_plaintext(entity in citizen_entity()) {
        let rt = runtime();
        let codec = real_codec();
        let stored = rt.block_on(codec.to_storage(EntityKind::Citizen, &entity)).unwrap();

        for (name, value) in &entity {
            match EntityKind::Citizen.classify(name) {
                Some(FieldClass::Sensitive) => {
                    prop_assert!(!stored.contains_key(name));
                    let has_value = value.as_str().is_some_and(|s| !s.is_empty());
                    prop_assert_eq!(stored.contains_key(&encrypted_key(name)), has_value);
                }
                _ => prop_assert_eq!(stored.get(name), Some(value)),
            }
        }

        let view = rt.block_on(codec.from_storage(EntityKind::Citizen, &stored));
        for (name, value) in &entity {
            if value.as_str().is_some_and(|s| !s.is_empty()) {
                prop_assert_eq!(view.get(name), Some(value));
            }
        }
    }

    #[test]
    fn reads_are_total(
        keys in proptest::collection::vec("[a-zA-Z]{0,10}", 0..6),
        texts in proptest::collection::vec(".{0,40}", 6),
    ) {
        let rt = runtime();
        let codec = real_codec();
        let record: Record = keys
            .iter()
            .zip(&texts)
            .map(|(k, t)| (encrypted_key(k), Value::String(t.clone())))
            .collect();
        let view = rt.block_on(codec.from_storage(EntityKind::Citizen, &record));
        prop_assert!(view.keys().all(|k| !k.ends_with("_encrypted")));
    }
}
