mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use ride_broker::{
	allowlist::{ANY_DOMAIN, DomainAllowlist, LoginData, UsageRecord},
	auth::ApiKey,
	error::Error,
	store::USAGE_TABLE,
	url::Url,
};
// self
use common::*;

fn domains(raw: &[&str]) -> Vec<String> {
	raw.iter().map(|domain| (*domain).to_owned()).collect()
}

fn request_url() -> Url {
	Url::parse("https://broker.example.com/init?src=widget").expect("Request URL should parse.")
}

#[tokio::test]
async fn exact_registrations_partition_candidates_in_input_order() {
	let (store, _) = memory_manager().await;
	let allowlist = DomainAllowlist::new(store);
	let key = ApiKey::generate();

	allowlist
		.register_domains(&key, &domains(&["shop.example.com", "localhost:8080"]))
		.await
		.expect("Registration should succeed.");

	let filter = allowlist
		.filter_allowed_domains(
			&key,
			&domains(&["evil.example.com", "shop.example.com", "localhost", "localhost:8080"]),
		)
		.await
		.expect("Filtering should succeed.");

	assert_eq!(filter.allowed, domains(&["shop.example.com", "localhost:8080"]));
	assert_eq!(filter.not_allowed, domains(&["evil.example.com", "localhost"]));
	assert!(
		allowlist.is_domain_allowed(&key, "shop.example.com").await.expect("Check should succeed.")
	);
	assert!(
		!allowlist
			.is_domain_allowed(&key, "sub.shop.example.com")
			.await
			.expect("Check should succeed.")
	);
}

#[tokio::test]
async fn wildcard_registration_allows_every_domain() {
	let (store, _) = memory_manager().await;
	let allowlist = DomainAllowlist::new(store);
	let registration = allowlist
		.register_new_key(&domains(&[ANY_DOMAIN]))
		.await
		.expect("Wildcard registration should succeed.");
	let candidates = domains(&["a.example", "b.example:3000"]);
	let filter = allowlist
		.filter_allowed_domains(&registration.api_key, &candidates)
		.await
		.expect("Filtering should succeed.");

	assert_eq!(filter.allowed, candidates);
	assert!(filter.not_allowed.is_empty());
}

#[tokio::test]
async fn unknown_keys_allow_nothing() {
	let (store, _) = memory_manager().await;
	let allowlist = DomainAllowlist::new(store);
	let filter = allowlist
		.filter_allowed_domains(&ApiKey::generate(), &domains(&["shop.example.com"]))
		.await
		.expect("Filtering should succeed.");

	assert!(filter.allowed.is_empty());
	assert_eq!(filter.not_allowed, domains(&["shop.example.com"]));
}

#[tokio::test]
async fn register_new_key_mints_distinct_keys() {
	let (store, _) = memory_manager().await;
	let allowlist = DomainAllowlist::new(store);
	let first =
		allowlist.register_new_key(&domains(&["a.example"])).await.expect("Registration should work.");
	let second =
		allowlist.register_new_key(&domains(&["b.example"])).await.expect("Registration should work.");

	assert_ne!(first.api_key, second.api_key);
	assert_eq!(first.domains, domains(&["a.example"]));
	assert!(
		!allowlist
			.is_domain_allowed(&second.api_key, "a.example")
			.await
			.expect("Check should succeed.")
	);
	assert!(matches!(allowlist.register_new_key(&[]).await, Err(Error::Validation { .. })));
}

#[tokio::test]
async fn authorize_origin_checks_the_origin_host_and_logs_usage() {
	let (store, backend) = memory_manager().await;
	let allowlist = DomainAllowlist::new(store);
	let registration = allowlist
		.register_new_key(&domains(&["shop.example.com"]))
		.await
		.expect("Registration should succeed.");
	let login = LoginData {
		api_key: registration.api_key.to_string(),
		origin: "https://shop.example.com/checkout".into(),
	};
	let key = allowlist
		.authorize_origin(&login, &request_url())
		.await
		.expect("Registered origin should pass.");

	assert_eq!(key, registration.api_key);

	let denied = LoginData { origin: "https://evil.example.com/".into(), ..login.clone() };

	assert!(matches!(
		allowlist.authorize_origin(&denied, &request_url()).await,
		Err(Error::DomainNotAllowed { domain }) if domain == "evil.example.com"
	));

	// Usage records are pushed from detached tasks.
	for _ in 0..50 {
		if backend.list(USAGE_TABLE).len() == 2 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let entries = backend.list(USAGE_TABLE);

	assert_eq!(entries.len(), 2);

	let record: UsageRecord =
		serde_json::from_str(&entries[0]).expect("Usage record should decode.");

	assert_eq!(record.origin_url, "https://broker.example.com?src=widget");
}

#[tokio::test]
async fn authorize_origin_rejects_blank_fields_without_store_writes() {
	let (store, backend) = memory_manager().await;
	let allowlist = DomainAllowlist::new(store);

	assert!(matches!(
		allowlist.authorize_origin(&LoginData::default(), &request_url()).await,
		Err(Error::Validation { .. })
	));

	tokio::task::yield_now().await;

	assert!(backend.list(USAGE_TABLE).is_empty());
}

#[tokio::test]
async fn unreachable_store_denies_instead_of_allowing() {
	let store = manager_over(&Arc::new(Outage::new(usize::MAX))).await;
	let allowlist = DomainAllowlist::new(store);
	let key = ApiKey::generate();
	let err = allowlist
		.filter_allowed_domains(&key, &domains(&["shop.example.com"]))
		.await
		.expect_err("Dead store should not produce a filter.");

	assert!(matches!(err, Error::StoreUnavailable { .. }));

	let login = LoginData { api_key: key.to_string(), origin: "https://shop.example.com/".into() };
	let err = allowlist
		.authorize_origin(&login, &request_url())
		.await
		.expect_err("Dead store should not authorize the origin.");

	assert!(matches!(err, Error::StoreUnavailable { .. }));
	assert!(!err.requires_login());
}
