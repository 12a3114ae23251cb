//! End-to-end scenarios against a real Redis container.
//!
//! These tests require Docker (via testcontainers) and fail at container
//! startup in environments without it.
//!
//! Run with: `cargo test --test redis_integration`

use riot_ratelimit::store::cooldown;
use riot_ratelimit::{Config, Decision, HeaderPair, RateLimit, RoutingValue};
use std::time::{Duration, SystemTime};
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

async fn start_redis() -> (RateLimit, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379_u16.tcp())
        .start()
        .await
        .expect("failed to start redis container");

    let host = container.get_host().await.expect("get host");
    let port = container.get_host_port_ipv4(6379).await.expect("get port");

    let config = Config {
        redis_url: format!("redis://{host}:{port}"),
        ..Config::default()
    };

    let limiter = RateLimit::new(&config).expect("build rate limiter");
    (limiter, container)
}

fn headers(pairs: &[(&str, &str)]) -> Vec<HeaderPair> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// Bootstrap policy from response headers, then allow a call within quota.
#[tokio::test]
async fn bootstrap_then_allow_within_quota() {
    let (limiter, _container) = start_redis().await;

    let h = headers(&[
        ("date", "Tue, 01 Apr 2025 18:15:26 GMT"),
        ("x-app-rate-limit", "100:120,20:1"),
        ("x-app-rate-limit-count", "20:120,2:1"),
        ("x-method-rate-limit", "50:10"),
        ("x-method-rate-limit-count", "20:10"),
    ]);

    limiter
        .refresh(&h, RoutingValue::Euw1, "/lol/summoner", SystemTime::now())
        .await
        .expect("refresh");

    let decision = limiter.hit(RoutingValue::Euw1, "/lol/summoner").await.expect("hit");
    match decision {
        Decision::Allow(entries) => {
            assert_eq!(entries.len(), 3);
            assert!(entries.iter().all(|e| e.count == 1));
            let app_120 = entries.iter().find(|e| e.window_sec == Some(120)).unwrap();
            assert_eq!(app_120.count_limit, Some(100));
            let app_1 = entries.iter().find(|e| e.window_sec == Some(1)).unwrap();
            assert_eq!(app_1.count_limit, Some(20));
            let method_10 = entries.iter().find(|e| e.window_sec == Some(10)).unwrap();
            assert_eq!(method_10.count_limit, Some(50));
        }
        Decision::Throttle(_) => panic!("expected allow"),
    }
}

// A call that breaches the per-window counter is throttled.
#[tokio::test]
async fn throttles_on_counter_breach() {
    let (limiter, _container) = start_redis().await;

    // `known?` requires both scopes' policy-windows keys, so a
    // generous method limit is included purely to bootstrap that gate —
    // the scenario only drives the application scope into throttle.
    let h = headers(&[
        ("date", "Tue, 01 Apr 2025 18:15:26 GMT"),
        ("x-app-rate-limit", "100:120,2:1"),
        ("x-app-rate-limit-count", "0:120,0:1"),
        ("x-method-rate-limit", "1000:60"),
        ("x-method-rate-limit-count", "0:60"),
    ]);
    limiter
        .refresh(&h, RoutingValue::Na1, "/lol/match", SystemTime::now())
        .await
        .expect("refresh");

    for _ in 0..2 {
        let decision = limiter.hit(RoutingValue::Na1, "/lol/match").await.expect("hit");
        assert!(matches!(decision, Decision::Allow(_)));
    }

    let third = limiter.hit(RoutingValue::Na1, "/lol/match").await.expect("hit");
    match third {
        Decision::Throttle(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].window_sec, Some(1));
            assert_eq!(entries[0].count_limit, Some(2));
            assert_eq!(entries[0].count, 2);
        }
        Decision::Allow(_) => panic!("expected throttle on third hit"),
    }
}

// A bare 429 response installs a cooldown that throttles the next call.
#[tokio::test]
async fn cooldown_installed_by_429() {
    let (limiter, _container) = start_redis().await;

    let h = headers(&[
        ("x-rate-limit-type", "application"),
        ("date", "Wed, 02 Apr 2025 18:00:00 GMT"),
        ("retry-after", "120"),
    ]);

    let now = httpdate::parse_http_date("Wed, 02 Apr 2025 18:00:01 GMT").unwrap();
    // A bare 429 carries no quota headers, so the trailing `parse` step of
    // `refresh` reports header-malformed — the cooldown write in step 1 has
    // already happened by the time that surfaces.
    let refresh_result = limiter.refresh(&h, RoutingValue::Euw1, "/lol/summoner", now).await;
    assert!(refresh_result.is_err());

    let decision = limiter.hit(RoutingValue::Euw1, "/lol/summoner").await.expect("hit");
    match decision {
        Decision::Throttle(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].source, riot_ratelimit::Source::Cooldown);
            assert_eq!(entries[0].limit_type, riot_ratelimit::LimitType::Application);
            let ttl = entries[0].ttl.expect("ttl set");
            assert!((118..=120).contains(&ttl), "ttl={ttl} out of expected range");
        }
        Decision::Allow(_) => panic!("expected cooldown throttle"),
    }
}

// When multiple cooldowns are active at once, the largest positive TTL wins.
#[tokio::test]
async fn cooldown_dominance_picks_largest_ttl() {
    let (limiter, container) = start_redis().await;
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let config = Config { redis_url: format!("redis://{host}:{port}"), ..Config::default() };
    let pool = riot_ratelimit::store::pool::connect(&config).unwrap();

    let date = "Wed, 02 Apr 2025 18:00:00 GMT";
    let now = httpdate::parse_http_date(date).unwrap();

    let scopes: [(&str, &str, Option<&str>); 3] = [
        ("application", "120", None),
        ("service", "240", None),
        ("method", "60", Some("/lol/summoner")),
    ];
    for (scope, retry_after, endpoint) in scopes {
        let h = headers(&[
            ("x-rate-limit-type", scope),
            ("date", date),
            ("retry-after", retry_after),
        ]);
        cooldown::maybe_set(
            &pool,
            &h,
            RoutingValue::Euw1,
            endpoint.unwrap_or("/lol/summoner"),
            now,
            300,
        )
        .await
        .expect("maybe_set");
    }

    let decision = limiter.hit(RoutingValue::Euw1, "/lol/summoner").await.expect("hit");
    match decision {
        Decision::Throttle(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].limit_type, riot_ratelimit::LimitType::Service);
            let ttl = entries[0].ttl.expect("ttl set");
            assert!((235..=240).contains(&ttl), "ttl={ttl} out of expected range");
        }
        Decision::Allow(_) => panic!("expected cooldown throttle"),
    }
}

// Once a cooldown expires, a fresh hit falls through to the normal admission path.
#[tokio::test]
async fn expired_cooldown_permits_hit() {
    let (limiter, _container) = start_redis().await;

    let date = "Wed, 02 Apr 2025 18:00:00 GMT";
    let h = headers(&[
        ("x-rate-limit-type", "application"),
        ("date", date),
        ("retry-after", "1"),
    ]);
    let now = httpdate::parse_http_date(date).unwrap();
    // As above: no quota headers present, so `refresh` reports
    // header-malformed after the cooldown write has already landed.
    assert!(limiter.refresh(&h, RoutingValue::Euw1, "/lol/summoner", now).await.is_err());

    let throttled = limiter.hit(RoutingValue::Euw1, "/lol/summoner").await.expect("hit");
    assert!(matches!(throttled, Decision::Throttle(_)));

    tokio::time::sleep(Duration::from_secs(2)).await;

    let decision = limiter.hit(RoutingValue::Euw1, "/lol/summoner").await.expect("hit");
    assert!(matches!(decision, Decision::Allow(_)), "cooldown should have expired");
}

// A blind request is allowed through when no policy has been bootstrapped yet.
#[tokio::test]
async fn blind_request_when_policy_unknown() {
    let (limiter, _container) = start_redis().await;

    let decision = limiter.hit(RoutingValue::Euw1, "/lol/summoner").await.expect("hit");
    match decision {
        Decision::Allow(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].count, 0);
            assert_eq!(entries[0].source, riot_ratelimit::Source::Headers);
        }
        Decision::Throttle(_) => panic!("expected blind allow"),
    }
}
