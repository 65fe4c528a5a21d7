mod common;

use common::{offline_cache, ScriptedNetwork};
use std::time::Duration;

use osteocache_core::offline::SHELL_DOCUMENT;
use osteocache_core::{
    CacheError, Destination, FetchError, InterceptOutcome, LifecycleState, Request,
};
use reqwest::Method;

#[tokio::test]
async fn live_response_is_cached_for_offline_use() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route("/data/anatomy.json", 200, br#"[{"id":1}]"#.to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    let live = match cache.intercept(Request::for_url("/data/anatomy.json")).await {
        InterceptOutcome::LiveHit(response) => response,
        other => panic!("expected live hit, got {:?}", other),
    };
    assert_eq!(live.status, 200);
    cache.settle().await;

    network.set_online(false);
    let cached = match cache.intercept(Request::for_url("/data/anatomy.json")).await {
        InterceptOutcome::CacheHit(cached) => cached,
        other => panic!("expected cache hit, got {:?}", other),
    };
    assert_eq!(cached.response.body, live.body);
    assert_eq!(cached.response.status, 200);
}

#[tokio::test]
async fn online_requests_always_go_to_the_network() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route("/style.css", 200, b"v1".to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    cache.intercept(Request::for_url("/style.css")).await;
    cache.settle().await;
    network.route("/style.css", 200, b"v2".to_vec());

    let outcome = cache.intercept(Request::for_url("/style.css")).await;
    assert_eq!(outcome.response().unwrap().body, b"v2".to_vec());
    assert_eq!(network.calls(), 2);
    cache.settle().await;

    // The refreshed copy replaced the old one
    network.set_online(false);
    let outcome = cache.intercept(Request::for_url("/style.css")).await;
    assert_eq!(outcome.response().unwrap().body, b"v2".to_vec());
}

#[tokio::test]
async fn uncached_navigation_offline_gets_shell_document() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route(SHELL_DOCUMENT, 200, b"<html>shell</html>".to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    cache.intercept(Request::navigate(SHELL_DOCUMENT)).await;
    cache.settle().await;

    network.set_online(false);
    let shell = match cache.intercept(Request::navigate("/cases/17")).await {
        InterceptOutcome::ShellFallback(shell) => shell,
        other => panic!("expected shell fallback, got {:?}", other),
    };
    assert_eq!(shell.response.body, b"<html>shell</html>".to_vec());
    assert_eq!(shell.response.url, SHELL_DOCUMENT);
}

#[tokio::test]
async fn uncached_subresource_offline_fails() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route(SHELL_DOCUMENT, 200, b"<html>shell</html>".to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    cache.intercept(Request::navigate(SHELL_DOCUMENT)).await;
    cache.settle().await;

    network.set_online(false);
    let outcome = cache
        .intercept(Request::get("/img/pelvis.png", Destination::Image))
        .await;
    assert!(matches!(
        outcome,
        InterceptOutcome::Failure(CacheError::Fetch(FetchError::Network(_)))
    ));
}

#[tokio::test]
async fn uncached_navigation_without_shell_fails() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.set_online(false);
    let cache = offline_cache(&network, dir.path(), "v1");

    let outcome = cache.intercept(Request::navigate("/")).await;
    assert!(outcome.into_result().is_err());
}

#[tokio::test]
async fn error_statuses_are_returned_but_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    let cache = offline_cache(&network, dir.path(), "v1");

    let response = match cache.intercept(Request::for_url("/data/missing.json")).await {
        InterceptOutcome::LiveHit(response) => response,
        other => panic!("expected live 404, got {:?}", other),
    };
    assert_eq!(response.status, 404);
    cache.settle().await;

    let bucket = cache.current_bucket().await.unwrap();
    assert!(bucket.urls().await.unwrap().is_empty());
}

#[tokio::test]
async fn error_status_never_replaces_a_cached_copy() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route("/data/techniques.json", 200, br#"[{"id":3}]"#.to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    cache.intercept(Request::for_url("/data/techniques.json")).await;
    cache.settle().await;

    network.route("/data/techniques.json", 500, b"server error".to_vec());
    let outcome = cache.intercept(Request::for_url("/data/techniques.json")).await;
    assert_eq!(outcome.response().unwrap().status, 500);
    cache.settle().await;

    network.set_online(false);
    let cached = match cache.intercept(Request::for_url("/data/techniques.json")).await {
        InterceptOutcome::CacheHit(cached) => cached,
        other => panic!("expected cache hit, got {:?}", other),
    };
    assert_eq!(cached.response.status, 200);
    assert_eq!(cached.response.body, br#"[{"id":3}]"#.to_vec());
}

#[tokio::test]
async fn failed_cache_write_still_serves_live_response() {
    let dir = tempfile::tempdir().unwrap();
    // A plain file where the bucket directory should go
    std::fs::write(dir.path().join("v1"), b"").unwrap();
    let network = ScriptedNetwork::online();
    network.route("/style.css", 200, b"body{}".to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    let live = match cache.intercept(Request::for_url("/style.css")).await {
        InterceptOutcome::LiveHit(response) => response,
        other => panic!("expected live hit, got {:?}", other),
    };
    assert_eq!(live.body, b"body{}".to_vec());
    cache.settle().await;

    assert!(cache.storage().keys().await.unwrap().is_empty());
    network.set_online(false);
    assert!(matches!(
        cache.intercept(Request::for_url("/style.css")).await,
        InterceptOutcome::Failure(_)
    ));
}

#[tokio::test]
async fn pending_writes_survive_dropping_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route("/style.css", 200, b"body{}".to_vec());

    let cache = offline_cache(&network, dir.path(), "v1");
    assert!(matches!(
        cache.intercept(Request::for_url("/style.css")).await,
        InterceptOutcome::LiveHit(_)
    ));
    drop(cache);

    // Give the detached write a chance to run
    let bucket = offline_cache(&network, dir.path(), "v1").current_bucket().await.unwrap();
    for _ in 0..200 {
        if bucket.match_url("/style.css").await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    network.set_online(false);
    let reopened = offline_cache(&network, dir.path(), "v1");
    let cached = match reopened.intercept(Request::for_url("/style.css")).await {
        InterceptOutcome::CacheHit(cached) => cached,
        other => panic!("expected cache hit, got {:?}", other),
    };
    assert_eq!(cached.response.body, b"body{}".to_vec());
}

#[tokio::test]
async fn non_get_requests_bypass_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::online();
    network.route("/data/quizzes.json", 200, b"[]".to_vec());
    let cache = offline_cache(&network, dir.path(), "v1");

    let post = Request::new(Method::POST, "/data/quizzes.json", Destination::Data);
    assert!(matches!(
        cache.intercept(post.clone()).await,
        InterceptOutcome::LiveHit(_)
    ));
    cache.settle().await;
    assert!(cache.current_bucket().await.unwrap().urls().await.unwrap().is_empty());

    // Even with a cached GET for the same URL, an offline POST fails
    cache.intercept(Request::for_url("/data/quizzes.json")).await;
    cache.settle().await;
    network.set_online(false);
    assert!(matches!(
        cache.intercept(post).await,
        InterceptOutcome::Failure(_)
    ));
}

#[tokio::test]
async fn install_seeds_every_manifest_url() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::serving_manifest();
    let cache = offline_cache(&network, dir.path(), "v1");

    let seeded = cache.install().await.unwrap();
    assert_eq!(seeded, cache.settings().manifest.len());
    assert_eq!(cache.state(), LifecycleState::Installed);

    let mut expected = cache.settings().manifest.clone();
    expected.sort();
    assert_eq!(cache.current_bucket().await.unwrap().urls().await.unwrap(), expected);

    network.set_online(false);
    let outcome = cache.intercept(Request::for_url("/app.js")).await;
    assert!(matches!(outcome, InterceptOutcome::CacheHit(_)));
    assert_eq!(outcome.response().unwrap().text(), "content of /app.js");
}

#[tokio::test]
async fn install_is_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::serving_manifest();
    network.unroute("/data/cases.json");
    let cache = offline_cache(&network, dir.path(), "v1");

    let err = cache.install().await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::BadStatus { ref url, status: 404 } if url == "/data/cases.json"
    ));
    assert_eq!(cache.state(), LifecycleState::New);
    assert!(cache.storage().keys().await.unwrap().is_empty());
    assert!(matches!(cache.activate().await, Err(CacheError::NotInstalled)));
}

#[tokio::test]
async fn install_offline_fails_with_seed_error() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::serving_manifest();
    network.set_online(false);
    let cache = offline_cache(&network, dir.path(), "v1");

    assert!(matches!(
        cache.install().await,
        Err(CacheError::Seed { .. })
    ));
}

#[tokio::test]
async fn install_write_failure_leaves_no_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::serving_manifest();
    let cache = offline_cache(&network, dir.path(), "v1");

    // A directory squatting on one entry's metadata file makes its write fail
    let key = Request::for_url("/app.js").cache_key();
    let blocker = dir.path().join("v1").join(format!("{}.json", key));
    std::fs::create_dir_all(blocker.join("inner")).unwrap();

    assert!(matches!(cache.install().await, Err(CacheError::Storage(_))));
    assert_eq!(cache.state(), LifecycleState::New);
    assert!(cache.storage().keys().await.unwrap().is_empty());
    assert!(cache.storage().active_tag().await.unwrap().is_none());
}

#[tokio::test]
async fn failed_upgrade_keeps_serving_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::serving_manifest();

    let old = offline_cache(&network, dir.path(), "v1");
    old.install().await.unwrap();
    old.activate().await.unwrap();

    network.unroute("/data/cases.json");
    let new = offline_cache(&network, dir.path(), "v2");
    assert!(new.install().await.is_err());
    assert_eq!(new.serving_tag().await, "v1");

    // Live traffic keeps refreshing the v1 bucket
    network.route("/style.css", 200, "restyled");
    assert!(matches!(
        new.intercept(Request::for_url("/style.css")).await,
        InterceptOutcome::LiveHit(_)
    ));
    new.settle().await;
    assert_eq!(new.storage().keys().await.unwrap(), vec!["v1".to_string()]);

    network.set_online(false);
    let outcome = new.intercept(Request::for_url("/app.js")).await;
    assert!(matches!(outcome, InterceptOutcome::CacheHit(_)));
    assert_eq!(outcome.response().unwrap().text(), "content of /app.js");
    let outcome = new.intercept(Request::for_url("/style.css")).await;
    assert_eq!(outcome.response().unwrap().text(), "restyled");

    // Once an install succeeds, the new version takes over
    network.set_online(true);
    network.route("/data/cases.json", 200, "content of /data/cases.json");
    new.install().await.unwrap();
    assert_eq!(new.serving_tag().await, "v2");
}

#[tokio::test]
async fn activation_purges_stale_versions() {
    let dir = tempfile::tempdir().unwrap();
    let network = ScriptedNetwork::serving_manifest();

    let old = offline_cache(&network, dir.path(), "v1");
    old.install().await.unwrap();
    old.activate().await.unwrap();
    assert_eq!(old.storage().keys().await.unwrap(), vec!["v1".to_string()]);

    let new = offline_cache(&network, dir.path(), "v2");
    new.install().await.unwrap();
    assert_eq!(new.serving_tag().await, "v2");
    let purged = new.activate().await.unwrap();

    assert_eq!(purged, vec!["v1".to_string()]);
    assert_eq!(new.storage().keys().await.unwrap(), vec!["v2".to_string()]);
    assert_eq!(new.state(), LifecycleState::Activated);

    // Activating again has nothing left to purge
    assert!(new.activate().await.unwrap().is_empty());
}
