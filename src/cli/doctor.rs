//! Configuration and reachability checks for `snap-wallet doctor`.

use std::time::Duration;

use crate::config::{AccountPolicy, SnapWalletConfig};

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

pub(super) async fn run_doctor(config: &SnapWalletConfig, strict: bool) -> anyhow::Result<()> {
    println!("snap-wallet doctor");
    println!("==================\n");
    println!("  snap id:             {}", config.snap_id);
    println!("  missing snap policy: {}", config.missing_snap_policy.as_str());
    println!("  account policy:      {}", config.account_policy.as_str());
    println!();

    let mut passed = 0u32;
    let mut failed = 0u32;

    check(
        "Snap id",
        check_snap_id(&config.snap_id),
        &mut passed,
        &mut failed,
    );

    let probe_timeout = config.lookup_timeout.min(Duration::from_secs(10));
    check(
        "Account lookup service",
        if config.account_policy == AccountPolicy::LookupAndPrompt {
            probe_http_endpoint(&config.lookup_service_url, probe_timeout).await
        } else {
            CheckResult::Skip("account lookup disabled".to_string())
        },
        &mut passed,
        &mut failed,
    );

    check(
        "Account creation service",
        probe_http_endpoint(&config.creation_service_url, probe_timeout).await,
        &mut passed,
        &mut failed,
    );

    println!();
    println!("  {passed} passed, {failed} failed");
    if failed > 0 && strict {
        anyhow::bail!("{failed} doctor checks failed");
    }
    Ok(())
}

fn check_snap_id(snap_id: &str) -> CheckResult {
    if snap_id.starts_with("npm:") {
        CheckResult::Pass(snap_id.to_string())
    } else if snap_id.starts_with("local:") {
        CheckResult::Pass(format!("{snap_id} (local development snap)"))
    } else {
        CheckResult::Fail(format!(
            "'{snap_id}' is neither an npm: nor a local: snap id"
        ))
    }
}

async fn probe_http_endpoint(endpoint: &str, timeout: Duration) -> CheckResult {
    let url = match reqwest::Url::parse(endpoint.trim()) {
        Ok(url) => url,
        Err(e) => return CheckResult::Fail(format!("invalid URL ({endpoint}): {e}")),
    };

    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => return CheckResult::Fail(format!("cannot construct HTTP client: {e}")),
    };

    match client.get(url.clone()).send().await {
        Ok(response) if response.status().is_server_error() => CheckResult::Fail(format!(
            "reachable but unhealthy ({} at {url})",
            response.status()
        )),
        Ok(response) => CheckResult::Pass(format!("{url} ({})", response.status())),
        Err(e) if e.is_timeout() => CheckResult::Fail(format!("{url} timed out")),
        Err(e) => CheckResult::Fail(format!("{url} unreachable: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_id_check_accepts_npm_and_local() {
        assert!(matches!(check_snap_id("npm:@example/snap"), CheckResult::Pass(_)));
        assert!(matches!(
            check_snap_id("local:http://localhost:8080"),
            CheckResult::Pass(_)
        ));
        assert!(matches!(check_snap_id("snap"), CheckResult::Fail(_)));
    }

    #[tokio::test]
    async fn endpoint_check_rejects_invalid_url() {
        let result = probe_http_endpoint("not a url", Duration::from_secs(1)).await;
        assert!(matches!(result, CheckResult::Fail(ref detail) if detail.contains("invalid URL")));
    }

    #[tokio::test]
    async fn strict_doctor_fails_on_bad_snap_id() {
        let config = SnapWalletConfig {
            snap_id: "snap".to_string(),
            lookup_service_url: "http://127.0.0.1:9".to_string(),
            creation_service_url: "http://127.0.0.1:9".to_string(),
            lookup_timeout: Duration::from_millis(200),
            ..SnapWalletConfig::default()
        };
        let err = run_doctor(&config, true).await.unwrap_err();
        assert!(err.to_string().contains("doctor checks failed"));
        assert!(run_doctor(&config, false).await.is_ok());
    }
}
