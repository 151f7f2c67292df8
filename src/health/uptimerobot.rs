use super::{
    HealthOracle,
    HealthVerdict,
};
use crate::error::ApiError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const GET_MONITORS_URL: &str = "https://api.uptimerobot.com/v2/getMonitors";

/// `status` value UptimeRobot uses for a monitor that is up.
pub const MONITOR_STATUS_UP: i64 = 2;

#[derive(Debug, Deserialize)]
struct GetMonitorsResponse {
    stat: String,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    monitors: Option<Vec<MonitorInfo>>,
}

#[derive(Debug, Deserialize)]
struct MonitorInfo {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    status: Option<i64>,
}

/// Health oracle backed by the UptimeRobot v2 api.
#[derive(Clone)]
pub struct UptimeRobotApi {
    client: reqwest::Client,
    api_key: String,
}

impl UptimeRobotApi {
    pub fn new(api_key: impl ToString, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::from_reqwest(GET_MONITORS_URL, err))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    async fn get_monitor(&self, monitor_id: &str) -> Result<String, ApiError> {
        let res = self
            .client
            .post(GET_MONITORS_URL)
            .form(&[
                ("api_key", self.api_key.as_str()),
                ("monitors", monitor_id),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|err| ApiError::from_reqwest(GET_MONITORS_URL, err))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|err| ApiError::from_reqwest(GET_MONITORS_URL, err))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: GET_MONITORS_URL.to_string(),
                status,
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl HealthOracle for UptimeRobotApi {
    async fn check_status(&self, monitor_id: &str) -> HealthVerdict {
        match self.get_monitor(monitor_id).await {
            Ok(body) => verdict_from_body(monitor_id, &body),
            Err(err) => {
                error!(monitor_id, "Error checking monitor: {err}");
                HealthVerdict::Unknown
            }
        }
    }
}

/// Interpret a `getMonitors` response for `monitor_id`.
pub fn verdict_from_body(monitor_id: &str, body: &str) -> HealthVerdict {
    match parse_status(monitor_id, body) {
        Ok(MONITOR_STATUS_UP) => HealthVerdict::Up,
        Ok(status) => {
            debug!(monitor_id, status, "monitor is not up");
            HealthVerdict::Down
        }
        Err(err) => {
            error!(monitor_id, "Unexpected UptimeRobot API response: {err}");
            HealthVerdict::Unknown
        }
    }
}

fn parse_status(monitor_id: &str, body: &str) -> Result<i64, ApiError> {
    let response: GetMonitorsResponse =
        serde_json::from_str(body).map_err(|err| ApiError::malformed(GET_MONITORS_URL, err))?;

    if response.stat != "ok" {
        return Err(ApiError::Rejected {
            endpoint: GET_MONITORS_URL.to_string(),
            errors: response.error.unwrap_or_default().to_string(),
        });
    }

    let monitors = response.monitors.unwrap_or_default();

    if monitors.is_empty() {
        return Err(ApiError::malformed(GET_MONITORS_URL, "empty monitor list"));
    }

    // the request is filtered by id, fall back to the first entry only if no ids are echoed
    let monitor = if monitors.iter().any(|it| it.id.is_some()) {
        monitors
            .iter()
            .find(|it| it.id.as_ref().is_some_and(|id| id_matches(id, monitor_id)))
            .ok_or_else(|| ApiError::malformed(GET_MONITORS_URL, "requested monitor not in response"))?
    } else {
        &monitors[0]
    };

    trace!(monitor_id, name = ?monitor.friendly_name, status = ?monitor.status, "monitor");

    monitor
        .status
        .ok_or_else(|| ApiError::malformed(GET_MONITORS_URL, "monitor without status"))
}

fn id_matches(id: &Value, monitor_id: &str) -> bool {
    match id {
        Value::Number(n) => n.to_string() == monitor_id,
        Value::String(s) => s == monitor_id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(monitors: &str) -> String {
        format!(r#"{{"stat":"ok","pagination":{{"offset":0,"limit":50,"total":1}},"monitors":{monitors}}}"#)
    }

    #[test]
    fn status_two_is_up() {
        let body = response(r#"[{"id":797680283,"friendly_name":"backend","url":"https://example.com","status":2}]"#);
        assert_eq!(verdict_from_body("797680283", &body), HealthVerdict::Up);
    }

    #[test]
    fn other_statuses_are_down() {
        for status in [0, 1, 8, 9] {
            let body = response(&format!(r#"[{{"id":797680283,"status":{status}}}]"#));
            assert_eq!(verdict_from_body("797680283", &body), HealthVerdict::Down, "status {status}");
        }
    }

    #[test]
    fn picks_the_requested_monitor() {
        let body = response(r#"[{"id":1,"status":9},{"id":797680283,"status":2}]"#);
        assert_eq!(verdict_from_body("797680283", &body), HealthVerdict::Up);

        let body = response(r#"[{"status":9}]"#);
        assert_eq!(verdict_from_body("797680283", &body), HealthVerdict::Down);
    }

    #[test]
    fn other_monitor_is_unknown() {
        let body = response(r#"[{"id":111,"status":9}]"#);
        assert_eq!(verdict_from_body("797680283", &body), HealthVerdict::Unknown);

        let body = response(r#"[{"id":111,"status":2},{"status":9}]"#);
        assert_eq!(verdict_from_body("797680283", &body), HealthVerdict::Unknown);
    }

    #[test]
    fn empty_list_is_unknown() {
        assert_eq!(verdict_from_body("797680283", &response("[]")), HealthVerdict::Unknown);
    }

    #[test]
    fn broken_responses_are_unknown() {
        let cases = [
            "",
            "not json",
            r#"{"stat":"fail","error":{"type":"invalid_parameter","message":"api_key is wrong"}}"#,
            r#"{"stat":"ok"}"#,
            r#"{"stat":"ok","monitors":[{"id":797680283}]}"#,
            r#"{"stat":"ok","monitors":[{"id":797680283,"status":"up"}]}"#,
        ];
        for case in cases {
            assert_eq!(verdict_from_body("797680283", case), HealthVerdict::Unknown, "{case:?}");
        }
    }
}
