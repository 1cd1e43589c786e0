//! HTTP front end for inspection submissions and the admin dashboard.

use chrono::Utc;
use firecheck::admin::{AdminConsole, AdminError, AdminGate, AdminSession};
use firecheck::submission::{SubmissionError, SubmissionService};
use firecheck::model::SubmitRequest;
use may_minihttp::{HttpServer, HttpService, Request, Response};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Read};
use std::sync::Arc;

const ADMIN_HEADER: &str = "x-admin-password";

#[derive(Clone)]
pub struct FirecheckService {
    submissions: SubmissionService,
    console: Arc<AdminConsole>,
    gate: Arc<AdminGate>,
}

impl FirecheckService {
    pub fn new(submissions: SubmissionService, console: AdminConsole, gate: AdminGate) -> Self {
        Self {
            submissions,
            console: Arc::new(console),
            gate: Arc::new(gate),
        }
    }

    fn submit(&self, body: &str, res: &mut Response) {
        let request: SubmitRequest = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(e) => {
                return reply(res, 400, "Bad Request", &json!({ "error": format!("Invalid submission: {e}") }));
            }
        };
        match self.submissions.submit(request) {
            Ok(accepted) => reply(res, 200, "OK", &accepted),
            Err(e) => {
                let (code, reason) = match &e {
                    SubmissionError::Invalid(_) => (400, "Bad Request"),
                    _ => (502, "Bad Gateway"),
                };
                let failed: Vec<&str> = match &e {
                    SubmissionError::PartiallyFailed { failed } => failed.iter().map(|k| k.as_str()).collect(),
                    _ => Vec::new(),
                };
                reply(res, code, reason, &json!({ "error": e.to_string(), "failed": failed }));
            }
        }
    }

    fn admin<T: Serialize>(
        &self,
        password: Option<&str>,
        res: &mut Response,
        op: impl FnOnce(&AdminConsole, &AdminSession) -> Result<T, AdminError>,
    ) {
        let session = match self.gate.authenticate(password.unwrap_or_default()) {
            Ok(s) => s,
            Err(AdminError::NotConfigured) => {
                return reply(res, 503, "Service Unavailable", &json!({ "error": AdminError::NotConfigured.to_string() }));
            }
            Err(e) => return reply(res, 401, "Unauthorized", &json!({ "error": e.to_string() })),
        };
        match op(&self.console, &session) {
            Ok(value) => reply(res, 200, "OK", &value),
            Err(e) => {
                log::error!("admin request failed: {e}");
                reply(res, 502, "Bad Gateway", &json!({ "error": e.to_string() }));
            }
        }
    }
}

impl HttpService for FirecheckService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let method = req.method().to_string();
        let path = req.path().split('?').next().unwrap_or_default().to_string();
        let password = req
            .headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(ADMIN_HEADER))
            .and_then(|h| std::str::from_utf8(h.value).ok())
            .map(str::to_string);
        log::debug!("{method} {path}");

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method.as_str(), segments.as_slice()) {
            ("GET", ["api", "health"]) => reply(res, 200, "OK", &json!({ "status": "ok" })),
            ("POST", ["api", "submit"]) => {
                let mut body = String::new();
                req.body().read_to_string(&mut body)?;
                self.submit(&body, res);
            }
            ("GET", ["api", "fleet-status"]) => {
                self.admin(password.as_deref(), res, |c, s| c.fleet_status(s));
            }
            ("GET", ["api", "defects"]) => {
                self.admin(password.as_deref(), res, |c, s| c.open_defects(s));
            }
            ("POST", ["api", "defects", number, "resolve"]) => match number.parse::<u64>() {
                Ok(n) => self.admin(password.as_deref(), res, |c, s| c.resolve_defect(s, n)),
                Err(_) => reply(res, 400, "Bad Request", &json!({ "error": "issue number must be numeric" })),
            },
            ("GET", ["api", "submissions"]) => {
                self.admin(password.as_deref(), res, |c, s| c.submissions_report(s, Utc::now()));
            }
            ("GET", ["api", "low-stock"]) => {
                self.admin(password.as_deref(), res, |c, s| c.low_stock(s, Utc::now()));
            }
            ("GET", ["api", "insights"]) => {
                self.admin(password.as_deref(), res, |c, s| c.insights(s));
            }
            ("GET", ["metrics"]) => match firecheck::metrics::METRICS.render() {
                Ok(text) => {
                    res.status_code(200, "OK");
                    res.header("Content-Type: text/plain; version=0.0.4; charset=utf-8");
                    res.body_vec(text.into_bytes());
                }
                Err(e) => {
                    log::error!("failed to encode metrics: {e}");
                    res.status_code(500, "Internal Server Error");
                }
            },
            _ => reply(res, 404, "Not Found", &json!({ "error": "not found" })),
        }
        Ok(())
    }
}

fn reply<T: Serialize>(res: &mut Response, code: usize, reason: &'static str, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            res.status_code(code, reason);
            res.header("Content-Type: application/json");
            res.body_vec(body);
        }
        Err(e) => {
            log::error!("failed to encode response: {e}");
            res.status_code(500, "Internal Server Error");
        }
    }
}

/// Serve until the listener stops.
pub fn run(service: FirecheckService, bind: &str) -> anyhow::Result<()> {
    let server = HttpServer(service)
        .start(bind)
        .map_err(|e| anyhow::anyhow!("Failed to start server on {bind}: {e}"))?;
    log::info!("firecheck listening on http://{bind}");
    server
        .join()
        .map_err(|e| anyhow::anyhow!("Server encountered an error: {e:?}"))?;
    Ok(())
}
