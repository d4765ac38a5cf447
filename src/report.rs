//! Report-as-a-service invocation.

use crate::config::Endpoints;
use crate::gateway::HttpGateway;
use crate::transport::HttpRequest;
use tracing::{debug, error, warn};

/// Report-as-a-service invocation.
pub struct Reports<'a> {
    gateway: &'a HttpGateway,
    endpoints: &'a Endpoints,
}

impl<'a> Reports<'a> {
    pub fn new(gateway: &'a HttpGateway, endpoints: &'a Endpoints) -> Self {
        Self { gateway, endpoints }
    }

    /// URL of a delivered report, or of a custom report owned by `user`.
    pub fn report_url(&self, report: &str, user: Option<&str>) -> String {
        let raas = &self.endpoints.raas;
        let tenant = &self.endpoints.tenant_name;
        match user.filter(|user| !user.is_empty()) {
            Some(user) => format!("{raas}/customreport2/{tenant}/{user}/{report}"),
            None => format!("{raas}/systemreport2/{tenant}/{report}"),
        }
    }

    /// Runs a report and returns its body text, e.g. XML, JSON or CSV
    /// depending on `format`.
    pub async fn run_report(
        &self,
        report: &str,
        user: Option<&str>,
        params: &[(String, String)],
        format: Option<&str>,
    ) -> Option<String> {
        if user.map_or(true, str::is_empty) {
            warn!(report, "generating delivered report (systemreport2)");
        } else {
            debug!(report, user = ?user, "generating custom report");
        }

        let mut request = params
            .iter()
            .fold(HttpRequest::get(self.report_url(report, user)), |request, (name, value)| {
                request.query(name.as_str(), value)
            });
        if let Some(format) = format.filter(|format| !format.is_empty()) {
            request = request.query("format", format);
        }

        let response = self.gateway.send(request).await;
        if response.status == 200 {
            Some(response.text())
        } else {
            error!(report, status = response.status, body = %response.text(), "report failed");
            None
        }
    }
}
