//! 🏗 HTTP request implementation

use std::io;
use std::io::Read;

use ticket_market_core::RequestKind;
use tiny_http::{Header, Response};
use tracing::warn;

/// Route of the status update stream, served by the broadcaster
pub const UPDATES_URL: &str = "/api/tickets/system/updates";

const ROUTES: &str = "🦀 could not find the service you are looking for!

Valid requests are:
  POST /api/tickets/config
  POST /api/tickets/system/start
  POST /api/tickets/system/stop
  POST /api/tickets/system/reset
  GET  /api/tickets/system/status
  GET  /api/tickets/system/logs
  GET  /api/tickets/system/updates
  POST /api/tickets/vendors/start
  POST /api/tickets/vendors/stop
  POST /api/tickets/customers/start
  POST /api/tickets/customers/stop
  POST /api/configuration/save
  GET  /api/configuration/latest
  GET  /api/debug(.*)
  POST /api/debug(.*)";

pub struct HTTPRequest(tiny_http::Request);

/// A parsed HTTP request
pub enum Parsed {
    /// Request for the ticket market itself
    Market(ticket_market_core::Request),
    /// Wait for the next status broadcast
    Updates(HTTPRequest),
}

impl ticket_market_core::RawRequest for HTTPRequest {
    fn url(&self) -> &str {
        self.0.url()
    }

    fn method(&self) -> ticket_market_core::RequestMethod {
        match self.0.method() {
            tiny_http::Method::Get => ticket_market_core::RequestMethod::Get,
            tiny_http::Method::Post => ticket_market_core::RequestMethod::Post,
            _ => unreachable!(),
        }
    }

    fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.0.body_length().unwrap_or(0));
        self.0.as_reader().read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_string(&mut self) -> io::Result<String> {
        let mut s = String::with_capacity(self.0.body_length().unwrap_or(0));
        self.0.as_reader().read_to_string(&mut s)?;
        Ok(s)
    }

    fn respond_with_err(self: Box<Self>, err: String) {
        self.respond(Response::from_string(err).with_status_code(400))
    }

    fn respond_with_failure(self: Box<Self>, err: String) {
        self.respond(Response::from_string(err).with_status_code(500))
    }

    fn respond_with_string(self: Box<Self>, s: String) {
        self.respond(Response::from_string(s).with_status_code(200))
    }

    fn respond_with_json(self: Box<Self>, json: String) {
        let mut res = Response::from_string(json).with_status_code(200);
        if let Ok(header) = Header::from_bytes(b"Content-Type", b"application/json") {
            res.add_header(header);
        }
        self.respond(res)
    }
}

impl HTTPRequest {
    /// Add CORS headers to `res` and send it
    pub fn respond<R: Read>(self, mut res: Response<R>) {
        add_response_cors_headers(&mut res);
        if let Err(e) = self.0.respond(res) {
            warn!("HTTP response failed: {e}");
        }
    }
}

/// Parse the given HTTP request
///
/// If [`None`] is returned, the request was already answered with a
/// corresponding error message.
pub fn parse(rq: tiny_http::Request) -> Option<Parsed> {
    use tiny_http::Method::*;

    let kind = match (rq.method(), rq.url()) {
        (Options, _) => {
            HTTPRequest(rq).respond(Response::empty(204));
            return None;
        }
        (Post, "/api/tickets/config") => RequestKind::UpdateConfiguration,
        (Post, "/api/tickets/system/start") => RequestKind::StartSystem,
        (Post, "/api/tickets/system/stop") => RequestKind::StopSystem,
        (Post, "/api/tickets/system/reset") => RequestKind::ResetSystem,
        (Get, "/api/tickets/system/status") => RequestKind::SystemStatus,
        (Get, "/api/tickets/system/logs") => RequestKind::SystemLogs,
        (Get, UPDATES_URL) => return Some(Parsed::Updates(HTTPRequest(rq))),
        (Post, "/api/tickets/vendors/start") => RequestKind::StartVendor,
        (Post, "/api/tickets/vendors/stop") => RequestKind::StopVendors,
        (Post, "/api/tickets/customers/start") => RequestKind::StartCustomer,
        (Post, "/api/tickets/customers/stop") => RequestKind::StopCustomers,
        (Post, "/api/configuration/save") => RequestKind::SaveConfiguration,
        (Get, "/api/configuration/latest") => RequestKind::LatestConfiguration,
        (Get, url) | (Post, url) => {
            if url.starts_with("/api/debug") {
                RequestKind::Debug
            } else {
                HTTPRequest(rq).respond(Response::from_string(ROUTES).with_status_code(404));
                return None;
            }
        }
        _ => {
            HTTPRequest(rq).respond(Response::empty(405));
            return None;
        }
    };

    Some(Parsed::Market(ticket_market_core::Request::from_raw(
        kind,
        Box::new(HTTPRequest(rq)),
    )))
}

/// Add CORS headers to `res`
fn add_response_cors_headers<R: Read>(res: &mut Response<R>) {
    let headers: [(&[u8], &[u8]); 4] = [
        (b"Access-Control-Request-Method", b"*"),
        (b"Access-Control-Allow-Origin", b"*"),
        (b"Access-Control-Allow-Headers", b"*"),
        (b"Access-Control-Expose-Headers", b"*"),
    ];
    for (field, value) in headers {
        if let Ok(header) = Header::from_bytes(field, value) {
            res.add_header(header);
        }
    }
}
