//! Mock API implementation directly using the `ticket-market-engine` crate

use std::sync::Arc;

use eyre::Result;
use ticket_market_core::{Config, RawRequest, Request, RequestHandler, RequestKind};
use ticket_market_engine::{Controller, Supervisor};
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};

use super::{Api, RequestMsg, Response};

pub struct MockController {
    controller: Arc<Controller>,
    join_handles: Vec<JoinHandle<()>>,
}

struct MockRawRequest {
    payload: Option<String>,
    kind: RequestKind,
    response_channel: oneshot::Sender<Response>,
}

pub async fn start(threads: u16, config: Config) -> Result<(MockController, Api, Arc<Supervisor>)> {
    let controller = Arc::new(
        tokio::task::spawn_blocking(move || ticket_market_engine::launch(&config)).await??,
    );
    let supervisor = controller.supervisor().clone();

    let it = (0..threads).map(|_| {
        let (sender, receiver) = flume::bounded::<RequestMsg>(65536);
        let controller = controller.clone();
        let handle = task::spawn_blocking(move || {
            let controller = &*controller;
            for msg in receiver.into_iter() {
                let raw = Box::new(MockRawRequest {
                    payload: msg.payload,
                    kind: msg.kind,
                    response_channel: msg.response_channel,
                });
                controller.handle(Request::from_raw(msg.kind, raw))
            }
        });
        (sender, handle)
    });
    let (senders, join_handles) = it.unzip();

    let mock_controller = MockController {
        controller,
        join_handles,
    };
    Ok((mock_controller, Api::new(senders), supervisor))
}

impl MockController {
    pub async fn shutdown(self) {
        for handle in self.join_handles {
            handle.await.unwrap()
        }
        task::spawn_blocking(move || Arc::into_inner(self.controller).unwrap().shutdown())
            .await
            .unwrap();
    }
}

impl RawRequest for MockRawRequest {
    fn url(&self) -> &str {
        use RequestKind::*;
        match self.kind {
            UpdateConfiguration => "/api/tickets/config",
            StartSystem => "/api/tickets/system/start",
            StopSystem => "/api/tickets/system/stop",
            ResetSystem => "/api/tickets/system/reset",
            SystemStatus => "/api/tickets/system/status",
            SystemLogs => "/api/tickets/system/logs",
            StartVendor => "/api/tickets/vendors/start",
            StartCustomer => "/api/tickets/customers/start",
            StopVendors => "/api/tickets/vendors/stop",
            StopCustomers => "/api/tickets/customers/stop",
            SaveConfiguration => "/api/configuration/save",
            LatestConfiguration => "/api/configuration/latest",
            Debug => "/api/debug",
        }
    }

    fn method(&self) -> ticket_market_core::RequestMethod {
        use ticket_market_core::RequestMethod::*;
        use RequestKind::*;
        match self.kind {
            SystemStatus | SystemLogs | LatestConfiguration => Get,
            _ => Post,
        }
    }

    fn read_bytes(&mut self) -> std::io::Result<Vec<u8>> {
        Ok(self.payload.take().unwrap_or_default().into_bytes())
    }

    fn read_string(&mut self) -> std::io::Result<String> {
        Ok(self.payload.take().unwrap_or_default())
    }

    fn respond_with_err(self: Box<Self>, msg: String) {
        self.response_channel.send(Response::Error(msg)).unwrap()
    }

    fn respond_with_failure(self: Box<Self>, msg: String) {
        self.response_channel.send(Response::Failure(msg)).unwrap()
    }

    fn respond_with_string(self: Box<Self>, s: String) {
        self.response_channel.send(Response::Text(s)).unwrap()
    }

    fn respond_with_json(self: Box<Self>, json: String) {
        self.response_channel.send(Response::Json(json)).unwrap()
    }
}
