use std::io;

/// Kind of the request
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum RequestKind {
    /// Apply a partial configuration change
    ///
    /// The payload is a JSON object with the optional fields `totalTickets`,
    /// `ticketReleaseRate`, `customerRetrievalRate`, `maxTicketCapacity`,
    /// `releaseIntervalMs`, `retrievalIntervalMs` and `enforceTicketBudget`.
    /// A running market is stopped before the change is applied.
    UpdateConfiguration,

    /// Start the market with the current configuration
    StartSystem,

    /// Stop all vendors and customers
    StopSystem,

    /// Stop the market and replace the pool with an empty one
    ResetSystem,

    /// Retrieve a JSON snapshot of pool and actor statistics
    SystemStatus,

    /// Retrieve the most recent activity log entries as JSON
    SystemLogs,

    /// Spawn one additional vendor
    StartVendor,

    /// Spawn one additional customer
    StartCustomer,

    /// Stop every live vendor
    StopVendors,

    /// Stop every live customer
    StopCustomers,

    /// Store the configuration in the payload as a new record
    SaveConfiguration,

    /// Retrieve the most recently stored configuration record
    LatestConfiguration,

    /// Useful for sending information for debugging
    Debug,
}

/// Request sent from a web browser or another front end
pub struct Request {
    kind: RequestKind,
    raw: Box<dyn RawRequest + Send>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("raw", &format_args!(".."))
            .finish()
    }
}

/// HTTP request method
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RequestMethod {
    /// GET request
    Get,
    /// POST request, may have a payload
    Post,
}

/// Interface for handling requests from a front end
pub trait RequestHandler {
    /// Handle a single request
    ///
    /// This method may be called concurrently from different threads.
    fn handle(&self, request: Request);

    /// Shut the ticket market down
    ///
    /// This method waits for all threads spawned for vendors and customers to
    /// have terminated.
    fn shutdown(self);
}

/// A raw request, implemented by the transport
pub trait RawRequest {
    /// Get the URL
    fn url(&self) -> &str;
    /// Get the request method
    fn method(&self) -> RequestMethod;

    /// Read the request body as bytes
    fn read_bytes(&mut self) -> io::Result<Vec<u8>>;
    /// Read the request body as string
    fn read_string(&mut self) -> io::Result<String>;

    /// Respond with a client error message (invalid input or state)
    fn respond_with_err(self: Box<Self>, err: String);
    /// Respond with a server side failure
    fn respond_with_failure(self: Box<Self>, err: String);
    /// Respond with a plain string
    fn respond_with_string(self: Box<Self>, s: String);
    /// Respond with a serialized JSON document
    fn respond_with_json(self: Box<Self>, json: String);
}

impl Request {
    /// Get the request's kind
    #[inline]
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Get the request URL
    ///
    /// Note that this returns the full URL, e.g., `/api/debug/my-command`.
    #[inline]
    #[allow(unused)]
    pub fn url(&self) -> &str {
        self.raw.url()
    }

    /// Get the request method
    #[inline]
    #[allow(unused)]
    pub fn method(&self) -> RequestMethod {
        self.raw.method()
    }

    /// Read the payload as bytes
    ///
    /// Returns [`Err`] in case of a communication error. See
    /// [`std::io::Read::read_to_end()`] for more details. This method has side
    /// effects and should be called only once per request.
    #[inline]
    #[allow(unused)]
    pub fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.raw.read_bytes()
    }

    /// Read the payload as a UTF-8 string
    ///
    /// Returns [`Err`] if the payload is invalid UTF-8 or in case of a
    /// communication error. Like [`Self::read_bytes()`], this method has side
    /// effects and should be called only once per request.
    #[inline]
    pub fn read_string(&mut self) -> io::Result<String> {
        self.raw.read_string()
    }

    /// Respond with an error indicating an invalid request to the client.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_err(self, err: impl Into<String>) {
        self.raw.respond_with_err(err.into());
    }

    /// Respond with an error indicating that the server failed.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_failure(self, err: impl Into<String>) {
        self.raw.respond_with_failure(err.into());
    }

    /// Respond with an arbitrary string
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_string(self, s: impl Into<String>) {
        self.raw.respond_with_string(s.into());
    }

    /// Respond with an already serialized JSON document
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_json(self, json: impl Into<String>) {
        self.raw.respond_with_json(json.into());
    }

    /// Create a new request from a [`RawRequest`]
    ///
    /// Used by transports; handlers only ever receive finished requests.
    #[inline]
    pub fn from_raw(kind: RequestKind, raw: Box<dyn RawRequest + Send>) -> Self {
        Self { kind, raw }
    }
}
