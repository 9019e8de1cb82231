//! Sync module for annotool
//!
//! Routes create/read/update/delete operations on resources either to the
//! annotations REST API or to the local store.

mod dispatcher;
mod local;
pub mod request;
mod transport;

pub use dispatcher::SyncDispatcher;
pub use local::LocalStore;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

/// Logical operation requested on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Window of a collection read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub limit: usize,
    pub offset: usize,
}

impl Paging {
    pub fn query(&self) -> String {
        format!("limit={}&offset={}", self.limit, self.offset)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Caller adds the model to its collection only once the server confirmed it
    pub wait: bool,
}

/// What a successful model sync did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// POSTed to the collection; `add` tells the caller to insert it there now
    Created { add: bool },
    /// Instantiated from a template
    Copied { add: bool },
    Updated,
    Fetched,
    Deleted,
}

/// One page of a collection read
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total items on the server, unknown for bare-array responses
    pub count: Option<usize>,
    pub offset: usize,
}
