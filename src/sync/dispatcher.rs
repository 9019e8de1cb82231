//! Operation routing for resources and collections

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::Profile;
use crate::context::AppContext;
use crate::resource::{
    Annotation, Attributes, Comment, Persistable, ReadySignal, Track, WireOptions,
};
use crate::sync::request::{auth_headers, flatten_body, join_url, sanitize_url, with_paging};
use crate::sync::{
    HttpRequest, HttpResponse, LocalStore, Method, Operation, Page, Paging, ReqwestTransport,
    SyncOptions, SyncOutcome, Transport,
};
use crate::tracks::AnnotationSource;
use crate::{AnnotoolError, Result};

/// Turns resource operations into backend calls.
///
/// Every call completes before it returns; two calls issued concurrently
/// without awaiting each other have no ordering guarantee.
pub struct SyncDispatcher {
    ctx: Arc<AppContext>,
    transport: Arc<dyn Transport>,
    local: Option<Mutex<LocalStore>>,
}

impl SyncDispatcher {
    pub fn new(ctx: Arc<AppContext>, transport: Arc<dyn Transport>) -> Self {
        Self {
            ctx,
            transport,
            local: None,
        }
    }

    pub fn with_local_store(mut self, store: LocalStore) -> Self {
        self.local = Some(Mutex::new(store));
        self
    }

    /// Build the dispatcher the configured profile needs
    pub fn from_context(ctx: Arc<AppContext>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::from_settings(&ctx.settings)?);
        let local_profile = ctx.settings.backend.profile == Profile::Local;
        let dispatcher = Self::new(ctx.clone(), transport);

        if local_profile {
            info!(path = %ctx.settings.database_path().display(), "using local store");
            return Ok(dispatcher.with_local_store(LocalStore::open(&ctx.settings)?));
        }
        Ok(dispatcher)
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Run `op` against a single model
    pub async fn sync<T: Persistable>(
        &self,
        op: Operation,
        model: &mut T,
        opts: SyncOptions,
    ) -> Result<SyncOutcome> {
        if self.routes_local::<T>() {
            return self.sync_local(op, model, opts);
        }

        match op {
            Operation::Create | Operation::Update => {
                let state = model.sync_state();
                if state.to_create && !T::NO_POST {
                    match state.copy_url.clone() {
                        Some(copy_url) => self.copy(model, &copy_url).await,
                        None => self.create(model, opts).await,
                    }
                } else {
                    self.update(model).await
                }
            }
            Operation::Read => self.read(model).await,
            Operation::Delete => self.delete(model).await,
        }
    }

    /// Create or update depending on whether the model was persisted
    pub async fn save<T: Persistable>(&self, model: &mut T, opts: SyncOptions) -> Result<SyncOutcome> {
        let op = if model.sync_state().to_create {
            Operation::Create
        } else {
            Operation::Update
        };
        self.sync(op, model, opts).await
    }

    pub async fn destroy<T: Persistable>(&self, model: &mut T) -> Result<SyncOutcome> {
        self.sync(Operation::Delete, model, SyncOptions::default()).await
    }

    /// Read one page of the collection at `collection_url`
    pub async fn fetch<T: Persistable>(
        &self,
        collection_url: &str,
        paging: Option<Paging>,
    ) -> Result<Page<T>> {
        let collection_url = collection_url.trim_matches('/');

        if self.routes_local::<T>() {
            let (items, count) = self.local_store()?.list(collection_url, paging)?;
            let items = items
                .iter()
                .map(|attrs| self.build::<T>(attrs, collection_url))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Page {
                items,
                count: Some(count),
                offset: paging.map_or(0, |p| p.offset),
            });
        }

        let path = with_paging(collection_url, paging);
        let response = self.execute(Method::Get, &path, None).await?;
        let response = expect_success(Method::Get, &path, response)?;
        self.parse_page(&response.body, collection_url, paging)
    }

    /// Read every page of a collection
    pub async fn fetch_all<T: Persistable>(&self, collection_url: &str) -> Result<Vec<T>> {
        let limit = self.ctx.settings.backend.page_size.max(1);
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .fetch::<T>(collection_url, Some(Paging { limit, offset }))
                .await?;
            let received = page.items.len();

            if received > limit {
                warn!(
                    collection = collection_url,
                    limit, received, "backend ignored paging, taking the page as the whole list"
                );
                if offset == 0 {
                    items.extend(page.items);
                }
                break;
            }

            let repeated = page
                .items
                .first()
                .and_then(|first| first.id())
                .is_some_and(|id| items.iter().any(|seen: &T| seen.id() == Some(id)));
            if repeated {
                warn!(collection = collection_url, offset, "backend repeated a page, stopping");
                break;
            }

            items.extend(page.items);
            offset += received;

            let exhausted = page.count.is_some_and(|count| offset >= count);
            if received == 0 || received < limit || exhausted {
                break;
            }
        }

        debug!(collection = collection_url, count = items.len(), "fetched collection");
        Ok(items)
    }

    /// Load the comments of an annotation once
    pub async fn fetch_comments(&self, annotation: &mut Annotation) -> Result<()> {
        if annotation.comments_fetched {
            return Ok(());
        }
        let url = annotation.comments_url().ok_or_else(|| {
            AnnotoolError::contract("annotation must be saved before its comments are fetched")
        })?;

        annotation.comments = self.fetch_all::<Comment>(&url).await?;
        annotation.comments_fetched = true;
        Ok(())
    }

    /// Wait for an annotation to receive its id, then load its comments
    pub async fn comments_when_ready(
        &self,
        ready: ReadySignal,
        annotations_url: &str,
    ) -> Result<Vec<Comment>> {
        let id = ready
            .wait()
            .await
            .ok_or_else(|| AnnotoolError::Other("annotation was dropped before it was saved".into()))?;
        let url = format!("{}/{}/comments", annotations_url.trim_matches('/'), id);
        self.fetch_all::<Comment>(&url).await
    }

    fn routes_local<T: Persistable>(&self) -> bool {
        T::LOCAL_ONLY || self.ctx.settings.backend.profile == Profile::Local
    }

    fn local_store(&self) -> Result<MutexGuard<'_, LocalStore>> {
        let store = self
            .local
            .as_ref()
            .ok_or_else(|| AnnotoolError::Config("local store is not configured".into()))?;
        store
            .lock()
            .map_err(|_| AnnotoolError::Other("local store lock poisoned".into()))
    }

    async fn create<T: Persistable>(&self, model: &mut T, opts: SyncOptions) -> Result<SyncOutcome> {
        let path = model.sync_state().collection_url.clone();
        let mut body = model.to_wire(WireOptions { stringify_sub: true });
        body.remove("id");

        let response = self.execute(Method::Post, &path, Some(body)).await?;
        let response = expect_success(Method::Post, &path, response)?;

        model.sync_state_mut().to_create = false;
        self.merge_response(model, &response.body)?;
        debug!(url = ?model.sync_state().url, "created");

        Ok(SyncOutcome::Created { add: opts.wait })
    }

    async fn copy<T: Persistable>(&self, model: &mut T, copy_url: &str) -> Result<SyncOutcome> {
        let item_url = model.sync_state().url.clone().ok_or_else(|| {
            AnnotoolError::contract("a copy needs the template's item url")
        })?;
        let path = format!("{}{}", item_url, copy_url);
        let mut body = model.to_wire(WireOptions { stringify_sub: true });
        body.remove("id");

        let response = self.execute(Method::Post, &path, Some(body)).await?;
        let response = expect_success(Method::Post, &path, response)?;

        let state = model.sync_state_mut();
        state.to_create = false;
        state.copy_url = None;
        state.url = None;
        self.merge_response(model, &response.body)?;

        let add = !model.sync_state().collection_url.is_empty();
        Ok(SyncOutcome::Copied { add })
    }

    async fn update<T: Persistable>(&self, model: &mut T) -> Result<SyncOutcome> {
        let state = model.sync_state();
        let path = if state.to_create || T::NO_POST {
            state.collection_url.clone()
        } else {
            state.item_url(require_id(model)?)
        };
        let body = model.to_wire(WireOptions { stringify_sub: true });

        let response = self.execute(Method::Put, &path, Some(body)).await?;
        let response = expect_success(Method::Put, &path, response)?;

        model.sync_state_mut().to_create = false;
        self.merge_response(model, &response.body)?;
        Ok(SyncOutcome::Updated)
    }

    async fn read<T: Persistable>(&self, model: &mut T) -> Result<SyncOutcome> {
        let path = model.sync_state().item_url(require_id(model)?);

        let response = self.execute(Method::Get, &path, None).await?;
        let response = expect_success(Method::Get, &path, response)?;

        self.merge_response(model, &response.body)?;
        Ok(SyncOutcome::Fetched)
    }

    async fn delete<T: Persistable>(&self, model: &mut T) -> Result<SyncOutcome> {
        let path = model.sync_state().item_url(require_id(model)?);

        let response = self.execute(Method::Delete, &path, None).await?;
        if response.status != 204 {
            warn!(path = %path, status = response.status, "delete not confirmed");
            return Err(AnnotoolError::transport(
                response.status,
                format!(
                    "DELETE {} failed: expected status 204, got {}",
                    path, response.status
                ),
            ));
        }

        Ok(SyncOutcome::Deleted)
    }

    fn sync_local<T: Persistable>(
        &self,
        op: Operation,
        model: &mut T,
        opts: SyncOptions,
    ) -> Result<SyncOutcome> {
        let store = self.local_store()?;
        let collection = model.sync_state().collection_url.clone();

        match op {
            Operation::Create | Operation::Update if model.sync_state().to_create => {
                model
                    .meta_mut()
                    .stamp_local(self.ctx.user_id(), self.ctx.now());
                let copied = model.sync_state_mut().copy_url.take().is_some();

                let stored = store.insert(&collection, model.to_wire(WireOptions::default()))?;
                model.sync_state_mut().to_create = false;
                model.merge(&stored, &self.ctx)?;

                Ok(if copied {
                    SyncOutcome::Copied { add: true }
                } else {
                    SyncOutcome::Created { add: opts.wait }
                })
            }
            Operation::Create | Operation::Update => {
                let id = require_id(model)?.to_string();
                let stored = store.upsert(&collection, &id, model.to_wire(WireOptions::default()))?;
                model.merge(&stored, &self.ctx)?;
                Ok(SyncOutcome::Updated)
            }
            Operation::Read => {
                let id = require_id(model)?;
                let stored = store
                    .get(&collection, id)?
                    .ok_or_else(|| AnnotoolError::NotFound(model.sync_state().item_url(id)))?;
                model.merge(&stored, &self.ctx)?;
                Ok(SyncOutcome::Fetched)
            }
            Operation::Delete => {
                let id = require_id(model)?;
                if !store.delete(&collection, id)? {
                    return Err(AnnotoolError::NotFound(model.sync_state().item_url(id)));
                }
                Ok(SyncOutcome::Deleted)
            }
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Attributes>,
    ) -> Result<HttpResponse> {
        let mut url = join_url(self.ctx.settings.api_base(), path);
        if self.ctx.settings.backend.profile == Profile::Opencast {
            url = sanitize_url(&url);
        }

        let request = HttpRequest {
            method,
            url,
            headers: auth_headers(&self.ctx),
            form: body.as_ref().map(flatten_body),
        };

        self.transport.send(request).await
    }

    fn merge_response<T: Persistable>(&self, model: &mut T, body: &str) -> Result<()> {
        if body.trim().is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<Value>(body)? {
            Value::Object(attrs) => model.merge(&attrs, &self.ctx),
            _ => Ok(()),
        }
    }

    fn parse_page<T: Persistable>(
        &self,
        body: &str,
        collection_url: &str,
        paging: Option<Paging>,
    ) -> Result<Page<T>> {
        let requested_offset = paging.map_or(0, |p| p.offset);
        let value = if body.trim().is_empty() {
            Value::Array(Vec::new())
        } else {
            serde_json::from_str::<Value>(body)?
        };

        let (raw_items, count, offset) = match value {
            Value::Array(items) => (items, None, requested_offset),
            Value::Object(mut wrapper) => {
                let items = match wrapper.remove(T::COLLECTION) {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(AnnotoolError::Other(format!(
                            "'{}' in response is not a list: {other}",
                            T::COLLECTION
                        )))
                    }
                };
                let count = wrapper
                    .get("count")
                    .and_then(Value::as_u64)
                    .map(|c| c as usize)
                    .unwrap_or(items.len() + requested_offset);
                let offset = wrapper
                    .get("offset")
                    .and_then(Value::as_u64)
                    .map_or(requested_offset, |o| o as usize);
                (items, Some(count), offset)
            }
            other => {
                return Err(AnnotoolError::Other(format!(
                    "unexpected collection response: {other}"
                )))
            }
        };

        let items = raw_items
            .into_iter()
            .map(|item| match item {
                Value::Object(attrs) => self.build::<T>(&attrs, collection_url),
                other => Err(AnnotoolError::Other(format!(
                    "collection item is not an object: {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            count,
            offset,
        })
    }

    fn build<T: Persistable>(&self, attrs: &Attributes, collection_url: &str) -> Result<T> {
        let mut model = T::from_attributes(attrs, &self.ctx)?.in_collection(collection_url);
        model.sync_state_mut().to_create = false;
        Ok(model)
    }
}

#[async_trait]
impl AnnotationSource for SyncDispatcher {
    async fn load_annotations(&self, track: &Track) -> Result<Vec<Annotation>> {
        let url = track
            .annotations_url()
            .ok_or_else(|| AnnotoolError::contract("track has no url; was it saved?"))?;
        self.fetch_all::<Annotation>(&url).await
    }
}

fn require_id<T: Persistable>(model: &T) -> Result<&str> {
    model
        .id()
        .ok_or_else(|| AnnotoolError::contract(format!("{} resource has no id", T::COLLECTION)))
}

fn expect_success(method: Method, path: &str, response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let detail = response.body.trim();
    let message = if detail.is_empty() {
        format!("{method} {path} failed")
    } else {
        format!("{method} {path} failed: {detail}")
    };
    Err(AnnotoolError::transport(response.status, message))
}
