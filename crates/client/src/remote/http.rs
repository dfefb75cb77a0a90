// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP implementation of [`RemoteService`] over reqwest.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use evsync_core::wire::{
    create_body, decode_events, filter_params, page_params, WireEventList, WireUserPatch,
};
use evsync_core::{
    to_domain_format, Event, EventFilter, EventId, EventPatch, Page, PageRequest, StoredFile,
    User, UserPatch, WireEvent, WireEventPatch, WirePage, WireUser,
};

use super::{FileUpload, RemoteError, RemoteFuture, RemoteResult, RemoteService};
use crate::auth::AuthProvider;

pub struct HttpRemote {
    client: Client,
    base: String,
    auth: Arc<dyn AuthProvider>,
    probe_timeout: Duration,
}

impl HttpRemote {
    pub fn new(
        base_url: &str,
        auth: Arc<dyn AuthProvider>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("evsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(HttpRemote {
            client,
            base: base_url.trim_end_matches('/').to_string(),
            auth,
            probe_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.auth.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn event_list(&self, builder: RequestBuilder) -> RemoteResult<Vec<Event>> {
        let list: WireEventList = self.send_json(builder).await?;
        let (events, skipped) = decode_events(list.into_vec());
        if skipped > 0 {
            warn!(skipped, "dropped undecodable events from listing");
        }
        Ok(events)
    }

    async fn single_event(&self, builder: RequestBuilder) -> RemoteResult<Event> {
        let wire: WireEvent = self.send_json(builder).await?;
        to_domain_format(wire).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn user(&self, builder: RequestBuilder) -> RemoteResult<User> {
        let wire: WireUser = self.send_json(builder).await?;
        Ok(wire.into_domain())
    }
}

/// Maps a non-success response to an error. 404 is [`RemoteError::NotFound`].
async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        code: status.as_u16(),
        message: error_message(&body, status),
    })
}

/// Extracts `detail` or `message` from a JSON error body, else the raw text.
fn error_message(body: &str, status: StatusCode) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = parsed.as_ref().and_then(|v| {
        ["detail", "message", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
    });
    match field {
        Some(msg) => msg,
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => body.trim().to_string(),
    }
}

impl RemoteService for HttpRemote {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let result = self
                .client
                .head(self.url(""))
                .timeout(self.probe_timeout)
                .send()
                .await;
            match result {
                Ok(response) => {
                    let code = response.status().as_u16();
                    debug!(code, "probe answered");
                    (200..400).contains(&code)
                }
                Err(e) => {
                    debug!(error = %e, "probe failed");
                    false
                }
            }
        })
    }

    fn list_events<'a>(&'a self, filter: &'a EventFilter) -> RemoteFuture<'a, Vec<Event>> {
        Box::pin(async move {
            let builder = self
                .request(Method::GET, "events/")
                .query(&filter_params(filter));
            self.event_list(builder).await
        })
    }

    fn list_events_page<'a>(
        &'a self,
        filter: &'a EventFilter,
        page: PageRequest,
    ) -> RemoteFuture<'a, Page<Event>> {
        Box::pin(async move {
            let builder = self
                .request(Method::GET, "events/")
                .query(&filter_params(filter))
                .query(&page_params(page));
            let wire: WirePage = self.send_json(builder).await?;
            let (page, skipped) = wire.into_page(page);
            if skipped > 0 {
                warn!(skipped, "dropped undecodable events from page");
            }
            Ok(page)
        })
    }

    fn get_event<'a>(&'a self, id: &'a EventId) -> RemoteFuture<'a, Event> {
        Box::pin(async move {
            let builder = self.request(Method::GET, &format!("events/{id}/"));
            self.single_event(builder).await
        })
    }

    fn create_event<'a>(&'a self, event: &'a Event) -> RemoteFuture<'a, Event> {
        Box::pin(async move {
            let builder = self
                .request(Method::POST, "events/")
                .json(&create_body(event));
            self.single_event(builder).await
        })
    }

    fn update_event<'a>(
        &'a self,
        id: &'a EventId,
        patch: &'a EventPatch,
    ) -> RemoteFuture<'a, Event> {
        Box::pin(async move {
            let builder = self
                .request(Method::PATCH, &format!("events/{id}/"))
                .json(&WireEventPatch::from(patch));
            self.single_event(builder).await
        })
    }

    fn delete_event<'a>(&'a self, id: &'a EventId) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.send(self.request(Method::DELETE, &format!("events/{id}/")))
                .await?;
            Ok(())
        })
    }

    fn owned_events<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, Vec<Event>> {
        Box::pin(async move {
            self.event_list(self.request(Method::GET, &format!("users/{user_id}/events/")))
                .await
        })
    }

    fn interested_events<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, Vec<Event>> {
        Box::pin(async move {
            self.event_list(self.request(Method::GET, &format!("users/{user_id}/interested/")))
                .await
        })
    }

    fn add_interest<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a EventId,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(Method::POST, &format!("users/{user_id}/interested/"))
                .json(&json!({ "event_id": event_id.as_str() }));
            self.send(builder).await?;
            Ok(())
        })
    }

    fn remove_interest<'a>(
        &'a self,
        user_id: &'a str,
        event_id: &'a EventId,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("users/{user_id}/interested/{event_id}/");
            self.send(self.request(Method::DELETE, &path)).await?;
            Ok(())
        })
    }

    fn get_user<'a>(&'a self, user_id: &'a str) -> RemoteFuture<'a, User> {
        Box::pin(async move {
            self.user(self.request(Method::GET, &format!("users/{user_id}/")))
                .await
        })
    }

    fn update_user<'a>(&'a self, user_id: &'a str, patch: &'a UserPatch) -> RemoteFuture<'a, User> {
        Box::pin(async move {
            let builder = self
                .request(Method::PATCH, &format!("users/{user_id}/"))
                .json(&WireUserPatch::from(patch));
            self.user(builder).await
        })
    }

    fn upload_file(&self, file: FileUpload) -> RemoteFuture<'_, StoredFile> {
        Box::pin(async move {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| RemoteError::Network(e.to_string()))?;
            let form = reqwest::multipart::Form::new().part("file", part);
            let builder = self.request(Method::POST, "upload/").multipart(form);
            self.send_json(builder).await
        })
    }

    fn recent_changes(&self, since: DateTime<Utc>) -> RemoteFuture<'_, Vec<WireEvent>> {
        Box::pin(async move {
            let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
            let builder = self
                .request(Method::GET, "events/recent/")
                .query(&[("since", since)]);
            let list: WireEventList = self.send_json(builder).await?;
            Ok(list.into_vec())
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
