//! reqwest client for the delivery backend's `/mobile` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::backend::{BackendError, DeliveryBackend, RequestContext};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::DriverProfile;
use crate::models::notification::{Notification, UnreadReply};
use crate::models::proof::ProofOfDelivery;
use crate::models::rating::RatingProfile;
use crate::models::scan::{ScanRequest, ScanVerdict};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(alias = "idLivreur")]
    id: i64,
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        if base_url.trim().is_empty() {
            return Err(BackendError::InvalidRequest("backend url is empty".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(builder: RequestBuilder, ctx: &RequestContext) -> RequestBuilder {
        match ctx.token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "backend rejected request");
        Err(BackendError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<T, BackendError> {
        debug!(path, "GET");
        let request = Self::authorized(self.client.get(self.url(path)), ctx);
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DeliveryBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<RequestContext, BackendError> {
        let response = self
            .client
            .post(self.url("/mobile/livreur/login"))
            .json(&json!({ "email": email, "motDePasse": password }))
            .send()
            .await?;
        let login: LoginResponse = Self::check_status(response).await?.json().await?;

        Ok(RequestContext::new(login.id, login.token))
    }

    async fn assigned_deliveries(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<Delivery>, BackendError> {
        let deliveries: Option<Vec<Delivery>> = self
            .get_json(ctx, &format!("/mobile/livraison/assignees/{}", ctx.driver_id))
            .await?;
        Ok(deliveries.unwrap_or_default())
    }

    async fn verify_scan(
        &self,
        ctx: &RequestContext,
        delivery_id: i64,
        scanned_code: &str,
    ) -> Result<bool, BackendError> {
        let payload = ScanRequest {
            delivery_id,
            driver_id: ctx.driver_id,
            scanned_code,
        };
        let request = Self::authorized(self.client.post(self.url("/mobile/scan")), ctx);
        let response = Self::check_status(request.json(&payload).send().await?).await?;
        let verdict: ScanVerdict = response.json().await?;

        Ok(verdict.is_match())
    }

    async fn upload_proof(
        &self,
        ctx: &RequestContext,
        proof: &ProofOfDelivery,
    ) -> Result<(), BackendError> {
        let file = Part::bytes(proof.photo.bytes.clone())
            .file_name("preuve.jpg")
            .mime_str(&proof.photo.content_type)?;

        let form = Form::new()
            .part("file", file)
            .text("idLivraison", proof.delivery_id.to_string())
            .text("latitude", proof.location.latitude.to_string())
            .text("longitude", proof.location.longitude.to_string())
            .text("timestamp", proof.location.timestamp.to_rfc3339());

        let request = Self::authorized(self.client.post(self.url("/mobile/preuve")), ctx);
        Self::check_status(request.multipart(form).send().await?).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        ctx: &RequestContext,
        delivery_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), BackendError> {
        let request = Self::authorized(self.client.put(self.url("/mobile/livraison/statut")), ctx)
            .query(&[
                ("idLivraison", delivery_id.to_string()),
                ("nouveauStatut", status.as_wire().to_string()),
            ]);
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    async fn delivery_history(&self, ctx: &RequestContext) -> Result<Vec<Delivery>, BackendError> {
        let deliveries: Option<Vec<Delivery>> = self
            .get_json(ctx, &format!("/mobile/livraison/historique/{}", ctx.driver_id))
            .await?;
        Ok(deliveries.unwrap_or_default())
    }

    async fn notifications(&self, ctx: &RequestContext) -> Result<Vec<Notification>, BackendError> {
        let notifications: Option<Vec<Notification>> = self
            .get_json(ctx, &format!("/mobile/notifications/user/{}", ctx.driver_id))
            .await?;
        Ok(notifications.unwrap_or_default())
    }

    async fn unread_notifications(&self, ctx: &RequestContext) -> Result<u64, BackendError> {
        let reply: Option<UnreadReply> = self
            .get_json(ctx, &format!("/mobile/notifications/non-lues/{}", ctx.driver_id))
            .await?;
        Ok(reply.map(|r| r.count()).unwrap_or(0))
    }

    async fn mark_notification_read(
        &self,
        ctx: &RequestContext,
        notification_id: i64,
    ) -> Result<(), BackendError> {
        let path = format!("/mobile/notifications/{notification_id}/lire");
        let request = Self::authorized(self.client.put(self.url(&path)), ctx);
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    async fn rating_profile(&self, ctx: &RequestContext) -> Result<RatingProfile, BackendError> {
        self.get_json(ctx, &format!("/mobile/evaluation/profil/{}", ctx.driver_id))
            .await
    }

    async fn driver_profile(&self, ctx: &RequestContext) -> Result<DriverProfile, BackendError> {
        self.get_json(ctx, &format!("/mobile/livreur/{}", ctx.driver_id))
            .await
    }
}
