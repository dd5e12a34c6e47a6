//! Admin API endpoints
//!
//! Typed wrappers over [`ApiClient::get`] / [`ApiClient::post`] for the data
//! the console pages show. All of them need an attached session token.
//!
//! ```rust,no_run
//! use freespeek_admin::{ApiClient, Config};
//! use freespeek_admin::admin::UserQuery;
//!
//! # async fn example() -> freespeek_admin::Result<()> {
//! let client = ApiClient::new(Config::new("http://localhost:5000"))?;
//! client.set_auth_token("eyJ...");
//!
//! let page = client.list_users(&UserQuery::new(20).with_search("ada")).await?;
//! println!("{} of {} users", page.data.len(), page.total);
//! # Ok(())
//! # }
//! ```

mod dto;

pub use dto::{
    AdminUser, AnalyticsPoint, AnalyticsRange, Audience, BulkEmailRequest, ChatMessage,
    Conversation, DashboardStats, EmailCampaign, Envelope, LiveUser, OnlineCount, PageCount,
    Paginated, SupportTicket, TrackedUser, TrackingAnalytics, TrackingStats, UserQuery,
    UserStatus,
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Result;

const DASHBOARD_STATS_PATH: &str = "/api/admin/dashboard/stats";
const ONLINE_COUNT_PATH: &str = "/api/admin/users/online";
const LIVE_USERS_PATH: &str = "/api/admin/users/live";
const USERS_PATH: &str = "/api/admin/users";
const TRACKING_STATS_PATH: &str = "/api/admin/tracking/stats";
const TRACKING_ANALYTICS_PATH: &str = "/api/admin/tracking/analytics";
const TRACKING_USERS_PATH: &str = "/api/admin/tracking/users";
const CHATS_PATH: &str = "/api/admin/chats";
const SUPPORT_TICKETS_PATH: &str = "/api/admin/support/tickets";
const EMAIL_CAMPAIGNS_PATH: &str = "/api/admin/email/campaigns";

impl ApiClient {
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.get_unwrapped(DASHBOARD_STATS_PATH, &[]).await
    }

    /// Number of users connected right now
    pub async fn online_user_count(&self) -> Result<u64> {
        let count: OnlineCount = self.get_unwrapped(ONLINE_COUNT_PATH, &[]).await?;
        Ok(count.count)
    }

    /// Users connected right now, as reported by the presence endpoint
    pub async fn live_users(&self) -> Result<Vec<LiveUser>> {
        self.get_unwrapped(LIVE_USERS_PATH, &[]).await
    }

    pub async fn list_users(&self, query: &UserQuery) -> Result<Paginated<AdminUser>> {
        self.get_page(USERS_PATH, &query.to_params()).await
    }

    pub async fn get_user(&self, id: &str) -> Result<AdminUser> {
        self.get_unwrapped(&format!("{}/{}", USERS_PATH, id), &[]).await
    }

    pub async fn tracking_stats(&self) -> Result<TrackingStats> {
        self.get_unwrapped(TRACKING_STATS_PATH, &[]).await
    }

    pub async fn tracking_analytics(&self, range: AnalyticsRange) -> Result<TrackingAnalytics> {
        self.get_unwrapped(TRACKING_ANALYTICS_PATH, &[("range", range.as_str().to_string())])
            .await
    }

    pub async fn tracking_users(&self, page: u32, limit: u32) -> Result<Paginated<TrackedUser>> {
        let params = [("page", page.max(1).to_string()), ("limit", limit.to_string())];
        self.get_page(TRACKING_USERS_PATH, &params).await
    }

    pub async fn chats(&self, page: u32, limit: u32) -> Result<Paginated<Conversation>> {
        let params = [("page", page.max(1).to_string()), ("limit", limit.to_string())];
        self.get_page(CHATS_PATH, &params).await
    }

    pub async fn chat_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        self.get_unwrapped(&format!("{}/{}/messages", CHATS_PATH, conversation_id), &[])
            .await
    }

    /// Support tickets, optionally filtered by status (`open`, `closed`, ...)
    pub async fn support_tickets(&self, status: Option<&str>) -> Result<Vec<SupportTicket>> {
        let params: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.to_string())])
            .unwrap_or_default();
        self.get_unwrapped(SUPPORT_TICKETS_PATH, &params).await
    }

    pub async fn email_campaigns(&self) -> Result<Vec<EmailCampaign>> {
        self.get_unwrapped(EMAIL_CAMPAIGNS_PATH, &[]).await
    }

    /// Queue a bulk email; returns the campaign the backend created
    pub async fn send_bulk_email(&self, request: &BulkEmailRequest) -> Result<EmailCampaign> {
        let envelope: Envelope<EmailCampaign> = self.post(EMAIL_CAMPAIGNS_PATH, request).await?;
        Ok(envelope.into_inner())
    }

    async fn get_unwrapped<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let envelope: Envelope<T> = self.get(path, query).await?;
        Ok(envelope.into_inner())
    }

    /// List endpoints answer either with the page itself or with the page
    /// under `data`; an array under `data` belongs to the page.
    async fn get_page<T>(&self, path: &str, query: &[(&str, String)]) -> Result<Paginated<T>>
    where
        T: DeserializeOwned,
    {
        let value: Value = self.get(path, query).await?;
        let page = match value {
            Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(serde_json::from_value(page)?)
    }
}
